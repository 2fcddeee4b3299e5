// irrigation_client/src/ws_client/schedule_sync.rs

//! Schedule Synchronizer: the local ordered mirror of the authority's schedule list.
//!
//! Every mutator changes the mirror first and then pushes. A push is always a
//! `setSchedule` carrying the whole list, never a patch. Two push paths exist:
//!
//! - immediate: structural edits (add, delete, replace one schedule). The caller gets
//!   the `setScheduleResponse` or the transport error.
//! - debounced: `update_active_period`, fed by continuous dial movement. Each call
//!   restarts a single cancellable timer; only the state at the end of the quiet window
//!   is sent. Failures go out as `EngineEvent::ScheduleSyncFailed`.
//!
//! A rejected push does not roll the mirror back.

use crate::error::ClientError;
use crate::event::{EngineEvent, EventBus};
use crate::ws_client::dispatcher::RequestDispatcher;
use common_models::schedule_models::{ActivePeriod, Schedule, Schedules, MINUTES_PER_DAY, UNTITLED_SCHEDULE_NAME};
use common_models::ws_payloads::{SetSchedulePayload, SetScheduleResponse, SET_SCHEDULE_MESSAGE_TYPE};
use common_models::Day;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Mirror {
    schedules: Schedules,
    selected_index: usize,
}

impl Mirror {
    fn clamp_selection(&mut self) {
        self.selected_index = self.selected_index.min(self.schedules.len().saturating_sub(1));
    }

    fn updated_event(&self) -> EngineEvent {
        EngineEvent::SchedulesUpdated {
            schedules: self.schedules.clone(),
            selected_index: self.selected_index,
        }
    }
}

/// The one debounce timer. `generation` invalidates a timer that already woke up
/// but lost the race against a newer edit or a cancel.
#[derive(Debug, Default)]
struct PendingPush {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct SyncInner {
    mirror: RwLock<Mirror>,
    /// The single debounce timer and its generation counter.
    pending_push: TokioMutex<PendingPush>,
    dispatcher: Arc<RequestDispatcher>,
    events: EventBus,
    debounce: Duration,
}

/// Handle to the schedule mirror. Clones share the mirror and the debounce timer, which
/// the timer task relies on to push later.
#[derive(Debug, Clone)]
pub struct ScheduleSynchronizer {
    inner: Arc<SyncInner>,
}

impl ScheduleSynchronizer {
    pub fn new(dispatcher: Arc<RequestDispatcher>, events: EventBus, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                mirror: RwLock::new(Mirror::default()),
                pending_push: TokioMutex::new(PendingPush::default()),
                dispatcher,
                events,
                debounce,
            }),
        }
    }

    pub async fn schedules(&self) -> Schedules {
        self.inner.mirror.read().await.schedules.clone()
    }

    pub async fn selected_index(&self) -> usize {
        self.inner.mirror.read().await.selected_index
    }

    pub async fn selected_schedule(&self) -> Option<Schedule> {
        let mirror = self.inner.mirror.read().await;
        mirror.schedules.get(mirror.selected_index).cloned()
    }

    /// Selects `index`, clamped into range. Returns the effective index.
    pub async fn select(&self, index: usize) -> usize {
        let (selected, event) = {
            let mut mirror = self.inner.mirror.write().await;
            mirror.selected_index = index;
            mirror.clamp_selection();
            (mirror.selected_index, mirror.updated_event())
        };
        self.inner.events.emit(event);
        selected
    }

    /// Seeds the mirror with the authority's list. Nothing is pushed.
    pub async fn replace_all(&self, schedules: Schedules) {
        self.cancel_pending_push().await;
        let event = {
            let mut mirror = self.inner.mirror.write().await;
            mirror.schedules = schedules;
            mirror.clamp_selection();
            mirror.updated_event()
        };
        info!("[ScheduleSync] mirror replaced from authority");
        self.inner.events.emit(event);
    }

    /// Appends `Schedule N` (N = new length), selects it and pushes.
    pub async fn add_schedule(&self) -> Result<SetScheduleResponse, ClientError> {
        let event = {
            let mut mirror = self.inner.mirror.write().await;
            let position = mirror.schedules.len() + 1;
            mirror.schedules.push(Schedule::numbered(position));
            mirror.selected_index = mirror.schedules.len() - 1;
            mirror.updated_event()
        };
        self.inner.events.emit(event);
        self.push_now().await
    }

    /// Replaces the schedule at `index` in place and pushes.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub async fn update_schedule(&self, index: usize, schedule: Schedule) -> Result<SetScheduleResponse, ClientError> {
        self.modify_schedule(index, |slot| *slot = schedule).await;
        self.push_now().await
    }

    /// Renames; a blank name becomes `Untitled Schedule`.
    pub async fn rename_schedule(&self, index: usize, name: &str) -> Result<SetScheduleResponse, ClientError> {
        let name = match name.trim() {
            "" => UNTITLED_SCHEDULE_NAME.to_string(),
            _ => name.to_string(),
        };
        self.modify_schedule(index, |slot| slot.name = name).await;
        self.push_now().await
    }

    pub async fn set_schedule_active(&self, index: usize, is_active: bool) -> Result<SetScheduleResponse, ClientError> {
        self.modify_schedule(index, |slot| slot.is_active = is_active).await;
        self.push_now().await
    }

    pub async fn set_days(&self, index: usize, days: BTreeSet<Day>) -> Result<SetScheduleResponse, ClientError> {
        self.modify_schedule(index, |slot| slot.days = days).await;
        self.push_now().await
    }

    /// Sets the start time in minutes after midnight. Values of 1440 or more are refused
    /// before anything changes.
    pub async fn set_start_time(&self, index: usize, minutes: u32) -> Result<SetScheduleResponse, ClientError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(ClientError::InvalidStartTime(minutes));
        }
        self.modify_schedule(index, |slot| slot.start_time_minutes = minutes).await;
        self.push_now().await
    }

    /// Dial-edit path on the selected schedule: replace the zone's period (0 removes it)
    /// and restart the debounce timer.
    pub async fn update_active_period(&self, period: ActivePeriod) {
        let event = {
            let mut mirror = self.inner.mirror.write().await;
            let selected = mirror.selected_index;
            let Some(schedule) = mirror.schedules.get_mut(selected) else {
                warn!("[ScheduleSync] no schedule selected, active period for {} ignored", period.zone);
                return;
            };
            schedule.upsert_active_period(period);
            mirror.updated_event()
        };
        self.inner.events.emit(event);
        self.schedule_debounced_push().await;
    }

    /// Removes the schedule at `index` unless it is the only one.
    ///
    /// Returns `Ok(None)` when refused; nothing is pushed then.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub async fn delete_schedule(&self, index: usize) -> Result<Option<SetScheduleResponse>, ClientError> {
        let event = {
            let mut mirror = self.inner.mirror.write().await;
            if mirror.schedules.len() <= 1 {
                info!("[ScheduleSync] refusing to delete the last remaining schedule");
                return Ok(None);
            }
            assert!(
                index < mirror.schedules.len(),
                "schedule index {} out of range (len {})",
                index,
                mirror.schedules.len()
            );
            mirror.schedules.remove(index);
            // Keep the same schedule selected when an earlier one goes away.
            if index < mirror.selected_index {
                mirror.selected_index -= 1;
            }
            mirror.clamp_selection();
            mirror.updated_event()
        };
        self.inner.events.emit(event);
        self.push_now().await.map(Some)
    }

    /// Sends the current snapshot right away, superseding any pending debounced push.
    pub async fn push_now(&self) -> Result<SetScheduleResponse, ClientError> {
        self.cancel_pending_push().await;
        self.send_snapshot().await
    }

    /// Cancels the debounce timer. Returns whether one was pending.
    pub async fn cancel_pending_push(&self) -> bool {
        let mut pending = self.inner.pending_push.lock().await;
        pending.generation += 1;
        match pending.handle.take() {
            Some(handle) => {
                handle.abort();
                debug!("[ScheduleSync] pending debounced push cancelled");
                true
            }
            None => false,
        }
    }

    pub async fn has_pending_push(&self) -> bool {
        self.inner.pending_push.lock().await.handle.is_some()
    }

    async fn modify_schedule<F>(&self, index: usize, edit: F)
    where
        F: FnOnce(&mut Schedule),
    {
        let event = {
            let mut mirror = self.inner.mirror.write().await;
            let len = mirror.schedules.len();
            let Some(slot) = mirror.schedules.get_mut(index) else {
                panic!("schedule index {} out of range (len {})", index, len);
            };
            edit(slot);
            mirror.updated_event()
        };
        self.inner.events.emit(event);
    }

    async fn send_snapshot(&self) -> Result<SetScheduleResponse, ClientError> {
        let payload = SetSchedulePayload {
            schedules: self.schedules().await,
        };
        debug!("[ScheduleSync] pushing {} schedule(s)", payload.schedules.len());
        self.inner
            .dispatcher
            .request(SET_SCHEDULE_MESSAGE_TYPE, &payload)
            .await
    }

    async fn schedule_debounced_push(&self) {
        let mut pending = self.inner.pending_push.lock().await;
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;

        let sync = self.clone();
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(sync.inner.debounce).await;
            {
                let mut pending = sync.inner.pending_push.lock().await;
                if pending.generation != generation {
                    return;
                }
                // From here on the push is in flight and no longer cancellable.
                pending.handle = None;
            }
            let outcome = sync.send_snapshot().await.and_then(ClientError::check_ack);
            if let Err(e) = outcome {
                warn!("[ScheduleSync] debounced push failed: {}", e);
                sync.inner.events.emit(EngineEvent::ScheduleSyncFailed { error: e.to_string() });
            }
        }));
    }
}
