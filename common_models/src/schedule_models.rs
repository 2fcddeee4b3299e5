// common_models/src/schedule_models.rs

//! Schedule configuration models.
//!
//! A `Schedule` names a set of days, a start time (minutes after midnight) and a run
//! duration per zone. The list of schedules is ordered and a schedule's identity is its
//! position in that list, so nothing in here reorders a `Schedules` value.

use crate::enums::{Day, Zone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Number of minutes in a day. Valid start times are `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Name given to a schedule saved with a blank name.
pub const UNTITLED_SCHEDULE_NAME: &str = "Untitled Schedule";

/// The ordered schedule list. Display order is edit order.
pub type Schedules = Vec<Schedule>;

/// One zone's run duration within a schedule.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivePeriod {
    pub zone: Zone,
    /// Run length in minutes, starting at the schedule's start time. 0 means "not present".
    pub duration_minutes: u32,
}

impl ActivePeriod {
    pub fn new(zone: Zone, duration_minutes: u32) -> Self {
        Self {
            zone,
            duration_minutes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub name: String,
    #[serde(default)]
    pub days: BTreeSet<Day>,
    #[serde(default)]
    pub active_periods: Vec<ActivePeriod>,
    #[serde(default)]
    pub start_time_minutes: u32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            name: String::new(),
            days: BTreeSet::new(),
            active_periods: Vec::new(),
            start_time_minutes: 0,
            is_active: true,
        }
    }
}

impl Schedule {
    /// A fresh schedule named after its 1-based position, e.g. `Schedule 3`.
    pub fn numbered(position: usize) -> Self {
        Self {
            name: format!("Schedule {}", position),
            ..Self::default()
        }
    }

    /// Replaces the period for `period.zone`. A zero duration removes the zone instead.
    ///
    /// The relative order of the other periods is kept; a new or updated period goes to
    /// the end.
    pub fn upsert_active_period(&mut self, period: ActivePeriod) {
        self.active_periods.retain(|p| p.zone != period.zone);
        if period.duration_minutes > 0 {
            self.active_periods.push(period);
        }
    }

    pub fn active_period(&self, zone: Zone) -> Option<&ActivePeriod> {
        self.active_periods.iter().find(|p| p.zone == zone)
    }

    /// Checks the invariants the authority relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.start_time_minutes >= MINUTES_PER_DAY {
            return Err(format!(
                "schedule '{}': startTimeMinutes {} is outside 0..{}",
                self.name, self.start_time_minutes, MINUTES_PER_DAY
            ));
        }
        let mut seen = HashSet::new();
        for period in &self.active_periods {
            if period.duration_minutes == 0 {
                return Err(format!(
                    "schedule '{}': {} has a zero duration",
                    self.name, period.zone
                ));
            }
            if !seen.insert(period.zone) {
                return Err(format!(
                    "schedule '{}': {} appears more than once",
                    self.name, period.zone
                ));
            }
        }
        Ok(())
    }
}

/// Validates every schedule of a list, reporting the first violation.
pub fn validate_schedules(schedules: &[Schedule]) -> Result<(), String> {
    schedules.iter().try_for_each(Schedule::validate)
}
