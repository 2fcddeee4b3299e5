// common_models/src/enums.rs

//! Shared enums.
//!
//! These enums give the fixed vocabularies of the control plane (valve zones, days of
//! the week and the two kinds of peers that talk to the server) a single typed
//! representation across all crates. Their serialized forms are part of the wire
//! format and must not change: zones and days serialize as lower camelCase strings
//! (`"zone1"`, `"monday"`), matching the dashboard types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An independently controllable irrigation valve.
///
/// The enumeration is closed: a controller drives exactly six zones. On the
/// `toggleZone` wire payload a zone is carried as its 1-based number (see
/// [`Zone::number`]); everywhere else (schedules) it is carried as its string tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Zone {
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Zone5,
    Zone6,
}

impl Zone {
    pub const COUNT: usize = 6;

    /// Every zone, in numeric order.
    pub const ALL: [Zone; Zone::COUNT] = [
        Zone::Zone1,
        Zone::Zone2,
        Zone::Zone3,
        Zone::Zone4,
        Zone::Zone5,
        Zone::Zone6,
    ];

    /// Zero-based position, used to index per-zone state tables.
    pub fn index(self) -> usize {
        match self {
            Zone::Zone1 => 0,
            Zone::Zone2 => 1,
            Zone::Zone3 => 2,
            Zone::Zone4 => 3,
            Zone::Zone5 => 4,
            Zone::Zone6 => 5,
        }
    }

    /// 1-based zone number as sent in `toggleZone` payloads.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Inverse of [`Zone::number`]. Returns `None` outside `1..=6`.
    pub fn from_number(number: u8) -> Option<Zone> {
        match number {
            1..=6 => Some(Zone::ALL[(number - 1) as usize]),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone{}", self.number())
    }
}

/// Day of the week, used only as a membership tag inside a schedule.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];
}

/// The kind of peer on the other end of a server-side connection.
///
/// A peer announces itself by sending its identity token as the very first (plain
/// text, non-JSON) frame after the WebSocket handshake.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    /// A user-facing client running the protocol engine.
    User,
    /// The field controller that actually operates the valves.
    Controller,
}

impl ClientType {
    /// The literal preamble token this peer sends right after the connection opens.
    pub fn identity_token(self) -> &'static str {
        match self {
            ClientType::User => "user",
            ClientType::Controller => "controller",
        }
    }

    /// Parses a preamble frame. Anything other than an exact token is rejected.
    pub fn from_identity_token(token: &str) -> Option<ClientType> {
        match token {
            "user" => Some(ClientType::User),
            "controller" => Some(ClientType::Controller),
            _ => None,
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_zone_serializes_as_lowercase_tag() {
        assert_eq!(serde_json::to_string(&Zone::Zone3).unwrap(), "\"zone3\"");
        let parsed: Zone = serde_json::from_str("\"zone6\"").unwrap();
        assert_eq!(parsed, Zone::Zone6);
        assert!(serde_json::from_str::<Zone>("\"zone7\"").is_err());
    }

    #[test]
    fn test_zone_number_mapping_is_one_based() {
        assert_eq!(Zone::Zone1.number(), 1);
        assert_eq!(Zone::Zone6.number(), 6);
        for zone in Zone::ALL {
            assert_eq!(Zone::from_number(zone.number()), Some(zone));
        }
        assert_eq!(Zone::from_number(0), None);
        assert_eq!(Zone::from_number(7), None);
        assert_eq!(Zone::Zone4.to_string(), "zone4");
    }

    #[test]
    fn test_day_serializes_as_lowercase_name() {
        assert_eq!(serde_json::to_string(&Day::Wednesday).unwrap(), "\"wednesday\"");
        let days: HashSet<Day> = serde_json::from_str("[\"monday\",\"sunday\",\"monday\"]").unwrap();
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn test_client_type_identity_tokens() {
        assert_eq!(ClientType::User.identity_token(), "user");
        assert_eq!(ClientType::from_identity_token("controller"), Some(ClientType::Controller));
        assert_eq!(ClientType::from_identity_token("User"), None);
        assert_eq!(ClientType::from_identity_token("{\"type\":\"keepAlive\"}"), None);
    }
}
