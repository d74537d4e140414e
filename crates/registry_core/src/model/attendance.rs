//! Attendance keys, service slots and the service-time schedule.
//!
//! # Invariants
//! - Date keys are `DD_MM_YYYY` with zero-padded day and month and denote a
//!   real calendar date.
//! - Slot codes are exactly `"1"`, `"2"` or `"3"`.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

static DATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}_\d{2}_\d{4}$").expect("valid date key regex"));

const DATE_KEY_FORMAT: &str = "%d_%m_%Y";

/// Per-date attendance: date key to the service slot attended.
pub type Attendance = BTreeMap<String, ServiceSlot>;

/// One of the three service slots held on a meeting day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceSlot {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
    #[serde(rename = "3")]
    Third,
}

impl ServiceSlot {
    pub const ALL: [ServiceSlot; 3] = [Self::First, Self::Second, Self::Third];

    pub fn code(self) -> &'static str {
        match self {
            Self::First => "1",
            Self::Second => "2",
            Self::Third => "3",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::First),
            "2" => Some(Self::Second),
            "3" => Some(Self::Third),
            _ => None,
        }
    }
}

/// Parses a `DD_MM_YYYY` key into a calendar date.
///
/// Returns `None` for malformed keys and impossible dates such as `31_02_2024`.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    if !DATE_KEY_RE.is_match(key) {
        return None;
    }
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Returns whether `key` is a well-formed attendance date key.
pub fn is_valid_date_key(key: &str) -> bool {
    parse_date_key(key).is_some()
}

/// Formats a calendar date as an attendance key.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Time window during which one service slot is running.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceWindow {
    pub slot: ServiceSlot,
    #[serde(deserialize_with = "deserialize_clock_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "deserialize_clock_time")]
    pub end: NaiveTime,
}

/// Ordered set of service windows for a meeting day.
///
/// Windows are half-open (`start <= t < end`); the first matching window wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceSchedule {
    pub windows: Vec<ServiceWindow>,
}

impl Default for ServiceSchedule {
    fn default() -> Self {
        Self {
            windows: vec![
                window(ServiceSlot::First, 8, 10),
                window(ServiceSlot::Second, 10, 12),
                window(ServiceSlot::Third, 12, 14),
            ],
        }
    }
}

impl ServiceSchedule {
    /// Returns the slot running at `time`, or `None` outside service hours.
    pub fn slot_at(&self, time: NaiveTime) -> Option<ServiceSlot> {
        self.windows
            .iter()
            .find(|window| window.start <= time && time < window.end)
            .map(|window| window.slot)
    }
}

fn window(slot: ServiceSlot, start_hour: u32, end_hour: u32) -> ServiceWindow {
    ServiceWindow {
        slot,
        start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
        end: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or(NaiveTime::MIN),
    }
}

fn deserialize_clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|err| serde::de::Error::custom(format!("invalid clock time `{raw}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{date_key, is_valid_date_key, parse_date_key, ServiceSchedule, ServiceSlot};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn date_key_round_trips_through_chrono() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(date_key(date), "07_03_2024");
        assert_eq!(parse_date_key("07_03_2024"), Some(date));
    }

    #[test]
    fn date_key_rejects_unpadded_and_impossible_dates() {
        assert!(!is_valid_date_key("7_3_2024"));
        assert!(!is_valid_date_key("31_02_2024"));
        assert!(!is_valid_date_key("2024_03_07"));
        assert!(is_valid_date_key("29_02_2024"));
    }

    #[test]
    fn slot_codes_parse_strictly() {
        assert_eq!(ServiceSlot::parse("2"), Some(ServiceSlot::Second));
        assert_eq!(ServiceSlot::parse("4"), None);
        assert_eq!(ServiceSlot::parse(" 1"), None);
    }

    #[test]
    fn default_schedule_maps_morning_hours_to_slots() {
        let schedule = ServiceSchedule::default();
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(schedule.slot_at(at(7, 59)), None);
        assert_eq!(schedule.slot_at(at(8, 0)), Some(ServiceSlot::First));
        assert_eq!(schedule.slot_at(at(10, 0)), Some(ServiceSlot::Second));
        assert_eq!(schedule.slot_at(at(13, 59)), Some(ServiceSlot::Third));
        assert_eq!(schedule.slot_at(at(14, 0)), None);
    }
}
