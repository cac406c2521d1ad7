use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const SECONDARY_DB_LOADED_EVENT_NAME: &str = "SecondaryDbLoadedEvent";
pub const CURRENT_YEAR_EVENT_NAME: &str = "CurrentYearEvent";
pub const DISCIPLINE_EVENT_NAME: &str = "DisciplineEvent";

/// Announces that the secondary database was reloaded from the primary one,
/// covering changes made between the two timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryDbLoadedEvent {
    pub previous_secondary_database_datetime: DateTime<FixedOffset>,
    pub current_secondary_database_datetime: DateTime<FixedOffset>,
    pub year: i32,
}

/// Announces the academic year that is now current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentYearEvent {
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    SecondaryDbLoaded(SecondaryDbLoadedEvent),
    CurrentYearAnnounced(CurrentYearEvent),
    Other,
}

impl ControlEvent {
    /// Pick the variant from the message key and decode the payload for it.
    /// Keys we don't act on become `Other` without looking at the payload.
    pub fn parse(key: &str, payload: Option<&[u8]>) -> Result<Self, serde_json::Error> {
        let payload = payload.unwrap_or_default();
        match key {
            SECONDARY_DB_LOADED_EVENT_NAME => {
                serde_json::from_slice(payload).map(ControlEvent::SecondaryDbLoaded)
            }
            CURRENT_YEAR_EVENT_NAME => {
                serde_json::from_slice(payload).map(ControlEvent::CurrentYearAnnounced)
            }
            _ => Ok(ControlEvent::Other),
        }
    }
}

/// One discipline, as published on the outbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineEvent {
    pub id: i32,
    pub name: String,
    pub year: i32,
}
