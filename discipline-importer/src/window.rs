use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use tracing::{info, warn};

use crate::metrics_consts::CONTROL_EVENTS_RECEIVED;
use crate::types::ControlEvent;

/// The registration-date range one import covers, both ends inclusive.
///
/// Bounds are wall-clock times, compared as-is against the legacy store's
/// zone-less registration column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub year: i32,
}

impl ImportWindow {
    /// Map a decoded control event to the window it asks for. `None` means
    /// the event does not call for an import, or its window cannot be
    /// represented.
    pub fn from_event(event: ControlEvent, now: DateTime<Local>) -> Option<Self> {
        match event {
            // Taken in the payload's own offset, never shifted to ours
            ControlEvent::SecondaryDbLoaded(event) => Some(Self {
                start: event.previous_secondary_database_datetime.naive_local(),
                end: event.current_secondary_database_datetime.naive_local(),
                year: event.year,
            }),
            // A new academic year reimports everything since August 1st two
            // years back. The end is pinned to the hour so a redelivered
            // event covers the same range.
            ControlEvent::CurrentYearAnnounced(event) => Some(Self {
                start: NaiveDate::from_ymd_opt(event.year.checked_sub(2)?, 8, 1)?
                    .and_hms_opt(0, 0, 0)?,
                end: truncate_to_hour(now.naive_local())?,
                year: event.year,
            }),
            ControlEvent::Other => None,
        }
    }
}

fn truncate_to_hour(now: NaiveDateTime) -> Option<NaiveDateTime> {
    now.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

/// Resolve an inbound message into an import window.
///
/// Unknown keys and payloads that fail to decode both resolve to `None`;
/// they are told apart only in logs and the `outcome` metric label.
pub fn resolve_window(
    key: &str,
    payload: Option<&[u8]>,
    now: DateTime<Local>,
) -> Option<ImportWindow> {
    let event = match ControlEvent::parse(key, payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(key, "Failed to decode control event payload: {}", e);
            metrics::counter!(CONTROL_EVENTS_RECEIVED, "outcome" => "malformed").increment(1);
            return None;
        }
    };

    let recognized = !matches!(event, ControlEvent::Other);
    let window = ImportWindow::from_event(event, now);
    match &window {
        Some(window) => {
            info!(
                key,
                start = %window.start,
                end = %window.end,
                year = window.year,
                "Resolved import window"
            );
            metrics::counter!(CONTROL_EVENTS_RECEIVED, "outcome" => "import").increment(1);
        }
        None if recognized => {
            warn!(key, "Control event asks for a window outside the calendar");
            metrics::counter!(CONTROL_EVENTS_RECEIVED, "outcome" => "unrepresentable")
                .increment(1);
        }
        None => {
            info!(key, "Control event does not call for an import");
            metrics::counter!(CONTROL_EVENTS_RECEIVED, "outcome" => "ignored").increment(1);
        }
    }
    window
}
