use chrono::NaiveDateTime;
use diesel::sql_types::BigInt;
use serde_json;
use std::fmt;
use std::str::FromStr;

use models::event::{Event, EventId, EventPayload};
use schema::event_store;

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, PartialEq, Eq, FromStr, Display)]
#[sql_type = "BigInt"]
pub struct EventEntryId(i64);
newtype_from_to_sql!(BigInt, EventEntryId, EventEntryId);

impl EventEntryId {
    pub fn new(id: i64) -> Self {
        EventEntryId(id)
    }

    pub fn inner(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub id: EventEntryId,
    pub event: Event,
    pub status: EventStatus,
    pub attempt_count: u32,
    pub scheduled_on: Option<NaiveDateTime>,
    pub status_updated_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse event status")]
pub struct ParseEventStatusError;

impl FromStr for EventStatus {
    type Err = ParseEventStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "in_progress" => Ok(EventStatus::InProgress),
            "completed" => Ok(EventStatus::Completed),
            "failed" => Ok(EventStatus::Failed),
            _ => Err(ParseEventStatusError),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EventStatus::Pending => "pending",
            EventStatus::InProgress => "in_progress",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, QueryableByName)]
#[table_name = "event_store"]
pub struct RawEventEntry {
    pub id: EventEntryId,
    pub event_id: EventId,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub scheduled_on: Option<NaiveDateTime>,
    pub status_updated_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Fail)]
pub enum RawEventEntryError {
    #[fail(display = "failed to deserialize event payload")]
    InvalidPayloadJson(serde_json::Error),
    #[fail(display = "invalid event status")]
    InvalidStatus,
}

impl RawEventEntry {
    pub fn try_into_event_entry(self) -> Result<EventEntry, RawEventEntryError> {
        let RawEventEntry {
            id,
            event_id,
            payload,
            status,
            attempt_count,
            scheduled_on,
            status_updated_at,
            created_at,
        } = self;

        let payload = match serde_json::from_value::<EventPayload>(payload) {
            Ok(payload) => payload,
            Err(e) => {
                return Err(RawEventEntryError::InvalidPayloadJson(e));
            }
        };

        let status = match EventStatus::from_str(&status) {
            Ok(status) => status,
            Err(_) => {
                return Err(RawEventEntryError::InvalidStatus);
            }
        };

        Ok(EventEntry {
            id,
            event: Event { id: event_id, payload },
            status,
            attempt_count: attempt_count as u32,
            scheduled_on,
            status_updated_at,
            created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[table_name = "event_store"]
pub struct RawNewEventEntry {
    pub event_id: EventId,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub scheduled_on: Option<NaiveDateTime>,
}

impl RawNewEventEntry {
    pub fn try_from_event(event: Event) -> Result<Self, serde_json::Error> {
        serde_json::to_value(&event.payload).map(|payload| Self {
            event_id: event.id,
            payload,
            status: EventStatus::Pending.to_string(),
            attempt_count: 0,
            scheduled_on: None,
        })
    }

    pub fn try_from_event_scheduled_on(event: Event, scheduled_on: NaiveDateTime) -> Result<Self, serde_json::Error> {
        serde_json::to_value(&event.payload).map(|payload| Self {
            event_id: event.id,
            payload,
            status: EventStatus::Pending.to_string(),
            attempt_count: 0,
            scheduled_on: Some(scheduled_on),
        })
    }
}
