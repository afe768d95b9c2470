use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EventId = String;

pub const DEFAULT_EVENT_NAME: &str = "New Event";
pub const DEFAULT_CURRENCY: &str = "UAH";

/// A bounded group-expense session with its own participants and expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Short identifier, the first 8 hex digits of a random UUID
    pub id: EventId,
    pub name: String,
    /// Display currency code. All amounts of an event share it.
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        let name = name.into();
        let currency = currency.into();
        Self {
            id: short_id(),
            name: non_blank_or(name, DEFAULT_EVENT_NAME),
            currency: non_blank_or(currency, DEFAULT_CURRENCY),
            created_at: Utc::now(),
        }
    }
}

fn short_id() -> EventId {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn non_blank_or(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}
