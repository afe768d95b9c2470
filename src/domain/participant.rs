use serde::{Deserialize, Serialize};

use super::EventId;

/// Participant ids are assigned by storage and are unique across the database.
pub type ParticipantId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub event_id: EventId,
    pub name: String,
}
