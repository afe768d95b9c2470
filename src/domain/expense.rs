use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, EventId, ParticipantId};

pub type ExpenseId = i64;

pub const DEFAULT_EXPENSE_TITLE: &str = "Expense";

/// An expense paid by one participant on behalf of an ordered set of beneficiaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub event_id: EventId,
    pub title: String,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    /// Participant who paid
    pub paid_by: ParticipantId,
    /// Participants sharing the cost. Order decides who absorbs the remainder cents.
    pub beneficiaries: Vec<ParticipantId>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Create a new expense. The id must be assigned by the repository.
    pub fn new(
        event_id: EventId,
        amount_cents: Cents,
        paid_by: ParticipantId,
        beneficiaries: Vec<ParticipantId>,
    ) -> Self {
        assert!(amount_cents > 0, "Expense amount must be positive");
        Self {
            id: 0, // Will be set by repository
            event_id,
            title: DEFAULT_EXPENSE_TITLE.to_string(),
            amount_cents,
            paid_by,
            beneficiaries,
            created_at: Utc::now(),
        }
    }

    /// Set the title; blank titles keep the default.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            self.title = trimmed.to_string();
        }
        self
    }
}
