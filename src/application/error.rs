use thiserror::Error;

use crate::domain::{BalanceOverflow, EventId, ExpenseId, ParticipantId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Participant already exists in this event: {0}")]
    ParticipantAlreadyExists(String),

    #[error("Name required")]
    NameRequired,

    #[error("Cannot delete participant who paid an expense.")]
    ParticipantHasPaid(ParticipantId),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("paid_by participant not found in event: {0}")]
    PayerNotFound(ParticipantId),

    #[error("One or more participants invalid for this event: {0:?}")]
    InvalidParticipants(Vec<ParticipantId>),

    #[error("Cannot settle event: {0}")]
    BalanceOverflow(#[from] BalanceOverflow),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
