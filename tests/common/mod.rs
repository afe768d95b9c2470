// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use divvy::application::{EventService, NewExpense};
use divvy::domain::{Cents, Event, Expense, ParticipantId};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(EventService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = EventService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: an event with named participants
pub struct Trip {
    pub event: Event,
    pub ids: Vec<ParticipantId>,
}

impl Trip {
    /// Create an event and add participants in order
    pub async fn create(service: &EventService, names: &[&str]) -> Result<Self> {
        let event = service.create_event("Trip", "EUR").await?;
        let mut ids = Vec::new();
        for name in names {
            ids.push(service.add_participant(&event.id, name).await?.id);
        }
        Ok(Self { event, ids })
    }

    /// Record an expense paid by `payer` (index into `ids`) for the given indexes
    pub async fn pay(
        &self,
        service: &EventService,
        amount_cents: Cents,
        payer: usize,
        beneficiaries: &[usize],
    ) -> Result<Expense> {
        let expense = service
            .add_expense(
                &self.event.id,
                NewExpense {
                    title: None,
                    amount_cents,
                    paid_by: self.ids[payer],
                    beneficiaries: beneficiaries.iter().map(|i| self.ids[*i]).collect(),
                },
            )
            .await?;
        Ok(expense)
    }
}
