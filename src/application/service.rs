use tracing::{debug, info};

use crate::domain::{
    Cents, Event, Expense, ExpenseId, MAX_AMOUNT_CENTS, Participant, ParticipantId, format_cents,
    split_shares,
};
use crate::storage::{EventSnapshot, Repository};

use super::{AppError, SettlementReport};

/// Application service providing the operations of the expense splitter.
/// This is the primary interface for any client (CLI, export, tests).
pub struct EventService {
    repo: Repository,
}

/// Input for recording an expense.
pub struct NewExpense {
    pub title: Option<String>,
    pub amount_cents: Cents,
    pub paid_by: ParticipantId,
    /// Empty means every current participant of the event
    pub beneficiaries: Vec<ParticipantId>,
}

/// An expense with each beneficiary's share resolved.
pub struct ExpenseInfo {
    pub expense: Expense,
    pub payer_name: String,
    /// (name, owed cents) in beneficiary order
    pub shares: Vec<(String, Cents)>,
}

impl EventService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Event operations
    // ========================

    /// Create a new event. Blank name and currency fall back to defaults.
    pub async fn create_event(&self, name: &str, currency: &str) -> Result<Event, AppError> {
        let event = Event::new(name, currency);
        self.repo.save_event(&event).await?;
        info!(event = %event.id, event_name = %event.name, "created event");
        Ok(event)
    }

    /// Get an event by id.
    pub async fn get_event(&self, event_id: &str) -> Result<Event, AppError> {
        self.repo
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))
    }

    /// List all events.
    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.repo.list_events().await?)
    }

    /// Delete an event with everything recorded in it.
    pub async fn delete_event(&self, event_id: &str) -> Result<Event, AppError> {
        let event = self.get_event(event_id).await?;
        self.repo.delete_event(event_id).await?;
        info!(event = %event.id, "deleted event");
        Ok(event)
    }

    /// Load an event with its participants and expenses.
    pub async fn event_detail(&self, event_id: &str) -> Result<EventSnapshot, AppError> {
        self.repo
            .load_snapshot(event_id)
            .await?
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))
    }

    // ========================
    // Participant operations
    // ========================

    /// Add a participant to an event.
    pub async fn add_participant(
        &self,
        event_id: &str,
        name: &str,
    ) -> Result<Participant, AppError> {
        self.get_event(event_id).await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::NameRequired);
        }

        let existing = self.repo.list_participants(event_id).await?;
        if existing.iter().any(|p| p.name == name) {
            return Err(AppError::ParticipantAlreadyExists(name.to_string()));
        }

        let participant = self.repo.add_participant(event_id, name).await?;
        info!(
            event = event_id,
            participant = participant.id,
            participant_name = name,
            "added participant"
        );
        Ok(participant)
    }

    /// List participants of an event.
    pub async fn list_participants(&self, event_id: &str) -> Result<Vec<Participant>, AppError> {
        self.get_event(event_id).await?;
        Ok(self.repo.list_participants(event_id).await?)
    }

    /// Remove a participant who never paid for anything.
    pub async fn remove_participant(
        &self,
        event_id: &str,
        participant_id: ParticipantId,
    ) -> Result<Participant, AppError> {
        let participant = self
            .repo
            .get_participant(event_id, participant_id)
            .await?
            .ok_or(AppError::ParticipantNotFound(participant_id))?;

        if !self.repo.delete_participant(participant_id).await? {
            return Err(AppError::ParticipantHasPaid(participant_id));
        }

        info!(event = event_id, participant = participant_id, "removed participant");
        Ok(participant)
    }

    // ========================
    // Expense operations
    // ========================

    /// Validate and record an expense.
    pub async fn add_expense(
        &self,
        event_id: &str,
        new_expense: NewExpense,
    ) -> Result<Expense, AppError> {
        self.get_event(event_id).await?;

        if new_expense.amount_cents <= 0 {
            return Err(AppError::InvalidAmount("Amount must be > 0".to_string()));
        }
        if new_expense.amount_cents > MAX_AMOUNT_CENTS {
            return Err(AppError::InvalidAmount(format!(
                "Amount must be <= {}",
                format_cents(MAX_AMOUNT_CENTS)
            )));
        }

        let participants = self.repo.list_participants(event_id).await?;
        let is_member = |id: ParticipantId| participants.iter().any(|p| p.id == id);

        if !is_member(new_expense.paid_by) {
            return Err(AppError::PayerNotFound(new_expense.paid_by));
        }

        let beneficiaries = if new_expense.beneficiaries.is_empty() {
            participants.iter().map(|p| p.id).collect()
        } else {
            dedup_preserving_order(new_expense.beneficiaries)
        };

        let invalid: Vec<ParticipantId> = beneficiaries
            .iter()
            .copied()
            .filter(|id| !is_member(*id))
            .collect();
        if !invalid.is_empty() {
            return Err(AppError::InvalidParticipants(invalid));
        }

        let mut expense = Expense::new(
            event_id.to_string(),
            new_expense.amount_cents,
            new_expense.paid_by,
            beneficiaries,
        );
        if let Some(title) = new_expense.title {
            expense = expense.with_title(title);
        }

        self.repo.save_expense(&mut expense).await?;
        info!(
            event = event_id,
            expense = expense.id,
            amount_cents = expense.amount_cents,
            paid_by = expense.paid_by,
            beneficiaries = expense.beneficiaries.len(),
            "recorded expense"
        );
        Ok(expense)
    }

    /// List expenses of an event.
    pub async fn list_expenses(&self, event_id: &str) -> Result<Vec<Expense>, AppError> {
        self.get_event(event_id).await?;
        Ok(self.repo.list_expenses(event_id).await?)
    }

    /// Get an expense with its per-beneficiary shares.
    pub async fn get_expense_info(
        &self,
        event_id: &str,
        expense_id: ExpenseId,
    ) -> Result<ExpenseInfo, AppError> {
        let expense = self
            .repo
            .get_expense(event_id, expense_id)
            .await?
            .ok_or(AppError::ExpenseNotFound(expense_id))?;
        let participants = self.repo.list_participants(event_id).await?;
        let name_of = |id: ParticipantId| {
            participants
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "?".to_string())
        };

        let shares = expense
            .beneficiaries
            .iter()
            .zip(split_shares(expense.amount_cents, expense.beneficiaries.len()))
            .map(|(id, owed)| (name_of(*id), owed))
            .collect();

        Ok(ExpenseInfo {
            payer_name: name_of(expense.paid_by),
            shares,
            expense,
        })
    }

    /// Remove an expense.
    pub async fn remove_expense(
        &self,
        event_id: &str,
        expense_id: ExpenseId,
    ) -> Result<Expense, AppError> {
        let expense = self
            .repo
            .get_expense(event_id, expense_id)
            .await?
            .ok_or(AppError::ExpenseNotFound(expense_id))?;

        self.repo.delete_expense(expense_id).await?;
        info!(event = event_id, expense = expense_id, "removed expense");
        Ok(expense)
    }

    // ========================
    // Settlement
    // ========================

    /// Compute balances and settling transfers from a consistent snapshot.
    pub async fn settle(&self, event_id: &str) -> Result<SettlementReport, AppError> {
        let snapshot = self.event_detail(event_id).await?;
        let report = SettlementReport::from_snapshot(&snapshot)?;
        debug!(
            event = event_id,
            participants = snapshot.participants.len(),
            expenses = snapshot.expenses.len(),
            transfers = report.transfers.len(),
            "computed settlement"
        );
        Ok(report)
    }
}

fn dedup_preserving_order(ids: Vec<ParticipantId>) -> Vec<ParticipantId> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
