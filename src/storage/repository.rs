use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::{Event, Expense, ExpenseId, Participant, ParticipantId};

use super::MIGRATION_001_INITIAL;

/// A consistent read of one event: its participants and expenses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub event: Event,
    /// Ordered by id
    pub participants: Vec<Participant>,
    /// Ordered by id, beneficiaries in the order they were recorded
    pub expenses: Vec<Expense>,
}

impl EventSnapshot {
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id).collect()
    }

    pub fn participant_names(&self) -> HashMap<ParticipantId, String> {
        self.participants
            .iter()
            .map(|p| (p.id, p.name.clone()))
            .collect()
    }
}

/// Repository for persisting and querying events, participants and expenses.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Event operations
    // ========================

    /// Save a new event.
    pub async fn save_event(&self, event: &Event) -> Result<()> {
        sqlx::query("INSERT INTO events (id, name, currency, created_at) VALUES (?, ?, ?, ?)")
            .bind(&event.id)
            .bind(&event.name)
            .bind(&event.currency)
            .bind(event.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save event")?;
        Ok(())
    }

    /// Get an event by id.
    pub async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_event(&mut conn, id).await
    }

    /// List all events, newest first.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            "SELECT id, name, currency, created_at FROM events ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list events")?;

        rows.iter().map(Self::row_to_event).collect()
    }

    /// Delete an event together with its participants and expenses.
    pub async fn delete_event(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM expense_participants WHERE expense_id IN (SELECT id FROM expenses WHERE event_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete expense participants")?;
        sqlx::query("DELETE FROM expenses WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expenses")?;
        sqlx::query("DELETE FROM participants WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete participants")?;
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete event")?;
        tx.commit().await.context("Failed to commit event deletion")?;
        Ok(())
    }

    /// Load an event with its participants and expenses in a single transaction.
    pub async fn load_snapshot(&self, event_id: &str) -> Result<Option<EventSnapshot>> {
        let mut tx = self.pool.begin().await?;

        let Some(event) = Self::fetch_event(&mut tx, event_id).await? else {
            return Ok(None);
        };
        let participants = Self::fetch_participants(&mut tx, event_id).await?;
        let expenses = Self::fetch_expenses(&mut tx, event_id).await?;

        tx.commit().await.context("Failed to close snapshot")?;
        Ok(Some(EventSnapshot {
            event,
            participants,
            expenses,
        }))
    }

    async fn fetch_event(conn: &mut SqliteConnection, id: &str) -> Result<Option<Event>> {
        let row = sqlx::query("SELECT id, name, currency, created_at FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch event")?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event> {
        let created_at_str: String = row.get("created_at");
        Ok(Event {
            id: row.get("id"),
            name: row.get("name"),
            currency: row.get("currency"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Participant operations
    // ========================

    /// Add a participant to an event. The id is assigned by the database.
    pub async fn add_participant(&self, event_id: &str, name: &str) -> Result<Participant> {
        let row = sqlx::query(
            "INSERT INTO participants (event_id, name) VALUES (?, ?) RETURNING id, event_id, name",
        )
        .bind(event_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to add participant")?;

        Ok(Self::row_to_participant(&row))
    }

    /// Get a participant by id, scoped to an event.
    pub async fn get_participant(
        &self,
        event_id: &str,
        id: ParticipantId,
    ) -> Result<Option<Participant>> {
        let row =
            sqlx::query("SELECT id, event_id, name FROM participants WHERE id = ? AND event_id = ?")
                .bind(id)
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch participant")?;

        Ok(row.as_ref().map(Self::row_to_participant))
    }

    /// List participants of an event, ordered by id.
    pub async fn list_participants(&self, event_id: &str) -> Result<Vec<Participant>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_participants(&mut conn, event_id).await
    }

    /// Delete a participant who never paid an expense and drop them from every
    /// expense they shared. Returns false, leaving everything in place, when
    /// the participant has paid or no longer exists.
    pub async fn delete_participant(&self, id: ParticipantId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query(
            "DELETE FROM participants WHERE id = ? \
             AND NOT EXISTS (SELECT 1 FROM expenses WHERE paid_by = ?)",
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete participant")?;

        if deleted.rows_affected() == 0 {
            tx.rollback()
                .await
                .context("Failed to roll back participant deletion")?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM expense_participants WHERE participant_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete participant shares")?;
        tx.commit()
            .await
            .context("Failed to commit participant deletion")?;
        Ok(true)
    }

    async fn fetch_participants(
        conn: &mut SqliteConnection,
        event_id: &str,
    ) -> Result<Vec<Participant>> {
        let rows =
            sqlx::query("SELECT id, event_id, name FROM participants WHERE event_id = ? ORDER BY id")
                .bind(event_id)
                .fetch_all(&mut *conn)
                .await
                .context("Failed to list participants")?;

        Ok(rows.iter().map(Self::row_to_participant).collect())
    }

    fn row_to_participant(row: &sqlx::sqlite::SqliteRow) -> Participant {
        Participant {
            id: row.get("id"),
            event_id: row.get("event_id"),
            name: row.get("name"),
        }
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense and its beneficiaries. Assigns the expense id.
    pub async fn save_expense(&self, expense: &mut Expense) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO expenses (event_id, title, amount_cents, paid_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&expense.event_id)
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(expense.paid_by)
        .bind(expense.created_at.to_rfc3339())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to save expense")?;
        let expense_id: ExpenseId = row.get("id");

        for (position, participant_id) in expense.beneficiaries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO expense_participants (expense_id, participant_id, position) VALUES (?, ?, ?)",
            )
            .bind(expense_id)
            .bind(*participant_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .context("Failed to save expense participant")?;
        }

        tx.commit().await.context("Failed to commit expense")?;
        expense.id = expense_id;
        Ok(())
    }

    /// Get an expense by id, scoped to an event.
    pub async fn get_expense(&self, event_id: &str, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, event_id, title, amount_cents, paid_by, created_at
            FROM expenses
            WHERE id = ? AND event_id = ?
            "#,
        )
        .bind(id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut expense = Self::row_to_expense(&row)?;

        let rows = sqlx::query(
            "SELECT participant_id FROM expense_participants WHERE expense_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch expense participants")?;
        expense.beneficiaries = rows.iter().map(|r| r.get("participant_id")).collect();

        Ok(Some(expense))
    }

    /// List expenses of an event, ordered by id.
    pub async fn list_expenses(&self, event_id: &str) -> Result<Vec<Expense>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_expenses(&mut conn, event_id).await
    }

    /// Delete an expense and its beneficiary rows.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM expense_participants WHERE expense_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense participants")?;
        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?;
        tx.commit().await.context("Failed to commit expense deletion")?;
        Ok(())
    }

    async fn fetch_expenses(conn: &mut SqliteConnection, event_id: &str) -> Result<Vec<Expense>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, title, amount_cents, paid_by, created_at
            FROM expenses
            WHERE event_id = ?
            ORDER BY id
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list expenses")?;

        let mut expenses = rows
            .iter()
            .map(Self::row_to_expense)
            .collect::<Result<Vec<_>>>()?;

        // One query for every beneficiary of the event, grouped afterwards
        let share_rows = sqlx::query(
            r#"
            SELECT ep.expense_id, ep.participant_id
            FROM expense_participants ep
            JOIN expenses e ON e.id = ep.expense_id
            WHERE e.event_id = ?
            ORDER BY ep.expense_id, ep.position
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list expense participants")?;

        let mut beneficiaries: HashMap<ExpenseId, Vec<ParticipantId>> = HashMap::new();
        for row in share_rows {
            beneficiaries
                .entry(row.get("expense_id"))
                .or_default()
                .push(row.get("participant_id"));
        }
        for expense in &mut expenses {
            expense.beneficiaries = beneficiaries.remove(&expense.id).unwrap_or_default();
        }

        Ok(expenses)
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let created_at_str: String = row.get("created_at");
        Ok(Expense {
            id: row.get("id"),
            event_id: row.get("event_id"),
            title: row.get("title"),
            amount_cents: row.get("amount_cents"),
            paid_by: row.get("paid_by"),
            beneficiaries: Vec::new(),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
