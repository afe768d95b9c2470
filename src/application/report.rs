use serde::Serialize;

use crate::domain::{
    BalanceOverflow, Cents, ParticipantId, Settlement, compute_balances, format_cents,
};
use crate::storage::EventSnapshot;

/// Settlement of one event, rendered for display and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub currency: String,
    /// One line per participant, ordered by participant id
    pub balances: Vec<BalanceLine>,
    /// Payments in the order the reducer emitted them
    pub transfers: Vec<TransferLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceLine {
    pub participant_id: ParticipantId,
    pub name: String,
    /// Two-decimal display amount
    pub balance: String,
    #[serde(skip)]
    pub balance_cents: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferLine {
    pub from: String,
    pub to: String,
    pub amount: String,
    #[serde(skip)]
    pub from_id: ParticipantId,
    #[serde(skip)]
    pub to_id: ParticipantId,
    #[serde(skip)]
    pub amount_cents: Cents,
}

impl SettlementReport {
    /// Run both core computations over a snapshot and render the result.
    pub fn from_snapshot(snapshot: &EventSnapshot) -> Result<Self, BalanceOverflow> {
        let balances = compute_balances(snapshot.participant_ids(), &snapshot.expenses)?;
        let settlement = Settlement::from_balances(balances);
        Ok(Self::render(snapshot, &settlement))
    }

    fn render(snapshot: &EventSnapshot, settlement: &Settlement) -> Self {
        let names = snapshot.participant_names();
        let name_of = |id: ParticipantId| names.get(&id).cloned().unwrap_or_else(|| "?".into());

        let balances = settlement
            .balances
            .iter()
            .map(|(id, cents)| BalanceLine {
                participant_id: *id,
                name: name_of(*id),
                balance: format_cents(*cents),
                balance_cents: *cents,
            })
            .collect();

        let transfers = settlement
            .payments
            .iter()
            .map(|p| TransferLine {
                from: name_of(p.from),
                to: name_of(p.to),
                amount: format_cents(p.amount_cents),
                from_id: p.from,
                to_id: p.to,
                amount_cents: p.amount_cents,
            })
            .collect();

        Self {
            currency: snapshot.event.currency.clone(),
            balances,
            transfers,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.transfers.is_empty()
    }
}
