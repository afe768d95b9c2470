use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Balances, Cents, ParticipantId};

/// A single peer-to-peer payment that settles part of a debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Debtor (pays)
    pub from: ParticipantId,
    /// Creditor (receives)
    pub to: ParticipantId,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
}

/// Balances together with the payments that settle them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub balances: Balances,
    pub payments: Vec<Payment>,
}

impl Settlement {
    pub fn from_balances(balances: Balances) -> Self {
        let payments = compute_settlement(&balances);
        Self { balances, payments }
    }
}

/// Open position of one side of the matching, in positive cents.
#[derive(Debug, Clone, Copy)]
struct Position {
    participant: ParticipantId,
    remaining: Cents,
}

/// Partition balances into debtors and creditors, each sorted ascending by amount.
/// The sort is stable over id order, so ties resolve to the lower participant id.
fn open_positions(balances: &Balances) -> (Vec<Position>, Vec<Position>) {
    let mut debtors: Vec<Position> = balances
        .iter()
        .filter(|(_, amount)| **amount < 0)
        .map(|(id, amount)| Position {
            participant: *id,
            remaining: -amount,
        })
        .collect();
    let mut creditors: Vec<Position> = balances
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(id, amount)| Position {
            participant: *id,
            remaining: *amount,
        })
        .collect();

    debtors.sort_by_key(|p| p.remaining);
    creditors.sort_by_key(|p| p.remaining);
    (debtors, creditors)
}

/// Compute the payments that bring every balance to zero.
///
/// Debtors and creditors are matched greedily with two cursors, smallest
/// amounts first. Each step pays `min(debt, credit)` and advances whichever
/// side is exhausted. The input balances are left untouched.
pub fn compute_settlement(balances: &Balances) -> Vec<Payment> {
    let (mut debtors, mut creditors) = open_positions(balances);
    let mut payments = Vec::new();
    let (mut i, mut j) = (0, 0);

    while let (Some(debtor), Some(creditor)) = (debtors.get_mut(i), creditors.get_mut(j)) {
        let pay = debtor.remaining.min(creditor.remaining);
        if pay > 0 {
            payments.push(Payment {
                from: debtor.participant,
                to: creditor.participant,
                amount_cents: pay,
            });
        }

        debtor.remaining -= pay;
        creditor.remaining -= pay;
        if debtor.remaining == 0 {
            i += 1;
        }
        if creditor.remaining == 0 {
            j += 1;
        }
    }

    let unmatched: Cents = debtors[i..]
        .iter()
        .chain(&creditors[j..])
        .map(|p| p.remaining)
        .fold(0, Cents::saturating_add);
    if unmatched != 0 {
        warn!(
            unmatched_cents = unmatched,
            "balances do not sum to zero; settlement left positions open"
        );
    }

    payments
}

/// Apply payments to balances: each payment raises the debtor and lowers the
/// creditor by the paid amount. Settling a ledger this way yields all zeros.
pub fn apply_payments(balances: &Balances, payments: &[Payment]) -> Balances {
    let mut result = balances.clone();
    for payment in payments {
        *result.entry(payment.from).or_insert(0) += payment.amount_cents;
        *result.entry(payment.to).or_insert(0) -= payment.amount_cents;
    }
    result
}
