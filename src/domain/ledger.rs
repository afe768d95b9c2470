use std::collections::BTreeMap;
use std::fmt;

use super::{Cents, Expense, ParticipantId};

/// Net balance per participant: positive is owed money, negative owes money.
/// Keyed by id so iteration order never depends on how the map was built.
pub type Balances = BTreeMap<ParticipantId, Cents>;

/// Split an amount into `count` shares that sum to exactly `amount_cents`.
/// The first `amount_cents mod count` shares carry one extra cent.
pub fn split_shares(amount_cents: Cents, count: usize) -> Vec<Cents> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as Cents;
    let share = amount_cents.div_euclid(n);
    let remainder = amount_cents.rem_euclid(n) as usize;

    (0..count)
        .map(|i| if i < remainder { share + 1 } else { share })
        .collect()
}

/// Fold expenses into per-participant net balances.
///
/// Every participant starts at zero, so inactive ones still show up. For each
/// expense the payer is credited the full amount and each beneficiary is debited
/// their share in the order given. Expenses without beneficiaries are skipped.
///
/// Every balance stays within `Cents::MIN + 1..=Cents::MAX`, so it can
/// always be negated. A running balance that would leave that range fails the
/// whole computation with [`BalanceOverflow`].
pub fn compute_balances<P>(
    participants: P,
    expenses: &[Expense],
) -> Result<Balances, BalanceOverflow>
where
    P: IntoIterator<Item = ParticipantId>,
{
    let mut balances: Balances = participants.into_iter().map(|id| (id, 0)).collect();

    for expense in expenses {
        if expense.beneficiaries.is_empty() {
            continue;
        }
        let shares = split_shares(expense.amount_cents, expense.beneficiaries.len());
        for (beneficiary, owed) in expense.beneficiaries.iter().zip(shares) {
            adjust(&mut balances, *beneficiary, |b| b.checked_sub(owed))?;
        }
        adjust(&mut balances, expense.paid_by, |b| b.checked_add(expense.amount_cents))?;
    }

    Ok(balances)
}

fn adjust(
    balances: &mut Balances,
    participant: ParticipantId,
    op: impl FnOnce(Cents) -> Option<Cents>,
) -> Result<(), BalanceOverflow> {
    let balance = balances.entry(participant).or_insert(0);
    *balance = op(*balance)
        .filter(|b| *b != Cents::MIN)
        .ok_or(BalanceOverflow { participant })?;
    Ok(())
}

/// A participant's running balance left the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceOverflow {
    pub participant: ParticipantId,
}

impl fmt::Display for BalanceOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "balance of participant {} is out of range", self.participant)
    }
}

impl std::error::Error for BalanceOverflow {}

/// Sum of all balances. Zero for any ledger built by `compute_balances`.
pub fn total_balance(balances: &Balances) -> Cents {
    balances.values().sum()
}
