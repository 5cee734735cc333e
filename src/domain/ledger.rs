//! Ledger domain types and balance arithmetic.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(EntryType::Credit),
            "debit" => Some(EntryType::Debit),
            _ => None,
        }
    }
}

/// Immutable append-only movement record. `running_balance` is the owner's
/// balance after this entry was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_type: EntryType,
    pub description: String,
    /// Positive magnitude; the sign lives in `entry_type`.
    pub amount: BigDecimal,
    pub running_balance: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Balance after applying one entry to the previous running balance.
///
/// Credits are a plain sum even when the previous balance is negative: an
/// earlier revision special-cased the negative branch as "offset toward
/// zero", which computes the same value for every sign, so the branches were
/// collapsed. Debits have no floor; an owner's balance may go negative.
pub fn next_balance(prev: &BigDecimal, entry_type: EntryType, amount: &BigDecimal) -> BigDecimal {
    match entry_type {
        EntryType::Credit => prev + amount,
        EntryType::Debit => prev - amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_credit_adds() {
        assert_eq!(
            next_balance(&dec("100"), EntryType::Credit, &dec("25.50")),
            dec("125.50")
        );
    }

    #[test]
    fn test_credit_offsets_negative_balance() {
        // Same arithmetic as the positive case: -40 + 100 = 60.
        assert_eq!(
            next_balance(&dec("-40"), EntryType::Credit, &dec("100")),
            dec("60")
        );
    }

    #[test]
    fn test_debit_subtracts_without_floor() {
        assert_eq!(
            next_balance(&dec("10"), EntryType::Debit, &dec("35")),
            dec("-25")
        );
    }

    #[test]
    fn test_running_balance_is_signed_sum_in_order() {
        let mut balance = BigDecimal::from(0);
        let moves = [
            (EntryType::Credit, "1000"),
            (EntryType::Debit, "350.25"),
            (EntryType::Debit, "800"),
            (EntryType::Credit, "150.25"),
        ];
        for (entry_type, amount) in moves {
            balance = next_balance(&balance, entry_type, &dec(amount));
        }
        assert_eq!(balance, dec("0"));
    }
}
