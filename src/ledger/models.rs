use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Match lifecycle status - driven by ingestion up to Completed,
/// by the settlement engine afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
    Cancelled,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Upcoming => "upcoming",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Bet status enum
///
/// Critical INVARIANT: Pending -> {Won, Lost, Void} is one-way and
/// exactly-once. Every terminal transition goes through a conditional
/// UPDATE guarded on status = 'pending'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "bet_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
    Cancelled,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

/// How a match was won (cricket margin types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "win_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WinType {
    Runs,
    Wickets,
    Innings,
    SuperOver,
}

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "entry_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    BetWin,
    BetRefund,
    Commission,
}

/// Agent hierarchy tier, leaf to root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "agent_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Agent,
    Master,
    SuperMaster,
}

/// Winner sentinel recorded on a drawn match; bets selecting it win,
/// bets on either team lose.
pub const DRAW_SENTINEL: &str = "DRAW";

/// Match entity - a real-world contest bets are placed against.
/// Created by ingestion, mutated by this engine, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub team1: String,
    pub team2: String,
    pub status: MatchStatus,
    pub winner: Option<String>,
    pub win_type: Option<WinType>,
    pub win_margin: Option<i32>,
    pub is_settled: bool,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// A match the result sweep should be trying to resolve
    pub fn needs_resolution(&self) -> bool {
        self.status == MatchStatus::Completed && self.winner.is_none() && !self.is_settled
    }

    /// Minutes elapsed since the scheduled end
    pub fn minutes_since_end(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.ends_at).num_minutes()
    }
}

/// Bet entity - a stake on a selection at a price
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bet {
    pub id: Uuid,
    pub account_id: Uuid,
    pub match_id: Uuid,
    pub fancy_market_id: Option<Uuid>,
    pub selection: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub stake: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub potential_payout: Decimal,
    pub status: BetStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub actual_payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Bet {
    pub fn is_open(&self) -> bool {
        self.status == BetStatus::Pending
    }

    pub fn is_fancy(&self) -> bool {
        self.fancy_market_id.is_some()
    }
}

/// Fancy (session) market entity - threshold-style side market on a match
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FancyMarket {
    pub id: Uuid,
    pub match_id: Uuid,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub no_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub yes_value: Decimal,
    pub suspended: bool,
    pub active: bool,
    pub settled: bool,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub result_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Player account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    /// Referring agent - the root of the commission chain
    pub agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agent entity - at most one parent, at most three tiers deep
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub username: String,
    pub agent_type: AgentType,
    pub parent_id: Option<Uuid>,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry - immutable, append-only record of a balance mutation.
///
/// Core invariant: balance_after == balance_before + amount, and the
/// latest entry's balance_after equals the account's current balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_before: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_after: Decimal,
    pub bet_id: Option<Uuid>,
    pub match_id: Option<Uuid>,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Commission record - one per credited agent tier of a winning bet
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommissionRecord {
    pub id: Uuid,
    pub bet_id: Uuid,
    pub agent_id: Uuid,
    pub tier: i16,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub basis_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Row landed by the odds-feed ingestion pipeline; read by the
/// third result source as an internal side channel
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedResult {
    pub id: Uuid,
    pub team1: String,
    pub team2: String,
    pub status_text: String,
    pub ended: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_match(status: MatchStatus, winner: Option<&str>, settled: bool) -> Match {
        Match {
            id: Uuid::new_v4(),
            team1: "India".to_string(),
            team2: "Australia".to_string(),
            status,
            winner: winner.map(|w| w.to_string()),
            win_type: None,
            win_margin: None,
            is_settled: settled,
            ends_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_needs_resolution() {
        assert!(sample_match(MatchStatus::Completed, None, false).needs_resolution());
        assert!(!sample_match(MatchStatus::Live, None, false).needs_resolution());
        assert!(!sample_match(MatchStatus::Completed, Some("India"), false).needs_resolution());
        assert!(!sample_match(MatchStatus::Completed, None, true).needs_resolution());
    }

    #[test]
    fn test_bet_status_terminal() {
        assert!(!BetStatus::Pending.is_terminal());
        assert!(BetStatus::Won.is_terminal());
        assert!(BetStatus::Void.is_terminal());
        assert!(BetStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_minutes_since_end() {
        let mut m = sample_match(MatchStatus::Completed, None, false);
        let now = Utc::now();
        m.ends_at = now - chrono::Duration::minutes(65);
        assert_eq!(m.minutes_since_end(now), 65);

        m.ends_at = now + chrono::Duration::minutes(10);
        assert!(m.minutes_since_end(now) < 0);
    }

    #[test]
    fn test_bet_helpers() {
        let bet = Bet {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            fancy_market_id: None,
            selection: "India".to_string(),
            stake: dec!(100),
            price: dec!(1.85),
            potential_payout: dec!(185),
            status: BetStatus::Pending,
            actual_payout: dec!(0),
            settled_at: None,
            created_at: Utc::now(),
        };
        assert!(bet.is_open());
        assert!(!bet.is_fancy());
    }
}
