//! Outcome & Ledger Applier - converts a settlement directive into
//! irreversible financial state, one bet at a time.
//!
//! Every bet is settled inside its own transaction: the conditional
//! status transition, the balance mutation and the ledger entry either
//! all land or none do. A failure on one bet never aborts the rest of
//! the batch; failures are collected and reported.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::models::{Bet, BetStatus, EntryType};
use crate::ledger::LedgerRepository;
use crate::settlement::commission::CommissionEngine;

/// What to settle a batch of bets against
#[derive(Debug, Clone)]
pub enum SettlementDirective {
    /// Canonical winner (team name or the DRAW sentinel); selections
    /// compare by simple equality
    Winner { name: String },
    /// Refund stakes (no-result, tie, stale backstop, admin void)
    Void { reason: String },
    /// Declared fancy value; selections are directional threshold claims
    FancyResult { value: Decimal },
}

/// Per-bet decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetResolution {
    Won,
    Lost,
    Void,
}

/// Directional claim encoded in a fancy bet's selection, e.g. "ABOVE 35"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDirection {
    Above,
    Below,
}

/// Parse a fancy selection of the form "(ABOVE|BELOW) <threshold>"
pub fn parse_claim(selection: &str) -> Option<(ClaimDirection, Decimal)> {
    let mut parts = selection.split_whitespace();
    let direction = match parts.next()?.to_ascii_uppercase().as_str() {
        "ABOVE" => ClaimDirection::Above,
        "BELOW" => ClaimDirection::Below,
        _ => return None,
    };
    let threshold = Decimal::from_str(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((direction, threshold))
}

/// Decide win/loss/void for one bet under a directive. Pure; the
/// invalid-claim case surfaces as an error the applier downgrades to a
/// refund.
pub fn decide(bet: &Bet, directive: &SettlementDirective) -> Result<BetResolution, SettlementError> {
    match directive {
        SettlementDirective::Winner { name } => {
            if bet.selection.eq_ignore_ascii_case(name) {
                Ok(BetResolution::Won)
            } else {
                Ok(BetResolution::Lost)
            }
        }
        SettlementDirective::Void { .. } => Ok(BetResolution::Void),
        SettlementDirective::FancyResult { value } => match parse_claim(&bet.selection) {
            Some((ClaimDirection::Above, threshold)) => {
                if *value >= threshold {
                    Ok(BetResolution::Won)
                } else {
                    Ok(BetResolution::Lost)
                }
            }
            Some((ClaimDirection::Below, threshold)) => {
                if *value < threshold {
                    Ok(BetResolution::Won)
                } else {
                    Ok(BetResolution::Lost)
                }
            }
            None => Err(SettlementError::InvalidClaim {
                bet_id: bet.id,
                claim: bet.selection.clone(),
            }),
        },
    }
}

/// The full financial effect of one resolution: terminal status, the
/// actual_payout to record, and the account credit (entry type and
/// amount) if any. Won pays the precomputed potential payout; Void
/// refunds exactly the stake; Lost moves no money.
pub fn settlement_effect(
    bet: &Bet,
    resolution: BetResolution,
) -> (BetStatus, Decimal, Option<(EntryType, Decimal)>) {
    match resolution {
        BetResolution::Won => (
            BetStatus::Won,
            bet.potential_payout,
            Some((EntryType::BetWin, bet.potential_payout)),
        ),
        BetResolution::Lost => (BetStatus::Lost, Decimal::ZERO, None),
        BetResolution::Void => (
            BetStatus::Void,
            Decimal::ZERO,
            Some((EntryType::BetRefund, bet.stake)),
        ),
    }
}

/// What happened to one bet in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Settled,
    /// A concurrent sweep got there first; nothing was mutated
    Skipped,
}

/// Batch result: additive failures, never abort-on-first
#[derive(Debug, Default)]
pub struct BatchReport {
    pub resolved: usize,
    pub skipped: usize,
    pub failures: Vec<(Uuid, AppError)>,
}

impl BatchReport {
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(id, err)| format!("{}: {}", id, err))
            .collect()
    }
}

pub struct OutcomeApplier {
    ledger: Arc<LedgerRepository>,
    commissions: Arc<CommissionEngine>,
}

impl OutcomeApplier {
    pub fn new(ledger: Arc<LedgerRepository>, commissions: Arc<CommissionEngine>) -> Self {
        Self {
            ledger,
            commissions,
        }
    }

    /// Settle a batch of bets under one directive. Each bet is atomic
    /// on its own; failures are collected into the report.
    pub async fn apply(
        &self,
        bets: &[Bet],
        directive: &SettlementDirective,
        actor: &str,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for bet in bets {
            let resolution = match decide(bet, directive) {
                Ok(resolution) => resolution,
                Err(err) => {
                    // An unreadable fancy claim cannot be judged either
                    // way; refund the stake rather than guess
                    warn!(bet_id = %bet.id, error = %err, "refunding bet with invalid claim");
                    BetResolution::Void
                }
            };

            match self.apply_one(bet, resolution, actor).await {
                Ok(Applied::Settled) => report.resolved += 1,
                Ok(Applied::Skipped) => {
                    debug!(bet_id = %bet.id, "already settled by a concurrent sweep");
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!(bet_id = %bet.id, error = %err, "bet settlement failed, will retry next sweep");
                    report.failures.push((bet.id, err));
                }
            }
        }

        report
    }

    /// One bet, one transaction. The status re-check and the balance
    /// mutation share the transaction; rows_affected == 0 on the
    /// transition means another sweep already settled the bet.
    async fn apply_one(
        &self,
        bet: &Bet,
        resolution: BetResolution,
        actor: &str,
    ) -> AppResult<Applied> {
        let (status, payout, credit) = settlement_effect(bet, resolution);

        let mut tx = self.ledger.begin_tx().await?;

        if !self
            .ledger
            .transition_bet(&mut tx, bet.id, status, payout)
            .await?
        {
            tx.rollback().await?;
            return Ok(Applied::Skipped);
        }

        if let Some((entry_type, amount)) = credit {
            let receipt = self
                .ledger
                .credit_account(
                    &mut tx,
                    bet.account_id,
                    amount,
                    entry_type,
                    Some(bet.id),
                    Some(bet.match_id),
                    actor,
                )
                .await
                .map_err(|e| {
                    AppError::Settlement(SettlementError::LedgerIntegrity {
                        bet_id: bet.id,
                        message: e.to_string(),
                    })
                })?;

            debug!(
                bet_id = %bet.id,
                entry = ?entry_type,
                amount = %amount,
                balance_after = %receipt.balance_after,
                "account credited"
            );
        }

        if resolution == BetResolution::Won {
            self.commissions
                .distribute(&mut tx, bet, bet.potential_payout)
                .await?;
        }

        tx.commit().await?;
        Ok(Applied::Settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bet(selection: &str, fancy: bool) -> Bet {
        Bet {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            fancy_market_id: fancy.then(Uuid::new_v4),
            selection: selection.to_string(),
            stake: dec!(100),
            price: dec!(1.85),
            potential_payout: dec!(185),
            status: BetStatus::Pending,
            actual_payout: dec!(0),
            settled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_winner_directive_equality() {
        let directive = SettlementDirective::Winner {
            name: "India".to_string(),
        };
        assert_eq!(decide(&bet("India", false), &directive).unwrap(), BetResolution::Won);
        assert_eq!(decide(&bet("india", false), &directive).unwrap(), BetResolution::Won);
        assert_eq!(
            decide(&bet("Pakistan", false), &directive).unwrap(),
            BetResolution::Lost
        );
    }

    #[test]
    fn test_draw_semantics() {
        let directive = SettlementDirective::Winner {
            name: "DRAW".to_string(),
        };
        assert_eq!(decide(&bet("DRAW", false), &directive).unwrap(), BetResolution::Won);
        assert_eq!(decide(&bet("India", false), &directive).unwrap(), BetResolution::Lost);
        assert_eq!(
            decide(&bet("Australia", false), &directive).unwrap(),
            BetResolution::Lost
        );
    }

    #[test]
    fn test_void_directive() {
        let directive = SettlementDirective::Void {
            reason: "abandoned".to_string(),
        };
        assert_eq!(decide(&bet("India", false), &directive).unwrap(), BetResolution::Void);
    }

    #[test]
    fn test_fancy_threshold_comparison() {
        let directive = SettlementDirective::FancyResult { value: dec!(40) };
        assert_eq!(
            decide(&bet("ABOVE 35", true), &directive).unwrap(),
            BetResolution::Won
        );
        assert_eq!(
            decide(&bet("ABOVE 45", true), &directive).unwrap(),
            BetResolution::Lost
        );
        assert_eq!(
            decide(&bet("BELOW 45", true), &directive).unwrap(),
            BetResolution::Won
        );
        assert_eq!(
            decide(&bet("BELOW 40", true), &directive).unwrap(),
            BetResolution::Lost
        );
        // Boundary: ABOVE wins on equality, BELOW does not
        assert_eq!(
            decide(&bet("ABOVE 40", true), &directive).unwrap(),
            BetResolution::Won
        );
    }

    #[test]
    fn test_invalid_claim_is_an_error() {
        let directive = SettlementDirective::FancyResult { value: dec!(40) };
        let result = decide(&bet("YES", true), &directive);
        assert!(matches!(
            result,
            Err(SettlementError::InvalidClaim { .. })
        ));
    }

    #[test]
    fn test_settlement_effect_payouts() {
        let b = bet("India", false);

        // Won: actual payout is the precomputed potential payout
        let (status, payout, credit) = settlement_effect(&b, BetResolution::Won);
        assert_eq!(status, BetStatus::Won);
        assert_eq!(payout, dec!(185));
        assert_eq!(credit, Some((EntryType::BetWin, dec!(185))));

        // Lost: no payout, no balance change
        let (status, payout, credit) = settlement_effect(&b, BetResolution::Lost);
        assert_eq!(status, BetStatus::Lost);
        assert_eq!(payout, dec!(0));
        assert_eq!(credit, None);

        // Void: refund is the stake, never the potential payout
        let (status, payout, credit) = settlement_effect(&b, BetResolution::Void);
        assert_eq!(status, BetStatus::Void);
        assert_eq!(payout, dec!(0));
        assert_eq!(credit, Some((EntryType::BetRefund, dec!(100))));
    }

    #[test]
    fn test_parse_claim() {
        assert_eq!(
            parse_claim("ABOVE 35"),
            Some((ClaimDirection::Above, dec!(35)))
        );
        assert_eq!(
            parse_claim("below 32.5"),
            Some((ClaimDirection::Below, dec!(32.5)))
        );
        assert_eq!(parse_claim("ABOVE"), None);
        assert_eq!(parse_claim("ABOVE 35 runs"), None);
        assert_eq!(parse_claim("OVER 35"), None);
    }
}
