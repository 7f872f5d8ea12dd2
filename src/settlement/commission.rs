//! Commission cascade - multi-tier payout to the referral chain above
//! a winning account.
//!
//! The chain is a bounded parent-pointer walk: the bet owner's
//! referring agent, then at most two parents. Depth is capped at three
//! tiers and the walk is cycle-safe even on malformed hierarchy data.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::ledger::models::{Agent, Bet};
use crate::ledger::LedgerRepository;

/// Maximum hierarchy depth: AGENT -> MASTER -> SUPER_MASTER
pub const MAX_TIERS: usize = 3;

/// Per-tier amount for a win, in chain order
pub fn tier_amounts(rates: &[Decimal], win_amount: Decimal) -> Vec<Decimal> {
    rates
        .iter()
        .take(MAX_TIERS)
        .map(|rate| win_amount * *rate / Decimal::from(100))
        .collect()
}

pub struct CommissionEngine {
    ledger: Arc<LedgerRepository>,
}

impl CommissionEngine {
    pub fn new(ledger: Arc<LedgerRepository>) -> Self {
        Self { ledger }
    }

    /// Credit every tier of the winning bet's referral chain inside the
    /// caller's transaction (the same one that settled the bet). Returns
    /// the number of tiers credited. No-op for accounts with no
    /// referring agent. Never called for lost or void bets.
    pub async fn distribute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bet: &Bet,
        win_amount: Decimal,
    ) -> AppResult<usize> {
        let account = match self.ledger.get_account(bet.account_id).await? {
            Some(account) => account,
            None => return Ok(0),
        };

        let chain = self.agent_chain(account.agent_id).await?;
        if chain.is_empty() {
            return Ok(0);
        }

        let rates: Vec<Decimal> = chain.iter().map(|agent| agent.commission_rate).collect();
        let amounts = tier_amounts(&rates, win_amount);

        for (index, (agent, amount)) in chain.iter().zip(amounts).enumerate() {
            let tier = (index + 1) as i16;

            self.ledger
                .credit_commission(
                    tx,
                    bet.id,
                    agent.id,
                    tier,
                    agent.commission_rate,
                    win_amount,
                    amount,
                )
                .await?;

            debug!(
                bet_id = %bet.id,
                agent_id = %agent.id,
                tier,
                amount = %amount,
                "commission credited"
            );
        }

        Ok(chain.len())
    }

    /// Walk the parent pointers from the referring agent upward.
    /// Bounded to MAX_TIERS hops and immune to parent-pointer cycles.
    async fn agent_chain(&self, start: Option<Uuid>) -> AppResult<Vec<Agent>> {
        let mut chain: Vec<Agent> = Vec::with_capacity(MAX_TIERS);
        let mut visited: Vec<Uuid> = Vec::with_capacity(MAX_TIERS);
        let mut next = start;

        while let Some(agent_id) = next {
            if chain.len() >= MAX_TIERS || visited.contains(&agent_id) {
                break;
            }
            let agent = match self.ledger.get_agent(agent_id).await? {
                Some(agent) => agent,
                None => break,
            };
            visited.push(agent_id);
            next = agent.parent_id;
            chain.push(agent);
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_amounts_total() {
        // Rates r1/r2/r3 on a win of W total W*(r1+r2+r3)/100
        let rates = [dec!(2), dec!(1), dec!(0.5)];
        let amounts = tier_amounts(&rates, dec!(1000));
        assert_eq!(amounts, vec![dec!(20), dec!(10), dec!(5)]);

        let total: Decimal = amounts.iter().sum();
        assert_eq!(total, dec!(1000) * (dec!(2) + dec!(1) + dec!(0.5)) / dec!(100));
    }

    #[test]
    fn test_tier_amounts_caps_depth() {
        let rates = [dec!(2), dec!(1), dec!(0.5), dec!(9), dec!(9)];
        assert_eq!(tier_amounts(&rates, dec!(100)).len(), MAX_TIERS);
    }

    #[test]
    fn test_tier_amounts_zero_rate() {
        let amounts = tier_amounts(&[dec!(0)], dec!(500));
        assert_eq!(amounts, vec![dec!(0)]);
    }
}
