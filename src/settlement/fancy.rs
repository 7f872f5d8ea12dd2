//! Fancy (session) market settlement - the threshold specialization of
//! the applier.
//!
//! A market's result is a single declared number; pending bets carry
//! directional claims ("ABOVE 35" / "BELOW 32") judged against it. The
//! market flips suspended+settled in one statement before any bet is
//! paid, so no further wagers can land post-declaration.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::models::FancyMarket;
use crate::ledger::LedgerRepository;
use crate::settlement::applier::{BatchReport, OutcomeApplier, SettlementDirective};

pub struct FancySettler {
    ledger: Arc<LedgerRepository>,
    applier: Arc<OutcomeApplier>,
}

impl FancySettler {
    pub fn new(ledger: Arc<LedgerRepository>, applier: Arc<OutcomeApplier>) -> Self {
        Self { ledger, applier }
    }

    async fn load_open_market(&self, market_id: Uuid) -> AppResult<FancyMarket> {
        let market = self
            .ledger
            .get_fancy_market(market_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fancy market {}", market_id)))?;

        if market.settled {
            return Err(AppError::AlreadySettled(market_id));
        }
        Ok(market)
    }

    /// Settle a market against its declared result value
    pub async fn settle_market(
        &self,
        market_id: Uuid,
        result_value: Decimal,
        actor: &str,
    ) -> AppResult<BatchReport> {
        let market = self.load_open_market(market_id).await?;

        // Suspend + settle together; a concurrent declaration loses here
        if !self
            .ledger
            .declare_fancy_result(market_id, Some(result_value))
            .await?
        {
            return Err(AppError::AlreadySettled(market_id));
        }

        let bets = self.ledger.pending_bets_for_market(market_id).await?;
        let directive = SettlementDirective::FancyResult {
            value: result_value,
        };
        let report = self.applier.apply(&bets, &directive, actor).await;

        info!(
            market_id = %market_id,
            title = %market.title,
            result = %result_value,
            resolved = report.resolved,
            failed = report.failures.len(),
            "fancy market settled"
        );

        Ok(report)
    }

    /// Void a market: every pending bet refunds its stake
    pub async fn void_market(
        &self,
        market_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> AppResult<BatchReport> {
        let market = self.load_open_market(market_id).await?;

        if !self.ledger.declare_fancy_result(market_id, None).await? {
            return Err(AppError::AlreadySettled(market_id));
        }

        let bets = self.ledger.pending_bets_for_market(market_id).await?;
        let directive = SettlementDirective::Void {
            reason: reason.to_string(),
        };
        let report = self.applier.apply(&bets, &directive, actor).await;

        info!(
            market_id = %market_id,
            title = %market.title,
            reason,
            resolved = report.resolved,
            "fancy market voided"
        );

        Ok(report)
    }
}
