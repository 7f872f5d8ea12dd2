//! Settlement Orchestrator - the periodic sweeps driving a match from
//! "completed, unresolved" to "settled", plus the administrative
//! overrides that reuse the same applier paths.
//!
//! Three sweeps run on independent cadences against the shared store:
//! the result sweep (resolve + settle), the stale fancy sweep and the
//! stale match sweep (the safety net). Each sweep is single-flight: a
//! tick that finds the previous one still running skips, never queues.

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::config::SweepConfig;
use crate::error::{AppError, AppResult};
use crate::ledger::models::{Match, WinType, DRAW_SENTINEL};
use crate::ledger::LedgerRepository;
use crate::resolver::parse::WinMargin;
use crate::resolver::{names, Outcome, Resolver};
use crate::settlement::applier::{BatchReport, OutcomeApplier, SettlementDirective};
use crate::settlement::fancy::FancySettler;

/// How many matches one sweep tick will look at
const SWEEP_BATCH: i64 = 50;

const SWEEP_ACTOR: &str = "settlement-sweep";

/// Single-flight guard: one pass per sweep type at a time.
/// try_enter returns a pass that releases the guard on drop.
pub struct SweepGuard {
    running: AtomicBool,
}

impl SweepGuard {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    pub fn try_enter(&self) -> Option<SweepPass<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepPass { guard: self })
    }
}

pub struct SweepPass<'a> {
    guard: &'a SweepGuard,
}

impl Drop for SweepPass<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

/// Split an optional parsed margin into the two match columns
fn margin_fields(margin: Option<WinMargin>) -> (Option<WinType>, Option<i32>) {
    match margin {
        Some(margin) => (Some(margin.kind), margin.value.map(|v| v as i32)),
        None => (None, None),
    }
}

#[derive(Debug, Clone, Copy)]
enum SweepKind {
    Result,
    Fancy,
    Stale,
}

impl SweepKind {
    fn name(&self) -> &'static str {
        match self {
            SweepKind::Result => "result",
            SweepKind::Fancy => "fancy",
            SweepKind::Stale => "stale",
        }
    }
}

pub struct SettlementOrchestrator {
    ledger: Arc<LedgerRepository>,
    resolver: Arc<Resolver>,
    applier: Arc<OutcomeApplier>,
    fancy: Arc<FancySettler>,
    broadcaster: Arc<Broadcaster>,
    config: SweepConfig,
    result_guard: SweepGuard,
    fancy_guard: SweepGuard,
    stale_guard: SweepGuard,
}

impl SettlementOrchestrator {
    pub fn new(
        ledger: Arc<LedgerRepository>,
        resolver: Arc<Resolver>,
        applier: Arc<OutcomeApplier>,
        fancy: Arc<FancySettler>,
        broadcaster: Arc<Broadcaster>,
        config: SweepConfig,
    ) -> Self {
        Self {
            ledger,
            resolver,
            applier,
            fancy,
            broadcaster,
            config,
            result_guard: SweepGuard::new(),
            fancy_guard: SweepGuard::new(),
            stale_guard: SweepGuard::new(),
        }
    }

    /// Spawn the three sweep loops
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            result_secs = self.config.result_interval_secs,
            fancy_secs = self.config.fancy_interval_secs,
            stale_secs = self.config.stale_interval_secs,
            "starting settlement sweeps"
        );

        vec![
            self.spawn_sweep(SweepKind::Result, self.config.result_interval_secs),
            self.spawn_sweep(SweepKind::Fancy, self.config.fancy_interval_secs),
            self.spawn_sweep(SweepKind::Stale, self.config.stale_interval_secs),
        ]
    }

    fn spawn_sweep(self: &Arc<Self>, kind: SweepKind, interval_secs: u64) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                orchestrator.tick(kind).await;
            }
        })
    }

    /// One guarded tick: skip if the previous pass is still in flight,
    /// log and swallow sweep-level failures so the loop always survives
    async fn tick(&self, kind: SweepKind) {
        let guard = match kind {
            SweepKind::Result => &self.result_guard,
            SweepKind::Fancy => &self.fancy_guard,
            SweepKind::Stale => &self.stale_guard,
        };

        let Some(_pass) = guard.try_enter() else {
            warn!(sweep = kind.name(), "previous pass still running, skipping tick");
            return;
        };

        let outcome = match kind {
            SweepKind::Result => self.run_result_sweep().await,
            SweepKind::Fancy => self.run_fancy_sweep().await,
            SweepKind::Stale => self.run_stale_sweep().await,
        };

        if let Err(err) = outcome {
            error!(sweep = kind.name(), error = %err, "sweep failed, retrying next tick");
        }
    }

    // ========== RESULT SWEEP ==========

    /// Pass 1: resolve completed matches with no winner.
    /// Pass 2: settle bets of matches whose winner is recorded.
    /// The passes are independently retryable by design of the state
    /// machine; a crash between them leaves the winner recorded and the
    /// next tick finishes the job.
    pub async fn run_result_sweep(&self) -> AppResult<()> {
        let unresolved = self.ledger.matches_needing_resolution(SWEEP_BATCH).await?;
        for m in &unresolved {
            if let Err(err) = self.resolve_match(m).await {
                warn!(match_id = %m.id, error = %err, "match resolution failed");
            }
        }

        let awaiting = self
            .ledger
            .matches_awaiting_bet_settlement(SWEEP_BATCH)
            .await?;
        for m in &awaiting {
            if let Err(err) = self.settle_winner_bets(m).await {
                warn!(match_id = %m.id, error = %err, "winner settlement failed");
            }
        }

        Ok(())
    }

    async fn resolve_match(&self, m: &Match) -> AppResult<()> {
        let outcome = self.resolver.resolve(&m.team1, &m.team2).await?;

        match outcome {
            Outcome::NotYetAvailable => {
                let overdue = m.minutes_since_end(Utc::now());
                if overdue > self.config.ancient_threshold_minutes {
                    warn!(
                        match_id = %m.id,
                        minutes_overdue = overdue,
                        "no resolvable result long past match end; stale sweep will void"
                    );
                }
            }
            Outcome::NoResult => {
                self.void_match(m, "no result / abandoned", SWEEP_ACTOR)
                    .await?;
            }
            Outcome::Tie => {
                self.void_match(m, "tied with no tiebreak", SWEEP_ACTOR)
                    .await?;
            }
            Outcome::Draw => {
                // Record the sentinel only; the winner-settlement pass
                // resolves the bets so the two steps retry independently
                if self
                    .ledger
                    .record_winner(m.id, DRAW_SENTINEL, None, None)
                    .await?
                {
                    info!(match_id = %m.id, "match drawn");
                    self.broadcaster
                        .status_change(m.id, json!({ "winner": DRAW_SENTINEL }));
                }
            }
            Outcome::Winner { name, margin } => {
                let (win_type, win_margin) = margin_fields(margin);
                if self
                    .ledger
                    .record_winner(m.id, &name, win_type, win_margin)
                    .await?
                {
                    info!(match_id = %m.id, winner = %name, "winner recorded");
                    self.broadcaster
                        .status_change(m.id, json!({ "winner": name }));
                }
            }
        }

        Ok(())
    }

    /// Settle the pending primary-market bets of a winner-bearing match
    /// and flip is_settled once nothing on the match is pending
    async fn settle_winner_bets(&self, m: &Match) -> AppResult<()> {
        let winner = match &m.winner {
            Some(winner) => winner.clone(),
            None => return Ok(()),
        };

        let bets = self.ledger.pending_primary_bets_for_match(m.id).await?;
        let report = self
            .applier
            .apply(
                &bets,
                &SettlementDirective::Winner {
                    name: winner.clone(),
                },
                SWEEP_ACTOR,
            )
            .await;

        if !report.failures.is_empty() {
            warn!(
                match_id = %m.id,
                failed = report.failures.len(),
                "some bets failed to settle; they stay pending for the next sweep"
            );
        }

        if self.ledger.mark_match_settled(m.id).await? {
            info!(
                match_id = %m.id,
                winner = %winner,
                resolved = report.resolved,
                "match settled"
            );
            self.broadcaster.settlement(
                m.id,
                json!({ "winner": winner, "resolved": report.resolved }),
            );
        }

        Ok(())
    }

    /// Void every pending bet of a match and mark it settled
    async fn void_match(&self, m: &Match, reason: &str, actor: &str) -> AppResult<BatchReport> {
        let bets = self.ledger.pending_bets_for_match(m.id).await?;
        let report = self
            .applier
            .apply(
                &bets,
                &SettlementDirective::Void {
                    reason: reason.to_string(),
                },
                actor,
            )
            .await;

        if self.ledger.mark_match_settled(m.id).await? {
            info!(
                match_id = %m.id,
                reason,
                refunded = report.resolved,
                "match voided and settled"
            );
            self.broadcaster.settlement(
                m.id,
                json!({ "voided": true, "reason": reason, "refunded": report.resolved }),
            );
        }

        Ok(report)
    }

    // ========== STALE FANCY SWEEP ==========

    /// Void fancy markets left unsettled past their grace window
    pub async fn run_fancy_sweep(&self) -> AppResult<()> {
        let cutoff = Utc::now() - ChronoDuration::minutes(self.config.fancy_grace_minutes);
        let markets = self.ledger.stale_fancy_markets(cutoff).await?;

        for market in markets {
            match self
                .fancy
                .void_market(market.id, "unsettled past grace window", SWEEP_ACTOR)
                .await
            {
                Ok(report) => {
                    info!(
                        market_id = %market.id,
                        refunded = report.resolved,
                        "stale fancy market voided"
                    );
                }
                // A concurrent declaration beat us to it
                Err(AppError::AlreadySettled(_)) => {}
                Err(err) => {
                    warn!(market_id = %market.id, error = %err, "stale fancy void failed");
                }
            }
        }

        Ok(())
    }

    // ========== STALE MATCH SWEEP (SAFETY NET) ==========

    /// The ultimate backstop: no bet stays pending forever. Completed
    /// matches with no winner past the long grace window have every
    /// remaining pending bet refunded.
    pub async fn run_stale_sweep(&self) -> AppResult<()> {
        let cutoff = Utc::now() - ChronoDuration::minutes(self.config.match_grace_minutes);
        let matches = self.ledger.stale_unresolved_matches(cutoff).await?;

        for m in matches {
            if let Err(err) = self
                .void_match(&m, "no result within grace window", SWEEP_ACTOR)
                .await
            {
                warn!(match_id = %m.id, error = %err, "stale match void failed");
            }
        }

        Ok(())
    }

    // ========== ADMINISTRATIVE OVERRIDES ==========

    /// Human-triggered settlement, bypassing the resolver. Fails with
    /// AlreadySettled when the match is done; a differing recorded
    /// winner is rejected rather than silently overwritten.
    pub async fn manual_settle(
        &self,
        match_id: Uuid,
        winner: &str,
        win_type: Option<WinType>,
        win_margin: Option<i32>,
        actor: &str,
    ) -> AppResult<BatchReport> {
        let m = self
            .ledger
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?;

        if m.is_settled {
            return Err(AppError::AlreadySettled(match_id));
        }

        let canonical = if winner.eq_ignore_ascii_case(DRAW_SENTINEL) {
            DRAW_SENTINEL.to_string()
        } else {
            names::canonical_winner(winner, &m.team1, &m.team2)
                .ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "winner '{}' matches neither {} nor {}",
                        winner, m.team1, m.team2
                    ))
                })?
                .to_string()
        };

        match &m.winner {
            Some(existing) if !existing.eq_ignore_ascii_case(&canonical) => {
                return Err(AppError::BadRequest(format!(
                    "winner '{}' already recorded for match {}",
                    existing, match_id
                )));
            }
            Some(_) => {}
            None => {
                self.ledger
                    .record_winner(match_id, &canonical, win_type, win_margin)
                    .await?;
            }
        }

        let bets = self.ledger.pending_primary_bets_for_match(match_id).await?;
        let report = self
            .applier
            .apply(
                &bets,
                &SettlementDirective::Winner {
                    name: canonical.clone(),
                },
                actor,
            )
            .await;

        if self.ledger.mark_match_settled(match_id).await? {
            info!(
                match_id = %match_id,
                winner = %canonical,
                actor,
                resolved = report.resolved,
                "match settled manually"
            );
            self.broadcaster.settlement(
                match_id,
                json!({ "winner": canonical, "resolved": report.resolved, "manual": true }),
            );
        }

        Ok(report)
    }

    /// Human-triggered void of a whole match
    pub async fn manual_void(
        &self,
        match_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> AppResult<BatchReport> {
        let m = self
            .ledger
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?;

        if m.is_settled {
            return Err(AppError::AlreadySettled(match_id));
        }

        self.void_match(&m, reason, actor).await
    }

    /// Human-triggered fancy declaration
    pub async fn manual_fancy_settle(
        &self,
        market_id: Uuid,
        result_value: Decimal,
        actor: &str,
    ) -> AppResult<BatchReport> {
        self.fancy.settle_market(market_id, result_value, actor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_guard_single_flight() {
        let guard = SweepGuard::new();

        let pass = guard.try_enter().expect("first entry succeeds");
        assert!(guard.try_enter().is_none(), "second entry must be refused");

        drop(pass);
        assert!(guard.try_enter().is_some(), "released guard re-enters");
    }

    #[test]
    fn test_margin_fields() {
        let (win_type, margin) = margin_fields(Some(WinMargin {
            kind: WinType::Wickets,
            value: Some(7),
            dls: false,
        }));
        assert_eq!(win_type, Some(WinType::Wickets));
        assert_eq!(margin, Some(7));

        let (win_type, margin) = margin_fields(Some(WinMargin {
            kind: WinType::SuperOver,
            value: None,
            dls: false,
        }));
        assert_eq!(win_type, Some(WinType::SuperOver));
        assert_eq!(margin, None);

        assert_eq!(margin_fields(None), (None, None));
    }
}
