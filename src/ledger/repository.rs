use super::models::*;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Balance mutation receipt - what the ledger entry recorded
#[derive(Debug, Clone, Copy)]
pub struct LedgerCredit {
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

/// Counts returned to the admin unsettled-summary endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnsettledSummary {
    pub unresolved_matches: i64,
    pub oldest_unresolved_end: Option<DateTime<Utc>>,
    pub open_fancy_markets: i64,
    pub pending_bets: i64,
}

/// Store repository - THE source of truth for all settlement state
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_tx(&self) -> AppResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ========== MATCH OPERATIONS ==========

    pub async fn get_match(&self, match_id: Uuid) -> AppResult<Option<Match>> {
        let m = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, team1, team2, status, winner, win_type, win_margin,
                   is_settled, ends_at, created_at, updated_at
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(m)
    }

    /// Matches the result sweep should be resolving: completed, no
    /// canonical winner yet, not settled
    pub async fn matches_needing_resolution(&self, limit: i64) -> AppResult<Vec<Match>> {
        let rows = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, team1, team2, status, winner, win_type, win_margin,
                   is_settled, ends_at, created_at, updated_at
            FROM matches
            WHERE status = 'completed' AND winner IS NULL AND NOT is_settled
            ORDER BY ends_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Matches with a recorded winner whose bets are still outstanding
    pub async fn matches_awaiting_bet_settlement(&self, limit: i64) -> AppResult<Vec<Match>> {
        let rows = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, team1, team2, status, winner, win_type, win_margin,
                   is_settled, ends_at, created_at, updated_at
            FROM matches
            WHERE status = 'completed' AND winner IS NOT NULL AND NOT is_settled
            ORDER BY ends_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Unresolved completed matches older than the stale cutoff -
    /// candidates for the safety-net void
    pub async fn stale_unresolved_matches(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Match>> {
        let rows = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, team1, team2, status, winner, win_type, win_margin,
                   is_settled, ends_at, created_at, updated_at
            FROM matches
            WHERE status = 'completed' AND winner IS NULL AND NOT is_settled
              AND ends_at < $1
            ORDER BY ends_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Record the canonical winner on a match. Guarded so a concurrent
    /// sweep or an admin call cannot overwrite an existing result.
    /// Returns false when another actor got there first.
    pub async fn record_winner(
        &self,
        match_id: Uuid,
        winner: &str,
        win_type: Option<WinType>,
        win_margin: Option<i32>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE matches
            SET winner = $2, win_type = $3, win_margin = $4, updated_at = NOW()
            WHERE id = $1 AND winner IS NULL AND NOT is_settled
            "#,
        )
        .bind(match_id)
        .bind(winner)
        .bind(win_type)
        .bind(win_margin)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip is_settled, but only once every bet on the match has left
    /// the pending state. Returns false if bets are still outstanding
    /// or the match was already settled.
    pub async fn mark_match_settled(&self, match_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE matches
            SET is_settled = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT is_settled
              AND NOT EXISTS (
                  SELECT 1 FROM bets
                  WHERE bets.match_id = $1 AND bets.status = 'pending'
              )
            "#,
        )
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== BET OPERATIONS ==========

    pub async fn get_bet(&self, bet_id: Uuid) -> AppResult<Option<Bet>> {
        let bet = sqlx::query_as::<_, Bet>(
            r#"
            SELECT id, account_id, match_id, fancy_market_id, selection, stake,
                   price, potential_payout, status, actual_payout, settled_at, created_at
            FROM bets
            WHERE id = $1
            "#,
        )
        .bind(bet_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bet)
    }

    /// Every pending bet on a match, primary and fancy alike (void path)
    pub async fn pending_bets_for_match(&self, match_id: Uuid) -> AppResult<Vec<Bet>> {
        let rows = sqlx::query_as::<_, Bet>(
            r#"
            SELECT id, account_id, match_id, fancy_market_id, selection, stake,
                   price, potential_payout, status, actual_payout, settled_at, created_at
            FROM bets
            WHERE match_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Pending primary-market bets only (winner-settlement path);
    /// fancy bets settle against their market's declared value instead
    pub async fn pending_primary_bets_for_match(&self, match_id: Uuid) -> AppResult<Vec<Bet>> {
        let rows = sqlx::query_as::<_, Bet>(
            r#"
            SELECT id, account_id, match_id, fancy_market_id, selection, stake,
                   price, potential_payout, status, actual_payout, settled_at, created_at
            FROM bets
            WHERE match_id = $1 AND fancy_market_id IS NULL AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn pending_bets_for_market(&self, market_id: Uuid) -> AppResult<Vec<Bet>> {
        let rows = sqlx::query_as::<_, Bet>(
            r#"
            SELECT id, account_id, match_id, fancy_market_id, selection, stake,
                   price, potential_payout, status, actual_payout, settled_at, created_at
            FROM bets
            WHERE fancy_market_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(market_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The single concurrency safeguard of the engine: transition a bet
    /// out of pending atomically. The WHERE clause re-checks status inside
    /// the caller's transaction; rows_affected == 0 means a concurrent
    /// sweep already settled this bet and the caller must no-op.
    pub async fn transition_bet(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bet_id: Uuid,
        to_status: BetStatus,
        actual_payout: Decimal,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bets
            SET status = $2, actual_payout = $3, settled_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(bet_id)
        .bind(to_status)
        .bind(actual_payout)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== ACCOUNT / LEDGER OPERATIONS ==========

    pub async fn get_account(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, balance, agent_id, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Mutate a balance and append the matching ledger entry in the
    /// caller's transaction. The two writes are inseparable; a failure
    /// in either rolls back both.
    pub async fn credit_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
        entry_type: EntryType,
        bet_id: Option<Uuid>,
        match_id: Option<Uuid>,
        processed_by: &str,
    ) -> AppResult<LedgerCredit> {
        let balance_after: Decimal = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {}", account_id)))?;

        let balance_before = balance_after - amount;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                account_id, entry_type, amount, balance_before, balance_after,
                bet_id, match_id, processed_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account_id)
        .bind(entry_type)
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(bet_id)
        .bind(match_id)
        .bind(processed_by)
        .execute(&mut **tx)
        .await?;

        Ok(LedgerCredit {
            balance_before,
            balance_after,
        })
    }

    pub async fn latest_ledger_entry(&self, account_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, account_id, entry_type, amount, balance_before, balance_after,
                   bet_id, match_id, processed_by, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    // ========== AGENT / COMMISSION OPERATIONS ==========

    pub async fn get_agent(&self, agent_id: Uuid) -> AppResult<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>(
            r#"
            SELECT id, username, agent_type, parent_id, commission_rate,
                   commission_total, created_at, updated_at
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agent)
    }

    /// One commission record plus the running-total increment, both in
    /// the caller's transaction
    pub async fn credit_commission(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bet_id: Uuid,
        agent_id: Uuid,
        tier: i16,
        rate: Decimal,
        basis_amount: Decimal,
        amount: Decimal,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO commission_records (bet_id, agent_id, tier, rate, basis_amount, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(bet_id)
        .bind(agent_id)
        .bind(tier)
        .bind(rate)
        .bind(basis_amount)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE agents
            SET commission_total = commission_total + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ========== FANCY MARKET OPERATIONS ==========

    pub async fn get_fancy_market(&self, market_id: Uuid) -> AppResult<Option<FancyMarket>> {
        let market = sqlx::query_as::<_, FancyMarket>(
            r#"
            SELECT id, match_id, title, no_value, yes_value, suspended, active,
                   settled, result_value, created_at, updated_at
            FROM fancy_markets
            WHERE id = $1
            "#,
        )
        .bind(market_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(market)
    }

    /// Unsettled fancy markets whose parent match completed before the
    /// grace cutoff
    pub async fn stale_fancy_markets(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<FancyMarket>> {
        let rows = sqlx::query_as::<_, FancyMarket>(
            r#"
            SELECT fm.id, fm.match_id, fm.title, fm.no_value, fm.yes_value,
                   fm.suspended, fm.active, fm.settled, fm.result_value,
                   fm.created_at, fm.updated_at
            FROM fancy_markets fm
            INNER JOIN matches m ON m.id = fm.match_id
            WHERE NOT fm.settled
              AND m.status = 'completed'
              AND m.ends_at < $1
            ORDER BY m.ends_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Declare a fancy result: suspended + settled flip together so no
    /// further wagers can land post-declaration. Returns false when the
    /// market was already settled.
    pub async fn declare_fancy_result(
        &self,
        market_id: Uuid,
        result_value: Option<Decimal>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fancy_markets
            SET suspended = TRUE, active = FALSE, settled = TRUE,
                result_value = $2, updated_at = NOW()
            WHERE id = $1 AND NOT settled
            "#,
        )
        .bind(market_id)
        .bind(result_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== FEED SIDE CHANNEL ==========

    /// Recent rows landed by the odds-feed ingestion pipeline
    pub async fn recent_feed_results(&self, since: DateTime<Utc>) -> AppResult<Vec<FeedResult>> {
        let rows = sqlx::query_as::<_, FeedResult>(
            r#"
            SELECT id, team1, team2, status_text, ended, created_at
            FROM feed_results
            WHERE created_at > $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ========== ADMIN SUMMARY ==========

    pub async fn unsettled_summary(&self) -> AppResult<UnsettledSummary> {
        let unresolved_matches: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches
             WHERE status = 'completed' AND winner IS NULL AND NOT is_settled",
        )
        .fetch_one(&self.pool)
        .await?;

        let oldest_unresolved_end: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MIN(ends_at) FROM matches
             WHERE status = 'completed' AND winner IS NULL AND NOT is_settled",
        )
        .fetch_one(&self.pool)
        .await?;

        let open_fancy_markets: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fancy_markets WHERE NOT settled")
                .fetch_one(&self.pool)
                .await?;

        let pending_bets: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bets WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;

        Ok(UnsettledSummary {
            unresolved_matches,
            oldest_unresolved_end,
            open_fancy_markets,
            pending_bets,
        })
    }
}
