//! Result source adapters.
//!
//! Three priority-ordered sources feed the resolver: the CricScore
//! statistics API, the Scorewave aggregator, and the internal odds-feed
//! side channel. Each normalizes its own wire shape into [`RawResult`];
//! all of them are treated as untrusted and rate-limited.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SourceError;
use crate::ledger::LedgerRepository;

/// A single entry as reported by a source, normalized
#[derive(Debug, Clone)]
pub struct RawResult {
    pub participants: Vec<String>,
    pub status_text: String,
    pub ended: bool,
    pub score_lines: Vec<String>,
    pub toss_info: Option<String>,
}

/// One external result provider
#[async_trait]
pub trait ResultSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_recent_results(&self) -> Result<Vec<RawResult>, SourceError>;
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ========== PRIMARY: CRICSCORE ==========

/// Primary statistics provider
pub struct CricScoreSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CricScoreResponse {
    matches: Vec<CricScoreEntry>,
}

#[derive(Debug, Deserialize)]
struct CricScoreEntry {
    t1: String,
    t2: String,
    status: String,
    /// Match state marker: "fixture", "live" or "result"
    ms: String,
    s1: Option<String>,
    s2: Option<String>,
}

impl CricScoreSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }
}

#[async_trait]
impl ResultSource for CricScoreSource {
    fn name(&self) -> &'static str {
        "cricscore"
    }

    async fn fetch_recent_results(&self) -> Result<Vec<RawResult>, SourceError> {
        let url = format!("{}/matches/recent", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Malformed {
                feed: "cricscore",
                message: format!("status {}", response.status()),
            });
        }

        let body: CricScoreResponse =
            response.json().await.map_err(|e| SourceError::Malformed {
                feed: "cricscore",
                message: e.to_string(),
            })?;

        Ok(body
            .matches
            .into_iter()
            .map(|entry| RawResult {
                participants: vec![entry.t1, entry.t2],
                status_text: entry.status,
                ended: entry.ms == "result",
                score_lines: [entry.s1, entry.s2].into_iter().flatten().collect(),
                toss_info: None,
            })
            .collect())
    }
}

// ========== SECONDARY: SCOREWAVE ==========

/// Secondary aggregator - different wire shape, same contract
pub struct ScorewaveSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ScorewaveResponse {
    results: Vec<ScorewaveEntry>,
}

#[derive(Debug, Deserialize)]
struct ScorewaveEntry {
    teams: Vec<String>,
    summary: String,
    finished: bool,
    #[serde(default)]
    scores: Vec<String>,
    toss: Option<String>,
}

impl ScorewaveSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }
}

#[async_trait]
impl ResultSource for ScorewaveSource {
    fn name(&self) -> &'static str {
        "scorewave"
    }

    async fn fetch_recent_results(&self) -> Result<Vec<RawResult>, SourceError> {
        let url = format!("{}/results/recent", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Malformed {
                feed: "scorewave",
                message: format!("status {}", response.status()),
            });
        }

        let body: ScorewaveResponse =
            response.json().await.map_err(|e| SourceError::Malformed {
                feed: "scorewave",
                message: e.to_string(),
            })?;

        Ok(body
            .results
            .into_iter()
            .map(|entry| RawResult {
                participants: entry.teams,
                status_text: entry.summary,
                ended: entry.finished,
                score_lines: entry.scores,
                toss_info: entry.toss,
            })
            .collect())
    }
}

// ========== TERTIARY: ODDS-FEED SIDE CHANNEL ==========

/// Internal side channel: rows the odds-feed ingestion pipeline lands
/// in the store. Short-TTL snapshot cache in front, so back-to-back
/// sweep ticks do not hammer the table.
pub struct FeedChannelSource {
    ledger: Arc<LedgerRepository>,
    lookback: ChronoDuration,
    cache: RwLock<Option<(Vec<RawResult>, DateTime<Utc>)>>,
}

const FEED_CACHE_TTL_SECS: i64 = 30;

impl FeedChannelSource {
    pub fn new(ledger: Arc<LedgerRepository>) -> Self {
        Self {
            ledger,
            lookback: ChronoDuration::hours(48),
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl ResultSource for FeedChannelSource {
    fn name(&self) -> &'static str {
        "odds-feed"
    }

    async fn fetch_recent_results(&self) -> Result<Vec<RawResult>, SourceError> {
        {
            let cache = self.cache.read();
            if let Some((snapshot, fetched_at)) = cache.as_ref() {
                let age = Utc::now().signed_duration_since(*fetched_at);
                if age.num_seconds() < FEED_CACHE_TTL_SECS {
                    return Ok(snapshot.clone());
                }
            }
        }

        let since = Utc::now() - self.lookback;
        let rows = self
            .ledger
            .recent_feed_results(since)
            .await
            .map_err(|e| SourceError::Malformed {
                feed: "odds-feed",
                message: e.to_string(),
            })?;

        let results: Vec<RawResult> = rows
            .into_iter()
            .map(|row| RawResult {
                participants: vec![row.team1, row.team2],
                status_text: row.status_text,
                ended: row.ended,
                score_lines: Vec::new(),
                toss_info: None,
            })
            .collect();

        *self.cache.write() = Some((results.clone(), Utc::now()));
        Ok(results)
    }
}
