//! Result Resolver - reconciles up to three external result sources
//! into one canonical outcome for a pair of participants.

pub mod names;
pub mod parse;
pub mod sources;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AppResult;
use parse::{ParsedResult, WinMargin};
use sources::{RawResult, ResultSource};

/// Canonical, source-agnostic outcome of a match
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No source has a definitive result yet - retry next sweep
    NotYetAvailable,
    /// Abandoned / no result - void all stakes
    NoResult,
    /// Drawn - winner becomes the DRAW sentinel
    Draw,
    /// Tied with no tiebreak - refund like a void
    Tie,
    /// Definitive winner (canonical team name) with optional margin
    Winner {
        name: String,
        margin: Option<WinMargin>,
    },
}

/// What one source's batch said about one match
#[derive(Debug, Clone, PartialEq)]
enum SourceSignal {
    /// Source carries a usable outcome
    Definitive(Outcome),
    /// Source knows the match but says it has not finished
    NotFinished,
    /// Source has nothing usable (no entry, or unparsable text)
    NoSignal,
}

/// Evaluate a source's entries against our two canonical team names.
/// Pure so the branch logic is testable without any transport.
fn evaluate_entries(entries: &[RawResult], team1: &str, team2: &str) -> SourceSignal {
    for entry in entries {
        if !names::participants_match(&entry.participants, team1, team2) {
            continue;
        }

        if !entry.ended {
            return SourceSignal::NotFinished;
        }

        match parse::parse_result_text(&entry.status_text) {
            ParsedResult::NoResult => return SourceSignal::Definitive(Outcome::NoResult),
            ParsedResult::Draw => return SourceSignal::Definitive(Outcome::Draw),
            ParsedResult::Tie => return SourceSignal::Definitive(Outcome::Tie),
            ParsedResult::Winner { name, margin } => {
                // Map the reported winner back onto our canonical names;
                // a winner matching neither team is not a usable signal
                match names::canonical_winner(&name, team1, team2) {
                    Some(canonical) => {
                        return SourceSignal::Definitive(Outcome::Winner {
                            name: canonical.to_string(),
                            margin,
                        })
                    }
                    None => {
                        warn!(
                            reported = %name, team1, team2,
                            "reported winner matches neither participant"
                        );
                        return SourceSignal::NoSignal;
                    }
                }
            }
            ParsedResult::Unparsed => {
                warn!(
                    status_text = %entry.status_text, team1, team2,
                    "result text matched no parse rule, leaving pending"
                );
                return SourceSignal::NoSignal;
            }
        }
    }
    SourceSignal::NoSignal
}

/// Queries the sources in fixed priority order and stops at the first
/// definitive signal. Source failures never propagate: a failing source
/// is logged and treated as not-yet-available.
pub struct Resolver {
    sources: Vec<Arc<dyn ResultSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Arc<dyn ResultSource>>) -> Self {
        Self { sources }
    }

    pub async fn resolve(&self, team1: &str, team2: &str) -> AppResult<Outcome> {
        for source in &self.sources {
            let entries = match source.fetch_recent_results().await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        source = source.name(), error = %err,
                        "source fetch failed, treating as not yet available"
                    );
                    continue;
                }
            };

            match evaluate_entries(&entries, team1, team2) {
                SourceSignal::Definitive(outcome) => {
                    debug!(source = source.name(), team1, team2, ?outcome, "resolved");
                    return Ok(outcome);
                }
                SourceSignal::NotFinished => {
                    debug!(source = source.name(), team1, team2, "not finished per source");
                }
                SourceSignal::NoSignal => {}
            }
        }

        Ok(Outcome::NotYetAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::ledger::models::WinType;
    use async_trait::async_trait;

    fn entry(participants: &[&str], status: &str, ended: bool) -> RawResult {
        RawResult {
            participants: participants.iter().map(|p| p.to_string()).collect(),
            status_text: status.to_string(),
            ended,
            score_lines: Vec::new(),
            toss_info: None,
        }
    }

    #[test]
    fn test_evaluate_winner_canonicalized() {
        let entries = vec![entry(&["IND", "PAK"], "IND won by 7 wickets", true)];
        match evaluate_entries(&entries, "India", "Pakistan") {
            SourceSignal::Definitive(Outcome::Winner { name, margin }) => {
                assert_eq!(name, "India");
                assert_eq!(margin.unwrap().kind, WinType::Wickets);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_not_finished() {
        let entries = vec![entry(&["India", "Pakistan"], "India need 45 runs", false)];
        assert_eq!(
            evaluate_entries(&entries, "India", "Pakistan"),
            SourceSignal::NotFinished
        );
    }

    #[test]
    fn test_evaluate_skips_other_matches() {
        let entries = vec![
            entry(&["England", "Australia"], "England won by 5 runs", true),
            entry(&["India", "Pakistan"], "Match abandoned", true),
        ];
        assert_eq!(
            evaluate_entries(&entries, "India", "Pakistan"),
            SourceSignal::Definitive(Outcome::NoResult)
        );
    }

    #[test]
    fn test_evaluate_unparsed_is_no_signal() {
        let entries = vec![entry(&["India", "Pakistan"], "day 3, play suspended", true)];
        assert_eq!(
            evaluate_entries(&entries, "India", "Pakistan"),
            SourceSignal::NoSignal
        );
    }

    #[test]
    fn test_evaluate_foreign_winner_is_no_signal() {
        let entries = vec![entry(&["India", "Pakistan"], "Kenya won by 3 runs", true)];
        assert_eq!(
            evaluate_entries(&entries, "India", "Pakistan"),
            SourceSignal::NoSignal
        );
    }

    struct StaticSource {
        name: &'static str,
        entries: Result<Vec<RawResult>, ()>,
    }

    #[async_trait]
    impl ResultSource for StaticSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_recent_results(&self) -> Result<Vec<RawResult>, SourceError> {
            match &self.entries {
                Ok(entries) => Ok(entries.clone()),
                Err(()) => Err(SourceError::Malformed {
                    feed: self.name,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_resolver_stops_at_first_definitive_source() {
        let primary = Arc::new(StaticSource {
            name: "primary",
            entries: Ok(vec![entry(&["India", "Pakistan"], "India won by 7 wickets", true)]),
        });
        let secondary = Arc::new(StaticSource {
            name: "secondary",
            entries: Ok(vec![entry(&["India", "Pakistan"], "Pakistan won", true)]),
        });

        let resolver = Resolver::new(vec![
            primary as Arc<dyn ResultSource>,
            secondary as Arc<dyn ResultSource>,
        ]);
        match resolver.resolve("India", "Pakistan").await.unwrap() {
            Outcome::Winner { name, .. } => assert_eq!(name, "India"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolver_falls_through_failing_source() {
        let broken = Arc::new(StaticSource {
            name: "broken",
            entries: Err(()),
        });
        let fallback = Arc::new(StaticSource {
            name: "fallback",
            entries: Ok(vec![entry(&["India", "Pakistan"], "Match drawn", true)]),
        });

        let resolver = Resolver::new(vec![
            broken as Arc<dyn ResultSource>,
            fallback as Arc<dyn ResultSource>,
        ]);
        assert_eq!(
            resolver.resolve("India", "Pakistan").await.unwrap(),
            Outcome::Draw
        );
    }

    #[tokio::test]
    async fn test_resolver_exhaustion_is_not_yet_available() {
        let empty = Arc::new(StaticSource {
            name: "empty",
            entries: Ok(vec![]),
        });
        let resolver = Resolver::new(vec![
            empty.clone() as Arc<dyn ResultSource>,
            empty as Arc<dyn ResultSource>,
        ]);
        assert_eq!(
            resolver.resolve("India", "Pakistan").await.unwrap(),
            Outcome::NotYetAvailable
        );
    }
}
