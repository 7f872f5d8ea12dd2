//! Free-text result parsing.
//!
//! Sources report outcomes as prose ("India won by 7 wickets (DLS
//! method)", "Match abandoned due to rain"). Parsing is an explicit,
//! ordered list of (name, extractor) rules evaluated top to bottom;
//! the first rule producing a value wins. "No rule matched" is a
//! first-class variant, never an error and never a guess.

use crate::ledger::models::WinType;

/// Typed victory margin extracted from a result string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinMargin {
    pub kind: WinType,
    pub value: Option<u32>,
    pub dls: bool,
}

/// Structured outcome of one result string
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResult {
    /// Abandoned / no result - stakes refund
    NoResult,
    /// Match drawn - winner becomes the DRAW sentinel
    Draw,
    /// Tied with no tiebreak - treated like a void
    Tie,
    /// Definitive winner, margin when the text carries one
    Winner {
        name: String,
        margin: Option<WinMargin>,
    },
    /// No rule matched - left pending, logged upstream
    Unparsed,
}

type Rule = (&'static str, fn(&str, &str) -> Option<ParsedResult>);

/// Ordered rules; extractors receive the raw text and its lowercased
/// form. Order is load-bearing: the tie rule must see "tied" before
/// the winner rules do, and "won by" before the bare "won" fallback.
static RULES: &[Rule] = &[
    ("no-result", rule_no_result),
    ("drawn", rule_drawn),
    ("tied", rule_tied),
    ("won-by-margin", rule_won_by),
    ("won-super-over", rule_won_super_over),
    ("won-generic", rule_won_generic),
];

/// Parse a free-text result string into a structured outcome
pub fn parse_result_text(text: &str) -> ParsedResult {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedResult::Unparsed;
    }
    let lower = trimmed.to_lowercase();

    for (_name, rule) in RULES {
        if let Some(parsed) = rule(trimmed, &lower) {
            return parsed;
        }
    }
    ParsedResult::Unparsed
}

fn rule_no_result(_text: &str, lower: &str) -> Option<ParsedResult> {
    let markers = ["no result", "abandoned", "called off", "match cancelled"];
    markers
        .iter()
        .any(|m| lower.contains(m))
        .then_some(ParsedResult::NoResult)
}

fn rule_drawn(_text: &str, lower: &str) -> Option<ParsedResult> {
    (lower.contains("drawn") || lower == "draw").then_some(ParsedResult::Draw)
}

fn rule_tied(_text: &str, lower: &str) -> Option<ParsedResult> {
    // A tie broken by a super over falls through to the winner rules
    (lower.contains("tied") && !lower.contains("super over")).then_some(ParsedResult::Tie)
}

/// Slice the original text at an index found in its lowered form;
/// falls back to the lowered text when case-mapping changed byte
/// lengths (the winner name is only ever compared case-insensitively)
fn prefix_before<'t>(text: &'t str, lower: &'t str, idx: usize) -> &'t str {
    if text.len() == lower.len() {
        &text[..idx]
    } else {
        &lower[..idx]
    }
}

fn rule_won_by(text: &str, lower: &str) -> Option<ParsedResult> {
    let idx = lower.find(" won by ")?;
    let name = clean_winner_name(prefix_before(text, lower, idx));
    if name.is_empty() {
        return None;
    }

    let margin_text = &lower[idx + " won by ".len()..];
    let dls = margin_text.contains("dls") || margin_text.contains("duckworth");

    let margin = if margin_text.contains("an innings") || margin_text.contains("innings") {
        WinMargin {
            kind: WinType::Innings,
            value: first_number(margin_text),
            dls,
        }
    } else if margin_text.contains("super over") {
        WinMargin {
            kind: WinType::SuperOver,
            value: None,
            dls,
        }
    } else if margin_text.contains("run") {
        WinMargin {
            kind: WinType::Runs,
            value: first_number(margin_text),
            dls,
        }
    } else if margin_text.contains("wicket") {
        WinMargin {
            kind: WinType::Wickets,
            value: first_number(margin_text),
            dls,
        }
    } else {
        // "won by" with an unrecognized margin still names a winner
        return Some(ParsedResult::Winner { name, margin: None });
    };

    Some(ParsedResult::Winner {
        name,
        margin: Some(margin),
    })
}

fn rule_won_super_over(text: &str, lower: &str) -> Option<ParsedResult> {
    // "Match tied (India won the super over)"
    let idx = lower.find(" won the super over")?;
    let name = clean_winner_name(prefix_before(text, lower, idx));
    if name.is_empty() {
        return None;
    }
    Some(ParsedResult::Winner {
        name,
        margin: Some(WinMargin {
            kind: WinType::SuperOver,
            value: None,
            dls: false,
        }),
    })
}

fn rule_won_generic(text: &str, lower: &str) -> Option<ParsedResult> {
    let idx = lower.find(" won")?;
    // Reject "won" buried mid-word ("wonder")
    let after = &lower[idx + " won".len()..];
    if !(after.is_empty() || after.starts_with(' ') || after.starts_with('.')) {
        return None;
    }
    // Winning the toss is not winning the match
    if after.contains("toss") {
        return None;
    }
    let name = clean_winner_name(prefix_before(text, lower, idx));
    if name.is_empty() {
        return None;
    }
    Some(ParsedResult::Winner { name, margin: None })
}

/// Strip parenthetical and clause prefixes so "Match tied (India" and
/// "Result: India" both yield "India"
fn clean_winner_name(raw: &str) -> String {
    let mut name = raw.trim();
    for sep in ['(', ':', ','] {
        if let Some(idx) = name.rfind(sep) {
            name = name[idx + 1..].trim();
        }
    }
    name.trim_matches(|c: char| !c.is_alphanumeric() && c != ' ')
        .trim()
        .to_string()
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_won_by_wickets() {
        let parsed = parse_result_text("India won by 7 wickets");
        assert_eq!(
            parsed,
            ParsedResult::Winner {
                name: "India".to_string(),
                margin: Some(WinMargin {
                    kind: WinType::Wickets,
                    value: Some(7),
                    dls: false,
                }),
            }
        );
    }

    #[test]
    fn test_won_by_runs_with_dls() {
        let parsed = parse_result_text("England won by 13 runs (DLS method)");
        assert_eq!(
            parsed,
            ParsedResult::Winner {
                name: "England".to_string(),
                margin: Some(WinMargin {
                    kind: WinType::Runs,
                    value: Some(13),
                    dls: true,
                }),
            }
        );
    }

    #[test]
    fn test_won_by_innings() {
        let parsed = parse_result_text("Australia won by an innings and 45 runs");
        match parsed {
            ParsedResult::Winner { name, margin } => {
                assert_eq!(name, "Australia");
                let margin = margin.unwrap();
                assert_eq!(margin.kind, WinType::Innings);
                assert_eq!(margin.value, Some(45));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_won_by_super_over() {
        let parsed = parse_result_text("New Zealand won by a super over");
        match parsed {
            ParsedResult::Winner { name, margin } => {
                assert_eq!(name, "New Zealand");
                assert_eq!(margin.unwrap().kind, WinType::SuperOver);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_tied_with_super_over_tiebreak_names_winner() {
        let parsed = parse_result_text("Match tied (India won the super over)");
        match parsed {
            ParsedResult::Winner { name, margin } => {
                assert_eq!(name, "India");
                assert_eq!(margin.unwrap().kind, WinType::SuperOver);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_abandoned() {
        assert_eq!(
            parse_result_text("Match abandoned due to rain"),
            ParsedResult::NoResult
        );
        assert_eq!(
            parse_result_text("No result - wet outfield"),
            ParsedResult::NoResult
        );
    }

    #[test]
    fn test_drawn() {
        assert_eq!(parse_result_text("Match drawn"), ParsedResult::Draw);
    }

    #[test]
    fn test_tied_without_tiebreak() {
        assert_eq!(parse_result_text("Match tied"), ParsedResult::Tie);
    }

    #[test]
    fn test_generic_won() {
        assert_eq!(
            parse_result_text("Pakistan won"),
            ParsedResult::Winner {
                name: "Pakistan".to_string(),
                margin: None,
            }
        );
    }

    #[test]
    fn test_unparsed_is_a_value_not_a_guess() {
        assert_eq!(
            parse_result_text("rain delay, day 3 washed out"),
            ParsedResult::Unparsed
        );
        assert_eq!(parse_result_text(""), ParsedResult::Unparsed);
        assert_eq!(parse_result_text("a wonderful innings"), ParsedResult::Unparsed);
        assert_eq!(
            parse_result_text("Pakistan won the toss and elected to bat"),
            ParsedResult::Unparsed
        );
    }

    #[test]
    fn test_rule_order_no_result_beats_winner() {
        // Some feeds append context after the abandonment marker
        assert_eq!(
            parse_result_text("Match abandoned; Pakistan won the toss"),
            ParsedResult::NoResult
        );
    }
}
