//! Fuzzy participant-name matching against a canonical alias table.
//!
//! External sources abbreviate, reorder and re-spell team names; the
//! matcher accepts exact matches, substring containment in either
//! direction, and shared alias-group membership. Symmetric by
//! construction.

/// Alias groups: every name in a group refers to the same side.
/// International sides first, then common franchise shorthands.
const ALIAS_GROUPS: &[&[&str]] = &[
    &["india", "ind", "team india", "men in blue"],
    &["australia", "aus"],
    &["england", "eng"],
    &["pakistan", "pak"],
    &["new zealand", "nz", "black caps", "blackcaps"],
    &["south africa", "sa", "rsa", "proteas"],
    &["sri lanka", "sl"],
    &["bangladesh", "ban", "bd", "the tigers"],
    &["afghanistan", "afg"],
    &["west indies", "wi", "windies"],
    &["zimbabwe", "zim"],
    &["ireland", "ire"],
    &["netherlands", "ned"],
    &["scotland", "sco"],
    &["mumbai indians", "mi"],
    &["chennai super kings", "csk"],
    &["royal challengers bengaluru", "royal challengers bangalore", "rcb"],
    &["kolkata knight riders", "kkr"],
    &["sunrisers hyderabad", "srh"],
    &["rajasthan royals", "rr"],
    &["delhi capitals", "dc"],
    &["punjab kings", "pbks", "kings xi punjab"],
    &["lucknow super giants", "lsg"],
    &["gujarat titans", "gt"],
];

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn alias_group(name: &str) -> Option<usize> {
    ALIAS_GROUPS
        .iter()
        .position(|group| group.contains(&name))
}

/// Whether two participant names refer to the same side
pub fn team_matches(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        return true;
    }

    match (alias_group(&a), alias_group(&b)) {
        (Some(ga), Some(gb)) => ga == gb,
        _ => false,
    }
}

/// Whether a participant pair from a source covers both of our teams,
/// in either order
pub fn participants_match(participants: &[String], team1: &str, team2: &str) -> bool {
    let covers = |team: &str| participants.iter().any(|p| team_matches(p, team));
    covers(team1) && covers(team2)
}

/// Map a winner name reported by a source back onto one of our two
/// canonical team names; None when it matches neither
pub fn canonical_winner<'a>(reported: &str, team1: &'a str, team2: &'a str) -> Option<&'a str> {
    if team_matches(reported, team1) {
        Some(team1)
    } else if team_matches(reported, team2) {
        Some(team2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case() {
        assert!(team_matches("India", "india"));
        assert!(team_matches("  England ", "england"));
        assert!(!team_matches("India", "Australia"));
    }

    #[test]
    fn test_abbreviations_via_alias_groups() {
        assert!(team_matches("IND", "India"));
        assert!(team_matches("India", "IND"));
        assert!(team_matches("Black Caps", "New Zealand"));
        assert!(team_matches("RCB", "Royal Challengers Bangalore"));
        assert!(!team_matches("IND", "Pakistan"));
    }

    #[test]
    fn test_substring_containment_both_directions() {
        assert!(team_matches("India Women", "India"));
        assert!(team_matches("India", "India Women"));
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("IND", "India"),
            ("New Zealand", "NZ"),
            ("proteas", "South Africa"),
            ("India", "Australia"),
        ];
        for (a, b) in pairs {
            assert_eq!(team_matches(a, b), team_matches(b, a), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_empty_never_matches() {
        assert!(!team_matches("", "India"));
        assert!(!team_matches("India", ""));
    }

    #[test]
    fn test_participants_match() {
        let participants = vec!["IND".to_string(), "PAK".to_string()];
        assert!(participants_match(&participants, "India", "Pakistan"));
        assert!(participants_match(&participants, "Pakistan", "India"));
        assert!(!participants_match(&participants, "India", "Australia"));
    }

    #[test]
    fn test_canonical_winner() {
        assert_eq!(canonical_winner("IND", "India", "Pakistan"), Some("India"));
        assert_eq!(
            canonical_winner("pak", "India", "Pakistan"),
            Some("Pakistan")
        );
        assert_eq!(canonical_winner("Kenya", "India", "Pakistan"), None);
    }
}
