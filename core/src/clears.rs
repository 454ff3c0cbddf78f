//! Glob-pattern invalidation list applied before new provides are written.
use crate::provides::{ProvidesMap, ARTIFACT_GROUP_KEY};

/// Ordered sequence of anchored glob patterns (`*` wildcard) matched against
/// provides keys.
pub type ClearsProvidesList = Vec<String>;

/// Whether `key` matches `pattern`. Patterns are anchored (they must match
/// the full key, not a substring) and support a single kind of wildcard:
/// `*`, which may appear any number of times. This is deliberately not a
/// filesystem-glob: those crates (`glob`, `globset`) are built around path
/// segments and `/`-separated components, which provides keys never have,
/// so a small hand-rolled matcher is both simpler and more correct here.
pub fn matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();

    // Standard "is this wildcard pattern (only `*` is special) a full match"
    // dynamic program: `table[i][j]` is whether `pattern[..i]` matches
    // `key[..j]`.
    let mut table = vec![vec![false; key.len() + 1]; pattern.len() + 1];
    table[0][0] = true;
    for i in 1..=pattern.len() {
        if pattern[i - 1] == b'*' {
            table[i][0] = table[i - 1][0];
        }
    }
    for i in 1..=pattern.len() {
        for j in 1..=key.len() {
            table[i][j] = if pattern[i - 1] == b'*' {
                table[i - 1][j] || table[i][j - 1]
            } else {
                pattern[i - 1] == key[j - 1] && table[i - 1][j - 1]
            };
        }
    }
    table[pattern.len()][key.len()]
}

/// Removes every key in `provides` matching any pattern in `clears`.
/// Returns whether `artifact_group` was matched (the caller is responsible
/// for clearing the dedicated store slot in that case).
pub fn apply(clears: &ClearsProvidesList, provides: &mut ProvidesMap) -> bool {
    let clears_group = clears.iter().any(|p| matches(p, ARTIFACT_GROUP_KEY));
    provides.retain(|key, _| !clears.iter().any(|pattern| matches(pattern, key)));
    clears_group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_exact_key() {
        assert!(matches("a", "a"));
        assert!(!matches("a", "ab"));
    }

    #[test]
    fn trailing_wildcard_matches_prefix() {
        assert!(matches("net_*", "net_iface"));
        assert!(!matches("net_*", "other"));
    }

    #[test]
    fn leading_wildcard_matches_suffix() {
        assert!(matches("*_group", "artifact_group"));
        assert!(!matches("*_group", "artifact_name"));
    }

    #[test]
    fn bare_wildcard_matches_anything() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
    }

    #[test]
    fn apply_removes_matching_keys_and_flags_group() {
        let mut provides = ProvidesMap::new();
        provides.insert("a".into(), "1".into());
        provides.insert("b".into(), "2".into());
        provides.insert("c".into(), "3".into());
        provides.insert("artifact_group".into(), "g".into());

        let clears = vec!["a".to_string(), "c".to_string(), "artifact_group".to_string()];
        let cleared_group = apply(&clears, &mut provides);

        assert!(cleared_group);
        assert_eq!(provides.len(), 1);
        assert_eq!(provides.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn apply_leaves_non_matching_keys_alone() {
        let mut provides = ProvidesMap::new();
        provides.insert("a".into(), "1".into());
        provides.insert("b".into(), "2".into());

        let cleared_group = apply(&vec!["z".to_string()], &mut provides);

        assert!(!cleared_group);
        assert_eq!(provides.len(), 2);
    }
}
