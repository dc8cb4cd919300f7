//! Breakpoint restore after `restart` (spec §4.5, §9 open question).

use crate::state::StoredBreakpoint;

/// Regex metacharacters the naive escaper recognizes. This is a known,
/// intentionally preserved gap (spec §9): unusual paths (e.g. containing
/// `{`/`}` or `|`) can be under-escaped. Do not widen this set.
const NAIVE_METACHARS: &[char] = &['.', '+', '*', '?', '(', ')', '[', ']', '^', '$'];

/// Build the `urlRegex` CDP expects for `Debugger.setBreakpointByUrl`,
/// anchoring the whole path and escaping only [`NAIVE_METACHARS`].
pub fn naive_url_pattern(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 8);
    out.push('^');
    for c in path.chars() {
        if NAIVE_METACHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('$');
    out
}

/// A point-in-time copy of a managed session's breakpoints, replayed after
/// `restart` via `Debugger.setBreakpointByUrl`.
#[derive(Debug, Clone)]
pub struct BreakpointSnapshot {
    pub breakpoints: Vec<StoredBreakpoint>,
}

impl BreakpointSnapshot {
    pub fn capture(breakpoints: &std::collections::HashMap<String, StoredBreakpoint>) -> Self {
        Self {
            breakpoints: breakpoints.values().filter(|bp| bp.enabled).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_the_hardcoded_metacharacter_set() {
        assert_eq!(naive_url_pattern("/a/b.js"), "^/a/b\\.js$");
        assert_eq!(naive_url_pattern("/a/(x)[y]"), "^/a/\\(x\\)\\[y\\]$");
    }

    #[test]
    fn leaves_other_special_characters_unescaped() {
        // known gap: `{`/`}` and `|` are not in the hardcoded set
        assert_eq!(naive_url_pattern("/a/{b}|c"), "^/a/{b}|c$");
    }

    #[test]
    fn snapshot_captures_only_enabled_breakpoints() {
        let mut map = std::collections::HashMap::new();
        map.insert(
            "1".to_string(),
            StoredBreakpoint {
                id: "1".into(),
                file: "/a.js".into(),
                line: 3,
                condition: None,
                hits: 0,
                enabled: true,
                native_id: None,
            },
        );
        map.insert(
            "2".to_string(),
            StoredBreakpoint {
                id: "2".into(),
                file: "/b.js".into(),
                line: 9,
                condition: None,
                hits: 0,
                enabled: false,
                native_id: None,
            },
        );
        let snap = BreakpointSnapshot::capture(&map);
        assert_eq!(snap.len(), 1);
    }
}
