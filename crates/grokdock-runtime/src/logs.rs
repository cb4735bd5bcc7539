//! Container log inspection.

/// Returns whether the log contains `marker` anywhere.
#[must_use]
pub fn contains_marker(logs: &str, marker: &str) -> bool {
    logs.contains(marker)
}

/// Counts lines that start with one of `prefixes`.
///
/// Leading whitespace is not skipped: only a marker in the first column
/// counts, the way `grep -c '^ERROR'` does.
#[must_use]
pub fn count_error_lines(logs: &str, prefixes: &[&str]) -> usize {
    logs.lines()
        .filter(|line| prefixes.iter().any(|p| line.starts_with(p)))
        .count()
}

/// Returns the last `n` lines of the log.
#[must_use]
pub fn tail(logs: &str, n: usize) -> String {
    let lines: Vec<&str> = logs.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIXES: &[&str] = &["ERROR", "FATAL", "SEVERE"];

    #[test]
    fn marker_is_found_mid_line() {
        let logs = "INFO [main] org.apache.catalina.startup.Catalina.start Server startup in [1234] milliseconds";
        assert!(contains_marker(logs, "Server startup in"));
        assert!(!contains_marker(logs, "FATAL"));
    }

    #[test]
    fn error_lines_are_counted_only_at_line_start() {
        let logs = "ERROR first\nINFO no ERROR here\nFATAL second\n  ERROR indented\nSEVERE third\n";
        assert_eq!(count_error_lines(logs, PREFIXES), 3);
    }

    #[test]
    fn empty_log_has_no_error_lines() {
        assert_eq!(count_error_lines("", PREFIXES), 0);
    }

    #[test]
    fn tail_returns_last_lines() {
        let logs = "a\nb\nc\nd";
        assert_eq!(tail(logs, 2), "c\nd");
        assert_eq!(tail(logs, 10), "a\nb\nc\nd");
        assert_eq!(tail("", 3), "");
    }
}
