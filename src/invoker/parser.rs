//! Parser for the external tool's summary output

use crate::types::Summary;

/// Line the tool prints on success that carries no data
const OK_SENTINEL: &str = "OK";

/// Parse `key: value` lines printed by the tool
///
/// Each line is split on its first `:` and both sides are trimmed. Blank
/// lines, lines without a colon, lines with an empty key and the `OK`
/// sentinel are skipped. A repeated key keeps its last value.
///
/// # Examples
///
/// ```
/// use artifact_broker::invoker::parse_summary;
///
/// let summary = parse_summary("OK\nlinhas: 42\nbackup_path: C:\\out\\a.xlsx\n");
/// assert_eq!(summary["linhas"], "42");
/// assert_eq!(summary["backup_path"], "C:\\out\\a.xlsx");
/// assert_eq!(summary.len(), 2);
/// ```
pub fn parse_summary(stdout: &str) -> Summary {
    let mut summary = Summary::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line == OK_SENTINEL {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        summary.insert(key.to_string(), value.trim().to_string());
    }

    summary
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_splits_on_first_colon() {
        let summary = parse_summary("inicio: 2024-01-02 10:30:00\n");
        assert_eq!(summary["inicio"], "2024-01-02 10:30:00");
    }

    #[test]
    fn test_parse_summary_skips_noise() {
        let stdout = "\r\n  \nOK\nprocessing...\n: orphan value\n  rows :  12  \r\n";
        let summary = parse_summary(stdout);

        assert_eq!(summary.len(), 1);
        assert_eq!(summary["rows"], "12");
    }

    #[test]
    fn test_parse_summary_last_duplicate_wins() {
        let summary = parse_summary("status: partial\nstatus: done\n");
        assert_eq!(summary["status"], "done");
    }

    #[test]
    fn test_parse_summary_allows_empty_values() {
        let summary = parse_summary("backup_path:\n");
        assert_eq!(summary["backup_path"], "");
    }

    #[test]
    fn test_parse_summary_empty_output() {
        assert!(parse_summary("").is_empty());
        assert!(parse_summary("OK\n").is_empty());
    }
}
