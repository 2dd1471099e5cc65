use crate::classify::{FAIL_MARKER, PASS_MARKER};

/// Pass/fail totals for one verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Count the check markers in the full accumulated output text.
///
/// The statistics are derived by re-scanning the whole transcript after the
/// run completes, not maintained incrementally. Every occurrence of a marker
/// counts, even several on one line. The child's exit code plays no part.
pub fn scan(text: &str) -> RunStats {
    let passed = text.matches(PASS_MARKER).count();
    let failed = text.matches(FAIL_MARKER).count();
    RunStats {
        total: passed + failed,
        passed,
        failed,
    }
}

/// Render the summary block shown in the statistics tab.
pub fn render(stats: RunStats) -> String {
    format!(
        "Total checks: {}\n[PASS]: {}\n[FAIL]: {}",
        stats.total, stats.passed, stats.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zero_stats() {
        assert_eq!(scan(""), RunStats::default());
    }

    #[test]
    fn counts_pass_and_fail_markers() {
        let text = "[PASS] a\n[PASS] b\n[FAIL] c\nplain line\n";
        let stats = scan(text);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn total_is_sum_of_pass_and_fail() {
        let text = "[FAIL] x\n[PASS] y\n[FAIL] z\n";
        let stats = scan(text);
        assert_eq!(stats.total, stats.passed + stats.failed);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn multiple_markers_on_one_line_all_count() {
        // Occurrence count over the whole text, not a per-line classification
        let stats = scan("[PASS] ok [PASS] ok again [FAIL] no");
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn unmarked_text_yields_zero() {
        let stats = scan("scanning inodes\nreading superblock\n");
        assert_eq!(stats, RunStats::default());
    }

    #[test]
    fn render_contains_all_counts() {
        let out = render(RunStats {
            total: 5,
            passed: 3,
            failed: 2,
        });
        assert!(out.contains("Total checks: 5"));
        assert!(out.contains("[PASS]: 3"));
        assert!(out.contains("[FAIL]: 2"));
    }
}
