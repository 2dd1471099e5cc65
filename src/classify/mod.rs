use crate::Origin;

/// Literal marker the checker prints for a passing check.
pub const PASS_MARKER: &str = "[PASS]";
/// Literal marker the checker prints for a failing check.
pub const FAIL_MARKER: &str = "[FAIL]";

/// Display classification of a single checker output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Line contains `[PASS]`.
    Pass,
    /// Line contains `[FAIL]`.
    Fail,
    /// Unmarked line that arrived on stderr.
    Error,
    /// Anything else.
    Plain,
}

/// Classify a checker output line by marker substring and origin stream.
///
/// All checker output is opaque except the two markers. A line carrying both
/// markers is classified by whichever occurs first, so classification is
/// deterministic for any input.
pub fn classify(origin: Origin, line: &str) -> LineKind {
    let pass = line.find(PASS_MARKER);
    let fail = line.find(FAIL_MARKER);

    match (pass, fail) {
        (Some(p), Some(f)) => {
            if p <= f {
                LineKind::Pass
            } else {
                LineKind::Fail
            }
        }
        (Some(_), None) => LineKind::Pass,
        (None, Some(_)) => LineKind::Fail,
        (None, None) => match origin {
            Origin::Stderr => LineKind::Error,
            Origin::Stdout => LineKind::Plain,
        },
    }
}
