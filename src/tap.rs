//! Parser for the TAP 13 subset produced by test programs using the TAP
//! test interface.
//!
//! Producers emit a mix of plan lines, result lines, directives, and
//! arbitrary diagnostic noise; [`parse_tap`] extracts just what the
//! classifier in [`crate::interface::tap`] needs.

use std::io::BufRead;

use regex::Regex;
use std::sync::OnceLock;

/// The declared (or inferred) extent of a TAP stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapPlan {
    Explicit { first: u32, last: u32 },
    AllSkipped(String),
    None,
}

/// The accumulated result of reading a TAP stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TapSummary {
    plan: Option<TapPlan>,
    ok_count: u32,
    not_ok_count: u32,
    bailed_out: bool,
    bail_reason: Option<String>,
    first_failure_diagnostic: Option<String>,
}

impl TapSummary {
    pub fn plan(&self) -> Option<&TapPlan> {
        self.plan.as_ref()
    }

    pub fn ok_count(&self) -> u32 {
        self.ok_count
    }

    pub fn not_ok_count(&self) -> u32 {
        self.not_ok_count
    }

    pub fn total(&self) -> u32 {
        self.ok_count + self.not_ok_count
    }

    pub fn bailed_out(&self) -> bool {
        self.bailed_out
    }

    pub fn bail_reason(&self) -> Option<&str> {
        self.bail_reason.as_deref()
    }

    pub fn all_skipped_reason(&self) -> Option<&str> {
        match &self.plan {
            Some(TapPlan::AllSkipped(reason)) => Some(reason),
            _ => None,
        }
    }

    pub fn first_failure_diagnostic(&self) -> Option<&str> {
        self.first_failure_diagnostic.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("two plan lines present in TAP stream")]
    DuplicatePlan,

    #[error("I/O error reading TAP stream: {0}")]
    Io(#[from] std::io::Error),
}

fn plan_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.\.(\d+)(?:\s*#\s*SKIP\S*(?:\s+(.*))?)?\s*$").unwrap())
}

fn result_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(not ok|ok)\b\s*(\d+)?(?:\s*-?\s*[^#]*)?(?:#\s*(\S+)\s*(.*))?\s*$").unwrap()
    })
}

fn bail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Bail out!\s*(.*)$").unwrap())
}

/// Parses a TAP 13 stream into a [`TapSummary`].
///
/// Unrecognized lines are ignored; producers routinely interleave debug
/// noise with the protocol. Parsing stops early on `Bail out!`.
pub fn parse_tap<R: BufRead>(reader: R) -> Result<TapSummary, TapError> {
    let mut summary = TapSummary::default();
    let mut max_seen: u32 = 0;
    let mut saw_test_line = false;
    let mut prev_was_not_ok = false;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim_end();

        if let Some(caps) = bail_re().captures(trimmed) {
            summary.bailed_out = true;
            let reason = caps.get(1).map(|m| m.as_str().trim().to_string());
            summary.bail_reason = reason.filter(|r| !r.is_empty());
            break;
        }

        if let Some(caps) = plan_re().captures(trimmed) {
            if summary.plan.is_some() {
                return Err(TapError::DuplicatePlan);
            }
            let first: u32 = caps[1].parse().unwrap_or(0);
            let last: u32 = caps[2].parse().unwrap_or(0);
            if first == 1 && last == 0 {
                let reason = caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                summary.plan = Some(TapPlan::AllSkipped(reason));
            } else {
                summary.plan = Some(TapPlan::Explicit { first, last });
            }
            continue;
        }

        if let Some(caps) = result_re().captures(trimmed) {
            saw_test_line = true;
            let is_ok = caps[1].eq_ignore_ascii_case("ok");
            let n: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            max_seen = max_seen.max(n);

            let directive = caps.get(3).map(|m| m.as_str().to_ascii_uppercase());
            let is_skip = directive.as_deref() == Some("SKIP");

            if is_ok || is_skip {
                summary.ok_count += 1;
                prev_was_not_ok = false;
            } else {
                summary.not_ok_count += 1;
                prev_was_not_ok = true;
            }
            continue;
        }

        if prev_was_not_ok {
            if let Some(rest) = trimmed.trim_start().strip_prefix('#') {
                if summary.first_failure_diagnostic.is_none() {
                    summary.first_failure_diagnostic = Some(rest.trim().to_string());
                }
            }
            prev_was_not_ok = false;
        }
    }

    if summary.plan.is_none() && saw_test_line {
        summary.plan = Some(TapPlan::Explicit {
            first: 1,
            last: max_seen,
        });
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> TapSummary {
        parse_tap(Cursor::new(input)).unwrap()
    }

    #[test]
    fn all_pass() {
        let s = parse("1..2\nok 1 - a\nok 2 - b\n");
        assert_eq!(s.ok_count(), 2);
        assert_eq!(s.not_ok_count(), 0);
        assert_eq!(s.total(), 2);
        assert!(!s.bailed_out());
    }

    #[test]
    fn one_failure_with_diagnostic() {
        let s = parse("1..2\nok 1\nnot ok 2 - bad\n# expected 1 got 2\n");
        assert_eq!(s.not_ok_count(), 1);
        assert_eq!(s.first_failure_diagnostic(), Some("expected 1 got 2"));
    }

    #[test]
    fn all_skipped_plan() {
        let s = parse("1..0 # SKIP no hardware\n");
        assert_eq!(s.all_skipped_reason(), Some("no hardware"));
    }

    #[test]
    fn bail_out_stops_parsing() {
        let s = parse("1..5\nok 1\nBail out! disk full\nok 2\n");
        assert!(s.bailed_out());
        assert_eq!(s.bail_reason(), Some("disk full"));
        assert_eq!(s.total(), 1);
    }

    #[test]
    fn duplicate_plan_is_an_error() {
        let err = parse_tap(Cursor::new("1..1\n1..2\nok 1\n")).unwrap_err();
        assert!(matches!(err, TapError::DuplicatePlan));
    }

    #[test]
    fn missing_plan_is_inferred_from_highest_test_number() {
        let s = parse("ok 1\nok 3\n");
        assert_eq!(s.plan(), Some(&TapPlan::Explicit { first: 1, last: 3 }));
    }

    #[test]
    fn skip_directive_on_not_ok_counts_as_ok() {
        let s = parse("1..1\nnot ok 1 # SKIP unsupported\n");
        assert_eq!(s.ok_count(), 1);
        assert_eq!(s.not_ok_count(), 0);
    }

    #[test]
    fn arbitrary_noise_lines_are_ignored() {
        let s = parse("# some debug\n1..1\nrandom text\nok 1\nmore noise\n");
        assert_eq!(s.ok_count(), 1);
    }

    #[test]
    fn word_that_merely_starts_with_ok_is_not_a_result_line() {
        let s = parse("1..1\nokay starting up\nok 1\n");
        assert_eq!(s.ok_count(), 1);
        assert_eq!(s.total(), 1);
    }
}
