//! Parser for the ATF test-program listing format (`kyua test -l` style
//! header followed by one block per test case).

use std::io::BufRead;
use std::path::Path;

use crate::model::{ModelError, PropertiesMap, TestCase, TestCaseId};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("expecting Content-Type header")]
    MissingHeader,

    #[error("expecting a blank line after the header")]
    MissingBlankLine,

    #[error("No test cases")]
    NoTestCases,

    #[error("property preceeded by no identifier")]
    PropertyBeforeIdent,

    #[error("invalid test-case data: {0}")]
    Model(#[from] ModelError),

    #[error("I/O error reading test-program listing: {0}")]
    Io(#[from] std::io::Error),
}

const EXPECTED_HEADER: &str = "Content-Type: application/X-atf-tp; version=\"1\"";

/// Parses the ATF listing grammar into an ordered sequence of test cases.
pub fn parse_test_cases<R: BufRead>(
    program_path: &Path,
    reader: R,
) -> Result<Vec<TestCase>, ListingError> {
    let mut lines = reader.lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                break line;
            }
            None => return Err(ListingError::MissingHeader),
        }
    };
    if header.trim_end() != EXPECTED_HEADER {
        return Err(ListingError::MissingHeader);
    }

    match lines.next() {
        Some(line) if line?.is_empty() => {}
        _ => return Err(ListingError::MissingBlankLine),
    }

    let mut cases = Vec::new();
    let mut current_id: Option<String> = None;
    let mut current_props = PropertiesMap::new();

    for line in lines {
        let line = line?;
        if line.is_empty() {
            flush_case(program_path, &mut cases, &mut current_id, &mut current_props)?;
            continue;
        }

        let (key, value) = split_property(&line);
        if key == "ident" {
            flush_case(program_path, &mut cases, &mut current_id, &mut current_props)?;
            current_id = Some(value.to_string());
        } else {
            if current_id.is_none() {
                return Err(ListingError::PropertyBeforeIdent);
            }
            current_props
                .insert(key, value)
                .map_err(ListingError::Model)?;
        }
    }
    flush_case(program_path, &mut cases, &mut current_id, &mut current_props)?;

    if cases.is_empty() {
        return Err(ListingError::NoTestCases);
    }
    Ok(cases)
}

fn flush_case(
    program_path: &Path,
    cases: &mut Vec<TestCase>,
    current_id: &mut Option<String>,
    current_props: &mut PropertiesMap,
) -> Result<(), ListingError> {
    if let Some(name) = current_id.take() {
        let id = TestCaseId::new(program_path, name)?;
        let props = std::mem::take(current_props);
        cases.push(TestCase::from_properties(id, props)?);
    }
    Ok(())
}

fn split_property(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn prog() -> PathBuf {
        PathBuf::from("/tmp/prog")
    }

    #[test]
    fn minimal_single_case() {
        let input = "Content-Type: application/X-atf-tp; version=\"1\"\n\nident: only\n";
        let cases = parse_test_cases(&prog(), Cursor::new(input)).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id().name(), "only");
        assert!(cases[0].properties().is_empty());
    }

    #[test]
    fn property_before_ident_is_an_error() {
        let input = "Content-Type: application/X-atf-tp; version=\"1\"\n\ndescr: foo\nident: first\n";
        let err = parse_test_cases(&prog(), Cursor::new(input)).unwrap_err();
        assert!(matches!(err, ListingError::PropertyBeforeIdent));
    }

    #[test]
    fn missing_header_is_an_error() {
        let input = "ident: only\n";
        let err = parse_test_cases(&prog(), Cursor::new(input)).unwrap_err();
        assert!(matches!(err, ListingError::MissingHeader));
    }

    #[test]
    fn missing_blank_line_is_an_error() {
        let input = "Content-Type: application/X-atf-tp; version=\"1\"\nident: only\n";
        let err = parse_test_cases(&prog(), Cursor::new(input)).unwrap_err();
        assert!(matches!(err, ListingError::MissingBlankLine));
    }

    #[test]
    fn empty_body_is_an_error() {
        let input = "Content-Type: application/X-atf-tp; version=\"1\"\n\n";
        let err = parse_test_cases(&prog(), Cursor::new(input)).unwrap_err();
        assert!(matches!(err, ListingError::NoTestCases));
    }

    #[test]
    fn multiple_cases_preserve_order() {
        let input = "Content-Type: application/X-atf-tp; version=\"1\"\n\nident: first\ndescr: a\n\nident: second\n";
        let cases = parse_test_cases(&prog(), Cursor::new(input)).unwrap();
        assert_eq!(cases[0].id().name(), "first");
        assert_eq!(cases[0].properties().get("descr"), Some("a"));
        assert_eq!(cases[1].id().name(), "second");
    }
}
