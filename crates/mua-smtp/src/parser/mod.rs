//! SMTP response classifier.
//!
//! Each server line has the form `<3-digit code><'-' or ' '><text>`:
//! - Single: `250 OK`
//! - Multi: `250-First line`, `250-Second line`, `250 Last line`
//!
//! The functions here are pure. Which code a caller expects at a given step
//! is decided by the session, not by the classifier.

use crate::error::{Error, Result};
use crate::types::{ReplyCode, ServerResponse};

/// Outcome of comparing a response line against an expected code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyCheck {
    /// True iff the observed code equals the expected code.
    pub matched: bool,
    /// The parsed line.
    pub response: ServerResponse,
}

impl ReplyCheck {
    /// Returns the observed reply code.
    #[must_use]
    pub const fn code(&self) -> ReplyCode {
        self.response.code
    }

    /// Returns the observed status text (separator included).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.response.text
    }
}

/// Splits a response line into its status code and trailing text.
///
/// A trailing CRLF (or bare LF) is ignored. The returned text keeps the
/// separator character, so `parse_line("551 User not local")` yields
/// `(551, " User not local")`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the line is shorter than four
/// characters or the code is not three digits starting with 1-5.
pub fn parse_line(line: &str) -> Result<ServerResponse> {
    let line = strip_terminator(line);
    let bytes = line.as_bytes();

    if bytes.len() < 4 {
        return Err(Error::MalformedResponse(line.to_string()));
    }

    if !bytes[..3].iter().all(u8::is_ascii_digit) || !(b'1'..=b'5').contains(&bytes[0]) {
        return Err(Error::MalformedResponse(line.to_string()));
    }

    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));

    Ok(ServerResponse::new(ReplyCode::new(code), &line[3..]))
}

/// Parses a line and compares its code to `expected`.
///
/// Matching is exact: a 251 never satisfies an expected 250.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the line cannot be parsed.
pub fn check_reply(line: &str, expected: ReplyCode) -> Result<ReplyCheck> {
    let response = parse_line(line)?;
    Ok(ReplyCheck {
        matched: response.code == expected,
        response,
    })
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Only a `-` directly after the code continues the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    strip_terminator(line).as_bytes().get(3) != Some(&b'-')
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_greeting() {
        let resp = parse_line("220 ready.\r\n").unwrap();
        assert_eq!(resp.code, ReplyCode::SERVICE_READY);
        assert_eq!(resp.text, " ready.");
    }

    #[test]
    fn test_parse_keeps_separator() {
        let resp = parse_line("551 User not local").unwrap();
        assert_eq!(resp.code.as_u16(), 551);
        assert_eq!(resp.text, " User not local");

        let resp = parse_line("250-SIZE").unwrap();
        assert_eq!(resp.text, "-SIZE");
        assert!(resp.is_continuation());
    }

    #[test]
    fn test_parse_code_with_bare_separator() {
        let resp = parse_line("250 ").unwrap();
        assert_eq!(resp.text, " ");
        assert_eq!(resp.message(), "");
    }

    #[test]
    fn test_parse_error_too_short() {
        assert!(matches!(parse_line("25"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("250"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("250\r\n"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line(""), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_error_invalid_code() {
        assert!(matches!(parse_line("ABC OK"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("2x0 OK"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("+25 OK"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("650 OK"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("050 OK"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_error_non_ascii() {
        assert!(matches!(parse_line("2é0 OK"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_check_reply_exact_match() {
        let check = check_reply("250 OK\r\n", ReplyCode::OK).unwrap();
        assert!(check.matched);
        assert_eq!(check.code(), ReplyCode::OK);
        assert_eq!(check.text(), " OK");
    }

    #[test]
    fn test_check_reply_same_family_does_not_match() {
        let check = check_reply("250 OK", ReplyCode::FORWARD).unwrap();
        assert!(!check.matched);
        assert_eq!(check.code(), ReplyCode::OK);

        let check = check_reply("251 will forward", ReplyCode::OK).unwrap();
        assert!(!check.matched);
    }

    #[test]
    fn test_check_reply_malformed() {
        assert!(check_reply("OK", ReplyCode::OK).is_err());
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250 OK\r\n"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("250-Continuing\r\n"));
    }

    proptest! {
        #[test]
        fn parse_recovers_code_and_text(code in 100u16..600, sep in prop::sample::select(vec![' ', '-']), rest in "[ -~]{0,60}") {
            let text = format!("{sep}{rest}");
            let line = format!("{code}{text}");
            let resp = parse_line(&line).unwrap();
            prop_assert_eq!(resp.code.as_u16(), code);
            prop_assert_eq!(&resp.text, &text);
            prop_assert_eq!(resp.to_string(), line);
        }

        #[test]
        fn hyphen_continues_space_terminates(code in 100u16..600, rest in "[ -~]{0,60}") {
            let more = format!("{code}-{rest}\r\n");
            let last = format!("{code} {rest}\r\n");
            prop_assert!(!is_last_reply_line(&more));
            prop_assert!(!parse_line(&more).unwrap().is_last());
            prop_assert!(is_last_reply_line(&last));
            prop_assert!(parse_line(&last).unwrap().is_last());
        }

        #[test]
        fn matched_iff_codes_equal(code in 100u16..600, expected in 100u16..600) {
            let line = format!("{code} text");
            let check = check_reply(&line, ReplyCode::new(expected)).unwrap();
            prop_assert_eq!(check.matched, code == expected);
        }
    }
}
