//! Line-oriented G-code tokenizer.
//! Splits each input line into letter-prefixed codes, dropping comments and line numbers.

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// A single letter-prefixed token such as `X12.5` or `G1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    class: char,
    value: String,
}

/// Payload of a code that is not a finite decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid numeric literal '{literal}'")]
pub struct InvalidNumber {
    pub literal: String,
}

impl Code {
    pub fn new(class: char, value: impl Into<String>) -> Self {
        Self {
            class: class.to_ascii_uppercase(),
            value: value.into(),
        }
    }

    /// Uppercase class letter.
    pub fn class(&self) -> char {
        self.class
    }

    /// Raw payload following the class letter.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parses the payload as a finite decimal number.
    pub fn number(&self) -> Result<f64, InvalidNumber> {
        match self.value.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(InvalidNumber {
                literal: self.value.clone(),
            }),
        }
    }

    /// Normalised command name used for G/M dispatch, so `g01` and `G1` compare equal.
    ///
    /// A payload without digits is returned as written and matches no command.
    pub fn mnemonic(&self) -> String {
        if !self.value.bytes().any(|b| b.is_ascii_digit()) {
            return self.to_string();
        }
        let upper = self.value.to_ascii_uppercase();
        let trimmed = upper.trim_start_matches('0');
        if trimmed.is_empty() || trimmed.starts_with('.') {
            format!("{}0{}", self.class, trimmed)
        } else {
            format!("{}{}", self.class, trimmed)
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.value)
    }
}

/// Codes parsed from one input line, in order, plus the comment if there was one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub codes: Vec<Code>,
    pub comment: Option<String>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for code in &self.codes {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}", code)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("couldn't parse line: unexpected '{character}' at column {column}: {text}")]
    UnexpectedCharacter {
        character: char,
        column: usize,
        text: String,
    },
    #[error("error reading motion program: {0}")]
    Io(#[from] std::io::Error),
}

fn ends_token(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b';' || b == b'('
}

/// Parses a single line of text.
pub fn parse_line(text: &str) -> Result<Line, ParseError> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut line = Line::default();
    let mut pos = 0;

    while pos < len {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        match b {
            b';' => {
                let comment = text[pos + 1..].trim();
                if !comment.is_empty() {
                    line.comment = Some(comment.to_string());
                }
                return Ok(line);
            }
            b'(' => {
                // An unterminated comment runs to the end of the line.
                let end = text[pos..].find(')').map(|i| pos + i).unwrap_or(len);
                line.comment = Some(text[pos + 1..end].to_string());
                pos = (end + 1).min(len);
            }
            b'n' | b'N' => {
                pos += 1;
                while pos < len && !ends_token(bytes[pos]) {
                    pos += 1;
                }
            }
            b if b.is_ascii_alphabetic() => {
                let start = pos + 1;
                pos = start;
                while pos < len && !ends_token(bytes[pos]) {
                    pos += 1;
                }
                line.codes.push(Code::new(b as char, &text[start..pos]));
            }
            _ => {
                let character = text[pos..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
                return Err(ParseError::UnexpectedCharacter {
                    character,
                    column: text[..pos].chars().count() + 1,
                    text: text.to_string(),
                });
            }
        }
    }
    Ok(line)
}

/// Forward-only line producer over a byte stream.
///
/// Holds at most one line at a time. After end of input, or after an I/O
/// error, every further call yields `None`.
pub struct Parser<R> {
    lines: Lines<R>,
    line_number: usize,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            done: false,
        }
    }

    /// One-based number of the line most recently returned.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Yields the next line, a per-line parse error, or `None` at end of input.
    pub async fn next_line(&mut self) -> Option<Result<Line, ParseError>> {
        if self.done {
            return None;
        }
        match self.lines.next_line().await {
            Ok(Some(text)) => {
                self.line_number += 1;
                Some(parse_line(text.trim_end_matches('\r')))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(ParseError::Io(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(line: &Line) -> Vec<String> {
        line.codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_word_parsing() {
        let line = parse_line("G1 X10.0 Y-20.5 F1500").unwrap();
        assert_eq!(classes(&line), vec!["G1", "X10.0", "Y-20.5", "F1500"]);
        assert_eq!(line.comment, None);
    }

    #[test]
    fn test_lowercase_class_is_folded() {
        let line = parse_line("g1 x3").unwrap();
        assert_eq!(line.codes[0].class(), 'G');
        assert_eq!(line.codes[1].class(), 'X');
        assert_eq!(line.codes[1].number().unwrap(), 3.0);
    }

    #[test]
    fn test_semicolon_comment_ends_line() {
        let line = parse_line("G0 X1 ; move to start Y9").unwrap();
        assert_eq!(classes(&line), vec!["G0", "X1"]);
        assert_eq!(line.comment.as_deref(), Some("move to start Y9"));
    }

    #[test]
    fn test_paren_comment_resumes_scan() {
        let line = parse_line("G1 (cut) X2 Y3").unwrap();
        assert_eq!(classes(&line), vec!["G1", "X2", "Y3"]);
        assert_eq!(line.comment.as_deref(), Some("cut"));
    }

    #[test]
    fn test_comment_terminates_token() {
        let line = parse_line("X4;tail").unwrap();
        assert_eq!(classes(&line), vec!["X4"]);
        let line = parse_line("Y5(note)Z6").unwrap();
        assert_eq!(classes(&line), vec!["Y5", "Z6"]);
    }

    #[test]
    fn test_unterminated_paren_comment() {
        let line = parse_line("G1 X1 (never closed").unwrap();
        assert_eq!(classes(&line), vec!["G1", "X1"]);
        assert_eq!(line.comment.as_deref(), Some("never closed"));
    }

    #[test]
    fn test_line_numbers_are_discarded() {
        let line = parse_line("N42 G1 X1").unwrap();
        assert_eq!(classes(&line), vec!["G1", "X1"]);
        let line = parse_line("n7 G0").unwrap();
        assert_eq!(classes(&line), vec!["G0"]);
    }

    #[test]
    fn test_unexpected_character() {
        let err = parse_line("G1 X1 *71").unwrap_err();
        match err {
            ParseError::UnexpectedCharacter { character, column, .. } => {
                assert_eq!(character, '*');
                assert_eq!(column, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_line("%").is_err());
        assert!(parse_line("[G1]").is_err());
    }

    #[test]
    fn test_error_column_counts_characters() {
        let err = parse_line("(é) @").unwrap_err();
        match err {
            ParseError::UnexpectedCharacter { character, column, .. } => {
                assert_eq!(character, '@');
                assert_eq!(column, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_and_comment_only_lines() {
        assert!(parse_line("").unwrap().is_empty());
        assert!(parse_line("   \t").unwrap().is_empty());
        assert!(parse_line("; header").unwrap().is_empty());
    }

    #[test]
    fn test_reserialise_preserves_codes() {
        for text in ["G1 X10 Y-2.5 Z0.125", "M107", "G2 X0 Y0 I10 J0 F300"] {
            let line = parse_line(text).unwrap();
            assert_eq!(line.to_string(), text);
            let again = parse_line(&line.to_string()).unwrap();
            assert_eq!(again, line);
        }
        let spaced = parse_line("  G1   X1\tY2  ").unwrap();
        assert_eq!(spaced.to_string(), "G1 X1 Y2");
    }

    #[test]
    fn test_number_rejects_malformed_literals() {
        assert!(Code::new('X', "12..5").number().is_err());
        assert!(Code::new('X', "").number().is_err());
        assert!(Code::new('X', "inf").number().is_err());
        assert_eq!(Code::new('X', "-0.5").number().unwrap(), -0.5);
    }

    #[test]
    fn test_mnemonic_normalisation() {
        assert_eq!(Code::new('G', "01").mnemonic(), "G1");
        assert_eq!(Code::new('g', "0").mnemonic(), "G0");
        assert_eq!(Code::new('G', "00").mnemonic(), "G0");
        assert_eq!(Code::new('G', "21").mnemonic(), "G21");
        assert_eq!(Code::new('M', "107").mnemonic(), "M107");
    }

    #[test]
    fn test_mnemonic_without_digits_is_unchanged() {
        assert_eq!(Code::new('G', "").mnemonic(), "G");
        assert_eq!(Code::new('m', "").mnemonic(), "M");
        assert_eq!(Code::new('G', "x").mnemonic(), "Gx");
    }

    #[tokio::test]
    async fn test_parser_stream_recovers_per_line() {
        let src: &[u8] = b"G1 X1\r\n*bad*\nG1 X2\n";
        let mut parser = Parser::new(src);
        assert_eq!(parser.next_line().await.unwrap().unwrap().to_string(), "G1 X1");
        assert_eq!(parser.line_number(), 1);
        assert!(parser.next_line().await.unwrap().is_err());
        assert_eq!(parser.next_line().await.unwrap().unwrap().to_string(), "G1 X2");
        assert_eq!(parser.line_number(), 3);
        assert!(parser.next_line().await.is_none());
        assert!(parser.next_line().await.is_none());
    }
}
