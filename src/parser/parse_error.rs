use thiserror::Error;

use crate::parser::QueryParser;

/// Why a statement could not be read, with the offending slice of text and
/// its character span.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at [{start}:{end}] -> '{text}'")]
pub struct ParseError {
    pub message: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    /// Spans from `pivot` to the parser's cursor.
    pub fn new(message: &str, pivot: usize, parser: &QueryParser) -> Self {
        Self {
            message: message.to_string(),
            text: parser.text_from_range(pivot, parser.position + 1),
            start: pivot,
            end: parser.position,
        }
    }

    pub fn err<T>(self) -> Result<T, ParseError> {
        Err(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ParseError, QueryParser};

    #[test]
    pub fn test_error_span_and_message() {
        let mut parser = QueryParser::new("SELECT a FROM");
        parser.position = 9;

        let error = ParseError::new("Missing collection", 7, &parser);

        assert_eq!(error.start, 7);
        assert_eq!(error.end, 9);
        assert_eq!(error.text, "a F");
        assert_eq!(error.to_string(), "Missing collection at [7:9] -> 'a F'");
    }
}
