use std::fmt;

/// Errors produced when parsing an expression or template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    input: String,
    offset: usize,
    message: String,
}

impl ParseError {
    pub(crate) fn new(input: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            offset,
            message: message.into(),
        }
    }

    /// The text that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Byte offset into [`input`](Self::input) where parsing stopped.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error in '{}' at offset {}: {}",
            self.input, self.offset, self.message
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ParseError::new("a &&", 4, "expected expression");
        assert_eq!(
            err.to_string(),
            "parse error in 'a &&' at offset 4: expected expression"
        );
        assert_eq!(err.offset(), 4);
        assert_eq!(err.input(), "a &&");
    }
}
