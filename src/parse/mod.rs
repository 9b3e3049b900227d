mod error;
mod grammar;

pub use error::ParseError;

use crate::types::{Expr, Template};

/// Parse an expression string such as `asset.technology.database && !asset.out_of_scope`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a complete, valid expression.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::expression
        .parse(input)
        .map_err(|e| ParseError::new(input, e.offset(), describe(&e.inner().to_string())))
}

/// Parse a text template such as `Unencrypted storage at {asset.title}`.
///
/// # Errors
///
/// Returns [`ParseError`] on an unclosed interpolation, a stray `}` or an
/// invalid embedded expression.
pub fn parse_template(input: &str) -> Result<Template, ParseError> {
    use winnow::Parser;
    grammar::template
        .parse(input)
        .map_err(|e| ParseError::new(input, e.offset(), describe(&e.inner().to_string())))
}

fn describe(context: &str) -> String {
    if context.is_empty() {
        "unexpected input".to_owned()
    } else {
        context.to_owned()
    }
}
