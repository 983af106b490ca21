use thiserror::Error;

use crate::sql::ast::Statement;
use crate::storage::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE, Row};

/// Statement-level input errors. The `Display` text is exactly what the
/// REPL shows the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unrecognized statement: '{0}'.")]
    Unrecognized(String),
    #[error("Syntax error. Could not parse statement '{0}'.")]
    Syntax(String),
    #[error("ID must be positive.")]
    InvalidId,
    #[error("String is too long.")]
    StringTooLong,
}

/// Parse one non-meta input line into a statement.
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let mut tokens = input.split_whitespace();
    match tokens.next() {
        Some("insert") => parse_insert(input, &mut tokens),
        Some("select") => {
            if tokens.next().is_some() {
                Err(ParseError::Unrecognized(input.to_string()))
            } else {
                Ok(Statement::Select)
            }
        }
        _ => Err(ParseError::Unrecognized(input.to_string())),
    }
}

fn parse_insert<'a>(
    input: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<Statement, ParseError> {
    // Token presence is checked before any field is validated; anything
    // past the email token is ignored.
    let (Some(id_str), Some(username), Some(email)) =
        (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::Syntax(input.to_string()));
    };

    let id: u32 = id_str.parse().map_err(|_| ParseError::InvalidId)?;

    if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
        return Err(ParseError::StringTooLong);
    }

    Ok(Statement::Insert(Row::new(id, username, email)))
}
