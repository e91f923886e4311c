//! Table and lock names are built with `format!` against a transport/
//! destination name because neither MySQL nor sqlx's query binding can
//! parameterize an identifier. Validating the name up front (ASCII
//! alphanumeric/underscore, not digit-led, bounded length) is what keeps
//! that `format!` from being a SQL injection vector when the name happens
//! to come from outside this crate's own constants.

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid outbox identifier (1-64 ASCII letters, digits or underscores, not starting with a digit)")]
pub struct InvalidIdentifier(pub String);

pub fn validate_identifier(name: &str) -> Result<(), InvalidIdentifier> {
    let first_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if first_ok && rest_ok && name.len() <= 64 {
        Ok(())
    } else {
        Err(InvalidIdentifier(name.to_string()))
    }
}
