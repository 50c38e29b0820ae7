//! Identifier validation and quoting for dynamically generated SQL.
//!
//! Table and column names are derived from class, module and field names at
//! runtime and always contain the `$` separator, so they cannot be spliced
//! into statements bare. SQL identifiers cannot be bound as parameters; every
//! name goes through [`quote`] and every literal embedded in DDL (column
//! defaults) goes through [`sql_literal`].

use crate::error::{MapperError, Result};

/// Maximum identifier length accepted by the mapper.
const MAX_IDENTIFIER_LENGTH: usize = 512;

/// Validate an identifier before it is spliced into SQL.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MapperError::invalid("Identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(MapperError::invalid(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MapperError::invalid(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a SQLite identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
///
/// ```ignore
/// assert_eq!(quote("demo$A")?, "\"demo$A\"");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a comma separated column list.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Render text as a SQL string literal (single quotes doubled).
pub fn sql_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
