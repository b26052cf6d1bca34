//! Crate-level error type.

use crate::config::ConfigError;
use crate::parser::SyntaxError;
use crate::sql_compiler::CompileError;
use thiserror::Error;

/// Any failure between a filter string (or config file) and a statement.
#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Format the error, pointing into `source` for syntax errors.
    pub fn format_with_source(&self, source: &str) -> String {
        match self {
            Error::Syntax(e) => e.format_with_source(source),
            other => format!("error: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tag_cache::TagNotFound;

    #[test]
    fn test_error_messages() {
        let err: Error = parse("a &").unwrap_err().into();
        assert_eq!(err.to_string(), "syntax error: Expected identifier, found end of input");
        assert!(err.format_with_source("a &").contains("   ^"));

        let err: Error = CompileError::from(TagNotFound {
            key: "tag9".to_string(),
        })
        .into();
        assert_eq!(err.to_string(), "compile error: Tag not found: tag9");
        assert_eq!(err.format_with_source("tag9"), "error: compile error: Tag not found: tag9");
    }
}
