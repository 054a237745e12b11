//! Error types with fix suggestions

use thiserror::Error;

use crate::value::ValueType;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum ParamError {
    #[error("PARAM-001: Invalid parameter name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Binding errors (PARAM-010 to PARAM-012)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-010: Parameter(s) not bound: {}", .names.join(", "))]
    Unbound { names: Vec<String> },

    #[error("PARAM-011: Parameter '{name}' is not registered")]
    NotFound { name: String },

    #[error("PARAM-012: Parameter '{name}' is already bound")]
    AlreadyBound { name: String },

    // ─────────────────────────────────────────────────────────────
    // Typed read errors (PARAM-020)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-020: Parameter '{name}' holds {found}, cannot read it as {expected}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    // ─────────────────────────────────────────────────────────────
    // Query and binding-source errors (PARAM-030 to PARAM-040)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-030: Query syntax error at position {position}: {details}")]
    QuerySyntax { position: usize, details: String },

    #[error("PARAM-040: Invalid bindings: {details}")]
    InvalidBindings { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ParamError {
    /// Single-name convenience for the common unbound read
    pub fn unbound(name: impl Into<String>) -> Self {
        ParamError::Unbound {
            names: vec![name.into()],
        }
    }

    /// Stable error code, e.g. `PARAM-010`
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ParamError::InvalidName { .. } => Some("PARAM-001"),
            ParamError::Unbound { .. } => Some("PARAM-010"),
            ParamError::NotFound { .. } => Some("PARAM-011"),
            ParamError::AlreadyBound { .. } => Some("PARAM-012"),
            ParamError::TypeMismatch { .. } => Some("PARAM-020"),
            ParamError::QuerySyntax { .. } => Some("PARAM-030"),
            ParamError::InvalidBindings { .. } => Some("PARAM-040"),
            ParamError::Io(_) | ParamError::Json(_) | ParamError::Yaml(_) => None,
        }
    }
}

impl FixSuggestion for ParamError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ParamError::InvalidName { .. } => {
                Some("Use a letter or underscore, then letters, digits, or underscores")
            }
            ParamError::Unbound { .. } => Some("Bind every parameter before reading or rendering"),
            ParamError::NotFound { .. } => {
                Some("Register the parameter first, or check the name for typos")
            }
            ParamError::AlreadyBound { .. } => {
                Some("Enable rebinding or bind each parameter only once")
            }
            ParamError::TypeMismatch { .. } => {
                Some("Read the value with its own type or bind a convertible value")
            }
            ParamError::QuerySyntax { .. } => {
                Some("Placeholders look like @name; close every quoted literal")
            }
            ParamError::InvalidBindings { .. } => {
                Some("Bindings must be a JSON/YAML object of name: value")
            }
            ParamError::Io(_) => Some("Check file path and permissions"),
            ParamError::Json(_) => Some("Check JSON syntax"),
            ParamError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}
