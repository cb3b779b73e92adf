use std::path::PathBuf;
use thiserror::Error;

use crate::attributes::OwnerKind;
use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum BinderError {
    #[error("{what} number must be in [{low}, {high}), {given} given")]
    OutOfRange {
        what: &'static str,
        low: i64,
        high: i64,
        given: i64,
    },

    #[error("Slice step must not be zero")]
    InvalidStep,

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("Attribute {name} is not applicable to {owner}")]
    AttributeNotApplicable { name: String, owner: OwnerKind },

    #[error("Notification protocol error: {0}")]
    Protocol(String),

    #[error("Engine call {op} failed{}: {source}", position_suffix(.position))]
    Engine {
        op: &'static str,
        position: Option<usize>,
        #[source]
        source: EngineError,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unsupported container format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Configuration error: {0}")]
    Config(#[from] confique::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn position_suffix(position: &Option<usize>) -> String {
    match position {
        Some(pos) => format!(" at position {}", pos),
        None => String::new(),
    }
}

impl BinderError {
    pub(crate) fn engine(op: &'static str, position: Option<usize>, source: EngineError) -> Self {
        BinderError::Engine {
            op,
            position,
            source,
        }
    }

    /// The vendor status code, when this error came from the document engine.
    pub fn engine_code(&self) -> Option<u32> {
        match self {
            BinderError::Engine { source, .. } => Some(source.code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BinderError>;
