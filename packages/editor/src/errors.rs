//! Error types for the editor

use crate::component::ComponentId;
use thiserror::Error;
use weft_parser::{ParseError, TreeError};

#[derive(Error, Debug)]
pub enum EditorError {
    /// The text could not be tokenized
    #[error("IO error: {0}")]
    Io(#[from] ParseError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("A synchronization pass is already in progress")]
    AlreadySyncing,

    #[error("No synchronization pass is in progress")]
    NotSyncing,

    /// The document element is not the one this engine accepts
    #[error("Unexpected root element `{found}` (expected `{expected}`)")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Unknown component {0}")]
    UnknownComponent(ComponentId),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Config(e.to_string())
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
