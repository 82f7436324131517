pub mod diff;
pub mod error;
pub mod id_generator;
pub mod mutation;
pub mod parser;
pub mod serializer;
pub mod snapshot;
pub mod tokenizer;
pub mod tree;
pub mod visitor;

#[cfg(test)]
mod tests_serializer;

pub use diff::{diff, reidentify};
pub use error::{ParseError, ParseResult, TreeError};
pub use id_generator::{get_document_id, IDGenerator};
pub use mutation::MutationOp;
pub use parser::{parse, parse_fragment, parse_with_ids, parse_with_path, Parser};
pub use serializer::{serialize, serialize_node, Serializer};
pub use snapshot::{NodeSnapshot, SnapshotPair};
pub use tokenizer::{tokenize, Lexeme, TokenKind};
pub use tree::{AttributeData, ElementData, NodeData, NodeId, NodeKind, RawNode, RawToken, RawTree};
pub use visitor::{NodeStats, Visitor};

#[cfg(feature = "pretty-errors")]
pub use error::format_error;
