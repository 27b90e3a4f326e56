//! Comment-preserving YAML documents.
//!
//! Templates are rewritten in place: bases are merged in, relative paths are
//! made absolute, scripts are inlined. All of this goes through [`Edit`]s
//! applied to a [`Document`], so comments written by template authors stay
//! attached to the values they describe.

mod document;
mod edit;
mod emitter;
mod node;
mod parser;
mod path;

pub use document::Document;
pub use edit::{Edit, Position};
pub use node::{Comments, Node, NodeKind};
pub use path::{NodePath, Segment};
