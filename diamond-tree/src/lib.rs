//! The options tree an editor works on: a schema-shaped tree of elements and choices that
//! tracks which optional parts are active and whether everything the schema requires is
//! present and well-typed.  Documents are read by reconciling existing XML with the schema,
//! and written back with inactive parts preserved as magic comments.

mod expand;
pub mod magic;
mod plugins;
mod read;
mod tree;
mod write;

pub use expand::Toggle;
pub use magic::{MagicComment, MagicError};
pub use plugins::{Plugin, PluginRegistry};
pub use read::{read, LostElement, LostElements, LostSource, ReadError};
pub use tree::{Attribute, Choice, Element, Node, NodeId, Tree, TreeError};
pub use write::{WriteError, WriteOptions, INACTIVE_OPTIONAL, NEGLECTED_CHOICE};
