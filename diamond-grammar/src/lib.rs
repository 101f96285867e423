//! Reading of RELAX-NG grammars in the XML syntax, plus flattening of `<include>` directives.

mod files;
mod preprocess;
pub mod types;
pub mod xml;

pub use files::{Files, FsFiles};
pub use preprocess::{preprocess, IncludeError, Preprocessor};
pub use types::{Grammar, GrammarElement, GrammarId, Span, Tag};
pub use xml::{parse, Error};
