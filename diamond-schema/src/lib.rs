//! Compiles RELAX-NG grammars into the element/choice descriptions that drive an options tree.
//!
//! Compilation is lazy: a `Schema` holds the (preprocessed) grammar and answers
//! `valid_children()` queries for one position at a time.

use codemap::CodeMap;
use diamond_grammar::{Files, FsFiles, Grammar, IncludeError, Preprocessor, Span, Tag};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

mod compile;
pub mod datatype;
pub mod model;

pub use compile::normalize_whitespace;
pub use datatype::{valid_data, Datatype, DatatypeError, ListLength, Primitive};
pub use model::{AttributeSpec, Cardinality, ChildSpec, ChoiceSpec, ElementSpec};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Include(#[from] IncludeError),
    #[error("invalid grammar: {0}")]
    Grammar(#[from] diamond_grammar::Error),
    #[error("the grammar has no <start>")]
    NoStart,
    #[error("<start> does not describe an element")]
    NoRootElement,
    #[error("<{construct}> at {path} is not supported")]
    Unsupported {
        construct: Tag,
        path: String,
        span: Span,
    },
}

/// A grammar position to ask for children of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    /// The grammar's `<start>`, whose only child is the document root element
    Start,
    /// The schema path of an `<element>`
    Path(&'a str),
}

#[derive(Debug, Clone)]
pub struct Schema {
    grammar: Grammar,
}

impl Schema {
    /// Compiles grammar text which has already had its includes resolved
    pub fn compile(grammar_text: &str) -> Result<Schema, SchemaError> {
        Schema::from_grammar(diamond_grammar::parse(grammar_text)?)
    }

    /// Preprocesses and compiles the grammar file at `path`
    pub fn load(path: &Path) -> Result<Schema, SchemaError> {
        Compiler::default().compile(path)
    }

    pub fn from_grammar(grammar: Grammar) -> Result<Schema, SchemaError> {
        if grammar.start().is_none() {
            return Err(SchemaError::NoStart);
        }
        Ok(Schema { grammar })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn valid_children(&self, position: Position) -> Result<Vec<ChildSpec>, SchemaError> {
        let id = match position {
            Position::Start => self.grammar.start().ok_or(SchemaError::NoStart)?,
            Position::Path(path) => match self.grammar.by_path(path) {
                Some(id) => id,
                None => {
                    warn!("no grammar position at {:?}", path);
                    return Ok(vec![]);
                }
            },
        };
        compile::Walker::new(&self.grammar).children_of(id)
    }

    /// The spec of the document root element
    pub fn root_spec(&self) -> Result<ChildSpec, SchemaError> {
        self.valid_children(Position::Start)?
            .into_iter()
            .next()
            .ok_or(SchemaError::NoRootElement)
    }
}

/// Loads schemas through a `Files` implementation, keeping the loaded grammar text around so
/// that errors can be reported against it.
pub struct Compiler<FS: Files> {
    codemap: CodeMap,
    fs: FS,
    file: Option<Arc<codemap::File>>,
}

impl Default for Compiler<FsFiles> {
    fn default() -> Self {
        Self::new(FsFiles)
    }
}

impl<FS: Files> Compiler<FS> {
    pub fn new(fs: FS) -> Compiler<FS> {
        Compiler {
            codemap: CodeMap::default(),
            fs,
            file: None,
        }
    }

    pub fn compile(&mut self, name: &Path) -> Result<Schema, SchemaError> {
        let text = Preprocessor::new(&self.fs).preprocess(name)?;
        let file = self
            .codemap
            .add_file(name.to_string_lossy().into_owned(), text);
        self.file = Some(file.clone());
        let grammar = diamond_grammar::parse(file.source())?;
        Schema::from_grammar(grammar)
    }

    pub fn dump_diagnostic(&self, err: &SchemaError) {
        let mut emitter = codemap_diagnostic::Emitter::stderr(
            codemap_diagnostic::ColorConfig::Auto,
            Some(&self.codemap),
        );
        let d = self.diagnostic(err);
        emitter.emit(&[d]);
    }

    fn convert_span(&self, span: &Span) -> Option<codemap::Span> {
        self.file.as_ref().and_then(|file| {
            let len = file.source().len();
            if span.start <= span.end && span.end <= len {
                Some(file.span.subspan(span.start as u64, span.end as u64))
            } else {
                None
            }
        })
    }

    fn diagnostic(&self, err: &SchemaError) -> codemap_diagnostic::Diagnostic {
        let (span, label) = match err {
            SchemaError::Grammar(e) => (Some(e.span()), "here"),
            SchemaError::Unsupported { span, .. } => (Some(span), "not supported"),
            _ => (None, ""),
        };
        let spans = span
            .and_then(|s| self.convert_span(s))
            .map(|span| {
                vec![codemap_diagnostic::SpanLabel {
                    span,
                    style: codemap_diagnostic::SpanStyle::Primary,
                    label: Some(label.to_owned()),
                }]
            })
            .unwrap_or_default();
        codemap_diagnostic::Diagnostic {
            level: codemap_diagnostic::Level::Error,
            message: err.to_string(),
            code: None,
            spans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::*;
    use std::collections::HashMap;
    use std::io;

    const CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:a="http://relaxng.org/ns/compatibility/annotations/1.0"
         datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <start>
    <element name="config">
      <a:documentation>
        Top level
        options
      </a:documentation>
      <ref name="node"/>
      <optional>
        <element name="comment"><data type="string"/></element>
      </optional>
      <zeroOrMore>
        <element name="count"><data type="integer"/></element>
      </zeroOrMore>
      <choice>
        <element name="fast"><empty/></element>
        <element name="slow"><empty/></element>
        <choice>
          <element name="medium"><empty/></element>
        </choice>
      </choice>
      <choice>
        <empty/>
        <oneOrMore><element name="extra"><text/></element></oneOrMore>
      </choice>
    </element>
  </start>
  <define name="node">
    <element name="node">
      <attribute name="name"/>
      <optional>
        <attribute name="colour">
          <choice><value>red</value><value>blue</value></choice>
        </attribute>
      </optional>
      <zeroOrMore><ref name="node"/></zeroOrMore>
    </element>
  </define>
</grammar>"#;

    const CONFIG_PATH: &str = "/grammar[1]/start[1]/element[1]";
    const NODE_PATH: &str = "/grammar[1]/define[1]/element[1]";

    fn element(spec: &ChildSpec) -> &ElementSpec {
        match spec {
            ChildSpec::Element(e) => e,
            ChildSpec::Choice(c) => panic!("expected an element, got {:?}", c),
        }
    }

    /// Wraps `body` as the content of a root element `r`
    fn root_with(body: &str) -> Schema {
        Schema::compile(&format!(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><element name="r">{}</element></start></grammar>"#,
            body
        ))
        .unwrap()
    }

    fn children_of_root(schema: &Schema) -> Vec<ChildSpec> {
        schema
            .valid_children(Position::Path("/grammar[1]/start[1]/element[1]"))
            .unwrap()
    }

    #[test]
    fn root() {
        let schema = Schema::compile(CONFIG).unwrap();
        let root = schema.root_spec().unwrap();
        let root = element(&root);
        assert_eq!(root.name, "config");
        assert_eq!(root.schema_path, CONFIG_PATH);
        assert_eq!(root.cardinality, Cardinality::ExactlyOne);
        assert_eq!(root.datatype, Datatype::None);
        assert_eq!(root.documentation.as_deref(), Some("Top level options"));
    }

    #[test]
    fn children() {
        let schema = Schema::compile(CONFIG).unwrap();
        let kids = schema.valid_children(Position::Path(CONFIG_PATH)).unwrap();
        assert_eq!(kids.len(), 5);

        let node = element(&kids[0]);
        assert_eq!(node.name, "node");
        assert_eq!(node.schema_path, NODE_PATH);
        assert_eq!(node.cardinality, Cardinality::ExactlyOne);
        assert_eq!(
            node.attributes.get("name"),
            Some(&AttributeSpec {
                datatype: Datatype::Primitive(Primitive::String),
                required: true
            })
        );
        assert_eq!(
            node.attributes.get("colour"),
            Some(&AttributeSpec {
                datatype: Datatype::Enumeration(vec!["red".to_string(), "blue".to_string()]),
                required: false
            })
        );

        let comment = element(&kids[1]);
        assert_eq!(comment.cardinality, Cardinality::Optional);
        assert_eq!(comment.datatype, Datatype::Primitive(Primitive::String));
        assert_eq!(
            comment.schema_path,
            "/grammar[1]/start[1]/element[1]/optional[1]/element[1]"
        );

        let count = element(&kids[2]);
        assert_eq!(count.cardinality, Cardinality::ZeroOrMore);
        assert_eq!(count.datatype, Datatype::Primitive(Primitive::Int));

        assert_matches!(&kids[3], ChildSpec::Choice(choice) => {
            assert_eq!(choice.schema_path, "/grammar[1]/start[1]/element[1]/choice[1]");
            assert_eq!(choice.cardinality, Cardinality::ExactlyOne);
            let names: Vec<_> = choice.alternatives.iter().map(|a| a.name.as_str()).collect();
            assert_eq!(names, vec!["fast", "slow", "medium"]);
        });
        assert_eq!(kids[3].name(), "fast:slow:medium");

        let extra = element(&kids[4]);
        assert_eq!(extra.name, "extra");
        assert_eq!(extra.cardinality, Cardinality::OneOrMore);
        assert_eq!(
            extra.schema_path,
            "/grammar[1]/start[1]/element[1]/choice[2]/oneOrMore[1]/element[1]"
        );
    }

    #[test]
    fn recursion_is_lazy() {
        let schema = Schema::compile(CONFIG).unwrap();
        let kids = schema.valid_children(Position::Path(NODE_PATH)).unwrap();
        assert_eq!(kids.len(), 1);
        let nested = element(&kids[0]);
        assert_eq!(nested.name, "node");
        assert_eq!(nested.schema_path, NODE_PATH);
        assert_eq!(nested.cardinality, Cardinality::ZeroOrMore);
    }

    #[test]
    fn unknown_position() {
        let schema = Schema::compile(CONFIG).unwrap();
        let kids = schema
            .valid_children(Position::Path("/grammar[1]/nowhere[7]"))
            .unwrap();
        assert!(kids.is_empty());
    }

    #[test]
    fn missing_start() {
        let res = Schema::compile(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><define name="x"><empty/></define></grammar>"#,
        );
        assert_matches!(res, Err(SchemaError::NoStart));
    }

    #[test]
    fn any_name_is_fatal() {
        let schema = Schema::compile(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><element><anyName/><empty/></element></start></grammar>"#,
        )
        .unwrap();
        assert_matches!(
            schema.root_spec(),
            Err(SchemaError::Unsupported {
                construct: Tag::AnyName,
                ..
            })
        );
    }

    #[test]
    fn unresolved_ref_is_skipped() {
        let schema = root_with(r#"<ref name="missing"/><element name="b"><empty/></element>"#);
        let kids = children_of_root(&schema);
        assert_eq!(kids.len(), 1);
        assert_eq!(element(&kids[0]).name, "b");
    }

    #[test]
    fn unnamed_element_is_skipped() {
        let schema = root_with(r#"<element><empty/></element><element name="b"><empty/></element>"#);
        let kids = children_of_root(&schema);
        assert_eq!(kids.len(), 1);
    }

    #[test]
    fn nested_cardinality() {
        let schema = root_with(
            r#"<optional><oneOrMore><element name="x"><empty/></element></oneOrMore></optional>
               <zeroOrMore><group><element name="a"><empty/></element><element name="b"><empty/></element></group></zeroOrMore>
               <optional><optional><element name="c"><empty/></element></optional></optional>"#,
        );
        let cards: Vec<_> = children_of_root(&schema)
            .iter()
            .map(|k| k.cardinality())
            .collect();
        assert_eq!(
            cards,
            vec![
                Cardinality::ZeroOrMore,
                Cardinality::ZeroOrMore,
                Cardinality::ZeroOrMore,
                Cardinality::Optional
            ]
        );
    }

    #[test]
    fn empty_choice_is_optional_construct() {
        let schema = root_with(
            r#"<choice><element name="x"><empty/></element><empty/></choice>
               <choice><empty/><optional><element name="y"><empty/></element></optional></choice>"#,
        );
        let kids = children_of_root(&schema);
        assert_eq!(kids.len(), 2);
        assert_eq!(element(&kids[0]).name, "x");
        assert_eq!(kids[0].cardinality(), Cardinality::ExactlyOne);
        assert_eq!(element(&kids[1]).name, "y");
        assert_eq!(kids[1].cardinality(), Cardinality::Optional);
    }

    #[test]
    fn datatype_collapse() {
        let schema = root_with(
            r#"<element name="fixed"><value> v1 </value></element>
               <element name="enum"><choice><value>a</value><value>b</value></choice></element>
               <element name="mixed"><choice><value>auto</value><data type="integer"/></choice></element>
               <element name="first"><choice><data type="integer"/><data type="float"/></choice></element>
               <element name="plus"><list><oneOrMore><data type="float"/></oneOrMore></list></element>
               <element name="three"><list><data type="float"/><data type="float"/><data type="float"/></list></element>
               <element name="unknown"><data type="frobnicate"/></element>
               <element name="attrs"><attribute name="plain"/><attribute name="kind"><value>k</value></attribute></element>"#,
        );
        let kids = children_of_root(&schema);
        let types: Vec<_> = kids.iter().map(|k| element(k).datatype.clone()).collect();
        assert_eq!(
            types,
            vec![
                Datatype::Fixed("v1".to_string()),
                Datatype::Enumeration(vec!["a".to_string(), "b".to_string()]),
                Datatype::Mixed {
                    values: vec!["auto".to_string()],
                    fallback: Box::new(Datatype::Primitive(Primitive::Int)),
                },
                Datatype::Primitive(Primitive::Int),
                Datatype::List {
                    item: Primitive::Float,
                    length: ListLength::OneOrMore
                },
                Datatype::List {
                    item: Primitive::Float,
                    length: ListLength::Exactly(3)
                },
                Datatype::Primitive(Primitive::String),
                Datatype::None,
            ]
        );
        let attrs = &element(&kids[7]).attributes;
        assert_eq!(
            attrs["plain"].datatype,
            Datatype::Primitive(Primitive::String)
        );
        assert_eq!(attrs["kind"].datatype, Datatype::Fixed("k".to_string()));
        assert_eq!(element(&kids[7]).fixed_name(), None);
    }

    #[test]
    fn schema_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
        assert_send_sync::<ChildSpec>();
    }

    #[test]
    fn compile_with_includes() {
        struct FS(HashMap<&'static str, &'static str>);
        impl Files for FS {
            fn load(&self, name: &Path) -> io::Result<String> {
                name.to_str()
                    .and_then(|n| self.0.get(n))
                    .map(|t| t.to_string())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
            }
        }
        let mut files = HashMap::new();
        files.insert(
            "main.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><ref name="top"/></start><include href="defs.rng"/></grammar>"#,
        );
        files.insert(
            "defs.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><define name="top"><element name="top"><empty/></element></define></grammar>"#,
        );
        let mut compiler = Compiler::new(FS(files));
        let schema = compiler.compile(Path::new("main.rng")).unwrap();
        assert_eq!(element(&schema.root_spec().unwrap()).name, "top");

        let res = compiler.compile(Path::new("absent.rng"));
        assert_matches!(res, Err(SchemaError::Include(IncludeError::Io(_, _))));
    }
}
