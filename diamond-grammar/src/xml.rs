use crate::types::*;
use roxmltree::Node;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

pub const NS: &str = "http://relaxng.org/ns/structure/1.0";
pub const ANNOTATIONS_NS: &str = "http://relaxng.org/ns/compatibility/annotations/1.0";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expected value was not present in the input
    #[error("expected {1}")]
    Expected(Span, &'static str),
    /// An unexpected value was present in the input
    #[error("unexpected {1}")]
    Unexpected(Span, &'static str),
    #[error("malformed XML: {1}")]
    Xml(Span, String),
}

impl Error {
    pub fn span(&self) -> &Span {
        match self {
            Error::Expected(span, _) | Error::Unexpected(span, _) | Error::Xml(span, _) => span,
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

pub fn parse(text: &str) -> Result<Grammar> {
    let doc = roxmltree::Document::parse(text).map_err(|e| xml_error(text, &e))?;
    let root = doc.root_element();
    if !is_el(root, "grammar") {
        return Err(Error::Expected(
            root.range(),
            "<grammar> root element in the http://relaxng.org/ns/structure/1.0 namespace",
        ));
    }
    let mut builder = Builder::default();
    let root_id = builder.element(root, Tag::Grammar, None, "/grammar[1]".to_string())?;
    let mut grammar = Grammar {
        elements: builder.elements,
        root: root_id,
        by_path: builder.by_path,
        defines: HashMap::new(),
        start: None,
    };
    index_components(&mut grammar, root_id);
    Ok(grammar)
}

/// roxmltree reports errors as row/column positions, but everything else here deals in byte
/// offsets.
pub(crate) fn xml_error(text: &str, e: &roxmltree::Error) -> Error {
    let pos = e.pos();
    let line_start: usize = text
        .split('\n')
        .take(pos.row.saturating_sub(1) as usize)
        .map(|line| line.len() + 1)
        .sum();
    let start = (line_start + pos.col.saturating_sub(1) as usize).min(text.len());
    let end = (start + 1).min(text.len());
    Error::Xml(start..end, e.to_string())
}

#[derive(Default)]
struct Builder {
    elements: Vec<GrammarElement>,
    by_path: HashMap<String, GrammarId>,
}

impl Builder {
    fn element(
        &mut self,
        node: Node,
        tag: Tag,
        parent: Option<GrammarId>,
        path: String,
    ) -> Result<GrammarId> {
        let id = GrammarId(self.elements.len() as u32);
        let attrs = node
            .attributes()
            .filter(|a| a.namespace().is_none())
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        let text = node
            .children()
            .filter(|c| c.is_text())
            .filter_map(|c| c.text())
            .collect::<String>();
        self.elements.push(GrammarElement {
            tag,
            attrs,
            text,
            span: node.range(),
            path: path.clone(),
            parent,
            children: vec![],
        });
        self.by_path.insert(path.clone(), id);

        let mut counts: HashMap<Tag, usize> = HashMap::new();
        let mut children = vec![];
        for child in node.children().filter(|c| c.is_element()) {
            let tag = match child_tag(child)? {
                Some(tag) => tag,
                None => continue,
            };
            let n = counts.entry(tag).or_insert(0);
            *n += 1;
            let child_path = format!("{}/{}[{}]", path, tag.name(), n);
            children.push(self.element(child, tag, Some(id), child_path)?);
        }
        self.elements[id.0 as usize].children = children;
        Ok(id)
    }
}

fn child_tag(node: Node) -> Result<Option<Tag>> {
    match node.tag_name().namespace() {
        Some(NS) => Tag::from_rng_name(node.tag_name().name())
            .map(Some)
            .ok_or(Error::Unexpected(node.range(), "RELAX-NG element")),
        Some(ANNOTATIONS_NS) if node.tag_name().name() == "documentation" => {
            Ok(Some(Tag::Documentation))
        }
        // foreign annotations carry nothing we use
        _ => Ok(None),
    }
}

fn index_components(grammar: &mut Grammar, container: GrammarId) {
    let children = grammar.children(container).to_vec();
    for child in children {
        match grammar.tag(child) {
            Tag::Define => {
                let name = match grammar.get(child).attr("name") {
                    Some(name) => name.trim().to_string(),
                    None => {
                        warn!("<define> without a name at {}", grammar.path(child));
                        continue;
                    }
                };
                if grammar.defines.contains_key(&name) {
                    warn!(
                        "multiple definitions of {:?}; combining is not supported, using the first",
                        name
                    );
                } else {
                    grammar.defines.insert(name, child);
                }
            }
            Tag::Start => {
                if grammar.start.is_some() {
                    warn!("multiple <start> elements; using the first");
                } else {
                    grammar.start = Some(child);
                }
            }
            Tag::Div => index_components(grammar, child),
            _ => (),
        }
    }
}

pub(crate) fn is_el(node: Node, name: &'static str) -> bool {
    node.is_element() && node.tag_name().name() == name && is_rng_node(node)
}

pub(crate) fn is_rng_node(node: Node) -> bool {
    node.tag_name().namespace() == Some(NS)
}

/// Resolves `href` against any `xml:base` attributes in scope at `node`
pub(crate) fn rebase_path(node: Node, href: &str) -> PathBuf {
    let bases = node
        .ancestors()
        .filter_map(|node| node.attribute((XML_NS, "base")))
        .collect::<Vec<_>>();
    let mut result: Option<PathBuf> = None;
    for base in bases.iter().rev() {
        resolve(&mut result, base);
    }
    resolve(&mut result, href);
    result.unwrap_or_default()
}

fn resolve(result: &mut Option<PathBuf>, new: &str) {
    *result = Some(if new.starts_with('/') {
        PathBuf::from(new)
    } else {
        match result.take() {
            Some(mut old) => {
                if !old.to_string_lossy().ends_with('/') {
                    old.pop();
                }
                old.push(new);
                old
            }
            None => PathBuf::from(new),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::*;

    const LIBRARY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:a="http://relaxng.org/ns/compatibility/annotations/1.0"
         xmlns:x="urn:example:other">
  <start>
    <element name="library">
      <a:documentation>The library</a:documentation>
      <x:note>ignored</x:note>
      <ref name="book"/>
      <ref name="book"/>
    </element>
  </start>
  <define name="book">
    <element name="book"><text/></element>
  </define>
  <div>
    <define name="shelf"><empty/></define>
  </div>
</grammar>"#;

    #[test]
    fn it_works() {
        let grammar = parse(LIBRARY).unwrap();
        let start = grammar.start().unwrap();
        assert_eq!(grammar.path(start), "/grammar[1]/start[1]");
        let library = grammar.children(start)[0];
        assert_eq!(grammar.tag(library), Tag::Element);
        assert_eq!(grammar.get(library).attr("name"), Some("library"));
        let kids = grammar.children(library);
        assert_eq!(kids.len(), 3);
        assert_eq!(grammar.tag(kids[0]), Tag::Documentation);
        assert_eq!(grammar.get(kids[0]).text, "The library");
        assert_eq!(
            grammar.path(kids[2]),
            "/grammar[1]/start[1]/element[1]/ref[2]"
        );
        assert_eq!(grammar.by_path(grammar.path(kids[2])), Some(kids[2]));
    }

    #[test]
    fn defines_inside_div() {
        let grammar = parse(LIBRARY).unwrap();
        let shelf = grammar.define("shelf").unwrap();
        assert_eq!(grammar.path(shelf), "/grammar[1]/div[1]/define[1]");
        assert!(grammar.define("book").is_some());
        assert!(grammar.define("missing").is_none());
    }

    #[test]
    fn not_a_grammar() {
        let res = parse(r#"<element xmlns="http://relaxng.org/ns/structure/1.0" name="x"/>"#);
        assert_matches!(res, Err(Error::Expected(_, _)));
    }

    #[test]
    fn unknown_rng_element() {
        let res = parse(r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><bogus/></grammar>"#);
        assert_matches!(res, Err(Error::Unexpected(_, "RELAX-NG element")));
    }

    #[test]
    fn malformed_xml() {
        let res = parse("<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\n<start>");
        assert_matches!(res, Err(Error::Xml(_, _)));
    }

    #[test]
    fn rebase() {
        let doc = roxmltree::Document::parse(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" xml:base="schemas/main.rng"><include href="common.rng"/></grammar>"#,
        )
        .unwrap();
        let include = doc.root_element().first_element_child().unwrap();
        assert_eq!(
            rebase_path(include, "common.rng"),
            PathBuf::from("schemas/common.rng")
        );
        assert_eq!(rebase_path(include, "/abs.rng"), PathBuf::from("/abs.rng"));
    }
}
