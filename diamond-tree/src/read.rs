//! Reconciliation of an existing XML document with the schema.
//!
//! The tree is built top-down.  At each element the schema's child slots claim the document's
//! child elements: exactly-one slots first, then one-or-more, optional and zero-or-more, each
//! taking the first available element(s) that fit.  Optional slots absent from the document
//! are recovered from magic comments where possible.  Document elements left unclaimed are
//! reported as lost rather than silently dropped.

use crate::magic::{MagicComment, MagicError};
use crate::tree::{NodeId, Tree};
use diamond_schema::{Cardinality, ChildSpec, ElementSpec, Position, Schema, SchemaError};
use roxmltree::Node;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("malformed XML document: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("malformed magic comment: {0}")]
    MagicComment(#[from] MagicError),
}

/// Where a lost element was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LostSource {
    /// The live document
    Document,
    /// A subtree recovered from the magic comment for the given schema path
    Hidden { schema_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostElement {
    pub source: LostSource,
    /// The element's source text
    pub xml: String,
}

/// Elements that could not be placed in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LostElements {
    elements: Vec<LostElement>,
}

impl LostElements {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LostElement> {
        self.elements.iter()
    }

    /// Lost elements of the live document, as opposed to those from recovered subtrees
    pub fn from_document(&self) -> impl Iterator<Item = &LostElement> {
        self.elements
            .iter()
            .filter(|l| l.source == LostSource::Document)
    }

    fn push(&mut self, source: &LostSource, xml: &str) {
        self.elements.push(LostElement {
            source: source.clone(),
            xml: xml.to_string(),
        });
    }
}

impl fmt::Display for LostElements {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for lost in &self.elements {
            writeln!(f, "{}", lost.xml)?;
        }
        Ok(())
    }
}

/// Builds a tree for `xml`, which is expected to be an instance of `schema`
pub fn read(schema: &Schema, xml: &str) -> Result<(Tree, LostElements), ReadError> {
    let doc = roxmltree::Document::parse(xml)?;
    let spec = schema.root_spec()?;
    let root_xml = doc.root_element();
    if !spec
        .alternatives()
        .iter()
        .any(|a| a.name == root_xml.tag_name().name())
    {
        warn!(
            "document root <{}> does not match the schema root <{}>",
            root_xml.tag_name().name(),
            spec.name()
        );
    }
    let mut reader = Reader {
        schema,
        tree: Tree::from_spec(&spec),
        lost: LostElements::default(),
    };
    let root = reader.tree.root();
    reader.merge(root, root_xml);
    reader.fill_alternatives(root, root_xml, true)?;
    let current = reader.tree.current(root);
    reader.read_core(current, Some(root_xml), xml, &LostSource::Document)?;
    if !reader.lost.is_empty() {
        warn!(
            "{} element(s) could not be placed in the schema",
            reader.lost.len()
        );
    }
    Ok((reader.tree, reader.lost))
}

enum Assignment {
    Absent,
    Live(Vec<usize>),
    Hidden(String),
}

struct Reader<'s> {
    schema: &'s Schema,
    tree: Tree,
    lost: LostElements,
}

/// Whether document element `x` can be an instance of `alt`
fn fits(alt: &ElementSpec, x: Node) -> bool {
    alt.name == x.tag_name().name()
        && alt
            .fixed_name()
            .map_or(true, |name| x.attribute("name") == Some(name))
}

fn first_text<'a>(x: Node<'a, '_>) -> Option<&'a str> {
    x.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .map(str::trim)
        .find(|t| !t.is_empty())
}

/// The decoded content of the first magic comment directly below `parent` for `schema_path`
fn find_hidden(parent: Node, schema_path: &str) -> Result<Option<String>, MagicError> {
    for comment in parent.children().filter(|c| c.is_comment()) {
        let magic = match comment.text().and_then(MagicComment::parse) {
            Some(magic) => magic,
            None => continue,
        };
        if magic.schema_path != schema_path {
            continue;
        }
        let text = magic.decode()?;
        if text.contains("<?xml version=") {
            debug!("ignoring legacy magic comment for {}", schema_path);
            continue;
        }
        return Ok(Some(text));
    }
    Ok(None)
}

impl<'s> Reader<'s> {
    fn read_core(
        &mut self,
        elem: NodeId,
        xml: Option<Node>,
        src: &str,
        origin: &LostSource,
    ) -> Result<(), ReadError> {
        let xml = match xml {
            Some(xml) => xml,
            None => {
                self.tree.expand(self.schema, elem)?;
                return Ok(());
            }
        };
        let path = self.tree.schema_path(elem).to_string();
        let specs = self.schema.valid_children(Position::Path(&path))?;
        let xml_children: Vec<Node> = xml.children().filter(|c| c.is_element()).collect();

        let known: HashSet<&str> = specs
            .iter()
            .flat_map(|s| s.alternatives().iter().map(|a| a.name.as_str()))
            .collect();
        let mut available: Vec<bool> = xml_children
            .iter()
            .map(|c| known.contains(c.tag_name().name()))
            .collect();

        let mut order: Vec<usize> = (0..specs.len()).collect();
        order.sort_by_key(|&i| specs[i].cardinality().priority());
        let mut assigned: Vec<Assignment> = specs.iter().map(|_| Assignment::Absent).collect();
        for i in order {
            let spec = &specs[i];
            let card = spec.cardinality();
            if card.is_singular() {
                let mut found = None;
                'alts: for alt in spec.alternatives() {
                    for (j, x) in xml_children.iter().enumerate() {
                        if available[j] && fits(alt, *x) {
                            found = Some(j);
                            break 'alts;
                        }
                    }
                }
                assigned[i] = match found {
                    Some(j) => {
                        available[j] = false;
                        Assignment::Live(vec![j])
                    }
                    None if card == Cardinality::Optional => {
                        match find_hidden(xml, spec.schema_path())? {
                            Some(text) => Assignment::Hidden(text),
                            None => Assignment::Absent,
                        }
                    }
                    None => Assignment::Absent,
                };
            } else {
                let matched: Vec<usize> = (0..xml_children.len())
                    .filter(|&j| {
                        available[j]
                            && spec.alternatives().iter().any(|alt| fits(alt, xml_children[j]))
                    })
                    .collect();
                for &j in &matched {
                    available[j] = false;
                }
                assigned[i] = Assignment::Live(matched);
            }
        }

        let mut used = vec![false; xml_children.len()];
        let hidden = matches!(origin, LostSource::Hidden { .. });
        let mut pending: Vec<(NodeId, Option<usize>)> = vec![];
        for (spec, assignment) in specs.iter().zip(assigned) {
            let card = spec.cardinality();
            match assignment {
                Assignment::Live(matched) => {
                    for &j in &matched {
                        used[j] = true;
                        let id = self.add_child(elem, spec, true);
                        self.merge(id, xml_children[j]);
                        self.fill_alternatives(id, xml, card.is_singular())?;
                        pending.push((self.tree.current(id), Some(j)));
                    }
                    if card.is_repeatable() && !(hidden && matched.is_empty()) {
                        if matched.is_empty() && card == Cardinality::OneOrMore {
                            let id = self.add_child(elem, spec, true);
                            pending.push((id, None));
                        }
                        self.add_child(elem, spec, false);
                    }
                }
                Assignment::Hidden(text) => {
                    let id = self.add_child(elem, spec, false);
                    self.read_hidden(id, spec.schema_path(), &text)?;
                    self.fill_alternatives(id, xml, true)?;
                }
                // a recovered subtree holds exactly what was saved; the rest of its structure
                // is filled in by `Tree::expand` when it is activated
                Assignment::Absent if hidden => {}
                Assignment::Absent => {
                    let active = card == Cardinality::ExactlyOne;
                    let id = self.add_child(elem, spec, active);
                    if active {
                        self.fill_alternatives(id, xml, true)?;
                        pending.push((self.tree.current(id), None));
                    }
                }
            }
        }

        for (j, x) in xml_children.iter().enumerate() {
            if !used[j] {
                self.lost.push(origin, &src[x.range()]);
            }
        }

        for (id, j) in pending {
            self.read_core(id, j.map(|j| xml_children[j]), src, origin)?;
        }
        self.tree.recompute_validity(elem);
        Ok(())
    }

    fn add_child(&mut self, parent: NodeId, spec: &ChildSpec, active: bool) -> NodeId {
        let id = self.tree.instantiate(spec, Some(parent));
        self.tree.set_active_flag(id, active);
        self.tree.push_child(parent, id);
        id
    }

    /// Populates the alternatives of a choice other than the current one: from magic comments
    /// under `xml` for singular choices, otherwise from the schema
    fn fill_alternatives(&mut self, id: NodeId, xml: Node, singular: bool) -> Result<(), ReadError> {
        let choice = match self.tree.choice(id) {
            Some(c) => c.clone(),
            None => return Ok(()),
        };
        for (i, &alt) in choice.alternatives().iter().enumerate() {
            if i == choice.index() {
                continue;
            }
            let hidden = if singular {
                find_hidden(xml, self.tree.schema_path(alt))?
            } else {
                None
            };
            match hidden {
                Some(text) => {
                    let path = self.tree.schema_path(alt).to_string();
                    self.read_hidden(alt, &path, &text)?;
                }
                None => self.tree.expand(self.schema, alt)?,
            }
        }
        Ok(())
    }

    /// Fills `id` from the decoded content of a magic comment
    fn read_hidden(&mut self, id: NodeId, schema_path: &str, text: &str) -> Result<(), ReadError> {
        let malformed = |message: String| MagicError::Xml {
            path: schema_path.to_string(),
            message,
        };
        let doc = roxmltree::Document::parse(text).map_err(|e| malformed(e.to_string()))?;
        let node = doc
            .root_element()
            .first_element_child()
            .ok_or_else(|| malformed("no element inside the wrapper".to_string()))?;
        self.merge(id, node);
        let origin = LostSource::Hidden {
            schema_path: schema_path.to_string(),
        };
        let current = self.tree.current(id);
        self.read_core(current, Some(node), text, &origin)
    }

    /// Copies attributes and data from `x` onto `id`, first picking the matching alternative
    /// if `id` is a choice
    fn merge(&mut self, id: NodeId, x: Node) {
        if self.tree.choice(id).is_some() {
            self.select_alternative(id, x);
        }
        let target = self.tree.current(id);
        let names: Vec<String> = self
            .tree
            .current_element(target)
            .attrs()
            .keys()
            .cloned()
            .collect();
        for name in names {
            if let Some(value) = x.attribute(name.as_str()) {
                if let Err(e) = self.tree.set_attr(target, &name, value) {
                    debug!("ignoring attribute {}={:?} on <{}>: {}", name, value, x.tag_name().name(), e);
                }
            }
        }
        if let Some(text) = first_text(x) {
            if self.tree.current_element(target).datatype().is_settable() {
                if let Err(e) = self.tree.set_data(target, text) {
                    debug!("ignoring data {:?} in <{}>: {}", text, x.tag_name().name(), e);
                }
            } else {
                debug!("ignoring text in <{}>, which takes no data", x.tag_name().name());
            }
        }
    }

    fn select_alternative(&mut self, id: NodeId, x: Node) {
        let tag = x.tag_name().name();
        let alternatives = match self.tree.choice(id) {
            Some(c) => c.alternatives().to_vec(),
            None => return,
        };
        let tree = &self.tree;
        let same_tag = |&a: &NodeId| tree.current_element(a).name() == tag;
        let pick = match x.attribute("name") {
            Some(name) => alternatives
                .iter()
                .position(|a| same_tag(a) && tree.current_element(*a).fixed_name() == Some(name))
                .or_else(|| {
                    alternatives.iter().position(|a| {
                        let e = tree.current_element(*a);
                        same_tag(a) && e.fixed_name().is_none() && e.attrs().contains_key("name")
                    })
                })
                .or_else(|| alternatives.iter().position(same_tag)),
            None => alternatives.iter().position(same_tag),
        };
        if let Some(i) = pick {
            if let Err(e) = self.tree.set_active_choice(id, i) {
                debug!("could not select alternative {} of {:?}: {}", i, id, e);
            }
        }
    }
}
