//! Serialisation of a tree back into XML.
//!
//! Active nodes become elements.  Inactive optional nodes and the neglected alternatives of
//! singular choices become magic comments, so nothing the user entered is lost when the
//! document is saved.  Inactive instances of repeatable slots only exist as templates for new
//! instances and produce no output.

use crate::magic::{self, MagicError};
use crate::tree::{Choice, Node, NodeId, Tree};
use diamond_schema::Cardinality;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{self, Write};

pub const INACTIVE_OPTIONAL: &str = "inactive optional subtree";
pub const NEGLECTED_CHOICE: &str = "neglected choice subtree";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Spaces per nesting level, or `None` to write everything on one line
    pub indent: Option<usize>,
    /// Whether to start the output with an XML declaration
    pub declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            indent: Some(2),
            declaration: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Magic(#[from] MagicError),
}

type Result<T> = std::result::Result<T, WriteError>;

impl Tree {
    /// Writes the whole tree as an XML document
    pub fn write<W: io::Write>(&self, sink: W, opts: &WriteOptions) -> Result<()> {
        self.write_node(self.root(), sink, opts)
    }

    /// Writes the subtree of `id` as an XML document.  When `id` is a choice without a parent,
    /// its other alternatives are kept as magic comments inside the written element.
    pub fn write_node<W: io::Write>(&self, id: NodeId, sink: W, opts: &WriteOptions) -> Result<()> {
        let mut w = match opts.indent {
            Some(n) => Writer::new_with_indent(sink, b' ', n),
            None => Writer::new(sink),
        };
        if opts.declaration {
            w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }
        let neglected = match self.node(id) {
            Node::Choice(c) if c.parent().is_none() => Some(c),
            _ => None,
        };
        self.write_element(&mut w, self.current(id), neglected)?;
        if opts.indent.is_some() {
            w.get_mut().write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = vec![];
        self.write(&mut out, &WriteOptions::default())?;
        String::from_utf8(out)
            .map_err(|e| WriteError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Whether a child produces any output when its parent is written
    fn writes_something(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.is_active() || node.cardinality() == Cardinality::Optional
    }

    /// Writes the element `id`.  The non-current alternatives of `neglected` are written as
    /// magic comments after its children.
    fn write_element<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        id: NodeId,
        neglected: Option<&Choice>,
    ) -> Result<()> {
        let e = self.current_element(id);
        let mut start = BytesStart::new(e.name());
        for (name, attr) in e.attrs() {
            if let Some(value) = attr.value() {
                start.push_attribute((name.as_str(), value));
            }
        }
        let has_content = e.data().is_some()
            || e.children().iter().any(|&c| self.writes_something(c))
            || neglected.map_or(false, |c| c.alternatives().len() > 1);
        if !has_content {
            w.write_event(Event::Empty(start))?;
            return Ok(());
        }
        w.write_event(Event::Start(start))?;
        if let Some(data) = e.data() {
            w.write_event(Event::Text(BytesText::new(data)))?;
        }
        for &child in e.children() {
            self.child(w, e.name(), child)?;
        }
        if let Some(c) = neglected {
            self.neglected_alternatives(w, e.name(), c)?;
        }
        w.write_event(Event::End(BytesEnd::new(e.name())))?;
        Ok(())
    }

    fn child<W: io::Write>(&self, w: &mut Writer<W>, parent_name: &str, id: NodeId) -> Result<()> {
        match self.node(id) {
            Node::Element(e) => {
                if e.is_active() {
                    self.write_element(w, id, None)?;
                } else if e.cardinality() == Cardinality::Optional {
                    self.hidden(w, parent_name, e.schema_path(), id, INACTIVE_OPTIONAL)?;
                }
            }
            Node::Choice(c) => {
                if c.is_active() {
                    self.write_element(w, c.current(), None)?;
                } else if c.cardinality() == Cardinality::Optional {
                    self.hidden(w, parent_name, c.schema_path(), c.current(), INACTIVE_OPTIONAL)?;
                } else {
                    return Ok(());
                }
                if c.cardinality().is_singular() {
                    self.neglected_alternatives(w, parent_name, c)?;
                }
            }
        }
        Ok(())
    }

    fn neglected_alternatives<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        wrapper: &str,
        c: &Choice,
    ) -> Result<()> {
        for (i, &alt) in c.alternatives().iter().enumerate() {
            if i != c.index() {
                self.hidden(w, wrapper, self.schema_path(alt), alt, NEGLECTED_CHOICE)?;
            }
        }
        Ok(())
    }

    fn hidden<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        wrapper: &str,
        schema_path: &str,
        id: NodeId,
        description: &str,
    ) -> Result<()> {
        let mut fragment = Writer::new(Vec::new());
        fragment.write_event(Event::Start(BytesStart::new(wrapper)))?;
        self.write_element(&mut fragment, id, None)?;
        fragment.write_event(Event::End(BytesEnd::new(wrapper)))?;
        let xml = String::from_utf8(fragment.into_inner())
            .map_err(|e| WriteError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let comment = magic::encode(schema_path, description, &xml)?;
        w.write_event(Event::Comment(BytesText::from_escaped(comment)))?;
        Ok(())
    }
}
