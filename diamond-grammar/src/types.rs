use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

pub type Span = Range<usize>;

/// Index of an element within a `Grammar`
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct GrammarId(pub(crate) u32);

impl GrammarId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The RELAX-NG constructs the grammar arena understands.  Anything else in the RELAX-NG
/// namespace is rejected when parsing; elements from foreign namespaces are dropped, apart from
/// `a:documentation` annotations.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Tag {
    Grammar,
    Start,
    Define,
    Include,
    Div,
    Element,
    Attribute,
    Data,
    Value,
    Param,
    Text,
    List,
    Mixed,
    Empty,
    NotAllowed,
    Optional,
    ZeroOrMore,
    OneOrMore,
    Choice,
    Group,
    Interleave,
    Ref,
    ParentRef,
    ExternalRef,
    Name,
    AnyName,
    NsName,
    Except,
    Documentation,
}

impl Tag {
    pub(crate) fn from_rng_name(name: &str) -> Option<Tag> {
        Some(match name {
            "grammar" => Tag::Grammar,
            "start" => Tag::Start,
            "define" => Tag::Define,
            "include" => Tag::Include,
            "div" => Tag::Div,
            "element" => Tag::Element,
            "attribute" => Tag::Attribute,
            "data" => Tag::Data,
            "value" => Tag::Value,
            "param" => Tag::Param,
            "text" => Tag::Text,
            "list" => Tag::List,
            "mixed" => Tag::Mixed,
            "empty" => Tag::Empty,
            "notAllowed" => Tag::NotAllowed,
            "optional" => Tag::Optional,
            "zeroOrMore" => Tag::ZeroOrMore,
            "oneOrMore" => Tag::OneOrMore,
            "choice" => Tag::Choice,
            "group" => Tag::Group,
            "interleave" => Tag::Interleave,
            "ref" => Tag::Ref,
            "parentRef" => Tag::ParentRef,
            "externalRef" => Tag::ExternalRef,
            "name" => Tag::Name,
            "anyName" => Tag::AnyName,
            "nsName" => Tag::NsName,
            "except" => Tag::Except,
            _ => return None,
        })
    }

    /// The local element name, as used in schema paths
    pub fn name(self) -> &'static str {
        match self {
            Tag::Grammar => "grammar",
            Tag::Start => "start",
            Tag::Define => "define",
            Tag::Include => "include",
            Tag::Div => "div",
            Tag::Element => "element",
            Tag::Attribute => "attribute",
            Tag::Data => "data",
            Tag::Value => "value",
            Tag::Param => "param",
            Tag::Text => "text",
            Tag::List => "list",
            Tag::Mixed => "mixed",
            Tag::Empty => "empty",
            Tag::NotAllowed => "notAllowed",
            Tag::Optional => "optional",
            Tag::ZeroOrMore => "zeroOrMore",
            Tag::OneOrMore => "oneOrMore",
            Tag::Choice => "choice",
            Tag::Group => "group",
            Tag::Interleave => "interleave",
            Tag::Ref => "ref",
            Tag::ParentRef => "parentRef",
            Tag::ExternalRef => "externalRef",
            Tag::Name => "name",
            Tag::AnyName => "anyName",
            Tag::NsName => "nsName",
            Tag::Except => "except",
            Tag::Documentation => "documentation",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct GrammarElement {
    pub tag: Tag,
    /// Unqualified attributes, in document order
    pub attrs: Vec<(String, String)>,
    /// Concatenation of the element's direct text content
    pub text: String,
    pub span: Span,
    pub path: String,
    pub parent: Option<GrammarId>,
    pub children: Vec<GrammarId>,
}

impl GrammarElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An owned, immutable view of a (preprocessed) RELAX-NG XML grammar.
///
/// Every element carries a `path` such as `/grammar[1]/define[3]/element[1]`, where each step
/// counts the element's position among same-named siblings.  Paths are unique, so they double
/// as stable identifiers for grammar positions.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) elements: Vec<GrammarElement>,
    pub(crate) root: GrammarId,
    pub(crate) by_path: HashMap<String, GrammarId>,
    pub(crate) defines: HashMap<String, GrammarId>,
    pub(crate) start: Option<GrammarId>,
}

impl Grammar {
    pub fn root(&self) -> GrammarId {
        self.root
    }

    pub fn get(&self, id: GrammarId) -> &GrammarElement {
        &self.elements[id.index()]
    }

    pub fn tag(&self, id: GrammarId) -> Tag {
        self.get(id).tag
    }

    pub fn children(&self, id: GrammarId) -> &[GrammarId] {
        &self.get(id).children
    }

    pub fn path(&self, id: GrammarId) -> &str {
        &self.get(id).path
    }

    pub fn by_path(&self, path: &str) -> Option<GrammarId> {
        self.by_path.get(path).copied()
    }

    /// The first `<define>` with the given name, looking through `<div>` containers
    pub fn define(&self, name: &str) -> Option<GrammarId> {
        self.defines.get(name).copied()
    }

    /// The first top-level `<start>`
    pub fn start(&self) -> Option<GrammarId> {
        self.start
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
