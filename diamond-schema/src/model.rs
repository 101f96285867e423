use crate::datatype::Datatype;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ExactlyOne,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    /// The cardinality of a pattern with cardinality `other` nested inside one with cardinality
    /// `self`
    pub fn combine(self, other: Cardinality) -> Cardinality {
        match (self, other) {
            (Cardinality::ExactlyOne, c) | (c, Cardinality::ExactlyOne) => c,
            (a, b) if a == b => a,
            _ => Cardinality::ZeroOrMore,
        }
    }

    /// At most one instance of the slot exists in a document
    pub fn is_singular(self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::Optional)
    }

    pub fn is_repeatable(self) -> bool {
        !self.is_singular()
    }

    /// Whether a freshly created instance of the slot is active
    pub fn starts_active(self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneOrMore)
    }

    /// Order in which slots claim document elements when merging: required slots first
    pub fn priority(self) -> u8 {
        match self {
            Cardinality::ExactlyOne => 0,
            Cardinality::OneOrMore => 1,
            Cardinality::Optional => 2,
            Cardinality::ZeroOrMore => 3,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Cardinality::ExactlyOne => "",
            Cardinality::Optional => "?",
            Cardinality::ZeroOrMore => "*",
            Cardinality::OneOrMore => "+",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub datatype: Datatype,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub name: String,
    pub schema_path: String,
    pub cardinality: Cardinality,
    pub datatype: Datatype,
    pub attributes: BTreeMap<String, AttributeSpec>,
    pub documentation: Option<String>,
}

impl ElementSpec {
    /// The value of a `name` attribute restricted to a single literal, if the element declares
    /// one
    pub fn fixed_name(&self) -> Option<&str> {
        match self.attributes.get("name") {
            Some(AttributeSpec {
                datatype: Datatype::Fixed(v),
                ..
            }) => Some(v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSpec {
    pub schema_path: String,
    pub alternatives: Vec<ElementSpec>,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildSpec {
    Element(ElementSpec),
    Choice(ChoiceSpec),
}

impl ChildSpec {
    pub fn schema_path(&self) -> &str {
        match self {
            ChildSpec::Element(e) => &e.schema_path,
            ChildSpec::Choice(c) => &c.schema_path,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            ChildSpec::Element(e) => e.cardinality,
            ChildSpec::Choice(c) => c.cardinality,
        }
    }

    /// The element specs an instance of this slot may take, in schema order
    pub fn alternatives(&self) -> &[ElementSpec] {
        match self {
            ChildSpec::Element(e) => std::slice::from_ref(e),
            ChildSpec::Choice(c) => &c.alternatives,
        }
    }

    pub fn name(&self) -> String {
        self.alternatives()
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }
}
