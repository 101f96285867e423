//! Translation of grammar positions into `ElementSpec`/`ChoiceSpec` values.
//!
//! Nothing is compiled ahead of time: each call looks at a single grammar position, following
//! `<ref>`s only as far as the next `<element>`, so recursive grammars need no special
//! treatment here.

use crate::datatype::{Datatype, ListLength, Primitive};
use crate::model::*;
use crate::SchemaError;
use diamond_grammar::{Grammar, GrammarId, Tag};
use std::collections::BTreeMap;
use tracing::warn;

type Result<T> = std::result::Result<T, SchemaError>;

pub(crate) struct Walker<'g> {
    grammar: &'g Grammar,
}

enum Contribution {
    Literal(String),
    Data(Datatype),
}

#[derive(Default)]
struct Facts {
    contributions: Vec<Contribution>,
    attributes: BTreeMap<String, AttributeSpec>,
    documentation: Option<String>,
}

impl Facts {
    fn datatype(self, owner: &str) -> Datatype {
        let mut literals = vec![];
        let mut data = vec![];
        for c in self.contributions {
            match c {
                Contribution::Literal(v) => literals.push(v),
                Contribution::Data(d) => data.push(d),
            }
        }
        let mut data = data.into_iter();
        match data.next() {
            None => match literals.len() {
                0 => Datatype::None,
                1 => Datatype::Fixed(literals.remove(0)),
                _ => Datatype::Enumeration(literals),
            },
            Some(first) => {
                if data.next().is_some() {
                    warn!("{} has multiple datatypes; using the first", owner);
                }
                if literals.is_empty() {
                    first
                } else {
                    Datatype::Mixed {
                        values: literals,
                        fallback: Box::new(first),
                    }
                }
            }
        }
    }
}

impl<'g> Walker<'g> {
    pub(crate) fn new(grammar: &'g Grammar) -> Walker<'g> {
        Walker { grammar }
    }

    /// Specs for the element-producing children of the given grammar position
    pub(crate) fn children_of(&self, id: GrammarId) -> Result<Vec<ChildSpec>> {
        let mut out = vec![];
        for child in self.content(id) {
            self.child(child, Cardinality::ExactlyOne, &mut out)?;
        }
        Ok(out)
    }

    /// The pattern children of `id`, with each `<ref>` replaced by the children of the
    /// `<define>` it names
    fn content(&self, id: GrammarId) -> Vec<GrammarId> {
        let mut out = vec![];
        let mut visiting = vec![];
        self.expand_refs(id, &mut out, &mut visiting);
        out
    }

    fn expand_refs(&self, id: GrammarId, out: &mut Vec<GrammarId>, visiting: &mut Vec<GrammarId>) {
        for &child in self.grammar.children(id) {
            if self.grammar.tag(child) != Tag::Ref {
                out.push(child);
                continue;
            }
            let name = self
                .grammar
                .get(child)
                .attr("name")
                .map(str::trim)
                .unwrap_or_default();
            match self.grammar.define(name) {
                Some(define) if visiting.contains(&define) => warn!(
                    "reference cycle through {:?} at {}; ignoring",
                    name,
                    self.grammar.path(child)
                ),
                Some(define) => {
                    visiting.push(define);
                    self.expand_refs(define, out, visiting);
                    visiting.pop();
                }
                None => warn!(
                    "reference to undefined pattern {:?} at {}; skipping",
                    name,
                    self.grammar.path(child)
                ),
            }
        }
    }

    fn unsupported(&self, id: GrammarId) -> SchemaError {
        let el = self.grammar.get(id);
        SchemaError::Unsupported {
            construct: el.tag,
            path: el.path.clone(),
            span: el.span.clone(),
        }
    }

    fn child(&self, id: GrammarId, card: Cardinality, out: &mut Vec<ChildSpec>) -> Result<()> {
        match self.grammar.tag(id) {
            Tag::Element => {
                if let Some(spec) = self.element(id, card)? {
                    out.push(ChildSpec::Element(spec));
                }
            }
            Tag::Optional => self.children_with(id, card.combine(Cardinality::Optional), out)?,
            Tag::ZeroOrMore => {
                self.children_with(id, card.combine(Cardinality::ZeroOrMore), out)?
            }
            Tag::OneOrMore => self.children_with(id, card.combine(Cardinality::OneOrMore), out)?,
            Tag::Group | Tag::Interleave | Tag::Mixed | Tag::Div => {
                self.children_with(id, card, out)?
            }
            Tag::Choice => self.choice(id, card, out)?,
            Tag::AnyName | Tag::NsName | Tag::Except => return Err(self.unsupported(id)),
            Tag::ParentRef | Tag::ExternalRef => warn!(
                "<{}> at {} is not supported; ignoring",
                self.grammar.tag(id),
                self.grammar.path(id)
            ),
            _ => (),
        }
        Ok(())
    }

    fn children_with(
        &self,
        id: GrammarId,
        card: Cardinality,
        out: &mut Vec<ChildSpec>,
    ) -> Result<()> {
        for child in self.content(id) {
            self.child(child, card, out)?;
        }
        Ok(())
    }

    /// Alternatives of a `<choice>`, with nested choices flattened into the list
    fn alternatives(&self, id: GrammarId, out: &mut Vec<GrammarId>) {
        for child in self.content(id) {
            if self.grammar.tag(child) == Tag::Choice {
                self.alternatives(child, out);
            } else {
                out.push(child);
            }
        }
    }

    fn choice(&self, id: GrammarId, card: Cardinality, out: &mut Vec<ChildSpec>) -> Result<()> {
        let mut alts = vec![];
        self.alternatives(id, &mut alts);

        // <choice><empty/>X</choice> is just an optional X
        if let [a, b] = alts[..] {
            let other = match (self.grammar.tag(a), self.grammar.tag(b)) {
                (Tag::Empty, Tag::Empty) => None,
                (Tag::Empty, _) => Some(b),
                (_, Tag::Empty) => Some(a),
                _ => None,
            };
            if let Some(other) = other {
                return self.child(other, card, out);
            }
        }

        let mut elements = vec![];
        for alt in alts {
            let mut specs = vec![];
            self.child(alt, Cardinality::ExactlyOne, &mut specs)?;
            for spec in specs {
                match spec {
                    ChildSpec::Element(e) => elements.push(e),
                    ChildSpec::Choice(c) => elements.extend(c.alternatives),
                }
            }
        }
        match elements.len() {
            0 => (),
            1 => {
                let mut e = elements.remove(0);
                e.cardinality = card.combine(e.cardinality);
                out.push(ChildSpec::Element(e));
            }
            _ => out.push(ChildSpec::Choice(ChoiceSpec {
                schema_path: self.grammar.path(id).to_string(),
                alternatives: elements,
                cardinality: card,
            })),
        }
        Ok(())
    }

    fn yields_elements(&self, id: GrammarId) -> Result<bool> {
        let mut specs = vec![];
        self.child(id, Cardinality::ExactlyOne, &mut specs)?;
        Ok(!specs.is_empty())
    }

    /// The local name of an `<element>` or `<attribute>`, from its `name` attribute or `<name>`
    /// child
    fn name_of(&self, id: GrammarId) -> Result<Option<String>> {
        let el = self.grammar.get(id);
        if let Some(name) = el.attr("name") {
            return Ok(Some(local_name(name)));
        }
        match self.grammar.children(id).first() {
            Some(&first) => match self.grammar.tag(first) {
                Tag::Name => Ok(Some(local_name(&self.grammar.get(first).text))),
                Tag::AnyName | Tag::NsName | Tag::Choice => Err(self.unsupported(first)),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn element(&self, id: GrammarId, card: Cardinality) -> Result<Option<ElementSpec>> {
        let name = match self.name_of(id)? {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!("<element> without a name at {}; skipping", self.grammar.path(id));
                return Ok(None);
            }
        };
        let mut facts = Facts::default();
        self.facts(id, true, &mut facts)?;
        let attributes = std::mem::take(&mut facts.attributes);
        let documentation = facts.documentation.take();
        Ok(Some(ElementSpec {
            datatype: facts.datatype(&format!("element {}", name)),
            name,
            schema_path: self.grammar.path(id).to_string(),
            cardinality: card,
            attributes,
            documentation,
        }))
    }

    fn attribute(&self, id: GrammarId, required: bool) -> Result<Option<(String, AttributeSpec)>> {
        let name = match self.name_of(id)? {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!("<attribute> without a name at {}; skipping", self.grammar.path(id));
                return Ok(None);
            }
        };
        let mut facts = Facts::default();
        self.facts(id, required, &mut facts)?;
        let datatype = if facts.contributions.is_empty() {
            Datatype::Primitive(Primitive::String)
        } else {
            facts.datatype(&format!("attribute {}", name))
        };
        Ok(Some((name, AttributeSpec { datatype, required })))
    }

    /// Collects the attributes, datatype contributions and documentation that apply directly to
    /// the element (or attribute) at `id`
    fn facts(&self, id: GrammarId, required: bool, facts: &mut Facts) -> Result<()> {
        for child in self.content(id) {
            let el = self.grammar.get(child);
            match el.tag {
                Tag::Element => (),
                Tag::Optional | Tag::ZeroOrMore => self.attributes_only(child, false, facts)?,
                Tag::OneOrMore => self.attributes_only(child, required, facts)?,
                Tag::Choice => {
                    if self.yields_elements(child)? {
                        self.attributes_only(child, false, facts)?
                    } else {
                        self.facts(child, false, facts)?
                    }
                }
                Tag::Group | Tag::Interleave | Tag::Div => self.facts(child, required, facts)?,
                Tag::Mixed => {
                    facts
                        .contributions
                        .push(Contribution::Data(Datatype::Primitive(Primitive::String)));
                    self.facts(child, required, facts)?
                }
                Tag::Attribute => self.add_attribute(child, required, facts)?,
                Tag::Documentation => {
                    let text = normalize_whitespace(&el.text);
                    if facts.documentation.is_none() && !text.is_empty() {
                        facts.documentation = Some(text);
                    }
                }
                Tag::Value => {
                    let value = if el.attr("type").map(str::trim) == Some("string") {
                        el.text.clone()
                    } else {
                        normalize_whitespace(&el.text)
                    };
                    facts.contributions.push(Contribution::Literal(value));
                }
                Tag::Data => {
                    let kind = self.data_kind(child);
                    facts
                        .contributions
                        .push(Contribution::Data(Datatype::Primitive(kind)));
                }
                Tag::Text => facts
                    .contributions
                    .push(Contribution::Data(Datatype::Primitive(Primitive::String))),
                Tag::List => {
                    let list = self.list(child);
                    facts.contributions.push(Contribution::Data(list));
                }
                Tag::AnyName | Tag::NsName | Tag::Except => return Err(self.unsupported(child)),
                Tag::ParentRef | Tag::ExternalRef => warn!(
                    "<{}> at {} is not supported; ignoring",
                    el.tag, el.path
                ),
                _ => (),
            }
        }
        Ok(())
    }

    /// Attributes below `id`, ignoring any datatype contributions (which belong to nested
    /// elements or are only optionally present)
    fn attributes_only(&self, id: GrammarId, required: bool, facts: &mut Facts) -> Result<()> {
        for child in self.content(id) {
            match self.grammar.tag(child) {
                Tag::Attribute => self.add_attribute(child, required, facts)?,
                Tag::Optional | Tag::ZeroOrMore | Tag::Choice => {
                    self.attributes_only(child, false, facts)?
                }
                Tag::OneOrMore | Tag::Group | Tag::Interleave | Tag::Mixed | Tag::Div => {
                    self.attributes_only(child, required, facts)?
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn add_attribute(&self, id: GrammarId, required: bool, facts: &mut Facts) -> Result<()> {
        if let Some((name, spec)) = self.attribute(id, required)? {
            facts.attributes.entry(name).or_insert(spec);
        }
        Ok(())
    }

    fn data_kind(&self, id: GrammarId) -> Primitive {
        let el = self.grammar.get(id);
        match el.attr("type") {
            Some(name) => Primitive::from_type_name(name).unwrap_or_else(|| {
                warn!(
                    "unknown datatype {:?} at {}; treating it as a string",
                    name, el.path
                );
                Primitive::String
            }),
            None => Primitive::String,
        }
    }

    fn list(&self, id: GrammarId) -> Datatype {
        let mut items = vec![];
        let mut wrapper = None;
        self.list_items(id, &mut items, &mut wrapper);
        let length = match wrapper {
            Some(Cardinality::Optional) => ListLength::Optional,
            Some(Cardinality::OneOrMore) => ListLength::OneOrMore,
            Some(_) => ListLength::ZeroOrMore,
            None => ListLength::Exactly(items.len()),
        };
        Datatype::List {
            item: items.first().copied().unwrap_or(Primitive::String),
            length,
        }
    }

    fn list_items(
        &self,
        id: GrammarId,
        items: &mut Vec<Primitive>,
        wrapper: &mut Option<Cardinality>,
    ) {
        for child in self.content(id) {
            let card = match self.grammar.tag(child) {
                Tag::Data => {
                    items.push(self.data_kind(child));
                    continue;
                }
                Tag::Text | Tag::Value => {
                    items.push(Primitive::String);
                    continue;
                }
                Tag::Choice => {
                    let mut alts = vec![];
                    self.list_items(child, &mut alts, wrapper);
                    items.push(alts.first().copied().unwrap_or(Primitive::String));
                    continue;
                }
                Tag::Group => Cardinality::ExactlyOne,
                Tag::Optional => Cardinality::Optional,
                Tag::ZeroOrMore => Cardinality::ZeroOrMore,
                Tag::OneOrMore => Cardinality::OneOrMore,
                _ => continue,
            };
            if card != Cardinality::ExactlyOne && wrapper.is_none() {
                *wrapper = Some(card);
            }
            self.list_items(child, items, wrapper);
        }
    }
}

fn local_name(name: &str) -> String {
    let name = name.trim();
    match name.rfind(':') {
        Some(i) => name[i + 1..].to_string(),
        None => name.to_string(),
    }
}

/// Collapses runs of whitespace into single spaces and trims both ends
pub fn normalize_whitespace(val: &str) -> String {
    let mut last_space = false;
    let mut out = String::new();
    for c in val.chars().skip_while(|c| c.is_ascii_whitespace()) {
        if c.is_ascii_whitespace() {
            last_space = true;
        } else {
            if last_space {
                out.push(' ');
            }
            out.push(c);
            last_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn local_names() {
        assert_eq!(local_name(" foo "), "foo");
        assert_eq!(local_name("x:foo"), "foo");
    }
}
