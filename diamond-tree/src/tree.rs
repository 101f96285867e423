use diamond_schema::{
    valid_data, AttributeSpec, Cardinality, ChildSpec, Datatype, DatatypeError, ElementSpec,
    SchemaError,
};
use regex::RegexBuilder;
use std::collections::BTreeMap;

/// Index of a node within its `Tree`
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("<{element}> has no attribute {attr:?}")]
    NoSuchAttribute { element: String, attr: String },
    #[error("{value:?} is not a valid {datatype}")]
    InvalidData { datatype: Datatype, value: String },
    #[error(transparent)]
    NotSettable(#[from] DatatypeError),
    #[error("node is not a child of the given parent")]
    NotAChild,
    #[error("node has no parent")]
    NoParent,
    #[error("node is not a choice")]
    NotAChoice,
    #[error("choice has no alternative {0}")]
    NoSuchAlternative(String),
    #[error("nodes with exactly-one cardinality are always active")]
    AlwaysActive,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// An attribute slot on an element: its declaration plus the current value, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    spec: AttributeSpec,
    value: Option<String>,
}

impl Attribute {
    fn from_spec(spec: &AttributeSpec) -> Attribute {
        Attribute {
            spec: spec.clone(),
            value: fixed_value(&spec.datatype),
        }
    }

    pub fn datatype(&self) -> &Datatype {
        &self.spec.datatype
    }

    pub fn is_required(&self) -> bool {
        self.spec.required
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn is_satisfied(&self) -> bool {
        !self.spec.required || self.value.as_deref().map_or(false, |v| !v.is_empty())
    }
}

fn fixed_value(datatype: &Datatype) -> Option<String> {
    match datatype {
        Datatype::Fixed(v) => Some(v.clone()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    schema_path: String,
    cardinality: Cardinality,
    active: bool,
    datatype: Datatype,
    data: Option<String>,
    attrs: BTreeMap<String, Attribute>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    doc: Option<String>,
    valid: bool,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }
    pub fn attrs(&self) -> &BTreeMap<String, Attribute> {
        &self.attrs
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The literal `name` attribute value this element is restricted to, if any
    pub fn fixed_name(&self) -> Option<&str> {
        match self.attrs.get("name") {
            Some(a) => match &a.spec.datatype {
                Datatype::Fixed(v) => Some(v.as_str()),
                _ => None,
            },
            None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    name: String,
    schema_path: String,
    cardinality: Cardinality,
    active: bool,
    alternatives: Vec<NodeId>,
    index: usize,
    parent: Option<NodeId>,
}

impl Choice {
    /// The alternative names joined with `:`
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn alternatives(&self) -> &[NodeId] {
        &self.alternatives
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn current(&self) -> NodeId {
        self.alternatives[self.index]
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Choice(Choice),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Element(e) => &e.name,
            Node::Choice(c) => &c.name,
        }
    }
    pub fn schema_path(&self) -> &str {
        match self {
            Node::Element(e) => &e.schema_path,
            Node::Choice(c) => &c.schema_path,
        }
    }
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Node::Element(e) => e.cardinality,
            Node::Choice(c) => c.cardinality,
        }
    }
    pub fn is_active(&self) -> bool {
        match self {
            Node::Element(e) => e.active,
            Node::Choice(c) => c.active,
        }
    }
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Element(e) => e.parent,
            Node::Choice(c) => c.parent,
        }
    }
}

/// An options tree.
///
/// Nodes are owned by the tree and addressed by `NodeId`; a node removed from its parent stays
/// allocated but is no longer reachable from the root.  The alternatives of a `Choice` have the
/// choice's parent element as their parent, so walking `parent()` links only ever visits
/// elements.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// A tree holding a single, active, unexpanded instance of `spec` as its root
    pub fn from_spec(spec: &ChildSpec) -> Tree {
        let mut tree = Tree {
            nodes: vec![],
            root: NodeId(0),
        };
        let root = tree.instantiate(spec, None);
        tree.set_active_flag(root, true);
        tree.root = root;
        tree.recompute_validity(root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id) {
            Node::Element(e) => Some(e),
            Node::Choice(_) => None,
        }
    }

    pub fn choice(&self, id: NodeId) -> Option<&Choice> {
        match self.node(id) {
            Node::Choice(c) => Some(c),
            Node::Element(_) => None,
        }
    }

    /// The element a node currently stands for: the node itself, or a choice's current
    /// alternative
    pub fn current(&self, id: NodeId) -> NodeId {
        match self.node(id) {
            Node::Element(_) => id,
            Node::Choice(c) => c.current(),
        }
    }

    /// Like `element()`, resolving choices to their current alternative
    pub fn current_element(&self, id: NodeId) -> &Element {
        match self.node(self.current(id)) {
            Node::Element(e) => e,
            Node::Choice(_) => unreachable!("choice alternatives are always elements"),
        }
    }

    pub fn schema_path(&self, id: NodeId) -> &str {
        self.node(id).schema_path()
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.node(id).is_active()
    }

    pub fn is_valid(&self, id: NodeId) -> bool {
        self.current_element(id).valid
    }

    /// Children of the (current) element
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.current_element(id).children
    }

    /// The current elements of the active children of `id`, in order
    pub fn active_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .filter(move |&&c| self.is_active(c))
            .map(move |&c| self.current(c))
    }

    pub fn get_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.current_element(id)
            .attrs
            .get(name)
            .and_then(|a| a.value.as_deref())
    }

    fn element_mut(&mut self, id: NodeId) -> &mut Element {
        let id = self.current(id);
        match &mut self.nodes[id.0] {
            Node::Element(e) => e,
            Node::Choice(_) => unreachable!("choice alternatives are always elements"),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Creates a detached instance of `spec`, active or not according to its cardinality
    pub(crate) fn instantiate(&mut self, spec: &ChildSpec, parent: Option<NodeId>) -> NodeId {
        let cardinality = spec.cardinality();
        match spec {
            ChildSpec::Element(e) => self.instantiate_element(e, cardinality, parent),
            ChildSpec::Choice(c) => {
                let alternatives = c
                    .alternatives
                    .iter()
                    .map(|alt| self.instantiate_element(alt, Cardinality::ExactlyOne, parent))
                    .collect();
                self.push(Node::Choice(Choice {
                    name: spec.name(),
                    schema_path: c.schema_path.clone(),
                    cardinality,
                    active: cardinality.starts_active(),
                    alternatives,
                    index: 0,
                    parent,
                }))
            }
        }
    }

    fn instantiate_element(
        &mut self,
        spec: &ElementSpec,
        cardinality: Cardinality,
        parent: Option<NodeId>,
    ) -> NodeId {
        let element = Element {
            name: spec.name.clone(),
            schema_path: spec.schema_path.clone(),
            cardinality,
            active: cardinality.starts_active(),
            datatype: spec.datatype.clone(),
            data: fixed_value(&spec.datatype),
            attrs: spec
                .attributes
                .iter()
                .map(|(name, a)| (name.clone(), Attribute::from_spec(a)))
                .collect(),
            children: vec![],
            parent,
            doc: spec.documentation.clone(),
            valid: false,
        };
        let id = self.push(Node::Element(element));
        self.refresh(id);
        id
    }

    /// A detached structural clone of `id`: same spec fields and activity, no children, and
    /// values reset to what the schema presets
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        match self.node(id).clone() {
            Node::Element(e) => {
                let attrs = e
                    .attrs
                    .iter()
                    .map(|(name, a)| (name.clone(), Attribute::from_spec(&a.spec)))
                    .collect();
                let data = fixed_value(&e.datatype);
                let copy = self.push(Node::Element(Element {
                    attrs,
                    data,
                    children: vec![],
                    parent: None,
                    valid: false,
                    ..e
                }));
                self.refresh(copy);
                copy
            }
            Node::Choice(c) => {
                let alternatives = c.alternatives.iter().map(|&a| self.copy(a)).collect();
                self.push(Node::Choice(Choice {
                    alternatives,
                    parent: None,
                    ..c
                }))
            }
        }
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        let alternatives = match &mut self.nodes[id.0] {
            Node::Element(e) => {
                e.parent = parent;
                return;
            }
            Node::Choice(c) => {
                c.parent = parent;
                c.alternatives.clone()
            }
        };
        for alt in alternatives {
            self.set_parent(alt, parent);
        }
    }

    /// Attaches a detached node as the child of `parent` at `index`
    pub(crate) fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let parent = self.current(parent);
        self.set_parent(child, Some(parent));
        let children = &mut self.element_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    /// The node occupying the slot in its parent's child list: the node itself, or the choice
    /// it is an alternative of
    pub fn slot_of(&self, id: NodeId) -> NodeId {
        let parent = match self.node(id).parent() {
            Some(parent) => parent,
            None => return id,
        };
        let siblings = self.children(parent);
        if siblings.contains(&id) {
            return id;
        }
        siblings
            .iter()
            .copied()
            .find(|&s| {
                self.choice(s)
                    .map_or(false, |c| c.alternatives.contains(&id))
            })
            .unwrap_or(id)
    }

    fn compute_valid(&self, e: &Element) -> bool {
        e.children
            .iter()
            .all(|&c| !self.is_active(c) || self.is_valid(c))
            && e.attrs.values().all(Attribute::is_satisfied)
            && (e.datatype == Datatype::None || e.data.as_deref().map_or(false, |d| !d.is_empty()))
    }

    /// Recomputes the validity flag of the element itself only
    fn refresh(&mut self, id: NodeId) {
        let id = self.current(id);
        let valid = self.compute_valid(self.current_element(id));
        self.element_mut(id).valid = valid;
    }

    /// Recomputes validity of `id` and then each of its ancestors up to the root
    pub fn recompute_validity(&mut self, id: NodeId) {
        let mut next = Some(self.current(id));
        while let Some(id) = next {
            self.refresh(id);
            next = self.node(id).parent();
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), TreeError> {
        let id = self.current(id);
        let e = self.element_mut(id);
        let element = e.name.clone();
        let attr = e
            .attrs
            .get_mut(name)
            .ok_or_else(|| TreeError::NoSuchAttribute {
                element,
                attr: name.to_string(),
            })?;
        let (accepted, canonical) = valid_data(&attr.spec.datatype, value)?;
        if !accepted {
            return Err(TreeError::InvalidData {
                datatype: attr.spec.datatype.clone(),
                value: value.to_string(),
            });
        }
        attr.value = Some(canonical);
        self.recompute_validity(id);
        Ok(())
    }

    pub fn set_data(&mut self, id: NodeId, value: &str) -> Result<(), TreeError> {
        let id = self.current(id);
        let e = self.element_mut(id);
        let (accepted, canonical) = valid_data(&e.datatype, value)?;
        if !accepted {
            return Err(TreeError::InvalidData {
                datatype: e.datatype.clone(),
                value: value.to_string(),
            });
        }
        e.data = Some(canonical);
        self.recompute_validity(id);
        Ok(())
    }

    pub(crate) fn set_active_flag(&mut self, id: NodeId, active: bool) {
        match &mut self.nodes[id.0] {
            Node::Element(e) => e.active = active,
            Node::Choice(c) => c.active = active,
        }
    }

    /// Activates or deactivates the slot `id` occupies.  Exactly-one slots can't be
    /// deactivated.
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), TreeError> {
        let slot = self.slot_of(id);
        if !active && self.node(slot).cardinality() == Cardinality::ExactlyOne {
            return Err(TreeError::AlwaysActive);
        }
        self.set_active_flag(slot, active);
        self.recompute_validity(slot);
        Ok(())
    }

    pub fn set_active_choice(&mut self, choice: NodeId, index: usize) -> Result<(), TreeError> {
        match &mut self.nodes[choice.0] {
            Node::Choice(c) => {
                if index >= c.alternatives.len() {
                    return Err(TreeError::NoSuchAlternative(index.to_string()));
                }
                c.index = index;
            }
            Node::Element(_) => return Err(TreeError::NotAChoice),
        }
        self.recompute_validity(choice);
        Ok(())
    }

    pub fn set_active_choice_by_name(
        &mut self,
        choice: NodeId,
        name: &str,
    ) -> Result<(), TreeError> {
        let c = self.choice(choice).ok_or(TreeError::NotAChoice)?;
        let index = c
            .alternatives
            .iter()
            .position(|&a| self.node(a).name() == name)
            .ok_or_else(|| TreeError::NoSuchAlternative(name.to_string()))?;
        self.set_active_choice(choice, index)
    }

    pub fn count_children_by_schema_path(&self, parent: NodeId, schema_path: &str) -> usize {
        self.children(parent)
            .iter()
            .filter(|&&c| self.schema_path(c) == schema_path)
            .count()
    }

    /// Returns an inactive instance of the slot `id` belongs to, inserting a fresh copy after
    /// `id` if the parent does not already hold one.
    pub fn add_inactive_instance(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let slot = self.slot_of(id);
        if self.node(slot).cardinality() == Cardinality::ExactlyOne {
            return Err(TreeError::AlwaysActive);
        }
        let parent = self.node(slot).parent().ok_or(TreeError::NoParent)?;
        let path = self.schema_path(slot);
        if let Some(&existing) = self
            .children(parent)
            .iter()
            .find(|&&c| !self.is_active(c) && self.schema_path(c) == path)
        {
            return Ok(existing);
        }
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == slot)
            .ok_or(TreeError::NotAChild)?;
        let new = self.copy(slot);
        self.set_active_flag(new, false);
        self.insert_child(parent, index + 1, new);
        Ok(new)
    }

    /// Removes `child` (compared by identity) from the children of `parent`
    pub fn delete_child_by_ref(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent = self.current(parent);
        let children = &mut self.element_mut(parent).children;
        let index = children
            .iter()
            .position(|&c| c == child)
            .ok_or(TreeError::NotAChild)?;
        children.remove(index);
        self.recompute_validity(parent);
        Ok(())
    }

    /// Whether `text` matches the (current) element's name, documentation, attribute names or
    /// values, or data.  `text` is a regular expression; if it doesn't compile it is matched
    /// literally.
    pub fn matches(&self, id: NodeId, text: &str, case_sensitive: bool) -> bool {
        let re = RegexBuilder::new(text)
            .case_insensitive(!case_sensitive)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(!case_sensitive)
                    .build()
            });
        let re = match re {
            Ok(re) => re,
            Err(_) => return false,
        };
        let e = self.current_element(id);
        re.is_match(&e.name)
            || e.doc.as_deref().map_or(false, |d| re.is_match(d))
            || e.attrs.iter().any(|(name, a)| {
                re.is_match(name) || a.value.as_deref().map_or(false, |v| re.is_match(v))
            })
            || e.data.as_deref().map_or(false, |d| re.is_match(d))
    }

    /// An XPath locating the (current) element in the written document.  Steps use
    /// `name[@name="x"]` when the element has a `name` attribute set, otherwise a 1-based
    /// position among active siblings occupying the same slot, when there is more than one.
    pub fn xpath(&self, id: NodeId) -> String {
        let mut steps = vec![];
        let mut next = Some(self.current(id));
        while let Some(id) = next {
            let e = self.current_element(id);
            let slot = self.slot_of(id);
            let step = match (e.attrs.get("name").and_then(|a| a.value()), e.parent) {
                (Some(name), _) => format!("{}[@name=\"{}\"]", e.name, name),
                (None, Some(parent)) => {
                    let path = self.schema_path(slot);
                    let same = self
                        .children(parent)
                        .iter()
                        .copied()
                        .filter(|&c| self.is_active(c) && self.schema_path(c) == path)
                        .collect::<Vec<_>>();
                    match same.iter().position(|&c| c == slot) {
                        Some(i) if same.len() > 1 => format!("{}[{}]", e.name, i + 1),
                        _ => e.name.clone(),
                    }
                }
                (None, None) => e.name.clone(),
            };
            steps.push(step);
            next = e.parent;
        }
        steps.reverse();
        format!("/{}", steps.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use diamond_schema::{ChoiceSpec, Primitive};

    fn spec(name: &str, cardinality: Cardinality, datatype: Datatype) -> ElementSpec {
        ElementSpec {
            name: name.to_string(),
            schema_path: format!("/{}", name),
            cardinality,
            datatype,
            attributes: BTreeMap::new(),
            documentation: None,
        }
    }

    fn int() -> Datatype {
        Datatype::Primitive(Primitive::Int)
    }

    /// root
    ///  +- count (integer, required)
    ///  +- label? (string attribute "name")
    fn small_tree() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::from_spec(&ChildSpec::Element(spec(
            "root",
            Cardinality::ExactlyOne,
            Datatype::None,
        )));
        let root = tree.root();
        let count = tree.instantiate(
            &ChildSpec::Element(spec("count", Cardinality::ExactlyOne, int())),
            None,
        );
        tree.push_child(root, count);
        let mut label = spec("label", Cardinality::Optional, Datatype::None);
        label.attributes.insert(
            "name".to_string(),
            AttributeSpec {
                datatype: Datatype::Primitive(Primitive::String),
                required: true,
            },
        );
        let label = tree.instantiate(&ChildSpec::Element(label), None);
        tree.push_child(root, label);
        tree.recompute_validity(root);
        (tree, count, label)
    }

    #[test]
    fn validity_propagates() {
        let (mut tree, count, label) = small_tree();
        let root = tree.root();
        assert!(!tree.is_valid(count));
        assert!(!tree.is_valid(root));
        // the inactive label doesn't count
        assert!(!tree.is_active(label));

        tree.set_data(count, " 12 ").unwrap();
        assert_eq!(tree.current_element(count).data(), Some("12"));
        assert!(tree.is_valid(root));

        tree.set_active(label, true).unwrap();
        assert!(!tree.is_valid(root));
        tree.set_attr(label, "name", "x").unwrap();
        assert!(tree.is_valid(root));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let (mut tree, count, label) = small_tree();
        tree.set_data(count, "7").unwrap();
        assert_matches!(
            tree.set_data(count, "seven"),
            Err(TreeError::InvalidData { .. })
        );
        assert_eq!(tree.current_element(count).data(), Some("7"));
        assert_matches!(
            tree.set_data(label, "text"),
            Err(TreeError::NotSettable(_))
        );
        assert_matches!(
            tree.set_attr(label, "colour", "red"),
            Err(TreeError::NoSuchAttribute { .. })
        );
    }

    #[test]
    fn exactly_one_is_always_active() {
        let (mut tree, count, _) = small_tree();
        assert_matches!(tree.set_active(count, false), Err(TreeError::AlwaysActive));
        assert_matches!(
            tree.add_inactive_instance(count),
            Err(TreeError::AlwaysActive)
        );
    }

    #[test]
    fn copy_resets_values() {
        let (mut tree, _, label) = small_tree();
        tree.set_attr(label, "name", "x").unwrap();
        let copy = tree.copy(label);
        let e = tree.element(copy).unwrap();
        assert_eq!(e.name(), "label");
        assert_eq!(e.parent(), None);
        assert!(e.children().is_empty());
        assert_eq!(tree.get_attr(copy, "name"), None);
    }

    #[test]
    fn inactive_instance_is_idempotent() {
        let (mut tree, _, label) = small_tree();
        let root = tree.root();
        tree.set_active(label, true).unwrap();
        let first = tree.add_inactive_instance(label).unwrap();
        let second = tree.add_inactive_instance(label).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.count_children_by_schema_path(root, "/label"), 2);
        assert_eq!(tree.children(root)[2], first);
        assert!(!tree.is_active(first));
    }

    #[test]
    fn delete_by_identity() {
        let (mut tree, count, label) = small_tree();
        let root = tree.root();
        tree.set_data(count, "1").unwrap();
        tree.set_active(label, true).unwrap();
        assert!(!tree.is_valid(root));
        tree.delete_child_by_ref(root, label).unwrap();
        assert!(tree.is_valid(root));
        assert_eq!(tree.children(root), &[count]);
        assert_matches!(
            tree.delete_child_by_ref(root, label),
            Err(TreeError::NotAChild)
        );
    }

    #[test]
    fn choices() {
        let mut tree = Tree::from_spec(&ChildSpec::Element(spec(
            "root",
            Cardinality::ExactlyOne,
            Datatype::None,
        )));
        let root = tree.root();
        let choice = tree.instantiate(
            &ChildSpec::Choice(ChoiceSpec {
                schema_path: "/choice".to_string(),
                alternatives: vec![
                    spec("a", Cardinality::ExactlyOne, Datatype::None),
                    spec("b", Cardinality::ExactlyOne, int()),
                ],
                cardinality: Cardinality::ExactlyOne,
            }),
            None,
        );
        tree.push_child(root, choice);
        tree.recompute_validity(root);
        assert_eq!(tree.node(choice).name(), "a:b");
        assert!(tree.is_valid(root));

        tree.set_active_choice_by_name(choice, "b").unwrap();
        assert_eq!(tree.current_element(choice).name(), "b");
        assert!(!tree.is_valid(root));
        let b = tree.current(choice);
        assert_eq!(tree.slot_of(b), choice);
        assert_eq!(tree.node(b).parent(), Some(root));

        assert_matches!(
            tree.set_active_choice(choice, 2),
            Err(TreeError::NoSuchAlternative(_))
        );
        assert_matches!(
            tree.set_active_choice(root, 0),
            Err(TreeError::NotAChoice)
        );
    }

    #[test]
    fn matching() {
        let (mut tree, count, label) = small_tree();
        tree.set_data(count, "42").unwrap();
        tree.set_attr(label, "name", "Velocity").unwrap();
        assert!(tree.matches(count, "COUNT", false));
        assert!(!tree.matches(count, "COUNT", true));
        assert!(tree.matches(count, "^4\\d$", true));
        assert!(tree.matches(label, "veloc", false));
        // not a valid regex, so taken literally
        assert!(!tree.matches(label, "(", false));
    }

    #[test]
    fn xpaths() {
        let (mut tree, count, label) = small_tree();
        let root = tree.root();
        assert_eq!(tree.xpath(count), "/root/count");
        tree.set_active(label, true).unwrap();
        let second = tree.add_inactive_instance(label).unwrap();
        tree.set_active(second, true).unwrap();
        assert_eq!(tree.xpath(label), "/root/label[1]");
        assert_eq!(tree.xpath(second), "/root/label[2]");
        tree.set_attr(second, "name", "b").unwrap();
        assert_eq!(tree.xpath(second), "/root/label[@name=\"b\"]");
        assert_eq!(tree.xpath(root), "/root");
    }
}
