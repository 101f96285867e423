//! Building tree structure from the schema: fresh documents, lazily expanded subtrees and the
//! activation toggle the editor applies to optional and repeatable nodes.

use crate::tree::{NodeId, Tree, TreeError};
use diamond_schema::{Cardinality, Position, Schema, SchemaError};
use tracing::{debug, warn};

/// What `Tree::toggle_active` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The node became active.  For repeatable slots, `template` is the inactive instance
    /// inserted after it.
    Activated { template: Option<NodeId> },
    Deactivated,
    /// The node was removed from its parent
    Deleted,
    /// The last active instance of a one-or-more slot stays active
    Unchanged,
}

impl Tree {
    /// A tree for a new document: the root element and everything the schema requires below it
    pub fn new_document(schema: &Schema) -> Result<Tree, SchemaError> {
        let spec = schema.root_spec()?;
        let mut tree = Tree::from_spec(&spec);
        let root = tree.root();
        tree.expand(schema, root)?;
        Ok(tree)
    }

    /// Adds the child slots the schema declares for `id` but that it doesn't hold yet, then
    /// expands the active children.  For a choice every alternative is expanded.
    ///
    /// Slots start active or not according to their cardinality, and repeatable slots get an
    /// inactive template instance.  Inactive nodes are left unexpanded until they are
    /// activated.
    pub fn expand(&mut self, schema: &Schema, id: NodeId) -> Result<(), SchemaError> {
        let mut visiting = vec![];
        self.expand_node(schema, id, &mut visiting)
    }

    fn expand_node(
        &mut self,
        schema: &Schema,
        id: NodeId,
        visiting: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        let targets = match self.choice(id) {
            Some(c) => c.alternatives().to_vec(),
            None => vec![id],
        };
        for target in targets {
            self.expand_element(schema, target, visiting)?;
        }
        Ok(())
    }

    fn expand_element(
        &mut self,
        schema: &Schema,
        id: NodeId,
        visiting: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        let path = self.schema_path(id).to_string();
        if visiting.contains(&path) {
            warn!(
                "not expanding <{}> at {}: the schema requires it inside itself",
                self.node(id).name(),
                path
            );
            return Ok(());
        }
        for spec in schema.valid_children(Position::Path(&path))? {
            if self.count_children_by_schema_path(id, spec.schema_path()) > 0 {
                continue;
            }
            let instance = self.instantiate(&spec, Some(id));
            self.push_child(id, instance);
            if spec.cardinality() == Cardinality::OneOrMore {
                let template = self.instantiate(&spec, Some(id));
                self.set_active_flag(template, false);
                self.push_child(id, template);
            }
        }
        let active: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_active(c))
            .collect();
        visiting.push(path);
        for child in active {
            self.expand_node(schema, child, visiting)?;
        }
        visiting.pop();
        self.recompute_validity(id);
        Ok(())
    }

    /// Flips the activity of the slot `id` occupies, the way the editor does when the user
    /// clicks a node:
    ///
    /// * optional nodes are simply switched on or off;
    /// * activating an instance of a repeatable slot inserts a fresh inactive instance after it;
    /// * deactivating an instance of a repeatable slot deletes it, unless it is the only
    ///   instance, or the last active instance of a one-or-more slot.
    ///
    /// Nodes are expanded when they become active.
    pub fn toggle_active(&mut self, schema: &Schema, id: NodeId) -> Result<Toggle, TreeError> {
        let slot = self.slot_of(id);
        let cardinality = self.node(slot).cardinality();
        let active = self.is_active(slot);
        let outcome = match cardinality {
            Cardinality::ExactlyOne => return Err(TreeError::AlwaysActive),
            Cardinality::Optional if active => {
                self.set_active(slot, false)?;
                Toggle::Deactivated
            }
            Cardinality::Optional => {
                self.set_active(slot, true)?;
                self.expand(schema, slot)?;
                Toggle::Activated { template: None }
            }
            Cardinality::ZeroOrMore | Cardinality::OneOrMore if !active => {
                self.set_active(slot, true)?;
                self.expand(schema, slot)?;
                let template = self.add_inactive_instance(slot)?;
                Toggle::Activated {
                    template: Some(template),
                }
            }
            Cardinality::ZeroOrMore | Cardinality::OneOrMore => {
                let parent = self.node(slot).parent().ok_or(TreeError::NoParent)?;
                let count = self.count_children_by_schema_path(parent, self.schema_path(slot));
                match (cardinality, count) {
                    (Cardinality::OneOrMore, n) if n <= 2 => Toggle::Unchanged,
                    (_, n) if n <= 1 => {
                        self.set_active(slot, false)?;
                        Toggle::Deactivated
                    }
                    _ => {
                        self.delete_child_by_ref(parent, slot)?;
                        Toggle::Deleted
                    }
                }
            }
        };
        debug!("toggled {}: {:?}", self.schema_path(slot), outcome);
        Ok(outcome)
    }
}
