//! Registry of actions that apply to particular locations in a document.
//!
//! A plugin decides from an element's xpath (see `Tree::xpath`) whether it applies, and is
//! handed the serialised document plus that xpath when executed.

use crate::tree::{NodeId, Tree};
use std::fmt;

type Applies = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Execute = Box<dyn Fn(&str, &str) + Send + Sync>;

pub struct Plugin {
    name: String,
    applies: Applies,
    execute: Execute,
}

impl Plugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applies(&self, xpath: &str) -> bool {
        (self.applies)(xpath)
    }

    pub fn execute(&self, xml: &str, xpath: &str) {
        (self.execute)(xml, xpath)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name).finish()
    }
}

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    pub fn register<A, E>(&mut self, name: &str, applies: A, execute: E)
    where
        A: Fn(&str) -> bool + Send + Sync + 'static,
        E: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.plugins.push(Plugin {
            name: name.to_string(),
            applies: Box::new(applies),
            execute: Box::new(execute),
        });
    }

    /// Plugins applying at `xpath`, in registration order
    pub fn matching<'a>(&'a self, xpath: &'a str) -> impl Iterator<Item = &'a Plugin> + 'a {
        self.plugins.iter().filter(move |p| p.applies(xpath))
    }

    /// Plugins applying to the element `id` of `tree`
    pub fn matching_node(&self, tree: &Tree, id: NodeId) -> Vec<&Plugin> {
        let xpath = tree.xpath(id);
        self.plugins.iter().filter(|p| p.applies(&xpath)).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
