//! Process-wide style classes.
//!
//! A class maps a name to a small integer id and the id to a [`Styling`]
//! aggregate. Elements reference classes by id; application walks the
//! element's class list in id order, copying initialized attributes under
//! the status-wins rule. The registry is owned by the engine and accessed
//! behind its state lock.

use std::collections::HashMap;

use super::Styling;

/// Identifier of a registered class.
pub type ClassId = u16;

/// Name of the class installed at id 0, carrying the engine defaults.
pub const DEFAULT_CLASS: &str = "default";

/// Registry of named style classes.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    names: HashMap<String, ClassId>,
    styles: Vec<Styling>,
}

impl ClassRegistry {
    /// Create a registry holding only the default class.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.define(DEFAULT_CLASS, Styling::base());
        registry
    }

    /// Get the id for a class name, allocating a fresh id (with an empty
    /// styling) if the name is new.
    pub fn class_id(&mut self, name: &str) -> ClassId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = self.styles.len() as ClassId;
        self.names.insert(name.to_string(), id);
        self.styles.push(Styling::default());
        id
    }

    /// Register or replace a class under `name`.
    pub fn define(&mut self, name: &str, style: Styling) -> ClassId {
        let id = self.class_id(name);
        self.styles[usize::from(id)] = style;
        id
    }

    /// Look up a class styling by id.
    pub fn get(&self, id: ClassId) -> Option<&Styling> {
        self.styles.get(usize::from(id))
    }

    /// Look up a class id by name without allocating.
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Returns true when no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::named;
    use crate::style::Tracked;

    #[test]
    fn default_class_installed() {
        let registry = ClassRegistry::new();
        assert_eq!(registry.lookup(DEFAULT_CLASS), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_are_stable_and_sequential() {
        let mut registry = ClassRegistry::new();
        let a = registry.class_id("alert");
        let b = registry.class_id("panel");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(registry.class_id("alert"), 1);
    }

    #[test]
    fn define_replaces_styling() {
        let mut registry = ClassRegistry::new();
        let mut style = Styling::default();
        style.normal.background = Tracked::value(named::RED.with_alpha(255));
        let id = registry.define("alert", style);
        let stored = registry.get(id);
        assert!(stored.is_some());
        match stored {
            Some(s) => assert_eq!(s.normal.background.value, named::RED.with_alpha(255)),
            None => unreachable!(),
        }
    }

    #[test]
    fn unknown_lookup_is_none() {
        let registry = ClassRegistry::new();
        assert_eq!(registry.lookup("nope"), None);
        assert!(registry.get(42).is_none());
    }
}
