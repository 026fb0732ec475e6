use std::collections::HashMap;

use mypyc_types::RType;

/// What kind of entity a `SymbolTable` entry names (§4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A module.
    Module,
    /// A class.
    Class,
    /// A function.
    Function,
    /// A module, class, or local variable.
    Variable,
}

/// What the front-end collaborator's symbol table says about one name
/// (§4.4.1, §6): which module it belongs to, what kind of entity it is,
/// its declared type, and whether it's `Final`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    /// The module the name is declared in.
    pub module: String,
    /// The entity kind.
    pub kind: SymbolKind,
    /// The declared type.
    pub ty: RType,
    /// Whether the declaration pass may inline reads of this name at its
    /// compile-time-constant value (§4.4, "Final-attribute inlining").
    pub is_final: bool,
}

/// The closed, read-only map from every name visible to the unit to its
/// `SymbolEntry` (§4.4.1). Built by the front-end collaborator; the
/// builder never writes to it.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
}

impl SymbolTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the entry for `name`.
    pub fn insert(&mut self, name: impl Into<String>, entry: SymbolEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Look up `name`'s entry, if the table has one.
    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }
}
