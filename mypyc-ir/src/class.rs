use mypyc_types::{ClassId, RType};

use crate::FuncRef;

/// Traits are ordinary [`ClassIr`]s with [`ClassFlags::is_trait`] set, so
/// they share the same handle type as any other class (§3).
pub type TraitId = ClassId;

/// Boolean flags describing a class's special semantics (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassFlags {
    /// A stateless-by-default, multiply-inheritable trait dispatched
    /// through the secondary trait vtable rather than the main one.
    pub is_trait: bool,
    /// Subclassing from ordinary (interpreted, non-native) Python code
    /// is permitted; `isinstance` checks against this class must fall
    /// back to the CPython API rather than a pointer comparison (§4.4).
    pub allow_interpreted_subclasses: bool,
    /// No further native subclass may override this class's methods;
    /// lets the emitter devirtualize calls that would otherwise need a
    /// vtable load.
    pub is_final: bool,
    /// Synthesized by the builder rather than declared in source (e.g. a
    /// generator's state-machine struct's companion class).
    pub is_generated: bool,
}

/// A named, typed attribute slot in a class's C struct layout (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttrEntry {
    /// The attribute's name.
    pub name: String,
    /// The attribute's declared type.
    pub ty: RType,
    /// Whether the class declares a default value for this attribute
    /// (affects whether the uninit pass must guard reads of it).
    pub has_default: bool,
}

/// One slot of a class's vtable: a method name and the `FuncIr` it
/// currently resolves to (§3). Override replaces the entry in place
/// without changing its position, which is what gives the vtable its
/// base-class-prefix invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VtableEntry {
    /// The method's name.
    pub name: String,
    /// The function currently installed in this slot.
    pub func: FuncRef,
}

/// A `@property`'s getter and optional setter, stored separately from
/// the vtable since properties aren't called through `MethodCall`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyEntry {
    /// The property's name.
    pub name: String,
    /// The getter function.
    pub getter: FuncRef,
    /// The setter function, if the property is settable.
    pub setter: Option<FuncRef>,
}

/// A compiled native class: attribute layout, vtable, and the bookkeeping
/// needed to check the vtable-prefix invariant against its base (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassIr {
    id: ClassId,
    name: String,
    base: Option<ClassId>,
    traits: Vec<TraitId>,
    attrs: Vec<AttrEntry>,
    vtable: Vec<VtableEntry>,
    properties: Vec<PropertyEntry>,
    class_vars: Vec<AttrEntry>,
    flags: ClassFlags,
}

impl ClassIr {
    /// Construct a class skeleton (the declaration pass's output before
    /// vtable layout is computed).
    pub fn new(id: ClassId, name: impl Into<String>, base: Option<ClassId>, flags: ClassFlags) -> Self {
        Self {
            id,
            name: name.into(),
            base,
            traits: Vec::new(),
            attrs: Vec::new(),
            vtable: Vec::new(),
            properties: Vec::new(),
            class_vars: Vec::new(),
            flags,
        }
    }

    /// This class's handle.
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// This class's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The base class, if any.
    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    /// The traits this class implements, in declaration order.
    pub fn traits(&self) -> &[TraitId] {
        &self.traits
    }

    /// Add a trait to this class's implemented-traits list.
    pub fn add_trait(&mut self, trait_id: TraitId) {
        self.traits.push(trait_id);
    }

    /// The instance attribute layout, in declaration order.
    pub fn attrs(&self) -> &[AttrEntry] {
        &self.attrs
    }

    /// Append an attribute to the layout. The declaration pass calls this
    /// base-before-derived so that `attrs()`'s order matches C struct
    /// field order with the base class's fields first.
    pub fn push_attr(&mut self, attr: AttrEntry) {
        self.attrs.push(attr);
    }

    /// The method vtable, in slot order.
    pub fn vtable(&self) -> &[VtableEntry] {
        &self.vtable
    }

    /// Append a new slot to the vtable (a method with no base-class
    /// counterpart).
    pub fn push_vtable_entry(&mut self, entry: VtableEntry) {
        self.vtable.push(entry);
    }

    /// Replace an existing slot in place (an override), preserving its
    /// position — required by the vtable-prefix invariant (§3, §8).
    pub fn override_vtable_entry(&mut self, slot: usize, func: FuncRef) {
        self.vtable[slot].func = func;
    }

    /// Find the slot index of a method by name, if the vtable has one.
    pub fn vtable_slot(&self, name: &str) -> Option<usize> {
        self.vtable.iter().position(|e| e.name == name)
    }

    /// The property table.
    pub fn properties(&self) -> &[PropertyEntry] {
        &self.properties
    }

    /// Add a property.
    pub fn push_property(&mut self, property: PropertyEntry) {
        self.properties.push(property);
    }

    /// The class-variable table (attributes shared by all instances,
    /// stored once per class rather than per instance).
    pub fn class_vars(&self) -> &[AttrEntry] {
        &self.class_vars
    }

    /// Add a class variable.
    pub fn push_class_var(&mut self, var: AttrEntry) {
        self.class_vars.push(var);
    }

    /// This class's flag set.
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    /// Verify the vtable-prefix invariant against `base`'s vtable: the
    /// first `base.vtable().len()` entries of `self.vtable()` must have
    /// matching names, in the same order (§3, §8).
    pub fn vtable_is_consistent_with(&self, base: &ClassIr) -> bool {
        if self.vtable.len() < base.vtable.len() {
            return false;
        }
        self.vtable
            .iter()
            .zip(base.vtable.iter())
            .all(|(a, b)| a.name == b.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str) -> FuncRef {
        FuncRef::new(format!("m.{name}"))
    }

    #[test]
    fn override_preserves_slot_position() {
        let mut base = ClassIr::new(ClassId::from_raw(0), "Base", None, ClassFlags::default());
        base.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });

        let mut derived = ClassIr::new(ClassId::from_raw(1), "Derived", Some(base.id()), ClassFlags::default());
        derived.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });
        let slot = derived.vtable_slot("foo").unwrap();
        derived.override_vtable_entry(slot, func("Derived.foo"));

        assert!(derived.vtable_is_consistent_with(&base));
        assert_eq!(derived.vtable()[0].func, func("Derived.foo"));
    }

    #[test]
    fn extra_derived_methods_keep_base_prefix_consistent() {
        let mut base = ClassIr::new(ClassId::from_raw(0), "Base", None, ClassFlags::default());
        base.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });

        let mut derived = ClassIr::new(ClassId::from_raw(1), "Derived", Some(base.id()), ClassFlags::default());
        derived.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });
        derived.push_vtable_entry(VtableEntry {
            name: "bar".into(),
            func: func("Derived.bar"),
        });

        assert!(derived.vtable_is_consistent_with(&base));
    }

    #[test]
    fn reordered_prefix_is_inconsistent() {
        let mut base = ClassIr::new(ClassId::from_raw(0), "Base", None, ClassFlags::default());
        base.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });
        base.push_vtable_entry(VtableEntry {
            name: "bar".into(),
            func: func("Base.bar"),
        });

        let mut derived = ClassIr::new(ClassId::from_raw(1), "Derived", Some(base.id()), ClassFlags::default());
        derived.push_vtable_entry(VtableEntry {
            name: "bar".into(),
            func: func("Base.bar"),
        });
        derived.push_vtable_entry(VtableEntry {
            name: "foo".into(),
            func: func("Base.foo"),
        });

        assert!(!derived.vtable_is_consistent_with(&base));
    }
}
