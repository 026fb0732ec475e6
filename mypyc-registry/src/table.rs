use mypyc_types::RType;

use crate::error::RegistryError;
use crate::rule::LoweringRule;
use crate::shape::OpShape;

struct Entry {
    shape: OpShape,
    arg_types: Vec<RType>,
    rule: LoweringRule,
}

/// Accumulates entries and validates them into an immutable [`Registry`].
///
/// Entries are registered with [`RegistryBuilder::register`] in any
/// order; [`RegistryBuilder::build`] rejects two entries sharing the
/// same `(shape, arg_types)` key, since the lookup algorithm has no
/// principled way to prefer one over the other.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
}

impl RegistryBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lowering rule for `shape` applied to operands of
    /// exactly `arg_types`. An `RType::object()` entry in `arg_types`
    /// acts as a wildcard matching any operand at that position.
    pub fn register(
        mut self,
        shape: OpShape,
        arg_types: Vec<RType>,
        rule: LoweringRule,
    ) -> Self {
        self.entries.push(Entry {
            shape,
            arg_types,
            rule,
        });
        self
    }

    /// Validate and freeze the accumulated entries.
    pub fn build(self) -> Result<Registry, RegistryError> {
        for entry in &self.entries {
            if entry.arg_types.is_empty() {
                return Err(RegistryError::MissingOperands {
                    shape: entry.shape.clone(),
                });
            }
        }
        for i in 0..self.entries.len() {
            for j in (i + 1)..self.entries.len() {
                let a = &self.entries[i];
                let b = &self.entries[j];
                if a.shape == b.shape && a.arg_types == b.arg_types {
                    return Err(RegistryError::Ambiguous {
                        shape: a.shape.clone(),
                        arg_types: a.arg_types.clone(),
                    });
                }
            }
        }
        Ok(Registry {
            entries: self.entries,
        })
    }
}

/// An immutable, validated table of lowering rules (§4.3). Built once
/// per compilation (or shared as a `'static` default table) and queried
/// by `mypyc-irgen` while lowering each operator/call expression.
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Look up the most specific rule registered for `shape` whose
    /// `arg_types` matches `operand_types` position-for-position, where
    /// a registered `RType::object()` matches any operand type.
    ///
    /// Specificity is the count of exact (non-wildcard) position
    /// matches; among matching candidates the one with the highest
    /// specificity wins. Returns `None` when no entry matches, which
    /// tells the caller to fall back to the generic object-typed call
    /// convention.
    pub fn lookup(&self, shape: &OpShape, operand_types: &[RType]) -> Option<&LoweringRule> {
        let mut best: Option<(usize, &Entry)> = None;
        for entry in &self.entries {
            if &entry.shape != shape {
                continue;
            }
            if entry.arg_types.len() != operand_types.len() {
                continue;
            }
            let Some(specificity) = Self::specificity(&entry.arg_types, operand_types) else {
                continue;
            };
            match best {
                Some((best_specificity, _)) if best_specificity >= specificity => {}
                _ => best = Some((specificity, entry)),
            }
        }
        best.map(|(_, entry)| &entry.rule)
    }

    fn specificity(registered: &[RType], actual: &[RType]) -> Option<usize> {
        let object = RType::object();
        let mut specificity = 0;
        for (r, a) in registered.iter().zip(actual) {
            if r == a {
                specificity += 1;
            } else if *r != object {
                return None;
            }
        }
        Some(specificity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::BinarySymbol;
    use mypyc_ir::IntOpKind;

    fn int_add_registry() -> Registry {
        RegistryBuilder::new()
            .register(
                OpShape::BinaryOp(BinarySymbol::Add),
                vec![RType::int(), RType::int()],
                LoweringRule::IntOp(IntOpKind::Add),
            )
            .register(
                OpShape::BinaryOp(BinarySymbol::Add),
                vec![RType::object(), RType::object()],
                LoweringRule::CHelper(crate::rule::CHelperRule {
                    c_function: "PyNumber_Add".into(),
                    arg_coercions: vec![RType::object(), RType::object()],
                    result: RType::object(),
                    can_raise: true,
                }),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn exact_match_beats_wildcard_fallback() {
        let reg = int_add_registry();
        let rule = reg
            .lookup(
                &OpShape::BinaryOp(BinarySymbol::Add),
                &[RType::int(), RType::int()],
            )
            .unwrap();
        assert_eq!(*rule, LoweringRule::IntOp(IntOpKind::Add));
    }

    #[test]
    fn wildcard_matches_unregistered_types() {
        let reg = int_add_registry();
        let rule = reg
            .lookup(
                &OpShape::BinaryOp(BinarySymbol::Add),
                &[RType::object(), RType::int()],
            )
            .unwrap();
        match rule {
            LoweringRule::CHelper(h) => assert_eq!(h.c_function, "PyNumber_Add"),
            _ => panic!("expected CHelper fallback"),
        }
    }

    #[test]
    fn no_match_returns_none() {
        let reg = int_add_registry();
        assert!(reg
            .lookup(&OpShape::BinaryOp(BinarySymbol::Sub), &[RType::int(), RType::int()])
            .is_none());
    }

    #[test]
    fn duplicate_entries_rejected_as_ambiguous() {
        let result = RegistryBuilder::new()
            .register(
                OpShape::BinaryOp(BinarySymbol::Add),
                vec![RType::int(), RType::int()],
                LoweringRule::IntOp(IntOpKind::Add),
            )
            .register(
                OpShape::BinaryOp(BinarySymbol::Add),
                vec![RType::int(), RType::int()],
                LoweringRule::IntOp(IntOpKind::Add),
            )
            .build();
        assert!(matches!(result, Err(RegistryError::Ambiguous { .. })));
    }

    #[test]
    fn empty_operand_list_rejected() {
        let result = RegistryBuilder::new()
            .register(
                OpShape::Call("builtins.exit".into()),
                vec![],
                LoweringRule::IntOp(IntOpKind::Add),
            )
            .build();
        assert!(matches!(result, Err(RegistryError::MissingOperands { .. })));
    }
}
