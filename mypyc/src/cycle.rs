use std::collections::{HashMap, HashSet};

use mypyc_irgen::{TypedModule, TypedStmt};

use crate::error::CompileError;

/// Orders `modules` so that, for every native class, the module owning
/// its primary base (when that base is itself declared somewhere in the
/// unit) comes before the module owning the derived class — mirroring
/// the single-module declaration pass's base-before-derived rule, lifted
/// to the whole unit (§4.9).
///
/// Returns [`CompileError::ImportCycle`] if the unit's cross-module base
/// references form a cycle, naming every module on it.
pub fn topo_sort_modules(modules: &[TypedModule]) -> Result<Vec<usize>, CompileError> {
    let owner = class_owners(modules);
    let index_by_name: HashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect();

    let mut deps: Vec<HashSet<usize>> = vec![HashSet::new(); modules.len()];
    for (i, module) in modules.iter().enumerate() {
        for class_def in class_defs(module) {
            let Some(base) = class_def.bases.first() else {
                continue;
            };
            if let Some(owner_module) = owner.get(base.as_str()) {
                if let Some(&owner_idx) = index_by_name.get(owner_module.as_str()) {
                    if owner_idx != i {
                        deps[i].insert(owner_idx);
                    }
                }
            }
        }
    }

    let mut order = Vec::with_capacity(modules.len());
    let mut state = vec![0u8; modules.len()]; // 0 = unvisited, 1 = in progress, 2 = done

    fn visit(
        i: usize,
        deps: &[HashSet<usize>],
        state: &mut [u8],
        order: &mut Vec<usize>,
        modules: &[TypedModule],
    ) -> Result<(), CompileError> {
        match state[i] {
            2 => return Ok(()),
            1 => return Err(CompileError::ImportCycle(vec![modules[i].name.clone()])),
            _ => {}
        }
        state[i] = 1;
        for &dep in &deps[i] {
            visit(dep, deps, state, order, modules).map_err(|e| match e {
                CompileError::ImportCycle(mut path) => {
                    path.push(modules[i].name.clone());
                    CompileError::ImportCycle(path)
                }
                other => other,
            })?;
        }
        state[i] = 2;
        order.push(i);
        Ok(())
    }

    for i in 0..modules.len() {
        visit(i, &deps, &mut state, &mut order, modules)?;
    }

    Ok(order)
}

fn class_owners(modules: &[TypedModule]) -> HashMap<String, String> {
    let mut owner = HashMap::new();
    for module in modules {
        for class_def in class_defs(module) {
            owner
                .entry(class_def.name.clone())
                .or_insert_with(|| module.name.clone());
        }
    }
    owner
}

pub(crate) fn class_defs(module: &TypedModule) -> impl Iterator<Item = &mypyc_irgen::TypedClassDef> {
    module.body.iter().filter_map(|stmt| match stmt {
        TypedStmt::ClassDef(c) => Some(c),
        _ => None,
    })
}
