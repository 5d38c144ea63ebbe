use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolutionError;
use crate::planner::model::ExecutionPlan;
use crate::types::Document;

pub(crate) fn resolve(doc: &Document) -> Result<ExecutionPlan, ResolutionError> {
    let leaves = doc.leaves();

    if doc.global().is_some_and(|g| !g.depends_on.is_empty()) {
        return Err(ResolutionError::GlobalHasDependencies);
    }

    // Edges by declaration position: deps[i] are the leaves i waits on.
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        let mut d = Vec::with_capacity(leaf.depends_on.len());
        for name in &leaf.depends_on {
            let pos = doc
                .position(name)
                .ok_or_else(|| ResolutionError::UnknownDependency {
                    leaf: leaf.name.clone(),
                    dependency: name.clone(),
                })?;
            if !d.contains(&pos) {
                d.push(pos);
            }
        }
        deps.push(d);
    }

    let order = topo_sort(doc, &deps)?;
    let levels = compute_levels(&order, &deps);

    let name = |i: usize| leaves[i].name.clone();
    Ok(ExecutionPlan {
        order: order.iter().map(|&i| name(i)).collect(),
        depends_on: leaves
            .iter()
            .zip(&deps)
            .map(|(l, d)| (l.name.clone(), d.iter().map(|&i| name(i)).collect()))
            .collect(),
        levels: levels
            .into_iter()
            .map(|level| level.into_iter().map(name).collect())
            .collect(),
    })
}

/// Kahn's algorithm; among ready leaves the global leaf wins, then declaration order.
fn topo_sort(doc: &Document, deps: &[Vec<usize>]) -> Result<Vec<usize>, ResolutionError> {
    let n = deps.len();
    let mut indeg: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, d) in deps.iter().enumerate() {
        for &j in d {
            outgoing[j].push(i);
        }
    }

    let key = |i: usize| (u8::from(!doc.leaves()[i].is_global()), i);
    let mut ready: BTreeSet<(u8, usize)> = (0..n).filter(|&i| indeg[i] == 0).map(key).collect();

    let mut out = Vec::with_capacity(n);
    while let Some((_, i)) = ready.pop_first() {
        out.push(i);
        for &m in &outgoing[i] {
            indeg[m] -= 1;
            if indeg[m] == 0 {
                ready.insert(key(m));
            }
        }
    }

    if out.len() != n {
        return Err(ResolutionError::Cycle {
            leaves: find_cycle(&indeg, deps)
                .into_iter()
                .map(|i| doc.leaves()[i].name.clone())
                .collect(),
        });
    }
    Ok(out)
}

/// Walks unresolved dependencies from the first stuck leaf until a leaf repeats.
fn find_cycle(indeg: &[usize], deps: &[Vec<usize>]) -> Vec<usize> {
    let stuck = |i: usize| indeg[i] > 0;
    let Some(start) = (0..indeg.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut seen_at = BTreeMap::new();
    let mut cur = start;
    loop {
        if let Some(&at) = seen_at.get(&cur) {
            return path.split_off(at);
        }
        seen_at.insert(cur, path.len());
        path.push(cur);
        // A stuck leaf always has at least one stuck dependency.
        match deps[cur].iter().copied().find(|&d| stuck(d)) {
            Some(next) => cur = next,
            None => return path,
        }
    }
}

fn compute_levels(topo: &[usize], deps: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut level: BTreeMap<usize, usize> = BTreeMap::new();
    for &node in topo {
        let l = deps[node]
            .iter()
            .filter_map(|d| level.get(d).copied())
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        level.insert(node, l);
    }

    let max_level = level.values().copied().max().unwrap_or(0);
    let mut levels = vec![Vec::<usize>::new(); max_level + 1];
    for &node in topo {
        levels[level[&node]].push(node);
    }
    levels.retain(|l| !l.is_empty());
    levels
}
