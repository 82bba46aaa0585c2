use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{Graph, ResourceId, StackId};

#[derive(Clone, Debug, thiserror::Error)]
#[error("graph contains a dependency cycle: {cycle:?}")]
pub struct CycleError {
    pub cycle: Vec<ResourceId>,
}

/// Topologically sort resources by reference: if A references B, B comes before A.
///
/// Ties are broken by declaration order so the result is stable across runs.
pub fn topo_order(g: &Graph) -> Result<Vec<ResourceId>, CycleError> {
    let (out, mut indeg) = edges(g);
    let n = out.len();

    let mut q: VecDeque<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(u) = q.pop_front() {
        order.push(ResourceId(u));
        for &v in &out[u] {
            indeg[v] -= 1;
            if indeg[v] == 0 {
                q.push_back(v);
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    let cycle = find_cycle(&out, &indeg);
    Err(CycleError { cycle })
}

/// Group resources into waves: every resource lands one wave after the latest wave of
/// anything it references. Resources within a wave do not depend on each other.
pub fn waves(g: &Graph) -> Result<Vec<Vec<ResourceId>>, CycleError> {
    let order = topo_order(g)?;
    let mut level = vec![0usize; g.resource_count()];
    for &id in &order {
        level[id.0] = g
            .resource(id)
            .references
            .iter()
            .filter(|r| **r != id)
            .map(|r| level[r.0] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut out: Vec<Vec<ResourceId>> = Vec::new();
    for id in (0..g.resource_count()).map(ResourceId) {
        let l = level[id.0];
        if out.len() <= l {
            out.resize_with(l + 1, Vec::new);
        }
        out[l].push(id);
    }
    Ok(out)
}

/// Resources `id` references directly.
pub fn dependencies_of(g: &Graph, id: ResourceId) -> BTreeSet<ResourceId> {
    g.resource(id)
        .references
        .iter()
        .copied()
        .filter(|r| *r != id)
        .collect()
}

/// Resources that reference `id` directly.
pub fn dependents_of(g: &Graph, id: ResourceId) -> BTreeSet<ResourceId> {
    g.resources_iter()
        .filter(|r| r.id != id && r.references.contains(&id))
        .map(|r| r.id)
        .collect()
}

/// Stack-level dependencies implied by cross-stack references.
///
/// Each resource is attributed to the top-level stack (direct child of the root) that
/// contains it; references within the same top-level stack are ignored.
pub fn stack_dependencies(g: &Graph) -> BTreeMap<StackId, BTreeSet<StackId>> {
    let mut out: BTreeMap<StackId, BTreeSet<StackId>> = g
        .stack(g.root())
        .children
        .iter()
        .map(|&s| (s, BTreeSet::new()))
        .collect();

    for resource in g.resources_iter() {
        let Some(from) = top_level_stack(g, resource.stack) else {
            continue;
        };
        for &target in &resource.references {
            let Some(to) = top_level_stack(g, g.resource(target).stack) else {
                continue;
            };
            if from != to {
                out.entry(from).or_default().insert(to);
            }
        }
    }
    out
}

/// Direct child of the root containing `stack`, or `None` for the root itself.
pub fn top_level_stack(g: &Graph, mut stack: StackId) -> Option<StackId> {
    let root = g.root();
    loop {
        let parent = g.stack(stack).parent?;
        if parent == root {
            return Some(stack);
        }
        stack = parent;
    }
}

/// Convenience: the stable path name of a resource, like `/network/vpc`.
pub fn resource_path(g: &Graph, id: ResourceId) -> String {
    g.resource(id).path.to_string()
}

fn edges(g: &Graph) -> (Vec<Vec<usize>>, Vec<usize>) {
    let n = g.resource_count();
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
    for resource in g.resources_iter() {
        for target in &resource.references {
            if *target == resource.id {
                continue;
            }
            out[target.0].push(resource.id.0);
        }
    }

    let mut indeg = vec![0usize; n];
    for out in &mut out {
        out.sort_unstable();
        out.dedup();
        for &v in out.iter() {
            indeg[v] += 1;
        }
    }
    (out, indeg)
}

/// A cycle among the resources the sort could not place, with its first node repeated
/// at the end. Walks backwards from any stuck node: every stuck node is reached from
/// another stuck node, so the walk must revisit one.
fn find_cycle(out: &[Vec<usize>], indeg: &[usize]) -> Vec<ResourceId> {
    let stuck = |v: usize| indeg[v] > 0;
    let mut reached_from: Vec<Option<usize>> = vec![None; out.len()];
    for (u, targets) in out.iter().enumerate() {
        if !stuck(u) {
            continue;
        }
        for &v in targets.iter().filter(|&&v| stuck(v)) {
            reached_from[v].get_or_insert(u);
        }
    }

    let mut position: Vec<Option<usize>> = vec![None; out.len()];
    let mut walk = Vec::new();
    let mut current = (0..out.len()).find(|&v| stuck(v));
    while let Some(v) = current {
        if let Some(at) = position[v] {
            let mut cycle: Vec<ResourceId> = walk[at..].iter().rev().copied().collect();
            cycle.insert(0, ResourceId(v));
            return cycle;
        }
        position[v] = Some(walk.len());
        walk.push(ResourceId(v));
        current = reached_from[v];
    }
    walk
}
