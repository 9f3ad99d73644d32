//! # Schedule — Ordering Systems and Grouping Them into Stages
//!
//! Systems run in registration order unless ordering constraints say
//! otherwise (`order_after(system, dependency)`). The schedule is a
//! topological sort of those constraints; ties are broken by registration
//! order so the result is deterministic.
//!
//! ## Stages
//!
//! On top of the order, systems are packed into *stages*: groups whose
//! views don't conflict (no system in a stage writes a type another one
//! reads or writes, for archetypes they could both see). A stage is the
//! unit a parallel executor could run concurrently; the controller runs
//! stages one after another and the systems inside a stage in order.
//!
//! ```text
//! A: (Write<Pos>, Read<Vel>)     stage 0: A, C
//! B: (Read<Pos>)   after A       stage 1: B
//! C: (Write<Hp>)
//! ```
//!
//! A system is placed in the earliest stage that comes after every stage
//! holding one of its dependencies or an earlier system it conflicts with.
//! Conflicting systems therefore always run in schedule order, no matter
//! which other systems are registered between them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{EcsError, EcsResult};
use crate::system::SystemId;
use crate::view::ViewSignature;

/// What the schedule needs to know about one system.
pub(crate) struct ScheduleNode<'a> {
    pub name: &'a str,
    pub view: &'a ViewSignature,
    pub after: &'a [SystemId],
}

/// Systems grouped into conflict-free stages, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    stages: Vec<Vec<SystemId>>,
}

impl Schedule {
    /// Build a schedule for `nodes`; node `i` is system `SystemId(i)`.
    pub(crate) fn build(nodes: &[ScheduleNode<'_>]) -> EcsResult<Self> {
        let order = topological_order(nodes)?;

        let mut stage_of = vec![0usize; nodes.len()];
        let mut stages: Vec<Vec<SystemId>> = Vec::new();
        let mut placed: Vec<SystemId> = Vec::with_capacity(nodes.len());
        for id in order {
            let node = &nodes[id.index()];
            let after_deps = node.after.iter().map(|dep| stage_of[dep.index()] + 1);
            let after_conflicts = placed
                .iter()
                .filter(|other| node.view.conflicts_with(nodes[other.index()].view))
                .map(|other| stage_of[other.index()] + 1);
            let stage = after_deps.chain(after_conflicts).max().unwrap_or(0);
            if stage == stages.len() {
                stages.push(Vec::new());
            }
            stages[stage].push(id);
            stage_of[id.index()] = stage;
            placed.push(id);
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Vec<SystemId>] {
        &self.stages
    }

    /// Systems in execution order.
    pub fn order(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.stages.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Kahn's algorithm with a min-heap of ready nodes, so that independent
/// systems keep their registration order.
fn topological_order(nodes: &[ScheduleNode<'_>]) -> EcsResult<Vec<SystemId>> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in node.after {
            if dep.index() >= nodes.len() {
                return Err(EcsError::UnknownSystem(*dep));
            }
            indegree[i] += 1;
            dependents[dep.index()].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(SystemId::new(i));
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < nodes.len() {
        return Err(EcsError::DependencyCycle(find_cycle(nodes, &indegree)));
    }
    Ok(order)
}

/// Names along one cycle among the nodes Kahn's algorithm couldn't place.
/// Every such node has an unplaced dependency, so walking dependencies
/// must revisit a node.
fn find_cycle(nodes: &[ScheduleNode<'_>], indegree: &[usize]) -> Vec<String> {
    let Some(start) = indegree.iter().position(|&d| d > 0) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(dep) = nodes[current]
            .after
            .iter()
            .map(|d| d.index())
            .find(|&d| indegree[d] > 0)
        else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == dep) {
            path.drain(..pos);
            path.push(dep);
            break;
        }
        path.push(dep);
        current = dep;
    }
    // The walk followed dependencies backwards; report them in run order.
    path.reverse();
    path.into_iter().map(|i| nodes[i].name.to_string()).collect()
}
