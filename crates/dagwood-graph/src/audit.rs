//! Sidestructure consistency audit.
//!
//! Recomputes true reachability by forward traversal of the data graph
//! and checks the one-sided caching contract: clean rows are exactly the
//! transitive closure, dirty rows are supersets of it, and in
//! reach-without-link mode every physical edge's tristate agrees with a
//! traversal that skips that edge. Quadratic; meant for debug schedules
//! and explicit audits, never the hot path.

use dagwood_core::{GraphError, VertexId};
use rustc_hash::FxHashSet;

use crate::dag::{Dag, ReachMode, CLEAN, NOT_REACHABLE_WITHOUT_EDGE, REACHABLE_WITHOUT_EDGE};
use crate::oriented::OrientedGraph;

/// True forward reach-set of `start` (excluding `start` itself), by DFS
/// on the physical edges. `skip_edge` suppresses one direct edge, which
/// is how the reach-without-link tristates are validated.
fn true_reach(
    data: &OrientedGraph,
    start: VertexId,
    skip_edge: Option<(VertexId, VertexId)>,
) -> Result<FxHashSet<VertexId>, GraphError> {
    let mut reached = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        for u in data.outgoing(v)? {
            if skip_edge == Some((v, u)) {
                continue;
            }
            if u != start && reached.insert(u) {
                stack.push(u);
            }
        }
    }
    Ok(reached)
}

pub(crate) fn check(dag: &Dag) -> Result<(), GraphError> {
    let Some(canreach) = dag.canreach.as_ref() else {
        return Ok(());
    };

    if dag.data.first_invalid_id() != canreach.first_invalid_id() {
        return Err(GraphError::inconsistent(format!(
            "store lengths diverge: data tracks {} ids, canreach {}",
            dag.data.first_invalid_id(),
            canreach.first_invalid_id()
        )));
    }

    for v in 0..dag.data.first_invalid_id().as_u32() {
        let v = VertexId::new(v);
        if !dag.data.vertex_exists(v) {
            if canreach.vertex_exists(v) {
                return Err(GraphError::inconsistent(format!(
                    "vertex {v} is live in canreach but not in data"
                )));
            }
            continue;
        }

        let mut closure = true_reach(&dag.data, v, None)?;
        closure.insert(v);
        let cone = dag.outgoing_reach_including_self(v)?;

        if canreach.vertex_tag(v)? == CLEAN {
            if cone != closure {
                return Err(GraphError::inconsistent(format!(
                    "clean row {v} diverges from the true closure \
                     (cached {} vs true {})",
                    cone.len(),
                    closure.len()
                )));
            }
            if dag.config().mode == ReachMode::CachedReachWithoutLink {
                check_edge_tristates(dag, v)?;
            }
        } else if !closure.is_subset(&cone) {
            return Err(GraphError::inconsistent(format!(
                "dirty row {v} has a false negative (cached {} vs true {})",
                cone.len(),
                closure.len()
            )));
        }
    }
    Ok(())
}

fn check_edge_tristates(dag: &Dag, v: VertexId) -> Result<(), GraphError> {
    for child in dag.data.outgoing(v)? {
        let without_edge = true_reach(&dag.data, v, Some((v, child)))?;
        let tristate = dag.edge_cell(v, child)?;
        let reachable = without_edge.contains(&child);
        if tristate == REACHABLE_WITHOUT_EDGE && !reachable {
            return Err(GraphError::inconsistent(format!(
                "edge {v} -> {child} claims the target is reachable without it, but it is not"
            )));
        }
        if tristate == NOT_REACHABLE_WITHOUT_EDGE && reachable {
            return Err(GraphError::inconsistent(format!(
                "edge {v} -> {child} claims the target is unreachable without it, but it is reachable"
            )));
        }
        if tristate != REACHABLE_WITHOUT_EDGE && tristate != NOT_REACHABLE_WITHOUT_EDGE {
            return Err(GraphError::inconsistent(format!(
                "edge {v} -> {child} carries a tristate outside the reach-without-link alphabet"
            )));
        }
    }
    Ok(())
}
