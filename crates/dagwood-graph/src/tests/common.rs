//! Shared helpers: the petgraph reference oracle and the randomized
//! edge bookkeeping used by the fuzz schedules.

use std::collections::BTreeSet;

use petgraph::algo::has_path_connecting;
use petgraph::prelude::DiGraphMap;
use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::{Dag, DagConfig, Linkage, ReachMode, VertexId};

pub fn id(v: u32) -> VertexId {
    VertexId::new(v)
}

pub fn all_modes() -> [ReachMode; 4] {
    [
        ReachMode::Uncached,
        ReachMode::Cached,
        ReachMode::CachedUserTristate,
        ReachMode::CachedReachWithoutLink,
    ]
}

pub fn cached_modes() -> [ReachMode; 3] {
    [
        ReachMode::Cached,
        ReachMode::CachedUserTristate,
        ReachMode::CachedReachWithoutLink,
    ]
}

pub fn dag_with(mode: ReachMode) -> Dag {
    Dag::new_with_config(DagConfig {
        mode,
        consistency_check: false,
    })
}

pub fn audited_dag_with(mode: ReachMode) -> Dag {
    Dag::new_with_config(DagConfig {
        mode,
        consistency_check: true,
    })
}

pub fn create_vertices(dag: &mut Dag, count: u32) {
    for v in 0..count {
        dag.create_vertex(id(v)).unwrap();
    }
}

pub fn dag_edges(dag: &Dag, count: u32) -> BTreeSet<(u32, u32)> {
    // cross-check the one-pass enumerator against the per-vertex scans
    let enumerated: BTreeSet<(u32, u32)> = dag
        .edges()
        .into_iter()
        .map(|(from, to)| (from.as_u32(), to.as_u32()))
        .collect();
    let mut scanned = BTreeSet::new();
    for v in 0..count {
        for u in dag.outgoing(id(v)).unwrap() {
            scanned.insert((v, u.as_u32()));
        }
    }
    assert_eq!(enumerated, scanned);
    scanned
}

/// Reference DAG implemented on petgraph, playing the role of an
/// independent truth for cycle rejection and reachability.
pub struct OracleDag {
    graph: DiGraphMap<u32, ()>,
}

impl OracleDag {
    pub fn new() -> Self {
        Self {
            graph: DiGraphMap::new(),
        }
    }

    pub fn create_vertex(&mut self, v: u32) {
        self.graph.add_node(v);
    }

    /// `Err(())` when the insertion would close a cycle, `Ok(false)` when
    /// the edge already existed.
    pub fn set_edge(&mut self, from: u32, to: u32) -> Result<bool, ()> {
        if self.graph.contains_edge(from, to) {
            return Ok(false);
        }
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            return Err(());
        }
        self.graph.add_edge(from, to, ());
        Ok(true)
    }

    pub fn clear_edge(&mut self, from: u32, to: u32) -> bool {
        self.graph.remove_edge(from, to).is_some()
    }

    pub fn can_reach(&self, from: u32, to: u32) -> bool {
        from != to && has_path_connecting(&self.graph, from, to, None)
    }

    pub fn edges(&self) -> BTreeSet<(u32, u32)> {
        self.graph.all_edges().map(|(a, b, _)| (a, b)).collect()
    }
}

/// Uniform random access to the current edge set. A dense ternary matrix
/// has no cheap edge enumeration, so the fuzz driver keeps its own
/// swap-remove ledger alongside the graphs under test.
pub struct EdgeBook {
    edges: Vec<(u32, u32)>,
    index: FxHashMap<(u32, u32), usize>,
}

impl EdgeBook {
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn insert(&mut self, edge: (u32, u32)) {
        debug_assert!(!self.index.contains_key(&edge));
        self.index.insert(edge, self.edges.len());
        self.edges.push(edge);
    }

    pub fn remove(&mut self, edge: (u32, u32)) {
        let slot = self.index.remove(&edge).expect("edge was tracked");
        self.edges.swap_remove(slot);
        if slot < self.edges.len() {
            self.index.insert(self.edges[slot], slot);
        }
    }

    pub fn random_edge(&self, rng: &mut StdRng) -> (u32, u32) {
        self.edges[rng.gen_range(0..self.edges.len())]
    }
}

/// Random ordered pair of distinct live vertices with no physical
/// connection in either direction.
pub fn random_unlinked_pair(dag: &Dag, count: u32, rng: &mut StdRng) -> (u32, u32) {
    loop {
        let from = rng.gen_range(0..count);
        let to = rng.gen_range(0..count);
        if from == to {
            continue;
        }
        if dag.has_linkage(id(from), id(to)).unwrap() == Linkage::None {
            return (from, to);
        }
    }
}
