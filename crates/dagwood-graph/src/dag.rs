//! Cycle-rejecting DAG over two oriented graphs.
//!
//! `data` holds the physical edges. `canreach` caches the transitive
//! closure so that the cycle check on insertion (`can to already reach
//! from?`) is a single cell read in the common case. Deletion does not
//! recompute anything: it marks the whole upstream cone dirty and leaves
//! the cleanup to whichever reachability query next needs an exact answer.
//!
//! The two stores share one id space. A `canreach` cell carries closure
//! bits only while the pair has no physical edge; when an edge is present
//! the cell is repurposed as a per-edge ternary value (user data or the
//! reach-without-this-edge cache, depending on the mode).
//!
//! Dirty rows are supersets of the truth: false positives are possible,
//! false negatives are not. That one-sided guarantee is what lets a
//! `false` read from a dirty row skip cleaning entirely.

use dagwood_core::{GraphError, Trit, VertexId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::audit;
use crate::oriented::{Linkage, OrientedGraph, VertexRemoval, VertexTag};

// canreach row cleanliness, stored in the sidestructure's vertex tags
pub(crate) const CLEAN: VertexTag = VertexTag::TypeOne;
pub(crate) const DIRTY: VertexTag = VertexTag::TypeTwo;

// per-edge cell values in reach-without-link mode
pub(crate) const REACHABLE_WITHOUT_EDGE: Trit = Trit::ZERO;
pub(crate) const NOT_REACHABLE_WITHOUT_EDGE: Trit = Trit::ONE;

/// How reachability queries are answered, fixed at construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReachMode {
    /// No sidestructure; every query walks the data graph.
    Uncached,
    /// Closure cache; the per-edge cell is unused.
    #[default]
    Cached,
    /// Closure cache; the per-edge cell is opaque user data, reachable
    /// through [`Dag::edge_tristate`] / [`Dag::set_edge_tristate`].
    CachedUserTristate,
    /// Closure cache; the per-edge cell records whether the edge's target
    /// would still be reachable if the edge itself were removed, which
    /// buys a fast path on deletion.
    CachedReachWithoutLink,
}

impl ReachMode {
    #[inline]
    fn is_cached(self) -> bool {
        self != ReachMode::Uncached
    }
}

/// Engine configuration. The mode combinations the engine cannot honor
/// (auditing without a cache to audit) are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DagConfig {
    pub mode: ReachMode,
    /// Re-verify the whole sidestructure after every mutating call.
    /// O(n^2) per mutation; debug and test schedules only.
    pub consistency_check: bool,
}

/// Directed acyclic graph with incremental cycle rejection.
#[derive(Debug)]
pub struct Dag {
    pub(crate) data: OrientedGraph,
    pub(crate) canreach: Option<OrientedGraph>,
    config: DagConfig,
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}

impl Dag {
    pub fn new() -> Self {
        Self::new_with_config(DagConfig::default())
    }

    /// # Panics
    /// Panics when `consistency_check` is requested without a
    /// reachability cache to check.
    pub fn new_with_config(config: DagConfig) -> Self {
        assert!(
            !(config.consistency_check && !config.mode.is_cached()),
            "consistency checking requires the reachability cache"
        );
        Self {
            data: OrientedGraph::new(),
            canreach: config.mode.is_cached().then(OrientedGraph::new),
            config,
        }
    }

    /// Engine sized so that `first_invalid` ids are tracked up front.
    pub fn with_capacity(config: DagConfig, first_invalid: u32) -> Self {
        let mut dag = Self::new_with_config(config);
        dag.set_capacity_first_invalid(VertexId::new(first_invalid));
        dag
    }

    pub fn config(&self) -> &DagConfig {
        &self.config
    }

    #[inline]
    fn canreach(&self) -> &OrientedGraph {
        self.canreach
            .as_ref()
            .expect("reachability cache is allocated in every cached mode")
    }

    #[inline]
    fn canreach_mut(&mut self) -> &mut OrientedGraph {
        self.canreach
            .as_mut()
            .expect("reachability cache is allocated in every cached mode")
    }

    fn maybe_audit(&self) {
        if self.config.consistency_check {
            if let Err(err) = audit::check(self) {
                panic!("{err}");
            }
        }
    }

    /// Full sidestructure audit; always `true` in uncached mode.
    pub fn is_internally_consistent(&self) -> bool {
        match audit::check(self) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{err}");
                false
            }
        }
    }

    //
    // delegated reads (the data graph is the graph)
    //

    pub fn first_invalid_id(&self) -> VertexId {
        self.data.first_invalid_id()
    }

    pub fn max_valid_id(&self) -> Option<VertexId> {
        self.data.max_valid_id()
    }

    pub fn vertex_exists(&self, v: VertexId) -> bool {
        self.data.vertex_exists(v)
    }

    /// User tag on the data graph. Unrelated to the sidestructure's
    /// cleanliness bookkeeping, which lives in the other store's tags.
    pub fn vertex_tag(&self, v: VertexId) -> Result<VertexTag, GraphError> {
        self.data.vertex_tag(v)
    }

    pub fn set_vertex_tag(&mut self, v: VertexId, tag: VertexTag) -> Result<(), GraphError> {
        self.data.set_vertex_tag(v, tag)
    }

    pub fn flip_vertex_tag(&mut self, v: VertexId) -> Result<VertexTag, GraphError> {
        self.data.flip_vertex_tag(v)
    }

    pub fn has_linkage(&self, a: VertexId, b: VertexId) -> Result<Linkage, GraphError> {
        self.data.has_linkage(a, b)
    }

    pub fn edge_exists(&self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        self.data.edge_exists(from, to)
    }

    pub fn outgoing(&self, v: VertexId) -> Result<FxHashSet<VertexId>, GraphError> {
        self.data.outgoing(v)
    }

    pub fn incoming(&self, v: VertexId) -> Result<FxHashSet<VertexId>, GraphError> {
        self.data.incoming(v)
    }

    /// Every physical edge, in one pass over the packed store.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        self.data.edges()
    }

    //
    // capacity (mirrored to both stores)
    //

    pub fn set_capacity_for_max_valid_id(&mut self, v: VertexId) {
        self.data.set_capacity_for_max_valid_id(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.set_capacity_for_max_valid_id(v);
        }
    }

    pub fn set_capacity_first_invalid(&mut self, v: VertexId) {
        self.data.set_capacity_first_invalid(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.set_capacity_first_invalid(v);
        }
    }

    pub fn grow_to_max_valid_id(&mut self, v: VertexId) {
        self.data.grow_to_max_valid_id(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.grow_to_max_valid_id(v);
        }
    }

    pub fn shrink_to_first_invalid(&mut self, v: VertexId) {
        self.data.shrink_to_first_invalid(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.shrink_to_first_invalid(v);
        }
    }

    //
    // vertex lifecycle
    //

    pub fn create_vertex(&mut self, v: VertexId) -> Result<(), GraphError> {
        self.create_vertex_with_tag(v, VertexTag::TypeOne)
    }

    pub fn create_vertex_with_tag(&mut self, v: VertexId, tag: VertexTag) -> Result<(), GraphError> {
        self.data.create_vertex_with_tag(v, tag)?;
        if let Some(canreach) = self.canreach.as_mut() {
            // a fresh vertex reaches nothing, so its empty row is exact
            canreach.create_vertex_with_tag(v, CLEAN)?;
        }
        self.maybe_audit();
        Ok(())
    }

    /// Destroy `v` in both stores.
    ///
    /// Incident edges are retired one by one through the regular edge
    /// removal path first, so the upstream cones get their dirty marks
    /// exactly as if the caller had cleared the edges before destroying
    /// the then-isolated vertex.
    pub fn destroy_vertex(
        &mut self,
        v: VertexId,
        compact: bool,
    ) -> Result<VertexRemoval, GraphError> {
        let outgoing = self.data.outgoing(v)?;
        let incoming = self.data.incoming(v)?;
        if self.canreach.is_some() {
            for &u in &outgoing {
                self.clear_edge_no_audit(v, u)?;
            }
            for &u in &incoming {
                self.clear_edge_no_audit(u, v)?;
            }
        }

        let mut removal = self.data.destroy_vertex(v, compact)?;
        removal.incoming_cleared = incoming.len() as u32;
        removal.outgoing_cleared = outgoing.len() as u32;
        if let Some(canreach) = self.canreach.as_mut() {
            // drops v's closure row and every cached "reaches v" bit
            canreach.destroy_vertex(v, compact)?;
        }
        self.maybe_audit();
        Ok(removal)
    }

    //
    // reachability
    //

    /// Is there a directed path `from -> ... -> to`?
    ///
    /// May clean `from`'s cached row, which is why this takes `&mut self`.
    /// `can_reach(v, v)` is `false`: the graph is acyclic, so no vertex
    /// has a path back to itself.
    pub fn can_reach(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        if from == to {
            self.data.require_live(from)?;
            return Ok(false);
        }
        if !self.config.mode.is_cached() {
            return self.dfs_can_reach(from, to);
        }

        match self.data.has_linkage(from, to)? {
            // a physical edge to the target is a path
            Linkage::Forward => Ok(true),
            // a physical edge from the target means any path back would
            // have closed a cycle, so there is none
            Linkage::Reverse => Ok(false),
            Linkage::None => {
                if self.canreach().vertex_tag(from)? == CLEAN {
                    return self.canreach().edge_exists(from, to);
                }
                // dirty rows never have false negatives
                if !self.canreach().edge_exists(from, to)? {
                    return Ok(false);
                }
                self.clean_reachability(from)?;
                self.canreach().edge_exists(from, to)
            }
        }
    }

    /// Would `set_edge(from, to)` be rejected?
    pub fn insertion_would_cycle(
        &mut self,
        from: VertexId,
        to: VertexId,
    ) -> Result<bool, GraphError> {
        self.can_reach(to, from)
    }

    fn dfs_can_reach(&self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        self.data.require_live(to)?;
        let mut visited: FxHashSet<VertexId> = FxHashSet::default();
        let mut stack = vec![from];
        visited.insert(from);
        while let Some(v) = stack.pop() {
            for u in self.data.outgoing(v)? {
                if u == to {
                    return Ok(true);
                }
                if visited.insert(u) {
                    stack.push(u);
                }
            }
        }
        Ok(false)
    }

    //
    // edge mutation
    //

    /// Insert the edge `from -> to`.
    ///
    /// Returns `false` when the edge already existed. Fails with
    /// [`GraphError::CycleWouldBeIntroduced`] when `to` can already reach
    /// `from`; the graph is unchanged in that case.
    pub fn set_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        let result = self.set_edge_no_audit(from, to);
        match &result {
            Ok(_) | Err(GraphError::CycleWouldBeIntroduced { .. }) => self.maybe_audit(),
            Err(_) => {}
        }
        result
    }

    /// Remove the edge `from -> to`. Returns `false` when it was absent.
    pub fn clear_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        let result = self.clear_edge_no_audit(from, to);
        if result.is_ok() {
            self.maybe_audit();
        }
        result
    }

    fn set_edge_no_audit(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        if self.insertion_would_cycle(from, to)? {
            return Err(GraphError::CycleWouldBeIntroduced { from, to });
        }
        if !self.config.mode.is_cached() {
            return self.data.set_edge(from, to);
        }

        let reach_without_link = self.config.mode == ReachMode::CachedReachWithoutLink;

        // tentative: a dirty row may be claiming this falsely, which only
        // costs us a too-optimistic tristate, never a wrong closure
        let reachable_before =
            reach_without_link && self.canreach().edge_exists(from, to)?;

        if !self.data.set_edge(from, to)? {
            return Ok(false);
        }
        tracing::debug!(from = from.as_u32(), to = to.as_u32(), "edge inserted");

        if reach_without_link {
            let tristate = if reachable_before {
                REACHABLE_WITHOUT_EDGE
            } else {
                NOT_REACHABLE_WITHOUT_EDGE
            };
            self.set_edge_cell(from, to, tristate)?;
        }

        // everything to canreach's knowledge reachable from `to`, and
        // everything that reaches `from`; both are supersets when dirty
        let to_reach = self.outgoing_reach_including_self(to)?;
        let tag_to = self.canreach().vertex_tag(to)?;
        let from_reach = self.incoming_reach_including_self(from)?;
        let tag_from = self.canreach().vertex_tag(from)?;

        for &a in &from_reach {
            if reach_without_link {
                // `a` gained a second route to any physical child that
                // `to` reaches, so those edges are no longer load-bearing
                for x in self.data.outgoing(a)? {
                    if a == from && x == to {
                        continue;
                    }
                    if to_reach.contains(&x) {
                        self.set_edge_cell(a, x, REACHABLE_WITHOUT_EDGE)?;
                        if tag_to == DIRTY {
                            self.canreach_mut().set_vertex_tag(a, DIRTY)?;
                        }
                    }
                }
            }

            for &b in &to_reach {
                if a == b {
                    continue;
                }
                match self.data.has_linkage(a, b)? {
                    // the cell is that edge's tristate, not a closure bit
                    Linkage::Forward => {}
                    Linkage::Reverse => {
                        // a genuine path a -> b against a physical edge
                        // b -> a would be a cycle; `b` can only be here as
                        // a dirty row's false positive
                        debug_assert_eq!(self.canreach().vertex_tag(b)?, DIRTY);
                    }
                    Linkage::None => {
                        if self.canreach().vertex_tag(b)? == DIRTY {
                            // stale leftover from before b was dirtied
                            self.canreach_mut().clear_edge(b, a)?;
                        } else {
                            debug_assert!(
                                !self.canreach().edge_exists(b, a)?,
                                "clean row {b} claims to reach {a}, which the new edge makes a cycle"
                            );
                        }
                        let tag_a = self.canreach().vertex_tag(a)?;
                        let tag = if tag_a == CLEAN && tag_to == CLEAN && tag_from == CLEAN {
                            CLEAN
                        } else {
                            DIRTY
                        };
                        let canreach = self.canreach_mut();
                        canreach.set_vertex_tag(a, tag)?;
                        canreach.set_edge(a, b)?;
                    }
                }
            }
        }
        Ok(true)
    }

    fn clear_edge_no_audit(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        if !self.config.mode.is_cached() {
            return self.data.clear_edge(from, to);
        }

        if self.config.mode == ReachMode::CachedReachWithoutLink {
            if !self.data.edge_exists(from, to)? {
                return Ok(false);
            }
            let tristate = self.edge_cell(from, to)?;
            self.set_edge_cell(from, to, Trit::ZERO)?;
            self.data.clear_edge(from, to)?;

            // the edge carried its own alibi: if the target stays
            // reachable without it and our row was exact, reachability is
            // unchanged and nobody needs a dirty mark
            if self.canreach().vertex_tag(from)? == CLEAN
                && tristate == REACHABLE_WITHOUT_EDGE
            {
                self.canreach_mut().set_edge(from, to)?;
                tracing::debug!(
                    from = from.as_u32(),
                    to = to.as_u32(),
                    "edge removed; reachability unchanged"
                );
                return Ok(true);
            }
        } else if !self.data.clear_edge(from, to)? {
            return Ok(false);
        }

        // everything upstream of `from` (self included) may have lost
        // reachability it cannot cheaply re-derive; over-approximate by
        // dirtying the whole cone and let readers clean lazily
        let from_cone = self.incoming_reach_including_self(from)?;
        for &a in &from_cone {
            self.canreach_mut().set_vertex_tag(a, DIRTY)?;
        }
        tracing::debug!(
            from = from.as_u32(),
            to = to.as_u32(),
            dirtied = from_cone.len(),
            "edge removed; upstream cone dirtied"
        );

        // the pair's cell reverts to closure duty; seed it with the
        // superset assumption "from still reaches to" (a transitive path
        // may exist) after dropping any leftover reverse tristate
        if self.canreach().edge_exists(to, from)? {
            self.canreach_mut().clear_edge(to, from)?;
        }
        self.canreach_mut().set_edge(from, to)?;
        Ok(true)
    }

    //
    // reach cones
    //

    /// Physical in-edges of `v`, plus the cached "reaches v" relation for
    /// pairs with no physical linkage, plus `v` itself. Exact when `v`'s
    /// row is clean, a superset otherwise.
    pub(crate) fn incoming_reach_including_self(
        &self,
        v: VertexId,
    ) -> Result<FxHashSet<VertexId>, GraphError> {
        let mut cone = self.data.incoming(v)?;
        for u in self.canreach().incoming(v)? {
            if self.data.has_linkage(v, u)? == Linkage::None {
                cone.insert(u);
            }
        }
        cone.insert(v);
        Ok(cone)
    }

    /// Mirror image of [`Self::incoming_reach_including_self`].
    pub(crate) fn outgoing_reach_including_self(
        &self,
        v: VertexId,
    ) -> Result<FxHashSet<VertexId>, GraphError> {
        let mut cone = self.data.outgoing(v)?;
        for u in self.canreach().outgoing(v)? {
            if self.data.has_linkage(v, u)? == Linkage::None {
                cone.insert(u);
            }
        }
        cone.insert(v);
        Ok(cone)
    }

    //
    // lazy cleaning
    //

    /// Recompute the exact closure row of `v` from its physical children,
    /// cleaning those children first. Terminates because the data graph
    /// is acyclic; touches no row upstream of `v`.
    fn clean_reachability(&mut self, v: VertexId) -> Result<(), GraphError> {
        tracing::trace!(vertex = v.as_u32(), "cleaning reachability row");

        // drop every cached closure bit in the row; the physical-linkage
        // cells are edge tristates and stay
        for u in self.canreach().outgoing(v)? {
            if self.data.has_linkage(v, u)? == Linkage::None {
                self.canreach_mut().clear_edge(v, u)?;
            }
        }

        let children = self.data.outgoing(v)?;
        let mut child_reach: FxHashMap<VertexId, FxHashSet<VertexId>> = FxHashMap::default();
        for &child in &children {
            if self.canreach().vertex_tag(child)? == DIRTY {
                self.clean_reachability(child)?;
            }
            let reach = self.outgoing_reach_including_self(child)?;
            for &w in &reach {
                if w == child || w == v {
                    continue;
                }
                if self.data.has_linkage(v, w)? != Linkage::None {
                    continue;
                }
                if self.canreach().edge_exists(w, v)? {
                    // a clean row claiming w -> v alongside v -> w would
                    // mean the data graph has a cycle
                    debug_assert_eq!(self.canreach().vertex_tag(w)?, DIRTY);
                    self.canreach_mut().clear_edge(w, v)?;
                }
                self.canreach_mut().set_edge(v, w)?;
            }
            child_reach.insert(child, reach);
        }

        if self.config.mode == ReachMode::CachedReachWithoutLink {
            // an edge keeps "reachable without me" only if some sibling's
            // freshly cleaned reach-set still covers its target
            for &child in &children {
                if self.edge_cell(v, child)? != REACHABLE_WITHOUT_EDGE {
                    continue;
                }
                let other_path = child_reach
                    .iter()
                    .any(|(&sibling, reach)| sibling != child && reach.contains(&child));
                if !other_path {
                    self.set_edge_cell(v, child, NOT_REACHABLE_WITHOUT_EDGE)?;
                }
            }
        }

        self.canreach_mut().set_vertex_tag(v, CLEAN)?;
        Ok(())
    }

    //
    // per-edge cell (tristate co-tenant)
    //

    /// Read the ternary value riding on a physical edge. The cell is only
    /// an edge attribute while the edge exists; that contract is checked.
    pub(crate) fn edge_cell(&self, from: VertexId, to: VertexId) -> Result<Trit, GraphError> {
        if !self.data.edge_exists(from, to)? {
            return Err(GraphError::EdgeNotFound { from, to });
        }
        Ok(match self.canreach().has_linkage(from, to)? {
            Linkage::None => Trit::ZERO,
            Linkage::Forward => Trit::ONE,
            Linkage::Reverse => Trit::TWO,
        })
    }

    pub(crate) fn set_edge_cell(
        &mut self,
        from: VertexId,
        to: VertexId,
        value: Trit,
    ) -> Result<(), GraphError> {
        if !self.data.edge_exists(from, to)? {
            return Err(GraphError::EdgeNotFound { from, to });
        }
        let current = self.canreach().has_linkage(from, to)?;
        let canreach = self.canreach_mut();
        match value.value() {
            0 => match current {
                Linkage::Forward => {
                    canreach.clear_edge(from, to)?;
                }
                Linkage::Reverse => {
                    canreach.clear_edge(to, from)?;
                }
                Linkage::None => {}
            },
            1 => {
                if current == Linkage::Reverse {
                    canreach.clear_edge(to, from)?;
                }
                canreach.set_edge(from, to)?;
            }
            _ => {
                if current == Linkage::Forward {
                    canreach.clear_edge(from, to)?;
                }
                canreach.set_edge(to, from)?;
            }
        }
        Ok(())
    }

    /// User-owned per-edge ternary value.
    ///
    /// # Panics
    /// Panics unless the engine was built in
    /// [`ReachMode::CachedUserTristate`]; in every other mode the cell
    /// belongs to the engine.
    pub fn edge_tristate(&self, from: VertexId, to: VertexId) -> Result<Trit, GraphError> {
        assert!(
            self.config.mode == ReachMode::CachedUserTristate,
            "per-edge tristates are user-owned only in CachedUserTristate mode"
        );
        self.edge_cell(from, to)
    }

    /// # Panics
    /// Panics unless the engine was built in
    /// [`ReachMode::CachedUserTristate`].
    pub fn set_edge_tristate(
        &mut self,
        from: VertexId,
        to: VertexId,
        value: Trit,
    ) -> Result<(), GraphError> {
        assert!(
            self.config.mode == ReachMode::CachedUserTristate,
            "per-edge tristates are user-owned only in CachedUserTristate mode"
        );
        self.set_edge_cell(from, to, value)
    }
}
