//! Packed oriented-graph adjacency store.
//!
//! An oriented graph holds at most one directed edge per vertex pair, so
//! the pair's state fits a single ternary digit: absent, low-points-high,
//! or high-points-low. Vertex existence uses the same alphabet (absent,
//! live as [`VertexTag::TypeOne`], live as [`VertexTag::TypeTwo`]), which
//! gives dense graphs an adjacency matrix at ~1.6 bits per pair that can
//! grow and shrink one vertex at a time without relocating stored data.

use dagwood_core::{GraphError, Trit, TritVec, VertexId};
use rustc_hash::FxHashSet;

use crate::layout;

// connection-cell values
const NOT_CONNECTED: Trit = Trit::ZERO;
const LOW_POINTS_TO_HIGH: Trit = Trit::ONE;
const HIGH_POINTS_TO_LOW: Trit = Trit::TWO;

/// Two-state property carried by every live vertex.
///
/// The store attaches no meaning to it; callers do. The DAG engine
/// repurposes it on its sidestructure as the per-row cleanliness flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexTag {
    TypeOne,
    TypeTwo,
}

impl VertexTag {
    fn cell(self) -> Trit {
        match self {
            VertexTag::TypeOne => Trit::ONE,
            VertexTag::TypeTwo => Trit::TWO,
        }
    }
}

/// Direction of the connection between an ordered vertex pair.
///
/// `Forward` means an edge in argument order (`a -> b`), `Reverse` the
/// opposite; the pair can never hold both.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Linkage {
    None,
    Forward,
    Reverse,
}

/// Summary of a vertex destruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRemoval {
    /// Tag the vertex carried when it was destroyed.
    pub tag: VertexTag,
    pub incoming_cleared: u32,
    pub outgoing_cleared: u32,
    /// New `first_invalid` when trailing holes were compacted away.
    pub compacted_to: Option<VertexId>,
}

/// Adjacency store over contiguous vertex ids `[0, first_invalid)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrientedGraph {
    cells: TritVec,
}

impl OrientedGraph {
    pub fn new() -> Self {
        Self {
            cells: TritVec::new(),
        }
    }

    /// Store sized so that `first_invalid` ids are tracked (none live yet).
    pub fn with_capacity(first_invalid: u32) -> Self {
        let mut graph = Self::new();
        graph.set_capacity_first_invalid(VertexId::new(first_invalid));
        graph
    }

    /// `n` such that existence cells cover ids `[0, n)`. Recovered from
    /// the cell-array length rather than cached.
    pub fn first_invalid_id(&self) -> VertexId {
        if self.cells.is_empty() {
            return VertexId::new(0);
        }
        layout::vertex_from_existence_index(self.cells.len())
    }

    /// Largest tracked id, or `None` for an empty store.
    pub fn max_valid_id(&self) -> Option<VertexId> {
        let first_invalid = self.first_invalid_id();
        if first_invalid.as_u32() == 0 {
            return None;
        }
        Some(VertexId::new(first_invalid.as_u32() - 1))
    }

    //
    // capacity
    //

    /// Resize so that `v` is the largest tracked id.
    ///
    /// # Panics
    /// Panics when `v` is the reserved invalid sentinel.
    pub fn set_capacity_for_max_valid_id(&mut self, v: VertexId) {
        assert!(v.is_valid(), "the maximum id is reserved as the invalid sentinel");
        self.cells
            .resize_with_zero_fill(layout::existence_index(VertexId::new(v.as_u32() + 1)));
    }

    /// Resize so that `v` becomes `first_invalid`.
    pub fn set_capacity_first_invalid(&mut self, v: VertexId) {
        self.cells.resize_with_zero_fill(layout::existence_index(v));
    }

    /// Growing variant of [`Self::set_capacity_for_max_valid_id`].
    ///
    /// # Panics
    /// Panics when `v` is already tracked.
    pub fn grow_to_max_valid_id(&mut self, v: VertexId) {
        assert!(v >= self.first_invalid_id());
        self.set_capacity_for_max_valid_id(v);
    }

    /// Shrinking variant of [`Self::set_capacity_first_invalid`].
    ///
    /// # Panics
    /// Panics when `v` would not shrink the store.
    pub fn shrink_to_first_invalid(&mut self, v: VertexId) {
        assert!(v < self.first_invalid_id());
        self.set_capacity_first_invalid(v);
    }

    //
    // existence and tags
    //

    #[inline]
    fn existence_cell(&self, v: VertexId) -> Trit {
        self.cells.get(layout::existence_index(v))
    }

    pub fn vertex_exists(&self, v: VertexId) -> bool {
        v.is_valid() && v < self.first_invalid_id() && self.existence_cell(v) != Trit::ZERO
    }

    pub(crate) fn require_live(&self, v: VertexId) -> Result<(), GraphError> {
        if !v.is_valid() || v >= self.first_invalid_id() {
            return Err(GraphError::IndexOutOfRange {
                id: v,
                first_invalid: self.first_invalid_id(),
            });
        }
        if self.existence_cell(v) == Trit::ZERO {
            return Err(GraphError::VertexNotLive { id: v });
        }
        Ok(())
    }

    pub fn create_vertex(&mut self, v: VertexId) -> Result<(), GraphError> {
        self.create_vertex_with_tag(v, VertexTag::TypeOne)
    }

    /// Bring `v` to life. The store grows as needed when `v` lies at or
    /// past `first_invalid`; ids in between become tracked holes.
    pub fn create_vertex_with_tag(&mut self, v: VertexId, tag: VertexTag) -> Result<(), GraphError> {
        if !v.is_valid() {
            return Err(GraphError::IndexOutOfRange {
                id: v,
                first_invalid: self.first_invalid_id(),
            });
        }
        if v >= self.first_invalid_id() {
            self.set_capacity_for_max_valid_id(v);
        } else if self.existence_cell(v) != Trit::ZERO {
            return Err(GraphError::VertexAlreadyLive { id: v });
        }
        self.cells.set(layout::existence_index(v), tag.cell());
        Ok(())
    }

    pub fn vertex_tag(&self, v: VertexId) -> Result<VertexTag, GraphError> {
        self.require_live(v)?;
        Ok(if self.existence_cell(v) == Trit::ONE {
            VertexTag::TypeOne
        } else {
            VertexTag::TypeTwo
        })
    }

    pub fn set_vertex_tag(&mut self, v: VertexId, tag: VertexTag) -> Result<(), GraphError> {
        self.require_live(v)?;
        self.cells.set(layout::existence_index(v), tag.cell());
        Ok(())
    }

    /// Toggle the tag between its two states, returning the new value.
    pub fn flip_vertex_tag(&mut self, v: VertexId) -> Result<VertexTag, GraphError> {
        let flipped = match self.vertex_tag(v)? {
            VertexTag::TypeOne => VertexTag::TypeTwo,
            VertexTag::TypeTwo => VertexTag::TypeOne,
        };
        self.set_vertex_tag(v, flipped)?;
        Ok(flipped)
    }

    //
    // edges
    //

    #[inline]
    fn connection_cell(&self, a: VertexId, b: VertexId) -> Trit {
        let (s, l) = if a < b { (a, b) } else { (b, a) };
        self.cells.get(layout::connection_index(s, l))
    }

    #[inline]
    fn set_connection_cell(&mut self, a: VertexId, b: VertexId, value: Trit) {
        let (s, l) = if a < b { (a, b) } else { (b, a) };
        self.cells.set(layout::connection_index(s, l), value);
    }

    /// Direction bits of the pair `{a, b}`, rotated into argument order.
    pub fn has_linkage(&self, a: VertexId, b: VertexId) -> Result<Linkage, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop { id: a });
        }
        self.require_live(a)?;
        self.require_live(b)?;
        let cell = self.connection_cell(a, b);
        if cell == NOT_CONNECTED {
            return Ok(Linkage::None);
        }
        // rotate the low/high encoding into argument order
        if (cell == LOW_POINTS_TO_HIGH) == (a < b) {
            Ok(Linkage::Forward)
        } else {
            Ok(Linkage::Reverse)
        }
    }

    pub fn edge_exists(&self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        Ok(self.has_linkage(from, to)? == Linkage::Forward)
    }

    /// Write the edge `from -> to`. Returns `false` when the edge was
    /// already present (no-op); fails with
    /// [`GraphError::ConflictingReverseEdge`] when the pair already holds
    /// the opposite direction.
    pub fn set_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        match self.has_linkage(from, to)? {
            Linkage::Forward => Ok(false),
            Linkage::Reverse => Err(GraphError::ConflictingReverseEdge { from, to }),
            Linkage::None => {
                let direction = if from < to {
                    LOW_POINTS_TO_HIGH
                } else {
                    HIGH_POINTS_TO_LOW
                };
                self.set_connection_cell(from, to, direction);
                Ok(true)
            }
        }
    }

    /// Erase the edge `from -> to` if present. A pair holding the reverse
    /// direction (or nothing) is left untouched and reports `false`.
    pub fn clear_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, GraphError> {
        match self.has_linkage(from, to)? {
            Linkage::Forward => {
                self.set_connection_cell(from, to, NOT_CONNECTED);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    //
    // enumeration
    //

    /// Scan the row of `v`, reporting each connected neighbor and whether
    /// the edge points away from `v`.
    fn for_each_incident(&self, v: VertexId, mut f: impl FnMut(VertexId, bool)) {
        for u in 0..self.first_invalid_id().as_u32() {
            let u = VertexId::new(u);
            if u == v {
                continue;
            }
            let cell = self.connection_cell(v, u);
            if cell != NOT_CONNECTED {
                f(u, (cell == LOW_POINTS_TO_HIGH) == (v < u));
            }
        }
    }

    pub fn outgoing(&self, v: VertexId) -> Result<FxHashSet<VertexId>, GraphError> {
        self.require_live(v)?;
        let mut set = FxHashSet::default();
        self.for_each_incident(v, |u, is_outgoing| {
            if is_outgoing {
                set.insert(u);
            }
        });
        Ok(set)
    }

    pub fn incoming(&self, v: VertexId) -> Result<FxHashSet<VertexId>, GraphError> {
        self.require_live(v)?;
        let mut set = FxHashSet::default();
        self.for_each_incident(v, |u, is_outgoing| {
            if !is_outgoing {
                set.insert(u);
            }
        });
        Ok(set)
    }

    /// Every edge in the store, recovered in one pass over the packed
    /// cells instead of a quadratic pair scan.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut edges = Vec::new();
        for pos in 0..self.cells.len() {
            if self.cells.get(pos) == NOT_CONNECTED || layout::is_existence_index(pos) {
                continue;
            }
            let (s, l) = layout::pair_from_connection_index(pos);
            if self.cells.get(pos) == LOW_POINTS_TO_HIGH {
                edges.push((s, l));
            } else {
                edges.push((l, s));
            }
        }
        edges
    }

    //
    // destruction
    //

    /// Destroy `v`: clear every incident edge, then the existence cell.
    ///
    /// With `compact`, trailing holes are shrunk away afterwards so that
    /// `first_invalid` lands on the smallest id whose suffix of existence
    /// cells is entirely zero. Holes below a live vertex are kept; only
    /// the tail is reclaimed, which avoids thrashing on isolated holes in
    /// the middle of the id space.
    pub fn destroy_vertex(
        &mut self,
        v: VertexId,
        compact: bool,
    ) -> Result<VertexRemoval, GraphError> {
        let tag = self.vertex_tag(v)?;

        let mut incoming_cleared = 0;
        let mut outgoing_cleared = 0;
        for u in 0..self.first_invalid_id().as_u32() {
            let u = VertexId::new(u);
            if u == v {
                continue;
            }
            let cell = self.connection_cell(v, u);
            if cell == NOT_CONNECTED {
                continue;
            }
            if (cell == LOW_POINTS_TO_HIGH) == (v < u) {
                outgoing_cleared += 1;
            } else {
                incoming_cleared += 1;
            }
            self.set_connection_cell(v, u, NOT_CONNECTED);
        }
        self.cells.set(layout::existence_index(v), Trit::ZERO);

        let mut compacted_to = None;
        if compact {
            if let Some(top) = self.max_valid_id() {
                if self.existence_cell(top) == Trit::ZERO {
                    let mut first_unused = top;
                    while first_unused.as_u32() > 0
                        && self.existence_cell(VertexId::new(first_unused.as_u32() - 1))
                            == Trit::ZERO
                    {
                        first_unused = VertexId::new(first_unused.as_u32() - 1);
                    }
                    self.shrink_to_first_invalid(first_unused);
                    compacted_to = Some(first_unused);
                }
            }
        }

        tracing::debug!(
            vertex = v.as_u32(),
            incoming = incoming_cleared,
            outgoing = outgoing_cleared,
            "vertex destroyed"
        );
        Ok(VertexRemoval {
            tag,
            incoming_cleared,
            outgoing_cleared,
            compacted_to,
        })
    }

    /// Destroy a vertex known to have no incoming edges.
    ///
    /// # Panics
    /// Panics when incoming edges were present after all.
    pub fn destroy_source_vertex(
        &mut self,
        v: VertexId,
        compact: bool,
    ) -> Result<VertexRemoval, GraphError> {
        let removal = self.destroy_vertex(v, compact)?;
        assert_eq!(
            removal.incoming_cleared, 0,
            "vertex {v} was destroyed as a source but had incoming edges"
        );
        Ok(removal)
    }

    /// Destroy a vertex known to have no outgoing edges.
    ///
    /// # Panics
    /// Panics when outgoing edges were present after all.
    pub fn destroy_sink_vertex(
        &mut self,
        v: VertexId,
        compact: bool,
    ) -> Result<VertexRemoval, GraphError> {
        let removal = self.destroy_vertex(v, compact)?;
        assert_eq!(
            removal.outgoing_cleared, 0,
            "vertex {v} was destroyed as a sink but had outgoing edges"
        );
        Ok(removal)
    }

    /// Destroy a vertex known to have no edges at all.
    ///
    /// # Panics
    /// Panics when any edge was present after all.
    pub fn destroy_isolated_vertex(
        &mut self,
        v: VertexId,
        compact: bool,
    ) -> Result<VertexRemoval, GraphError> {
        let removal = self.destroy_vertex(v, compact)?;
        assert!(
            removal.incoming_cleared == 0 && removal.outgoing_cleared == 0,
            "vertex {v} was destroyed as isolated but had edges"
        );
        Ok(removal)
    }
}
