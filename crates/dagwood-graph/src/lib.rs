//! Incremental directed-acyclic-graph engine.
//!
//! The engine maintains a graph under arbitrary edge insertions and
//! deletions, rejecting any insertion that would introduce a cycle. Two
//! tightly coupled pieces do the work: [`OrientedGraph`], a packed
//! triangular adjacency store where every unordered vertex pair costs one
//! ternary digit, and [`Dag`], which layers a lazily invalidated
//! transitive-closure sidestructure on top so cycle checks on insertion
//! are O(1) amortized.
//!
//! Everything is single-threaded and in-memory. Reads that look pure
//! (notably [`Dag::can_reach`]) may clean cached reachability rows, which
//! is why they take `&mut self`.

mod audit;
mod layout;

pub mod dag;
pub mod oriented;

#[cfg(test)]
mod tests;

pub use dag::{Dag, DagConfig, ReachMode};
pub use oriented::{Linkage, OrientedGraph, VertexRemoval, VertexTag};

pub use dagwood_core::{GraphError, Trit, TritVec, VertexId};
