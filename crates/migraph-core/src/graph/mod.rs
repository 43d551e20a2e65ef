//! Migration dependency graph.
//!
//! Nodes are migration records. Edges come from two sources: the implicit
//! chain inside each module (every migration follows the previous one by
//! name, starting at the root) and explicit cross-module declarations.

pub mod dependency;
pub mod resolve;

pub use dependency::{DependencyGraph, Edges};
pub use resolve::{resolve, TraversalError};
