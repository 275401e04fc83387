//! Story graph store: the immutable representation of one loaded story.

mod graph;
mod node;

pub use graph::Story;
pub use node::{Choice, NodeId, StoryNode};
