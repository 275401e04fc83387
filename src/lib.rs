//! Play generated choose-your-own-adventure stories through agent tools.

pub mod config;
pub mod error;
pub mod navigator;
pub mod server;
pub mod service;
pub mod story;
pub mod tools;

pub use error::{StoryError, StoryResult};
pub use navigator::{resolve_choice, Session, SessionState};
pub use story::{Choice, NodeId, Story, StoryNode};
