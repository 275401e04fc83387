use thiserror::Error;

use crate::story::NodeId;

/// Errors raised by the story store and the session navigator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    /// The payload from the story service could not be turned into a story.
    #[error("malformed story: {0}")]
    MalformedStory(String),

    #[error("story node {0} not found")]
    NodeNotFound(NodeId),

    /// A choice points at a node the story does not contain.
    #[error("choice '{choice}' leads to node {target}, which does not exist in this story")]
    DanglingChoice { choice: String, target: NodeId },

    #[error("no active story found, load a story first")]
    NoActiveStory,

    /// Choices are refused once the player has reached an ending.
    #[error("story has ended, start a new story to continue playing")]
    StoryAlreadyEnded,

    /// Nothing matched the utterance. Carries every choice currently on offer.
    #[error("choice not found, available options: {available:?}")]
    ChoiceNotFound { available: Vec<String> },

    #[error("no options available at current story position")]
    NoChoicesAvailable,
}

pub type StoryResult<T> = Result<T, StoryError>;
