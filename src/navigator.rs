use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::error::{StoryError, StoryResult};
use crate::story::{Choice, NodeId, Story, StoryNode};

// ---------------------------------------------------------------------------
// Snapshots returned to callers
// ---------------------------------------------------------------------------

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No story loaded.
    Empty,
    /// Cursor on a node that still offers choices.
    Positioned(NodeId),
    /// Cursor on an ending.
    Ended { node_id: NodeId, won: bool },
}

/// Full read-only view of the current position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub story_id: i64,
    pub title: String,
    pub created_at: String,
    pub node_id: NodeId,
    pub content: String,
    pub is_ending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_winning_ending: Option<bool>,
    pub options: Vec<String>,
    pub session_id: Option<String>,
}

/// Result of a successful choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOutcome {
    /// Text of the choice that matched, not the raw utterance.
    pub selected_choice: String,
    pub node_id: NodeId,
    pub content: String,
    pub is_ending: bool,
    /// Present only when the new node is an ending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_winning_ending: Option<bool>,
    pub options: Vec<String>,
}

/// A choice with its 1-based display number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberedOption {
    pub number: usize,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Choice resolution
// ---------------------------------------------------------------------------

/// Find the choice the player meant.
///
/// A choice matches when, ignoring case, the utterance contains the choice
/// text or the choice text contains the utterance. The first match in stored
/// order wins; there is no scoring.
pub fn resolve_choice<'a>(choices: &'a [Choice], utterance: &str) -> Option<&'a Choice> {
    let wanted = utterance.to_lowercase();
    choices.iter().find(|choice| {
        let text = choice.text.to_lowercase();
        text.contains(&wanted) || wanted.contains(&text)
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Position {
    story: Arc<Story>,
    /// Always a key of `story`'s node table.
    current_node_id: NodeId,
}

impl Position {
    fn current_node(&self) -> StoryResult<&StoryNode> {
        self.story.lookup_node(self.current_node_id)
    }
}

/// One player's progress through one story, plus the bookkeeping the story
/// service hands out along the way.
#[derive(Debug, Clone, Default)]
pub struct Session {
    position: Option<Position>,
    /// Job submitted by the most recent story creation.
    pub last_job_id: Option<String>,
    /// Session identifier issued by the story service.
    pub session_id: Option<String>,
    /// Story produced by the most recently completed job, not yet loaded.
    pub pending_story_id: Option<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        let Some(position) = &self.position else {
            return SessionState::Empty;
        };
        match position.current_node() {
            Ok(node) if node.is_ending => SessionState::Ended {
                node_id: node.id,
                won: node.is_winning_ending,
            },
            _ => SessionState::Positioned(position.current_node_id),
        }
    }

    pub fn story(&self) -> Option<&Arc<Story>> {
        self.position.as_ref().map(|p| &p.story)
    }

    /// Replace whatever was loaded and put the cursor on the story's root.
    pub fn load_story(&mut self, story: Arc<Story>) -> StoryResult<Status> {
        // Resolve the root before touching state so a bad story changes nothing.
        let root_id = story.root_node()?.id;

        info!(
            "Loading story {} '{}' at root node {}",
            story.id, story.title, root_id
        );

        self.position = Some(Position {
            story,
            current_node_id: root_id,
        });
        self.status()
    }

    /// Take the choice that best fits `utterance` and move the cursor.
    pub fn make_choice(&mut self, utterance: &str) -> StoryResult<ChoiceOutcome> {
        let position = self.position.as_mut().ok_or(StoryError::NoActiveStory)?;
        let story = Arc::clone(&position.story);
        let node = story.lookup_node(position.current_node_id)?;

        if node.is_ending {
            return Err(StoryError::StoryAlreadyEnded);
        }
        if node.choices.is_empty() {
            return Err(StoryError::NoChoicesAvailable);
        }

        let choice = resolve_choice(&node.choices, utterance).ok_or_else(|| {
            debug!("No choice matched \"{utterance}\" at node {}", node.id);
            StoryError::ChoiceNotFound {
                available: node.option_texts(),
            }
        })?;

        let next = story
            .lookup_node(choice.next_node_id)
            .map_err(|_| StoryError::DanglingChoice {
                choice: choice.text.clone(),
                target: choice.next_node_id,
            })?;

        info!(
            "Transition: {} -> {} (choice: \"{}\")",
            node.id, next.id, choice.text
        );

        let outcome = ChoiceOutcome {
            selected_choice: choice.text.clone(),
            node_id: next.id,
            content: next.content.clone(),
            is_ending: next.is_ending,
            is_winning_ending: next.winning(),
            options: next.option_texts(),
        };
        position.current_node_id = next.id;

        if next.is_ending {
            info!(
                "Story over at node {} (won={})",
                next.id, next.is_winning_ending
            );
        }

        Ok(outcome)
    }

    pub fn status(&self) -> StoryResult<Status> {
        let position = self.position.as_ref().ok_or(StoryError::NoActiveStory)?;
        let node = position.current_node()?;

        Ok(Status {
            story_id: position.story.id,
            title: position.story.title.clone(),
            created_at: position.story.created_at.clone(),
            node_id: node.id,
            content: node.content.clone(),
            is_ending: node.is_ending,
            is_winning_ending: node.winning(),
            options: node.option_texts(),
            session_id: self.session_id.clone(),
        })
    }

    /// Numbered choices at the current node. Empty at an ending.
    pub fn list_options(&self) -> StoryResult<Vec<NumberedOption>> {
        let position = self.position.as_ref().ok_or(StoryError::NoActiveStory)?;
        let node = position.current_node()?;

        if node.is_ending {
            return Ok(Vec::new());
        }

        Ok(node
            .choices
            .iter()
            .enumerate()
            .map(|(i, choice)| NumberedOption {
                number: i + 1,
                text: choice.text.clone(),
            })
            .collect())
    }
}
