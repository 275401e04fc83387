use std::collections::HashMap;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{StoryError, StoryResult};
use crate::story::node::{Choice, NodeId, StoryNode};

// ---------------------------------------------------------------------------
// Wire format, as sent by the story service
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StoryPayload {
    id: i64,
    title: String,
    #[serde(default)]
    created_at: Option<String>,
    root_node: NodePayload,
    all_nodes: HashMap<String, NodePayload>,
}

/// Node fields are optional here so that a missing one is reported by name
/// instead of as a generic decode failure.
#[derive(Debug, Deserialize)]
struct NodePayload {
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    is_ending: Option<bool>,
    #[serde(default)]
    is_winning_ending: Option<bool>,
    #[serde(default)]
    options: Option<Vec<ChoicePayload>>,
}

#[derive(Debug, Deserialize)]
struct ChoicePayload {
    text: String,
    next_node_id: NodeId,
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// A fully materialized story: the root plus every node reachable from it.
/// Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub root_node_id: NodeId,
    nodes: HashMap<NodeId, StoryNode>,
}

impl Story {
    /// Build a story from the raw payload of the story service.
    ///
    /// Choice targets are not resolved here; a choice pointing nowhere only
    /// fails once a player actually takes it.
    pub fn load(payload: Value) -> StoryResult<Self> {
        let payload: StoryPayload = serde_json::from_value(payload)
            .map_err(|e| StoryError::MalformedStory(e.to_string()))?;

        let root_node_id = payload
            .root_node
            .id
            .ok_or_else(|| StoryError::MalformedStory("root node has no id".into()))?;

        let mut nodes = HashMap::with_capacity(payload.all_nodes.len());
        for (key, raw) in payload.all_nodes {
            let id: NodeId = key.parse().map_err(|_| {
                StoryError::MalformedStory(format!("node key '{key}' is not an integer id"))
            })?;
            if nodes.insert(id, build_node(id, raw)?).is_some() {
                return Err(StoryError::MalformedStory(format!("duplicate node id {id}")));
            }
        }

        if !nodes.contains_key(&root_node_id) {
            return Err(StoryError::MalformedStory(format!(
                "root node {root_node_id} is missing from the node table"
            )));
        }

        debug!(
            "Loaded story {} '{}' with {} nodes (root={})",
            payload.id,
            payload.title,
            nodes.len(),
            root_node_id
        );

        Ok(Self {
            id: payload.id,
            title: payload.title,
            created_at: payload.created_at.unwrap_or_default(),
            root_node_id,
            nodes,
        })
    }

    pub fn lookup_node(&self, id: NodeId) -> StoryResult<&StoryNode> {
        self.nodes.get(&id).ok_or(StoryError::NodeNotFound(id))
    }

    pub fn root_node(&self) -> StoryResult<&StoryNode> {
        self.lookup_node(self.root_node_id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn build_node(id: NodeId, raw: NodePayload) -> StoryResult<StoryNode> {
    let content = raw
        .content
        .ok_or_else(|| StoryError::MalformedStory(format!("node {id} has no content")))?;
    let is_ending = raw
        .is_ending
        .ok_or_else(|| StoryError::MalformedStory(format!("node {id} has no ending flag")))?;

    let choices = raw
        .options
        .unwrap_or_default()
        .into_iter()
        .map(|c| {
            if c.text.trim().is_empty() {
                return Err(StoryError::MalformedStory(format!(
                    "node {id} has a choice with empty text"
                )));
            }
            Ok(Choice {
                text: c.text,
                next_node_id: c.next_node_id,
            })
        })
        .collect::<StoryResult<Vec<_>>>()?;

    Ok(StoryNode {
        id,
        content,
        is_ending,
        is_winning_ending: raw.is_winning_ending.unwrap_or(false),
        choices,
    })
}
