use serde::Serialize;

/// Identifier of a node, unique within one story.
pub type NodeId = i64;

/// A labeled edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    /// What the player sees and what utterances are matched against.
    pub text: String,
    /// ID of the node this choice leads to. Not checked until traversal.
    pub next_node_id: NodeId,
}

/// A single unit of narrative in the story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryNode {
    pub id: NodeId,
    /// Narrative text shown when the player arrives here.
    pub content: String,
    /// If true, the story is over at this node.
    pub is_ending: bool,
    /// Only meaningful when `is_ending` is set.
    pub is_winning_ending: bool,
    /// Outgoing choices. Order is the player-visible numbering.
    pub choices: Vec<Choice>,
}

impl StoryNode {
    /// Choice texts in stored order.
    pub fn option_texts(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.text.clone()).collect()
    }

    /// The winning flag, but only for endings.
    pub fn winning(&self) -> Option<bool> {
        self.is_ending.then_some(self.is_winning_ending)
    }
}
