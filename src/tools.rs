//! The operations offered to the agent.
//!
//! Every tool answers with a JSON record, `{"success": true, ...}` or
//! `{"success": false, "error": "..."}`. Errors never escape this module:
//! the caller is an agent that needs a describable outcome every time.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::StoryError;
use crate::navigator::Session;
use crate::service::{JobStatus, ServiceError, StoryService};
use crate::story::Story;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Story(#[from] StoryError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("no job ID provided and no active job found")]
    NoJobId,

    #[error("no story ID provided and no current story found")]
    NoStoryId,
}

type ToolResult = Result<Value, ToolError>;

/// Name, description and JSON schema of one tool, as listed to the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The game as seen by the agent: one session plus the story service.
pub struct StoryTools<S> {
    service: S,
    session: Session,
}

impl<S: StoryService> StoryTools<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "create_story",
                description: "Create a new Choose Your Own Adventure story with the given theme. \
                              Returns a job id to track generation progress.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "theme": {
                            "type": "string",
                            "description": "Theme for the story, e.g. \"space adventure\" or \"detective mystery\""
                        }
                    },
                    "required": ["theme"]
                }),
            },
            ToolDefinition {
                name: "check_job_status",
                description: "Check the status of a story generation job. \
                              Defaults to the most recently created job.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "job_id": { "type": "string", "description": "Job id to check" }
                    }
                }),
            },
            ToolDefinition {
                name: "get_story",
                description: "Load a completed story and start playing it from the beginning. \
                              Defaults to the story produced by the last completed job.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "story_id": { "type": "integer", "description": "Story id to load" }
                    }
                }),
            },
            ToolDefinition {
                name: "make_choice",
                description: "Make a choice in the current story. Any part of an option's text \
                              is enough to select it.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "choice_text": {
                            "type": "string",
                            "description": "The text of the option to select"
                        }
                    },
                    "required": ["choice_text"]
                }),
            },
            ToolDefinition {
                name: "get_current_status",
                description: "Get the current story position, its text and available options.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "list_available_options",
                description: "List the numbered choices available at the current position.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Run a tool by name. Always returns a record, never an error.
    pub fn call(&mut self, name: &str, args: &Value) -> Value {
        info!("Tool call: {name}");
        let result = match name {
            "create_story" => required_str(args, "theme").and_then(|t| self.create_story(t)),
            "check_job_status" => {
                optional_str(args, "job_id").and_then(|id| self.check_job_status(id))
            }
            "get_story" => optional_i64(args, "story_id").and_then(|id| self.get_story(id)),
            "make_choice" => required_str(args, "choice_text").and_then(|t| self.make_choice(t)),
            "get_current_status" => self.get_current_status(),
            "list_available_options" => self.list_available_options(),
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        result.unwrap_or_else(|err| {
            warn!("Tool {name} failed: {err}");
            failure(&err)
        })
    }

    pub fn create_story(&mut self, theme: &str) -> ToolResult {
        let job = self.service.create_story(theme)?;
        self.session.last_job_id = Some(job.job_id.clone());
        self.session.session_id = job.session_id.clone();

        Ok(json!({
            "success": true,
            "message": format!("Story creation started with theme: '{theme}'"),
            "job_id": job.job_id,
            "session_id": job.session_id,
            "status": job.status,
        }))
    }

    pub fn check_job_status(&mut self, job_id: Option<&str>) -> ToolResult {
        let job_id = match job_id {
            Some(id) => id.to_string(),
            None => self.session.last_job_id.clone().ok_or(ToolError::NoJobId)?,
        };

        let report = self.service.poll_job(&job_id)?;
        if report.status == JobStatus::Completed {
            if let Some(story_id) = report.story_id {
                info!("Job {} completed with story {story_id}", report.job_id);
                self.session.pending_story_id = Some(story_id);
            }
        }

        Ok(json!({
            "success": true,
            "job_id": report.job_id,
            "status": report.status,
            "theme": report.theme,
            "story_id": report.story_id,
            "created_at": report.created_at,
            "completed_at": report.completed_at,
            "error": report.error,
        }))
    }

    pub fn get_story(&mut self, story_id: Option<i64>) -> ToolResult {
        // 0 is never a real story id and means "the current one".
        let story_id = story_id
            .filter(|&id| id != 0)
            .or(self.session.pending_story_id)
            .ok_or(ToolError::NoStoryId)?;

        let payload = self.service.fetch_complete_story(story_id)?;
        // Parse fully before touching the session, so a bad payload keeps the old game.
        let story = Arc::new(Story::load(payload)?);
        let status = self.session.load_story(story)?;
        self.session.pending_story_id = Some(status.story_id);

        let mut record = json!({
            "success": true,
            "story_id": status.story_id,
            "title": status.title,
            "created_at": status.created_at,
            "current_content": status.content,
            "is_ending": status.is_ending,
            "options": status.options,
            "message": "Story loaded successfully. You can now make choices to progress.",
        });
        if let Some(won) = status.is_winning_ending {
            record["is_winning_ending"] = json!(won);
        }
        Ok(record)
    }

    pub fn make_choice(&mut self, choice_text: &str) -> ToolResult {
        let outcome = self.session.make_choice(choice_text)?;

        let mut record = json!({
            "success": true,
            "selected_choice": outcome.selected_choice,
            "current_content": outcome.content,
            "is_ending": outcome.is_ending,
            "options": outcome.options,
        });
        if let Some(won) = outcome.is_winning_ending {
            record["is_winning_ending"] = json!(won);
            record["message"] = json!("Story completed!");
        }
        Ok(record)
    }

    /// Unlike the other read operations, having no story is not a failure here.
    pub fn get_current_status(&self) -> ToolResult {
        let status = match self.session.status() {
            Ok(status) => status,
            Err(StoryError::NoActiveStory) => {
                return Ok(json!({
                    "success": true,
                    "has_active_story": false,
                    "message": "No active story. Create a new story to start playing.",
                }))
            }
            Err(err) => return Err(err.into()),
        };

        let mut record = json!({
            "success": true,
            "has_active_story": true,
            "story_id": status.story_id,
            "story_title": status.title,
            "current_content": status.content,
            "is_ending": status.is_ending,
            "options": status.options,
            "session_id": status.session_id,
        });
        if let Some(won) = status.is_winning_ending {
            record["is_winning_ending"] = json!(won);
        }
        Ok(record)
    }

    pub fn list_available_options(&self) -> ToolResult {
        let options = self.session.list_options()?;
        let message = if self.session.status()?.is_ending {
            "Story has ended. No more choices available.".to_string()
        } else {
            format!("Available choices: {}", options.len())
        };

        Ok(json!({
            "success": true,
            "options": options,
            "message": message,
        }))
    }
}

fn failure(err: &ToolError) -> Value {
    let mut record = json!({
        "success": false,
        "error": err.to_string(),
    });
    if let ToolError::Story(StoryError::ChoiceNotFound { available }) = err {
        record["available_options"] = json!(available);
    }
    record
}

// ---------------------------------------------------------------------------
// Argument extraction
// ---------------------------------------------------------------------------

fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::InvalidInput(format!("'{key}' must be a string"))),
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ToolError::InvalidInput(format!("'{key}' must be a string"))),
        None => Err(ToolError::InvalidInput(format!("missing '{key}'"))),
    }
}

fn optional_i64(args: &Value, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolError::InvalidInput(format!("'{key}' must be an integer"))),
    }
}
