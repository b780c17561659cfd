use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A chat message in the swarm conversation.
///
/// `sender` records which agent produced an assistant message; the history is
/// shared by every agent in the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
            sender: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Tag the message with the agent that produced it.
    pub fn from_agent(mut self, agent: impl Into<String>) -> Self {
        self.sender = Some(agent.into());
        self
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool use blocks from this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Extract `(tool_use_id, content)` pairs from tool result blocks.
    pub fn tool_results(&self) -> Vec<(&str, &str)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some((tool_use_id.as_str(), content.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Operation definition sent to the LLM as a callable function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Swarm event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum SwarmEvent {
    /// Pipeline run started.
    RunStarted { run_id: RunId, initial_agent: String },
    /// An agent became the active agent.
    AgentActivated { agent: String },
    /// Text streaming from the oracle.
    TextDelta(String),
    /// A stage operation is about to run.
    OperationStart { agent: String, op: String },
    /// A stage operation finished.
    OperationEnd {
        agent: String,
        op: String,
        status: String,
        is_error: bool,
    },
    /// An agent signalled that its work is done.
    AgentComplete { agent: String, turns: usize },
    /// Control passed from one agent to another.
    Handoff { from: String, to: String },
    /// Pipeline run reached the terminal state.
    RunComplete {
        run_id: RunId,
        last_agent: String,
        total_turns: usize,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Pipeline run aborted.
    RunError { run_id: RunId, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_and_sender() {
        let msg = ChatMessage::assistant_text("hello").from_agent("analyzer_agent");
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.sender.as_deref(), Some("analyzer_agent"));
        assert!(msg.tool_uses().is_empty());
    }

    #[test]
    fn test_tool_blocks() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: vec![
                ContentBlock::Text {
                    text: "Reading now.".into(),
                },
                ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "read_data".into(),
                    input: serde_json::json!({}),
                },
            ],
            sender: None,
            timestamp: None,
        };
        let uses = msg.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "read_data");
        assert_eq!(msg.text(), "Reading now.");
    }
}
