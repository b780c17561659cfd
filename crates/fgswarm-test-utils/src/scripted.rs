use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use fgswarm_core::config::ModelConfig;
use fgswarm_core::error::{FgError, Result};
use fgswarm_core::traits::LlmClient;
use fgswarm_core::types::{ChatMessage, Role, StopReason, StreamDelta, ToolDefinition};

/// One scripted oracle response.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Optional text plus zero or more operation calls.
    Reply {
        text: String,
        calls: Vec<(String, serde_json::Value)>,
    },
    /// The request itself fails.
    Fail(String),
    /// The request never resolves.
    Hang,
}

impl ScriptedTurn {
    /// A plain message with no calls; ends the active agent's work.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            calls: vec![],
        }
    }

    /// A single operation call.
    pub fn call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self::Reply {
            text: String::new(),
            calls: vec![(name.into(), args)],
        }
    }

    /// Several operation calls in one turn.
    pub fn calls(calls: Vec<(&str, serde_json::Value)>) -> Self {
        Self::Reply {
            text: String::new(),
            calls: calls
                .into_iter()
                .map(|(name, args)| (name.to_string(), args))
                .collect(),
        }
    }

    fn into_deltas(self, next_id: &AtomicUsize) -> Vec<Result<StreamDelta>> {
        let (text, calls) = match self {
            Self::Reply { text, calls } => (text, calls),
            Self::Fail(_) | Self::Hang => return vec![],
        };

        let mut deltas = Vec::new();
        if !text.is_empty() {
            deltas.push(Ok(StreamDelta::TextDelta(text)));
        }
        let stop = if calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        };
        for (index, (name, args)) in calls.into_iter().enumerate() {
            let id = format!("call_{}", next_id.fetch_add(1, Ordering::SeqCst));
            deltas.push(Ok(StreamDelta::ToolUseStart { index, id, name }));
            deltas.push(Ok(StreamDelta::ToolInputDelta {
                index,
                delta: args.to_string(),
            }));
        }
        deltas.push(Ok(StreamDelta::Stop(stop)));
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: 10,
            output_tokens: 5,
        }));
        deltas
    }
}

/// What the driver sent on one oracle call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub tool_names: Vec<String>,
    pub message_count: usize,
}

/// An [`LlmClient`] that replays a fixed script of turns.
///
/// Once the script is exhausted it either repeats a fallback turn (see
/// [`ScriptedLlm::repeating`]) or fails the request.
pub struct ScriptedLlm {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    fallback: Option<ScriptedTurn>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_id: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Return `turn` forever.
    pub fn repeating(turn: ScriptedTurn) -> Self {
        Self {
            fallback: Some(turn),
            ..Self::new(vec![])
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Scripted turns not yet consumed.
    pub fn remaining(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let system_prompt = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.text())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(RecordedRequest {
            system_prompt,
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            message_count: messages.len(),
        });

        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());

        Box::pin(async move {
            match turn {
                None => Err(FgError::LlmRequest("scripted oracle exhausted".into())),
                Some(ScriptedTurn::Fail(msg)) => Err(FgError::LlmRequest(msg)),
                Some(ScriptedTurn::Hang) => {
                    std::future::pending::<()>().await;
                    Err(FgError::LlmRequest("unreachable".into()))
                }
                Some(turn) => {
                    let deltas = turn.into_deltas(&self.next_id);
                    Ok(Box::pin(futures::stream::iter(deltas)) as BoxStream<'_, Result<StreamDelta>>)
                }
            }
        })
    }
}
