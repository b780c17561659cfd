use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fgswarm_core::config::AppConfig;
use fgswarm_core::error::{FgError, Result};
use fgswarm_core::event::EventBus;
use fgswarm_core::traits::LlmClient;
use fgswarm_core::types::*;

use crate::agent::SwarmAgent;
use crate::context::SharedContext;
use crate::handoff::{HandoffTable, Transition};
use crate::stage::{StageCall, StageIo, StageOp, StageResult};

/// Accumulator for streaming operation-call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// One complete oracle response.
#[derive(Debug, Default)]
struct OracleReply {
    text: String,
    calls: Vec<ToolCallAccumulator>,
    stop_reason: Option<StopReason>,
}

/// What one agent did while it was active.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub agent: String,
    pub turns: usize,
    /// Operations that completed successfully, in call order.
    pub operations: Vec<String>,
    pub elapsed_ms: u64,
}

/// Result of a run that reached the terminal state.
#[derive(Debug, Clone)]
pub struct SwarmOutcome {
    pub run_id: RunId,
    pub context: SharedContext,
    pub last_agent: String,
    pub messages: Vec<ChatMessage>,
    pub agent_runs: Vec<AgentRun>,
    pub total_turns: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub elapsed_ms: u64,
    /// Files written by operations during this run, in write order.
    pub written_files: Vec<PathBuf>,
}

impl SwarmOutcome {
    /// Agents in activation order.
    pub fn route(&self) -> Vec<&str> {
        self.agent_runs.iter().map(|r| r.agent.as_str()).collect()
    }
}

#[derive(Default)]
struct RunState {
    ctx: SharedContext,
    messages: Vec<ChatMessage>,
    agent_runs: Vec<AgentRun>,
    total_turns: usize,
    input_tokens: u64,
    output_tokens: u64,
    written_files: Vec<PathBuf>,
}

/// Drives a set of agents through the handoff table until it terminates.
///
/// Strictly sequential: one agent active, one operation executing, at most
/// one outstanding oracle call.
pub struct Swarm {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    agents: Vec<SwarmAgent>,
    handoffs: HandoffTable,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    io: StageIo,
}

impl Swarm {
    pub fn new(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        agents: Vec<SwarmAgent>,
        handoffs: HandoffTable,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|a| a.name() == agent.name()) {
                return Err(FgError::Config(format!(
                    "duplicate agent name: {}",
                    agent.name()
                )));
            }
        }
        handoffs.validate(&agents)?;

        let io = StageIo::from(&config.paths);
        Ok(Self {
            config,
            llm,
            agents,
            handoffs,
            event_bus,
            cancel: CancellationToken::new(),
            io,
        })
    }

    /// Get a cancellation token for this swarm.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn agent(&self, name: &str) -> Result<&SwarmAgent> {
        self.agents
            .iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| FgError::UnknownAgent(name.to_string()))
    }

    /// Run from `initial_agent` until the handoff table terminates.
    ///
    /// On error the partially populated context is discarded.
    pub async fn run(
        &self,
        initial_agent: &str,
        initial_context: SharedContext,
        initial_message: &str,
    ) -> Result<SwarmOutcome> {
        let run_id = RunId::new();
        let start = Instant::now();
        let secs = self.config.pipeline.run_timeout_secs;

        info!(run_id = %run_id, initial_agent, "Swarm run started");
        self.event_bus.publish(SwarmEvent::RunStarted {
            run_id: run_id.clone(),
            initial_agent: initial_agent.to_string(),
        });

        let state = RunState {
            ctx: initial_context,
            messages: vec![ChatMessage::user(initial_message)],
            ..Default::default()
        };

        let result = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.drive(initial_agent, state),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FgError::Timeout {
                scope: "pipeline run".into(),
                secs,
            }),
        };

        match result {
            Ok((last_agent, state)) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    last_agent = %last_agent,
                    total_turns = state.total_turns,
                    input_tokens = state.input_tokens,
                    output_tokens = state.output_tokens,
                    elapsed_ms,
                    "Swarm run complete"
                );
                self.event_bus.publish(SwarmEvent::RunComplete {
                    run_id: run_id.clone(),
                    last_agent: last_agent.clone(),
                    total_turns: state.total_turns,
                    input_tokens: state.input_tokens,
                    output_tokens: state.output_tokens,
                });
                Ok(SwarmOutcome {
                    run_id,
                    context: state.ctx,
                    last_agent,
                    messages: state.messages,
                    agent_runs: state.agent_runs,
                    total_turns: state.total_turns,
                    input_tokens: state.input_tokens,
                    output_tokens: state.output_tokens,
                    elapsed_ms,
                    written_files: state.written_files,
                })
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Swarm run failed");
                self.event_bus.publish(SwarmEvent::RunError {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, initial_agent: &str, mut state: RunState) -> Result<(String, RunState)> {
        let mut current = self.agent(initial_agent)?.name().to_string();
        let mut previous: Option<String> = None;

        loop {
            let agent = self.agent(&current)?;
            info!(agent = %current, "Agent activated");
            self.event_bus.publish(SwarmEvent::AgentActivated {
                agent: current.clone(),
            });

            let agent_run = self.run_agent(agent, &mut state).await?;
            self.event_bus.publish(SwarmEvent::AgentComplete {
                agent: current.clone(),
                turns: agent_run.turns,
            });
            state.agent_runs.push(agent_run);

            match self
                .handoffs
                .resolve(&current, previous.as_deref(), &state.ctx)
            {
                Transition::Next(next) => {
                    info!(from = %current, to = %next, "Handoff");
                    self.event_bus.publish(SwarmEvent::Handoff {
                        from: current.clone(),
                        to: next.clone(),
                    });
                    if next != current {
                        previous = Some(std::mem::replace(&mut current, next));
                    }
                }
                Transition::Terminated => {
                    info!(agent = %current, "Handoff table terminated the run");
                    return Ok((current, state));
                }
            }
        }
    }

    /// Single agent turn loop. Completes when the oracle replies without
    /// requesting any operation.
    async fn run_agent(&self, agent: &SwarmAgent, state: &mut RunState) -> Result<AgentRun> {
        let start = Instant::now();
        let max_turns = self.config.pipeline.max_turns_per_agent;
        let max_total = self.config.pipeline.max_total_turns;
        let tools = agent.tool_definitions();
        let mut operations = Vec::new();

        for turn in 0..max_turns {
            if self.cancel.is_cancelled() {
                return Err(FgError::Cancelled);
            }
            if state.total_turns >= max_total {
                return Err(FgError::RunTurnBudgetExceeded(max_total));
            }
            state.total_turns += 1;

            debug!(agent = %agent.name(), turn, context_version = state.ctx.version(), "Starting agent turn");

            let mut request = Vec::with_capacity(state.messages.len() + 1);
            request.push(ChatMessage::system(agent.build_system_prompt(&state.ctx)));
            request.extend(state.messages.iter().cloned());

            let reply = self.call_oracle(request, &tools, state).await?;

            let mut content = Vec::new();
            if !reply.text.is_empty() {
                content.push(ContentBlock::Text {
                    text: reply.text.clone(),
                });
            }
            for tc in &reply.calls {
                content.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    // Unparseable arguments are kept verbatim for the replayed history.
                    input: serde_json::from_str(&tc.input_json)
                        .unwrap_or_else(|_| serde_json::Value::String(tc.input_json.clone())),
                });
            }
            state.messages.push(
                ChatMessage {
                    role: Role::Assistant,
                    content,
                    sender: None,
                    timestamp: Some(chrono::Utc::now()),
                }
                .from_agent(agent.name()),
            );

            if reply.calls.is_empty() {
                if reply.stop_reason == Some(StopReason::MaxTokens) {
                    warn!(agent = %agent.name(), "LLM hit max tokens");
                }
                info!(agent = %agent.name(), turns = turn + 1, "Agent finished its work");
                return Ok(AgentRun {
                    agent: agent.name().to_string(),
                    turns: turn + 1,
                    operations,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }

            let mut result_blocks = Vec::with_capacity(reply.calls.len());
            for tc in &reply.calls {
                self.event_bus.publish(SwarmEvent::OperationStart {
                    agent: agent.name().to_string(),
                    op: tc.name.clone(),
                });

                let (status, is_error) = match self.dispatch(agent, tc, &mut state.ctx).await {
                    Ok(result) => {
                        operations.push(tc.name.clone());
                        if let Some(path) = result.written {
                            state.written_files.push(path);
                        }
                        (result.status, false)
                    }
                    Err(e) if !e.is_fatal() => {
                        warn!(agent = %agent.name(), op = %tc.name, error = %e, "Operation rejected");
                        (e.to_string(), true)
                    }
                    Err(e) => {
                        error!(agent = %agent.name(), op = %tc.name, error = %e, "Operation failed");
                        self.event_bus.publish(SwarmEvent::OperationEnd {
                            agent: agent.name().to_string(),
                            op: tc.name.clone(),
                            status: e.to_string(),
                            is_error: true,
                        });
                        return Err(e);
                    }
                };

                self.event_bus.publish(SwarmEvent::OperationEnd {
                    agent: agent.name().to_string(),
                    op: tc.name.clone(),
                    status: status.clone(),
                    is_error,
                });
                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: tc.id.clone(),
                    content: status,
                    is_error,
                });
            }

            state.messages.push(ChatMessage {
                role: Role::User,
                content: result_blocks,
                sender: None,
                timestamp: Some(chrono::Utc::now()),
            });
        }

        Err(FgError::MaxTurnsExceeded {
            agent: agent.name().to_string(),
            max_turns,
        })
    }

    /// Stream one oracle response to completion, bounded by the per-call
    /// timeout and the cancellation token.
    async fn call_oracle(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
        state: &mut RunState,
    ) -> Result<OracleReply> {
        let secs = self.config.pipeline.oracle_timeout_secs;

        let call = async {
            let mut stream = self
                .llm
                .chat_stream(&self.config.model, messages, tools)
                .await?;
            let mut reply = OracleReply::default();
            let mut pending: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();

            while let Some(delta) = stream.next().await {
                match delta? {
                    StreamDelta::TextDelta(text) => {
                        self.event_bus.publish(SwarmEvent::TextDelta(text.clone()));
                        reply.text.push_str(&text);
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        let tc = pending.entry(index).or_default();
                        tc.id = id;
                        tc.name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        if let Some(tc) = pending.get_mut(&index) {
                            tc.input_json.push_str(&delta);
                        }
                    }
                    StreamDelta::Stop(reason) => reply.stop_reason = Some(reason),
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => {
                        state.input_tokens += input_tokens;
                        state.output_tokens += output_tokens;
                    }
                }
            }

            // Calls are ordered by stream index; unnamed slots are dropped.
            reply.calls = pending
                .into_iter()
                .filter(|(_, tc)| !tc.name.is_empty())
                .map(|(index, mut tc)| {
                    if tc.id.is_empty() {
                        tc.id = format!("call_{}", index);
                    }
                    tc
                })
                .collect();
            Ok::<_, FgError>(reply)
        };

        tokio::select! {
            result = tokio::time::timeout(Duration::from_secs(secs), call) => match result {
                Ok(reply) => reply,
                Err(_) => Err(FgError::Timeout { scope: "oracle call".into(), secs }),
            },
            _ = self.cancel.cancelled() => Err(FgError::Cancelled),
        }
    }

    /// Validate and apply one requested operation.
    async fn dispatch(
        &self,
        agent: &SwarmAgent,
        tc: &ToolCallAccumulator,
        ctx: &mut SharedContext,
    ) -> Result<StageResult> {
        let op = StageOp::from_name(&tc.name)
            .ok_or_else(|| FgError::UnknownOperation(tc.name.clone()))?;
        if !agent.permits(op) {
            return Err(FgError::OperationNotPermitted {
                agent: agent.name().to_string(),
                op: tc.name.clone(),
            });
        }

        let input = if tc.input_json.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&tc.input_json).map_err(|e| FgError::InvalidArguments {
                op: tc.name.clone(),
                message: e.to_string(),
            })?
        };

        debug!(agent = %agent.name(), op = %op, "Applying operation");
        StageCall::parse(op, input)?.apply(ctx, &self.io).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{HandoffRule, HandoffTarget};
    use fgswarm_test_utils::{test_config, InputFixture, ScriptedLlm, ScriptedTurn};
    use fgswarm_core::config::ModelConfig;
    use futures::future::BoxFuture;
    use futures::stream::BoxStream;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Oracle that replays raw delta sequences, one per call.
    struct RawLlm {
        replies: Mutex<VecDeque<Vec<StreamDelta>>>,
    }

    impl RawLlm {
        fn new(replies: Vec<Vec<StreamDelta>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl LlmClient for RawLlm {
        fn chat_stream(
            &self,
            _config: &ModelConfig,
            _messages: Vec<ChatMessage>,
            _tools: &[ToolDefinition],
        ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
            let reply = self.replies.lock().unwrap().pop_front();
            Box::pin(async move {
                let deltas = reply.ok_or_else(|| FgError::LlmRequest("raw oracle exhausted".into()))?;
                Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok)))
                    as BoxStream<'_, Result<StreamDelta>>)
            })
        }
    }

    fn end_turn(text: &str) -> Vec<StreamDelta> {
        vec![
            StreamDelta::TextDelta(text.to_string()),
            StreamDelta::Stop(StopReason::EndTurn),
        ]
    }

    fn raw_swarm(llm: RawLlm, fixture: &InputFixture) -> Swarm {
        Swarm::new(
            test_config(fixture),
            Arc::new(llm),
            two_agents(),
            HandoffTable::chain(&["first"]),
            Arc::new(EventBus::default()),
        )
        .unwrap()
    }

    fn two_agents() -> Vec<SwarmAgent> {
        vec![
            SwarmAgent::new("first", "Record a draft.").with_ops([StageOp::RecordAnalysisDraft]),
            SwarmAgent::new("second", "Read the draft.").with_ops([StageOp::GetAnalysisDraft]),
        ]
    }

    fn swarm_with(llm: Arc<ScriptedLlm>, fixture: &InputFixture, handoffs: HandoffTable) -> Swarm {
        Swarm::new(
            test_config(fixture),
            llm,
            two_agents(),
            handoffs,
            Arc::new(EventBus::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_duplicate_agents() {
        let fixture = InputFixture::empty();
        let agents = vec![SwarmAgent::new("a", ""), SwarmAgent::new("a", "")];
        let result = Swarm::new(
            test_config(&fixture),
            Arc::new(ScriptedLlm::new(vec![])),
            agents,
            HandoffTable::new(),
            Arc::new(EventBus::default()),
        );
        assert!(matches!(result, Err(FgError::Config(_))));
    }

    #[tokio::test]
    async fn test_two_agent_chain_shares_history() {
        let fixture = InputFixture::empty();
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedTurn::call("record_analysis_draft", json!({ "transcript_analysis_draft": "D" })),
            ScriptedTurn::text("Draft recorded."),
            ScriptedTurn::call("get_analysis_draft", json!({})),
            ScriptedTurn::text("Looks good."),
        ]));
        let swarm = swarm_with(llm.clone(), &fixture, HandoffTable::chain(&["first", "second"]));

        let outcome = swarm.run("first", SharedContext::new(), "start").await.unwrap();

        assert_eq!(outcome.route(), vec!["first", "second"]);
        assert_eq!(outcome.last_agent, "second");
        assert_eq!(outcome.context.get("analysis_draft"), "D");
        assert_eq!(outcome.total_turns, 4);
        assert_eq!(outcome.input_tokens, 40);
        assert_eq!(outcome.agent_runs[0].operations, vec!["record_analysis_draft"]);

        let requests = llm.requests();
        assert_eq!(requests[0].tool_names, vec!["record_analysis_draft"]);
        assert_eq!(requests[2].tool_names, vec!["get_analysis_draft"]);
        // start + assistant/results + assistant, prefixed by the system prompt.
        assert_eq!(requests[2].message_count, 5);
        assert!(requests[2].system_prompt.contains("- analysis_draft: populated (1 chars)"));

        let draft_result = outcome.messages.iter().flat_map(|m| m.tool_results()).last();
        assert_eq!(draft_result, Some(("call_1", "D")));
        assert!(outcome.written_files.is_empty());
    }

    #[tokio::test]
    async fn test_sparse_call_indices_dispatch_only_started_calls() {
        let fixture = InputFixture::empty();
        let llm = RawLlm::new(vec![
            vec![
                // Input for a slot that never started is ignored.
                StreamDelta::ToolInputDelta {
                    index: 0,
                    delta: "{}".into(),
                },
                StreamDelta::ToolUseStart {
                    index: 2,
                    id: String::new(),
                    name: "record_analysis_draft".into(),
                },
                StreamDelta::ToolInputDelta {
                    index: 2,
                    delta: r#"{"transcript_analysis_draft":"sparse"}"#.into(),
                },
                StreamDelta::Stop(StopReason::ToolUse),
            ],
            end_turn("Done."),
        ]);
        let swarm = raw_swarm(llm, &fixture);

        let outcome = swarm.run("first", SharedContext::new(), "start").await.unwrap();

        assert_eq!(outcome.context.get("analysis_draft"), "sparse");
        let uses: Vec<_> = outcome.messages.iter().flat_map(|m| m.tool_uses()).collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].0, "call_2");
        assert_eq!(uses[0].1, "record_analysis_draft");
        let results: Vec<_> = outcome.messages.iter().flat_map(|m| m.tool_results()).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "call_2");
    }

    #[tokio::test]
    async fn test_unparseable_arguments_kept_verbatim_in_history() {
        let fixture = InputFixture::empty();
        let llm = RawLlm::new(vec![
            vec![
                StreamDelta::ToolUseStart {
                    index: 0,
                    id: "raw_0".into(),
                    name: "record_analysis_draft".into(),
                },
                StreamDelta::ToolInputDelta {
                    index: 0,
                    delta: r#"{"transcript_analysis_draft": "trunc"#.into(),
                },
                StreamDelta::Stop(StopReason::ToolUse),
            ],
            end_turn("Gave up."),
        ]);
        let swarm = raw_swarm(llm, &fixture);

        let outcome = swarm.run("first", SharedContext::new(), "start").await.unwrap();

        let uses: Vec<_> = outcome.messages.iter().flat_map(|m| m.tool_uses()).collect();
        assert_eq!(
            uses[0].2,
            &serde_json::Value::String(r#"{"transcript_analysis_draft": "trunc"#.to_string())
        );
        let results: Vec<_> = outcome.messages.iter().flat_map(|m| m.tool_results()).collect();
        assert!(results[0].1.contains("record_analysis_draft"));
        assert_eq!(outcome.context, SharedContext::new());
    }

    #[tokio::test]
    async fn test_unknown_operation_is_reported_to_oracle() {
        let fixture = InputFixture::empty();
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedTurn::call("drop_tables", json!({})),
            ScriptedTurn::text("Sorry."),
        ]));
        let mut table = HandoffTable::new();
        table.register("first", vec![HandoffRule::after_work(HandoffTarget::Terminate)]);
        let swarm = swarm_with(llm, &fixture, table);

        let outcome = swarm.run("first", SharedContext::new(), "start").await.unwrap();
        let results: Vec<_> = outcome.messages.iter().flat_map(|m| m.tool_results()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.contains("Operation not found: drop_tables"));
        assert_eq!(outcome.context, SharedContext::new());
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_recoverable() {
        let fixture = InputFixture::empty();
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedTurn::call("record_analysis_draft", json!({ "draft": "wrong key" })),
            ScriptedTurn::call("record_analysis_draft", json!({ "transcript_analysis_draft": "ok" })),
            ScriptedTurn::text("Done."),
        ]));
        let swarm = swarm_with(llm, &fixture, HandoffTable::chain(&["first"]));

        let outcome = swarm.run("first", SharedContext::new(), "start").await.unwrap();
        assert_eq!(outcome.context.get("analysis_draft"), "ok");
        assert_eq!(outcome.agent_runs[0].turns, 3);
    }

    #[tokio::test]
    async fn test_total_turn_budget() {
        let fixture = InputFixture::empty();
        let mut config = test_config(&fixture);
        config.pipeline.max_total_turns = 3;
        let mut table = HandoffTable::new();
        table.register("first", vec![HandoffRule::after_work(HandoffTarget::Stay)]);

        let swarm = Swarm::new(
            config,
            Arc::new(ScriptedLlm::repeating(ScriptedTurn::text("done"))),
            two_agents(),
            table,
            Arc::new(EventBus::default()),
        )
        .unwrap();

        let err = swarm.run("first", SharedContext::new(), "start").await.unwrap_err();
        assert!(matches!(err, FgError::RunTurnBudgetExceeded(3)));
    }

    #[tokio::test]
    async fn test_unknown_initial_agent() {
        let fixture = InputFixture::empty();
        let swarm = swarm_with(Arc::new(ScriptedLlm::new(vec![])), &fixture, HandoffTable::new());
        let err = swarm.run("nobody", SharedContext::new(), "start").await.unwrap_err();
        assert!(matches!(err, FgError::UnknownAgent(ref n) if n == "nobody"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fixture = InputFixture::empty();
        let swarm = swarm_with(
            Arc::new(ScriptedLlm::repeating(ScriptedTurn::text("done"))),
            &fixture,
            HandoffTable::chain(&["first", "second"]),
        );
        swarm.cancel_token().cancel();
        let err = swarm.run("first", SharedContext::new(), "start").await.unwrap_err();
        assert!(matches!(err, FgError::Cancelled));
    }

    #[tokio::test]
    async fn test_oracle_failure_aborts_and_publishes_error() {
        let fixture = InputFixture::empty();
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let swarm = Swarm::new(
            test_config(&fixture),
            Arc::new(ScriptedLlm::new(vec![ScriptedTurn::Fail("HTTP 500: boom".into())])),
            two_agents(),
            HandoffTable::chain(&["first", "second"]),
            bus.clone(),
        )
        .unwrap();

        let err = swarm.run("first", SharedContext::new(), "start").await.unwrap_err();
        assert!(matches!(err, FgError::LlmRequest(_)));

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let SwarmEvent::RunError { error, .. } = event {
                assert!(error.contains("boom"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
