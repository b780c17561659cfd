use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fgswarm_core::config::AppConfig;
use fgswarm_core::error::Result;
use fgswarm_core::event::EventBus;
use fgswarm_core::traits::LlmClient;

use crate::agent::SwarmAgent;
use crate::context::SharedContext;
use crate::handoff::HandoffTable;
use crate::prompts;
use crate::stage::StageOp;
use crate::swarm::{Swarm, SwarmOutcome};

pub const INGESTION_AGENT: &str = "ingestion_agent";
pub const ANALYZER_AGENT: &str = "analyzer_agent";
pub const QUALITY_CONTROL_AGENT: &str = "quality_control_agent";
pub const REPORT_WRITER_AGENT: &str = "report_writer_agent";

pub const DEFAULT_REPORT_FILENAME: &str = "focus_group_report.md";
pub const INITIAL_MESSAGE: &str = "start";

/// States of the focus-group state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Ingestion,
    Analysis,
    QualityControl,
    ReportWriting,
    Terminated,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Ingestion,
        PipelineStage::Analysis,
        PipelineStage::QualityControl,
        PipelineStage::ReportWriting,
        PipelineStage::Terminated,
    ];

    /// The agent active in this stage, `None` once terminated.
    pub fn agent_name(&self) -> Option<&'static str> {
        match self {
            Self::Ingestion => Some(INGESTION_AGENT),
            Self::Analysis => Some(ANALYZER_AGENT),
            Self::QualityControl => Some(QUALITY_CONTROL_AGENT),
            Self::ReportWriting => Some(REPORT_WRITER_AGENT),
            Self::Terminated => None,
        }
    }

    pub fn successor(&self) -> Option<PipelineStage> {
        match self {
            Self::Ingestion => Some(Self::Analysis),
            Self::Analysis => Some(Self::QualityControl),
            Self::QualityControl => Some(Self::ReportWriting),
            Self::ReportWriting => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    pub fn from_agent(name: &str) -> Option<PipelineStage> {
        Self::ALL.into_iter().find(|s| s.agent_name() == Some(name))
    }
}

/// The four focus-group agents with their capability sets.
pub fn focus_group_agents() -> Vec<SwarmAgent> {
    vec![
        SwarmAgent::new(INGESTION_AGENT, prompts::INGESTION_PROMPT).with_ops([StageOp::ReadData]),
        SwarmAgent::new(ANALYZER_AGENT, prompts::ANALYZER_PROMPT).with_ops([
            StageOp::RecordAnalysisDraft,
            StageOp::GetTranscripts,
            StageOp::GetObjectives,
        ]),
        SwarmAgent::new(QUALITY_CONTROL_AGENT, prompts::QUALITY_CONTROL_PROMPT).with_ops([
            StageOp::RecordAnalysisFinal,
            StageOp::GetTranscripts,
            StageOp::GetObjectives,
            StageOp::GetAnalysisDraft,
        ]),
        SwarmAgent::new(REPORT_WRITER_AGENT, prompts::REPORT_WRITER_PROMPT).with_ops([
            StageOp::RecordReport,
            StageOp::GetAnalysisFinal,
            StageOp::GetObjectives,
            StageOp::WriteReportToFile,
        ]),
    ]
}

/// The linear after-work chain: ingestion, analysis, quality control, report writing.
pub fn focus_group_handoffs() -> HandoffTable {
    let names: Vec<&str> = PipelineStage::ALL
        .iter()
        .filter_map(PipelineStage::agent_name)
        .collect();
    HandoffTable::chain(&names)
}

/// The focus-group transcript pipeline, ready to run.
pub struct FocusGroupPipeline {
    swarm: Swarm,
}

impl FocusGroupPipeline {
    pub fn new(config: AppConfig, llm: Arc<dyn LlmClient>, event_bus: Arc<EventBus>) -> Result<Self> {
        let swarm = Swarm::new(
            config,
            llm,
            focus_group_agents(),
            focus_group_handoffs(),
            event_bus,
        )?;
        Ok(Self { swarm })
    }

    /// Run from ingestion with a fresh context.
    pub async fn run(&self) -> Result<SwarmOutcome> {
        self.swarm
            .run(INGESTION_AGENT, SharedContext::new(), INITIAL_MESSAGE)
            .await
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.swarm.cancel_token()
    }
}
