use fgswarm_core::types::ToolDefinition;

use crate::context::SharedContext;
use crate::stage::StageOp;

/// A named participant in the swarm: an instruction text plus the closed set
/// of operations it may invoke.
#[derive(Debug, Clone)]
pub struct SwarmAgent {
    name: String,
    system_message: String,
    ops: Vec<StageOp>,
}

impl SwarmAgent {
    pub fn new(name: impl Into<String>, system_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            ops: Vec::new(),
        }
    }

    /// Grant a set of operations. Duplicates are ignored.
    pub fn with_ops(mut self, ops: impl IntoIterator<Item = StageOp>) -> Self {
        for op in ops {
            if !self.ops.contains(&op) {
                self.ops.push(op);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &[StageOp] {
        &self.ops
    }

    pub fn permits(&self, op: StageOp) -> bool {
        self.ops.contains(&op)
    }

    /// Definitions for the permitted operations only.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.ops.iter().map(StageOp::definition).collect()
    }

    /// Instruction text followed by the context snapshot.
    pub fn build_system_prompt(&self, ctx: &SharedContext) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.system_message);
        prompt.push_str("\n\n---\n\n## Context Data\n\n");
        prompt.push_str(&ctx.snapshot());
        prompt.push('\n');
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextField;

    #[test]
    fn test_agent_builder() {
        let agent = SwarmAgent::new("analyzer_agent", "Analyze.")
            .with_ops([StageOp::GetTranscripts, StageOp::RecordAnalysisDraft, StageOp::GetTranscripts]);

        assert_eq!(agent.name(), "analyzer_agent");
        assert_eq!(agent.ops().len(), 2);
        assert!(agent.permits(StageOp::RecordAnalysisDraft));
        assert!(!agent.permits(StageOp::WriteReportToFile));
    }

    #[test]
    fn test_tool_definitions_only_permitted() {
        let agent = SwarmAgent::new("ingestion_agent", "Read.").with_ops([StageOp::ReadData]);
        let names: Vec<String> = agent.tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["read_data"]);
    }

    #[test]
    fn test_build_prompt_with_context() {
        let agent = SwarmAgent::new("a", "Do the work.");
        let mut ctx = SharedContext::new();
        ctx.set_field(ContextField::Objectives, "Evaluate packaging reception.");

        let prompt = agent.build_system_prompt(&ctx);
        assert!(prompt.starts_with("Do the work."));
        assert!(prompt.contains("## Context Data"));
        assert!(prompt.contains("- objectives: populated"));
        assert!(prompt.contains("- analysis_draft: (empty)"));
        assert!(!prompt.contains("packaging"));
    }
}
