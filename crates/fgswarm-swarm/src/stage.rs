//! Stage operations: the closed set of capabilities an agent can be granted.
//!
//! The oracle names an operation and supplies JSON arguments; [`StageCall::parse`]
//! turns that into a typed call and [`StageCall::apply`] runs it against the
//! shared context.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use fgswarm_core::config::PathsConfig;
use fgswarm_core::error::{FgError, Result};
use fgswarm_core::types::ToolDefinition;

use crate::context::{ContextField, SharedContext};

pub const TRANSCRIPTS_FILE: &str = "transcripts.md";
pub const OBJECTIVES_FILE: &str = "objectives.md";

/// Operation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOp {
    ReadData,
    RecordAnalysisDraft,
    RecordAnalysisFinal,
    RecordReport,
    GetTranscripts,
    GetObjectives,
    GetAnalysisDraft,
    GetAnalysisFinal,
    WriteReportToFile,
}

impl StageOp {
    pub const ALL: [StageOp; 9] = [
        StageOp::ReadData,
        StageOp::RecordAnalysisDraft,
        StageOp::RecordAnalysisFinal,
        StageOp::RecordReport,
        StageOp::GetTranscripts,
        StageOp::GetObjectives,
        StageOp::GetAnalysisDraft,
        StageOp::GetAnalysisFinal,
        StageOp::WriteReportToFile,
    ];

    /// Name used in oracle function calls.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadData => "read_data",
            Self::RecordAnalysisDraft => "record_analysis_draft",
            Self::RecordAnalysisFinal => "record_analysis_final",
            Self::RecordReport => "record_report",
            Self::GetTranscripts => "get_transcripts",
            Self::GetObjectives => "get_objectives",
            Self::GetAnalysisDraft => "get_analysis_draft",
            Self::GetAnalysisFinal => "get_analysis_final",
            Self::WriteReportToFile => "write_report_to_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ReadData => "Read the transcripts and objectives files.",
            Self::RecordAnalysisDraft => "Record the transcript analysis draft.",
            Self::RecordAnalysisFinal => "Record the final, revised transcript analysis.",
            Self::RecordReport => "Record the report.",
            Self::GetTranscripts => "Return the focus group transcripts.",
            Self::GetObjectives => "Return the research objectives.",
            Self::GetAnalysisDraft => "Return the recorded analysis draft.",
            Self::GetAnalysisFinal => "Return the recorded final analysis.",
            Self::WriteReportToFile => {
                "Write the final report to a markdown file in the reports directory."
            }
        }
    }

    /// JSON Schema for the operation's arguments.
    pub fn input_schema(&self) -> serde_json::Value {
        let text_arg = |name: &str, description: &str| {
            let mut properties = serde_json::Map::new();
            properties.insert(
                name.to_string(),
                serde_json::json!({ "type": "string", "description": description }),
            );
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": [name]
            })
        };

        match self {
            Self::RecordAnalysisDraft => {
                text_arg("transcript_analysis_draft", "The complete analysis draft")
            }
            Self::RecordAnalysisFinal => {
                text_arg("transcript_analysis_final", "The complete revised analysis")
            }
            Self::RecordReport => text_arg("report", "The complete markdown report"),
            Self::WriteReportToFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "report": { "type": "string", "description": "The markdown report content" },
                    "filename": {
                        "type": "string",
                        "description": "File name inside the reports directory, e.g. 'focus_group_report.md'"
                    }
                },
                "required": ["report", "filename"]
            }),
            Self::ReadData
            | Self::GetTranscripts
            | Self::GetObjectives
            | Self::GetAnalysisDraft
            | Self::GetAnalysisFinal => serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

impl std::fmt::Display for StageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed invocation with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    ReadData,
    RecordAnalysisDraft { text: String },
    RecordAnalysisFinal { text: String },
    RecordReport { text: String },
    Get(ContextField),
    WriteReportToFile { report: String, filename: String },
}

#[derive(Deserialize)]
struct DraftInput {
    transcript_analysis_draft: String,
}

#[derive(Deserialize)]
struct FinalInput {
    transcript_analysis_final: String,
}

#[derive(Deserialize)]
struct ReportInput {
    report: String,
}

#[derive(Deserialize)]
struct WriteInput {
    report: String,
    filename: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(op: StageOp, input: serde_json::Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| FgError::InvalidArguments {
        op: op.name().to_string(),
        message: e.to_string(),
    })
}

/// File locations used by the I/O-bearing operations.
#[derive(Debug, Clone)]
pub struct StageIo {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&PathsConfig> for StageIo {
    fn from(paths: &PathsConfig) -> Self {
        Self {
            data_dir: paths.data_dir.clone(),
            output_dir: paths.output_dir.clone(),
        }
    }
}

/// Status message for the oracle's conversation trace.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub status: String,
    /// File written by the operation, if any.
    pub written: Option<PathBuf>,
}

impl StageResult {
    fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            written: None,
        }
    }
}

impl StageCall {
    /// Build a typed call from the oracle's raw arguments.
    pub fn parse(op: StageOp, input: serde_json::Value) -> Result<Self> {
        Ok(match op {
            StageOp::ReadData => Self::ReadData,
            StageOp::RecordAnalysisDraft => Self::RecordAnalysisDraft {
                text: parse_args::<DraftInput>(op, input)?.transcript_analysis_draft,
            },
            StageOp::RecordAnalysisFinal => Self::RecordAnalysisFinal {
                text: parse_args::<FinalInput>(op, input)?.transcript_analysis_final,
            },
            StageOp::RecordReport => Self::RecordReport {
                text: parse_args::<ReportInput>(op, input)?.report,
            },
            StageOp::GetTranscripts => Self::Get(ContextField::Transcripts),
            StageOp::GetObjectives => Self::Get(ContextField::Objectives),
            StageOp::GetAnalysisDraft => Self::Get(ContextField::AnalysisDraft),
            StageOp::GetAnalysisFinal => Self::Get(ContextField::AnalysisFinal),
            StageOp::WriteReportToFile => {
                let args: WriteInput = parse_args(op, input)?;
                validate_filename(&args.filename)?;
                Self::WriteReportToFile {
                    report: args.report,
                    filename: args.filename,
                }
            }
        })
    }

    /// Run the call. Only the field(s) owned by the operation are written.
    pub async fn apply(self, ctx: &mut SharedContext, io: &StageIo) -> Result<StageResult> {
        match self {
            Self::ReadData => read_data(ctx, io).await,
            Self::RecordAnalysisDraft { text } => {
                ctx.set_field(ContextField::AnalysisDraft, text);
                Ok(StageResult::new("Transcript stored in analysis_draft."))
            }
            Self::RecordAnalysisFinal { text } => {
                ctx.set_field(ContextField::AnalysisFinal, text);
                Ok(StageResult::new("Transcript stored in analysis_final."))
            }
            Self::RecordReport { text } => {
                ctx.set_field(ContextField::Report, text);
                Ok(StageResult::new("Report stored in report."))
            }
            Self::Get(field) => Ok(StageResult::new(ctx.field(field))),
            Self::WriteReportToFile { report, filename } => {
                write_report_to_file(&report, &filename, &io.output_dir).await
            }
        }
    }
}

/// Read both input documents, then store them. Either both fields are
/// written or neither is.
async fn read_data(ctx: &mut SharedContext, io: &StageIo) -> Result<StageResult> {
    let transcripts_path = io.data_dir.join(TRANSCRIPTS_FILE);
    let objectives_path = io.data_dir.join(OBJECTIVES_FILE);

    let (transcripts, objectives) = tokio::join!(
        read_input(&transcripts_path),
        read_input(&objectives_path)
    );
    let transcripts = transcripts?;
    let objectives = objectives?;

    ctx.set_field(ContextField::Transcripts, transcripts);
    ctx.set_field(ContextField::Objectives, objectives);

    Ok(StageResult::new("Read transcripts and objectives."))
}

async fn read_input(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Reading input document");
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FgError::InputRead {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_report_to_file(report: &str, filename: &str, output_dir: &Path) -> Result<StageResult> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| FgError::Filesystem {
            path: output_dir.to_path_buf(),
            message: format!("Failed to create output directory: {}", e),
        })?;

    let path = output_dir.join(filename);
    debug!(path = %path.display(), bytes = report.len(), "Writing report");

    tokio::fs::write(&path, report)
        .await
        .map_err(|e| FgError::Filesystem {
            path: path.clone(),
            message: e.to_string(),
        })?;

    Ok(StageResult {
        status: format!("Report written to {}", path.display()),
        written: Some(path),
    })
}

/// The filename must be one plain path component inside the output directory.
fn validate_filename(filename: &str) -> Result<()> {
    let mut components = Path::new(filename).components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !filename.contains(['/', '\\']);

    if valid {
        Ok(())
    } else {
        Err(FgError::InvalidArguments {
            op: StageOp::WriteReportToFile.name().to_string(),
            message: format!("filename must be a plain file name, got {:?}", filename),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn io_for(dir: &Path) -> StageIo {
        StageIo {
            data_dir: dir.join("data"),
            output_dir: dir.join("reports"),
        }
    }

    fn write_inputs(dir: &Path, transcripts: Option<&str>, objectives: Option<&str>) {
        std::fs::create_dir_all(dir.join("data")).unwrap();
        if let Some(t) = transcripts {
            std::fs::write(dir.join("data").join(TRANSCRIPTS_FILE), t).unwrap();
        }
        if let Some(o) = objectives {
            std::fs::write(dir.join("data").join(OBJECTIVES_FILE), o).unwrap();
        }
    }

    #[test]
    fn test_op_names_roundtrip() {
        for op in StageOp::ALL {
            assert_eq!(StageOp::from_name(op.name()), Some(op));
            assert_eq!(op.definition().name, op.name());
        }
        assert_eq!(StageOp::from_name("delete_everything"), None);
    }

    #[test]
    fn test_parse_typed_arguments() {
        let call = StageCall::parse(
            StageOp::RecordAnalysisDraft,
            json!({ "transcript_analysis_draft": "themes" }),
        )
        .unwrap();
        assert_eq!(call, StageCall::RecordAnalysisDraft { text: "themes".into() });

        let call = StageCall::parse(StageOp::GetObjectives, serde_json::Value::Null).unwrap();
        assert_eq!(call, StageCall::Get(ContextField::Objectives));
    }

    #[test]
    fn test_parse_missing_argument() {
        let err = StageCall::parse(StageOp::RecordReport, json!({ "text": "wrong key" })).unwrap_err();
        assert!(matches!(err, FgError::InvalidArguments { ref op, .. } if op == "record_report"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_parse_rejects_path_filenames() {
        for bad in ["../escape.md", "nested/report.md", "", "..", "/abs.md"] {
            let result = StageCall::parse(
                StageOp::WriteReportToFile,
                json!({ "report": "r", "filename": bad }),
            );
            assert!(result.is_err(), "accepted {:?}", bad);
        }
        assert!(StageCall::parse(
            StageOp::WriteReportToFile,
            json!({ "report": "r", "filename": "focus_group_report.md" }),
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_read_data_populates_only_inputs() {
        let dir = tempfile::tempdir().unwrap();
        write_inputs(dir.path(), Some("T"), Some("O"));
        let mut ctx = SharedContext::new();
        ctx.set_field(ContextField::AnalysisDraft, "keep me");

        let result = StageCall::ReadData.apply(&mut ctx, &io_for(dir.path())).await.unwrap();

        assert_eq!(result.status, "Read transcripts and objectives.");
        assert_eq!(ctx.field(ContextField::Transcripts), "T");
        assert_eq!(ctx.field(ContextField::Objectives), "O");
        assert_eq!(ctx.field(ContextField::AnalysisDraft), "keep me");
        assert_eq!(ctx.data().len(), 3);
    }

    #[tokio::test]
    async fn test_read_data_missing_transcripts_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_inputs(dir.path(), None, Some("Evaluate packaging reception."));
        let mut ctx = SharedContext::new();

        let err = StageCall::ReadData.apply(&mut ctx, &io_for(dir.path())).await.unwrap_err();

        match err {
            FgError::InputRead { path, .. } => assert!(path.ends_with(TRANSCRIPTS_FILE)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ctx, SharedContext::new());
    }

    #[tokio::test]
    async fn test_read_data_missing_objectives() {
        let dir = tempfile::tempdir().unwrap();
        write_inputs(dir.path(), Some("T"), None);
        let mut ctx = SharedContext::new();

        let err = StageCall::ReadData.apply(&mut ctx, &io_for(dir.path())).await.unwrap_err();
        assert!(matches!(err, FgError::InputRead { ref path, .. } if path.ends_with(OBJECTIVES_FILE)));
        assert!(!ctx.is_set("transcripts"));
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let io = io_for(dir.path());
        let mut once = SharedContext::new();
        StageCall::RecordReport { text: "x".into() }.apply(&mut once, &io).await.unwrap();

        let mut twice = SharedContext::new();
        for _ in 0..2 {
            StageCall::RecordReport { text: "x".into() }.apply(&mut twice, &io).await.unwrap();
        }
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_accessors_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = SharedContext::new();
        let result = StageCall::Get(ContextField::AnalysisFinal)
            .apply(&mut ctx, &io_for(dir.path()))
            .await
            .unwrap();
        assert_eq!(result.status, "");
    }

    #[tokio::test]
    async fn test_write_report_creates_dir_and_preserves_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let io = io_for(dir.path());
        let mut ctx = SharedContext::new();

        let written = StageCall::WriteReportToFile {
            report: "A".into(),
            filename: "foo.md".into(),
        }
        .apply(&mut ctx, &io)
        .await
        .unwrap();
        assert!(written.status.starts_with("Report written to"));
        assert_eq!(written.written, Some(io.output_dir.join("foo.md")));

        StageCall::WriteReportToFile {
            report: "B".into(),
            filename: "bar.md".into(),
        }
        .apply(&mut ctx, &io)
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(io.output_dir.join("foo.md")).unwrap(), "A");
        assert_eq!(std::fs::read_to_string(io.output_dir.join("bar.md")).unwrap(), "B");
        assert_eq!(ctx, SharedContext::new());
    }

    #[tokio::test]
    async fn test_write_report_overwrites_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let io = io_for(dir.path());
        let mut ctx = SharedContext::new();
        for body in ["old", "new"] {
            StageCall::WriteReportToFile {
                report: body.into(),
                filename: "r.md".into(),
            }
            .apply(&mut ctx, &io)
            .await
            .unwrap();
        }
        assert_eq!(std::fs::read_to_string(io.output_dir.join("r.md")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_report_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be.
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "not a directory").unwrap();
        let io = io_for(dir.path());

        let err = StageCall::WriteReportToFile {
            report: "A".into(),
            filename: "foo.md".into(),
        }
        .apply(&mut SharedContext::new(), &io)
        .await
        .unwrap_err();
        assert!(matches!(err, FgError::Filesystem { .. }));
        assert!(err.is_fatal());
    }
}
