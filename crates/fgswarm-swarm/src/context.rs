use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The named fields the focus-group stages read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    Transcripts,
    Objectives,
    AnalysisDraft,
    AnalysisFinal,
    Report,
}

impl ContextField {
    pub const ALL: [ContextField; 5] = [
        ContextField::Transcripts,
        ContextField::Objectives,
        ContextField::AnalysisDraft,
        ContextField::AnalysisFinal,
        ContextField::Report,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Transcripts => "transcripts",
            Self::Objectives => "objectives",
            Self::AnalysisDraft => "analysis_draft",
            Self::AnalysisFinal => "analysis_final",
            Self::Report => "report",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl std::fmt::Display for ContextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Shared state threaded through every stage of a run.
///
/// Unset fields read as the empty string. `version` counts writes that
/// actually changed a value, so re-recording identical text leaves the
/// context equal to what it was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedContext {
    data: BTreeMap<String, String>,
    version: u64,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key, `""` if unset.
    pub fn get(&self, key: &str) -> &str {
        self.data.get(key).map(String::as_str).unwrap_or("")
    }

    /// Overwrite a value unconditionally.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if self.data.get(&key) != Some(&value) {
            self.data.insert(key, value);
            self.version += 1;
        }
    }

    pub fn field(&self, field: ContextField) -> &str {
        self.get(field.key())
    }

    pub fn set_field(&mut self, field: ContextField, value: impl Into<String>) {
        self.set(field.key(), value);
    }

    /// Whether a key holds a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get the underlying data map.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Render a short, content-free summary of every known field.
    pub fn snapshot(&self) -> String {
        let mut keys: Vec<&str> = ContextField::ALL.iter().map(|f| f.key()).collect();
        for key in self.data.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }

        keys.into_iter()
            .map(|key| {
                let len = self.get(key).chars().count();
                if len == 0 {
                    format!("- {}: (empty)", key)
                } else {
                    format!("- {}: populated ({} chars)", key, len)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
