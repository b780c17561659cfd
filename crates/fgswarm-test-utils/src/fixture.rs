use std::path::PathBuf;

use tempfile::TempDir;

/// A temporary working directory with `data/` inputs and a `reports/` target.
///
/// The directory is removed when the fixture is dropped.
pub struct InputFixture {
    root: TempDir,
}

impl InputFixture {
    /// Write both input documents.
    pub fn new(transcripts: &str, objectives: &str) -> Self {
        let fixture = Self::empty();
        fixture.write_input("transcripts.md", transcripts);
        fixture.write_input("objectives.md", objectives);
        fixture
    }

    /// Only `objectives.md` exists.
    pub fn missing_transcripts(objectives: &str) -> Self {
        let fixture = Self::empty();
        fixture.write_input("objectives.md", objectives);
        fixture
    }

    /// Only `transcripts.md` exists.
    pub fn missing_objectives(transcripts: &str) -> Self {
        let fixture = Self::empty();
        fixture.write_input("transcripts.md", transcripts);
        fixture
    }

    /// `data/` exists but is empty.
    pub fn empty() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("data")).expect("create data dir");
        Self { root }
    }

    pub fn write_input(&self, name: &str, content: &str) {
        std::fs::write(self.data_dir().join(name), content).expect("write input document");
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    /// Not created up front; `write_report_to_file` is expected to create it.
    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("reports")
    }

    /// Read a file from the output directory, `None` if it does not exist.
    pub fn read_output(&self, filename: &str) -> Option<String> {
        std::fs::read_to_string(self.output_dir().join(filename)).ok()
    }
}
