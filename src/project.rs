use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{CompiledBookSelection, ContentStore, timestamp};
use crate::outline::BookOutline;

pub const PROJECT_VERSION: &str = "1.0";

/// On-disk snapshot of a book in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub book_structure: BookOutline,
    #[serde(default)]
    pub generated_chapters: ContentStore,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "CompiledBookSelection::is_empty")]
    pub book_content: CompiledBookSelection,
}

fn default_version() -> String {
    PROJECT_VERSION.to_owned()
}

impl ProjectFile {
    pub fn new(
        outline: BookOutline,
        contents: ContentStore,
        selection: CompiledBookSelection,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            book_structure: outline,
            generated_chapters: contents,
            timestamp,
            version: PROJECT_VERSION.to_owned(),
            book_content: selection,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read project: {}", path.display()))?;
        let project: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse project: {}", path.display()))?;
        if project.version != PROJECT_VERSION {
            tracing::warn!(version = %project.version, "unexpected project file version");
        }
        tracing::info!(
            path = %path.display(),
            chapters = project.book_structure.chapters.len(),
            generated = project.generated_chapters.len(),
            "load project"
        );
        Ok(project)
    }

    /// Writes pretty JSON through a temp file in the same directory so readers never
    /// see a partial file. Without `force` an existing file is left untouched.
    pub fn save(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
        if !force && path.exists() {
            anyhow::bail!(
                "project file already exists (use --force to overwrite): {}",
                path.display()
            );
        }

        let data = serde_json::to_vec_pretty(self).context("serialize project")?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create tmp in: {}", parent.display()))?;
        tmp.write_all(&data).context("write tmp project")?;
        tmp.flush().context("flush tmp project")?;

        if force {
            tmp.persist(path)
                .map_err(|err| err.error)
                .with_context(|| format!("rename tmp to final: {}", path.display()))?;
        } else {
            tmp.persist_noclobber(path)
                .map_err(|err| err.error)
                .with_context(|| format!("rename tmp to final: {}", path.display()))?;
        }

        tracing::info!(path = %path.display(), bytes = data.len(), "save project");
        Ok(())
    }
}

/// `BookCreator_<Title_With_Underscores>.json`
pub fn default_file_name(title: &str) -> String {
    format!("BookCreator_{}.json", title.replace(' ', "_"))
}
