use std::fs::OpenOptions;
use std::io::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDate;
use pulldown_cmark::{Event, Parser, Tag};

use crate::content::{CompiledBookSelection, ContentStore};
use crate::outline::BookOutline;

/// Levels added to every heading found inside chapter content.
pub const HEADING_SHIFT: usize = 2;
pub const MISSING_CHAPTER_PLACEHOLDER: &str = "*Content not yet generated*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Text => "text/plain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportMode {
    /// Every outline chapter, with a placeholder for chapters without content.
    #[default]
    Full,
    /// Only chapters explicitly copied into the final book.
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub metadata: bool,
    pub table_of_contents: bool,
    pub introduction: bool,
    pub conclusion: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            metadata: true,
            table_of_contents: true,
            introduction: true,
            conclusion: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub contents: String,
}

impl ExportArtifact {
    /// The format only decides the declared type and extension; contents are identical.
    pub fn new(title: &str, format: ExportFormat, contents: String) -> Self {
        Self {
            file_name: export_file_name(title, format),
            mime_type: format.mime_type(),
            contents,
        }
    }
}

pub fn export_file_name(title: &str, format: ExportFormat) -> String {
    let stem = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>();
    format!("{stem}.{}", format.extension())
}

/// Title, introduction, the selected chapters in ascending order, conclusion.
pub fn compile_selection(outline: &BookOutline, selection: &CompiledBookSelection) -> String {
    let mut out = format!("# {}\n\n", outline.title);
    out.push_str(&format!("## Introduction\n{}\n\n", outline.introduction));

    for (number, chapter) in selection.iter() {
        out.push_str(&format!("## Chapter {number}: {}\n", chapter.title));
        out.push_str(&demote_headings(&chapter.content, HEADING_SHIFT));
        out.push_str("\n\n");
    }

    out.push_str(&format!("## Conclusion\n{}", outline.conclusion));
    out
}

/// The whole outline; chapters without generated content get a placeholder.
pub fn compile_outline(
    outline: &BookOutline,
    contents: &ContentStore,
    options: &ExportOptions,
    date: NaiveDate,
) -> String {
    let mut out = String::new();

    if options.metadata {
        out.push_str(&format!(
            "---\n\
title: \"{title}\"\n\
author: \"Generated with BookCreator\"\n\
date: \"{date}\"\n\
theme: \"{theme}\"\n\
audience: \"{audience}\"\n\
---\n\n",
            title = escape_yaml(&outline.title),
            date = date.format("%Y-%m-%d"),
            theme = escape_yaml(&outline.theme),
            audience = escape_yaml(&outline.audience),
        ));
    }

    out.push_str(&format!("# {}\n\n", outline.title));

    if options.table_of_contents {
        out.push_str("## Table of Contents\n\n");
        if options.introduction {
            out.push_str("- [Introduction](#introduction)\n");
        }
        for chapter in &outline.chapters {
            out.push_str(&format!(
                "- [Chapter {number}: {title}](#{slug})\n",
                number = chapter.number,
                title = chapter.title,
                slug = slugify(&chapter.title),
            ));
        }
        if options.conclusion {
            out.push_str("- [Conclusion](#conclusion)\n");
        }
        out.push('\n');
    }

    if options.introduction {
        out.push_str(&format!("## Introduction\n\n{}\n\n", outline.introduction));
    }

    for chapter in &outline.chapters {
        out.push_str(&format!(
            "## Chapter {}: {}\n\n",
            chapter.number, chapter.title
        ));
        match contents.get(chapter.number) {
            Some(generated) => {
                out.push_str(&demote_headings(&generated.content, HEADING_SHIFT));
                out.push_str("\n\n");
            }
            None => {
                out.push_str(MISSING_CHAPTER_PLACEHOLDER);
                out.push_str("\n\n");
            }
        }
    }

    if options.conclusion {
        out.push_str(&format!("## Conclusion\n\n{}\n\n", outline.conclusion));
    }
    out
}

pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .replace(' ', "-")
        .replace(['.', ','], "")
}

fn escape_yaml(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Raises every heading by `shift` levels (capped at level 6) in one pass over the
/// parsed document, so no heading is rewritten twice. Code blocks are left alone.
pub fn demote_headings(markdown: &str, shift: usize) -> String {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        let Event::Start(Tag::Heading { level, .. }) = event else {
            continue;
        };
        let new_level = (level as usize + shift).min(6);
        let source = &markdown[range.clone()];
        let indent = source.len() - source.trim_start_matches([' ', '\t']).len();

        if source[indent..].starts_with('#') {
            let hashes = source[indent..].chars().take_while(|c| *c == '#').count();
            let start = range.start + indent;
            edits.push((start..start + hashes, "#".repeat(new_level)));
        } else {
            // Setext heading: text lines followed by an `===`/`---` underline.
            let body = source.trim_end_matches(['\n', '\r']);
            let mut lines = body.lines().collect::<Vec<_>>();
            lines.pop();
            // Continuation lines inside a blockquote carry their own `>` markers.
            let text = lines
                .iter()
                .enumerate()
                .map(|(i, line)| match i {
                    0 => line.trim(),
                    _ => line.trim_start_matches([' ', '\t', '>']).trim_end(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            edits.push((
                range.start..range.start + body.len(),
                format!("{} {text}", "#".repeat(new_level)),
            ));
        }
    }

    let mut out = String::with_capacity(markdown.len() + edits.len() * shift);
    let mut cursor = 0usize;
    for (range, replacement) in edits {
        out.push_str(&markdown[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

/// Writes the artifact into `dir`, refusing to overwrite unless `force` is set.
pub fn write_artifact(dir: &Path, artifact: &ExportArtifact, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create export output dir: {}", dir.display()))?;
    let out = dir.join(&artifact.file_name);

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&out)
        .with_context(|| format!("open output: {}", out.display()))?;
    file.write_all(artifact.contents.as_bytes())
        .with_context(|| format!("write output: {}", out.display()))?;
    file.flush()
        .with_context(|| format!("flush output: {}", out.display()))?;

    tracing::info!(
        out = %out.display(),
        mime_type = artifact.mime_type,
        bytes = artifact.contents.len(),
        "export"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::content::{ChapterMetadata, GeneratedChapter};
    use crate::outline::ChapterOutline;

    fn outline() -> BookOutline {
        BookOutline {
            title: "Deep Work".to_owned(),
            introduction: "Intro text.".to_owned(),
            chapters: vec![
                ChapterOutline {
                    number: 1,
                    title: "The Case".to_owned(),
                    description: "a".to_owned(),
                },
                ChapterOutline {
                    number: 2,
                    title: "Rules, Mostly.".to_owned(),
                    description: "b".to_owned(),
                },
            ],
            conclusion: "Go deep.".to_owned(),
            theme: "Attention".to_owned(),
            audience: "Makers".to_owned(),
            style: "Informative".to_owned(),
            goals: String::new(),
        }
    }

    fn generated(number: u32, title: &str, content: &str) -> GeneratedChapter {
        GeneratedChapter {
            number,
            title: title.to_owned(),
            content: content.to_owned(),
            generated_at: Utc::now(),
            last_edited: None,
            metadata: ChapterMetadata::default(),
        }
    }

    #[test]
    fn headings_shift_by_exactly_two_levels() {
        let input = "# Heading\n\nText.\n\n## Sub\n\nMore.\n\n### Deep\n";
        let out = demote_headings(input, HEADING_SHIFT);
        assert_eq!(
            out,
            "### Heading\n\nText.\n\n#### Sub\n\nMore.\n\n##### Deep\n"
        );
    }

    #[test]
    fn heading_on_first_line_is_shifted_once() {
        assert_eq!(demote_headings("# Title", HEADING_SHIFT), "### Title");
        assert_eq!(demote_headings("## A\n# B", HEADING_SHIFT), "#### A\n### B");
    }

    #[test]
    fn code_blocks_and_hash_text_are_untouched() {
        let input = "```sh\n# not a heading\n```\n\nIssue #12 is open.\n";
        assert_eq!(demote_headings(input, HEADING_SHIFT), input);
    }

    #[test]
    fn setext_headings_become_atx() {
        let input = "Title\n=====\n\nBody\n\nPart\n----\n";
        assert_eq!(
            demote_headings(input, HEADING_SHIFT),
            "### Title\n\nBody\n\n#### Part\n"
        );
    }

    #[test]
    fn setext_heading_in_blockquote_drops_continuation_markers() {
        assert_eq!(
            demote_headings("> Title\n> more\n> =====\n", HEADING_SHIFT),
            "> ### Title more\n"
        );
    }

    #[test]
    fn deep_headings_are_capped() {
        assert_eq!(demote_headings("##### Five", HEADING_SHIFT), "###### Five");
    }

    #[test]
    fn selection_export_omits_unselected_chapters() {
        let outline = outline();
        let mut selection = CompiledBookSelection::new();
        selection.promote(2, &generated(2, "Rules", "# Rule One\nBe bold."), Utc::now());

        let out = compile_selection(&outline, &selection);

        assert_eq!(
            out,
            "# Deep Work\n\n\
## Introduction\nIntro text.\n\n\
## Chapter 2: Rules\n### Rule One\nBe bold.\n\n\
## Conclusion\nGo deep."
        );
        assert!(!out.contains("The Case"));
    }

    #[test]
    fn full_export_uses_placeholder_for_missing_chapters() {
        let outline = outline();
        let mut contents = ContentStore::new();
        contents.insert(generated(1, "The Case", "## Why\nBecause."));
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let out = compile_outline(&outline, &contents, &ExportOptions::default(), date);

        assert!(out.starts_with("---\ntitle: \"Deep Work\"\n"));
        assert!(out.contains("date: \"2024-05-01\"\n"));
        assert!(out.contains("- [Chapter 2: Rules, Mostly.](#rules-mostly)\n"));
        assert!(out.contains("## Chapter 1: The Case\n\n#### Why\nBecause.\n\n"));
        assert!(out.contains(&format!(
            "## Chapter 2: Rules, Mostly.\n\n{MISSING_CHAPTER_PLACEHOLDER}\n\n"
        )));
        assert!(out.ends_with("## Conclusion\n\nGo deep.\n\n"));
    }

    #[test]
    fn full_export_respects_section_toggles() {
        let outline = outline();
        let options = ExportOptions {
            metadata: false,
            table_of_contents: false,
            introduction: false,
            conclusion: false,
        };
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let out = compile_outline(&outline, &ContentStore::new(), &options, date);

        assert!(out.starts_with("# Deep Work\n\n## Chapter 1: The Case"));
        assert!(!out.contains("Introduction"));
        assert!(!out.contains("Conclusion"));
        assert!(!out.contains("---"));
    }

    #[test]
    fn file_name_is_lowercase_with_underscores() {
        assert_eq!(
            export_file_name("Deep Work\tFor Makers", ExportFormat::Markdown),
            "deep_work_for_makers.md"
        );
        let artifact = ExportArtifact::new("Deep Work", ExportFormat::Text, "# Deep Work".to_owned());
        assert_eq!(artifact.file_name, "deep_work.txt");
        assert_eq!(artifact.mime_type, "text/plain");
        assert_eq!(artifact.contents, "# Deep Work");
    }

    #[test]
    fn write_artifact_refuses_to_overwrite() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let artifact = ExportArtifact::new("Book", ExportFormat::Markdown, "x".to_owned());

        let path = write_artifact(temp.path(), &artifact, false)?;
        assert_eq!(std::fs::read_to_string(&path)?, "x");
        assert!(write_artifact(temp.path(), &artifact, false).is_err());
        write_artifact(temp.path(), &artifact, true)?;
        Ok(())
    }
}
