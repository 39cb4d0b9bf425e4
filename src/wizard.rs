//! The authoring session: one book, one provider selection, and the step the
//! author is on.
//!
//! Every action either succeeds and commits, or fails and leaves the session as
//! it was. Provider calls happen before anything is mutated.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{Provider, ProviderSettings};
use crate::content::{
    ChapterMetadata, CompiledBookSelection, ContentStore, GeneratedChapter,
};
use crate::error::{Error, Result};
use crate::export::{self, ExportArtifact, ExportFormat, ExportMode, ExportOptions};
use crate::gateway::TextGenerator;
use crate::outline::{BookDetails, BookOutline, ChapterOutline, Direction, Renumbering};
use crate::parse;
use crate::project::ProjectFile;
use crate::prompts::{self, ChapterLength, ChapterRequest, EditOperation, FormatOption, StyleOption};
use crate::stats::{BookStats, ChapterStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Step {
    #[default]
    Config,
    Structure,
    Content,
    Export,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Config, Step::Structure, Step::Content, Step::Export];

    pub fn previous(self) -> Step {
        match self {
            Step::Config | Step::Structure => Step::Config,
            Step::Content => Step::Structure,
            Step::Export => Step::Content,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Config => "config",
            Step::Structure => "structure",
            Step::Content => "content",
            Step::Export => "export",
        };
        f.write_str(name)
    }
}

/// What happens to generated content when chapter numbers change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ContentPolicy {
    /// Content stays under the number it was generated for.
    #[default]
    Keep,
    /// Content and final-book entries follow their chapter; a deleted chapter's content goes too.
    Cascade,
}

#[derive(Debug, Clone)]
pub struct Session {
    step: Step,
    providers: ProviderSettings,
    configured: bool,
    details: BookDetails,
    outline: Option<BookOutline>,
    contents: ContentStore,
    selection: CompiledBookSelection,
    current_chapter: Option<u32>,
}

impl Session {
    pub fn new(providers: ProviderSettings) -> Self {
        Self {
            step: Step::Config,
            providers,
            configured: false,
            details: BookDetails::default(),
            outline: None,
            contents: ContentStore::new(),
            selection: CompiledBookSelection::new(),
            current_chapter: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn providers(&self) -> &ProviderSettings {
        &self.providers
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn details(&self) -> &BookDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut BookDetails {
        &mut self.details
    }

    pub fn outline(&self) -> Option<&BookOutline> {
        self.outline.as_ref()
    }

    pub fn contents(&self) -> &ContentStore {
        &self.contents
    }

    pub fn selection(&self) -> &CompiledBookSelection {
        &self.selection
    }

    pub fn current_chapter(&self) -> Option<u32> {
        self.current_chapter
    }

    fn gate(&self, step: Step) -> Result<()> {
        let reason = match step {
            Step::Config => None,
            Step::Structure if !self.configured => Some("save the provider configuration first"),
            Step::Structure => None,
            Step::Content | Step::Export if self.outline.is_none() => {
                Some("generate or load a book outline first")
            }
            Step::Content => None,
            Step::Export if self.contents.is_empty() && self.selection.is_empty() => {
                Some("generate at least one chapter first")
            }
            Step::Export => None,
        };
        match reason {
            Some(reason) => Err(Error::StepLocked { step, reason }),
            None => Ok(()),
        }
    }

    pub fn can_enter(&self, step: Step) -> bool {
        self.gate(step).is_ok()
    }

    pub fn navigate(&mut self, step: Step) -> Result<()> {
        self.gate(step)?;
        if self.step != step {
            tracing::debug!(from = %self.step, to = %step, "navigate");
            self.step = step;
        }
        Ok(())
    }

    pub fn back(&mut self) -> Step {
        self.step = self.step.previous();
        self.step
    }

    /// Selects the provider and model; the provider's credential must be present.
    pub fn save_configuration(&mut self, provider: Provider, model: &str) -> Result<()> {
        self.providers.select(provider, model)?;
        self.configured = true;
        self.step = Step::Structure;
        tracing::info!(%provider, model, "configuration saved");
        Ok(())
    }

    pub fn start_new_book(&mut self) {
        self.details = BookDetails::default();
        self.outline = None;
        self.contents = ContentStore::new();
        self.selection = CompiledBookSelection::new();
        self.current_chapter = None;
        tracing::info!("start new book");
    }

    pub async fn generate_outline(
        &mut self,
        generator: &dyn TextGenerator,
        details: BookDetails,
    ) -> Result<&BookOutline> {
        details.validate()?;
        let prompt = prompts::outline_prompt(&details);
        let raw = generator.generate(&prompt).await?;
        let mut outline = parse::parse_outline(&raw)?;
        outline.apply_details(&details);

        if !self.contents.is_empty() {
            tracing::warn!(
                generated = self.contents.len(),
                "new outline generated; existing chapter content is kept under its old numbers"
            );
        }
        tracing::info!(
            title = %outline.title,
            chapters = outline.chapters.len(),
            "outline generated"
        );
        self.details = details;
        Ok(&*self.outline.insert(outline))
    }

    fn outline_mut(&mut self) -> Result<&mut BookOutline> {
        self.outline.as_mut().ok_or(Error::NoOutline)
    }

    fn chapter_outline(&self, number: u32) -> Result<&ChapterOutline> {
        self.outline
            .as_ref()
            .ok_or(Error::NoOutline)?
            .chapter(number)
            .ok_or(Error::UnknownChapter(number))
    }

    fn generated(&self, number: u32) -> Result<&GeneratedChapter> {
        self.contents
            .get(number)
            .ok_or(Error::ChapterNotGenerated(number))
    }

    pub fn add_chapter(&mut self) -> Result<u32> {
        let number = self.outline_mut()?.add_chapter();
        if self.contents.contains(number) {
            tracing::warn!(
                chapter = number,
                "new chapter takes the number of content left behind by an earlier deletion"
            );
        }
        Ok(number)
    }

    pub fn delete_chapter(
        &mut self,
        number: u32,
        policy: ContentPolicy,
    ) -> Result<(ChapterOutline, Renumbering)> {
        let (removed, renumbering) = self
            .outline_mut()?
            .delete_chapter(number)
            .ok_or(Error::UnknownChapter(number))?;
        self.reconcile(&renumbering, policy);
        Ok((removed, renumbering))
    }

    /// The returned renumbering is empty when the chapter is already at that end of the book.
    pub fn move_chapter(
        &mut self,
        number: u32,
        direction: Direction,
        policy: ContentPolicy,
    ) -> Result<Renumbering> {
        let renumbering = self
            .outline_mut()?
            .move_chapter(number, direction)
            .ok_or(Error::UnknownChapter(number))?;
        self.reconcile(&renumbering, policy);
        Ok(renumbering)
    }

    pub fn reorder_chapters(&mut self, policy: ContentPolicy) -> Result<Renumbering> {
        let renumbering = self.outline_mut()?.reorder_all();
        self.reconcile(&renumbering, policy);
        Ok(renumbering)
    }

    fn reconcile(&mut self, renumbering: &Renumbering, policy: ContentPolicy) {
        if renumbering.is_empty() {
            return;
        }
        match policy {
            ContentPolicy::Cascade => {
                self.contents.apply_renumbering(renumbering);
                self.selection.apply_renumbering(renumbering);
                self.current_chapter = self.current_chapter.and_then(|current| {
                    if renumbering.removed == Some(current) {
                        return None;
                    }
                    Some(
                        renumbering
                            .moved
                            .iter()
                            .find(|(old, _)| *old == current)
                            .map_or(current, |(_, new)| *new),
                    )
                });
                tracing::debug!(
                    removed = ?renumbering.removed,
                    moved = renumbering.moved.len(),
                    "content renumbered with outline"
                );
            }
            ContentPolicy::Keep => {
                if self.current_chapter.is_some() && self.current_chapter == renumbering.removed {
                    self.current_chapter = None;
                }
                let Some(outline) = self.outline.as_ref() else {
                    return;
                };
                let orphaned = self
                    .contents
                    .iter()
                    .filter(|g| outline.chapter(g.number).is_none())
                    .map(|g| g.number)
                    .collect::<Vec<_>>();
                let reassigned = self
                    .contents
                    .iter()
                    .filter(|g| {
                        renumbering.removed == Some(g.number)
                            || renumbering.moved.iter().any(|(old, _)| *old == g.number)
                    })
                    .filter(|g| outline.chapter(g.number).is_some())
                    .map(|g| g.number)
                    .collect::<Vec<_>>();
                if !orphaned.is_empty() || !reassigned.is_empty() {
                    tracing::warn!(
                        ?orphaned,
                        ?reassigned,
                        "chapter numbers changed; generated content stays under its previous numbers"
                    );
                }
            }
        }
    }

    /// Updates the outline entry and the title mirrored on generated content.
    pub fn update_chapter(
        &mut self,
        number: u32,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        if !self.outline_mut()?.update_chapter(number, title, description) {
            return Err(Error::UnknownChapter(number));
        }
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.contents.set_title(number, title);
        }
        tracing::debug!(chapter = number, "update chapter");
        Ok(())
    }

    pub async fn regenerate_description(
        &mut self,
        generator: &dyn TextGenerator,
        number: u32,
        title: Option<&str>,
    ) -> Result<String> {
        let outline = self.outline.as_ref().ok_or(Error::NoOutline)?;
        let chapter = self.chapter_outline(number)?;
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&chapter.title)
            .to_owned();

        let prompt = prompts::description_prompt(outline, &title);
        let description = generator.generate(&prompt).await?.trim().to_owned();
        if description.is_empty() {
            return Err(Error::validation("the provider returned an empty description"));
        }

        self.update_chapter(number, Some(&title), Some(&description))?;
        Ok(description)
    }

    pub fn select_chapter(&mut self, number: u32) -> Result<()> {
        self.chapter_outline(number)?;
        self.current_chapter = Some(number);
        Ok(())
    }

    pub async fn generate_chapter(
        &mut self,
        generator: &dyn TextGenerator,
        number: u32,
        request: &ChapterRequest,
    ) -> Result<&GeneratedChapter> {
        request.length.validate()?;
        let outline = self.outline.as_ref().ok_or(Error::NoOutline)?;
        let chapter = self.chapter_outline(number)?;

        let prompt = prompts::chapter_prompt(outline, chapter, request);
        let title = request
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&chapter.title)
            .to_owned();
        let content = generator.generate(&prompt).await?;

        self.update_chapter(number, request.title.as_deref(), request.description.as_deref())?;

        let metadata = ChapterMetadata {
            word_count: match request.length {
                ChapterLength::Words(words) => Some(words),
                ChapterLength::Bucket(_) => None,
            },
            length: match request.length {
                ChapterLength::Bucket(bucket) => Some(format!("{bucket:?}")),
                ChapterLength::Words(_) => None,
            },
            key_points: request.key_points.clone(),
            custom_content: request
                .custom_content
                .clone()
                .filter(|c| !c.trim().is_empty()),
            tone: request.tone.map(|tone| tone.to_string()),
            examples: request.examples.iter().map(ToString::to_string).collect(),
        };
        let stats = ChapterStats::of(&content);
        tracing::info!(
            chapter = number,
            words = stats.words,
            paragraphs = stats.paragraphs,
            "chapter generated"
        );

        self.current_chapter = Some(number);
        self.contents.insert(GeneratedChapter {
            number,
            title,
            content,
            generated_at: Utc::now(),
            last_edited: None,
            metadata,
        });
        self.generated(number)
    }

    pub fn save_chapter_content(&mut self, number: u32, content: &str) -> Result<()> {
        let chapter = self
            .contents
            .get_mut(number)
            .ok_or(Error::ChapterNotGenerated(number))?;
        chapter.content = content.to_owned();
        chapter.last_edited = Some(Utc::now());
        tracing::debug!(chapter = number, chars = content.len(), "chapter content saved");
        Ok(())
    }

    pub fn clear_chapter(&mut self, number: u32) -> Result<GeneratedChapter> {
        let removed = self
            .contents
            .remove(number)
            .ok_or(Error::ChapterNotGenerated(number))?;
        tracing::debug!(chapter = number, "chapter content cleared");
        Ok(removed)
    }

    /// With a `section` that occurs in the chapter, only that text is rewritten;
    /// otherwise the whole chapter is.
    pub async fn apply_edit(
        &mut self,
        generator: &dyn TextGenerator,
        number: u32,
        operation: EditOperation,
        section: Option<&str>,
    ) -> Result<()> {
        let current = &self.generated(number)?.content;
        let section = section.filter(|s| !s.trim().is_empty());
        let target = match section {
            Some(section) if current.contains(section) => Some(section),
            Some(_) => {
                tracing::warn!(chapter = number, "section not found in chapter; editing the whole chapter");
                None
            }
            None => None,
        };

        let prompt = prompts::edit_prompt(operation, current, target);
        let revised = generator.generate(&prompt).await?;
        let content = match target {
            Some(section) => current.replacen(section, revised.trim(), 1),
            None => revised,
        };

        tracing::info!(chapter = number, ?operation, partial = target.is_some(), "chapter edited");
        self.save_chapter_content(number, &content)
    }

    pub async fn apply_style(
        &mut self,
        generator: &dyn TextGenerator,
        number: u32,
        style: StyleOption,
        format: FormatOption,
    ) -> Result<()> {
        let prompt = prompts::style_prompt(style, format, &self.generated(number)?.content);
        let content = generator.generate(&prompt).await?;
        tracing::info!(chapter = number, ?style, ?format, "chapter restyled");
        self.save_chapter_content(number, &content)
    }

    pub fn copy_to_final_book(&mut self, number: u32) -> Result<()> {
        let chapter = self
            .contents
            .get(number)
            .ok_or(Error::ChapterNotGenerated(number))?;
        self.selection.promote(number, chapter, Utc::now());
        tracing::info!(chapter = number, selected = self.selection.len(), "copied to final book");
        Ok(())
    }

    pub fn export(
        &self,
        mode: ExportMode,
        format: ExportFormat,
        options: &ExportOptions,
        date: NaiveDate,
    ) -> Result<ExportArtifact> {
        let outline = self.outline.as_ref().ok_or(Error::NoOutline)?;
        let contents = match mode {
            ExportMode::Full => export::compile_outline(outline, &self.contents, options, date),
            ExportMode::Selection => {
                if self.selection.is_empty() {
                    return Err(Error::validation(
                        "no chapters have been copied to the final book yet",
                    ));
                }
                export::compile_selection(outline, &self.selection)
            }
        };
        Ok(ExportArtifact::new(&outline.title, format, contents))
    }

    pub fn stats(&self) -> Result<BookStats> {
        let outline = self.outline.as_ref().ok_or(Error::NoOutline)?;
        Ok(BookStats::collect(outline, &self.contents))
    }

    pub fn to_project(&self, timestamp: DateTime<Utc>) -> Result<ProjectFile> {
        let outline = self.outline.as_ref().ok_or(Error::NoOutline)?;
        Ok(ProjectFile::new(
            outline.clone(),
            self.contents.clone(),
            self.selection.clone(),
            timestamp,
        ))
    }

    pub fn load_project(&mut self, project: ProjectFile) {
        let outline = project.book_structure;
        self.details = BookDetails {
            title: outline.title.clone(),
            theme: outline.theme.clone(),
            audience: outline.audience.clone(),
            style: if outline.style.trim().is_empty() {
                BookDetails::default().style
            } else {
                outline.style.clone()
            },
            goals: outline.goals.clone(),
        };
        if !outline.is_contiguous() {
            tracing::warn!("loaded outline has non-contiguous chapter numbers; use reorder to repair");
        }
        self.outline = Some(outline);
        self.contents = project.generated_chapters;
        self.selection = project.book_content;
        self.current_chapter = None;
    }

    /// Text rendering of the current step.
    pub fn view(&self) -> String {
        let mut out = Step::ALL
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let label = format!("{}. {step}", idx + 1);
                if *step == self.step {
                    format!("[{label}]")
                } else if self.can_enter(*step) {
                    label
                } else {
                    format!("({label})")
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str("\n\n");

        match self.step {
            Step::Config => self.view_config(&mut out),
            Step::Structure => self.view_structure(&mut out),
            Step::Content => self.view_content(&mut out),
            Step::Export => self.view_export(&mut out),
        }
        out
    }

    fn view_config(&self, out: &mut String) {
        let active = self.providers.active();
        out.push_str(&format!(
            "Provider: {} ({}){}\n",
            active.provider,
            active.model,
            if self.configured { "" } else { " - not saved" }
        ));
        for provider in [Provider::Openai, Provider::Anthropic] {
            let config = self.providers.config(provider);
            let credential = if config.api_key.is_some() {
                "API key found".to_owned()
            } else {
                format!("API key missing (set {})", provider.env_var())
            };
            out.push_str(&format!(
                "  {provider}: {credential}; models: {}\n",
                provider.models().join(", ")
            ));
        }
    }

    fn view_structure(&self, out: &mut String) {
        let details = &self.details;
        out.push_str(&format!(
            "Title: {}\nTheme: {}\nAudience: {}\nStyle: {}\nGoals: {}\n",
            details.title, details.theme, details.audience, details.style, details.goals
        ));
        let Some(outline) = self.outline.as_ref() else {
            out.push_str("\nNo outline yet.\n");
            return;
        };
        out.push_str(&format!("\n# {}\n\nIntroduction: {}\n\n", outline.title, outline.introduction));
        for chapter in &outline.chapters {
            out.push_str(&format!(
                "{}. {}\n   {}\n",
                chapter.number, chapter.title, chapter.description
            ));
        }
        out.push_str(&format!("\nConclusion: {}\n", outline.conclusion));
    }

    fn view_content(&self, out: &mut String) {
        let Some(outline) = self.outline.as_ref() else {
            out.push_str("No outline yet.\n");
            return;
        };
        for chapter in &outline.chapters {
            let marker = if self.current_chapter == Some(chapter.number) { ">" } else { " " };
            let status = match self.contents.get(chapter.number) {
                Some(generated) => format!("{} words", ChapterStats::of(&generated.content).words),
                None => "not generated".to_owned(),
            };
            let selected = if self.selection.contains(chapter.number) { ", in final book" } else { "" };
            out.push_str(&format!(
                "{marker} {}. {} ({status}{selected})\n",
                chapter.number, chapter.title
            ));
        }

        let Some(current) = self.current_chapter else {
            return;
        };
        match self.contents.get(current) {
            Some(generated) => {
                let stats = ChapterStats::of(&generated.content);
                out.push_str(&format!(
                    "\nChapter {current}: {} ({} words, {} paragraphs)\n\n{}\n",
                    generated.title, stats.words, stats.paragraphs, generated.content
                ));
            }
            None => {
                if let Some(chapter) = outline.chapter(current) {
                    out.push_str(&format!(
                        "\nChapter {current}: {}\n{}\n",
                        chapter.title, chapter.description
                    ));
                }
            }
        }
    }

    fn view_export(&self, out: &mut String) {
        if let Ok(stats) = self.stats() {
            out.push_str(&stats.render());
        }
        if self.selection.is_empty() {
            out.push_str("\nFinal book: no chapters copied yet.\n");
            return;
        }
        out.push_str("\nFinal book:\n");
        for (number, chapter) in self.selection.iter() {
            out.push_str(&format!(
                "  {number}. {} (copied {})\n",
                chapter.title,
                chapter.copied_at.format("%Y-%m-%d %H:%M")
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECS, ProviderConfig};

    /// Replays canned responses in order and records every prompt.
    struct Scripted {
        responses: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: impl IntoIterator<Item = Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn ok(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok((*t).to_owned())))
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::validation("script exhausted")))
        }
    }

    const OUTLINE_JSON: &str = r#"```json
{
  "title": "Deep Work",
  "introduction": "Why depth matters.",
  "chapters": [
    {"number": 1, "title": "One", "description": "First."},
    {"number": 2, "title": "Two", "description": "Second."},
    {"number": 3, "title": "Three", "description": "Third."}
  ],
  "conclusion": "Go deep.",
  "theme": "ignored by the caller"
}
```"#;

    fn providers(openai_key: Option<&str>) -> ProviderSettings {
        let config = |provider: Provider, key: Option<&str>| ProviderConfig {
            provider,
            model: provider.default_model().to_owned(),
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: key.map(str::to_owned),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        ProviderSettings {
            selected: Provider::Openai,
            openai: config(Provider::Openai, openai_key),
            anthropic: config(Provider::Anthropic, None),
        }
    }

    fn details() -> BookDetails {
        BookDetails {
            title: "Deep Work".to_owned(),
            theme: "Attention".to_owned(),
            audience: "Makers".to_owned(),
            style: "Narrative".to_owned(),
            goals: "Focus".to_owned(),
        }
    }

    async fn session_with_outline() -> anyhow::Result<Session> {
        let mut session = Session::new(providers(Some("sk-test")));
        session.save_configuration(Provider::Openai, "gpt-4o")?;
        session
            .generate_outline(&Scripted::ok(&[OUTLINE_JSON]), details())
            .await?;
        Ok(session)
    }

    fn titles(session: &Session) -> Vec<(u32, String)> {
        session
            .outline()
            .unwrap()
            .chapters
            .iter()
            .map(|c| (c.number, c.title.clone()))
            .collect()
    }

    #[test]
    fn steps_are_gated_on_upstream_artifacts() -> anyhow::Result<()> {
        let mut session = Session::new(providers(Some("sk-test")));

        assert!(matches!(
            session.navigate(Step::Structure).unwrap_err(),
            Error::StepLocked { step: Step::Structure, .. }
        ));
        session.save_configuration(Provider::Openai, "gpt-4")?;
        assert_eq!(session.step(), Step::Structure);
        assert!(!session.can_enter(Step::Content));
        assert!(!session.can_enter(Step::Export));

        assert_eq!(session.back(), Step::Config);
        assert_eq!(session.back(), Step::Config);
        Ok(())
    }

    #[test]
    fn configuration_requires_credential() {
        let mut session = Session::new(providers(None));
        let err = session
            .save_configuration(Provider::Openai, "gpt-4o")
            .unwrap_err();

        assert!(matches!(err, Error::Configuration { .. }));
        assert!(!session.is_configured());
        assert_eq!(session.step(), Step::Config);
    }

    #[tokio::test]
    async fn outline_merges_caller_details() -> anyhow::Result<()> {
        let session = session_with_outline().await?;
        let outline = session.outline().unwrap();

        assert_eq!(outline.theme, "Attention");
        assert_eq!(outline.style, "Narrative");
        assert_eq!(outline.chapters.len(), 3);
        assert_eq!(session.details().title, "Deep Work");
        Ok(())
    }

    #[tokio::test]
    async fn outline_requires_details_before_calling_provider() {
        let mut session = Session::new(providers(Some("sk-test")));
        let generator = Scripted::ok(&[OUTLINE_JSON]);
        let err = session
            .generate_outline(
                &generator,
                BookDetails {
                    audience: String::new(),
                    ..details()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn malformed_outline_leaves_session_untouched() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        let before = session.outline().cloned();

        let err = session
            .generate_outline(&Scripted::ok(&["not json at all"]), details())
            .await
            .unwrap_err();

        assert_eq!(err.raw_response(), Some("not json at all"));
        assert_eq!(session.outline().cloned(), before);
        Ok(())
    }

    #[tokio::test]
    async fn failed_generation_keeps_prior_content() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["First draft."]), 1, &ChapterRequest::default())
            .await?;

        let failing = Scripted::new([Err(Error::Generation {
            provider: Provider::Openai,
            message: "boom".to_owned(),
        })]);
        let err = session
            .generate_chapter(
                &failing,
                1,
                &ChapterRequest {
                    title: Some("Renamed".to_owned()),
                    ..ChapterRequest::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generation { .. }));
        assert_eq!(session.contents().get(1).unwrap().content, "First draft.");
        assert_eq!(titles(&session)[0].1, "One");
        Ok(())
    }

    #[tokio::test]
    async fn generate_chapter_records_metadata_and_overrides() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        let generator = Scripted::ok(&["## Part\n\nText."]);
        let request = ChapterRequest {
            key_points: "focus".to_owned(),
            length: ChapterLength::Words(1500),
            title: Some("Second, revised".to_owned()),
            ..ChapterRequest::default()
        };

        let chapter = session.generate_chapter(&generator, 2, &request).await?;

        assert_eq!(chapter.title, "Second, revised");
        assert_eq!(chapter.metadata.word_count, Some(1500));
        assert_eq!(chapter.metadata.key_points, "focus");
        assert_eq!(titles(&session)[1].1, "Second, revised");
        assert_eq!(session.current_chapter(), Some(2));
        assert!(generator.prompts()[0].contains("- Title: Second, revised"));
        assert!(session.can_enter(Step::Export));
        Ok(())
    }

    #[tokio::test]
    async fn word_count_out_of_range_is_rejected() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        let generator = Scripted::ok(&["unused"]);
        let request = ChapterRequest {
            length: ChapterLength::Words(8000),
            ..ChapterRequest::default()
        };

        let err = session.generate_chapter(&generator, 1, &request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(generator.prompts().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn update_chapter_mirrors_title_only() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Body text."]), 3, &ChapterRequest::default())
            .await?;

        session.update_chapter(3, Some("Finale"), Some("New description."))?;

        let generated = session.contents().get(3).unwrap();
        assert_eq!(generated.title, "Finale");
        assert_eq!(generated.content, "Body text.");
        assert_eq!(session.outline().unwrap().chapters[2].description, "New description.");
        assert!(matches!(
            session.update_chapter(9, Some("x"), None).unwrap_err(),
            Error::UnknownChapter(9)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn delete_keeps_orphaned_content_by_default() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Third body."]), 3, &ChapterRequest::default())
            .await?;

        let (removed, _) = session.delete_chapter(2, ContentPolicy::Keep)?;

        assert_eq!(removed.title, "Two");
        assert_eq!(
            titles(&session),
            vec![(1, "One".to_owned()), (2, "Three".to_owned())]
        );
        assert!(session.contents().contains(3));
        assert!(!session.contents().contains(2));
        Ok(())
    }

    #[tokio::test]
    async fn delete_with_cascade_renumbers_content() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Two body."]), 2, &ChapterRequest::default())
            .await?;
        session
            .generate_chapter(&Scripted::ok(&["Third body."]), 3, &ChapterRequest::default())
            .await?;
        session.copy_to_final_book(3)?;

        session.delete_chapter(2, ContentPolicy::Cascade)?;

        assert_eq!(session.contents().numbers(), vec![2]);
        assert_eq!(session.contents().get(2).unwrap().content, "Third body.");
        assert_eq!(session.selection().get(2).unwrap().content, "Third body.");
        assert_eq!(session.current_chapter(), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn move_at_boundary_is_a_no_op() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;

        assert!(session.move_chapter(1, Direction::Up, ContentPolicy::Keep)?.is_empty());
        assert!(session.move_chapter(3, Direction::Down, ContentPolicy::Keep)?.is_empty());
        assert!(!session.move_chapter(1, Direction::Down, ContentPolicy::Keep)?.is_empty());
        assert_eq!(
            titles(&session),
            vec![
                (1, "Two".to_owned()),
                (2, "One".to_owned()),
                (3, "Three".to_owned())
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn section_edit_replaces_only_that_section() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(
                &Scripted::ok(&["Intro para.\n\nTarget para.\n\nOutro para."]),
                1,
                &ChapterRequest::default(),
            )
            .await?;

        session
            .apply_edit(
                &Scripted::ok(&["Shorter para.\n"]),
                1,
                EditOperation::Condense,
                Some("Target para."),
            )
            .await?;

        let chapter = session.contents().get(1).unwrap();
        assert_eq!(chapter.content, "Intro para.\n\nShorter para.\n\nOutro para.");
        assert!(chapter.last_edited.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn style_change_replaces_content() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Old."]), 1, &ChapterRequest::default())
            .await?;

        let generator = Scripted::ok(&["New."]);
        session
            .apply_style(&generator, 1, StyleOption::MoreFormal, FormatOption::MoreTables)
            .await?;

        assert_eq!(session.contents().get(1).unwrap().content, "New.");
        assert!(generator.prompts()[0].contains("BEGIN_CHAPTER_TEXT\nOld.\nEND_CHAPTER_TEXT"));
        Ok(())
    }

    #[tokio::test]
    async fn regenerated_description_is_propagated() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        let description = session
            .regenerate_description(&Scripted::ok(&["  A fresh take.\n"]), 2, None)
            .await?;

        assert_eq!(description, "A fresh take.");
        assert_eq!(session.outline().unwrap().chapters[1].description, "A fresh take.");
        Ok(())
    }

    #[tokio::test]
    async fn selection_export_needs_copied_chapters() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let options = ExportOptions::default();

        assert!(session
            .export(ExportMode::Selection, ExportFormat::Markdown, &options, date)
            .is_err());
        assert!(matches!(
            session.copy_to_final_book(1).unwrap_err(),
            Error::ChapterNotGenerated(1)
        ));

        session
            .generate_chapter(&Scripted::ok(&["# Top\nBody."]), 1, &ChapterRequest::default())
            .await?;
        session.copy_to_final_book(1)?;
        let artifact = session.export(ExportMode::Selection, ExportFormat::Markdown, &options, date)?;

        assert_eq!(artifact.file_name, "deep_work.md");
        assert!(artifact.contents.contains("## Chapter 1: One\n### Top\nBody."));
        Ok(())
    }

    #[tokio::test]
    async fn project_round_trip_restores_session() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Body."]), 2, &ChapterRequest::default())
            .await?;
        let project = session.to_project(Utc::now())?;

        let mut restored = Session::new(providers(None));
        restored.load_project(project);

        assert_eq!(restored.outline(), session.outline());
        assert_eq!(restored.contents(), session.contents());
        assert_eq!(restored.details().theme, "Attention");
        Ok(())
    }

    #[tokio::test]
    async fn start_new_book_resets_everything() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        session
            .generate_chapter(&Scripted::ok(&["Body."]), 1, &ChapterRequest::default())
            .await?;

        session.start_new_book();

        assert!(session.outline().is_none());
        assert!(session.contents().is_empty());
        assert_eq!(session.details(), &BookDetails::default());
        assert!(session.is_configured());
        Ok(())
    }

    #[tokio::test]
    async fn view_reflects_current_step() -> anyhow::Result<()> {
        let mut session = session_with_outline().await?;
        assert!(session.view().contains("[2. structure]"));
        assert!(session.view().contains("1. One\n   First."));

        session.navigate(Step::Content)?;
        session.select_chapter(2)?;
        let view = session.view();
        assert!(view.contains("> 2. Two (not generated)"));
        assert!(view.contains("(4. export)"));
        Ok(())
    }
}
