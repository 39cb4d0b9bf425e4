//! Line-oriented driver for the authoring wizard.

use std::collections::BTreeMap;
use std::io::{BufRead as _, IsTerminal as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::cli::SessionArgs;
use crate::config::{Provider, ProviderSettings};
use crate::error::Error;
use crate::export::{self, ExportFormat, ExportMode, ExportOptions};
use crate::gateway::ProviderGateway;
use crate::outline::{Direction, Renumbering, WRITING_STYLES};
use crate::project::{self, ProjectFile};
use crate::prompts::{
    ChapterLength, ChapterRequest, EditOperation, ExampleKind, FormatOption, LengthBucket,
    StyleOption, Tone,
};
use crate::wizard::{ContentPolicy, Session, Step};

const PROMPT: &str = "book> ";

/// Commands accepted at the `book>` prompt.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub enum ReplCommand {
    /// Show the current step
    #[command(alias = "view")]
    Status,
    /// Go to a step (config, structure, content, export)
    Goto {
        #[arg(value_enum)]
        step: Step,
    },
    /// Go to the previous step
    Back,
    /// Select provider and model
    Config {
        #[arg(value_enum)]
        provider: Provider,
        model: Option<String>,
    },
    /// Forget the current book and start over
    New,
    /// Set a book detail: set <title|theme|audience|style|goals> <text>
    Set {
        #[arg(value_enum)]
        field: DetailField,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Generate the outline from the book details
    Outline,
    /// Append a placeholder chapter
    Add,
    /// Delete a chapter
    Delete { number: u32 },
    /// Move a chapter up or down
    Move {
        number: u32,
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Renumber chapters by position
    Reorder,
    /// What happens to generated content when chapter numbers change
    Policy {
        #[arg(value_enum)]
        policy: ContentPolicy,
    },
    /// Rename a chapter
    Title {
        number: u32,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        title: Vec<String>,
    },
    /// Replace a chapter description
    Describe {
        number: u32,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        text: Vec<String>,
    },
    /// Ask the provider for a new chapter description
    RegenDesc { number: u32 },
    /// Make a chapter the current one
    Select { number: u32 },
    /// Key points for the next generation of a chapter
    Points {
        number: u32,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Custom text to weave into a chapter
    Custom {
        number: u32,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Target length in words (500-7000)
    Words { number: u32, words: u32 },
    /// Coarse target length
    Length {
        number: u32,
        #[arg(value_enum)]
        length: LengthBucket,
    },
    /// Tone for a chapter
    Tone {
        number: u32,
        #[arg(value_enum)]
        tone: Tone,
    },
    /// Kinds of examples a chapter should include (none to clear)
    Examples {
        number: u32,
        #[arg(value_enum)]
        kinds: Vec<ExampleKind>,
    },
    /// Generate a chapter
    Generate { number: u32 },
    /// Replace a chapter's content with the contents of a file
    SaveContent { number: u32, file: PathBuf },
    /// Drop a chapter's generated content
    Clear { number: u32 },
    /// Revise a chapter, optionally only one passage of it
    Edit {
        number: u32,
        #[arg(value_enum)]
        operation: EditOperation,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        section: Vec<String>,
    },
    /// Rewrite a chapter in another style and structure
    Style {
        number: u32,
        #[arg(value_enum)]
        style: StyleOption,
        #[arg(value_enum, default_value_t = FormatOption::Current)]
        format: FormatOption,
    },
    /// Copy a chapter into the final book
    Copy { number: u32 },
    /// Write the compiled book
    Export {
        #[arg(long, value_enum, default_value_t = ExportMode::Full)]
        mode: ExportMode,
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        no_metadata: bool,
        #[arg(long)]
        no_toc: bool,
    },
    /// Save the project file
    Save {
        file: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Load a project file
    Load { file: PathBuf },
    /// Word counts and progress
    Stats,
    /// Leave the session
    #[command(aliases = ["exit", "q"])]
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DetailField {
    Title,
    Theme,
    Audience,
    Style,
    Goals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    session: Session,
    /// Per-chapter generation options collected before `generate`.
    drafts: BTreeMap<u32, ChapterRequest>,
    policy: ContentPolicy,
    export_dir: PathBuf,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            drafts: BTreeMap::new(),
            policy: ContentPolicy::default(),
            export_dir: PathBuf::from("."),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn gateway(&self) -> anyhow::Result<ProviderGateway> {
        ProviderGateway::new(self.session.providers().active().clone())
    }

    fn draft(&mut self, number: u32) -> &mut ChapterRequest {
        self.drafts.entry(number).or_default()
    }

    /// Under `Cascade`, drafts follow their chapters like generated content does.
    fn renumber_drafts(&mut self, renumbering: &Renumbering) {
        if self.policy == ContentPolicy::Cascade {
            renumbering.apply(&mut self.drafts);
        }
    }

    /// Parses and runs one input line. Errors leave the session as it was.
    pub async fn execute(&mut self, line: &str) -> anyhow::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let command = match ReplCommand::try_parse_from(line.split_whitespace()) {
            Ok(command) => command,
            Err(err) => {
                // Also covers `help`, which clap reports as an "error".
                print!("{err}");
                return Ok(Flow::Continue);
            }
        };
        tracing::debug!(?command, "repl command");

        match command {
            ReplCommand::Status => print!("{}", self.session.view()),
            ReplCommand::Goto { step } => {
                self.session.navigate(step)?;
                print!("{}", self.session.view());
            }
            ReplCommand::Back => {
                self.session.back();
                print!("{}", self.session.view());
            }
            ReplCommand::Config { provider, model } => {
                self.session.navigate(Step::Config)?;
                let model = model.unwrap_or_else(|| provider.default_model().to_owned());
                self.session.save_configuration(provider, &model)?;
                println!("using {provider} ({model})");
            }
            ReplCommand::New => {
                self.session.navigate(Step::Structure)?;
                self.session.start_new_book();
                self.drafts.clear();
                println!("ready to start a new book");
            }
            ReplCommand::Set { field, value } => {
                self.session.navigate(Step::Structure)?;
                let value = value.join(" ");
                let details = self.session.details_mut();
                match field {
                    DetailField::Title => details.title = value,
                    DetailField::Theme => details.theme = value,
                    DetailField::Audience => details.audience = value,
                    DetailField::Style => {
                        if !WRITING_STYLES.contains(&value.as_str()) {
                            println!(
                                "note: known styles are {}",
                                WRITING_STYLES.join(", ")
                            );
                        }
                        details.style = value;
                    }
                    DetailField::Goals => details.goals = value,
                }
            }
            ReplCommand::Outline => {
                self.session.navigate(Step::Structure)?;
                let gateway = self.gateway()?;
                let details = self.session.details().clone();
                self.session.generate_outline(&gateway, details).await?;
                print!("{}", self.session.view());
            }
            ReplCommand::Add => {
                self.session.navigate(Step::Structure)?;
                let number = self.session.add_chapter()?;
                println!("added chapter {number}");
            }
            ReplCommand::Delete { number } => {
                self.session.navigate(Step::Structure)?;
                let (removed, renumbering) = self.session.delete_chapter(number, self.policy)?;
                self.renumber_drafts(&renumbering);
                println!("deleted chapter {number}: {}", removed.title);
            }
            ReplCommand::Move { number, direction } => {
                self.session.navigate(Step::Structure)?;
                let renumbering = self.session.move_chapter(number, direction, self.policy)?;
                if renumbering.is_empty() {
                    println!("chapter {number} cannot move further");
                }
                self.renumber_drafts(&renumbering);
            }
            ReplCommand::Reorder => {
                self.session.navigate(Step::Structure)?;
                let renumbering = self.session.reorder_chapters(self.policy)?;
                self.renumber_drafts(&renumbering);
                println!("chapters renumbered");
            }
            ReplCommand::Policy { policy } => {
                self.policy = policy;
                println!("content policy: {policy:?}");
            }
            ReplCommand::Title { number, title } => {
                self.session.update_chapter(number, Some(&title.join(" ")), None)?;
            }
            ReplCommand::Describe { number, text } => {
                self.session.update_chapter(number, None, Some(&text.join(" ")))?;
            }
            ReplCommand::RegenDesc { number } => {
                let gateway = self.gateway()?;
                let description = self
                    .session
                    .regenerate_description(&gateway, number, None)
                    .await?;
                println!("{description}");
            }
            ReplCommand::Select { number } => {
                self.session.navigate(Step::Content)?;
                self.session.select_chapter(number)?;
                print!("{}", self.session.view());
            }
            ReplCommand::Points { number, text } => {
                self.draft(number).key_points = text.join(" ");
            }
            ReplCommand::Custom { number, text } => {
                let text = text.join(" ");
                self.draft(number).custom_content = (!text.is_empty()).then_some(text);
            }
            ReplCommand::Words { number, words } => {
                let length = ChapterLength::Words(words);
                length.validate()?;
                self.draft(number).length = length;
            }
            ReplCommand::Length { number, length } => {
                self.draft(number).length = ChapterLength::Bucket(length);
            }
            ReplCommand::Tone { number, tone } => {
                self.draft(number).tone = Some(tone);
            }
            ReplCommand::Examples { number, kinds } => {
                self.draft(number).examples = kinds;
            }
            ReplCommand::Generate { number } => {
                self.session.navigate(Step::Content)?;
                let gateway = self.gateway()?;
                let request = self.drafts.get(&number).cloned().unwrap_or_default();
                let generated = self
                    .session
                    .generate_chapter(&gateway, number, &request)
                    .await?;
                println!(
                    "generated chapter {number}: {} ({} words)",
                    generated.title,
                    generated.content.split_whitespace().count()
                );
            }
            ReplCommand::SaveContent { number, file } => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("read: {}", file.display()))?;
                self.session.save_chapter_content(number, &content)?;
                println!("chapter {number} updated");
            }
            ReplCommand::Clear { number } => {
                self.session.clear_chapter(number)?;
                println!("chapter {number} cleared");
            }
            ReplCommand::Edit {
                number,
                operation,
                section,
            } => {
                let gateway = self.gateway()?;
                let section = section.join(" ");
                self.session
                    .apply_edit(&gateway, number, operation, Some(section.as_str()))
                    .await?;
                println!("chapter {number} revised");
            }
            ReplCommand::Style {
                number,
                style,
                format,
            } => {
                let gateway = self.gateway()?;
                self.session
                    .apply_style(&gateway, number, style, format)
                    .await?;
                println!("chapter {number} restyled");
            }
            ReplCommand::Copy { number } => {
                self.session.copy_to_final_book(number)?;
                println!("chapter {number} copied to the final book");
            }
            ReplCommand::Export {
                mode,
                format,
                out_dir,
                force,
                no_metadata,
                no_toc,
            } => {
                self.session.navigate(Step::Export)?;
                let options = ExportOptions {
                    metadata: !no_metadata,
                    table_of_contents: !no_toc,
                    ..ExportOptions::default()
                };
                let artifact =
                    self.session
                        .export(mode, format, &options, Utc::now().date_naive())?;
                let dir = out_dir.unwrap_or_else(|| self.export_dir.clone());
                let out = export::write_artifact(&dir, &artifact, force)?;
                println!("wrote {} ({})", out.display(), artifact.mime_type);
            }
            ReplCommand::Save { file, force } => {
                let project = self.session.to_project(Utc::now())?;
                let path = file.unwrap_or_else(|| {
                    PathBuf::from(project::default_file_name(&project.book_structure.title))
                });
                project.save(&path, force)?;
                println!("saved {}", path.display());
            }
            ReplCommand::Load { file } => {
                self.load(&file)?;
                print!("{}", self.session.view());
            }
            ReplCommand::Stats => print!("{}", self.session.stats()?.render()),
            ReplCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    pub fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        let project = ProjectFile::load(path)?;
        self.session.load_project(project);
        self.drafts.clear();
        println!("loaded {}", path.display());
        Ok(())
    }
}

enum LineSource {
    Editor(DefaultEditor),
    Plain(std::io::StdinLock<'static>),
}

impl LineSource {
    fn detect() -> anyhow::Result<Self> {
        if std::io::stdin().is_terminal() {
            let editor = DefaultEditor::new().context("init line editor")?;
            return Ok(Self::Editor(editor));
        }
        Ok(Self::Plain(std::io::stdin().lock()))
    }

    fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        match self {
            Self::Editor(editor) => match editor.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        editor
                            .add_history_entry(line.as_str())
                            .context("add history entry")?;
                    }
                    Ok(Some(line))
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    Ok(Some(String::new()))
                }
                Err(ReadlineError::Eof) => Ok(None),
                Err(err) => Err(err).context("read line"),
            },
            Self::Plain(stdin) => {
                let mut line = String::new();
                let read = stdin.read_line(&mut line).context("read stdin")?;
                Ok((read > 0).then_some(line))
            }
        }
    }
}

pub async fn run(args: SessionArgs) -> anyhow::Result<()> {
    let settings = ProviderSettings::from_args(&args.provider).context("provider settings")?;
    let mut repl = Repl::new(Session::new(settings));
    if let Some(project) = args.project.as_deref() {
        repl.load(Path::new(project))?;
    }

    let mut input = LineSource::detect()?;
    println!("BookCreator. Type 'help' for commands, 'quit' to exit.");
    print!("{}", repl.session().view());

    while let Some(line) = input.read_line()? {
        match repl.execute(&line).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => {
                println!("error: {err:#}");
                if let Some(raw) = err.downcast_ref::<Error>().and_then(Error::raw_response) {
                    println!("raw provider response:\n{raw}");
                }
            }
        }
    }
    Ok(())
}
