use clap::{Args, Parser, Subcommand};

use crate::config::{
    ANTHROPIC_DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECS,
    OPENAI_DEFAULT_BASE_URL, Provider,
};
use crate::export::{ExportFormat, ExportMode};
use crate::outline::DEFAULT_STYLE;
use crate::prompts::{ExampleKind, LengthBucket, Tone};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive wizard: configure, outline, write, export.
    Session(SessionArgs),
    /// Generate a book outline into a new project file.
    Outline(OutlineArgs),
    /// Generate one chapter into an existing project file.
    Chapter(ChapterArgs),
    /// Compile a project file into a Markdown or text document.
    Export(ExportArgs),
    /// Word counts and progress for a project file.
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    /// Text-generation provider.
    #[arg(long, value_enum, default_value_t = Provider::Openai)]
    pub provider: Provider,

    /// Model identifier (defaults to the provider's first known model).
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI API base URL.
    #[arg(long, default_value = OPENAI_DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Anthropic API base URL.
    #[arg(long, default_value = ANTHROPIC_DEFAULT_BASE_URL)]
    pub anthropic_base_url: String,

    /// Maximum output tokens per request.
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// HTTP request timeout.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl Default for ProviderArgs {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            model: None,
            openai_base_url: OPENAI_DEFAULT_BASE_URL.to_owned(),
            anthropic_base_url: ANTHROPIC_DEFAULT_BASE_URL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Project file to load at startup.
    #[arg(long)]
    pub project: Option<String>,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Debug, Args)]
pub struct OutlineArgs {
    #[arg(long)]
    pub title: String,

    /// Main theme of the book.
    #[arg(long)]
    pub theme: String,

    /// Target audience.
    #[arg(long)]
    pub audience: String,

    /// Writing style (Informative, Narrative, Academic, Persuasive, Educational).
    #[arg(long, default_value = DEFAULT_STYLE)]
    pub style: String,

    /// What the book should achieve.
    #[arg(long, default_value = "")]
    pub goals: String,

    /// Output project file (default: `BookCreator_<Title>.json`).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite an existing project file.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    /// Project file (updated in place).
    #[arg(long)]
    pub project: String,

    /// Chapter number from the outline.
    #[arg(long)]
    pub number: u32,

    /// Key points the chapter must cover.
    #[arg(long, default_value = "")]
    pub key_points: String,

    /// Text to weave into the chapter.
    #[arg(long)]
    pub custom_content: Option<String>,

    /// Target length in words (500-7000).
    #[arg(long, conflicts_with = "length")]
    pub words: Option<u32>,

    /// Coarse target length.
    #[arg(long, value_enum)]
    pub length: Option<LengthBucket>,

    #[arg(long, value_enum)]
    pub tone: Option<Tone>,

    /// Kind of example to include (repeatable).
    #[arg(long = "example", value_enum)]
    pub examples: Vec<ExampleKind>,

    /// New chapter title, saved to the outline.
    #[arg(long)]
    pub title: Option<String>,

    /// New chapter description, saved to the outline.
    #[arg(long)]
    pub description: Option<String>,

    /// Also copy the chapter into the final book.
    #[arg(long)]
    pub copy: bool,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Project file to export.
    #[arg(long)]
    pub project: String,

    #[arg(long, value_enum, default_value_t = ExportMode::Full)]
    pub mode: ExportMode,

    #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
    pub format: ExportFormat,

    /// Directory the document is written to.
    #[arg(long, default_value = ".")]
    pub out_dir: String,

    /// Overwrite an existing document.
    #[arg(long)]
    pub force: bool,

    /// Leave out the YAML front matter.
    #[arg(long)]
    pub no_metadata: bool,

    /// Leave out the table of contents.
    #[arg(long)]
    pub no_toc: bool,

    #[arg(long)]
    pub no_introduction: bool,

    #[arg(long)]
    pub no_conclusion: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Project file to inspect.
    #[arg(long)]
    pub project: String,
}
