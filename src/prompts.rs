//! Prompt templates. Every builder is a pure function of its inputs.

use std::fmt;

use crate::error::{Error, Result};
use crate::outline::{BookDetails, BookOutline, ChapterOutline};

pub const MIN_WORDS: u32 = 500;
pub const MAX_WORDS: u32 = 7000;
pub const DEFAULT_WORDS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterLength {
    Words(u32),
    Bucket(LengthBucket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LengthBucket {
    Short,
    Medium,
    Long,
}

impl Default for ChapterLength {
    fn default() -> Self {
        ChapterLength::Words(DEFAULT_WORDS)
    }
}

impl ChapterLength {
    pub fn validate(self) -> Result<()> {
        match self {
            ChapterLength::Words(words) if !(MIN_WORDS..=MAX_WORDS).contains(&words) => {
                Err(Error::validation(format!(
                    "chapter length must be between {MIN_WORDS} and {MAX_WORDS} words (got {words})"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ChapterLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterLength::Words(words) => write!(f, "{words} words"),
            ChapterLength::Bucket(LengthBucket::Short) => f.write_str("800-1200 words"),
            ChapterLength::Bucket(LengthBucket::Medium) => f.write_str("1500-2500 words"),
            ChapterLength::Bucket(LengthBucket::Long) => f.write_str("3000-4000 words"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Tone {
    Informal,
    Neutral,
    Formal,
    Academic,
    Conversational,
    Motivational,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tone::Informal => "Informal",
            Tone::Neutral => "Neutral",
            Tone::Formal => "Formal",
            Tone::Academic => "Academic",
            Tone::Conversational => "Conversational",
            Tone::Motivational => "Motivational",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExampleKind {
    CaseStudies,
    Anecdotes,
    Statistics,
    Quotes,
    PracticalExercises,
}

impl fmt::Display for ExampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExampleKind::CaseStudies => "Case studies",
            ExampleKind::Anecdotes => "Anecdotes",
            ExampleKind::Statistics => "Statistics",
            ExampleKind::Quotes => "Quotes",
            ExampleKind::PracticalExercises => "Practical exercises",
        };
        f.write_str(name)
    }
}

/// Options for generating one chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterRequest {
    pub key_points: String,
    pub custom_content: Option<String>,
    pub length: ChapterLength,
    pub tone: Option<Tone>,
    pub examples: Vec<ExampleKind>,
    /// Edited title to use (and save) instead of the outline's.
    pub title: Option<String>,
    /// Edited description to use (and save) instead of the outline's.
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EditOperation {
    ImproveReadability,
    AddExamples,
    ExpandSection,
    Condense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StyleOption {
    Current,
    MoreFormal,
    MoreInformal,
    MoreTechnical,
    MorePopular,
    MoreNarrative,
    MoreConcise,
}

impl fmt::Display for StyleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleOption::Current => "Keep the current style",
            StyleOption::MoreFormal => "More formal",
            StyleOption::MoreInformal => "More informal",
            StyleOption::MoreTechnical => "More technical",
            StyleOption::MorePopular => "More accessible to a general audience",
            StyleOption::MoreNarrative => "More narrative",
            StyleOption::MoreConcise => "More concise",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FormatOption {
    Current,
    MoreSubheadings,
    MoreParagraphs,
    MoreBulletLists,
    MoreTables,
    Academic,
}

impl fmt::Display for FormatOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatOption::Current => "Keep the current structure",
            FormatOption::MoreSubheadings => "More subheadings",
            FormatOption::MoreParagraphs => "More paragraphs",
            FormatOption::MoreBulletLists => "More bullet lists",
            FormatOption::MoreTables => "More tables",
            FormatOption::Academic => "Academic format",
        };
        f.write_str(name)
    }
}

pub fn outline_prompt(details: &BookDetails) -> String {
    format!(
        "As an expert editorial consultant, help me create a detailed structure for a non-fiction book with these characteristics:\n\
\n\
- Title: {title}\n\
- Main Theme: {theme}\n\
- Target Audience: {audience}\n\
- Writing Style: {style}\n\
- Book Goals: {goals}\n\
\n\
Please generate a complete structure including:\n\
1. A compelling introduction presenting the theme and book objectives\n\
2. 6-10 logically organized chapters, each with an engaging title and brief content description (3-5 sentences)\n\
3. A conclusion summarizing key points and leaving readers with meaningful reflections\n\
\n\
Format the response in JSON as follows:\n\
{{\n\
    \"title\": \"Book Title\",\n\
    \"introduction\": \"Introduction text...\",\n\
    \"chapters\": [\n\
        {{\n\
            \"number\": 1,\n\
            \"title\": \"Chapter 1 Title\",\n\
            \"description\": \"Chapter description...\"\n\
        }},\n\
        ...\n\
    ],\n\
    \"conclusion\": \"Conclusion text...\"\n\
}}\n",
        title = details.title,
        theme = details.theme,
        audience = details.audience,
        style = details.style,
        goals = details.goals,
    )
}

pub fn chapter_prompt(
    book: &BookOutline,
    chapter: &ChapterOutline,
    request: &ChapterRequest,
) -> String {
    let title = request.title.as_deref().unwrap_or(&chapter.title);
    let description = request
        .description
        .as_deref()
        .unwrap_or(&chapter.description);
    let key_points = if request.key_points.trim().is_empty() {
        "Use your creativity based on the chapter description."
    } else {
        request.key_points.trim()
    };

    let mut prompt = format!(
        "You are an expert non-fiction author. You are writing a chapter for the following book:\n\
\n\
- Book title: {book_title}\n\
- Main theme: {theme}\n\
- Target audience: {audience}\n\
- Writing style: {style}\n\
\n\
CHAPTER TO WRITE:\n\
- Number: {number}\n\
- Title: {title}\n\
- Description: {description}\n\
\n\
Key points to include:\n\
{key_points}\n",
        book_title = book.title,
        theme = book.theme,
        audience = book.audience,
        style = book.style,
        number = chapter.number,
    );

    if let Some(custom) = request
        .custom_content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        prompt.push_str(&format!(
            "\n\
Custom content to incorporate into the chapter:\n\
{custom}\n\
\n\
Please weave this custom content into the chapter organically, keeping the style consistent and fluent.\n"
        ));
    }

    prompt.push_str(&format!("\nApproximate length: {}\n", request.length));
    if let Some(tone) = request.tone {
        prompt.push_str(&format!("Tone: {tone}\n"));
    }
    if !request.examples.is_empty() {
        prompt.push_str("Make sure to include the following elements:\n");
        for example in &request.examples {
            prompt.push_str(&format!("- {example}\n"));
        }
    }

    prompt.push_str(
        "\n\
Write a complete, well-structured and engaging chapter. Include concrete examples, relevant references and, where appropriate, anecdotes to illustrate the concepts. Make sure the chapter keeps a style consistent with the rest of the book and connects logically to the previous and following chapters.\n\
\n\
Format the content with clear headings using Markdown syntax: ## for main sections and ### for subsections.\n",
    );
    prompt
}

pub fn description_prompt(book: &BookOutline, chapter_title: &str) -> String {
    format!(
        "You are an expert editorial consultant. Help write an engaging description for \
the chapter '{chapter_title}' of a book titled '{title}' on the theme '{theme}' \
for an audience of '{audience}' in {style} style.\n\
\n\
Write a concise description (3-5 sentences) that clearly explains what this chapter will cover.\n\
The description should be engaging and informative, fitting the book's overall context.\n\
Output only the description.\n",
        title = book.title,
        theme = book.theme,
        audience = book.audience,
        style = book.style,
    )
}

pub fn edit_prompt(operation: EditOperation, content: &str, section: Option<&str>) -> String {
    let directive = match operation {
        EditOperation::ImproveReadability => {
            "Improve the readability and clarity of this text, keeping all the information \
but making the language smoother and more accessible."
        }
        EditOperation::AddExamples => {
            "Add practical examples, case studies or realistic scenarios to this text to make it \
more concrete and applicable, keeping all the existing information."
        }
        EditOperation::ExpandSection => {
            "Expand and deepen this text with more details, explanations or context, \
keeping all the existing information."
        }
        EditOperation::Condense => {
            "Summarize and condense this text, keeping all the key points but reducing verbosity."
        }
    };

    let focus = match section.map(str::trim).filter(|s| !s.is_empty()) {
        Some(section) => format!("Work only on this section and output only its new version:\n{section}"),
        None => content.trim().to_owned(),
    };

    format!(
        "{directive}\n\
Keep the Markdown formatting. Output only the revised text.\n\
\n\
BEGIN_CHAPTER_TEXT\n\
{focus}\n\
END_CHAPTER_TEXT\n"
    )
}

pub fn style_prompt(style: StyleOption, format: FormatOption, content: &str) -> String {
    format!(
        "Reformat the following chapter, changing its style and format as indicated:\n\
\n\
Writing style: {style}\n\
Structure format: {format}\n\
\n\
Keep all the original information and content, but adapt the presentation and tone \
to the requested specifications. Make sure the result is well formatted in Markdown.\n\
Output only the reformatted chapter.\n\
\n\
BEGIN_CHAPTER_TEXT\n\
{content}\n\
END_CHAPTER_TEXT\n",
        content = content.trim(),
    )
}
