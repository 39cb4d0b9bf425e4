use crate::content::ContentStore;
use crate::outline::BookOutline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterProgress {
    pub number: u32,
    pub title: String,
    pub words: usize,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookStats {
    pub total_words: usize,
    pub chapters: Vec<ChapterProgress>,
    pub generated: usize,
    pub progress_percent: f64,
    pub missing: Vec<u32>,
}

impl BookStats {
    pub fn collect(outline: &BookOutline, contents: &ContentStore) -> Self {
        let chapters = outline
            .chapters
            .iter()
            .map(|chapter| {
                let generated = contents.get(chapter.number);
                ChapterProgress {
                    number: chapter.number,
                    title: chapter.title.clone(),
                    words: generated.map_or(0, |g| word_count(&g.content)),
                    generated: generated.is_some(),
                }
            })
            .collect::<Vec<_>>();

        let generated = chapters.iter().filter(|c| c.generated).count();
        let missing = chapters
            .iter()
            .filter(|c| !c.generated)
            .map(|c| c.number)
            .collect();
        let progress_percent = if chapters.is_empty() {
            0.0
        } else {
            generated as f64 * 100.0 / chapters.len() as f64
        };

        // Content left behind by deleted chapters still counts toward the book's length.
        let total_words = word_count(&outline.introduction)
            + word_count(&outline.conclusion)
            + contents.iter().map(|g| word_count(&g.content)).sum::<usize>();

        Self {
            total_words,
            chapters,
            generated,
            progress_percent,
            missing,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Total words: {}\nChapters generated: {}/{} ({:.0}%)\n",
            self.total_words,
            self.generated,
            self.chapters.len(),
            self.progress_percent
        );
        for chapter in &self.chapters {
            let status = if chapter.generated {
                format!("{} words", chapter.words)
            } else {
                "not generated".to_owned()
            };
            out.push_str(&format!(
                "  {:>2}. {} - {status}\n",
                chapter.number, chapter.title
            ));
        }
        if !self.missing.is_empty() {
            let missing = self
                .missing
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("Missing chapters: {missing}\n"));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterStats {
    pub words: usize,
    pub paragraphs: usize,
}

impl ChapterStats {
    pub fn of(content: &str) -> Self {
        Self {
            words: word_count(content),
            paragraphs: paragraph_count(content),
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Blocks of text separated by at least one blank line.
pub fn paragraph_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_paragraph = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            in_paragraph = false;
        } else if !in_paragraph {
            in_paragraph = true;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::content::{ChapterMetadata, GeneratedChapter};
    use crate::outline::ChapterOutline;

    #[test]
    fn counts_paragraphs_across_blank_lines() {
        let stats = ChapterStats::of("## Title\n\nOne two three.\nFour.\n\n\n  \nFive six.");
        assert_eq!(stats.words, 8);
        assert_eq!(stats.paragraphs, 3);
        assert_eq!(ChapterStats::of("").paragraphs, 0);
    }

    #[test]
    fn progress_reports_missing_chapters() {
        let outline = BookOutline {
            title: "T".to_owned(),
            introduction: "One two".to_owned(),
            chapters: (1..=4)
                .map(|number| ChapterOutline {
                    number,
                    title: format!("C{number}"),
                    description: String::new(),
                })
                .collect(),
            conclusion: "Three".to_owned(),
            theme: String::new(),
            audience: String::new(),
            style: String::new(),
            goals: String::new(),
        };
        let mut contents = ContentStore::new();
        contents.insert(GeneratedChapter {
            number: 3,
            title: "C3".to_owned(),
            content: "a b c d".to_owned(),
            generated_at: Utc::now(),
            last_edited: None,
            metadata: ChapterMetadata::default(),
        });

        let stats = BookStats::collect(&outline, &contents);

        assert_eq!(stats.total_words, 7);
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.missing, vec![1, 2, 4]);
        assert!((stats.progress_percent - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.chapters[2].words, 4);
        let rendered = stats.render();
        assert!(rendered.contains("Chapters generated: 1/4 (25%)"));
        assert!(rendered.contains("Missing chapters: 1, 2, 4"));
    }
}
