use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_STYLE: &str = "Informative";
pub const WRITING_STYLES: [&str; 5] = [
    "Informative",
    "Narrative",
    "Academic",
    "Persuasive",
    "Educational",
];

/// What the author supplies before an outline is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub theme: String,
    pub audience: String,
    pub style: String,
    pub goals: String,
}

impl Default for BookDetails {
    fn default() -> Self {
        Self {
            title: String::new(),
            theme: String::new(),
            audience: String::new(),
            style: DEFAULT_STYLE.to_owned(),
            goals: String::new(),
        }
    }
}

impl BookDetails {
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("title", &self.title),
            ("theme", &self.theme),
            ("target audience", &self.audience),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::validation(format!(
            "please fill in at least the title, theme, and target audience (missing: {})",
            missing.join(", ")
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterOutline {
    #[serde(default)]
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookOutline {
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub chapters: Vec<ChapterOutline>,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub goals: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

/// Chapter numbers that changed during a structural mutation, as `(old, new)` pairs.
///
/// A deleted chapter appears in `removed` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renumbering {
    pub removed: Option<u32>,
    pub moved: Vec<(u32, u32)>,
}

impl Renumbering {
    pub fn is_empty(&self) -> bool {
        self.removed.is_none() && self.moved.is_empty()
    }

    /// Re-keys `entries` so they follow their chapters; the deleted chapter's entry is dropped.
    pub fn apply<T>(&self, entries: &mut BTreeMap<u32, T>) {
        if let Some(removed) = self.removed {
            entries.remove(&removed);
        }
        let taken = self
            .moved
            .iter()
            .filter_map(|(old, new)| entries.remove(old).map(|entry| (*new, entry)))
            .collect::<Vec<_>>();
        entries.extend(taken);
    }
}

impl BookOutline {
    /// Caller-supplied metadata wins over whatever the model returned.
    pub fn apply_details(&mut self, details: &BookDetails) {
        self.theme = details.theme.clone();
        self.audience = details.audience.clone();
        self.style = details.style.clone();
        self.goals = details.goals.clone();
    }

    pub fn chapter(&self, number: u32) -> Option<&ChapterOutline> {
        self.chapters.iter().find(|c| c.number == number)
    }

    fn position(&self, number: u32) -> Option<usize> {
        self.chapters.iter().position(|c| c.number == number)
    }

    pub fn is_contiguous(&self) -> bool {
        self.chapters
            .iter()
            .enumerate()
            .all(|(idx, c)| c.number as usize == idx + 1)
    }

    pub fn add_chapter(&mut self) -> u32 {
        let number = self.chapters.len() as u32 + 1;
        self.chapters.push(ChapterOutline {
            number,
            title: format!("New Chapter {number}"),
            description: "Description of the new chapter...".to_owned(),
        });
        tracing::debug!(chapter = number, "add chapter");
        number
    }

    pub fn delete_chapter(&mut self, number: u32) -> Option<(ChapterOutline, Renumbering)> {
        let idx = self.position(number)?;
        let removed = self.chapters.remove(idx);
        let mut renumbering = self.reorder_all();
        renumbering.removed = Some(number);
        tracing::debug!(chapter = number, remaining = self.chapters.len(), "delete chapter");
        Some((removed, renumbering))
    }

    /// Swaps the chapter with its neighbour by position. Returns `None` for an
    /// unknown chapter and an empty renumbering when the move would cross a boundary.
    pub fn move_chapter(&mut self, number: u32, direction: Direction) -> Option<Renumbering> {
        let idx = self.position(number)?;
        let target = match direction {
            Direction::Up if idx > 0 => idx - 1,
            Direction::Down if idx + 1 < self.chapters.len() => idx + 1,
            _ => {
                tracing::debug!(chapter = number, ?direction, "move at boundary ignored");
                return Some(Renumbering::default());
            }
        };
        self.chapters.swap(idx, target);
        let renumbering = self.reorder_all();
        tracing::debug!(chapter = number, ?direction, "move chapter");
        Some(renumbering)
    }

    /// Renumbers by current position without changing the order.
    pub fn reorder_all(&mut self) -> Renumbering {
        let mut renumbering = Renumbering::default();
        for (idx, chapter) in self.chapters.iter_mut().enumerate() {
            let number = idx as u32 + 1;
            if chapter.number != number {
                renumbering.moved.push((chapter.number, number));
                chapter.number = number;
            }
        }
        renumbering
    }

    /// Empty values leave the field untouched. Returns whether the chapter exists.
    pub fn update_chapter(
        &mut self,
        number: u32,
        title: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        let Some(chapter) = self.chapters.iter_mut().find(|c| c.number == number) else {
            return false;
        };
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            chapter.title = title.to_owned();
        }
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            chapter.description = description.to_owned();
        }
        true
    }
}
