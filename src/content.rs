use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::outline::Renumbering;

/// Options the chapter was generated with. Which fields are set depends on
/// how the chapter was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default)]
    pub key_points: String,
    #[serde(default)]
    pub custom_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedChapter {
    pub number: u32,
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub generated_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    pub last_edited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: ChapterMetadata,
}

/// Generated prose keyed by chapter number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentStore {
    chapters: BTreeMap<u32, GeneratedChapter>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.chapters.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&GeneratedChapter> {
        self.chapters.get(&number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut GeneratedChapter> {
        self.chapters.get_mut(&number)
    }

    pub fn insert(&mut self, chapter: GeneratedChapter) -> Option<GeneratedChapter> {
        self.chapters.insert(chapter.number, chapter)
    }

    pub fn remove(&mut self, number: u32) -> Option<GeneratedChapter> {
        self.chapters.remove(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedChapter> {
        self.chapters.values()
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.chapters.keys().copied().collect()
    }

    /// Only the mirrored title changes; content stays as generated or edited.
    pub fn set_title(&mut self, number: u32, title: &str) -> bool {
        match self.chapters.get_mut(&number) {
            Some(chapter) => {
                chapter.title = title.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn apply_renumbering(&mut self, renumbering: &Renumbering) {
        renumbering.apply(&mut self.chapters);
        for (number, chapter) in &mut self.chapters {
            chapter.number = *number;
        }
    }
}

impl Serialize for ContentStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.chapters.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, GeneratedChapter>::deserialize(deserializer)?;
        let mut chapters = BTreeMap::new();
        for (key, mut chapter) in raw {
            let number = parse_chapter_key(&key).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid chapter key: {key:?}"))
            })?;
            // The map key is authoritative.
            if chapter.number != number {
                tracing::warn!(
                    key = number,
                    stored = chapter.number,
                    "chapter number disagrees with its key"
                );
                chapter.number = number;
            }
            chapters.insert(number, chapter);
        }
        Ok(Self { chapters })
    }
}

/// Accepts `"3"` as well as the older `"chapter_3"` form.
fn parse_chapter_key(key: &str) -> Option<u32> {
    let digits = key.strip_prefix("chapter_").unwrap_or(key);
    digits.trim().parse().ok()
}

/// RFC 3339 timestamps, plus the zone-less `YYYY-MM-DD HH:MM:SS` stamps found in
/// older project files (read as UTC).
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}"))),
            None => Ok(None),
        }
    }
}

/// A chapter promoted into the final book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedChapter {
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub copied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompiledBookSelection {
    chapters: BTreeMap<u32, SelectedChapter>,
}

impl CompiledBookSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.chapters.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&SelectedChapter> {
        self.chapters.get(&number)
    }

    pub fn promote(&mut self, number: u32, chapter: &GeneratedChapter, copied_at: DateTime<Utc>) {
        self.chapters.insert(
            number,
            SelectedChapter {
                title: chapter.title.clone(),
                content: chapter.content.clone(),
                copied_at,
            },
        );
    }

    /// Ascending chapter order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SelectedChapter)> {
        self.chapters.iter().map(|(number, chapter)| (*number, chapter))
    }

    pub fn apply_renumbering(&mut self, renumbering: &Renumbering) {
        renumbering.apply(&mut self.chapters);
    }
}
