//! Story request and story text types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ports::StoryError;

/// Age range of the child the story is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChildAge {
    #[serde(rename = "3–5")]
    ThreeToFive,
    #[default]
    #[serde(rename = "5–8")]
    FiveToEight,
    #[serde(rename = "8–10")]
    EightToTen,
}

impl ChildAge {
    /// All selectable age ranges, youngest first.
    pub const ALL: [Self; 3] = [Self::ThreeToFive, Self::FiveToEight, Self::EightToTen];

    /// Label sent to the story service (en-dash separated).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ThreeToFive => "3–5",
            Self::FiveToEight => "5–8",
            Self::EightToTen => "8–10",
        }
    }
}

impl fmt::Display for ChildAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChildAge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_range(s);
        Self::ALL
            .into_iter()
            .find(|age| age.label() == normalized)
            .ok_or_else(|| format!("unknown age range '{s}' (expected 3-5, 5-8 or 8-10)"))
    }
}

/// Approximate read-aloud length of the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StoryLength {
    #[default]
    #[serde(rename = "5–10 minutes")]
    Short,
    #[serde(rename = "15–30 minutes")]
    Medium,
    #[serde(rename = "30–60 minutes")]
    Long,
}

impl StoryLength {
    /// All selectable lengths, shortest first.
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Label sent to the story service.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Short => "5–10 minutes",
            Self::Medium => "15–30 minutes",
            Self::Long => "30–60 minutes",
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StoryLength {
    type Err = String;

    /// Accepts the full label ("15-30 minutes"), the bare range ("15-30")
    /// or the variant name ("medium").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_range(s);
        let bare = normalized.trim_end_matches("minutes").trim();
        Self::ALL
            .into_iter()
            .find(|length| {
                let label = length.label();
                label == normalized
                    || label.trim_end_matches("minutes").trim() == bare
                    || format!("{length:?}").eq_ignore_ascii_case(bare)
            })
            .ok_or_else(|| {
                format!("unknown story length '{s}' (expected 5-10, 15-30 or 30-60 minutes)")
            })
    }
}

/// Replace ASCII hyphens with the en-dash used in service labels.
fn normalize_range(s: &str) -> String {
    s.trim().replace('-', "–")
}

/// A request for a newly generated story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    /// Free-form idea: a theme, a character's name, a setting.
    pub prompt: String,
    pub child_age: ChildAge,
    pub story_length: StoryLength,
}

impl StoryRequest {
    pub fn new(prompt: impl Into<String>, child_age: ChildAge, story_length: StoryLength) -> Self {
        Self {
            prompt: prompt.into(),
            child_age,
            story_length,
        }
    }

    /// Reject prompts that are empty after trimming.
    pub fn validate(&self) -> Result<(), StoryError> {
        if self.prompt.trim().is_empty() {
            return Err(StoryError::EmptyPrompt);
        }
        Ok(())
    }
}

/// Generated story text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    text: String,
}

impl Story {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whitespace-separated words, in reading order.
    ///
    /// The highlight cursor indexes into exactly this sequence.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words().count()
    }
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
