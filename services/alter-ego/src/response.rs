//!
//! src/response.rs
//!
//! Pulls the description and image sections out of the generator's
//! free text. Missing sections come back empty, never as errors.
//!

use std::sync::LazyLock;

use regex::Regex;

pub const DESCRIPTION_MARKER: &str = "### DESCRIPTION";
pub const IMAGE_MARKER: &str = "### IMAGE";

// description only counts when the image marker follows it
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)### DESCRIPTION\s*(.+?)\s*### IMAGE")
        .expect("description pattern compiles")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)### IMAGE\s*(.+)").expect("image pattern compiles")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterSections {
    pub description: String,
    pub image_directive: String
}

impl CharacterSections {
    /// Both sections were found; anything less is a degraded parse
    pub fn is_complete(&self) -> bool {
        !self.description.is_empty() && !self.image_directive.is_empty()
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

pub fn parse_generator_response(text: &str) -> CharacterSections {
    CharacterSections {
        description: capture(&DESCRIPTION_RE, text),
        image_directive: capture(&IMAGE_RE, text)
    }
}
