//!
//! src/username.rs
//!
//! Maps a character description onto a genre bucket and builds a
//! username out of that bucket's vocabulary
//!

use rand::{rngs::SmallRng, Rng, SeedableRng};

pub const MIN_USERNAME_LEN: usize = 12;
pub const MAX_USERNAME_LEN: usize = 16;

const FALLBACK_ADJECTIVES: &[&str] = &["weird", "alt"];
const FALLBACK_NOUNS: &[&str] = &["bot", "icon"];

/// Genre vocabularies, matched in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreBucket {
    Pop,
    Emo,
    Grunge,
    Hyperpop,
    Ethereal,
    Darkwave
}

impl GenreBucket {
    pub const ALL: [GenreBucket; 6] = [
        GenreBucket::Pop,
        GenreBucket::Emo,
        GenreBucket::Grunge,
        GenreBucket::Hyperpop,
        GenreBucket::Ethereal,
        GenreBucket::Darkwave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenreBucket::Pop      => "pop",
            GenreBucket::Emo      => "emo",
            GenreBucket::Grunge   => "grunge",
            GenreBucket::Hyperpop => "hyperpop",
            GenreBucket::Ethereal => "ethereal",
            GenreBucket::Darkwave => "darkwave"
        }
    }

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            GenreBucket::Pop      => &["pop", "bubblegum"],
            GenreBucket::Emo      => &["emo", "gloomy"],
            GenreBucket::Grunge   => &["grunge", "punk"],
            GenreBucket::Hyperpop => &["hyperpop"],
            GenreBucket::Ethereal => &["dreamy"],
            GenreBucket::Darkwave => &["goth", "vampire"]
        }
    }

    pub fn adjectives(self) -> &'static [&'static str] {
        match self {
            GenreBucket::Pop      => &["pop", "shiny"],
            GenreBucket::Emo      => &["sad", "moody"],
            GenreBucket::Grunge   => &["gritty", "fuzzy"],
            GenreBucket::Hyperpop => &["glitchy"],
            GenreBucket::Ethereal => &["ethereal"],
            GenreBucket::Darkwave => &["dark"]
        }
    }

    pub fn nouns(self) -> &'static [&'static str] {
        match self {
            GenreBucket::Pop      => &["princess", "idol"],
            GenreBucket::Emo      => &["ghost", "vamp"],
            GenreBucket::Grunge   => &["rat", "gremlin"],
            GenreBucket::Hyperpop => &["bot", "sprite"],
            GenreBucket::Ethereal => &["angel"],
            GenreBucket::Darkwave => &["demon", "fang"]
        }
    }

    /// First bucket with a keyword inside the description, case-insensitive
    pub fn classify(description: &str) -> Option<GenreBucket> {
        let lowered = description.to_lowercase();
        Self::ALL.into_iter()
            .find(|b| b.keywords().iter().any(|k| lowered.contains(k)))
    }
}

/// Source of "pick one of n" decisions
pub trait Picker {
    /// Returns an index in `0..n`; n is never zero
    fn pick(&mut self, n: usize) -> usize;
}

/// Picker backed by any rand generator
pub struct RngPicker<R: Rng>(pub R);

impl<R: Rng> Picker for RngPicker<R> {
    fn pick(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }
}

fn choose<'a>(picker: &mut impl Picker, options: &[&'a str]) -> &'a str {
    options[picker.pick(options.len()) % options.len()]
}

pub fn generate_username_with(description: &str, picker: &mut impl Picker) -> String {
    let (adjectives, nouns) = match GenreBucket::classify(description) {
        Some(bucket) => (bucket.adjectives(), bucket.nouns()),
        None => (FALLBACK_ADJECTIVES, FALLBACK_NOUNS)
    };
    let adj  = choose(picker, adjectives);
    let noun = choose(picker, nouns);
    let suffix = picker.pick(100);

    let candidates = [
        format!("{adj}{noun}"),
        format!("{adj}_{noun}"),
        format!("{adj}{noun}{suffix}"),
    ];
    if let Some(name) = candidates.into_iter()
        .find(|c| (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&c.chars().count())) {
        return name;
    }

    // nothing fits, hard cut which may land under the minimum
    format!("{adj}{noun}").chars().take(MAX_USERNAME_LEN).collect()
}

pub fn generate_username(description: &str) -> String {
    let mut picker = RngPicker(SmallRng::from_entropy());
    generate_username_with(description, &mut picker)
}
