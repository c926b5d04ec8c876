//! Canned replies for short, predictable inputs.
//!
//! Greetings, thanks and the like are answered from a table of trigger
//! patterns so they never cost a remote model call. The table is scanned in
//! order and the first pattern whose trigger hits wins, so more specific
//! patterns must be listed before broader ones.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::Rng;
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::conversation::ReplyOutcome;

const BUILTIN_TABLE: &str = include_str!("../data/local_responses.json");

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedResponse {
    pub text: String,
    pub weight: f64,
}

impl WeightedResponse {
    pub fn new(text: impl Into<String>, weight: f64) -> Result<Self> {
        if !weight.is_finite() || weight <= 0.0 {
            bail!("response weight must be a positive number, got {}", weight);
        }
        Ok(Self {
            text: text.into(),
            weight,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TriggerPattern {
    pub id: String,
    pub triggers: Vec<String>,
    pub max_words: Option<usize>,
    pub responses: Vec<WeightedResponse>,
    matchers: Vec<Regex>,
}

impl TriggerPattern {
    pub fn new(
        id: impl Into<String>,
        triggers: Vec<String>,
        max_words: Option<usize>,
        responses: Vec<WeightedResponse>,
    ) -> Result<Self> {
        let id = id.into();
        let triggers: Vec<String> = triggers
            .into_iter()
            .map(|trigger| trigger.trim().to_string())
            .filter(|trigger| !trigger.is_empty())
            .collect();

        if triggers.is_empty() {
            bail!("pattern '{}' has no triggers", id);
        }
        if responses.is_empty() {
            bail!("pattern '{}' has no responses", id);
        }
        if max_words == Some(0) {
            bail!("pattern '{}' has maxWords of 0", id);
        }

        let matchers = triggers
            .iter()
            .map(|trigger| {
                Regex::new(&format!(r"(?i)\b{}\b", regex_lite::escape(trigger)))
                    .with_context(|| format!("invalid trigger '{}' in pattern '{}'", trigger, id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            triggers,
            max_words,
            responses,
            matchers,
        })
    }

    fn is_eligible(&self, word_count: usize) -> bool {
        self.max_words.map_or(true, |max| word_count <= max)
    }

    fn hits(&self, normalized: &str) -> bool {
        self.matchers.iter().any(|re| re.is_match(normalized))
    }
}

/// Ordered, read-only table of trigger patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    patterns: Vec<TriggerPattern>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPattern {
    id: String,
    triggers: Vec<String>,
    #[serde(default)]
    max_words: Option<u64>,
    responses: Vec<RawResponse>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    text: String,
    #[serde(default)]
    weight: Option<f64>,
}

impl PatternTable {
    pub fn new(patterns: Vec<TriggerPattern>) -> Self {
        Self { patterns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_TABLE) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!("Built-in response table is invalid: {:#}", e);
                Self::empty()
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read response table from {:?}", path))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse response table {:?}", path))
    }

    /// Parse a `{"patterns": [...]}` document.
    ///
    /// Entries that do not describe a usable pattern are skipped with a
    /// warning; only a document without a `patterns` array is an error.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(raw).context("response table is not JSON")?;
        let Some(entries) = document.get("patterns").and_then(Value::as_array) else {
            bail!("response table has no 'patterns' array");
        };

        let mut patterns = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let raw: RawPattern = match serde_json::from_value(entry.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Skipping response pattern #{}: {}", index, e);
                    continue;
                }
            };
            match build_pattern(raw) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => tracing::warn!("Skipping response pattern #{}: {:#}", index, e),
            }
        }

        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[TriggerPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Answer `user_text` locally, or `None` when it should go to the model.
    pub fn find(&self, user_text: &str) -> Option<ReplyOutcome> {
        self.find_with_rng(user_text, &mut rand::rng())
    }

    pub fn find_with_rng<R: Rng + ?Sized>(
        &self,
        user_text: &str,
        rng: &mut R,
    ) -> Option<ReplyOutcome> {
        let normalized = normalize(user_text);
        if normalized.is_empty() {
            return None;
        }
        let words = word_count(&normalized);

        let pattern = self
            .patterns
            .iter()
            .filter(|pattern| pattern.is_eligible(words))
            .find(|pattern| pattern.hits(&normalized))?;

        let text = pick_weighted(&pattern.responses, rng)?;
        Some(ReplyOutcome::local(pattern.id.clone(), text))
    }
}

fn build_pattern(raw: RawPattern) -> Result<TriggerPattern> {
    let mut responses = Vec::with_capacity(raw.responses.len());
    for response in raw.responses {
        match WeightedResponse::new(response.text, response.weight.unwrap_or(1.0)) {
            Ok(response) => responses.push(response),
            Err(e) => tracing::warn!("Dropping response in pattern '{}': {}", raw.id, e),
        }
    }

    let max_words = raw
        .max_words
        .map(|max| usize::try_from(max).unwrap_or(usize::MAX));

    TriggerPattern::new(raw.id, raw.triggers, max_words, responses)
}

/// Lowercase, blank out everything but ASCII word characters, whitespace and
/// apostrophes, then trim.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '\'' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Roulette-wheel selection over `responses`.
pub fn pick_weighted<'a, R: Rng + ?Sized>(
    responses: &'a [WeightedResponse],
    rng: &mut R,
) -> Option<&'a str> {
    let total: f64 = responses.iter().map(|r| r.weight).sum();
    if responses.is_empty() || !total.is_finite() || total <= 0.0 {
        return None;
    }

    let mut roll = rng.random_range(0.0..total);
    for response in responses {
        roll -= response.weight;
        if roll <= 0.0 {
            return Some(&response.text);
        }
    }
    // float rounding can leave a sliver past the last weight
    responses.last().map(|r| r.text.as_str())
}
