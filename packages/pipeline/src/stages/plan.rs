//! Narrative plan inputs and checks for Stage 3.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::generation::json_extract::extract_json;
use crate::generation::prompt::{SCOPE_LABEL, SUBJECT_LABEL};
use crate::generation::{ContractId, ContractValidator};
use crate::models::NarrativePlan;

/// Most sections the plan contract allows.
pub const MAX_BEATS: usize = 8;

/// Key under which the plan prompt lists chapter summaries.
const SUMMARIES_KEY: &str = "περιλήψεις_κεφαλαίων";

pub fn chapter_key(index: usize) -> String {
    format!("kefalaio_{index}")
}

/// Scope and subject articles of a Part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntroLines {
    pub scope: Option<String>,
    pub subject: Option<String>,
}

impl IntroLines {
    pub fn is_empty(&self) -> bool {
        self.scope.is_none() && self.subject.is_none()
    }

    /// Labelled lines for prompts that take plain text.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(scope) = &self.scope {
            lines.push(format!("{SCOPE_LABEL}{scope}"));
        }
        if let Some(subject) = &self.subject {
            lines.push(format!("{SUBJECT_LABEL}{subject}"));
        }
        lines
    }
}

/// Chapter summaries keyed `kefalaio_{i}` in Part order.
#[derive(Debug, Clone, Default)]
pub struct KeyedChapters {
    entries: BTreeMap<String, String>,
    order: Vec<String>,
}

impl KeyedChapters {
    pub fn new<'s>(summaries: impl IntoIterator<Item = &'s str>) -> Self {
        let mut keyed = Self::default();
        for (i, summary) in summaries.into_iter().enumerate() {
            let key = chapter_key(i);
            keyed.order.push(key.clone());
            keyed.entries.insert(key, summary.to_string());
        }
        keyed
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.order.iter().filter_map(|k| self.get(k))
    }
}

/// Input object for the planning prompt.
pub fn plan_input(chapters: &KeyedChapters, intro: &IntroLines) -> Value {
    let summaries: Map<String, Value> = chapters
        .keys()
        .iter()
        .filter_map(|k| chapters.get(k).map(|t| (k.clone(), Value::String(t.to_string()))))
        .collect();

    let mut input = Map::new();
    input.insert(SUMMARIES_KEY.to_string(), Value::Object(summaries));
    if let Some(scope) = &intro.scope {
        input.insert("skopos".to_string(), Value::String(scope.clone()));
    }
    if let Some(subject) = &intro.subject {
        input.insert("antikeimeno".to_string(), Value::String(subject.clone()));
    }
    Value::Object(input)
}

/// Inclusive range of beats to ask for with `chapters` chapters.
pub fn beat_bounds(chapters: usize) -> (usize, usize) {
    let max = chapters.clamp(1, MAX_BEATS);
    let min = if chapters > 1 {
        (chapters / 3).max(2).min(max)
    } else {
        1
    };
    (min, max)
}

/// Reference problems in a plan object.
///
/// Numeric chapter references and sections whose every reference is
/// unknown are violations; a section with only some unknown references
/// passes and is cleaned up by [`drop_unknown_references`].
pub fn reference_violations(plan: &Value, allowed: &[String]) -> Vec<String> {
    let Some(sections) = plan.get("narrative_sections").and_then(Value::as_array) else {
        return vec!["narrative_sections must be a non-empty list".to_string()];
    };
    if sections.is_empty() {
        return vec!["narrative_sections must be a non-empty list".to_string()];
    }

    let mut violations = Vec::new();
    for (idx, section) in sections.iter().enumerate() {
        let Some(references) = section.get("source_chapters").and_then(Value::as_array) else {
            violations.push(format!("section {idx}: source_chapters is not a list"));
            continue;
        };
        let mut keys = Vec::new();
        for reference in references {
            match reference {
                Value::String(key) => keys.push(key.as_str()),
                Value::Number(n) => violations.push(format!(
                    "section {idx}: numeric chapter reference {n}, use the form 'kefalaio_N'"
                )),
                other => violations.push(format!(
                    "section {idx}: invalid chapter reference {other}"
                )),
            }
        }
        let unknown: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|k| !allowed.iter().any(|a| a == k))
            .collect();
        if !unknown.is_empty() && unknown.len() == keys.len() {
            violations.push(format!(
                "section {idx}: references only unknown chapter keys {unknown:?}"
            ));
        }
    }
    violations
}

/// Contract and reference violations of raw planner output.
pub fn plan_violations(contracts: &ContractValidator, output: &str, allowed: &[String]) -> Vec<String> {
    let value = match extract_json(output) {
        Ok(value) => value,
        Err(e) => return vec![e.to_string()],
    };
    let mut violations = contracts.violations(ContractId::NarrativePlan, &value);
    violations.extend(reference_violations(&value, allowed));
    violations.extend(beat_count_violation(&value, allowed.len()));
    violations
}

/// Section count outside [`beat_bounds`] for `chapters` chapters.
///
/// A missing or empty section list is left to [`reference_violations`].
pub fn beat_count_violation(plan: &Value, chapters: usize) -> Option<String> {
    let count = plan
        .get("narrative_sections")
        .and_then(Value::as_array)
        .map(Vec::len)
        .filter(|n| *n > 0)?;
    let (min, max) = beat_bounds(chapters);
    (count < min || count > max)
        .then(|| format!("plan has {count} sections, expected {min} to {max}"))
}

/// Remove references to chapters that do not exist.
///
/// Sections left with no reference are dropped.
pub fn drop_unknown_references(mut plan: NarrativePlan, allowed: &[String]) -> NarrativePlan {
    for (idx, section) in plan.narrative_sections.iter_mut().enumerate() {
        let (known, unknown): (Vec<String>, Vec<String>) = section
            .source_chapters
            .drain(..)
            .partition(|k| allowed.contains(k));
        if !unknown.is_empty() {
            warn!(section = idx, unknown = ?unknown, "ignoring unknown chapter keys in plan");
        }
        section.source_chapters = known;
    }
    plan.narrative_sections
        .retain(|section| !section.source_chapters.is_empty());
    plan
}

/// Input object for synthesizing beat `index`.
pub fn beat_input(plan: &NarrativePlan, index: usize, chapters: &KeyedChapters) -> Value {
    let Some(beat) = plan.narrative_sections.get(index) else {
        return Value::Null;
    };
    let texts: Vec<&str> = beat
        .source_chapters
        .iter()
        .filter_map(|k| chapters.get(k))
        .collect();
    json!({
        "narrative_plan": plan,
        "current_beat_index": index,
        "current_beat_title": beat.section_title,
        "current_beat_role": beat.section_role,
        "source_chapter_texts": texts,
    })
}
