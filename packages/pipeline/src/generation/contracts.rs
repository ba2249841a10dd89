//! Named output contracts and their validators.

use std::collections::HashMap;

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::{PipelineError, Result};
use crate::generation::json_extract::{clean_raw_text, extract_json};

/// Identifier of a JSON output contract.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractId {
    LawModification,
    NewProvision,
    ChapterSummary,
    PartSummary,
    NarrativePlan,
    Paragraph,
}

impl ContractId {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    fn schema_source(self) -> &'static str {
        match self {
            Self::LawModification => include_str!("../../contracts/law_modification.json"),
            Self::NewProvision => include_str!("../../contracts/new_provision.json"),
            Self::ChapterSummary => include_str!("../../contracts/chapter_summary.json"),
            Self::PartSummary => include_str!("../../contracts/part_summary.json"),
            Self::NarrativePlan => include_str!("../../contracts/narrative_plan.json"),
            Self::Paragraph => include_str!("../../contracts/paragraph.json"),
        }
    }

    /// Properties the contract declares at its top level.
    fn allowed_keys(self) -> &'static [&'static str] {
        match self {
            Self::LawModification => &[
                "law_reference",
                "article_number",
                "change_type",
                "major_change_summary",
                "key_themes",
            ],
            Self::NewProvision => &[
                "article_title",
                "provision_type",
                "core_provision_summary",
                "key_themes",
            ],
            Self::ChapterSummary | Self::PartSummary => &["summary"],
            Self::NarrativePlan => &[
                "overall_narrative_arc",
                "protagonist",
                "problem",
                "narrative_sections",
            ],
            Self::Paragraph => &["paragraph"],
        }
    }
}

/// Longest summary the record contracts accept.
pub const MAX_RECORD_SUMMARY_CHARS: usize = 550;
pub const MAX_KEY_THEMES: usize = 3;

/// Compiled validators for every contract.
pub struct ContractValidator {
    validators: HashMap<ContractId, Validator>,
}

impl ContractValidator {
    pub fn new() -> Result<Self> {
        let mut validators = HashMap::new();
        for id in ContractId::iter() {
            let schema: Value = serde_json::from_str(id.schema_source())
                .map_err(|e| PipelineError::SchemaLoad(format!("{id}: {e}")))?;
            let validator = Validator::new(&schema)
                .map_err(|e| PipelineError::SchemaLoad(format!("failed to compile {id}: {e}")))?;
            validators.insert(id, validator);
        }
        Ok(Self { validators })
    }

    /// Violations of `value` against the contract; empty means valid.
    pub fn violations(&self, id: ContractId, value: &Value) -> Vec<String> {
        let Some(validator) = self.validators.get(&id) else {
            return vec![format!("unknown contract {id}")];
        };
        validator
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect()
    }

    /// Extract JSON from raw output and validate it.
    pub fn check(&self, id: ContractId, output: &str) -> Vec<String> {
        match extract_json(output) {
            Ok(value) => self.violations(id, &value),
            Err(e) => vec![e.to_string()],
        }
    }

    /// Strict parse of output that already passed [`Self::check`].
    pub fn parse<T: DeserializeOwned>(&self, id: ContractId, output: &str) -> Result<T> {
        let value = extract_json(output)?;
        let violations = self.violations(id, &value);
        if !violations.is_empty() {
            return Err(PipelineError::LlmResponseParse(violations.join(", ")));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Looser reading of output that failed its contract.
///
/// Unknown keys are dropped, `key_themes` is cut to three entries and record
/// summaries are cut to their maximum length before deserializing. Enum
/// values and required keys still have to be right.
pub fn parse_loose<T: DeserializeOwned>(id: ContractId, output: &str) -> Result<T> {
    let mut value = extract_json(output)?;
    let Some(object) = value.as_object_mut() else {
        return Err(PipelineError::LlmResponseParse(format!(
            "{id}: expected a JSON object"
        )));
    };
    object.retain(|key, _| id.allowed_keys().contains(&key.as_str()));

    if let Some(Value::Array(themes)) = object.get_mut("key_themes") {
        themes.truncate(MAX_KEY_THEMES);
    }
    for key in ["major_change_summary", "core_provision_summary"] {
        if let Some(Value::String(summary)) = object.get_mut(key) {
            if summary.chars().count() > MAX_RECORD_SUMMARY_CHARS {
                *summary = summary.chars().take(MAX_RECORD_SUMMARY_CHARS).collect();
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Single string field of a contract object, if present and non-empty.
pub fn string_field(output: &str, key: &str) -> Option<String> {
    let value = extract_json(output).ok()?;
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Text to salvage from output that failed its contract.
///
/// Takes the field when it has text. Output that parses as JSON but lacks
/// the field yields nothing; anything else is kept as cleaned raw text.
pub fn field_or_raw(output: &str, key: &str) -> Option<String> {
    if let Some(text) = string_field(output, key) {
        return Some(text);
    }
    if extract_json(output).is_ok() {
        return None;
    }
    Some(clean_raw_text(output)).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn validator() -> ContractValidator {
        ContractValidator::new().expect("validator")
    }

    #[test]
    fn test_all_contracts_compile() {
        let validator = validator();
        assert_eq!(validator.validators.len(), ContractId::iter().count());
    }

    #[test]
    fn test_contract_names() {
        assert_eq!(ContractId::LawModification.as_str(), "law_modification");
        assert_eq!(ContractId::NarrativePlan.to_string(), "narrative_plan");
        assert_eq!("paragraph".parse::<ContractId>().ok(), Some(ContractId::Paragraph));
    }

    #[test]
    fn test_valid_law_modification() {
        let output = json!({
            "law_reference": "ν. 4887/2022",
            "article_number": "άρθρο 5",
            "change_type": "τροποποιείται",
            "major_change_summary": "Αλλάζει η προθεσμία υποβολής.",
            "key_themes": ["προθεσμίες", "tax_filing"]
        })
        .to_string();
        assert!(validator().check(ContractId::LawModification, &output).is_empty());
    }

    #[test]
    fn test_invalid_change_type_and_extra_key() {
        let output = json!({
            "law_reference": "ν. 4887/2022",
            "article_number": "άρθρο 5",
            "change_type": "αλλάζει",
            "major_change_summary": "Σύνοψη.",
            "key_themes": ["θέμα"],
            "confidence": 0.9
        })
        .to_string();
        let violations = validator().check(ContractId::LawModification, &output);
        assert_eq!(violations.len(), 2, "{violations:?}");
        assert!(violations.iter().any(|v| v.starts_with("/change_type")));
    }

    #[test]
    fn test_too_many_themes_is_violation() {
        let output = json!({
            "article_title": "Ορισμοί",
            "provision_type": "ορισμός",
            "core_provision_summary": "Ορίζονται οι βασικές έννοιες.",
            "key_themes": ["α", "β", "γ", "δ"]
        })
        .to_string();
        assert!(!validator().check(ContractId::NewProvision, &output).is_empty());
    }

    #[test]
    fn test_summary_length_limit() {
        let long = "λ".repeat(2001);
        let output = json!({ "summary": long }).to_string();
        assert!(!validator().check(ContractId::ChapterSummary, &output).is_empty());
        assert!(validator().check(ContractId::PartSummary, &output).is_empty());
    }

    #[test]
    fn test_blank_text_is_violation() {
        let validator = validator();
        let blank = json!({ "summary": " \n " }).to_string();
        assert!(!validator.check(ContractId::ChapterSummary, &blank).is_empty());
        assert!(!validator.check(ContractId::PartSummary, &blank).is_empty());
        let paragraph = json!({ "paragraph": "  " }).to_string();
        assert!(!validator.check(ContractId::Paragraph, &paragraph).is_empty());
    }

    #[test]
    fn test_paragraph_extra_key_is_violation() {
        let validator = validator();
        let output = json!({ "paragraph": "Κείμενο.", "title": "Α" }).to_string();
        assert!(!validator.check(ContractId::Paragraph, &output).is_empty());
        let plain = json!({ "paragraph": "Κείμενο." }).to_string();
        assert!(validator.check(ContractId::Paragraph, &plain).is_empty());
    }

    #[test]
    fn test_unparseable_output_is_violation() {
        let violations = validator().check(ContractId::Paragraph, "καθόλου JSON");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("no JSON object"));
    }

    #[test]
    fn test_parse_loose_drops_unknown_keys_and_extra_themes() {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Record {
            article_title: String,
            key_themes: Vec<String>,
            provision_type: String,
            core_provision_summary: String,
        }
        let output = json!({
            "article_title": "Ορισμοί",
            "provision_type": "ορισμός",
            "core_provision_summary": "σ".repeat(600),
            "key_themes": ["α", "β", "γ", "δ"],
            "notes": "περιττό"
        })
        .to_string();
        let record: Record = parse_loose(ContractId::NewProvision, &output).expect("loose");
        assert_eq!(record.article_title, "Ορισμοί");
        assert_eq!(record.provision_type, "ορισμός");
        assert_eq!(record.key_themes.len(), 3);
        assert_eq!(record.core_provision_summary.chars().count(), 550);
    }

    #[test]
    fn test_string_field() {
        assert_eq!(
            string_field(r#"```json {"summary": " Κείμενο. "} ```"#, "summary").as_deref(),
            Some("Κείμενο.")
        );
        assert_eq!(string_field(r#"{"summary": ""}"#, "summary"), None);
        assert_eq!(string_field("χωρίς json", "summary"), None);
    }

    #[test]
    fn test_field_or_raw() {
        assert_eq!(
            field_or_raw(r#"{"summary": "Κείμενο."}"#, "summary").as_deref(),
            Some("Κείμενο.")
        );
        assert_eq!(field_or_raw(r#"{"summary": "  "}"#, "summary"), None);
        assert_eq!(
            field_or_raw("Περίληψη χωρίς JSON.", "summary").as_deref(),
            Some("Περίληψη χωρίς JSON.")
        );
        assert_eq!(field_or_raw("```\n```", "summary"), None);
    }
}
