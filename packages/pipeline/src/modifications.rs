//! Tally of amended laws per Part.

use std::collections::HashMap;

use crate::models::{ChangeType, Stage1Entry, Stage1Outcome, Stage1Record};

/// Order change types appear in within a line.
const TYPE_ORDER: [ChangeType; 6] = [
    ChangeType::Replaces,
    ChangeType::Amends,
    ChangeType::Adds,
    ChangeType::Supplements,
    ChangeType::Repeals,
    ChangeType::Deletes,
];

fn noun(change: ChangeType, count: usize) -> &'static str {
    let (one, many) = match change {
        ChangeType::Replaces => ("αντικατάσταση", "αντικαταστάσεις"),
        ChangeType::Amends => ("τροποποίηση", "τροποποιήσεις"),
        ChangeType::Adds => ("προσθήκη", "προσθήκες"),
        ChangeType::Supplements => ("συμπλήρωση", "συμπληρώσεις"),
        ChangeType::Repeals => ("κατάργηση", "καταργήσεις"),
        ChangeType::Deletes => ("διαγραφή", "διαγραφές"),
    };
    if count == 1 {
        one
    } else {
        many
    }
}

/// One Greek line per amended law, most-amended law first.
///
/// Ties keep the order in which laws are first cited.
pub fn modifications_summary<'e>(entries: impl IntoIterator<Item = &'e Stage1Entry>) -> Vec<String> {
    let mut laws: Vec<(String, HashMap<ChangeType, usize>)> = Vec::new();

    for entry in entries {
        let Stage1Outcome::Summarized {
            record: Stage1Record::LawModification(record),
            ..
        } = &entry.outcome
        else {
            continue;
        };
        let law = record.law_reference.trim();
        if law.is_empty() {
            continue;
        }
        let position = match laws.iter().position(|(l, _)| l == law) {
            Some(position) => position,
            None => {
                laws.push((law.to_string(), HashMap::new()));
                laws.len() - 1
            }
        };
        *laws[position].1.entry(record.change_type).or_default() += 1;
    }

    // Stable sort keeps first-cited order among equal counts.
    laws.sort_by_key(|(_, counts)| std::cmp::Reverse(counts.values().sum::<usize>()));

    laws.into_iter()
        .map(|(law, counts)| {
            let total: usize = counts.values().sum();
            let changes = if total == 1 { "αλλαγή" } else { "αλλαγές" };
            let breakdown = TYPE_ORDER
                .iter()
                .filter_map(|t| counts.get(t).map(|&n| format!("{n} {}", noun(*t, n))))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{total} {changes} του {law} ({breakdown}).")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use crate::models::{LawModificationRecord, EMPTY_ARTICLE_MARKER};
    use pretty_assertions::assert_eq;

    fn modification(law: &str, change_type: ChangeType) -> Stage1Entry {
        Stage1Entry {
            document_id: "doc".to_string(),
            chunk_id: "1#0".to_string(),
            article_id: "1".to_string(),
            article_title: "Τροποποίηση".to_string(),
            article_number: Some(1),
            part_id: "meros_0".to_string(),
            chapter_id: "meros_0/kefalaio_0".to_string(),
            label: Label::ModifiesLaw,
            unverified_excerpt: None,
            outcome: Stage1Outcome::Summarized {
                record: Stage1Record::LawModification(LawModificationRecord {
                    law_reference: law.to_string(),
                    article_number: "άρθρο 1".to_string(),
                    change_type,
                    major_change_summary: "Αλλαγή.".to_string(),
                    key_themes: vec!["αλλαγές".to_string()],
                }),
                retries_used: 0,
                salvaged: false,
            },
        }
    }

    #[test]
    fn test_lines_ordered_by_count() {
        let entries = vec![
            modification("ν. 1000/2000", ChangeType::Repeals),
            modification("ν. 4887/2022", ChangeType::Amends),
            modification("ν. 4887/2022", ChangeType::Replaces),
            modification("ν. 4887/2022", ChangeType::Amends),
        ];
        assert_eq!(
            modifications_summary(&entries),
            vec![
                "3 αλλαγές του ν. 4887/2022 (1 αντικατάσταση, 2 τροποποιήσεις).".to_string(),
                "1 αλλαγή του ν. 1000/2000 (1 κατάργηση).".to_string(),
            ]
        );
    }

    #[test]
    fn test_other_outcomes_are_ignored() {
        let mut skipped = modification("ν. 1/2020", ChangeType::Adds);
        skipped.outcome = Stage1Outcome::Skipped {
            marker: EMPTY_ARTICLE_MARKER.to_string(),
        };
        assert!(modifications_summary([&skipped]).is_empty());
    }
}
