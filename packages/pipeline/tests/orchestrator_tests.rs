use nomothesia_pipeline::generation::{ContractId, LlmRequest, MockLlmClient};
use nomothesia_pipeline::models::{PassThroughReason, Stage1Record};
use nomothesia_pipeline::{
    InMemorySource, Orchestrator, OrchestratorConfig, PartStrategy, PipelineError, SourceArticle,
    SourceDocument, Stage1Outcome,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn filler(words: usize) -> String {
    vec!["ρύθμιση"; words].join(" ")
}

fn article(id: &str, title: &str, content: String) -> SourceArticle {
    SourceArticle {
        id: id.into(),
        title: title.into(),
        content,
    }
}

/// Two Parts: the first with two chapters, the second with one.
fn sample_document() -> SourceDocument {
    SourceDocument {
        id: "nomos-2024-1".into(),
        title: "Στήριξη επιχειρήσεων".into(),
        articles: vec![
            article(
                "1",
                "ΜΕΡΟΣ Α' ΚΕΦΑΛΑΙΟ Α' Άρθρο 1 Σκοπός",
                "Άρθρο 1\nΣκοπός του νόμου είναι η στήριξη των επιχειρήσεων.".into(),
            ),
            article(
                "2",
                "Άρθρο 2 Διαδικασία ένταξης",
                format!("Άρθρο 2\nΗ ένταξη γίνεται με αίτηση. {}", filler(100)),
            ),
            article(
                "3",
                "Άρθρο 3 Τροποποίηση του ν. 4887/2022",
                format!(
                    "Άρθρο 3\nΤο άρθρο 5 του ν. 4887/2022 τροποποιείται ως εξής: «{}»",
                    filler(20)
                ),
            ),
            article(
                "4",
                "ΚΕΦΑΛΑΙΟ Β' Άρθρο 4 Εποπτεία",
                format!("Άρθρο 4\nΗ εποπτεία ασκείται από την Αρχή. {}", filler(100)),
            ),
            article(
                "5",
                "ΜΕΡΟΣ Β' ΚΕΦΑΛΑΙΟ Α' Άρθρο 5 Έναρξη ισχύος",
                format!("Άρθρο 5\nΗ ισχύς αρχίζει από τη δημοσίευση. {}", filler(100)),
            ),
        ],
    }
}

fn respond(request: &LlmRequest) -> nomothesia_pipeline::Result<String> {
    let json = match request.contract {
        Some(ContractId::NewProvision) => serde_json::json!({
            "article_title": "Διάταξη",
            "provision_type": "διαδικασία",
            "core_provision_summary": "Ορίζεται η διαδικασία.",
            "key_themes": ["διαδικασία"]
        }),
        Some(ContractId::LawModification) => serde_json::json!({
            "law_reference": "ν. 4887/2022",
            "article_number": "άρθρο 5",
            "change_type": "τροποποιείται",
            "major_change_summary": "Αλλάζουν οι προθεσμίες.",
            "key_themes": ["προθεσμίες"]
        }),
        Some(ContractId::ChapterSummary) => {
            serde_json::json!({"summary": "Το κεφάλαιο ρυθμίζει τη διαδικασία."})
        }
        Some(ContractId::NarrativePlan) => serde_json::json!({
            "overall_narrative_arc": "Από την ένταξη στην εποπτεία.",
            "protagonist": "Οι επιχειρήσεις",
            "problem": "Η έλλειψη στήριξης",
            "narrative_sections": [
                {"section_title": "Ένταξη", "section_role": "Αρχή", "source_chapters": ["kefalaio_0"]},
                {"section_title": "Εποπτεία", "section_role": "Κατάληξη", "source_chapters": ["kefalaio_1"]}
            ]
        }),
        Some(ContractId::Paragraph) => {
            serde_json::json!({"paragraph": "Ο νόμος στηρίζει τις επιχειρήσεις."})
        }
        Some(ContractId::PartSummary) => {
            serde_json::json!({"summary": "Ο σκοπός του μέρους είναι η έναρξη ισχύος."})
        }
        None => return Ok("Απλό κείμενο.".to_string()),
    };
    Ok(json.to_string())
}

fn count(requests: &[LlmRequest], contract: ContractId) -> usize {
    requests
        .iter()
        .filter(|r| r.contract == Some(contract))
        .count()
}

#[tokio::test]
async fn test_full_document_run() {
    let client = MockLlmClient::from_fn(respond);
    let config = OrchestratorConfig::default();
    let orchestrator = Orchestrator::new(&client, &config).expect("orchestrator");

    let summary = orchestrator
        .run_document(&sample_document(), CancellationToken::new())
        .await
        .expect("document summary");

    assert_eq!(summary.document_id, "nomos-2024-1");
    assert_eq!(summary.stage1.len(), 5);
    assert!(matches!(
        summary.stage1[0].outcome,
        Stage1Outcome::PassedThrough {
            reason: PassThroughReason::Intro,
            ..
        }
    ));
    assert!(matches!(
        &summary.stage1[2].outcome,
        Stage1Outcome::Summarized {
            record: Stage1Record::LawModification(_),
            ..
        }
    ));

    // Three chapters with bullets, one per chapter.
    assert_eq!(summary.chapters.len(), 3);
    assert_eq!(summary.parts.len(), 2);
    assert!(summary.failed_parts.is_empty());
    assert_eq!(summary.parts[0].strategy, PartStrategy::Plan);
    assert_eq!(summary.parts[0].paragraphs.len(), 2);
    assert_eq!(summary.parts[1].strategy, PartStrategy::FastPath);
    assert_eq!(
        summary.parts[0].modifications,
        vec!["1 αλλαγή του ν. 4887/2022 (1 τροποποίηση).".to_string()]
    );
    assert!(summary.parts[1].modifications.is_empty());

    assert!(summary.final_text.starts_with("ΜΕΡΟΣ Α':\n\nΑλλαγές:\n"));
    assert!(summary.final_text.contains("ΜΕΡΟΣ Β':\n\nΠερίληψη:\n"));

    let requests = client.requests();
    assert_eq!(count(&requests, ContractId::NewProvision), 3);
    assert_eq!(count(&requests, ContractId::LawModification), 1);
    assert_eq!(count(&requests, ContractId::ChapterSummary), 3);
    assert_eq!(count(&requests, ContractId::NarrativePlan), 1);
    assert_eq!(count(&requests, ContractId::Paragraph), 2);
    assert_eq!(count(&requests, ContractId::PartSummary), 1);

    let plan_request = requests
        .iter()
        .find(|r| r.contract == Some(ContractId::NarrativePlan))
        .expect("plan request");
    assert!(plan_request.prompt.contains("στήριξη των επιχειρήσεων"));

    assert_eq!(summary.processing.chunks_total, 5);
    assert_eq!(summary.processing.summarized, 4);
    assert_eq!(summary.processing.passed_through, 1);
    assert_eq!(summary.processing.planned_parts, 1);
    assert_eq!(summary.processing.fast_path_parts, 1);
    assert_eq!(
        summary.processing.usage.input_tokens,
        100 * requests.len() as u64
    );
}

#[tokio::test]
async fn test_failed_part_does_not_stop_others() {
    let client = MockLlmClient::from_fn(|request| {
        if request.contract == Some(ContractId::PartSummary) {
            return Err(PipelineError::LlmApiError {
                status: 400,
                message: "rejected".into(),
            });
        }
        respond(request)
    });
    let config = OrchestratorConfig::default();
    let orchestrator = Orchestrator::new(&client, &config).expect("orchestrator");

    let summary = orchestrator
        .run_document(&sample_document(), CancellationToken::new())
        .await
        .expect("document summary");

    assert_eq!(summary.parts.len(), 1);
    assert_eq!(summary.parts[0].part_id, "meros_0");
    assert_eq!(summary.failed_parts.len(), 1);
    assert_eq!(summary.failed_parts[0].part_id, "meros_1");
    assert!(summary.failed_parts[0].error.contains("rejected"));
    assert_eq!(summary.processing.failed_parts, 1);
    assert!(!summary.final_text.contains("ΜΕΡΟΣ Β'"));
}

#[tokio::test]
async fn test_cancelled_run_fails_without_generation() {
    let client = MockLlmClient::from_fn(respond);
    let config = OrchestratorConfig::default();
    let orchestrator = Orchestrator::new(&client, &config).expect("orchestrator");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator.run_document(&sample_document(), cancel).await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_malformed_document_is_rejected() {
    let client = MockLlmClient::from_fn(respond);
    let config = OrchestratorConfig::default();
    let orchestrator = Orchestrator::new(&client, &config).expect("orchestrator");

    let empty = SourceDocument {
        id: "empty".into(),
        title: String::new(),
        articles: vec![],
    };
    let result = orchestrator
        .run_document(&empty, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let client = MockLlmClient::from_fn(respond);
    let config = OrchestratorConfig::default();
    let orchestrator = Orchestrator::new(&client, &config).expect("orchestrator");
    let source = InMemorySource::new([sample_document()]);

    let items = orchestrator
        .run_batch(
            &source,
            &["missing".to_string(), "nomos-2024-1".to_string()],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(items.len(), 2);
    assert!(matches!(items[0].result, Err(PipelineError::InvalidInput(_))));
    let summary = items[1].result.as_ref().expect("second document");
    assert_eq!(summary.parts.len(), 2);
}
