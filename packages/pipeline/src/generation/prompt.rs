use crate::budget::Budget;
use crate::classifier::QuotedChange;

const SYSTEM_SUMMARIZER: &str = include_str!("../../prompts/system_summarizer.txt");
const SYSTEM_PLANNER: &str = include_str!("../../prompts/system_planner.txt");

pub const SCOPE_LABEL: &str = "Σκοπός: ";
pub const SUBJECT_LABEL: &str = "Αντικείμενο: ";

/// Build the system prompt for summarization calls.
pub fn build_system_prompt() -> &'static str {
    SYSTEM_SUMMARIZER
}

/// Build the system prompt for narrative planning.
pub fn build_planner_system_prompt() -> &'static str {
    SYSTEM_PLANNER
}

fn length_line(budget: &Budget) -> String {
    format!(
        "Έκταση: περίπου {} λέξεις σε {} πρόταση/προτάσεις.\n",
        budget.target_words, budget.target_sentences
    )
}

/// Prompt for a chunk that amends an existing law.
pub fn build_law_modification_prompt(
    text: &str,
    citation: Option<&str>,
    quoted: Option<&QuotedChange>,
    budget: &Budget,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Τροποποιητική διάταξη\n\n");
    if let Some(citation) = citation {
        prompt.push_str(&format!("Νόμος που τροποποιείται: {citation}\n"));
    }
    prompt.push_str(&format!("\n## Κείμενο άρθρου\n{text}\n\n"));
    if let Some(quoted) = quoted.filter(|q| q.verified) {
        prompt.push_str(&format!("## Νέα διατύπωση\n{}\n\n", quoted.text));
    }

    prompt.push_str(&length_line(budget));
    prompt.push_str(
        "Επέστρεψε JSON με τα πεδία: \
         \"law_reference\" (π.χ. \"ν. 4887/2022\"), \
         \"article_number\" (π.χ. \"άρθρο 5\"), \
         \"change_type\" (ένα από: τροποποιείται, καταργείται, αντικαθίσταται, \
         προστίθεται, συμπληρώνεται, διαγράφεται), \
         \"major_change_summary\" (έως 550 χαρακτήρες) και \
         \"key_themes\" (1 έως 3 θέματα σε μορφή snake_case).",
    );
    prompt
}

/// Prompt for a chunk that introduces new provisions.
pub fn build_new_provision_prompt(title: &str, text: &str, budget: &Budget) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# Νέα διάταξη: {title}\n\n## Κείμενο άρθρου\n{text}\n\n"));
    prompt.push_str(&length_line(budget));
    prompt.push_str(
        "Επέστρεψε JSON με τα πεδία: \
         \"article_title\", \
         \"provision_type\" (ένα από: ορισμός, σκοπός, αρμοδιότητες, διαδικασία, \
         οργάνωση, ρύθμιση, διάρθρωση), \
         \"core_provision_summary\" (έως 550 χαρακτήρες) και \
         \"key_themes\" (1 έως 3 θέματα σε μορφή snake_case).",
    );
    prompt
}

/// Prompt summarizing a chapter from its bullet lines.
pub fn build_chapter_prompt(label: &str, bullets: &str, budget: &Budget) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# {label}\n\nΣυνόψισε τις παρακάτω περιλήψεις άρθρων σε ένα ενιαίο, συνεκτικό κείμενο.\n\n"
    ));
    prompt.push_str(bullets);
    prompt.push_str("\n\n");
    prompt.push_str(&length_line(budget));
    prompt.push_str("Επέστρεψε JSON με ένα πεδίο: \"summary\" (έως 2000 χαρακτήρες).");
    prompt
}

/// Prompt summarizing a Part that has a single chapter.
pub fn build_single_chapter_prompt(label: &str, chapter_text: &str) -> String {
    format!(
        "# {label}\n\nΤο μέρος αποτελείται από ένα μόνο κεφάλαιο. \
         Γράψε μια περίληψη του μέρους για πολίτες με βάση το κείμενο του κεφαλαίου.\n\n\
         ## Κείμενο κεφαλαίου\n{chapter_text}\n\n\
         Επέστρεψε JSON με ένα πεδίο: \"summary\" (έως 3000 χαρακτήρες)."
    )
}

/// Prompt asking for a narrative plan over keyed chapter summaries.
pub fn build_plan_prompt(
    input_json: &str,
    allowed_keys: &[String],
    min_beats: usize,
    max_beats: usize,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Σχεδίασε την αφήγηση του μέρους σε {min_beats} έως {max_beats} ενότητες.\n\n"
    ));
    prompt.push_str(&format!(
        "Επιτρεπτά κλειδιά κεφαλαίων: {}\n\n",
        allowed_keys.join(", ")
    ));
    prompt.push_str("## Δεδομένα εισόδου\n");
    prompt.push_str(input_json);
    prompt.push_str("\n\n");
    prompt.push_str(
        "Επέστρεψε JSON με τα πεδία: \"overall_narrative_arc\", \"protagonist\", \
         \"problem\" και \"narrative_sections\" (λίστα αντικειμένων με \"section_title\", \
         \"section_role\" και \"source_chapters\", λίστα κλειδιών κεφαλαίων).",
    );
    prompt
}

/// Prompt for the paragraph of one narrative beat.
pub fn build_paragraph_prompt(input_json: &str, budget_words: usize) -> String {
    format!(
        "Γράψε μία παράγραφο για την τρέχουσα ενότητα του σχεδίου αφήγησης, \
         αξιοποιώντας μόνο τα κείμενα των κεφαλαίων που της αντιστοιχούν. \
         Η παράγραφος πρέπει να συνδέεται ομαλά με τις προηγούμενες ενότητες.\n\n\
         ## Δεδομένα εισόδου\n{input_json}\n\n\
         Έκταση: έως {budget_words} λέξεις.\n\
         Επέστρεψε JSON με ένα πεδίο: \"paragraph\"."
    )
}

fn legacy_body(intro_lines: &[String], chapter_summaries: &[String]) -> String {
    intro_lines
        .iter()
        .chain(chapter_summaries)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-shot Part summary prompt, used when planning fails.
pub fn build_legacy_part_prompt(
    label: &str,
    intro_lines: &[String],
    chapter_summaries: &[String],
    budget: &Budget,
) -> String {
    format!(
        "# {label}\n\nΣυνόψισε το μέρος του νομοσχεδίου με βάση τις παρακάτω περιλήψεις. \
         Ξεκίνα με τη φράση «Ο σκοπός του μέρους είναι».\n\n{}\n\n{}\
         Επέστρεψε JSON με ένα πεδίο: \"summary\" (έως 3000 χαρακτήρες).",
        legacy_body(intro_lines, chapter_summaries),
        length_line(budget)
    )
}

/// The same request as prose, for when JSON output keeps failing.
pub fn build_legacy_part_prose_prompt(
    label: &str,
    intro_lines: &[String],
    chapter_summaries: &[String],
    budget: &Budget,
) -> String {
    format!(
        "# {label}\n\nΣυνόψισε το μέρος του νομοσχεδίου με βάση τις παρακάτω περιλήψεις. \
         Ξεκίνα με τη φράση «Ο σκοπός του μέρους είναι».\n\n{}\n\n{}\
         Γράψε μόνο το κείμενο της περίληψης.",
        legacy_body(intro_lines, chapter_summaries),
        length_line(budget)
    )
}
