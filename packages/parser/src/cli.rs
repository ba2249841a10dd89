//! Command-line interface for the parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde::Deserialize;

use crate::boundary::{detect, detect_candidates};
use crate::chunk::{reconstruct, ChunkKind};
use crate::error::{ParserError, Result};
use crate::hierarchy::{map, verify_continuity, BillHierarchy, TitleLine};
use crate::report::{DryRun, LengthStats};
use crate::sequence::{complete_sequence, is_continuous};

/// Nomothesia Parser - Recover the structure of Greek legislative text.
#[derive(Parser)]
#[command(name = "nomothesia-parse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List article header candidates in a text file.
    Headers {
        /// Text file to scan
        file: PathBuf,

        /// Also show quoted and paragraph-reference candidates
        #[arg(short, long)]
        all: bool,
    },

    /// Split a text file into preamble and article chunks.
    Chunks {
        /// Text file to split
        file: PathBuf,

        /// Document title, used for `(N-M)` article ranges
        #[arg(short, long, default_value = "")]
        title: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Map article titles to Parts and Chapters and show a dry-run view.
    Hierarchy {
        /// JSON file with `[{id, title, content?}]` or `{articles: [...]}`
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
}

#[derive(Debug, Deserialize)]
struct TitleEntry {
    id: String,
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitleFile {
    Document { articles: Vec<TitleEntry> },
    List(Vec<TitleEntry>),
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Headers { file, all } => headers_command(&file, all),
        Commands::Chunks {
            file,
            title,
            format,
        } => chunks_command(&file, &title, format),
        Commands::Hierarchy { file, format } => hierarchy_command(&file, format),
    }
}

fn read_text(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(ParserError::EmptyInput(path.display().to_string()));
    }
    Ok(text)
}

fn headers_command(path: &Path, all: bool) -> Result<()> {
    let text = read_text(path)?;
    let candidates = detect_candidates(&text);
    let true_count = detect(&text).len();

    println!(
        "{} {} ({} true headers)",
        style("Scanned").bold(),
        style(path.display()).cyan(),
        style(true_count).green()
    );
    for candidate in candidates.iter().filter(|c| all || c.is_true_header()) {
        let mut flags = Vec::new();
        if candidate.is_quoted {
            flags.push("quoted");
        }
        if candidate.header.is_paragraph_reference() {
            flags.push("paragraph");
        }
        if candidate.header.is_valid_range() {
            flags.push("range");
        }
        println!(
            "  {:>5}  {:<10} {} {}",
            candidate.line_index + 1,
            candidate
                .header
                .numbers()
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(","),
            candidate.line_text.trim(),
            style(flags.join(" ")).yellow()
        );
    }
    Ok(())
}

fn chunks_command(path: &Path, title: &str, format: OutputFormat) -> Result<()> {
    let text = read_text(path)?;
    let completion = complete_sequence(&text, title);
    let chunks = reconstruct(&text, &completion.headers, &completion.mentions);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!(
        "{} {} chunks from {}",
        style("Recovered").bold(),
        style(chunks.len()).green(),
        style(path.display()).cyan()
    );
    if completion.used_mentions() {
        println!(
            "  {} {} gaps filled from mentions",
            style("Note:").yellow().bold(),
            completion.mentions.len()
        );
    }
    if !completion.unresolved.is_empty() {
        println!(
            "  {} unresolved: {:?}",
            style("Warning:").yellow().bold(),
            completion.unresolved
        );
    }
    let numbers: Vec<u32> = chunks.iter().filter_map(|c| c.article_number).collect();
    if !is_continuous(&numbers) {
        println!("  {} article numbering is not continuous", style("Warning:").yellow().bold());
    }

    for chunk in &chunks {
        let label = match chunk.kind {
            ChunkKind::Preamble => "preamble".to_string(),
            ChunkKind::Article => format!(
                "Άρθρο {}",
                chunk.article_number.map(|n| n.to_string()).unwrap_or_default()
            ),
        };
        let stats = LengthStats::of(&chunk.content_text);
        match format {
            OutputFormat::Markdown => println!(
                "* **{label}** (lines {}-{}) – {} words",
                chunk.start_line + 1,
                chunk.end_line,
                stats.words
            ),
            _ => println!(
                "  {:>3}  {:<12} lines {:>5}-{:<5} {:>6} words",
                chunk.index, label, chunk.start_line + 1, chunk.end_line, stats.words
            ),
        }
    }
    Ok(())
}

fn load_titles(path: &Path) -> Result<Vec<TitleEntry>> {
    let raw = std::fs::read_to_string(path)?;
    let parsed: TitleFile =
        serde_json::from_str(&raw).map_err(|e| ParserError::InvalidTitles {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let entries = match parsed {
        TitleFile::Document { articles } => articles,
        TitleFile::List(entries) => entries,
    };
    if entries.is_empty() {
        return Err(ParserError::EmptyInput(path.display().to_string()));
    }
    Ok(entries)
}

fn hierarchy_command(path: &Path, format: OutputFormat) -> Result<()> {
    let entries = load_titles(path)?;
    let titles: Vec<TitleLine> = entries
        .iter()
        .map(|e| TitleLine::new(e.id.clone(), e.title.clone()))
        .collect();
    let mapping = map(&titles);
    let tree = BillHierarchy::build(&mapping.assignments);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        return Ok(());
    }

    let stats: HashMap<String, LengthStats> = entries
        .iter()
        .map(|e| (e.id.clone(), LengthStats::of(&e.content)))
        .collect();
    let mut issues: Vec<String> = verify_continuity(&mapping.assignments)
        .iter()
        .map(ToString::to_string)
        .collect();
    issues.extend(mapping.unknown_numerals.iter().map(|u| {
        format!(
            "{}: unknown {} numeral {}",
            u.id,
            u.level,
            u.token.as_deref().unwrap_or("(missing)")
        )
    }));

    let view = DryRun {
        hierarchy: &tree,
        stats: &stats,
        issues: &issues,
    };
    match format {
        OutputFormat::Text => print!("{}", view.to_text()),
        _ => print!("{}", view.to_markdown()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["nomothesia-parse", "chunks", "bill.txt", "--title", "(1-3)"]);
        match cli.command {
            Commands::Chunks {
                file,
                title,
                format,
            } => {
                assert_eq!(file, PathBuf::from("bill.txt"));
                assert_eq!(title, "(1-3)");
                assert_eq!(format, OutputFormat::Text);
            }
            _ => unreachable!("expected chunks command"),
        }
    }

    #[test]
    fn test_cli_hierarchy_format() {
        let cli = Cli::parse_from(["nomothesia-parse", "hierarchy", "t.json", "-f", "json"]);
        match cli.command {
            Commands::Hierarchy { format, .. } => assert_eq!(format, OutputFormat::Json),
            _ => unreachable!("expected hierarchy command"),
        }
    }

    #[test]
    fn test_title_file_shapes() {
        let list: TitleFile =
            serde_json::from_str(r#"[{"id": "1", "title": "ΜΕΡΟΣ Α'"}]"#).expect("list");
        assert!(matches!(list, TitleFile::List(ref v) if v.len() == 1));

        let doc: TitleFile = serde_json::from_str(
            r#"{"id": "doc", "title": "Νόμος", "articles": [{"id": "1", "title": "Σκοπός", "content": "κείμενο"}]}"#,
        )
        .expect("document");
        assert!(matches!(doc, TitleFile::Document { ref articles } if articles[0].content == "κείμενο"));
    }
}
