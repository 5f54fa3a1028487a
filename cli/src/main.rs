//! filingchunk CLI - chunk classified filings and sync review CSVs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use filingchunk::store::read_chunks;
use filingchunk::{
    discover_documents, DocumentId, DocumentRecord, IdRegistry, OutputLayout, Pipeline,
    PipelineConfig, SyncOptions, SyncReport, Synchronizer,
};

#[derive(Parser)]
#[command(name = "filingchunk")]
#[command(version)]
#[command(about = "Structure-aware chunking of litigation filings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk one document directory or a root of document directories
    Chunk {
        /// Document directory, or a directory of them
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output root
        #[arg(short, long, value_name = "DIR", env = "FILINGCHUNK_OUTPUT")]
        output: PathBuf,

        /// JSON configuration file
        #[arg(short, long, value_name = "FILE", env = "FILINGCHUNK_CONFIG")]
        config: Option<PathBuf>,

        /// Token budget per chunk
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Minimum tokens before the fallback chunker closes at a page end
        #[arg(long)]
        min_tokens: Option<usize>,

        /// Keep proof-of-service pages in the output
        #[arg(long)]
        include_proof_of_service: bool,

        /// Process documents one at a time
        #[arg(long)]
        sequential: bool,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync chunk, classification and documents CSVs with the canonical stores
    Sync {
        /// Output root
        #[arg(value_name = "OUTPUT", env = "FILINGCHUNK_OUTPUT")]
        output: PathBuf,

        /// Only this document id
        #[arg(short, long)]
        document: Option<u32>,

        /// Delete canonical rows removed from the CSVs
        #[arg(long)]
        confirm_deletions: bool,

        /// Report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List issued document ids
    Ids {
        /// Output root
        #[arg(value_name = "OUTPUT", env = "FILINGCHUNK_OUTPUT")]
        output: PathBuf,

        /// Also write the registry CSV
        #[arg(long)]
        export: bool,
    },

    /// Show a processed document and its chunks
    Show {
        /// Output root
        #[arg(value_name = "OUTPUT", env = "FILINGCHUNK_OUTPUT")]
        output: PathBuf,

        /// Document id
        #[arg(value_name = "ID")]
        id: u32,

        /// Print the full text of one chunk
        #[arg(long)]
        chunk: Option<u32>,
    },

    /// Show version information
    Version,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chunk {
            input,
            output,
            config,
            max_tokens,
            min_tokens,
            include_proof_of_service,
            sequential,
            json,
        } => {
            let overrides = ChunkOverrides {
                max_tokens,
                min_tokens,
                include_proof_of_service,
                sequential,
            };
            cmd_chunk(&input, &output, config.as_deref(), overrides, json)
        }
        Commands::Sync {
            output,
            document,
            confirm_deletions,
            dry_run,
            json,
        } => {
            let options = SyncOptions::new()
                .with_confirm_deletions(confirm_deletions)
                .with_dry_run(dry_run);
            cmd_sync(&output, document.map(DocumentId), options, json)
        }
        Commands::Ids { output, export } => cmd_ids(&output, export),
        Commands::Show { output, id, chunk } => cmd_show(&output, DocumentId(id), chunk),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

struct ChunkOverrides {
    max_tokens: Option<usize>,
    min_tokens: Option<usize>,
    include_proof_of_service: bool,
    sequential: bool,
}

/// Config file (or defaults) with command-line flags applied on top.
fn resolve_config(path: Option<&Path>, overrides: &ChunkOverrides) -> filingchunk::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            log::debug!("Reading config from {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(max) = overrides.max_tokens {
        config.chunk = config.chunk.with_max_tokens(max);
    }
    if let Some(min) = overrides.min_tokens {
        config.chunk = config.chunk.with_min_tokens(min);
    }
    if overrides.include_proof_of_service {
        config.chunk = config.chunk.with_exclude_proof_of_service(false);
    }
    if overrides.sequential {
        config = config.sequential();
    }
    log::debug!(
        "Chunk budget {}..{} tokens, proof of service {}",
        config.chunk.min_tokens,
        config.chunk.max_tokens,
        if config.chunk.exclude_proof_of_service { "excluded" } else { "included" }
    );
    Ok(config)
}

fn cmd_chunk(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    overrides: ChunkOverrides,
    json: bool,
) -> CliResult {
    let config = resolve_config(config, &overrides)?;

    let sources = discover_documents(input)?;
    if sources.is_empty() {
        println!("{} no document directories under {}", "Nothing to do:".yellow(), input.display());
        return Ok(());
    }

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let tick = pb.clone();
    let pipeline = Pipeline::new(OutputLayout::new(output), config).with_progress(move |name| {
        tick.set_message(name.to_string());
        tick.inc(1);
    });
    let report = pipeline.run_batch(&sources)?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for doc in &report.documents {
        let mode = match &doc.fallback_reason {
            Some(reason) => format!("{} ({})", doc.mode, reason).yellow(),
            None => doc.mode.to_string().green(),
        };
        println!(
            "{} {}  {} pages, {} chunks, {}",
            format!("[{}]", doc.document_id).cyan(),
            doc.name.bold(),
            doc.page_count,
            doc.chunk_count,
            mode
        );
        if let Some((matched, total)) = doc.alignment {
            println!("       TOC: {}/{} entries aligned", matched, total);
        }
        if !doc.identity_changes.is_empty() {
            println!(
                "       {} {} chunk ids changed content",
                "!".yellow(),
                doc.identity_changes.len()
            );
        }
        print_sync_summary(&doc.sync, "       ");
        if doc.needs_rerun() {
            println!("       {} categories edited; run chunk again", "!".yellow());
        }
    }
    for failure in &report.failures {
        println!("{} {}", "Failed".red().bold(), failure);
    }

    println!(
        "\n{} {} documents, {} chunks written to {}",
        "Done!".green().bold(),
        report.documents.len(),
        report.chunk_count(),
        output.display()
    );
    if !report.is_success() {
        return Err(format!("{} documents failed", report.failures.len()).into());
    }
    Ok(())
}

fn cmd_sync(output: &Path, only: Option<DocumentId>, options: SyncOptions, json: bool) -> CliResult {
    let layout = OutputLayout::new(output);
    let synchronizer = Synchronizer::new(options);
    let ids = match only {
        Some(id) => vec![id],
        None => layout.document_ids()?,
    };

    let mut reports: Vec<SyncReport> = Vec::new();
    for id in ids {
        reports.push(synchronizer.sync_document(&layout, id)?);
    }
    if only.is_none() {
        reports.push(synchronizer.sync_documents(&layout)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        let label = match report.document_id {
            Some(id) => format!("[{}]", id),
            None => "[documents]".to_string(),
        };
        println!("{}", label.cyan());
        print_sync_summary(report, "  ");
        for conflict in &report.conflicts {
            println!(
                "  {} {} {}: kept '{}', CSV has '{}'",
                "conflict".red(),
                conflict.key,
                conflict.field,
                conflict.canonical,
                conflict.edited
            );
        }
        for row in &report.pending_deletions {
            println!("  {} {} (use --confirm-deletions)", "pending deletion".yellow(), row.key);
        }
        if !report.invalidated_pages.is_empty() {
            println!(
                "  {} pages {:?} changed category; run chunk again",
                "!".yellow(),
                report.invalidated_pages
            );
        }
    }
    if any_dry_run(&reports) {
        println!("\n{}", "Dry run: nothing written".yellow());
    }
    Ok(())
}

fn any_dry_run(reports: &[SyncReport]) -> bool {
    reports.iter().any(|r| r.dry_run)
}

fn print_sync_summary(report: &SyncReport, indent: &str) {
    if report.is_noop() && !report.needs_attention() {
        println!("{}sync: {}", indent, "up to date".dimmed());
        return;
    }
    let summary = format!(
        "sync: {} applied, {} refreshed, {} conflicts, {} ignored, {} rejected, {} pending deletions, {} unknown rows",
        report.applied_edits.len(),
        report.refreshed.len(),
        report.conflicts.len(),
        report.ignored_edits.len(),
        report.rejected_edits.len(),
        report.pending_deletions.len(),
        report.unknown_rows.len()
    );
    if report.needs_attention() {
        println!("{}{}", indent, summary.yellow());
    } else {
        println!("{}{}", indent, summary);
    }
}

fn cmd_ids(output: &Path, export: bool) -> CliResult {
    let layout = OutputLayout::new(output);
    let registry = IdRegistry::open_in(output)?;
    if registry.is_empty() {
        println!("{}", "No documents registered".yellow());
        return Ok(());
    }

    let mut statuses: HashMap<DocumentId, String> = HashMap::new();
    for record in layout.load_records()? {
        statuses.insert(record.id, format!("{}", record.stage));
    }

    let mut entries: Vec<_> = registry.entries().map(|(_, e)| e).collect();
    entries.sort_by_key(|e| e.id);
    entries.dedup_by_key(|e| e.id);
    for entry in entries {
        let status = statuses
            .get(&entry.id)
            .map(String::as_str)
            .unwrap_or("registered");
        println!("{}  {}  {}", entry.id.to_string().cyan(), entry.name, status.dimmed());
    }

    if export {
        let path = layout.registry_csv();
        registry.export_csv(&path, &statuses)?;
        println!("{} {}", "Saved to".green(), path.display());
    }
    Ok(())
}

fn cmd_show(output: &Path, id: DocumentId, chunk: Option<u32>) -> CliResult {
    let layout = OutputLayout::new(output);
    let record_path = layout.document_json(id);
    let record = DocumentRecord::load(&record_path)?
        .ok_or_else(|| format!("no document {} under {}", id, output.display()))?;
    let chunks = read_chunks(layout.chunks_jsonl(id))?;

    if let Some(n) = chunk {
        let found = chunks
            .iter()
            .find(|c| c.chunk_id.0 == n)
            .ok_or_else(|| format!("document {} has no chunk {}", id, n))?;
        println!("{}", serde_json::to_string_pretty(found)?);
        return Ok(());
    }

    println!("{}", "Document".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Id".bold(), record.id);
    println!("{}: {}", "Name".bold(), record.name);
    println!("{}: {}", "Stage".bold(), record.stage);
    if let Some(mode) = record.mode {
        println!("{}: {}", "Mode".bold(), mode);
    }
    if let Some(ref reason) = record.fallback_reason {
        println!("{}: {}", "Fallback".bold(), reason);
    }
    if let Some(ref caption) = record.caption {
        if let Some(ref title) = caption.document_title {
            println!("{}: {}", "Title".bold(), title);
        }
        if let Some(ref party) = caption.filing_party {
            println!("{}: {}", "Filed by".bold(), party);
        }
        if let Some(ref date) = caption.filing_date {
            println!("{}: {}", "Filed".bold(), date);
        }
        if let Some(ref case) = caption.case_number {
            println!("{}: {}", "Case".bold(), case);
        }
    }
    println!("{}: {}", "Pages".bold(), record.classification.len());
    println!("{}: {}", "Updated".bold(), record.updated_at);

    println!();
    println!("{}", "Chunks".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for c in &chunks {
        let pages = filingchunk::sync::format_pages(&c.page_numbers);
        let place = match (&c.section_path, &c.exhibit_label) {
            (_, Some(label)) => label.clone(),
            (Some(path), None) => path.to_string(),
            (None, None) => "-".to_string(),
        };
        println!(
            "{}  p.{:<8} {:>4} tok  {}",
            c.chunk_id.to_string().cyan(),
            pages,
            c.token_count,
            place.dimmed()
        );
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "filingchunk".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Structure-aware chunking of litigation filings");
    println!();
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_overrides() -> ChunkOverrides {
        ChunkOverrides {
            max_tokens: None,
            min_tokens: None,
            include_proof_of_service: false,
            sequential: false,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filingchunk.json");
        std::fs::write(&path, r#"{"chunk": {"max_tokens": 500, "min_tokens": 50}}"#).unwrap();

        let from_file = resolve_config(Some(path.as_path()), &no_overrides()).unwrap();
        assert_eq!(from_file.chunk.max_tokens, 500);
        assert!(from_file.chunk.exclude_proof_of_service);
        assert!(from_file.parallel);

        let overrides = ChunkOverrides {
            max_tokens: Some(300),
            include_proof_of_service: true,
            sequential: true,
            ..no_overrides()
        };
        let config = resolve_config(Some(path.as_path()), &overrides).unwrap();
        assert_eq!(config.chunk.max_tokens, 300);
        assert_eq!(config.chunk.min_tokens, 50);
        assert!(!config.chunk.exclude_proof_of_service);
        assert!(!config.parallel);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_config(Some(dir.path().join("absent.json").as_path()), &no_overrides()).is_err());
    }
}
