use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::models::OutputFormat;
use crate::services::{BuildStats, ChunkMode, FetchStats, IngestReport, RelationReport};

pub trait Formatter {
    fn format_fetch(&self, summary: &FetchSummary) -> String;
    fn format_relations(&self, report: &RelationReport) -> String;
    fn format_embed(&self, summary: &EmbedSummary) -> String;
    fn format_ingest(&self, summary: &IngestSummary) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    #[serde(flatten)]
    pub stats: FetchStats,
    pub directory: PathBuf,
    pub links_file: PathBuf,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedSummary {
    pub output: PathBuf,
    pub mode: ChunkMode,
    pub rows: usize,
    #[serde(flatten)]
    pub stats: BuildStats,
    pub failed_list: Option<PathBuf>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    #[serde(flatten)]
    pub report: IngestReport,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub url: String,
    pub reachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: Option<PathBuf>,
    pub services: Vec<ServiceStatus>,
}

fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_fetch(&self, summary: &FetchSummary) -> String {
        let stats = &summary.stats;
        let mut output = String::new();
        let _ = writeln!(output, "Fetch Complete");
        let _ = writeln!(output, "--------------");
        let _ = writeln!(output, "Queries:          {}", stats.queries);
        let _ = writeln!(output, "Linked:           {}", stats.linked);
        let _ = writeln!(output, "Candidates tried: {}", stats.candidates_tried);
        let _ = writeln!(output, "Not open access:  {}", stats.not_open_access);
        let _ = writeln!(output, "Already present:  {}", stats.already_present);
        let _ = writeln!(output, "Errors:           {}", stats.errors);
        let _ = writeln!(output, "PDF directory:    {}", summary.directory.display());
        let _ = writeln!(output, "Links file:       {}", summary.links_file.display());
        let _ = writeln!(output, "Duration:         {}ms", summary.duration_ms);
        output
    }

    fn format_relations(&self, report: &RelationReport) -> String {
        let stats = &report.matrix;
        let mut output = String::new();
        let _ = writeln!(output, "Relations");
        let _ = writeln!(output, "---------");
        let _ = writeln!(
            output,
            "Query candidate pairs with valid files: {} (of {})",
            report.valid_pairs, report.qrels
        );
        let _ = writeln!(output, "Unique query papers: {}", report.unique_queries);
        let _ = writeln!(
            output,
            "Query/candidate classification pairs: {}",
            report.query_candidate_classifications
        );
        let _ = writeln!(
            output,
            "Candidate/retrieved classification pairs: {}",
            report.candidate_retrieved_classifications
        );
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Citation matrix: {} x {}",
            stats.candidates, stats.retrieved
        );
        let _ = writeln!(
            output,
            "Candidate papers without retrieved data: {}",
            stats.without_retrieved
        );
        let _ = writeln!(
            output,
            "Candidate papers with retrieved data: {}",
            stats.with_retrieved
        );
        let _ = writeln!(output, "  mean: {}", or_dash(stats.mean.map(|v| format!("{v:.3}"))));
        let _ = writeln!(output, "  std:  {}", or_dash(stats.std.map(|v| format!("{v:.3}"))));
        let _ = writeln!(output, "  min:  {}", or_dash(stats.min));
        let _ = writeln!(output, "  max:  {}", or_dash(stats.max));
        let _ = writeln!(output);
        let _ = writeln!(output, "Output directory: {}", report.output_dir.display());
        output
    }

    fn format_embed(&self, summary: &EmbedSummary) -> String {
        let stats = &summary.stats;
        let mut output = String::new();
        if stats.reused {
            let _ = writeln!(
                output,
                "Loaded existing vector table: {} ({} rows, {} files)",
                summary.output.display(),
                summary.rows,
                stats.files
            );
            return output;
        }
        let _ = writeln!(output, "Vector Table Built");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Mode:          {}", summary.mode);
        let _ = writeln!(output, "Files:         {}", stats.files);
        let _ = writeln!(output, "Files failed:  {}", stats.files_failed);
        let _ = writeln!(output, "Chunks:        {}", stats.chunks);
        let _ = writeln!(output, "Chunks failed: {}", stats.chunks_failed);
        let _ = writeln!(output, "Rows written:  {}", summary.rows);
        let _ = writeln!(output, "Output:        {}", summary.output.display());
        if let Some(ref failed) = summary.failed_list {
            let _ = writeln!(output, "Failed list:   {}", failed.display());
        }
        let _ = writeln!(output, "Duration:      {}ms", summary.duration_ms);
        output
    }

    fn format_ingest(&self, summary: &IngestSummary) -> String {
        let report = &summary.report;
        let mut output = String::new();
        let _ = writeln!(output, "Ingest Complete");
        let _ = writeln!(output, "---------------");
        let _ = writeln!(output, "Documents:     {}", report.documents);
        let _ = writeln!(output, "Sections:      {}", report.sections);
        let _ = writeln!(output, "Chunks:        {}", report.chunks);
        let _ = writeln!(output, "Linked chunks: {}", report.linked_chunks);
        let _ = writeln!(output, "Citations:     {}", report.citations);
        let _ = writeln!(output, "Failed:        {}", report.failed.len());
        for path in &report.failed {
            let _ = writeln!(output, "  {}", path.display());
        }
        let _ = writeln!(
            output,
            "Total time:    {:.1}s",
            Duration::from_millis(summary.duration_ms).as_secs_f64()
        );
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");
        let _ = writeln!(
            output,
            "Config: {}",
            status
                .config_path
                .as_ref()
                .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string())
        );
        for service in &status.services {
            let state = if service.reachable {
                "[REACHABLE]"
            } else {
                "[UNREACHABLE]"
            };
            let _ = writeln!(output, "{:<16} {}", service.name, state);
            let _ = writeln!(output, "  URL: {}", service.url);
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_fetch(&self, summary: &FetchSummary) -> String {
        self.render(summary)
    }

    fn format_relations(&self, report: &RelationReport) -> String {
        self.render(report)
    }

    fn format_embed(&self, summary: &EmbedSummary) -> String {
        self.render(summary)
    }

    fn format_ingest(&self, summary: &IngestSummary) -> String {
        self.render(summary)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

/// Progress bar for per-item loops; hidden for JSON output so stdout stays parseable.
pub fn progress_bar(len: u64, format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
