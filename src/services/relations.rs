//! Relationships between query, candidate and retrieved papers.
//!
//! Reads the candidate→retrieved link log, the query→candidate qrels and the
//! classification meta, then writes the valid pairs, the citation matrix and
//! the classification joins.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::MatrixError;
use crate::utils::file::pdf_path_for;

pub const VALID_PAIRS_FILE: &str = "valid_query_candidate_pairs.csv";
pub const MATRIX_FILE: &str = "candidate_retrieved_citation_matrix.csv";
pub const QUERY_CLASSIFICATIONS_FILE: &str = "query_candidate_classifications.jsonl";
pub const CANDIDATE_CLASSIFICATIONS_FILE: &str = "candidate_retrieved_classifications.jsonl";

/// Field-of-study labels used by the classification meta. There is no label 10.
const FIELD_LABELS: &[(u32, &str)] = &[
    (0, "Agricultural and Food sciences"),
    (1, "Art"),
    (2, "Biology"),
    (3, "Business"),
    (4, "Chemistry"),
    (5, "Computer science"),
    (6, "Economics"),
    (7, "Education"),
    (8, "Engineering"),
    (9, "Environmental science"),
    (11, "Geology"),
    (12, "History"),
    (13, "Law"),
    (14, "Linguistics"),
    (15, "Materials science"),
    (16, "Mathematics"),
    (17, "Medicine"),
    (18, "Philosophy"),
    (19, "Physics"),
    (20, "Political science"),
    (21, "Psychology"),
    (22, "Sociology"),
];

pub fn label_name(label: u32) -> Option<&'static str> {
    FIELD_LABELS
        .iter()
        .find(|(id, _)| *id == label)
        .map(|(_, name)| *name)
}

fn label_names(labels: &[u32]) -> Vec<String> {
    labels
        .iter()
        .map(|l| label_name(*l).map_or_else(|| format!("unknown({l})"), str::to_string))
        .collect()
}

fn parse_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        // Spreadsheet round trips turn IDs into `123.0`.
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0)
            .map(|v| v as u64)
    })
}

/// One `candidate\tretrieved` line of the link log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationLink {
    pub candidate: u64,
    pub retrieved: u64,
}

pub fn parse_links<R: BufRead>(reader: R) -> Result<Vec<CitationLink>, MatrixError> {
    let mut links = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        match (
            fields.next().and_then(parse_id),
            fields.next().and_then(parse_id),
        ) {
            (Some(candidate), Some(retrieved)) => links.push(CitationLink {
                candidate,
                retrieved,
            }),
            _ => warn!(line = lineno + 1, content = %line, "skipping malformed link row"),
        }
    }
    Ok(links)
}

pub fn read_links(path: &Path) -> Result<Vec<CitationLink>, MatrixError> {
    parse_links(BufReader::new(File::open(path)?))
}

/// One `query candidate relevance` line of a qrel file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrelRecord {
    pub query: u64,
    pub candidate: u64,
    #[serde(rename = "bool")]
    pub relevance: String,
}

pub fn parse_qrels<R: BufRead>(reader: R) -> Result<Vec<QrelRecord>, MatrixError> {
    let mut qrels = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        match (
            fields.first().and_then(|f| parse_id(f)),
            fields.get(1).and_then(|f| parse_id(f)),
        ) {
            (Some(query), Some(candidate)) => qrels.push(QrelRecord {
                query,
                candidate,
                relevance: fields.get(2).map(|s| s.to_string()).unwrap_or_default(),
            }),
            _ => warn!(line = lineno + 1, content = %line, "skipping malformed qrel row"),
        }
    }
    Ok(qrels)
}

pub fn read_qrels(path: &Path) -> Result<Vec<QrelRecord>, MatrixError> {
    parse_qrels(BufReader::new(File::open(path)?))
}

/// Qrel rows whose query and candidate PDFs are both on disk.
pub fn valid_pairs(qrels: &[QrelRecord], query_dir: &Path, candidate_dir: &Path) -> Vec<QrelRecord> {
    qrels
        .iter()
        .filter(|r| {
            pdf_path_for(query_dir, &r.query.to_string()).is_file()
                && pdf_path_for(candidate_dir, &r.candidate.to_string()).is_file()
        })
        .cloned()
        .collect()
}

/// Distinct queries in first-seen order.
pub fn unique_queries(pairs: &[QrelRecord]) -> Vec<u64> {
    let mut seen = HashSet::new();
    pairs
        .iter()
        .filter(|r| seen.insert(r.query))
        .map(|r| r.query)
        .collect()
}

pub fn write_valid_pairs(path: &Path, pairs: &[QrelRecord]) -> Result<(), MatrixError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["query", "candidate", "bool"])?;
    for pair in pairs {
        writer.write_record([
            pair.query.to_string(),
            pair.candidate.to_string(),
            pair.relevance.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MetaLine {
    corpus_id: u64,
    #[serde(default)]
    labels: Vec<u32>,
}

/// Field-of-study labels per corpus ID. The first line for an ID wins.
#[derive(Debug, Clone, Default)]
pub struct Classifications {
    labels: HashMap<u64, Vec<u32>>,
}

impl Classifications {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, MatrixError> {
        let mut labels = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MetaLine>(&line) {
                Ok(meta) => {
                    labels.entry(meta.corpus_id).or_insert(meta.labels);
                }
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed meta line"),
            }
        }
        Ok(Self { labels })
    }

    pub fn read_jsonl(path: &Path) -> Result<Self, MatrixError> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    pub fn labels(&self, corpus_id: u64) -> Option<&[u32]> {
        self.labels.get(&corpus_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Labels of two related papers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelledPair {
    pub source: u64,
    pub source_labels: Vec<u32>,
    pub source_fields: Vec<String>,
    pub target: u64,
    pub target_labels: Vec<u32>,
    pub target_fields: Vec<String>,
}

impl LabelledPair {
    fn new(source: u64, source_labels: &[u32], target: u64, target_labels: &[u32]) -> Self {
        Self {
            source,
            source_labels: source_labels.to_vec(),
            source_fields: label_names(source_labels),
            target,
            target_labels: target_labels.to_vec(),
            target_fields: label_names(target_labels),
        }
    }
}

/// For each classified query, pair its labels with every related classified
/// candidate.
pub fn query_candidate_classifications(
    pairs: &[QrelRecord],
    meta: &Classifications,
) -> Vec<LabelledPair> {
    let mut found = Vec::new();
    for query in unique_queries(pairs) {
        let Some(query_labels) = meta.labels(query) else {
            continue;
        };
        for pair in pairs.iter().filter(|p| p.query == query) {
            if let Some(candidate_labels) = meta.labels(pair.candidate) {
                found.push(LabelledPair::new(
                    query,
                    query_labels,
                    pair.candidate,
                    candidate_labels,
                ));
            }
        }
    }
    found
}

/// For each classified candidate, pair its labels with every classified
/// retrieved paper it links to.
pub fn candidate_retrieved_classifications(
    matrix: &CitationMatrix,
    meta: &Classifications,
) -> Vec<LabelledPair> {
    let mut found = Vec::new();
    for &candidate in matrix.candidates() {
        let Some(candidate_labels) = meta.labels(candidate) else {
            continue;
        };
        for retrieved in matrix.retrieved_for(candidate) {
            if let Some(retrieved_labels) = meta.labels(retrieved) {
                found.push(LabelledPair::new(
                    candidate,
                    candidate_labels,
                    retrieved,
                    retrieved_labels,
                ));
            }
        }
    }
    found
}

pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<(), MatrixError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Row-sum statistics of a citation matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixStats {
    pub candidates: usize,
    pub retrieved: usize,
    pub with_retrieved: usize,
    pub without_retrieved: usize,
    /// Computed over rows with at least one retrieved paper.
    pub mean: Option<f64>,
    /// Sample standard deviation; needs at least two rows.
    pub std: Option<f64>,
    pub min: Option<u64>,
    pub max: Option<u64>,
}

/// Binary candidate × retrieved matrix, rows and columns sorted numerically.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationMatrix {
    candidates: Vec<u64>,
    retrieved: Vec<u64>,
    cells: Array2<u8>,
    candidate_index: HashMap<u64, usize>,
    retrieved_index: HashMap<u64, usize>,
}

fn index_of(ids: &[u64]) -> HashMap<u64, usize> {
    ids.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}

impl CitationMatrix {
    fn from_parts(candidates: Vec<u64>, retrieved: Vec<u64>, cells: Array2<u8>) -> Self {
        Self {
            candidate_index: index_of(&candidates),
            retrieved_index: index_of(&retrieved),
            candidates,
            retrieved,
            cells,
        }
    }

    pub fn from_links(links: &[CitationLink]) -> Self {
        let mut candidates: Vec<u64> = links.iter().map(|l| l.candidate).collect();
        candidates.sort_unstable();
        candidates.dedup();
        let mut retrieved: Vec<u64> = links.iter().map(|l| l.retrieved).collect();
        retrieved.sort_unstable();
        retrieved.dedup();

        let mut matrix = Self::from_parts(
            candidates.clone(),
            retrieved.clone(),
            Array2::zeros((candidates.len(), retrieved.len())),
        );
        for link in links {
            let i = matrix.candidate_index[&link.candidate];
            let j = matrix.retrieved_index[&link.retrieved];
            matrix.cells[[i, j]] = 1;
        }
        matrix
    }

    pub fn candidates(&self) -> &[u64] {
        &self.candidates
    }

    pub fn retrieved(&self) -> &[u64] {
        &self.retrieved
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn get(&self, candidate: u64, retrieved: u64) -> bool {
        match (
            self.candidate_index.get(&candidate),
            self.retrieved_index.get(&retrieved),
        ) {
            (Some(&i), Some(&j)) => self.cells[[i, j]] == 1,
            _ => false,
        }
    }

    /// Retrieved papers linked to `candidate`, in column order.
    pub fn retrieved_for(&self, candidate: u64) -> Vec<u64> {
        let Some(&i) = self.candidate_index.get(&candidate) else {
            return Vec::new();
        };
        self.cells
            .row(i)
            .iter()
            .zip(&self.retrieved)
            .filter(|(cell, _)| **cell == 1)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Every `(candidate, retrieved)` pair whose cell is set.
    pub fn links(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.cells
            .indexed_iter()
            .filter(|(_, cell)| **cell == 1)
            .map(|((i, j), _)| (self.candidates[i], self.retrieved[j]))
    }

    pub fn row_sums(&self) -> Vec<u64> {
        self.cells
            .outer_iter()
            .map(|row| row.iter().map(|&c| u64::from(c)).sum::<u64>())
            .collect()
    }

    pub fn stats(&self) -> MatrixStats {
        let sums: Vec<u64> = self.row_sums().into_iter().filter(|&s| s > 0).collect();
        let (rows, cols) = self.shape();
        let mut stats = MatrixStats {
            candidates: rows,
            retrieved: cols,
            with_retrieved: sums.len(),
            without_retrieved: rows - sums.len(),
            ..Default::default()
        };
        if sums.is_empty() {
            return stats;
        }

        let n = sums.len() as f64;
        let mean = sums.iter().sum::<u64>() as f64 / n;
        stats.mean = Some(mean);
        if sums.len() >= 2 {
            let variance = sums
                .iter()
                .map(|&s| (s as f64 - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            stats.std = Some(variance.sqrt());
        }
        stats.min = sums.iter().min().copied();
        stats.max = sums.iter().max().copied();
        stats
    }

    /// Labelled CSV: an empty corner cell, then retrieved IDs; each row is a
    /// candidate ID followed by its 0/1 cells.
    pub fn write_csv(&self, path: &Path) -> Result<(), MatrixError> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = Vec::with_capacity(self.retrieved.len() + 1);
        header.push(String::new());
        header.extend(self.retrieved.iter().map(u64::to_string));
        writer.write_record(&header)?;

        for (candidate, row) in self.candidates.iter().zip(self.cells.outer_iter()) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(candidate.to_string());
            record.extend(row.iter().map(u8::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a labelled CSV. Cells may be integers or floats; any non-zero
    /// value is a link.
    pub fn read_csv(path: &Path) -> Result<Self, MatrixError> {
        let display = path.display().to_string();
        let parse_error = |line: usize, message: String| MatrixError::Parse {
            path: display.clone(),
            line,
            message,
        };

        let mut reader = csv::Reader::from_path(path)?;
        let retrieved = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|h| parse_id(h).ok_or_else(|| parse_error(1, format!("bad column id {h:?}"))))
            .collect::<Result<Vec<u64>, _>>()?;

        let mut candidates = Vec::new();
        let mut flat = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let line = idx + 2;
            if record.len() != retrieved.len() + 1 {
                return Err(parse_error(
                    line,
                    format!("expected {} fields, got {}", retrieved.len() + 1, record.len()),
                ));
            }
            let candidate = parse_id(&record[0])
                .ok_or_else(|| parse_error(line, format!("bad row id {:?}", &record[0])))?;
            candidates.push(candidate);
            for cell in record.iter().skip(1) {
                let value: f64 = cell
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(line, format!("bad cell {cell:?}")))?;
                flat.push(u8::from(value != 0.0));
            }
        }

        let cells = Array2::from_shape_vec((candidates.len(), retrieved.len()), flat)
            .map_err(|e| parse_error(0, e.to_string()))?;
        Ok(Self::from_parts(candidates, retrieved, cells))
    }
}

/// Inputs of the relations job.
#[derive(Debug, Clone)]
pub struct RelationInputs {
    pub links: PathBuf,
    pub qrels: PathBuf,
    pub meta: PathBuf,
    pub query_dir: PathBuf,
    pub candidate_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationReport {
    pub qrels: usize,
    pub valid_pairs: usize,
    pub unique_queries: usize,
    pub query_candidate_classifications: usize,
    pub candidate_retrieved_classifications: usize,
    pub matrix: MatrixStats,
    pub output_dir: PathBuf,
}

/// Run the full relations job and write its four output files.
pub fn build_relations(
    inputs: &RelationInputs,
    output_dir: &Path,
) -> Result<RelationReport, MatrixError> {
    std::fs::create_dir_all(output_dir)?;

    let links = read_links(&inputs.links)?;
    let qrels = read_qrels(&inputs.qrels)?;
    let meta = Classifications::read_jsonl(&inputs.meta)?;
    debug!(
        links = links.len(),
        qrels = qrels.len(),
        classified = meta.len(),
        "relations inputs loaded"
    );

    let pairs = valid_pairs(&qrels, &inputs.query_dir, &inputs.candidate_dir);
    let queries = unique_queries(&pairs);
    info!(
        valid_pairs = pairs.len(),
        unique_queries = queries.len(),
        "query candidate pairs with files on disk"
    );
    write_valid_pairs(&output_dir.join(VALID_PAIRS_FILE), &pairs)?;

    let query_classes = query_candidate_classifications(&pairs, &meta);
    write_jsonl(&output_dir.join(QUERY_CLASSIFICATIONS_FILE), &query_classes)?;

    let matrix = CitationMatrix::from_links(&links);
    let (rows, cols) = matrix.shape();
    info!(rows, cols, "citation matrix built");
    matrix.write_csv(&output_dir.join(MATRIX_FILE))?;

    let candidate_classes = candidate_retrieved_classifications(&matrix, &meta);
    write_jsonl(
        &output_dir.join(CANDIDATE_CLASSIFICATIONS_FILE),
        &candidate_classes,
    )?;

    Ok(RelationReport {
        qrels: qrels.len(),
        valid_pairs: pairs.len(),
        unique_queries: queries.len(),
        query_candidate_classifications: query_classes.len(),
        candidate_retrieved_classifications: candidate_classes.len(),
        matrix: matrix.stats(),
        output_dir: output_dir.to_path_buf(),
    })
}
