//! File and hashing utilities shared by the jobs.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 32-hex-character digest of `content`, used for graph node keys.
pub fn content_hash(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(&hash[..16])
}

/// Collect the files directly under `dir` whose name matches `pattern`
/// (e.g. `*.pdf`), sorted by path.
pub fn collect_pdfs(dir: &Path, pattern: &str) -> std::io::Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if pattern.matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// `{dir}/{id}.pdf`
pub fn pdf_path_for(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.pdf"))
}

/// The identifier of a PDF, i.e. its file stem.
pub fn file_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Read one identifier per line, skipping blank lines.
pub fn read_id_list(path: &Path) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
