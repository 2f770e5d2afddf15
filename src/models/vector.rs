//! The embedding table written by the vector database builder.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VectorDbError;

/// Column order of the table on disk.
pub const VECTOR_COLUMNS: [&str; 5] =
    ["file_id", "chunk_id", "text", "vector_embedding", "section"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRow {
    pub file_id: String,
    pub chunk_id: u32,
    pub text: String,
    #[serde(
        serialize_with = "serialize_embedding",
        deserialize_with = "deserialize_embedding"
    )]
    pub vector_embedding: Vec<f32>,
    #[serde(default)]
    pub section: String,
}

fn serialize_embedding<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
    let joined = values
        .iter()
        .map(f32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    serializer.serialize_str(&joined)
}

fn deserialize_embedding<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(serde::de::Error::custom))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorTable {
    pub rows: Vec<VectorRow>,
}

impl VectorTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct files represented in the table.
    pub fn file_count(&self) -> usize {
        let mut ids: Vec<&str> = self.rows.iter().map(|r| r.file_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn read_csv(path: &Path) -> Result<Self, VectorDbError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<VectorRow>, csv::Error>>()?;
        Ok(Self { rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), VectorDbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        // serialize() only emits the header alongside the first row.
        if self.rows.is_empty() {
            writer.write_record(VECTOR_COLUMNS)?;
        }
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query_vector_db.csv");
        let table = VectorTable {
            rows: vec![
                VectorRow {
                    file_id: "215416146".to_string(),
                    chunk_id: 0,
                    text: "Dense retrieval, revisited, with commas".to_string(),
                    vector_embedding: vec![0.1, -0.25, 3.5e-7],
                    section: String::new(),
                },
                VectorRow {
                    file_id: "215416146".to_string(),
                    chunk_id: 1,
                    text: "It's 'quoted'".to_string(),
                    vector_embedding: vec![1.0],
                    section: "Results".to_string(),
                },
            ],
        };
        table.write_csv(&path).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("file_id,chunk_id,text,vector_embedding,section\n"));

        let loaded = VectorTable::read_csv(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.file_count(), 1);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        VectorTable::default().write_csv(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "file_id,chunk_id,text,vector_embedding,section\n"
        );
        assert!(VectorTable::read_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_reads_bracketed_embedding_without_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "file_id,chunk_id,text,vector_embedding\n42,0,hello,\"[0.5, 0.25]\"\n",
        )
        .unwrap();
        let table = VectorTable::read_csv(&path).unwrap();
        assert_eq!(table.rows[0].vector_embedding, vec![0.5, 0.25]);
        assert_eq!(table.rows[0].section, "");
    }
}
