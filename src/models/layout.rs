//! Document/section/chunk tree built from layout-parser blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LayoutError;

/// One block of the layout parser output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub tag: String,

    #[serde(default)]
    pub level: i64,

    #[serde(default)]
    pub page_idx: i64,

    #[serde(default)]
    pub block_idx: i64,

    #[serde(default)]
    pub sentences: Vec<String>,

    #[serde(default)]
    pub table_rows: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Header,
    Para,
    ListItem,
    Table,
}

impl BlockKind {
    fn parse(tag: &str) -> Result<Self, LayoutError> {
        match tag {
            "header" => Ok(BlockKind::Header),
            "para" => Ok(BlockKind::Para),
            "list_item" => Ok(BlockKind::ListItem),
            "table" => Ok(BlockKind::Table),
            other => Err(LayoutError::UnsupportedBlock(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub tag: String,
    pub level: i64,
    pub page_idx: i64,
    pub block_idx: i64,
    /// Index into [`LayoutDocument::sections`], `None` for top-level sections.
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub kind: BlockKind,
    pub tag: String,
    pub level: i64,
    pub page_idx: i64,
    pub block_idx: i64,
    pub sentences: Vec<String>,
    pub table_rows: Vec<Vec<String>>,
    /// Index into [`LayoutDocument::sections`] of the enclosing section.
    pub parent: Option<usize>,
}

impl Chunk {
    pub fn is_table(&self) -> bool {
        self.kind == BlockKind::Table
    }

    pub fn to_text(&self) -> String {
        if self.is_table() && !self.table_rows.is_empty() {
            return self
                .table_rows
                .iter()
                .map(|cells| cells.join(" | "))
                .collect::<Vec<_>>()
                .join("\n");
        }
        self.sentences.join(" ")
    }

    /// Sentences joined by newlines; the content hashed into the chunk key.
    pub fn sentences_text(&self) -> String {
        self.sentences.join("\n")
    }
}

/// Parsed layout of a single PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutDocument {
    sections: Vec<Section>,
    chunks: Vec<Chunk>,
}

impl LayoutDocument {
    pub fn from_blocks(blocks: Vec<LayoutBlock>) -> Result<Self, LayoutError> {
        let mut doc = Self::default();
        // Open sections, outermost first.
        let mut open: Vec<usize> = Vec::new();

        for block in blocks {
            let kind = BlockKind::parse(&block.tag)?;

            if kind == BlockKind::Header {
                while let Some(&top) = open.last() {
                    if doc.sections[top].level >= block.level {
                        open.pop();
                    } else {
                        break;
                    }
                }
                doc.sections.push(Section {
                    title: block.sentences.first().cloned().unwrap_or_default(),
                    tag: block.tag,
                    level: block.level,
                    page_idx: block.page_idx,
                    block_idx: block.block_idx,
                    parent: open.last().copied(),
                });
                open.push(doc.sections.len() - 1);
                continue;
            }

            let table_rows = if kind == BlockKind::Table {
                block.table_rows.iter().map(row_cells).collect()
            } else {
                Vec::new()
            };

            doc.chunks.push(Chunk {
                kind,
                tag: block.tag,
                level: block.level,
                page_idx: block.page_idx,
                block_idx: block.block_idx,
                sentences: block.sentences,
                table_rows,
                parent: open.last().copied(),
            });
        }

        Ok(doc)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn section(&self, idx: usize) -> Option<&Section> {
        self.sections.get(idx)
    }

    /// Parent section of a chunk.
    pub fn parent_of(&self, chunk: &Chunk) -> Option<&Section> {
        chunk.parent.and_then(|idx| self.sections.get(idx))
    }

    /// Titles from the outermost section down to `idx`.
    pub fn section_path(&self, idx: usize) -> Vec<&str> {
        let mut titles = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            match self.sections.get(i) {
                Some(section) => {
                    titles.push(section.title.as_str());
                    current = section.parent;
                }
                None => break,
            }
        }
        titles.reverse();
        titles
    }

    /// Chunk text prefixed with the titles of its enclosing sections.
    pub fn context_text(&self, chunk: &Chunk) -> String {
        match chunk.parent {
            Some(idx) => format!("{}\n{}", self.section_path(idx).join(" > "), chunk.to_text()),
            None => chunk.to_text(),
        }
    }
}

fn row_cells(row: &Value) -> Vec<String> {
    row.get("cells")
        .and_then(Value::as_array)
        .map(|cells| {
            cells
                .iter()
                .map(|cell| match cell.get("cell_value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect()
        })
        .or_else(|| {
            row.get("cell_value")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(tag: &str, level: i64, block_idx: i64, sentences: &[&str]) -> LayoutBlock {
        LayoutBlock {
            tag: tag.to_string(),
            level,
            page_idx: 0,
            block_idx,
            sentences: sentences.iter().map(|s| s.to_string()).collect(),
            table_rows: Vec::new(),
        }
    }

    #[test]
    fn test_section_hierarchy() {
        let doc = LayoutDocument::from_blocks(vec![
            block("para", 0, 0, &["Preamble."]),
            block("header", 0, 1, &["1 Introduction"]),
            block("para", 1, 2, &["We study things.", "Carefully."]),
            block("header", 1, 3, &["1.1 Motivation"]),
            block("list_item", 2, 4, &["First point."]),
            block("header", 0, 5, &["2 Methods"]),
            block("para", 1, 6, &["We measure."]),
        ])
        .unwrap();

        let sections = doc.sections();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].parent, None);
        assert_eq!(sections[1].parent, Some(0));
        assert_eq!(sections[2].parent, None);

        let chunks = doc.chunks();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].parent, None);
        assert_eq!(chunks[1].parent, Some(0));
        assert_eq!(chunks[2].parent, Some(1));
        assert_eq!(chunks[3].parent, Some(2));
    }

    #[test]
    fn test_context_text() {
        let doc = LayoutDocument::from_blocks(vec![
            block("para", 0, 0, &["Loose text."]),
            block("header", 0, 1, &["Results"]),
            block("header", 1, 2, &["Ablations"]),
            block("para", 2, 3, &["It helps.", "A lot."]),
        ])
        .unwrap();

        let chunks = doc.chunks();
        assert_eq!(doc.context_text(&chunks[0]), "Loose text.");
        assert_eq!(
            doc.context_text(&chunks[1]),
            "Results > Ablations\nIt helps. A lot."
        );
        assert_eq!(chunks[1].sentences_text(), "It helps.\nA lot.");
        assert_eq!(doc.parent_of(&chunks[1]).unwrap().title, "Ablations");
    }

    #[test]
    fn test_table_rows_text() {
        let json = serde_json::json!({
            "tag": "table",
            "level": 1,
            "page_idx": 3,
            "block_idx": 9,
            "table_rows": [
                {"type": "table_header", "cells": [{"cell_value": "Model"}, {"cell_value": "F1"}]},
                {"type": "table_data_row", "cells": [{"cell_value": "Ours"}, {"cell_value": 0.91}]},
                {"type": "full_row", "cell_value": "Averaged over 5 runs"}
            ]
        });
        let block: LayoutBlock = serde_json::from_value(json).unwrap();
        let doc = LayoutDocument::from_blocks(vec![block]).unwrap();
        let chunk = &doc.chunks()[0];
        assert!(chunk.is_table());
        assert_eq!(
            chunk.to_text(),
            "Model | F1\nOurs | 0.91\nAveraged over 5 runs"
        );
    }

    #[test]
    fn test_unknown_block_is_error() {
        let result = LayoutDocument::from_blocks(vec![block("figure", 0, 0, &[])]);
        assert!(matches!(result, Err(LayoutError::UnsupportedBlock(_))));
    }
}
