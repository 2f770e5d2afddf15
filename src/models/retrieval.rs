//! Retrieval log parsing.
//!
//! A retrieval log is a tab-separated file of `score\tquery\tcandidate` rows,
//! ranked per query. A score of exactly `1.000000` marks the query retrieving
//! itself and is dropped.

use std::collections::HashMap;
use std::io::BufRead;

use tracing::warn;

/// Score string that marks a self-match.
pub const SELF_MATCH_SCORE: &str = "1.000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCandidates {
    pub query: String,
    pub candidates: Vec<String>,
}

/// Candidate lists grouped by query, in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalSet {
    entries: Vec<QueryCandidates>,
    index: HashMap<String, usize>,
}

impl RetrievalSet {
    pub fn parse<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut set = Self::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                warn!(line = line_no + 1, "skipping malformed retrieval row");
                continue;
            }

            if fields[0] == SELF_MATCH_SCORE {
                continue;
            }

            set.push(fields[1].trim(), fields[2].trim());
        }

        Ok(set)
    }

    pub fn push(&mut self, query: &str, candidate: &str) {
        let idx = match self.index.get(query) {
            Some(&idx) => idx,
            None => {
                self.entries.push(QueryCandidates {
                    query: query.to_string(),
                    candidates: Vec::new(),
                });
                self.index.insert(query.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[idx].candidates.push(candidate.to_string());
    }

    pub fn candidates(&self, query: &str) -> Option<&[String]> {
        self.index
            .get(query)
            .map(|&idx| self.entries[idx].candidates.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryCandidates> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.entries.iter().map(|e| e.candidates.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_matches_excluded_and_grouped_in_order() {
        let log = "1.000000\tq1\tq1\n\
                   0.912345\tq1\tc3\n\
                   0.800000\tq2\tc9\n\
                   0.700000\tq1\tc1\n\
                   1.000000\tq2\tq2\n";
        let set = RetrievalSet::parse(log.as_bytes()).unwrap();

        assert_eq!(set.len(), 2);
        let queries: Vec<&str> = set.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["q1", "q2"]);
        assert_eq!(set.candidates("q1").unwrap(), ["c3", "c1"]);
        assert_eq!(set.candidates("q2").unwrap(), ["c9"]);
        assert_eq!(set.candidate_count(), 3);
    }

    #[test]
    fn test_only_exact_score_string_is_excluded() {
        let log = "1.0\tq1\tc1\n1.0000001\tq1\tc2\n1.000000\tq1\tc3\n 1.000000\tq1\tc4\n";
        let set = RetrievalSet::parse(log.as_bytes()).unwrap();
        assert_eq!(set.candidates("q1").unwrap(), ["c1", "c2", "c4"]);
    }

    #[test]
    fn test_fields_are_trimmed_and_malformed_rows_skipped() {
        let log = "0.5\t q1 \t c1\r\n\nnot-a-row\n0.4\tq1\n";
        let set = RetrievalSet::parse(log.as_bytes()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.candidates("q1").unwrap(), ["c1"]);
    }

    #[test]
    fn test_query_with_only_self_match_is_absent() {
        let set = RetrievalSet::parse("1.000000\tq1\tq1\n".as_bytes()).unwrap();
        assert!(set.is_empty());
        assert!(set.candidates("q1").is_none());
    }
}
