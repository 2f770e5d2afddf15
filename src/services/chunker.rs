//! Token-bounded text chunking.

use tiktoken_rs::{CoreBPE, Rank};

use crate::error::ChunkError;

/// How many tokens a window may give back to land on a character boundary.
const MAX_BOUNDARY_BACKOFF: usize = 3;

/// Smallest window that can always give back [`MAX_BOUNDARY_BACKOFF`] tokens.
pub const MIN_TOKEN_BUDGET: usize = MAX_BOUNDARY_BACKOFF + 1;

fn check_budget(max_tokens: usize) -> Result<(), ChunkError> {
    if max_tokens < MIN_TOKEN_BUDGET {
        return Err(ChunkError::BudgetTooSmall {
            min: MIN_TOKEN_BUDGET,
            got: max_tokens,
        });
    }
    Ok(())
}

/// Splits text into consecutive windows of at most `max_tokens` BPE tokens.
pub struct TokenChunker {
    bpe: CoreBPE,
    max_tokens: usize,
}

impl std::fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChunker")
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// Load a BPE encoding by name.
pub fn load_encoding(name: &str) -> Result<CoreBPE, ChunkError> {
    let bpe = match name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        other => return Err(ChunkError::UnknownEncoding(other.to_string())),
    };
    bpe.map_err(|e| ChunkError::Load(e.to_string()))
}

impl TokenChunker {
    pub fn new(encoding: &str, max_tokens: u32) -> Result<Self, ChunkError> {
        check_budget(max_tokens as usize)?;
        Ok(Self {
            bpe: load_encoding(encoding)?,
            max_tokens: max_tokens as usize,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into chunks of at most `max_tokens` tokens each.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        self.chunk_with(text, self.max_tokens)
    }

    /// Text of the first `max_tokens` tokens of `text`.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, ChunkError> {
        check_budget(max_tokens)?;
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return Ok(text.to_string());
        }
        let (decoded, _) = self.decode_window(&tokens, 0, max_tokens)?;
        Ok(decoded)
    }

    fn chunk_with(&self, text: &str, max_tokens: usize) -> Result<Vec<String>, ChunkError> {
        let tokens = self.bpe.encode_ordinary(text);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let (decoded, end) = self.decode_window(&tokens, start, max_tokens)?;
            chunks.push(decoded);
            start = end;
        }

        Ok(chunks)
    }

    /// Decode the window `tokens[start..start + max_tokens]`.
    ///
    /// A window end that splits a multi-byte character is moved back by up to
    /// [`MAX_BOUNDARY_BACKOFF`] tokens. Only when no character boundary exists
    /// in those tokens is it moved forward to the next decodable position, so
    /// the window can exceed `max_tokens` by a few tokens. Returns the text
    /// and the end index actually used.
    fn decode_window(
        &self,
        tokens: &[Rank],
        start: usize,
        max_tokens: usize,
    ) -> Result<(String, usize), ChunkError> {
        let full_end = (start + max_tokens).min(tokens.len());
        let lowest = full_end.saturating_sub(MAX_BOUNDARY_BACKOFF).max(start + 1);

        let backward = (lowest..=full_end).rev();
        let forward = (full_end + 1)..=tokens.len();
        let mut last_error = None;

        for end in backward.chain(forward) {
            match self.bpe.decode(tokens[start..end].to_vec()) {
                Ok(text) => return Ok((text, end)),
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        Err(ChunkError::Decode(
            last_error.unwrap_or_else(|| "empty token window".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_tokens: u32) -> TokenChunker {
        TokenChunker::new("cl100k_base", max_tokens).unwrap()
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunker(1000).chunk("Hello, world!").unwrap();
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunker(10).chunk("").unwrap().is_empty());
    }

    #[test]
    fn test_chunks_respect_budget_and_cover_text() {
        let c = chunker(16);
        let text = "Citation recommendation retrieves related papers for a query paper. "
            .repeat(20);
        let chunks = c.chunk(&text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(c.count_tokens(chunk) <= 16);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_multibyte_text_round_trips() {
        let c = chunker(4);
        let text = "Schrödinger’s 猫 — naïve café ∑ résumé 🚀 done";
        let chunks = c.chunk(text).unwrap();
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks {
            assert!(c.count_tokens(chunk) <= 4);
        }
    }

    #[test]
    fn test_truncate() {
        let c = chunker(100);
        let text = "one two three four five six seven eight";
        let truncated = c.truncate(text, 4).unwrap();
        assert_eq!(c.count_tokens(&truncated), 4);
        assert!(text.starts_with(&truncated));
        assert_eq!(c.truncate("short", 8191).unwrap(), "short");
    }

    #[test]
    fn test_unknown_encoding_and_small_budget() {
        assert!(matches!(
            TokenChunker::new("gpt-9", 10),
            Err(ChunkError::UnknownEncoding(_))
        ));
        for budget in [0, 1, 3] {
            assert!(matches!(
                TokenChunker::new("cl100k_base", budget),
                Err(ChunkError::BudgetTooSmall { min: 4, .. })
            ));
        }
        assert!(matches!(
            chunker(100).truncate("one two three four five", 1),
            Err(ChunkError::BudgetTooSmall { got: 1, .. })
        ));
    }
}
