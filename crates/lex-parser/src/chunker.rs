//! Legal-boundary-aware text chunking for embedding.
//!
//! Splits instrument text into overlapping chunks sized by an estimated
//! token count (whitespace words × 1.3). When `respect_boundaries` is on,
//! the splitter scans up to a character target approximating `max_tokens`
//! and prefers the highest-priority boundary whose chunk reaches
//! `min_chunk_tokens`: article markers (`Artículo N.-`, `TRANSITORIOS`,
//! `CAPÍTULO`, `TÍTULO`) over blank-line paragraph breaks over sentence
//! terminators, forcing a split only when none qualifies. All offsets are
//! character offsets, so accented text never splits inside a code point.

use std::sync::LazyLock;

use regex::Regex;

use lex_core::enums::BoundaryType;

/// Rough character width of one estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Boundaries this close to the scan target qualify even below the minimum.
const TARGET_SLACK_CHARS: usize = 10;

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*art[ií]culo\s+\d+[\w\s]*[.\-]").expect("static regex")
});
static TRANSITORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:TRANSITORIOS?|Transitorios?)\b").expect("static regex"));
static CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*cap[ií]tulo\s+[IVXLCDM\d]+").expect("static regex"));
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*t[ií]tulo\s+(?:primero|segundo|tercero|[IVXLCDM\d]+)")
        .expect("static regex")
});
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex"));
static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("static regex"));

/// Chunker sizing and behavior.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chunk_tokens: usize,
    pub respect_boundaries: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 50,
            min_chunk_tokens: 100,
            respect_boundaries: true,
        }
    }
}

/// One produced chunk. `start_char`/`end_char` are character offsets of the
/// scan window in the trimmed input; `content` is the window text trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub token_count: usize,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub boundary_type: BoundaryType,
}

/// Estimate tokens as whitespace words × 1.3.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let estimate = (text.split_whitespace().count() as f64 * 1.3) as usize;
    estimate
}

/// Deterministic text chunker. Identical input always yields identical
/// chunk sequences.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into chunks. Empty or whitespace-only input yields an
    /// empty vec. The final chunk may be smaller than `min_chunk_tokens`.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total_tokens = estimate_tokens(text);

        if total_tokens <= self.config.max_tokens {
            let boundary = if text.contains('\n') {
                BoundaryType::Paragraph
            } else {
                BoundaryType::Sentence
            };
            return vec![Chunk {
                content: text.to_string(),
                token_count: total_tokens,
                chunk_index: 0,
                start_char: 0,
                end_char: chars.len(),
                boundary_type: boundary,
            }];
        }

        let boundaries = detect_boundaries(text);

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        let mut current = 0usize;

        while current < chars.len() {
            let (chunk_end, boundary_type) = self.find_chunk_end(&chars, current, &boundaries);

            let window: String = chars[current..chunk_end].iter().collect();
            let content = window.trim().to_string();
            let content_chars = content.chars().count();

            if !content.is_empty() {
                chunks.push(Chunk {
                    token_count: estimate_tokens(&content),
                    content,
                    chunk_index,
                    start_char: current,
                    end_char: chunk_end,
                    boundary_type,
                });
                chunk_index += 1;
            }

            if self.config.overlap_tokens > 0 && chunk_end < chars.len() {
                let overlap_chars = (self.config.overlap_tokens * CHARS_PER_TOKEN).min(content_chars);
                current = (current + 1).max(chunk_end.saturating_sub(overlap_chars));
            } else {
                current = chunk_end;
            }

            // Progress guard: never re-scan a whole emitted chunk.
            if current <= chunk_end.saturating_sub(content_chars) {
                current = chunk_end;
            }
        }

        chunks
    }

    /// Best end position for the chunk starting at `start`.
    fn find_chunk_end(
        &self,
        chars: &[char],
        start: usize,
        boundaries: &[(usize, BoundaryType)],
    ) -> (usize, BoundaryType) {
        let target_chars = self.config.max_tokens * CHARS_PER_TOKEN;
        let target_end = (start + target_chars).min(chars.len());

        if !self.config.respect_boundaries {
            return (target_end, BoundaryType::Forced);
        }

        let mut best: Option<usize> = None;
        let mut best_type = BoundaryType::Forced;

        for &(pos, btype) in boundaries {
            if pos <= start {
                continue;
            }
            if pos > target_end {
                break;
            }

            let candidate: String = chars[start..pos].iter().collect();
            let token_count = estimate_tokens(candidate.trim());

            if token_count >= self.config.min_chunk_tokens
                || pos >= target_end.saturating_sub(TARGET_SLACK_CHARS)
            {
                let better_priority = btype.priority() > best_type.priority();
                let later_same_priority =
                    best.is_some_and(|b| pos > b) && btype.priority() >= best_type.priority();
                if best.is_none() || better_priority || later_same_priority {
                    best = Some(pos);
                    best_type = btype;
                }
            }
        }

        best.map_or((target_end, BoundaryType::Forced), |pos| (pos, best_type))
    }
}

/// All candidate boundaries as `(char_offset, type)`, sorted by offset.
/// Article-level markers (articles, transitory sections, chapters, titles)
/// all carry article priority.
fn detect_boundaries(text: &str) -> Vec<(usize, BoundaryType)> {
    // Byte offset of every char, for translating regex match offsets.
    let char_starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    let to_char = |byte_idx: usize| char_starts.partition_point(|&b| b < byte_idx);

    let mut boundaries = Vec::new();

    for re in [&*ARTICLE_RE, &*TRANSITORY_RE, &*CHAPTER_RE, &*TITLE_RE] {
        for m in re.find_iter(text) {
            boundaries.push((to_char(m.start()), BoundaryType::Article));
        }
    }
    for m in PARAGRAPH_RE.find_iter(text) {
        boundaries.push((to_char(m.start()), BoundaryType::Paragraph));
    }
    for m in SENTENCE_RE.find_iter(text) {
        boundaries.push((to_char(m.end()), BoundaryType::Sentence));
    }

    boundaries.sort_by_key(|&(pos, btype)| (pos, std::cmp::Reverse(btype.priority())));
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legal_text(articles: usize, words_per_article: usize) -> String {
        let mut out = String::new();
        for n in 1..=articles {
            out.push_str(&format!("Artículo {n}.- "));
            for w in 0..words_per_article {
                out.push_str(&format!("palabra{w} "));
            }
            out.push_str("fin de la disposición.\n\n");
        }
        out
    }

    fn config(max: usize, overlap: usize, min: usize, respect: bool) -> ChunkerConfig {
        ChunkerConfig {
            max_tokens: max,
            overlap_tokens: overlap,
            min_chunk_tokens: min,
            respect_boundaries: respect,
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.chunk(""), vec![]);
        assert_eq!(chunker.chunk("   \n  "), vec![]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("Artículo 1.- Texto breve.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].boundary_type, BoundaryType::Sentence);
        assert_eq!(chunks[0].start_char, 0);
    }

    #[test]
    fn short_multiline_text_reports_paragraph_boundary() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("Primera línea.\nSegunda línea.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].boundary_type, BoundaryType::Paragraph);
    }

    #[test]
    fn splits_at_article_boundaries() {
        let text = legal_text(10, 30);
        let chunker = TextChunker::new(config(100, 0, 20, true));
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.boundary_type, BoundaryType::Article, "{chunk:?}");
        }
        // Every chunk after the first opens at an article marker.
        for chunk in &chunks[1..] {
            assert!(chunk.content.starts_with("Artículo"), "{:?}", chunk.content);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = legal_text(8, 60);
        let chunker = TextChunker::new(config(120, 20, 30, true));
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn zero_overlap_produces_adjacent_chunks() {
        let text = legal_text(10, 40);
        let chunker = TextChunker::new(config(100, 0, 20, true));
        let chunks = chunker.chunk(&text);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_char, pair[0].end_char);
        }
    }

    #[test]
    fn overlap_pulls_next_chunk_back() {
        let text = legal_text(10, 40);
        let chunker = TextChunker::new(config(100, 10, 20, true));
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char < pair[0].end_char);
        }
    }

    #[test]
    fn forced_splits_without_boundaries() {
        let text = "palabra ".repeat(400);
        let chunker = TextChunker::new(config(100, 0, 50, true));
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.boundary_type, BoundaryType::Forced);
        }
    }

    #[test]
    fn respect_boundaries_off_forces_every_split() {
        let text = legal_text(10, 40);
        let chunker = TextChunker::new(config(100, 0, 20, false));
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.boundary_type, BoundaryType::Forced);
        }
    }

    #[test]
    fn text_at_max_tokens_is_single_chunk_without_boundaries() {
        // 100 words ≈ 130 estimated tokens; max set to match exactly.
        let text = "palabra ".repeat(100);
        let tokens = estimate_tokens(&text);
        let chunker = TextChunker::new(config(tokens, 0, 10, false));
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, tokens);
    }

    #[test]
    fn last_chunk_below_minimum_is_still_emitted() {
        let mut text = legal_text(6, 30);
        text.push_str("Artículo 7.- Corto.");
        let chunker = TextChunker::new(config(100, 0, 20, true));
        let chunks = chunker.chunk(&text);
        let last = chunks.last().unwrap();
        assert!(last.content.contains("Corto"));
    }

    #[test]
    fn unicode_survives_chunking() {
        let text = format!(
            "Artículo 1.- Señaló el §12 y ¶3 de la CONSTITUCIÓN. {}",
            "año ñandú educación jurídica. ".repeat(60)
        );
        let chunker = TextChunker::new(config(50, 0, 10, true));
        let chunks = chunker.chunk(&text);
        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
        assert!(rejoined.contains('§'));
        assert!(rejoined.contains('¶'));
        assert!(rejoined.contains("ñandú"));
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
    }

    #[test]
    fn token_estimate_tracks_word_count() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("una"), 1);
        assert_eq!(estimate_tokens("una dos tres cuatro"), 5); // 4 × 1.3 = 5.2 → 5
    }

    #[test]
    fn indexes_are_dense_and_zero_based() {
        let text = legal_text(10, 40);
        let chunker = TextChunker::new(config(100, 10, 20, true));
        let chunks = chunker.chunk(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }
}
