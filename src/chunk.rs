//! Paragraph-boundary text chunker.
//!
//! Splits document body text into bounded, overlapping segments for
//! embedding. Splitting occurs on blank-line boundaries to preserve
//! semantic coherence within each chunk; oversized paragraphs are
//! hard-split into fixed-size char windows as a fallback.
//!
//! [`split`] is deterministic and pure: the same config and text always
//! produce the same segments. All lengths are counted in Unicode scalar
//! values (chars), never bytes.

/// Chunker tuning knobs.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Upper bound on a chunk's char length.
    pub max_chars: usize,
    /// Chars of trailing context carried into the next chunk.
    pub overlap: usize,
    /// Minimum trimmed char length for a chunk to be emitted.
    pub min_chars: usize,
    /// Maximum number of chunks returned; excess is silently dropped.
    pub hard_limit: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap: 200,
            min_chars: 200,
            hard_limit: 200,
        }
    }
}

/// Split text into chunks on paragraph boundaries, respecting `max_chars`.
///
/// Returns an empty vec for blank input or when every candidate chunk
/// falls under `min_chars`. Callers that need "at least one chunk per
/// non-empty document" must substitute the trimmed input themselves.
pub fn split(cfg: &ChunkConfig, content: &str) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    let normalized = content.replace("\r\n", "\n");
    let mut chunks: Vec<String> = Vec::new();
    let mut cur = String::new();

    for para in normalized.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if char_len(&cur) + char_len(para) + 2 <= cfg.max_chars {
            if !cur.is_empty() {
                cur.push_str("\n\n");
            }
            cur.push_str(para);
            continue;
        }

        // Current chunk is full; flush, then seed the next one with
        // trailing context from the flushed text.
        let prev = cur.trim().to_string();
        flush(&mut cur, &mut chunks, cfg.min_chars);

        // The overlap seed is truncated so the seeded chunk still fits
        // within max_chars; the bound wins over context carry-over.
        let room = cfg.max_chars.saturating_sub(char_len(para) + 2);
        let over = tail_chars(&prev, cfg.overlap.min(room));
        if !over.is_empty() {
            cur.push_str(over);
            cur.push_str("\n\n");
        }

        // A single paragraph larger than max_chars gets hard-split into
        // fixed-size char windows, each flushed individually.
        if char_len(para) > cfg.max_chars {
            for window in hard_split(para, cfg.max_chars) {
                if !cur.is_empty() {
                    flush(&mut cur, &mut chunks, cfg.min_chars);
                }
                cur.push_str(&window);
                flush(&mut cur, &mut chunks, cfg.min_chars);
            }
            continue;
        }

        cur.push_str(para);
    }

    if !cur.is_empty() {
        flush(&mut cur, &mut chunks, cfg.min_chars);
    }

    if cfg.hard_limit > 0 && chunks.len() > cfg.hard_limit {
        chunks.truncate(cfg.hard_limit);
    }
    chunks
}

/// Emit the buffer as a chunk if its trimmed length clears `min_chars`.
fn flush(cur: &mut String, chunks: &mut Vec<String>, min_chars: usize) {
    let c = cur.trim().to_string();
    cur.clear();
    if !c.is_empty() && char_len(&c) >= min_chars {
        chunks.push(c);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` chars of `s` as a subslice.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 || s.is_empty() {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s, // fewer than n chars
    }
}

/// Split into windows of at most `max` chars, no overlap.
fn hard_split(s: &str, max: usize) -> Vec<String> {
    if max == 0 {
        return vec![s.to_string()];
    }
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(max)
        .map(|w| w.iter().collect::<String>())
        .collect()
}
