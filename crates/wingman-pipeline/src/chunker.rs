//! Splits a token stream into speakable utterances.
//!
//! The first utterance of a run is cut after exactly three words so audio
//! starts before the first sentence is complete. After that, cuts happen at
//! sentence terminators, falling back to clause punctuation when a long
//! sentence keeps growing. Later fragments shorter than [`MIN_CHUNK_CHARS`]
//! are never emitted on their own while more text may follow.

/// Words in the first utterance of a run.
pub const FIRST_CHUNK_WORDS: usize = 3;

/// Shortest utterance emitted mid-stream, in characters.
pub const MIN_CHUNK_CHARS: usize = 6;

/// Buffered characters required before clause punctuation may be used.
pub const CLAUSE_SPLIT_MIN_BUFFER: usize = 60;

/// Shortest clause that may be cut at `,`, `;` or `:`, in characters.
pub const MIN_CLAUSE_CHARS: usize = 20;

#[derive(Debug, Default)]
pub struct SentenceChunker {
    buffer: String,
    first_cut_done: bool,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a token and returns every utterance that became complete.
    pub fn push(&mut self, token: &str) -> Vec<String> {
        self.buffer.push_str(token);

        let mut chunks = Vec::new();
        while let Some(cut) = self.next_cut() {
            let chunk = self.buffer[..cut].trim().to_string();
            self.buffer.drain(..cut);
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
        chunks
    }

    /// Returns the remaining text once the stream has ended.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.first_cut_done = true;
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    /// Byte offset at which the buffer should be cut, if any.
    fn next_cut(&mut self) -> Option<usize> {
        if !self.first_cut_done {
            let end = end_of_word(&self.buffer, FIRST_CHUNK_WORDS)?;
            self.first_cut_done = true;
            return Some(end);
        }

        sentence_cut(&self.buffer).or_else(|| clause_cut(&self.buffer))
    }
}

/// Byte offset just past the `n`th word, once that word is followed by whitespace.
fn end_of_word(text: &str, n: usize) -> Option<usize> {
    let mut words = 0;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word && words == n {
                return Some(idx);
            }
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
        }
    }
    None
}

fn sentence_cut(text: &str) -> Option<usize> {
    boundary_cut(text, &['.', '!', '?'], MIN_CHUNK_CHARS)
}

fn clause_cut(text: &str) -> Option<usize> {
    if char_len(text) < CLAUSE_SPLIT_MIN_BUFFER {
        return None;
    }
    boundary_cut(text, &[',', ';', ':'], MIN_CLAUSE_CHARS)
}

/// First position after a `marks` character that is followed by whitespace
/// and leaves a trimmed prefix of at least `min_chars` characters.
fn boundary_cut(text: &str, marks: &[char], min_chars: usize) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if !marks.contains(&ch) {
            continue;
        }
        let followed_by_space = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if !followed_by_space {
            continue;
        }
        let end = idx + ch.len_utf8();
        if char_len(text[..end].trim()) >= min_chars {
            return Some(end);
        }
    }
    None
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_all(tokens: &[&str]) -> Vec<String> {
        let mut chunker = SentenceChunker::new();
        let mut out: Vec<String> = tokens.iter().flat_map(|t| chunker.push(t)).collect();
        out.extend(chunker.flush());
        out
    }

    fn words(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn first_chunk_is_exactly_three_words_ignoring_punctuation() {
        let chunks = chunk_all(&["Merhaba. Nasılsın? İyi günler."]);
        assert_eq!(chunks[0], "Merhaba. Nasılsın? İyi");
        assert_eq!(chunks, vec!["Merhaba. Nasılsın? İyi", "günler."]);
    }

    #[test]
    fn first_chunk_waits_for_third_word_to_finish() {
        let mut chunker = SentenceChunker::new();
        assert!(chunker.push("Bugün size").is_empty());
        assert!(chunker.push(" algo").is_empty());
        assert!(chunker.push("ritma").is_empty());
        assert_eq!(chunker.push(" soracağım"), vec!["Bugün size algoritma"]);
    }

    #[test]
    fn first_chunk_matches_input_words_for_any_token_split() {
        let text = "Şimdi, iki sayının toplamını bulan bir fonksiyon yaz. Hazır mısın?";
        let expected: Vec<&str> = words(text).into_iter().take(FIRST_CHUNK_WORDS).collect();
        for split in 1..text.len() {
            if !text.is_char_boundary(split) {
                continue;
            }
            let (a, b) = text.split_at(split);
            let chunks = chunk_all(&[a, b]);
            assert_eq!(words(&chunks[0]), expected, "split at {split}");
        }
    }

    #[test]
    fn later_chunks_end_at_sentence_terminators() {
        let text = "Merhaba. Nasılsın? İyi günler. Bugün algoritma konuşacağız! Hazır mısın?";
        let tokens: Vec<String> = text
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let chunks = chunk_all(&refs);

        assert_eq!(
            chunks,
            vec![
                "Merhaba. Nasılsın? İyi",
                "günler.",
                "Bugün algoritma konuşacağız!",
                "Hazır mısın?",
            ]
        );
        for chunk in &chunks[1..] {
            assert!(chunk.ends_with(['.', '!', '?']), "not sentence-bounded: {chunk}");
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn short_sentences_merge_with_following_text() {
        let chunks = chunk_all(&["Bir iki üç. Ok. Peki, devam edelim. "]);
        assert_eq!(chunks, vec!["Bir iki üç.", "Ok. Peki, devam edelim."]);
    }

    #[test]
    fn short_first_chunk_is_still_cut_at_three_words() {
        let chunks = chunk_all(&["O da ne? Bunu bir düşünelim. "]);
        assert_eq!(chunks, vec!["O da ne?", "Bunu bir düşünelim."]);

        let chunks = chunk_all(&["A b c d e f g. Sonra devam ediyoruz. "]);
        assert_eq!(chunks, vec!["A b c", "d e f g.", "Sonra devam ediyoruz."]);
    }

    #[test]
    fn minimum_length_applies_after_the_first_chunk() {
        let chunks = chunk_all(&["A b c d. Tamam o zaman devam. "]);
        assert_eq!(chunks, vec!["A b c", "d. Tamam o zaman devam."]);
    }

    #[test]
    fn decimals_and_ellipses_do_not_split() {
        let chunks = chunk_all(&["Sonuç şu: pi 3.14 civarında... Doğru mu? "]);
        assert_eq!(
            chunks,
            vec!["Sonuç şu: pi", "3.14 civarında...", "Doğru mu?"]
        );
    }

    #[test]
    fn long_clause_splits_at_comma_once_buffer_is_large() {
        let text = "İlk üç kelime, sonra çok uzun bir yan cümle geliyor ve bitmiyor, ardından başka bir yan cümle de ekleniyor";
        let chunks = chunk_all(&[text]);
        assert_eq!(chunks[0], "İlk üç kelime,");
        assert_eq!(
            chunks[1],
            "sonra çok uzun bir yan cümle geliyor ve bitmiyor,"
        );
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn short_clause_is_not_cut() {
        let mut chunker = SentenceChunker::new();
        chunker.push("Bir iki üç ");
        let chunks = chunker.push(&format!("kısa, {}", "x".repeat(70)));
        assert!(chunks.is_empty(), "clause under minimum was cut: {chunks:?}");
    }

    #[test]
    fn flush_emits_short_remainder() {
        let mut chunker = SentenceChunker::new();
        assert!(chunker.push("Evet").is_empty());
        assert_eq!(chunker.flush(), Some("Evet".to_string()));
        assert_eq!(chunker.flush(), None);
    }
}
