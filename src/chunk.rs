//! Greedy word-packing text chunker.
//!
//! Splits extracted document text into chunks of at most `max_chars`
//! characters. Splitting happens on runs of whitespace; words are packed
//! into the current chunk (joined by a single space) until the next word
//! would push it past the bound, at which point the chunk is sealed and a
//! new one starts with that word.
//!
//! Original spacing is not preserved. A word longer than `max_chars` is
//! never split and ends up alone in an over-long chunk.

/// Split text into bounded chunks in document order.
///
/// Returns an empty vector when `text` contains no words.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        // +1 for the joining space
        let would_be = if current_buf.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
            current_len = 0;
        }

        if !current_buf.is_empty() {
            current_buf.push(' ');
            current_len += 1;
        }
        current_buf.push_str(word);
        current_len += word_len;
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 800);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 800).is_empty());
        assert!(chunk_text("  \n\t  ", 800).is_empty());
    }

    #[test]
    fn test_each_word_seals_previous_chunk() {
        let chunks = chunk_text("a aaaa bbbb cccc", 4);
        assert_eq!(chunks, vec!["a", "aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn test_exact_fit_stays_in_one_chunk() {
        // "ab cd" is exactly 5 chars
        let chunks = chunk_text("ab cd ef", 5);
        assert_eq!(chunks, vec!["ab cd", "ef"]);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunks = chunk_text("  Leave\n\npolicy\t applies   here ", 800);
        assert_eq!(chunks, vec!["Leave policy applies here"]);
    }

    #[test]
    fn test_oversized_word_gets_own_chunk() {
        let long = "x".repeat(20);
        let text = format!("small {} tail", long);
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks, vec!["small".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn test_oversized_first_word_emits_no_empty_chunk() {
        let chunks = chunk_text("abcdefghij k", 3);
        assert_eq!(chunks, vec!["abcdefghij", "k"]);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Each word is 4 chars but 8 bytes
        let chunks = chunk_text("éééé üüüü", 9);
        assert_eq!(chunks, vec!["éééé üüüü"]);
    }

    #[test]
    fn test_coverage_preserves_word_order() {
        let text = (0..400)
            .map(|i| format!("word{} ", i))
            .collect::<String>();
        let chunks = chunk_text(&text, 37);
        let rejoined = chunks.join(" ");
        assert_eq!(words(&rejoined), words(&text));
    }

    #[test]
    fn test_bound_respected_except_single_long_words() {
        let text = "The quick brown fox jumps over the lazy dog \
                    supercalifragilisticexpialidocious and then some more words";
        let bound = 12;
        for chunk in chunk_text(text, bound) {
            let len = chunk.chars().count();
            assert!(
                len <= bound || !chunk.contains(' '),
                "chunk {:?} exceeds bound {}",
                chunk,
                bound
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(chunk_text(text, 11), chunk_text(text, 11));
    }
}
