//! Splits replies into segments the messaging transport accepts.
//!
//! Lengths are counted in Unicode scalar values, which is what the gateway's
//! per-message limit is expressed in.

/// Packs the whitespace-separated words of `text` into chunks of at most `max_len` characters.
///
/// Words inside a chunk are joined by single spaces, so joining the chunks with
/// single spaces yields `text` with every whitespace run collapsed. A word longer
/// than `max_len` is the only thing ever cut, into `max_len`-sized pieces.
/// Empty or whitespace-only input yields no chunks. `max_len` of zero is treated as one.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_len).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_len {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Like [`chunk`], but keeps the line structure of `text` inside each chunk.
///
/// Model output is a bulleted list, which reads badly once flattened, so whole
/// lines are packed first and only a line that alone exceeds `max_len` falls back
/// to word packing. Runs of blank lines collapse to one blank line.
pub fn chunk_lines(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut previous_blank = true;

    for raw_line in text.lines() {
        let line = raw_line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !previous_blank {
                current.push('\n');
            }
            previous_blank = true;
            continue;
        }
        previous_blank = false;

        let line_len = line.chars().count();
        if line_len > max_len {
            flush(&mut chunks, &mut current);
            chunks.extend(chunk(&line, max_len));
            continue;
        }

        let joined_len = if current.is_empty() {
            line_len
        } else {
            current.chars().count() + 1 + line_len
        };
        if joined_len > max_len {
            flush(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(chunk("", 10).is_empty());
        assert!(chunk(" \n\t ", 10).is_empty());
        assert!(chunk_lines("\n\n", 10).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk("  sugar,   salt ", 1500), vec!["sugar, salt"]);
    }

    #[test]
    fn test_chunks_respect_limit_and_word_boundaries() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk(text, 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon", "zeta eta", "theta"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 11));
    }

    #[test]
    fn test_round_trip_over_many_limits() {
        let text = "Sugar – ✅ Safe – Natural sweetener\n\nINS 211 – ❌ Avoid – Linked to hyperactivity\tMaltodextrin – ⚠️ Caution – High glycemic index";
        let longest_word = text.split_whitespace().map(|w| w.chars().count()).max().unwrap();
        for limit in longest_word..200 {
            let chunks = chunk(text, limit);
            assert_eq!(chunks.join(" "), normalized(text), "limit {}", limit);
            assert!(chunks.iter().all(|c| c.chars().count() <= limit), "limit {}", limit);
            assert!(chunks.iter().all(|c| !c.is_empty()));
        }
    }

    #[test]
    fn test_oversized_word_is_hard_split() {
        let chunks = chunk("ab abcdefghij cd", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[test]
    fn test_multibyte_characters_count_once() {
        let chunks = chunk("✅✅✅ ❌❌", 3);
        assert_eq!(chunks, vec!["✅✅✅", "❌❌"]);
    }

    #[test]
    fn test_zero_limit_is_total() {
        assert_eq!(chunk("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn test_chunk_lines_keeps_list_layout() {
        let text = "✅ Safe\n- Sugar\n\n\n⚠️ Caution\n- Maltodextrin";
        let chunks = chunk_lines(text, 1500);
        assert_eq!(chunks, vec!["✅ Safe\n- Sugar\n\n⚠️ Caution\n- Maltodextrin"]);
    }

    #[test]
    fn test_chunk_lines_splits_between_lines() {
        let text = "line one\nline two\nline three";
        let chunks = chunk_lines(text, 17);
        assert_eq!(chunks, vec!["line one\nline two", "line three"]);
    }

    #[test]
    fn test_chunk_lines_preserves_words_and_bound() {
        let text = "A very long line that certainly does not fit in twenty characters\nshort";
        let chunks = chunk_lines(text, 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(normalized(&chunks.join(" ")), normalized(text));
    }
}
