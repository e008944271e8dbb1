use lerecherche::ContextChunk;

const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// Truncate to at most `max_chars` characters, marking the cut.
pub fn truncate(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some((byte_idx, _)) => {
            let mut out = input[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// Render chunks as numbered fragments with provenance.
///
/// Whole fragments are dropped once the budget is reached; a single oversized
/// first fragment is truncated instead.
pub fn context_block(chunks: &[ContextChunk], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        let fragment = format!(
            "[Fragment {} | {} p.{}]\n{}",
            i + 1,
            chunk.source_document,
            chunk.page_number,
            chunk.content.trim()
        );
        let separator = if out.is_empty() { "" } else { "\n\n---\n\n" };
        let cost = separator.chars().count() + fragment.chars().count();

        if used + cost > max_chars {
            if out.is_empty() {
                return truncate(&fragment, max_chars);
            }
            break;
        }
        out.push_str(separator);
        out.push_str(&fragment);
        used += cost;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let value = truncate("garantía", 6);
        assert!(value.starts_with("garant"));
        assert!(value.ends_with("[...truncated]"));
    }

    #[test]
    fn context_block_numbers_fragments() {
        let chunks = vec![
            ContextChunk::new("pliego.pdf", 3, "Plazo: 90 días"),
            ContextChunk::new("anexo.pdf", 1, "Garantía 10%"),
        ];
        let block = context_block(&chunks, 10_000);
        assert!(block.starts_with("[Fragment 1 | pliego.pdf p.3]\nPlazo: 90 días"));
        assert!(block.contains("---\n\n[Fragment 2 | anexo.pdf p.1]"));
    }

    #[test]
    fn context_block_drops_fragments_over_budget() {
        let chunks = vec![
            ContextChunk::new("a", 1, "x".repeat(50)),
            ContextChunk::new("a", 2, "y".repeat(50)),
        ];
        let block = context_block(&chunks, 90);
        assert!(block.contains("Fragment 1"));
        assert!(!block.contains("Fragment 2"));

        let tiny = context_block(&chunks, 10);
        assert!(tiny.contains("truncated"));
    }
}
