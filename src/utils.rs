// src/utils.rs
// Utility functions for MIG Pool Indexer

/// Creates a vector of (start_block, end_block) tuples for a given range and chunk size.
/// Used to pre-partition a long scan into windows; the last chunk may be shorter.
pub fn create_block_chunks(from_block: u64, to_block: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let mut chunks = Vec::new();
    if chunk_size == 0 || from_block > to_block {
        return chunks;
    }
    let mut current_from = from_block;
    loop {
        let current_to = current_from.saturating_add(chunk_size - 1).min(to_block);
        chunks.push((current_from, current_to));
        if current_to == to_block {
            break;
        }
        current_from = current_to + 1;
    }
    chunks
}

/// Truncates explorer payloads before they end up in logs or error messages.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
