//! Message chunking for Telegram's per-message length limit.

/// Telegram hard limit for text messages, in characters.
pub const TELEGRAM_MAX_LEN: usize = 4096;

/// Split `text` into chunks of at most `max_len` characters.
///
/// Prefers paragraph boundaries (`\n\n`), then line boundaries (`\n`), then
/// a hard cut on a character boundary. Newlines at a split point are dropped.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let limit = max_len.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset just past the first `limit` characters.
        let Some((cut, _)) = remaining.char_indices().nth(limit) else {
            chunks.push(remaining.to_string());
            break;
        };

        let candidate = &remaining[..cut];
        let split_at = find_split_point(candidate);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
    }

    chunks
}

fn find_split_point(candidate: &str) -> usize {
    if let Some(pos) = candidate.rfind("\n\n")
        && pos > 0
    {
        return pos;
    }
    if let Some(pos) = candidate.rfind('\n')
        && pos > 0
    {
        return pos;
    }
    candidate.len()
}
