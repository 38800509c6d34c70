pub const MAX_BATCH_CHARS: usize = 3500;
pub const MAX_BATCH_LINES: usize = 40;

/// Packs reply lines into newline-joined batches bounded by both a
/// character budget and a line count. Blank lines are dropped; empty input
/// produces no batches so no empty reply is ever sent.
pub fn batch_reply_lines(lines: &[String]) -> Vec<String> {
    let mut batches = Vec::new();
    let mut batch: Vec<&str> = Vec::new();
    let mut char_count = 0usize;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_chars = line.chars().count();
        if char_count + line_chars + 1 > MAX_BATCH_CHARS || batch.len() >= MAX_BATCH_LINES {
            batches.push(batch.join("\n"));
            batch.clear();
            char_count = 0;
        }
        batch.push(line);
        char_count += line_chars + 1;
    }
    if !batch.is_empty() {
        batches.push(batch.join("\n"));
    }
    batches
}
