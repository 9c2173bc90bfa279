/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapse then cap at `cap` characters (not bytes).
pub fn normalize_text(raw: &str, cap: usize) -> String {
    let collapsed = collapse_whitespace(raw);
    if collapsed.chars().count() <= cap {
        collapsed
    } else {
        collapsed.chars().take(cap).collect()
    }
}
