/// Normalize a program for string comparison: lowercase, collapse
/// whitespace runs, strip a trailing semicolon.
pub fn normalize_program(program: &str) -> String {
    let lowered = program.trim().trim_end_matches(';').to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Exact-match comparison after normalization.
pub fn exact_match(predicted: &str, gold: &str) -> bool {
    let predicted = normalize_program(predicted);
    !predicted.is_empty() && predicted == normalize_program(gold)
}

/// Order-insensitive result-set comparison: both row sets sorted, then
/// compared cell for cell.
pub fn result_sets_match(mut predicted: Vec<Vec<String>>, mut gold: Vec<Vec<String>>) -> bool {
    predicted.sort();
    gold.sort();
    predicted == gold
}
