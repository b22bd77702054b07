/// Score awarded to a fallback candidate whose text matches exactly.
pub const EXACT_TEXT_SCORE: u32 = 10;

/// Score one fallback candidate against the fingerprinted text.
///
/// Only exact equality of the trimmed visible text counts; there is no partial
/// credit.
pub fn score_candidate(candidate_text: &str, expected_text: &str) -> u32 {
    if candidate_text.trim() == expected_text {
        EXACT_TEXT_SCORE
    } else {
        0
    }
}

/// Pick the index of the best-scoring candidate.
///
/// Candidates are visited in document order and the first one to reach a new
/// maximum wins ties. Returns `None` when nothing scores above zero.
pub fn select_best<S: AsRef<str>>(candidate_texts: &[S], expected_text: &str) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (i, text) in candidate_texts.iter().enumerate() {
        let score = score_candidate(text.as_ref(), expected_text);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((i, score));
        }
    }

    best.filter(|&(_, score)| score > 0).map(|(i, _)| i)
}
