//! "Did you mean" suggestions for mistyped command names.

/// Largest edit distance still worth suggesting.
pub const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Levenshtein distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b.len() + 1];

    for (i, a_char) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}

/// Closest candidate within [`MAX_SUGGESTION_DISTANCE`], comparing case-insensitively.
/// Ties go to the candidate that comes first.
pub fn suggest<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let input = input.to_lowercase();
    let mut best: Option<(&str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein(&input, &candidate.to_lowercase());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.filter(|(_, distance)| *distance <= MAX_SUGGESTION_DISTANCE)
        .map(|(candidate, _)| candidate)
}
