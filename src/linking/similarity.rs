//! String similarity used to score candidates.

/// Case folding applied to both sides before comparison.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Compute edit distance between two strings (Levenshtein), over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Edit distance between the case-folded strings divided by the longer
/// original length. Always in [0.0, 1.0]; two empty strings score 0.0.
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let dist = edit_distance(&fold_case(a), &fold_case(b));
    // Folding can change char counts (e.g. 'İ' lowercases to two chars).
    (dist as f64 / longest as f64).min(1.0)
}
