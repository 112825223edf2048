//! Normalized string similarity.
//!
//! [`ratio`] implements the Ratcliff/Obershelp "gestalt" measure: the
//! longest common substring is matched first, then both remaining sides are
//! matched recursively. The score is `2 * matched / (len(a) + len(b))`, so it
//! ranges from 0.0 (nothing in common) to 1.0 (identical after
//! normalization).

/// Similarity of two strings in `[0.0, 1.0]`, ignoring case and runs of
/// whitespace.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn normalize(s: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Leftmost longest common substring as `(start_a, start_b, len)`.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // prev[j + 1] holds the run length ending at a[i - 1], b[j].
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let run = curr[j + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}
