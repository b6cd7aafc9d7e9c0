//! LIKE pattern matching for string filters.
//!
//! `%` stands for any run of characters (possibly empty) and `_` for exactly
//! one. `like` compares case-sensitively; `ilike` lowercases both sides
//! first. Characters are Unicode scalar values, not bytes.

use alloc::string::String;
use alloc::vec::Vec;

/// Case-sensitive LIKE.
///
/// ```
/// use ripple_core::pattern_match::like;
/// assert!(like("todo-42", "todo-%"));
/// assert!(like("v1", "v_"));
/// assert!(!like("Todo", "todo%"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let text: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    match_chars(&text, &pattern)
}

/// Case-insensitive LIKE.
///
/// ```
/// use ripple_core::pattern_match::ilike;
/// assert!(ilike("Hello", "h%O"));
/// ```
pub fn ilike(value: &str, pattern: &str) -> bool {
    let value: String = value.to_lowercase();
    let pattern: String = pattern.to_lowercase();
    like(&value, &pattern)
}

// Greedy matcher that remembers the last `%` and retries from there,
// linear in practice and never recursive.
fn match_chars(v: &[char], p: &[char]) -> bool {
    let (mut vi, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '_' || (p[pi] != '%' && p[pi] == v[vi])) {
            vi += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, vi));
            pi += 1;
        } else if let Some((star_pi, star_vi)) = star {
            pi = star_pi + 1;
            vi = star_vi + 1;
            star = Some((star_pi, star_vi + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
