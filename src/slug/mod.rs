use std::collections::HashSet;

/// Lowercase, URL-safe form of a title. Non-Latin scripts and accents are
/// transliterated to ASCII; titles with nothing usable fall back to `untitled`.
pub fn slugify(title: &str) -> String {
    let out = ::slug::slugify(title);
    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}

/// True when `candidate` is `base` or `base-<n>`.
pub fn is_variant_of(base: &str, candidate: &str) -> bool {
    match candidate.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

/// First free slug in the sequence `base`, `base-1`, `base-2`, ... starting
/// the numbered part at `from` (so a caller that lost an insert race can
/// resume past the slug it collided on).
pub fn next_free(base: &str, taken: &HashSet<String>, from: u32) -> (String, u32) {
    let mut counter = from;
    loop {
        let candidate = if counter == 0 { base.to_string() } else { format!("{base}-{counter}") };
        if !taken.contains(&candidate) {
            return (candidate, counter);
        }
        counter += 1;
    }
}
