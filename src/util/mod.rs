/// returns true if the text matches the pattern. `*` matches any run of characters (including an
/// empty one) and `?` matches exactly one character. matching ignores ASCII case, which is how
/// servers compare hostmasks.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .collect::<Vec<_>>();
    let text = text
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .collect::<Vec<_>>();

    let mut p = 0;
    let mut t = 0;
    // pattern index just after the last `*`, and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p + 1, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => {
                let Some((star_p, star_t)) = backtrack else {
                    return false;
                };
                // let the last `*` eat one more character and try again
                p = star_p;
                t = star_t + 1;
                backtrack = Some((star_p, star_t + 1));
            }
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

pub fn has_wildcards(s: &str) -> bool {
    s.contains(['*', '?'])
}
