pub trait StrExt {
    fn split_prefix(&self, c: char) -> Option<(char, &str)>;

    /// collapses every run of spaces (and tabs) into a single space, except inside the trailing
    /// parameter, which is copied through untouched. leading and trailing whitespace before the
    /// trailing parameter is removed.
    fn normalize_irc_spaces(&self) -> String;
}

impl StrExt for str {
    fn split_prefix(&self, c: char) -> Option<(char, &str)> {
        if self.starts_with(c) {
            Some((c, &self[c.len_utf8()..]))
        } else {
            None
        }
    }

    fn normalize_irc_spaces(&self) -> String {
        let s = self.trim_start_matches([' ', '\t']);

        // a leading `:` introduces the source, not the trailing param, so the search for the
        // trailing param has to start after it.
        let search_from = if s.starts_with(':') { 1 } else { 0 };
        let trailing_idx = s[search_from..]
            .match_indices([' ', '\t'])
            .map(|(idx, _)| idx + search_from)
            .find(|&idx| s[idx + 1..].starts_with(':'));

        let (head, trailing) = match trailing_idx {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };

        let mut out = head.split([' ', '\t']).filter(|part| !part.is_empty()).fold(
            String::with_capacity(s.len()),
            |mut out, part| {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(part);
                out
            },
        );
        if let Some(trailing) = trailing {
            out.push(' ');
            out.push_str(trailing);
        }
        out
    }
}
