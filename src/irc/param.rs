#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    String(String),
    List(Vec<String>),
}

impl Param {
    /// returns the param as a &str, if it was a normal string param
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::String(s) => Some(s),
            Param::List(_) => None,
        }
    }

    /// returns a vec containing the single string parameter, if the param is a string, or returns
    /// the list parameter if the param is a list. this is useful for places where a list is
    /// optional, like JOIN.
    pub fn optional_list(&self) -> Vec<String> {
        match self {
            Param::String(s) => vec![s.to_string()],
            Param::List(list) => list.to_owned(),
        }
    }

    pub fn to_irc_string(&self) -> String {
        match self {
            Param::String(s) => s.to_owned(),
            Param::List(args) => args.join(","),
        }
    }
}

/// splits the parameter section of a message. the input must already have had its whitespace
/// normalized, except for the trailing parameter.
pub(super) fn parse_params(s: &str) -> Vec<Param> {
    let mut params = vec![];

    let mut s = s.trim_start_matches(' ');
    while !s.is_empty() {
        // NOTE: if a parameter starts with a `:`, the rest of the message is a parameter. the last
        // parameter may omit the `:` if it's not necessary to disambiguate.
        if let Some(trailing) = s.strip_prefix(':') {
            params.push(Param::String(trailing.to_string()));
            // ate the rest of the params, return early
            return params;
        }

        let end_idx = s.find(' ').unwrap_or(s.len());
        let param = &s[..end_idx];

        if param.contains(',') {
            let parts = param
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            params.push(Param::List(parts));
        } else {
            params.push(Param::String(param.to_string()));
        }

        s = s[end_idx..].trim_start_matches(' ');
    }

    params
}
