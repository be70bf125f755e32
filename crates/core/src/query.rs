use std::sync::OnceLock;

use regex::Regex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimezoneQuery {
    /// Lowercased place token as typed by the user.
    pub place: String,
}

/// Matches `what time is it in <place>?` anywhere in the text, with the
/// question mark ending the message. Trailing whitespace is ignored.
pub fn parse_query(text: &str) -> Option<TimezoneQuery> {
    let captures = query_pattern().captures(text.trim_end())?;
    let place = captures.name("place")?.as_str().to_lowercase();
    Some(TimezoneQuery { place })
}

fn query_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)what time is it in (?P<place>[A-Za-z/_]+)\?$")
            .expect("query pattern is a valid regex")
    })
}
