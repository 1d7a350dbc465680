//! Content-line splitting: `NAME;PARAM=value;...:value`.

/// One unfolded content line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name, upper-cased (`DTSTART`).
    pub name: String,
    /// Parameters in source order; names upper-cased, values unquoted.
    pub params: Vec<(String, String)>,
    /// Raw value with surrounding whitespace trimmed.
    pub value: String,
}

impl ContentLine {
    /// Splits a logical line at the first `:` that is not inside a quoted
    /// parameter value. Returns `None` for lines without a separator.
    pub fn parse(line: &str) -> Option<Self> {
        let colon = find_unquoted(line, ':')?;
        let (head, value) = (&line[..colon], &line[colon + 1..]);

        let mut parts = split_unquoted(head, ';').into_iter();
        let name = parts.next()?.trim().to_ascii_uppercase();
        if name.is_empty() {
            return None;
        }

        let params = parts
            .filter_map(|part| {
                let (key, value) = part.split_once('=')?;
                Some((
                    key.trim().to_ascii_uppercase(),
                    unquote(value.trim()).to_string(),
                ))
            })
            .collect();

        Some(Self {
            name,
            params,
            value: value.trim().to_string(),
        })
    }

    /// Returns the first parameter named `name`, case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut quoted = false;
    for (idx, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == needle && !quoted => return Some(idx),
            _ => {}
        }
    }
    None
}

fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (idx, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_property() {
        let line = ContentLine::parse("SUMMARY:Critical Mass").unwrap();
        assert_eq!(line.name, "SUMMARY");
        assert!(line.params.is_empty());
        assert_eq!(line.value, "Critical Mass");
    }

    #[test]
    fn value_keeps_later_colons() {
        let line = ContentLine::parse("URL:https://example.org:8443/ride").unwrap();
        assert_eq!(line.value, "https://example.org:8443/ride");
    }

    #[test]
    fn parameters_are_parsed() {
        let line = ContentLine::parse("DTSTART;tzid=America/New_York;VALUE=DATE-TIME:20250115T180000")
            .unwrap();
        assert_eq!(line.name, "DTSTART");
        assert_eq!(line.param("TZID"), Some("America/New_York"));
        assert_eq!(line.param("value"), Some("DATE-TIME"));
        assert_eq!(line.value, "20250115T180000");
    }

    #[test]
    fn quoted_parameter_may_contain_separators() {
        let line = ContentLine::parse(
            "ORGANIZER;CN=\"Dallas: Bikes; Trails\";SENT-BY=\"mailto:a@b.org\":mailto:c@d.org",
        )
        .unwrap();
        assert_eq!(line.param("CN"), Some("Dallas: Bikes; Trails"));
        assert_eq!(line.param("SENT-BY"), Some("mailto:a@b.org"));
        assert_eq!(line.value, "mailto:c@d.org");
    }

    #[test]
    fn name_is_case_insensitive_and_trimmed() {
        let line = ContentLine::parse(" summary :  padded value  ").unwrap();
        assert_eq!(line.name, "SUMMARY");
        assert_eq!(line.value, "padded value");
    }

    #[test]
    fn rejects_lines_without_separator() {
        assert_eq!(ContentLine::parse("NOT A PROPERTY"), None);
        assert_eq!(ContentLine::parse(":orphan value"), None);
    }
}
