//! ICS TEXT escaping (RFC 5545 §3.3.11).

/// Escapes text for use as an ICS TEXT value.
///
/// Backslash is escaped first so the escapes added for `;`, `,`, LF and CR
/// are not doubled.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        insta::assert_snapshot!(
            escape_text("Ride; bring lights, water\\snacks\r\nSee you"),
            @r"Ride\; bring lights\, water\\snacks\r\nSee you"
        );
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(escape_text("Group Ride"), "Group Ride");
        assert_eq!(escape_text(""), "");
    }

    #[test]
    fn existing_escape_sequences_are_escaped_again() {
        assert_eq!(escape_text("a\\,b"), "a\\\\\\,b");
    }
}
