//! String hygiene for values that end up in the store.

use std::sync::LazyLock;

use regex::Regex;

/// Cap applied to every stored string.
pub const MAX_FIELD_LEN: usize = 255;
pub const MAX_PROJECT_NAME_LEN: usize = 100;
pub const MAX_PROJECT_DESC_LEN: usize = 200;
pub const MAX_TAG_LEN: usize = 32;

/// Tags too generic to be useful for filtering.
const DENIED_TAGS: &[&str] = &["default", "gta5", "fivem", "rdr3", "redm"];

/// In-game color codes, `^0` through `^9`.
static COLOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^[0-9]").expect("valid color code pattern"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid whitespace pattern"));

/// Keep printable ASCII only, trim, and cap at [`MAX_FIELD_LEN`].
pub fn sanitize(input: &str) -> String {
    truncate(&printable(input), MAX_FIELD_LEN)
}

pub fn project_name(input: &str) -> String {
    display_text(input, MAX_PROJECT_NAME_LEN)
}

pub fn project_description(input: &str) -> String {
    display_text(input, MAX_PROJECT_DESC_LEN)
}

/// Whether a normalized (trimmed, lowercased) tag is worth keeping.
pub fn keep_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.len() <= MAX_TAG_LEN && !DENIED_TAGS.contains(&tag)
}

fn display_text(input: &str, max: usize) -> String {
    let stripped = COLOR_CODE.replace_all(input, "");
    let printable = printable(&stripped);
    let collapsed = WHITESPACE_RUN.replace_all(&printable, " ");
    truncate(&collapsed, max)
}

fn printable(input: &str) -> String {
    input
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Input is ASCII at this point, so byte slicing is char-safe.
fn truncate(input: &str, max: usize) -> String {
    if input.len() > max {
        input[..max].trim_end().to_string()
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_non_printable_and_trims() {
        assert_eq!(sanitize("  héllo\twörld\u{1F600} "), "hllowrld");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(400);
        assert_eq!(sanitize(&long).len(), MAX_FIELD_LEN);
    }

    #[test]
    fn project_name_strips_color_codes() {
        assert_eq!(project_name("^1Red ^7White^0"), "Red White");
        assert_eq!(project_name("^^12 up"), "^2 up");
    }

    #[test]
    fn project_name_collapses_spacing() {
        assert_eq!(project_name("Los   Santos \u{2605}  RP"), "Los Santos RP");
    }

    #[test]
    fn description_cap_is_longer_than_name_cap() {
        let long = "word ".repeat(100);
        assert!(project_name(&long).len() <= MAX_PROJECT_NAME_LEN);
        assert!(project_description(&long).len() <= MAX_PROJECT_DESC_LEN);
        assert!(project_description(&long).len() > MAX_PROJECT_NAME_LEN);
    }

    #[test]
    fn tag_rules() {
        assert!(keep_tag("drift"));
        assert!(!keep_tag(""));
        assert!(!keep_tag("default"));
        assert!(!keep_tag(&"x".repeat(MAX_TAG_LEN + 1)));
    }
}
