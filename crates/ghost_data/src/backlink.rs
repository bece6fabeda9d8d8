//! Detection of syndicated posts.
//!
//! A post that copies an article from another publication carries a declaration in
//! its code injection header:
//!
//! ```text
//! declaration := ws* "const" ws+ IDENT ws* "=" ws* QUOTE URL QUOTE ws* ";"?
//! QUOTE       := '"' | "'"            (closing quote must equal the opening one)
//! URL         := one or more characters other than QUOTE, '\r' and '\n'
//! ws          := ASCII whitespace
//! ```
//!
//! `IDENT` is fixed per site (`fccOriginalPost` by default) and must not be followed
//! by further identifier characters. The declaration may sit anywhere in the header;
//! the first well-formed one wins. Any other text means "no backlink".

/// Find the original post URL declared for `identifier` in `text`.
pub fn parse_original_post_url<'a>(text: &'a str, identifier: &str) -> Option<&'a str> {
    if identifier.is_empty() {
        return None;
    }
    text.match_indices("const")
        .filter(|(start, _)| *start == 0 || !ends_with_ident_char(&text[..*start]))
        .find_map(|(start, _)| parse_declaration(&text[start + "const".len()..], identifier))
}

fn parse_declaration<'a>(rest: &'a str, identifier: &str) -> Option<&'a str> {
    let after_keyword = rest.trim_start_matches(is_ws);
    if after_keyword.len() == rest.len() {
        return None;
    }

    let after_ident = after_keyword.strip_prefix(identifier)?;
    if after_ident.starts_with(is_ident_char) {
        return None;
    }

    let value = after_ident
        .trim_start_matches(is_ws)
        .strip_prefix('=')?
        .trim_start_matches(is_ws);

    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &value[quote.len_utf8()..];
    let end = body.find(|c: char| c == quote || c == '\n' || c == '\r')?;
    if end == 0 || !body[end..].starts_with(quote) {
        return None;
    }
    Some(&body[..end])
}

/// Slug of the post an original-post URL points at: the last non-empty path segment.
///
/// Query strings and fragments are ignored. URLs without a path yield `None`.
pub fn original_post_slug(url: &str) -> Option<&str> {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let path = match without_suffix.split_once("://") {
        Some((_, after_scheme)) => after_scheme.split_once('/').map(|(_, path)| path)?,
        None => without_suffix,
    };
    path.split('/').rfind(|segment| !segment.is_empty())
}

fn is_ws(c: char) -> bool {
    c.is_ascii_whitespace()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn ends_with_ident_char(text: &str) -> bool {
    text.chars().next_back().is_some_and(is_ident_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENT: &str = "fccOriginalPost";

    #[test]
    fn parses_double_and_single_quoted_declarations() {
        assert_eq!(
            parse_original_post_url(
                r#"<script>const fccOriginalPost = "https://www.example.org/news/hello-world/";</script>"#,
                IDENT
            ),
            Some("https://www.example.org/news/hello-world/")
        );
        assert_eq!(
            parse_original_post_url("const  fccOriginalPost='https://x.org/a'", IDENT),
            Some("https://x.org/a")
        );
    }

    #[test]
    fn semicolon_and_surrounding_whitespace_are_optional() {
        let header = "\n  <script>\n    const\tfccOriginalPost =\n 'https://x.org/a/b'  \n  </script>";
        assert_eq!(parse_original_post_url(header, IDENT), Some("https://x.org/a/b"));
    }

    #[test]
    fn first_well_formed_declaration_wins() {
        let header = "const fccOriginalPost = ; const fccOriginalPost = \"https://x.org/first\"; const fccOriginalPost = \"https://x.org/second\";";
        assert_eq!(parse_original_post_url(header, IDENT), Some("https://x.org/first"));
    }

    #[test]
    fn malformed_declarations_yield_nothing() {
        for header in [
            "",
            "no script here",
            "const fccOriginalPost = https://x.org/a;",
            "const fccOriginalPost = \"https://x.org/a';",
            "const fccOriginalPost = \"\";",
            "const fccOriginalPost = \"https://x.org/\na\";",
            "constfccOriginalPost = \"https://x.org/a\";",
            "const fccOriginalPostId = \"https://x.org/a\";",
            "myconst fccOriginalPost = \"https://x.org/a\";",
            "const otherPost = \"https://x.org/a\";",
        ] {
            assert_eq!(parse_original_post_url(header, IDENT), None, "{header:?}");
        }
    }

    #[test]
    fn slug_is_last_non_empty_segment() {
        assert_eq!(original_post_slug("https://x.org/news/hello-world/"), Some("hello-world"));
        assert_eq!(original_post_slug("https://x.org/news/hello-world"), Some("hello-world"));
        assert_eq!(original_post_slug("https://x.org/news/hello/?ref=1#top"), Some("hello"));
        assert_eq!(original_post_slug("/relative/slug/"), Some("slug"));
    }

    #[test]
    fn urls_without_a_path_have_no_slug() {
        assert_eq!(original_post_slug("https://x.org/"), None);
        assert_eq!(original_post_slug("https://x.org"), None);
        assert_eq!(original_post_slug(""), None);
    }
}
