//! Text normalization applied to raw extractor output before chunking.
//!
//! Whitespace is defined by [`char::is_whitespace`] (the Unicode
//! `White_Space` property), so results never depend on locale.

/// Collapse whitespace runs to a single space, drop NUL characters, and trim.
///
/// NULs are removed before collapsing so `"a \0 b"` becomes `"a b"`.
pub fn normalize_text(raw: &str) -> String {
    collapse(raw.chars().filter(|c| *c != '\0'))
}

/// Like [`normalize_text`], but also drops characters outside the word,
/// whitespace, and punctuation classes (control characters, private-use
/// glyphs, stray symbols from broken font maps).
pub fn normalize_text_strict(raw: &str) -> String {
    collapse(raw.chars().filter(|c| is_kept_strict(*c)))
}

fn is_kept_strict(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    if c.is_control() {
        return false;
    }
    c.is_alphanumeric() || c.is_ascii_punctuation() || is_general_punctuation(c)
}

/// Typographic punctuation that shows up in extracted prose: dashes, curly
/// quotes, ellipsis, bullets, guillemets, inverted marks.
fn is_general_punctuation(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{205E}'
            | '«'
            | '»'
            | '¡'
            | '¿'
            | '§'
            | '¶'
            | '·'
    )
}

fn collapse(chars: impl Iterator<Item = char>) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for c in chars {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_mixed_whitespace() {
        assert_eq!(normalize_text("a \t\n b\r\n\nc"), "a b c");
    }

    #[test]
    fn test_trims_edges() {
        assert_eq!(normalize_text("\n\n  hello world \t"), "hello world");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t "), "");
    }

    #[test]
    fn test_removes_nul_without_double_space() {
        assert_eq!(normalize_text("a \0 b"), "a b");
        assert_eq!(normalize_text("ab\0cd"), "abcd");
    }

    #[test]
    fn test_unicode_whitespace() {
        // NBSP, em space, ideographic space
        assert_eq!(normalize_text("one\u{00A0}two\u{2003}three\u{3000}four"), "one two three four");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text("  The  quick\n\nbrown\tfox  ");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_strict_drops_control_and_symbols() {
        let raw = "Price\u{0007}: 10\u{E000} units — “quoted”…";
        assert_eq!(normalize_text_strict(raw), "Price: 10 units — “quoted”…");
    }

    #[test]
    fn test_strict_keeps_non_latin_words() {
        assert_eq!(
            normalize_text_strict("Größe  日本語, déjà-vu!"),
            "Größe 日本語, déjà-vu!"
        );
    }
}
