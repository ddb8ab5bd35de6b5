//! Post-OCR text cleanup.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Characters OCR tends to hallucinate from table rules and specks.
const STRAY_CHARS: [char; 4] = ['|', '\\', '~', '`'];

/// Turkish diacritic fixups. Every entry maps a letter to itself, so this is
/// currently a no-op; the intended confusions (`i`/`ı`, `s`/`ş`, ...) have not
/// been decided.
const DIACRITIC_FIXUPS: [(char, char); 12] = [
    ('ı', 'ı'),
    ('İ', 'İ'),
    ('ş', 'ş'),
    ('Ş', 'Ş'),
    ('ğ', 'ğ'),
    ('Ğ', 'Ğ'),
    ('ü', 'ü'),
    ('Ü', 'Ü'),
    ('ö', 'ö'),
    ('Ö', 'Ö'),
    ('ç', 'ç'),
    ('Ç', 'Ç'),
];

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Clean raw OCR text: collapse whitespace, drop stray characters and
/// capitalize sentence starts.
///
/// Only the first letter of each `". "`-separated segment is uppercased; the
/// rest keeps its case, so `"hELLO wORLD. fOO"` becomes `"HELLO wORLD. FOO"`.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let collapsed = whitespace_run().replace_all(text, " ");
    let stripped: String = collapsed.chars().filter(|c| !STRAY_CHARS.contains(c)).collect();
    let fixed: String = stripped.chars().map(fix_diacritic).collect();

    // Stripping may leave double spaces behind.
    let normalized = fixed.split_whitespace().collect::<Vec<_>>().join(" ");

    let cleaned = normalized
        .split(". ")
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(". ")
        .trim()
        .to_string();

    debug!("Text cleaning completed, final length: {}", cleaned.len());
    cleaned
}

fn fix_diacritic(c: char) -> char {
    DIACRITIC_FIXUPS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

/// Uppercase the first character, leave the rest as is.
fn capitalize_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(clean_text("a   b\n\nc"), "a b c");
        assert_eq!(clean_text("\t  lead and trail \n"), "Lead and trail");
    }

    #[test]
    fn test_capitalizes_sentences() {
        assert_eq!(clean_text("hello. world."), "Hello. World.");
        assert_eq!(clean_text("poliçe no. şirket adı"), "Poliçe no. Şirket adı");
    }

    #[test]
    fn test_keeps_existing_case() {
        assert_eq!(clean_text("Poliçe No: AB-12345"), "Poliçe No: AB-12345");
    }

    #[test]
    fn test_segment_tail_keeps_its_case() {
        assert_eq!(clean_text("hELLO wORLD. fOO bAR"), "HELLO wORLD. FOO bAR");
    }

    #[test]
    fn test_strips_stray_characters() {
        assert_eq!(clean_text("| Ad ~ Soyad `x` \\ y"), "Ad Soyad x y");
    }

    #[test]
    fn test_diacritics_are_untouched() {
        let text = "Işık Ömür Çağrı Şükrü İğde";
        assert_eq!(clean_text(text), text);
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\t "), "");
        assert_eq!(clean_text("|||"), "");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("ışık"), "Işık");
        assert_eq!(capitalize_first(""), "");
        assert_eq!(capitalize_first("1. madde"), "1. madde");
    }
}
