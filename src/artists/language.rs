//! Unicode-block language classification for alias names.
//!
//! A heuristic, not a certainty: a name written only in Latin letters
//! classifies as English whatever its actual language. Kana is checked
//! before the ideograph range because Japanese names routinely mix
//! kanji with kana.

use lazy_static::lazy_static;
use regex::Regex;

use super::Language;

lazy_static! {
    // Hiragana, Katakana, Katakana Phonetic Extensions.
    static ref JAPANESE: Regex =
        Regex::new(r"[\u{3040}-\u{309F}\u{30A0}-\u{30FF}\u{31F0}-\u{31FF}]").unwrap();
    // CJK Unified Ideographs.
    static ref CHINESE: Regex = Regex::new(r"[\u{4E00}-\u{9FFF}]").unwrap();
    // Hangul Syllables.
    static ref KOREAN: Regex = Regex::new(r"[\u{AC00}-\u{D7AF}]").unwrap();
    static ref RUSSIAN: Regex = Regex::new(r"[\u{0400}-\u{04FF}]").unwrap();
    static ref GREEK: Regex = Regex::new(r"[\u{0370}-\u{03FF}]").unwrap();
    static ref ARABIC: Regex = Regex::new(r"[\u{0600}-\u{06FF}]").unwrap();
}

/// Classify `text` by the first matching Unicode block.
pub fn classify(text: &str) -> Language {
    if JAPANESE.is_match(text) {
        Language::Jp
    } else if CHINESE.is_match(text) {
        Language::Zh
    } else if KOREAN.is_match(text) {
        Language::Ko
    } else if RUSSIAN.is_match(text) {
        Language::Ru
    } else if GREEK.is_match(text) {
        Language::El
    } else if ARABIC.is_match(text) {
        Language::Ar
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            ("ホットビーナス", Language::Jp),
            ("ひらがな", Language::Jp),
            // Kanji plus kana classifies as Japanese, not Chinese.
            ("麻弓=タイム", Language::Jp),
            ("张三", Language::Zh),
            ("김철수", Language::Ko),
            ("Иванов", Language::Ru),
            ("Ελένη", Language::El),
            ("فنان", Language::Ar),
            ("plain_latin", Language::En),
            ("", Language::En),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(text), expected, "text: {:?}", text);
        }
    }
}
