//! Language codes for name variants.
//!
//! Id 0 is reserved for category pseudo-names (see [`crate::consts::CATEGORY_LANG`]).

const LANGUAGES: &[&str] = &[
    "", "en", "ru", "de", "fr", "es", "it", "pl", "uk", "be", "ja", "ko", "zh", "ar", "pt", "nl",
    "sv", "fi", "cs", "tr", "el", "he", "hu", "ro",
];

pub fn lang_index(code: &str) -> Option<u8> {
    if code.is_empty() { return None; }
    LANGUAGES.iter().position(|c| *c == code).map(|i| i as u8)
}

pub fn lang_code(id: u8) -> Option<&'static str> {
    match id {
        0 => None,
        _ => LANGUAGES.get(id as usize).copied(),
    }
}
