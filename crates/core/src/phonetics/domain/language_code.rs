use std::fmt;

use crate::shared::constants::DEFAULT_IPA_LANGUAGE;

/// Recognizer language hints mapped to espeak-ng voices. Targets that
/// differ from the key pick espeak's regional default for the language.
const ESPEAK_LANGUAGES: &[(&str, &str)] = &[
    ("af", "af"),
    ("ar", "ar"),
    ("bn", "bn"),
    ("cs", "cs"),
    ("da", "da"),
    ("de", "de"),
    ("el", "el"),
    ("en", "en-us"),
    ("en-us", "en-us"),
    ("en-gb", "en-gb"),
    ("es", "es"),
    ("fi", "fi"),
    ("fr", "fr-fr"),
    ("gu", "gu"),
    ("hi", "hi"),
    ("hu", "hu"),
    ("id", "id"),
    ("it", "it"),
    ("ja", "ja"),
    ("ko", "ko"),
    ("mr", "mr"),
    ("nb", "nb"),
    ("nl", "nl"),
    ("pl", "pl"),
    ("pt", "pt-br"),
    ("pt-br", "pt-br"),
    ("pt-pt", "pt"),
    ("ro", "ro"),
    ("ru", "ru"),
    ("sv", "sv"),
    ("ta", "ta"),
    ("te", "te"),
    ("th", "th"),
    ("tr", "tr"),
    ("uk", "uk"),
    ("ur", "ur"),
    ("vi", "vi"),
    ("zh", "zh"),
    ("zh-cn", "zh"),
    ("zh-tw", "zh"),
];

/// A phonemizer language code such as `en-us`. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Accepts a caller-supplied code verbatim. Returns `None` for blank input.
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            None
        } else {
            Some(Self(code))
        }
    }

    /// Maps a recognizer language hint to a phonemizer language code.
    ///
    /// Lookup order: exact match on the normalized hint, then the base
    /// subtag before the first hyphen, then the normalized hint itself.
    /// Blank hints resolve to `en-us`.
    pub fn resolve(hint: Option<&str>) -> Self {
        let normalized = match hint.map(normalize) {
            Some(code) if !code.is_empty() => code,
            _ => return Self(DEFAULT_IPA_LANGUAGE.to_string()),
        };

        if let Some(target) = lookup(&normalized) {
            return Self(target.to_string());
        }

        if let Some((base, _)) = normalized.split_once('-') {
            if let Some(target) = lookup(base) {
                return Self(target.to_string());
            }
        }

        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

fn lookup(code: &str) -> Option<&'static str> {
    ESPEAK_LANGUAGES
        .iter()
        .find(|(hint, _)| *hint == code)
        .map(|(_, target)| *target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolve(hint: &str) -> String {
        LanguageCode::resolve(Some(hint)).as_str().to_string()
    }

    #[test]
    fn test_every_table_entry_resolves_to_its_target() {
        for (hint, target) in ESPEAK_LANGUAGES {
            assert_eq!(resolve(hint), *target, "hint {hint}");
        }
    }

    #[test]
    fn test_table_has_forty_unique_hints() {
        assert_eq!(ESPEAK_LANGUAGES.len(), 40);
        for (i, (hint, _)) in ESPEAK_LANGUAGES.iter().enumerate() {
            assert!(
                ESPEAK_LANGUAGES[i + 1..].iter().all(|(h, _)| h != hint),
                "duplicate hint {hint}"
            );
        }
    }

    #[rstest]
    #[case::bare_english("en", "en-us")]
    #[case::bare_portuguese("pt", "pt-br")]
    #[case::european_portuguese("pt-pt", "pt")]
    #[case::bare_french("fr", "fr-fr")]
    #[case::traditional_chinese("zh-tw", "zh")]
    #[case::simplified_chinese("zh-cn", "zh")]
    fn test_regional_defaults(#[case] hint: &str, #[case] expected: &str) {
        assert_eq!(resolve(hint), expected);
    }

    #[test]
    fn test_missing_hint_defaults_to_us_english() {
        assert_eq!(LanguageCode::resolve(None).as_str(), "en-us");
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("   ")]
    #[case::tab_newline("\t\n")]
    fn test_blank_hint_defaults_to_us_english(#[case] hint: &str) {
        assert_eq!(resolve(hint), "en-us");
    }

    #[rstest]
    #[case::underscore_and_case("DE_at", "de")]
    #[case::padded_upper("  EN-GB ", "en-gb")]
    #[case::unknown_region("fr-CA", "fr-fr")]
    #[case::unknown_region_english("en_AU", "en-us")]
    fn test_normalization_and_base_subtag_fallback(#[case] hint: &str, #[case] expected: &str) {
        assert_eq!(resolve(hint), expected);
    }

    #[rstest]
    #[case::unknown_pair("xx-yy", "xx-yy")]
    #[case::unknown_bare("haw", "haw")]
    #[case::unknown_normalized("Sw_KE", "sw-ke")]
    fn test_unknown_codes_pass_through_normalized(#[case] hint: &str, #[case] expected: &str) {
        assert_eq!(resolve(hint), expected);
    }

    #[test]
    fn test_new_rejects_blank_and_keeps_verbatim() {
        assert!(LanguageCode::new("").is_none());
        assert!(LanguageCode::new("  ").is_none());
        assert_eq!(LanguageCode::new("en-GB").unwrap().as_str(), "en-GB");
    }

    #[test]
    fn test_display_matches_code() {
        assert_eq!(LanguageCode::resolve(Some("pt")).to_string(), "pt-br");
    }
}
