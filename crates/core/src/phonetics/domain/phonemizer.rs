use thiserror::Error;

use super::language_code::LanguageCode;
use super::phoneme_backend::PhonemeBackend;
use crate::shared::constants::PRESERVED_PUNCTUATION;
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
#[error(
    "failed to phonemize text: ensure espeak-ng is installed and the language '{language}' is supported"
)]
pub struct PhonemizeError {
    pub language: String,
    #[source]
    pub source: BoxError,
}

/// Converts text to IPA through a [`PhonemeBackend`].
///
/// Punctuation from [`PRESERVED_PUNCTUATION`] is cut out before the text
/// reaches the backend and re-inserted at its original position, so the
/// backend only ever sees word runs. Output is whitespace-normalized.
pub struct Phonemizer {
    backend: Box<dyn PhonemeBackend>,
}

impl Phonemizer {
    pub fn new(backend: Box<dyn PhonemeBackend>) -> Self {
        Self { backend }
    }

    pub fn phonemize(&self, text: &str, language: &LanguageCode) -> Result<String, PhonemizeError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut out = String::new();
        for run in split_runs(text) {
            match run {
                Run::Punctuation(marks) => out.push_str(marks),
                Run::Words(words) => {
                    let leading = words.starts_with(char::is_whitespace);
                    let trailing = words.ends_with(char::is_whitespace);
                    let words = words.trim();
                    if leading {
                        out.push(' ');
                    }
                    if !words.is_empty() {
                        let ipa = self
                            .backend
                            .phonemize(words, language.as_str())
                            .map_err(|source| PhonemizeError {
                                language: language.to_string(),
                                source,
                            })?;
                        out.push_str(ipa.trim());
                        if trailing {
                            out.push(' ');
                        }
                    }
                }
            }
        }

        Ok(out.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[derive(Debug, PartialEq)]
enum Run<'a> {
    Words(&'a str),
    Punctuation(&'a str),
}

fn is_preserved(c: char) -> bool {
    PRESERVED_PUNCTUATION.contains(c)
}

fn split_runs(text: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_punct: Option<bool> = None;

    for (idx, c) in text.char_indices() {
        let punct = is_preserved(c);
        match in_punct {
            Some(current) if current != punct => {
                runs.push(make_run(&text[start..idx], current));
                start = idx;
            }
            _ => {}
        }
        in_punct = Some(punct);
    }
    if let Some(current) = in_punct {
        runs.push(make_run(&text[start..], current));
    }
    runs
}

fn make_run(slice: &str, punct: bool) -> Run<'_> {
    if punct {
        Run::Punctuation(slice)
    } else {
        Run::Words(slice)
    }
}
