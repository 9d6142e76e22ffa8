use crate::audio::domain::speech_recognizer::RawSegment;
use crate::phonetics::domain::language_code::LanguageCode;
use crate::phonetics::domain::phonemizer::Phonemizer;
use crate::pipeline::transcribe_use_case::TranscribeError;
use crate::shared::error::BoxError;
use crate::shared::transcription::Segment;

/// Segments that carried text, in recognition order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedSegments {
    pub segments: Vec<Segment>,
    pub texts: Vec<String>,
}

impl AggregatedSegments {
    /// Segment texts joined by single spaces.
    pub fn full_text(&self) -> String {
        self.texts.join(" ").trim().to_string()
    }
}

/// Turns raw recognizer output into phonemized [`Segment`]s in a single
/// forward pass. Segments whose text is blank are dropped.
pub struct SegmentAggregator<'a> {
    phonemizer: &'a Phonemizer,
    language: &'a LanguageCode,
}

impl<'a> SegmentAggregator<'a> {
    pub fn new(phonemizer: &'a Phonemizer, language: &'a LanguageCode) -> Self {
        Self {
            phonemizer,
            language,
        }
    }

    /// Consumes `raw` in order. `on_segment` sees each kept segment as soon
    /// as it is built.
    pub fn aggregate<I, F>(
        &self,
        raw: I,
        mut on_segment: F,
    ) -> Result<AggregatedSegments, TranscribeError>
    where
        I: IntoIterator<Item = Result<RawSegment, BoxError>>,
        F: FnMut(&Segment),
    {
        let mut out = AggregatedSegments::default();

        for item in raw {
            let raw = item.map_err(TranscribeError::Recognition)?;
            let text = raw.text.trim();
            if text.is_empty() {
                log::debug!("Skipping empty segment at {:.2}s", raw.start);
                continue;
            }

            let ipa = self.phonemizer.phonemize(text, self.language)?;
            let segment = Segment {
                start: raw.start,
                end: raw.end,
                text: text.to_string(),
                ipa,
                avg_logprob: raw.avg_logprob,
                no_speech_prob: raw.no_speech_prob,
            };
            log::debug!(
                "[{:.2}s - {:.2}s] {} -> {}",
                segment.start,
                segment.end,
                segment.text,
                segment.ipa
            );
            on_segment(&segment);
            out.texts.push(segment.text.clone());
            out.segments.push(segment);
        }

        Ok(out)
    }
}
