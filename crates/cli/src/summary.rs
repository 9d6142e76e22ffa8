use speech_ipa_core::shared::transcription::TranscriptionResult;

const HEADER: &str = "1;36";
const HEADING: &str = "1;37";
const IPA: &str = "36";

/// Human-readable report of a transcription.
pub fn format_summary(result: &TranscriptionResult, color: bool, segments: bool) -> String {
    let style = |text: &str, code: &str| {
        if color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    };

    let confidence = result
        .language_confidence
        .map(|c| format!("{c:.3}"))
        .unwrap_or_else(|| "n/a".to_string());
    let language = if result.language.is_empty() {
        "unknown"
    } else {
        result.language.as_str()
    };
    let duration = result
        .duration
        .map(|d| format!("{d:.2}s"))
        .unwrap_or_else(|| "n/a".to_string());

    let mut lines = vec![
        style("Speech-to-IPA", HEADER),
        format!("Audio: {}", result.audio_path.display()),
        format!("Model: {}", result.model_size),
        format!("Detected language: {language} (confidence={confidence})"),
        format!("IPA backend language: {}", result.ipa_language),
        format!("Duration: {duration}"),
        String::new(),
        style("Transcript:", HEADING),
        or_empty(&result.text).to_string(),
        String::new(),
        style("IPA:", HEADING),
        or_empty(&result.ipa).to_string(),
    ];

    if segments && !result.segments.is_empty() {
        lines.push(String::new());
        lines.push(style("Segments:", HEADING));
        for seg in &result.segments {
            lines.push(format!(
                "[{:6.2}s – {:6.2}s] {}\n    {}",
                seg.start,
                seg.end,
                seg.text,
                style(&seg.ipa, IPA)
            ));
        }
    }

    lines.join("\n")
}

fn or_empty(text: &str) -> &str {
    if text.is_empty() {
        "<empty>"
    } else {
        text
    }
}
