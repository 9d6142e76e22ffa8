use std::path::Path;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample;
use ffmpeg_next::util::frame::audio::Audio;

use crate::audio::domain::audio_reader::AudioReader;
use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::error::BoxError;

/// Decodes any ffmpeg-readable audio (or video) file to mono f32 PCM.
pub struct FfmpegAudioReader;

impl AudioReader for FfmpegAudioReader {
    fn read_audio(&self, path: &Path, target_sample_rate: u32) -> Result<AudioSegment, BoxError> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)
            .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;

        let audio_stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or_else(|| format!("No audio stream in {}", path.display()))?;
        let audio_stream_index = audio_stream.index();

        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())?;
        let mut decoder = codec_ctx.decoder().audio()?;
        log::debug!(
            "Decoding {} ({} Hz, {} channel(s)) to {target_sample_rate} Hz mono",
            path.display(),
            decoder.rate(),
            decoder.channels()
        );

        let mut resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            Sample::F32(SampleType::Planar),
            ffmpeg_next::ChannelLayout::MONO,
            target_sample_rate,
        )?;

        let mut samples: Vec<f32> = Vec::new();
        let mut decoded = Audio::empty();
        let mut resampled = Audio::empty();

        for (stream, packet) in ictx.packets() {
            if stream.index() != audio_stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                resampler.run(&decoded, &mut resampled)?;
                append_samples(&resampled, &mut samples);
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            resampler.run(&decoded, &mut resampled)?;
            append_samples(&resampled, &mut samples);
        }

        // The resampler may still hold buffered samples.
        if let Ok(Some(delay)) = resampler.flush(&mut resampled) {
            if delay.output > 0 {
                append_samples(&resampled, &mut samples);
            }
        }

        Ok(AudioSegment::new(samples, target_sample_rate))
    }
}

/// Append samples from a planar mono f32 frame.
fn append_samples(frame: &Audio, out: &mut Vec<f32>) {
    let count = frame.samples();
    if count == 0 {
        return;
    }
    out.extend_from_slice(&frame.plane::<f32>(0)[..count]);
}
