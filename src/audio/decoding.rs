use std::fs::File;
use std::path::Path;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, CodecParameters, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use super::config::DEFAULT_MONO_SAMPLE_CAPACITY;
use super::errors::IngestError;
use super::types::DecodedAudio;

fn open_format(path: &Path, label: &str) -> Result<Box<dyn FormatReader>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::FileOpenError {
        path: label.to_string(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map(|probed| probed.format)
        .map_err(|source| IngestError::FormatError {
            path: label.to_string(),
            source,
        })
}

/// First decodable track with a known sample rate and channel layout.
fn select_track(
    format: &dyn FormatReader,
    label: &str,
) -> Result<(u32, CodecParameters, f32, usize), IngestError> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| IngestError::NoSuitableTrack {
            path: label.to_string(),
        })?;
    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| IngestError::MissingSampleRate {
            path: label.to_string(),
        })?;
    let channels = params
        .channels
        .ok_or_else(|| IngestError::MissingChannelInfo {
            path: label.to_string(),
        })?
        .count();
    Ok((track.id, params.clone(), sample_rate as f32, channels))
}

fn append_mono(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Decodes an audio file to mono f32 samples, averaging interleaved channels.
/// Recoverable packet errors are skipped; anything else aborts the decode.
pub(crate) fn decode_file_to_mono(path: &Path) -> Result<DecodedAudio, IngestError> {
    let label = path.display().to_string();
    let mut format = open_format(path, &label)?;
    let (track_id, params, sample_rate, channels) = select_track(format.as_ref(), &label)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|source| IngestError::DecoderCreationError {
            path: label.clone(),
            source,
        })?;

    let mut samples = Vec::with_capacity(DEFAULT_MONO_SAMPLE_CAPACITY);
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                log::warn!("Central Decode: Stream reset requested in '{}', stopping", label);
                break;
            }
            Err(source) => {
                return Err(IngestError::PacketReadIoError {
                    path: label,
                    source,
                });
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                log::warn!("Central Decode: Skipping bad packet in '{}': {}", label, reason);
                continue;
            }
            Err(source) => {
                return Err(IngestError::FatalDecodeError {
                    path: label,
                    source,
                });
            }
        };

        let buf = scratch.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);
        append_mono(&mut samples, buf.samples(), channels);
    }

    decoder.finalize();
    if samples.is_empty() {
        return Err(IngestError::NoSamplesDecoded { path: label });
    }
    log::debug!(
        "Central Decode: {} mono samples at {} Hz from '{}'",
        samples.len(),
        sample_rate,
        label
    );
    Ok(DecodedAudio::new(samples, sample_rate))
}
