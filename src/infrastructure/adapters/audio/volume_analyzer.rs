//! Volume Analyzer - 基于 symphonia 的口型音量分析
//!
//! 解码 WAV 后按固定时长切片，计算每片 RMS 并以最大值归一化

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AnalyzeError, AudioAnalyzerPort, AudioEnvelope};

pub const DEFAULT_SLICE_LENGTH_MS: u32 = 20;

/// 解码后的单声道样本
struct MonoAudio {
    samples: Vec<f32>,
    sample_rate: u32,
}

pub struct VolumeAnalyzer {
    slice_length_ms: u32,
}

impl VolumeAnalyzer {
    pub fn new(slice_length_ms: u32) -> Self {
        Self { slice_length_ms }
    }

    fn decode(&self, data: &[u8]) -> Result<MonoAudio, AnalyzeError> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AnalyzeError::DecodingError(format!("Probe failed: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AnalyzeError::DecodingError("No audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AnalyzeError::DecodingError("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AnalyzeError::DecodingError(format!("Decoder creation failed: {}", e)))?;

        let track_id = track.id;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(AnalyzeError::DecodingError(format!(
                        "Packet read error: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            let channels = spec.channels.count().max(1);
            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            // 多声道取平均
            let interleaved = &sample_buf.samples()[..num_frames * channels];
            samples.extend(
                interleaved
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }

        Ok(MonoAudio {
            samples,
            sample_rate,
        })
    }
}

impl Default for VolumeAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SLICE_LENGTH_MS)
    }
}

impl AudioAnalyzerPort for VolumeAnalyzer {
    fn analyze(&self, audio: &[u8]) -> Result<AudioEnvelope, AnalyzeError> {
        if audio.is_empty() {
            return Ok(AudioEnvelope {
                slice_length_ms: self.slice_length_ms,
                ..Default::default()
            });
        }
        if self.slice_length_ms == 0 {
            return Err(AnalyzeError::InvalidInput(
                "Slice length must be positive".to_string(),
            ));
        }

        let mono = self.decode(audio)?;
        let slice_len =
            ((mono.sample_rate as u64 * self.slice_length_ms as u64) / 1000).max(1) as usize;

        let rms: Vec<f32> = mono
            .samples
            .chunks(slice_len)
            .map(|chunk| (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt())
            .collect();

        let max = rms.iter().copied().fold(0.0f32, f32::max);
        let volumes = if max > 0.0 {
            rms.iter().map(|v| v / max).collect()
        } else {
            vec![0.0; rms.len()]
        };

        let duration_ms = if mono.sample_rate > 0 {
            mono.samples.len() as u64 * 1000 / mono.sample_rate as u64
        } else {
            0
        };

        Ok(AudioEnvelope {
            volumes,
            slice_length_ms: self.slice_length_ms,
            duration_ms,
        })
    }
}
