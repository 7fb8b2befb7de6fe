//! WAV 编码（16-bit PCM 单声道）

/// RIFF 头 + fmt 块 + data 块头
const HEADER_LEN: u32 = 44;

/// 单声道 PCM16 WAV，供假引擎和测试生成可被 symphonia 解码的音频
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = samples.len() as u32 * 2;
    let header: [&[u8]; 11] = [
        b"RIFF",
        &(HEADER_LEN - 8 + data_len).to_le_bytes(),
        b"WAVEfmt ",
        &16u32.to_le_bytes(),
        &[1, 0, 1, 0], // PCM, mono
        &sample_rate.to_le_bytes(),
        &(sample_rate * 2).to_le_bytes(),
        &2u16.to_le_bytes(),
        &16u16.to_le_bytes(),
        b"data",
        &data_len.to_le_bytes(),
    ];

    let mut wav = header.concat();
    wav.extend(
        samples
            .iter()
            .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes()),
    );
    wav
}

/// 生成正弦音，`amplitude` 范围 [0, 1]
pub fn tone(duration_ms: u64, sample_rate: u32, frequency: f32, amplitude: f32) -> Vec<f32> {
    let count = (sample_rate as u64 * duration_ms / 1000) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let wav = encode_wav(&[0.0, 0.5, -0.5], 16000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16000);
    }

    #[test]
    fn test_samples_are_clamped() {
        let wav = encode_wav(&[2.0, -2.0], 8000);
        assert_eq!(i16::from_le_bytes([wav[44], wav[45]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), -i16::MAX);
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 36 + 4);
    }

    #[test]
    fn test_tone_length() {
        assert_eq!(tone(100, 16000, 440.0, 0.5).len(), 1600);
    }
}
