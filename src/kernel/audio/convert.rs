//! PCM16 <-> normalized float conversion.
//!
//! Capture devices hand us little-endian 16-bit samples; the classifiers want
//! floats in [-1, 1]. Decoding divides by 32768 so every i16 lands inside the
//! range. Encoding clamps first and scales by 32767 so +1.0 cannot overflow.

pub const BYTES_PER_SAMPLE: usize = 2;

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Decodes PCM16-LE. A trailing odd byte is a partial sample and is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    append_pcm16(samples, &mut out);
    out
}

/// Encodes `samples` onto the end of `out` as PCM16-LE.
pub fn append_pcm16(samples: &[f32], out: &mut Vec<u8>) {
    for &s in samples {
        out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }
}

pub fn pcm16_samples(bytes: &[u8]) -> impl Iterator<Item = i16> + '_ {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
}

/// Averages interleaved frames down to one channel. A trailing partial frame is dropped.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_do_not_overflow() {
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
        assert_eq!(f32_to_i16(4.0), i16::MAX);
        assert_eq!(f32_to_i16(-4.0), -i16::MAX);
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
    }

    #[test]
    fn odd_byte_is_dropped() {
        let bytes = [0x00, 0x40, 0x00, 0xC0, 0x7F];
        let samples = bytes_to_samples(&bytes);
        assert_eq!(samples, vec![0.5, -0.5]);
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [0.5, -0.5, 1.0, 0.0, 0.25];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5]);
    }
}
