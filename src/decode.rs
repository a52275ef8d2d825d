//! Sample decode engine: raw channel regions to 16-bit samples.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use rayon::prelude::*;
use tracing::debug;

use crate::audio::{CodecInfo, DspAdpcmInfo, Encoding};
use crate::error::{Error, Result};
use crate::parser::Endian;

/// Bytes per DSP ADPCM frame: one header byte and eight data bytes.
pub const FRAME_SIZE: usize = 9;
/// Samples produced by one frame (two per data byte).
pub const SAMPLES_PER_FRAME: usize = 16;

/// Saturate to the signed 16-bit range.
pub fn clamp16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Map a 4-bit value to -8..=7 (8..=15 become -8..=-1).
pub fn sign_extend_nibble(nibble: u8) -> i8 {
    ((nibble << 4) as i8) >> 4
}

/// Reinterpret each 2-byte group as a signed sample in the file's byte order.
pub fn decode_pcm16(region: &[u8], order: Endian) -> Vec<i16> {
    region
        .chunks_exact(2)
        .map(|pair| match order {
            Endian::Little => LittleEndian::read_i16(pair),
            Endian::Big => BigEndian::read_i16(pair),
        })
        .collect()
}

/// Decode a DSP ADPCM channel region, starting from zero history.
pub fn decode_dsp_adpcm(region: &[u8], info: &DspAdpcmInfo) -> Result<Vec<i16>> {
    let frames = region.chunks_exact(FRAME_SIZE);
    if !frames.remainder().is_empty() {
        debug!(
            "Ignoring {} trailing bytes after the last ADPCM frame",
            frames.remainder().len()
        );
    }

    let mut samples = Vec::with_capacity(region.len() / FRAME_SIZE * SAMPLES_PER_FRAME);
    let mut hist1: i64 = 0;
    let mut hist2: i64 = 0;

    for (index, frame) in frames.enumerate() {
        let header = frame[0];
        let scale: i64 = 1 << (header & 0xF);
        let (coef1, coef2) = info
            .pair((header >> 4) as usize)
            .ok_or(Error::BadPredictor {
                frame: index,
                index: header >> 4,
            })?;
        let (coef1, coef2) = (coef1 as i64, coef2 as i64);

        for &byte in &frame[1..] {
            for nibble in [byte >> 4, byte & 0xF] {
                let delta = sign_extend_nibble(nibble) as i64;
                let prediction = coef1 * hist1 + coef2 * hist2;
                let sample = clamp16((((delta * scale) << 11) + 1024 + prediction) >> 11);

                hist2 = hist1;
                hist1 = sample as i64;
                samples.push(sample);
            }
        }
    }

    Ok(samples)
}

/// Decode one channel region according to `encoding`.
pub fn decode_channel(
    region: &[u8],
    codec: &CodecInfo,
    encoding: Encoding,
    order: Endian,
) -> Result<Vec<i16>> {
    match encoding {
        Encoding::Pcm16 => Ok(decode_pcm16(region, order)),
        Encoding::DspAdpcm => match codec {
            CodecInfo::DspAdpcm(info) => decode_dsp_adpcm(region, info),
            _ => Err(encoding.unsupported("channel has no DSP ADPCM coefficients")),
        },
        Encoding::Pcm8 => Err(encoding.unsupported("PCM8 decoding is not implemented")),
        Encoding::ImaAdpcm => Err(encoding.unsupported("IMA ADPCM decoding is not implemented")),
    }
}

/// Decode every channel. Channels share no state, so they run in parallel;
/// results keep channel order.
pub fn decode_channels(
    regions: &[&[u8]],
    codecs: &[CodecInfo],
    encoding: Encoding,
    order: Endian,
) -> Result<Vec<Vec<i16>>> {
    if codecs.len() < regions.len() {
        return Err(Error::MissingChannelInfo {
            channel: codecs.len(),
        });
    }

    regions
        .par_iter()
        .zip(codecs.par_iter())
        .enumerate()
        .map(|(index, (region, codec))| {
            let samples = decode_channel(region, codec, encoding, order)?;
            debug!(
                "Decoded channel {}: {} bytes -> {} samples",
                index,
                region.len(),
                samples.len()
            );
            Ok(samples)
        })
        .collect()
}
