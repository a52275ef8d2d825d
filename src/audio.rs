//! Encodings, per-channel codec metadata and the decoded output summary.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{Cursor, Field};

/// Sample encoding byte shared by CWAV and CSTM info blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pcm8,
    Pcm16,
    DspAdpcm,
    ImaAdpcm,
}

impl Encoding {
    pub fn code(self) -> u8 {
        match self {
            Encoding::Pcm8 => 0,
            Encoding::Pcm16 => 1,
            Encoding::DspAdpcm => 2,
            Encoding::ImaAdpcm => 3,
        }
    }

    /// Bytes per decoded output sample.
    pub fn bytes_per_sample(self) -> u16 {
        match self {
            Encoding::Pcm8 => 1,
            Encoding::Pcm16 | Encoding::DspAdpcm | Encoding::ImaAdpcm => 2,
        }
    }

    pub(crate) fn unsupported(self, reason: &'static str) -> Error {
        Error::UnsupportedEncoding {
            encoding: self.code(),
            reason,
        }
    }
}

impl TryFrom<u8> for Encoding {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Encoding::Pcm8),
            1 => Ok(Encoding::Pcm16),
            2 => Ok(Encoding::DspAdpcm),
            3 => Ok(Encoding::ImaAdpcm),
            _ => Err(Error::UnsupportedEncoding {
                encoding: value,
                reason: "unknown encoding",
            }),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Pcm8 => "PCM8",
            Encoding::Pcm16 => "PCM16",
            Encoding::DspAdpcm => "DSP ADPCM",
            Encoding::ImaAdpcm => "IMA ADPCM",
        };
        f.write_str(name)
    }
}

const DSP_ADPCM_INFO: &[Field] = &[
    Field::int("coefficients", 2).repeated(16),
    Field::uint("predictor_scale", 2),
    Field::int("history", 2).repeated(2),
    Field::uint("loop_predictor_scale", 2),
    Field::int("loop_history", 2).repeated(2),
    Field::padding(2),
];

const IMA_ADPCM_INFO: &[Field] = &[
    Field::int("predictor", 2),
    Field::uint("step_index", 1),
    Field::padding(1),
    Field::int("loop_predictor", 2),
    Field::uint("loop_step_index", 1),
    Field::padding(1),
];

/// Predictor/scale byte and two-sample history of a DSP ADPCM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdpcmContext {
    pub predictor_scale: u16,
    pub history: [i16; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DspAdpcmInfo {
    /// Eight coefficient pairs.
    pub coefficients: [i16; 16],
    pub context: AdpcmContext,
    /// Loop-point context; carried along, not used when decoding.
    pub loop_context: AdpcmContext,
}

impl DspAdpcmInfo {
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let info = cursor.decode_struct(DSP_ADPCM_INFO)?;
        Ok(Self {
            coefficients: info.i16_list("coefficients")?,
            context: AdpcmContext {
                predictor_scale: info.u16("predictor_scale")?,
                history: info.i16_list("history")?,
            },
            loop_context: AdpcmContext {
                predictor_scale: info.u16("loop_predictor_scale")?,
                history: info.i16_list("loop_history")?,
            },
        })
    }

    /// Coefficient pair selected by a frame header's high nibble. Only
    /// indices 0..8 exist.
    pub fn pair(&self, index: usize) -> Option<(i16, i16)> {
        let pair = self.coefficients.get(index * 2..index * 2 + 2)?;
        Some((pair[0], pair[1]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImaContext {
    pub predictor: i16,
    pub step_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImaAdpcmInfo {
    pub context: ImaContext,
    pub loop_context: ImaContext,
}

impl ImaAdpcmInfo {
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let info = cursor.decode_struct(IMA_ADPCM_INFO)?;
        let context = |predictor: &'static str, step_index: &'static str| -> Result<ImaContext> {
            Ok(ImaContext {
                predictor: info.int(predictor)? as i16,
                step_index: info.u8(step_index)?,
            })
        };
        Ok(Self {
            context: context("predictor", "step_index")?,
            loop_context: context("loop_predictor", "loop_step_index")?,
        })
    }
}

/// Codec metadata attached to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecInfo {
    /// PCM channels carry none.
    None,
    DspAdpcm(DspAdpcmInfo),
    ImaAdpcm(ImaAdpcmInfo),
}

impl CodecInfo {
    /// Read the codec info block matching `encoding` at the cursor.
    pub fn read(cursor: &mut Cursor<'_>, encoding: Encoding) -> Result<Self> {
        Ok(match encoding {
            Encoding::Pcm8 | Encoding::Pcm16 => CodecInfo::None,
            Encoding::DspAdpcm => CodecInfo::DspAdpcm(DspAdpcmInfo::read(cursor)?),
            Encoding::ImaAdpcm => CodecInfo::ImaAdpcm(ImaAdpcmInfo::read(cursor)?),
        })
    }
}

/// One channel as found in the container's channel table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Start of the channel's samples, relative to the DATA payload.
    pub sample_offset: usize,
    pub codec: CodecInfo,
}

/// Decoded channels and the format metadata needed to write them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub bytes_per_sample: u16,
    /// Common length of every channel.
    pub sample_count: usize,
    pub channels: Vec<Vec<i16>>,
}

impl DecodedAudio {
    /// Build the summary, trimming every channel to the shortest one.
    ///
    /// Channel regions are padded for alignment, so the longer channels only
    /// differ by trailing pad samples.
    pub fn new(sample_rate: u32, bytes_per_sample: u16, mut channels: Vec<Vec<i16>>) -> Self {
        let sample_count = channels.iter().map(Vec::len).min().unwrap_or(0);
        for (index, channel) in channels.iter_mut().enumerate() {
            if channel.len() > sample_count {
                debug!(
                    "Trimming channel {} from {} to {} samples",
                    index,
                    channel.len(),
                    sample_count
                );
                channel.truncate(sample_count);
            }
        }
        Self {
            sample_rate,
            bytes_per_sample,
            sample_count,
            channels,
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }
}
