//! CWAV (`.bcwav`) single-waveform container.
//!
//! ```text
//! CWAV header  magic, BOM, block table (INFO, DATA)
//! INFO block   encoding, sample rate, loop points, channel reference table
//!   channel    sample reference -> DATA payload, codec info reference
//!   codec info DSP/IMA ADPCM coefficients and contexts
//! DATA block   channel regions laid out back to back
//! ```

use tracing::{debug, info};

use crate::audio::{ChannelInfo, CodecInfo, DecodedAudio, Encoding};
use crate::container::{self, Reference, BLOCK_HEADER_SIZE};
use crate::decode::decode_channels;
use crate::error::{Error, Result};
use crate::parser::{Cursor, Endian, Field};

pub const MAGIC: [u8; 4] = *b"CWAV";
const INFO_MAGIC: [u8; 4] = *b"INFO";
const DATA_MAGIC: [u8; 4] = *b"DATA";

/// Position of the channel table relative to the INFO payload.
const CHANNEL_TABLE_OFFSET: usize = 0x14;

const HEADER: &[Field] = &[
    Field::uint("header_size", 2),
    Field::uint("version", 4),
    Field::uint("file_size", 4),
    Field::uint("block_count", 2),
    Field::padding(2),
    Field::uint("info_id", 2),
    Field::padding(2),
    Field::uint("info_offset", 4),
    Field::uint("info_size", 4),
    Field::uint("data_id", 2),
    Field::padding(2),
    Field::uint("data_offset", 4),
    Field::uint("data_size", 4),
];

const INFO: &[Field] = &[
    Field::raw("magic", 4),
    Field::uint("size", 4),
    Field::uint("encoding", 1),
    Field::uint("loop", 1),
    Field::padding(2),
    Field::uint("sample_rate", 4),
    Field::uint("loop_start", 4),
    Field::uint("loop_end", 4),
    Field::padding(4),
    Field::uint("channel_count", 4),
];

const CHANNEL: &[Field] = &[
    Field::uint("samples_id", 2),
    Field::padding(2),
    Field::uint("samples_offset", 4),
    Field::uint("codec_id", 2),
    Field::padding(2),
    Field::uint("codec_offset", 4),
    Field::padding(4),
];

/// A parsed CWAV file. Borrows the DATA payload from the input buffer.
#[derive(Debug, Clone)]
pub struct Wave<'a> {
    pub byte_order: Endian,
    pub version: u32,
    pub encoding: Encoding,
    pub looped: bool,
    pub sample_rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub channels: Vec<ChannelInfo>,
    pub data: &'a [u8],
}

impl<'a> Wave<'a> {
    /// Raw bytes of each channel, in channel order.
    pub fn regions(&self) -> Result<Vec<&'a [u8]>> {
        let starts: Vec<usize> = self.channels.iter().map(|c| c.sample_offset).collect();
        container::contiguous_regions(self.data, &starts)
    }

    pub fn decode(&self) -> Result<DecodedAudio> {
        let regions = self.regions()?;
        let codecs: Vec<CodecInfo> = self.channels.iter().map(|c| c.codec.clone()).collect();
        let channels = decode_channels(&regions, &codecs, self.encoding, self.byte_order)?;
        Ok(DecodedAudio::new(
            self.sample_rate,
            self.encoding.bytes_per_sample(),
            channels,
        ))
    }
}

/// Walk a CWAV file down to its channel table and DATA payload.
pub fn parse(data: &[u8]) -> Result<Wave<'_>> {
    let mut cursor = Cursor::new(data);
    let byte_order = container::read_preamble(&mut cursor, MAGIC)?;

    let header = cursor.decode_struct(HEADER)?;
    let info_offset = header.u32("info_offset")? as usize;
    let data_offset = header.u32("data_offset")? as usize;
    debug!(
        "CWAV version {:#x}, {} blocks, INFO at {:#x}, DATA at {:#x}",
        header.u32("version")?,
        header.u16("block_count")?,
        info_offset,
        data_offset
    );

    cursor.seek(info_offset)?;
    let info = cursor.decode_struct(INFO)?;
    container::check_magic("info", INFO_MAGIC, info.tag("magic")?)?;
    let encoding = Encoding::try_from(info.u8("encoding")?)?;
    debug!(
        "Encoding {}, {} Hz, {} channels",
        encoding,
        info.u32("sample_rate")?,
        info.u32("channel_count")?
    );

    let table_start = info_offset + BLOCK_HEADER_SIZE + CHANNEL_TABLE_OFFSET;
    let channels = container::read_reference_table(&mut cursor, table_start)?
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let target = reference.resolve(table_start, "channel", index)?;
            cursor.peek_at(target, |c| read_channel(c, encoding, index))
        })
        .collect::<Result<Vec<_>>>()?;
    if channels.is_empty() {
        return Err(Error::NoChannels);
    }

    let payload = container::read_block(&mut cursor, data_offset, "data", DATA_MAGIC)?;

    Ok(Wave {
        byte_order,
        version: header.u32("version")?,
        encoding,
        looped: info.u8("loop")? != 0,
        sample_rate: info.u32("sample_rate")?,
        loop_start: info.u32("loop_start")?,
        loop_end: info.u32("loop_end")?,
        channels,
        data: payload,
    })
}

fn read_channel(cursor: &mut Cursor<'_>, encoding: Encoding, index: usize) -> Result<ChannelInfo> {
    let start = cursor.position();
    let channel = cursor.decode_struct(CHANNEL)?;

    let samples = Reference::from_struct(&channel, "samples_id", "samples_offset")?;
    if samples.is_null() {
        return Err(Error::UnresolvedReference {
            table: "sample",
            index,
        });
    }

    let codec = match encoding {
        Encoding::Pcm8 | Encoding::Pcm16 => CodecInfo::None,
        Encoding::DspAdpcm | Encoding::ImaAdpcm => {
            let codec_ref = Reference::from_struct(&channel, "codec_id", "codec_offset")?;
            cursor.seek(codec_ref.resolve(start, "codec info", index)?)?;
            CodecInfo::read(cursor, encoding)?
        }
    };

    Ok(ChannelInfo {
        sample_offset: samples.offset as usize,
        codec,
    })
}

/// Parse and decode a CWAV file.
pub fn decode(data: &[u8]) -> Result<DecodedAudio> {
    let wave = parse(data)?;
    info!(
        "Decoding CWAV: {} channels, {} Hz, {}",
        wave.channels.len(),
        wave.sample_rate,
        wave.encoding
    );
    wave.decode()
}
