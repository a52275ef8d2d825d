//! CSTM (`.bcstm`) streamed container.
//!
//! ```text
//! CSTM header   magic, BOM, block table (INFO, SEEK, DATA)
//! INFO block    stream info, track table, channel table
//!   track       volume, pan -> channel index table
//!   channel     codec info reference
//! SEEK block    opaque
//! DATA block    block_count x (channel_count x block_size) interleaved blocks
//! ```

use tracing::{debug, info, warn};

use crate::audio::{CodecInfo, DecodedAudio, Encoding};
use crate::container::{self, Reference, BLOCK_HEADER_SIZE};
use crate::decode::decode_channels;
use crate::error::{Error, Result};
use crate::parser::{Cursor, Endian, Field};

pub const MAGIC: [u8; 4] = *b"CSTM";
const INFO_MAGIC: [u8; 4] = *b"INFO";
const SEEK_MAGIC: [u8; 4] = *b"SEEK";
const DATA_MAGIC: [u8; 4] = *b"DATA";

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
    Field::uint("seek_id", 2),
    Field::padding(2),
    Field::uint("seek_offset", 4),
    Field::uint("seek_size", 4),
    Field::uint("data_id", 2),
    Field::padding(2),
    Field::uint("data_offset", 4),
    Field::uint("data_size", 4),
];

const INFO: &[Field] = &[
    Field::raw("magic", 4),
    Field::uint("size", 4),
    Field::uint("stream_id", 2),
    Field::padding(2),
    Field::uint("stream_offset", 4),
    Field::uint("track_table_id", 2),
    Field::padding(2),
    Field::uint("track_table_offset", 4),
    Field::uint("channel_table_id", 2),
    Field::padding(2),
    Field::uint("channel_table_offset", 4),
    // Stream info
    Field::uint("encoding", 1),
    Field::uint("loop", 1),
    Field::uint("channel_count", 1),
    Field::padding(1),
    Field::uint("sample_rate", 4),
    Field::uint("loop_start", 4),
    Field::uint("loop_end", 4),
    Field::uint("block_count", 4),
    Field::uint("block_size", 4),
    Field::uint("block_sample_count", 4),
    Field::uint("last_block_size", 4),
    Field::uint("last_block_sample_count", 4),
    Field::uint("last_block_padded_size", 4),
    Field::uint("seek_data_size", 4),
    Field::uint("seek_sample_count", 4),
    Field::uint("samples_id", 2),
    Field::padding(2),
    Field::uint("samples_offset", 4),
];

const TRACK: &[Field] = &[
    Field::uint("volume", 1),
    Field::uint("pan", 1),
    Field::padding(2),
    Field::uint("channel_table_id", 2),
    Field::padding(2),
    Field::uint("channel_table_offset", 4),
];

/// Block layout of the interleaved DATA payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockLayout {
    pub count: u32,
    pub size: u32,
    pub sample_count: u32,
    pub last_size: u32,
    pub last_sample_count: u32,
    pub last_padded_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub volume: u8,
    pub pan: u8,
    /// Indices of the channels this track plays.
    pub channels: Vec<u8>,
}

/// A parsed CSTM file. Borrows the SEEK and DATA payloads from the input.
#[derive(Debug, Clone)]
pub struct Stream<'a> {
    pub byte_order: Endian,
    pub version: u32,
    pub encoding: Encoding,
    pub looped: bool,
    pub channel_count: usize,
    pub sample_rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub blocks: BlockLayout,
    pub seek_data_size: u32,
    pub seek_sample_count: u32,
    /// Start of the first block, relative to the DATA payload.
    pub sample_offset: usize,
    pub tracks: Vec<Track>,
    pub channels: Vec<CodecInfo>,
    pub seek: &'a [u8],
    pub data: &'a [u8],
}

impl BlockLayout {
    /// Bytes of channel data in the final block and the per-channel stride
    /// it is laid out with. Unset (zero) fields fall back to the regular
    /// block size.
    fn last_block(&self) -> (usize, usize) {
        let stride = match self.last_padded_size {
            0 => self.size,
            padded => padded,
        } as usize;
        let len = match self.last_size {
            0 => stride,
            size => (size as usize).min(stride),
        };
        (len, stride)
    }
}

impl Stream<'_> {
    /// Undo the block interleaving: one contiguous byte run per channel.
    ///
    /// Every repetition but the last holds `channel_count` blocks of
    /// `block_size` bytes. The last one is shrunk to `last_padded_size` per
    /// channel, of which `last_size` bytes are audio.
    pub fn regions(&self) -> Result<Vec<Vec<u8>>> {
        let block_size = self.blocks.size as usize;
        let block_count = self.blocks.count as usize;
        let (last_len, last_stride) = self.blocks.last_block();
        let repetition = block_size.saturating_mul(self.channel_count);
        let capacity = block_size.saturating_mul(block_count).min(self.data.len());
        let truncated = |start: usize, needed: usize| Error::TruncatedInput {
            offset: start,
            needed,
            available: self.data.len(),
        };

        (0..self.channel_count)
            .map(|channel| {
                let mut region = Vec::with_capacity(capacity);
                for block in 0..block_count {
                    let (len, stride) = if block + 1 == block_count {
                        (last_len, last_stride)
                    } else {
                        (block_size, block_size)
                    };
                    let start = block
                        .checked_mul(repetition)
                        .and_then(|offset| offset.checked_add(channel.checked_mul(stride)?))
                        .and_then(|offset| offset.checked_add(self.sample_offset))
                        .ok_or_else(|| truncated(self.sample_offset, repetition.saturating_mul(block_count)))?;
                    let bytes = start
                        .checked_add(len)
                        .and_then(|end| self.data.get(start..end))
                        .ok_or_else(|| truncated(start, len))?;
                    region.extend_from_slice(bytes);
                }
                Ok(region)
            })
            .collect()
    }

    pub fn decode(&self) -> Result<DecodedAudio> {
        let owned = self.regions()?;
        let regions: Vec<&[u8]> = owned.iter().map(Vec::as_slice).collect();
        let channels = decode_channels(&regions, &self.channels, self.encoding, self.byte_order)?;
        Ok(DecodedAudio::new(
            self.sample_rate,
            self.encoding.bytes_per_sample(),
            channels,
        ))
    }
}

/// Walk a CSTM file: tracks, channel codec info, SEEK and DATA blocks.
pub fn parse(data: &[u8]) -> Result<Stream<'_>> {
    let mut cursor = Cursor::new(data);
    let byte_order = container::read_preamble(&mut cursor, MAGIC)?;

    let header = cursor.decode_struct(HEADER)?;
    let info_offset = header.u32("info_offset")? as usize;
    let seek_offset = header.u32("seek_offset")? as usize;
    let data_offset = header.u32("data_offset")? as usize;
    debug!(
        "CSTM version {:#x}, INFO at {:#x}, SEEK at {:#x}, DATA at {:#x}",
        header.u32("version")?,
        info_offset,
        seek_offset,
        data_offset
    );

    cursor.seek(info_offset)?;
    let info = cursor.decode_struct(INFO)?;
    container::check_magic("info", INFO_MAGIC, info.tag("magic")?)?;

    let encoding = Encoding::try_from(info.u8("encoding")?)?;
    if encoding != Encoding::DspAdpcm {
        return Err(encoding.unsupported("only DSP ADPCM streams are supported"));
    }
    if info.u8("channel_count")? == 0 {
        return Err(Error::NoChannels);
    }

    // Table offsets count from the end of the INFO block header.
    let base = info_offset + BLOCK_HEADER_SIZE;

    let track_table = Reference::from_struct(&info, "track_table_id", "track_table_offset")?;
    let tracks = if track_table.is_table() {
        read_tracks(&mut cursor, base + track_table.offset as usize)?
    } else {
        Vec::new()
    };

    let channel_table = Reference::from_struct(&info, "channel_table_id", "channel_table_offset")?;
    let channels = if channel_table.is_table() {
        read_channels(&mut cursor, base + channel_table.offset as usize, encoding)?
    } else {
        warn!("CSTM has no channel table");
        Vec::new()
    };

    let seek = container::read_block(&mut cursor, seek_offset, "seek", SEEK_MAGIC)?;
    let payload = container::read_block(&mut cursor, data_offset, "data", DATA_MAGIC)?;

    let blocks = BlockLayout {
        count: info.u32("block_count")?,
        size: info.u32("block_size")?,
        sample_count: info.u32("block_sample_count")?,
        last_size: info.u32("last_block_size")?,
        last_sample_count: info.u32("last_block_sample_count")?,
        last_padded_size: info.u32("last_block_padded_size")?,
    };
    debug!(
        "{} channels, {} tracks, {} blocks of {} bytes",
        info.u8("channel_count")?,
        tracks.len(),
        blocks.count,
        blocks.size
    );

    Ok(Stream {
        byte_order,
        version: header.u32("version")?,
        encoding,
        looped: info.u8("loop")? != 0,
        channel_count: info.u8("channel_count")? as usize,
        sample_rate: info.u32("sample_rate")?,
        loop_start: info.u32("loop_start")?,
        loop_end: info.u32("loop_end")?,
        blocks,
        seek_data_size: info.u32("seek_data_size")?,
        seek_sample_count: info.u32("seek_sample_count")?,
        sample_offset: info.u32("samples_offset")? as usize,
        tracks,
        channels,
        seek,
        data: payload,
    })
}

fn read_tracks(cursor: &mut Cursor<'_>, table_start: usize) -> Result<Vec<Track>> {
    container::read_reference_table(cursor, table_start)?
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let target = reference.resolve(table_start, "track", index)?;
            cursor.peek_at(target, |c| {
                let start = c.position();
                let track = c.decode_struct(TRACK)?;
                let indices =
                    Reference::from_struct(&track, "channel_table_id", "channel_table_offset")?;
                c.seek(indices.resolve(start, "track channel", index)?)?;

                let count = c.decode_struct(&[Field::uint("count", 4)])?.u32("count")?;
                let channels = c.take(count as usize)?.to_vec();
                Ok(Track {
                    volume: track.u8("volume")?,
                    pan: track.u8("pan")?,
                    channels,
                })
            })
        })
        .collect()
}

fn read_channels(
    cursor: &mut Cursor<'_>,
    table_start: usize,
    encoding: Encoding,
) -> Result<Vec<CodecInfo>> {
    container::read_reference_table(cursor, table_start)?
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let target = reference.resolve(table_start, "channel", index)?;
            cursor.peek_at(target, |c| {
                let start = c.position();
                let codec = Reference::read(c)?;
                c.seek(codec.resolve(start, "codec info", index)?)?;
                CodecInfo::read(c, encoding)
            })
        })
        .collect()
}

/// Parse and decode a CSTM file.
pub fn decode(data: &[u8]) -> Result<DecodedAudio> {
    let stream = parse(data)?;
    info!(
        "Decoding CSTM: {} channels, {} Hz, {}",
        stream.channel_count, stream.sample_rate, stream.encoding
    );
    stream.decode()
}
