//! Builders for synthetic CWAV and CSTM files.

#![allow(dead_code)]

pub const NULL: u32 = 0xFFFF_FFFF;

/// Coefficient table whose pair 0 repeats the previous sample (1.0 in Q11)
/// and whose other pairs are zero.
pub fn unity_coefficients() -> [i16; 16] {
    let mut coefficients = [0i16; 16];
    coefficients[0] = 2048;
    coefficients
}

/// One 9-byte DSP ADPCM frame with the same data byte repeated.
pub fn frame(header: u8, byte: u8) -> Vec<u8> {
    let mut frame = vec![header];
    frame.extend_from_slice(&[byte; 8]);
    frame
}

pub fn pcm16_region(samples: &[i16], big_endian: bool) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| if big_endian { s.to_be_bytes() } else { s.to_le_bytes() })
        .collect()
}

fn align(value: usize, to: usize) -> usize {
    value.div_ceil(to) * to
}

struct Writer {
    buf: Vec<u8>,
    big: bool,
}

impl Writer {
    fn new(big: bool) -> Self {
        Self {
            buf: Vec::new(),
            big,
        }
    }

    fn pos(&self) -> usize {
        self.buf.len()
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&bytes);
    }

    fn i16(&mut self, v: i16) {
        self.u16(v as u16);
    }

    fn u32(&mut self, v: u32) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&bytes);
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn reference(&mut self, id: u16, offset: u32) {
        self.u16(id);
        self.u16(0);
        self.u32(offset);
    }

    fn pad_to(&mut self, pos: usize) {
        assert!(pos >= self.pos(), "layout overlap at {:#x}", pos);
        self.buf.resize(pos, 0);
    }

    fn patch_u16(&mut self, at: usize, v: u16) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf[at..at + 2].copy_from_slice(&bytes);
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn bom(&mut self) {
        self.u16(0xFEFF);
    }

    fn dsp_info(&mut self, coefficients: &[i16; 16]) {
        for &c in coefficients {
            self.i16(c);
        }
        // context, loop context, padding
        self.u16(0x0021);
        self.i16(0);
        self.i16(0);
        self.u16(0x0021);
        self.i16(0);
        self.i16(0);
        self.u16(0);
    }

    fn ima_info(&mut self) {
        self.i16(-100);
        self.u8(12);
        self.u8(0);
        self.i16(250);
        self.u8(30);
        self.u8(0);
    }

    fn codec_info(&mut self, encoding: u8, coefficients: &[i16; 16]) {
        match encoding {
            2 => self.dsp_info(coefficients),
            3 => self.ima_info(),
            _ => {}
        }
    }
}

fn codec_info_size(encoding: u8) -> usize {
    match encoding {
        2 => 48,
        3 => 8,
        _ => 0,
    }
}

pub struct Built {
    pub bytes: Vec<u8>,
    pub info_offset: usize,
    pub seek_offset: usize,
    pub data_offset: usize,
}

pub struct Cwav {
    pub big_endian: bool,
    pub encoding: u8,
    pub sample_rate: u32,
    pub looped: bool,
    pub loop_end: u32,
    pub coefficients: [i16; 16],
    /// Raw bytes of each channel.
    pub regions: Vec<Vec<u8>>,
    /// Each region is zero-padded up to this alignment in the DATA payload.
    pub region_align: usize,
}

impl Default for Cwav {
    fn default() -> Self {
        Self {
            big_endian: false,
            encoding: 1,
            sample_rate: 32728,
            looped: false,
            loop_end: 0,
            coefficients: unity_coefficients(),
            regions: Vec::new(),
            region_align: 0x20,
        }
    }
}

impl Cwav {
    pub fn build(&self) -> Built {
        let n = self.regions.len();
        let info_offset = 0x40;
        let structs = 32 + 8 * n;
        let codecs = structs + 20 * n;
        let info_size = align(codecs + codec_info_size(self.encoding) * n, 0x20);
        let data_offset = info_offset + info_size;

        let mut payload = Vec::new();
        let mut starts = Vec::new();
        for region in &self.regions {
            starts.push(payload.len());
            payload.extend_from_slice(region);
            payload.resize(align(payload.len(), self.region_align), 0);
        }
        let file_size = data_offset + 8 + payload.len();

        let mut w = Writer::new(self.big_endian);
        w.bytes(b"CWAV");
        w.bom();
        w.u16(0x40);
        w.u32(0x0201_0000);
        w.u32(file_size as u32);
        w.u16(2);
        w.u16(0);
        w.reference(0x7000, info_offset as u32);
        w.u32(info_size as u32);
        w.reference(0x7001, data_offset as u32);
        w.u32((8 + payload.len()) as u32);
        w.pad_to(info_offset);

        w.bytes(b"INFO");
        w.u32(info_size as u32);
        w.u8(self.encoding);
        w.u8(self.looped as u8);
        w.u16(0);
        w.u32(self.sample_rate);
        w.u32(0);
        w.u32(self.loop_end);
        w.u32(0);
        w.u32(n as u32);
        for i in 0..n {
            w.reference(0x7100, (structs + 20 * i - 28) as u32);
        }
        for (i, start) in starts.iter().enumerate() {
            let own = structs + 20 * i;
            w.reference(0x1f00, *start as u32);
            if codec_info_size(self.encoding) == 0 {
                w.reference(0, NULL);
            } else {
                let codec = codecs + codec_info_size(self.encoding) * i;
                w.reference(0x0300, (codec - own) as u32);
            }
            w.u32(0);
        }
        for i in 0..n {
            w.pad_to(info_offset + codecs + codec_info_size(self.encoding) * i);
            w.codec_info(self.encoding, &self.coefficients);
        }
        w.pad_to(data_offset);

        w.bytes(b"DATA");
        w.u32((8 + payload.len()) as u32);
        w.bytes(&payload);

        Built {
            bytes: w.buf,
            info_offset,
            seek_offset: 0,
            data_offset,
        }
    }
}

pub struct Track {
    pub volume: u8,
    pub pan: u8,
    pub channels: Vec<u8>,
}

pub struct Cstm {
    pub big_endian: bool,
    pub encoding: u8,
    pub sample_rate: u32,
    pub block_size: usize,
    pub sample_offset: usize,
    pub coefficients: [i16; 16],
    pub tracks: Vec<Track>,
    /// Raw bytes of each channel, all the same length. The final block
    /// holds whatever is left over.
    pub regions: Vec<Vec<u8>>,
    /// Zero bytes added after each channel's data in the final block.
    pub last_block_padding: usize,
}

impl Default for Cstm {
    fn default() -> Self {
        Self {
            big_endian: false,
            encoding: 2,
            sample_rate: 32728,
            block_size: 18,
            sample_offset: 0x18,
            coefficients: unity_coefficients(),
            tracks: Vec::new(),
            regions: Vec::new(),
            last_block_padding: 0,
        }
    }
}

impl Cstm {
    pub fn block_count(&self) -> usize {
        self.regions
            .first()
            .map(|r| r.len().div_ceil(self.block_size))
            .unwrap_or(0)
    }

    /// Audio bytes per channel in the final block.
    pub fn last_block_size(&self) -> usize {
        let total = self.regions.first().map(Vec::len).unwrap_or(0);
        total - self.block_count().saturating_sub(1) * self.block_size
    }

    pub fn build(&self) -> Built {
        let n = self.regions.len();
        let block_count = self.block_count();
        let last_size = self.last_block_size();
        let last_padded = last_size + self.last_block_padding;
        let total = self.regions.first().map(Vec::len).unwrap_or(0);
        let info_offset = 0x40;
        let mut w = Writer::new(self.big_endian);

        w.bytes(b"CSTM");
        w.bom();
        w.u16(0x40);
        w.u32(0x0200_0000);
        let file_size_at = w.pos();
        w.u32(0);
        w.u16(3);
        w.u16(0);
        let block_refs_at = w.pos();
        for id in [0x4000u16, 0x4001, 0x4002] {
            w.reference(id, 0);
            w.u32(0);
        }
        w.pad_to(info_offset);

        // INFO
        let base = info_offset + 8;
        w.bytes(b"INFO");
        let info_size_at = w.pos();
        w.u32(0);
        w.reference(0x4100, 0x18);
        let track_ref_at = w.pos();
        w.reference(0, NULL);
        let channel_ref_at = w.pos();
        w.reference(0, NULL);

        w.u8(self.encoding);
        w.u8(0);
        w.u8(n as u8);
        w.u8(0);
        w.u32(self.sample_rate);
        w.u32(0);
        w.u32((total / 9 * 16) as u32);
        w.u32(block_count as u32);
        w.u32(self.block_size as u32);
        w.u32((self.block_size / 9 * 16) as u32);
        w.u32(last_size as u32);
        w.u32((last_size / 9 * 16) as u32);
        w.u32(last_padded as u32);
        w.u32(4);
        w.u32(0x3800);
        w.reference(0x1f00, self.sample_offset as u32);

        if !self.tracks.is_empty() {
            let table = w.pos();
            w.patch_u32(track_ref_at + 4, (table - base) as u32);
            w.patch_u16(track_ref_at, 0x0101);
            w.u32(self.tracks.len() as u32);
            let entries = w.pos();
            for _ in &self.tracks {
                w.reference(0x4101, 0);
            }
            for (i, track) in self.tracks.iter().enumerate() {
                let own = w.pos();
                w.patch_u32(entries + 8 * i + 4, (own - table) as u32);
                w.u8(track.volume);
                w.u8(track.pan);
                w.u16(0);
                w.reference(0x0100, 12);
                w.u32(track.channels.len() as u32);
                w.bytes(&track.channels);
                let padded = align(w.pos(), 4);
                w.pad_to(padded);
            }
        }

        let table = w.pos();
        w.patch_u32(channel_ref_at + 4, (table - base) as u32);
        w.patch_u16(channel_ref_at, 0x0101);
        w.u32(n as u32);
        let structs = table + 4 + 8 * n;
        let codecs = structs + 8 * n;
        for i in 0..n {
            w.reference(0x4102, (structs + 8 * i - table) as u32);
        }
        for i in 0..n {
            let own = structs + 8 * i;
            let codec = codecs + codec_info_size(self.encoding) * i;
            w.reference(0x0300, (codec - own) as u32);
        }
        for i in 0..n {
            w.pad_to(codecs + codec_info_size(self.encoding) * i);
            w.codec_info(self.encoding, &self.coefficients);
        }
        let info_end = align(w.pos(), 0x20);
        w.pad_to(info_end);
        let info_size = info_end - info_offset;
        w.patch_u32(info_size_at, info_size as u32);

        // SEEK
        let seek_offset = w.pos();
        w.bytes(b"SEEK");
        w.u32(0x20);
        w.pad_to(seek_offset + 0x20);

        // DATA
        let data_offset = w.pos();
        let mut payload = vec![0u8; self.sample_offset];
        for block in 0..block_count {
            let last = block + 1 == block_count;
            for region in &self.regions {
                let start = block * self.block_size;
                let end = (start + self.block_size).min(region.len());
                payload.extend_from_slice(&region[start..end]);
                if last {
                    payload.resize(payload.len() + self.last_block_padding, 0);
                }
            }
        }
        w.bytes(b"DATA");
        w.u32((8 + payload.len()) as u32);
        w.bytes(&payload);

        let file_size = w.pos();
        w.patch_u32(file_size_at, file_size as u32);
        for (i, (offset, size)) in [
            (info_offset, info_size),
            (seek_offset, 0x20),
            (data_offset, 8 + payload.len()),
        ]
        .into_iter()
        .enumerate()
        {
            let at = block_refs_at + 12 * i;
            w.patch_u32(at + 4, offset as u32);
            w.patch_u32(at + 8, size as u32);
        }

        Built {
            bytes: w.buf,
            info_offset,
            seek_offset,
            data_offset,
        }
    }
}
