use thiserror::Error;

/// Errors produced while decoding a CWAV or CSTM container.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {block} magic: expected {}, found {}", .expected.escape_ascii(), .found.escape_ascii())]
    MagicMismatch {
        block: &'static str,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("encoding {encoding} not supported: {reason}")]
    UnsupportedEncoding { encoding: u8, reason: &'static str },

    #[error("truncated input: need {needed} bytes at offset {offset:#x}, buffer holds {available}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unresolved reference {index} in {table} table")]
    UnresolvedReference { table: &'static str, index: usize },

    #[error("decoded struct has no field `{0}`")]
    MissingField(&'static str),

    #[error("ADPCM frame {frame} selects coefficient pair {index}, only 0-7 exist")]
    BadPredictor { frame: usize, index: u8 },

    #[error("container declares no channels")]
    NoChannels,

    #[error("{block} block size {size} is smaller than its header")]
    BadBlockSize { block: &'static str, size: u32 },

    #[error("no codec info for channel {channel}")]
    MissingChannelInfo { channel: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
