//! Decoder for the Nintendo 3DS CWAV (`.bcwav`) and CSTM (`.bcstm`) audio
//! containers.
//!
//! Input bytes go through the schema [`parser`], one of the container
//! walkers ([`bcwav`], [`bcstm`]) and the sample [`decode`] engine, ending
//! up as a [`DecodedAudio`] that [`wav`] writes out as a RIFF/WAVE file.

pub mod audio;
pub mod bcstm;
pub mod bcwav;
pub mod container;
pub mod decode;
pub mod error;
pub mod parser;
pub mod wav;

use std::fs;
use std::path::Path;

use tracing::{debug, info};

pub use audio::{DecodedAudio, Encoding};
pub use error::{Error, Result};

/// The two supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Wave,
    Stream,
}

impl ContainerKind {
    /// Guess from a `.bcwav`/`.bcstm` extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bcwav" => Some(ContainerKind::Wave),
            "bcstm" => Some(ContainerKind::Stream),
            _ => None,
        }
    }

    /// Guess from the leading magic.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data.get(..4)? {
            m if m == bcwav::MAGIC => Some(ContainerKind::Wave),
            m if m == bcstm::MAGIC => Some(ContainerKind::Stream),
            _ => None,
        }
    }

    pub fn decode(self, data: &[u8]) -> Result<DecodedAudio> {
        match self {
            ContainerKind::Wave => bcwav::decode(data),
            ContainerKind::Stream => bcstm::decode(data),
        }
    }
}

/// Decode a buffer, picking the container from its magic. Unknown magic is
/// reported against the CWAV tag.
pub fn decode_bytes(data: &[u8]) -> Result<DecodedAudio> {
    ContainerKind::sniff(data)
        .unwrap_or(ContainerKind::Wave)
        .decode(data)
}

/// Read and decode a file. The extension picks the container when it is
/// recognised, the magic otherwise.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let path = path.as_ref();
    debug!("Reading {}", path.display());
    let data = fs::read(path)?;
    match ContainerKind::from_path(path) {
        Some(kind) => kind.decode(&data),
        None => decode_bytes(&data),
    }
}

/// Decode `input` and write it to `output` as WAV. Nothing is written
/// unless the whole decode succeeds.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<DecodedAudio> {
    let audio = decode_file(input)?;
    wav::write_wav_file(&output, &audio)?;
    info!(
        "Wrote {} channels x {} samples to {}",
        audio.channel_count(),
        audio.sample_count,
        output.as_ref().display()
    );
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_kind_from_path() {
        assert_eq!(
            ContainerKind::from_path(Path::new("bgm/title.BCSTM")),
            Some(ContainerKind::Stream)
        );
        assert_eq!(
            ContainerKind::from_path(Path::new("se/jump.bcwav")),
            Some(ContainerKind::Wave)
        );
        assert_eq!(ContainerKind::from_path(Path::new("jump.wav")), None);
        assert_eq!(ContainerKind::from_path(Path::new("jump")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ContainerKind::sniff(b"CSTM\xff\xfe"), Some(ContainerKind::Stream));
        assert_eq!(ContainerKind::sniff(b"CWAV"), Some(ContainerKind::Wave));
        assert_eq!(ContainerKind::sniff(b"CWA"), None);
        assert_eq!(ContainerKind::sniff(b"RIFF...."), None);
    }

    #[test]
    fn test_decode_bytes_reports_bad_magic() {
        let err = decode_bytes(b"RIFF\xff\xfe").unwrap_err();
        assert!(matches!(
            err,
            Error::MagicMismatch {
                block: "header",
                ..
            }
        ));
    }
}
