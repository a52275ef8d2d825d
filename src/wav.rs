use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::debug;

use crate::audio::DecodedAudio;
use crate::error::{Error, Result};

fn spec_for(audio: &DecodedAudio) -> WavSpec {
    WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.sample_rate,
        bits_per_sample: audio.bytes_per_sample * 8,
        sample_format: SampleFormat::Int,
    }
}

/// Write interleaved PCM, every channel cut to the common sample count.
pub fn write_wav<W: Write + Seek>(writer: W, audio: &DecodedAudio) -> Result<()> {
    if audio.channels.is_empty() {
        return Err(Error::NoChannels);
    }
    let frames = audio
        .channels
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0)
        .min(audio.sample_count);

    let mut writer = WavWriter::new(writer, spec_for(audio))?;
    for i in 0..frames {
        for channel in &audio.channels {
            writer.write_sample(channel[i])?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Nothing is created when there is nothing to write.
pub fn write_wav_file<P: AsRef<Path>>(output_path: P, audio: &DecodedAudio) -> Result<()> {
    let output_path = output_path.as_ref();
    if audio.channels.is_empty() {
        return Err(Error::NoChannels);
    }
    debug!("Writing WAV file to {}", output_path.display());
    write_wav(BufWriter::new(File::create(output_path)?), audio)?;
    debug!("Finished writing WAV file to {}", output_path.display());
    Ok(())
}

/// Read a WAV file back into per-channel samples.
pub fn read_wav_file<P: AsRef<Path>>(file_path: P) -> Result<(Vec<Vec<i16>>, WavSpec)> {
    let file_path = file_path.as_ref();
    debug!("Reading WAV file from {}", file_path.display());
    let mut reader = WavReader::open(file_path)?;
    let spec = reader.spec();
    let interleaved = reader.samples::<i16>().collect::<std::result::Result<Vec<_>, _>>()?;

    let channel_count = spec.channels.max(1) as usize;
    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % channel_count].push(sample);
    }

    debug!("Read {} samples per channel", channels[0].len());
    Ok((channels, spec))
}
