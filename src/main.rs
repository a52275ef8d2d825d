use clap::Parser;
use ctraudio::{bcstm, bcwav, ContainerKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "ctraudio")]
#[command(about = "Convert 3DS .bcwav/.bcstm audio to WAV", long_about = None)]
struct Cli {
    /// Input .bcwav or .bcstm file
    input: PathBuf,

    /// Output WAV file (defaults to the input with a .wav extension)
    output: Option<PathBuf>,

    /// Print the container metadata instead of converting
    #[arg(long)]
    info: bool,

    /// Log every block and channel as it is decoded
    #[arg(short, long)]
    verbose: bool,
}

fn print_info(input: &Path) -> ctraudio::Result<()> {
    let data = fs::read(input)?;
    let kind = ContainerKind::from_path(input)
        .or_else(|| ContainerKind::sniff(&data))
        .unwrap_or(ContainerKind::Wave);

    match kind {
        ContainerKind::Wave => {
            let wave = bcwav::parse(&data)?;
            println!("Format: CWAV ({:?} endian, version {:#x})", wave.byte_order, wave.version);
            println!("Encoding: {}", wave.encoding);
            println!("Sample rate: {}", wave.sample_rate);
            println!("Channels: {}", wave.channels.len());
            if wave.looped {
                println!("Loop: {}..{}", wave.loop_start, wave.loop_end);
            }
            for (index, channel) in wave.regions()?.iter().enumerate() {
                println!("  Channel {}: {} bytes", index, channel.len());
            }
        }
        ContainerKind::Stream => {
            let stream = bcstm::parse(&data)?;
            println!("Format: CSTM ({:?} endian, version {:#x})", stream.byte_order, stream.version);
            println!("Encoding: {}", stream.encoding);
            println!("Sample rate: {}", stream.sample_rate);
            println!("Channels: {}", stream.channel_count);
            if stream.looped {
                println!("Loop: {}..{}", stream.loop_start, stream.loop_end);
            }
            println!(
                "Blocks: {} x {} bytes ({} samples each)",
                stream.blocks.count, stream.blocks.size, stream.blocks.sample_count
            );
            for (index, track) in stream.tracks.iter().enumerate() {
                println!(
                    "  Track {}: volume {}, pan {}, channels {:?}",
                    index, track.volume, track.pan, track.channels
                );
            }
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> ctraudio::Result<()> {
    if cli.info {
        return print_info(&cli.input);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("wav"));
    info!("Converting {} to {}", cli.input.display(), output.display());
    ctraudio::convert_file(&cli.input, &output)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
