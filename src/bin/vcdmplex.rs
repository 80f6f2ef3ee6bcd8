//! Command line front end for the MPEG-1 system stream multiplexer.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vcdimage::mux;

#[derive(Parser, Debug)]
#[command(
    name = "vcdmplex",
    version,
    about = "Multiplex MPEG-1 video and audio elementary streams into a VCD system stream"
)]
struct Args {
    /// MPEG-1 video elementary stream
    video: PathBuf,

    /// MPEG-1 layer II audio elementary stream
    audio: PathBuf,

    /// Multiplexed output file, refused if it already exists
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match mux::multiplex_files(&args.video, &args.audio, &args.output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("vcdmplex: {}", err);
            ExitCode::FAILURE
        }
    }
}
