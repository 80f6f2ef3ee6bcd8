//! Command line front end for the Video CD image builder.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vcdimage::builder::{self, BuildOptions};

#[derive(Parser, Debug)]
#[command(
    name = "mkvcdfs",
    version,
    about = "Make a Video CD image and TOC from MPEG-1 system streams"
)]
struct Args {
    /// MPEG input files, one track each (up to 32)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// ISO volume identifier
    #[arg(long, default_value = "LINUX VIDEO CD")]
    volume_id: String,

    /// Album identifier stored in INFO.VCD
    #[arg(long, default_value = "1")]
    album_id: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let options = BuildOptions {
        volume_id: args.volume_id,
        album_id: args.album_id,
        ..BuildOptions::default()
    };

    match builder::build(&args.files, &options, chrono::Utc::now()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mkvcdfs: {}", err);
            ExitCode::FAILURE
        }
    }
}
