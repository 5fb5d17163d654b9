use clap::Parser;
use std::path::PathBuf;

use crate::config::DriverKind;

#[derive(Parser, Debug)]
#[command(name = "lightshow", about = "Beat-synchronised LED light show for a music playlist")]
pub struct Cli {
    /// Config file (defaults to ./lightshow.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the tracks to play
    #[arg(short, long)]
    pub playlist_dir: Option<PathBuf>,

    /// Directory for cached song profiles
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Audio file extension to pick up (e.g. wav, mp3)
    #[arg(short, long)]
    pub extension: Option<String>,

    /// LED output driver
    #[arg(short, long, value_enum)]
    pub driver: Option<DriverKind>,

    /// Play tracks in name order
    #[arg(long)]
    pub no_shuffle: bool,

    /// Analyze and cache every track, then exit
    #[arg(long)]
    pub analyze_only: bool,
}
