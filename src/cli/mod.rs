//! CLI Module
//!
//! Command-line interface for encoding, corrupting and decoding SSTV
//! transmissions.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// SSTV glitch art: image -> SSTV audio -> corrupted audio -> image
#[derive(Parser, Debug)]
#[command(name = "sstv-glitch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Effect chain selection shared by `corrupt` and `transmit`
#[derive(Args, Debug, Clone, Default)]
pub struct ChainArgs {
    /// Named preset (see `presets`)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Effect chain JSON file
    #[arg(long)]
    pub chain: Option<PathBuf>,

    /// Extra effect, e.g. `noise:amount=0.3,noise_type=pink` (repeatable)
    #[arg(short, long = "effect")]
    pub effects: Vec<String>,

    /// Seed for every stochastic effect
    #[arg(short, long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a PPM image into SSTV audio
    #[command(name = "encode")]
    Encode {
        /// Input image (binary PPM)
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// SSTV mode (e.g. m1, s1, robot36, pd90)
        #[arg(short, long)]
        mode: Option<String>,

        /// Prepend the VIS header
        #[arg(long)]
        vis: bool,

        /// Resize the image to the mode resolution instead of failing
        #[arg(long)]
        resize: bool,
    },

    /// Apply an effect chain to a WAV file
    #[command(name = "corrupt")]
    Corrupt {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Mode the audio was encoded with (for line-aligned effects)
        #[arg(short, long)]
        mode: Option<String>,

        /// The audio starts with a VIS header
        #[arg(long)]
        vis: bool,

        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Decode SSTV audio into a PPM image
    #[command(name = "decode")]
    Decode {
        /// Input WAV file
        input: PathBuf,

        /// Output image (binary PPM)
        output: PathBuf,

        /// SSTV mode
        #[arg(short, long)]
        mode: Option<String>,

        /// The audio starts with a VIS header
        #[arg(long)]
        vis: bool,
    },

    /// Encode, corrupt and decode clean and corrupted side by side
    #[command(name = "transmit")]
    Transmit {
        /// Input image (binary PPM, resized to the mode)
        input: PathBuf,

        /// SSTV mode
        #[arg(short, long)]
        mode: Option<String>,

        #[command(flatten)]
        chain: ChainArgs,

        /// Playback speed for the paced decode (1.0 = real time)
        #[arg(long)]
        speed: Option<f64>,

        /// Skip playback pacing
        #[arg(long)]
        instant: bool,

        /// Folder for the results (defaults to the configured output folder)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List SSTV modes
    #[command(name = "modes")]
    Modes,

    /// List presets, or print one as chain JSON
    #[command(name = "presets")]
    Presets {
        /// Preset to print
        name: Option<String>,
    },

    /// List effects and their parameters
    #[command(name = "effects")]
    Effects,

    /// List saved transmissions
    #[command(name = "outputs")]
    Outputs {
        /// Output folder (defaults to the configured output folder)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}
