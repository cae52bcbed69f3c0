//! sstv-glitch CLI
//!
//! Command-line interface for the SSTV glitch engine.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use sstv_glitch::cli::{commands, Cli, Commands};
use sstv_glitch::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("sstv-glitch v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("failed to load config {}", path.display()),
            None => "failed to build default config".to_string(),
        }
    })?;

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("sstv-glitch v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &AppConfig, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Encode {
            input,
            output,
            mode,
            vis,
            resize,
        } => commands::encode(config, &input, &output, mode.as_deref(), vis, resize)
            .with_context(|| format!("encoding {}", input.display())),
        Commands::Corrupt {
            input,
            output,
            mode,
            vis,
            chain,
        } => commands::corrupt(config, &input, &output, mode.as_deref(), vis, &chain)
            .with_context(|| format!("corrupting {}", input.display())),
        Commands::Decode {
            input,
            output,
            mode,
            vis,
        } => commands::decode(config, &input, &output, mode.as_deref(), vis)
            .with_context(|| format!("decoding {}", input.display())),
        Commands::Transmit {
            input,
            mode,
            chain,
            speed,
            instant,
            output_dir,
        } => commands::transmit(
            config,
            &input,
            mode.as_deref(),
            &chain,
            speed,
            instant,
            output_dir.as_deref(),
        )
        .with_context(|| format!("transmitting {}", input.display())),
        Commands::Modes => Ok(commands::list_modes()?),
        Commands::Presets { name } => Ok(commands::list_presets(name.as_deref())?),
        Commands::Effects => Ok(commands::list_effects()?),
        Commands::Outputs { output_dir } => {
            Ok(commands::list_outputs(config, output_dir.as_deref())?)
        }
    }
}
