//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{debug, info, warn};

use super::ChainArgs;
use crate::config::AppConfig;
use crate::dsp::{presets, EffectChain, EffectContext, EffectKind, EffectSpec, ParamValue};
use crate::engine::{
    export_audio, import_audio, ExportFormat, InstantPlayback, PlaybackSink, SimulatedPlayback,
};
use crate::error::Result;
use crate::output::{OutputFile, OutputManager, OutputMetadata};
use crate::sstv::vis::VIS_DURATION_MS;
use crate::sstv::{
    decode_buffer_with, lookup, resize_to_mode, DecodedImage, Encoder, ModeSpec, RgbImage, MODES,
};
use crate::transmission::{Track, TransmissionController, TransmissionEvent, TransmissionRequest};

/// Rows between progress lines
const PROGRESS_EVERY: usize = 32;

/// Mode named on the command line, or the configured one
fn resolve_mode(name: Option<&str>, config: &AppConfig) -> Result<&'static ModeSpec> {
    match name {
        Some(name) => lookup(name),
        None => Ok(config.mode_spec()),
    }
}

/// Parse `kind[:param=value,param=value]`
pub fn parse_effect(text: &str) -> Result<EffectSpec> {
    let (kind, params) = match text.split_once(':') {
        Some((kind, params)) => (kind, params),
        None => (text, ""),
    };
    let mut spec = EffectSpec::new(kind.trim().parse::<EffectKind>()?);

    for pair in params.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            warn!("Ignoring malformed effect parameter '{}'", pair);
            continue;
        };
        let value = value.trim();
        let value = match value.parse::<f64>() {
            Ok(number) => ParamValue::Number(number),
            Err(_) => ParamValue::Text(value.to_string()),
        };
        spec = spec.with_param(name.trim(), value);
    }
    Ok(spec)
}

/// Chain from config, then preset or chain file, then extra effects
pub fn build_chain(args: &ChainArgs, config: &AppConfig) -> Result<EffectChain> {
    let mut chain = config.chain.clone();
    if let Some(name) = &args.preset {
        chain = presets::by_name(name)?;
    }
    if let Some(path) = &args.chain {
        chain = EffectChain::from_json_str(&std::fs::read_to_string(path)?)?;
    }
    for text in &args.effects {
        chain.add(parse_effect(text)?);
    }
    if let Some(seed) = args.seed {
        chain.seed = Some(seed);
    }
    debug!("Effect chain: {} effects", chain.len());
    Ok(chain)
}

/// Encode a PPM image into a WAV file.
pub fn encode(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    mode: Option<&str>,
    vis: bool,
    resize: bool,
) -> Result<()> {
    let mode = resolve_mode(mode, config)?;
    let mut image = RgbImage::read_ppm(input)?;
    if resize {
        image = resize_to_mode(&image, mode);
    }

    let mut encoder_config = config.encoder_config();
    encoder_config.vis_header |= vis;
    let buffer = Encoder::new(encoder_config).encode(&image, mode)?;
    export_audio(&buffer, output, ExportFormat::default())?;

    println!(
        "Encoded {} as {} ({:.2}s): {}",
        input.display(),
        mode.name,
        buffer.duration_secs(),
        output.display()
    );
    Ok(())
}

/// Apply an effect chain to a WAV file.
pub fn corrupt(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    mode: Option<&str>,
    vis: bool,
    args: &ChainArgs,
) -> Result<()> {
    let mode = resolve_mode(mode, config)?;
    let chain = build_chain(args, config)?;
    let mut buffer = import_audio(input, config.sample_rate)?;

    let lead_in_ms = if vis || config.encoder.vis_header {
        VIS_DURATION_MS
    } else {
        0.0
    };
    let report = chain.process(&mut buffer, &EffectContext::for_mode(mode, lead_in_ms));
    export_audio(&buffer, output, ExportFormat::default())?;

    println!(
        "Applied {} effects ({} parameters clamped): {}",
        report.applied,
        report.clamped.len(),
        output.display()
    );
    println!("Fingerprint: {}", buffer.fingerprint());
    Ok(())
}

/// Decode a WAV file into a PPM image.
pub fn decode(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    mode: Option<&str>,
    vis: bool,
) -> Result<()> {
    let mode = resolve_mode(mode, config)?;
    let buffer = import_audio(input, config.sample_rate)?;
    let mut decoder_config = config.decoder_config();
    decoder_config.vis_header |= vis;

    let (image, status) = decode_buffer_with(&buffer, mode, decoder_config, |row| {
        if row.index % PROGRESS_EVERY == 0 {
            info!("Row {}/{}", row.index, mode.height);
        }
    });
    image.image().write_ppm(output)?;

    println!(
        "Decoded {}/{} rows ({:?}, {} desync events): {}",
        status.rows_decoded,
        status.expected_rows,
        status.completion,
        status.desync_events,
        output.display()
    );
    Ok(())
}

/// Run a full transmission and save both decodes.
pub fn transmit(
    config: &AppConfig,
    input: &Path,
    mode: Option<&str>,
    args: &ChainArgs,
    speed: Option<f64>,
    instant: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let mode = resolve_mode(mode, config)?;
    let chain = build_chain(args, config)?;
    let image = resize_to_mode(&RgbImage::read_ppm(input)?, mode);

    let request = TransmissionRequest::new(image, mode)
        .with_chain(chain.clone())
        .with_encoder(config.encoder_config())
        .with_decoder(config.decoder_config());

    let mut sink: Box<dyn PlaybackSink> = if instant {
        Box::new(InstantPlayback::new())
    } else {
        Box::new(SimulatedPlayback::new(speed.unwrap_or(config.playback_speed)))
    };

    let mut controller = TransmissionController::new();
    let mut handle = controller.start(request, sink.as_mut())?;
    println!(
        "Transmission {} ({}, {:.2}s of audio)",
        handle.id(),
        mode.name,
        handle.corrupted_audio().duration_secs()
    );

    let mut clean = DecodedImage::new(mode.width, mode.height);
    let mut corrupted = DecodedImage::new(mode.width, mode.height);
    let mut clean_status = None;
    let mut corrupted_status = None;

    while let Some((track, event)) = handle.next_event() {
        match event {
            TransmissionEvent::Scanline(row) => {
                let image = match track {
                    Track::Clean => &mut clean,
                    Track::Corrupted => &mut corrupted,
                };
                image.apply(&row);
                if track == Track::Corrupted && row.index % PROGRESS_EVERY == 0 {
                    info!(
                        "Corrupted row {}/{} (confidence {:.2})",
                        row.index, mode.height, row.confidence
                    );
                }
            }
            TransmissionEvent::Finished(status) => {
                info!("{} decode finished: {:?}", track, status.completion);
                match track {
                    Track::Clean => clean_status = Some(status),
                    Track::Corrupted => corrupted_status = Some(status),
                }
            }
            TransmissionEvent::Cancelled => {
                sink.stop();
                return Err(handle.cancelled_error());
            }
        }
    }
    sink.stop();

    let manager = OutputManager::new(output_dir.unwrap_or(config.output_dir.as_path()))?;
    let folder = manager.create_output_folder(mode.name)?;
    manager.save_image(&folder, OutputFile::Clean, clean.image())?;
    manager.save_image(&folder, OutputFile::Corrupted, corrupted.image())?;
    manager.save_audio(&folder, handle.corrupted_audio())?;

    let mut metadata = OutputMetadata::new(mode.name, &chain);
    metadata.session_id = Some(handle.id());
    metadata.source_path = Some(input.to_path_buf());
    metadata.clean_status = clean_status;
    metadata.corrupted_status = corrupted_status;
    metadata.audio_fingerprint = Some(handle.corrupted_audio().fingerprint());
    manager.save_metadata(&folder, &metadata)?;

    if let Some(status) = corrupted_status {
        println!(
            "Corrupted decode: {}/{} rows, {} desync events",
            status.rows_decoded, status.expected_rows, status.desync_events
        );
    }
    println!("Saved to {}", folder.display());
    Ok(())
}

/// List the supported modes.
pub fn list_modes() -> Result<()> {
    println!(
        "{:<10} {:>9} {:>4} {:>10} {:>9}",
        "Mode", "Size", "VIS", "Line (ms)", "Total (s)"
    );
    for mode in MODES.iter() {
        println!(
            "{:<10} {:>9} {:>4} {:>10.3} {:>9.2}",
            mode.name,
            format!("{}x{}", mode.width, mode.height),
            mode.vis_code,
            mode.line_duration_ms(),
            mode.transmission_duration_ms() / 1000.0
        );
    }
    Ok(())
}

/// List presets, or print one as chain JSON.
pub fn list_presets(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let chain = presets::by_name(name)?;
            println!("{}", serde_json::to_string_pretty(&chain.to_json()?)?);
        }
        None => {
            for preset in presets::PRESETS {
                println!("{:<22} {:?}", preset.name, preset.tier);
            }
        }
    }
    Ok(())
}

/// List the effects and their parameters.
pub fn list_effects() -> Result<()> {
    for kind in EffectKind::ALL {
        println!("{} ({})", kind.display_name(), kind.name());
        for param in kind.params() {
            println!(
                "    {:<12} {:>8} .. {:<8} default {:<8} {}",
                param.name, param.min, param.max, param.default, param.description
            );
        }
        if kind == EffectKind::Noise {
            println!("    noise_type   white | pink | gaussian | crackle");
        }
    }
    Ok(())
}

/// List saved transmissions, newest first.
pub fn list_outputs(config: &AppConfig, output_dir: Option<&Path>) -> Result<()> {
    let manager = OutputManager::new(output_dir.unwrap_or(config.output_dir.as_path()))?;
    let outputs = manager.list_outputs()?;
    if outputs.is_empty() {
        println!("No saved transmissions in {}", manager.base_dir().display());
        return Ok(());
    }
    for entry in outputs {
        let effects = entry
            .metadata
            .as_ref()
            .map(|m| m.chain.len())
            .unwrap_or(0);
        println!(
            "{} {}  {:<10} {} effects  {}",
            entry.date,
            entry.time,
            entry.mode,
            effects,
            entry.folder.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SstvError;

    #[test]
    fn test_parse_effect_with_params() {
        let spec = parse_effect("noise:amount=0.3, noise_type=pink").unwrap();
        assert_eq!(spec.kind, EffectKind::Noise);
        assert_eq!(spec.params.get("amount"), Some(&ParamValue::Number(0.3)));
        assert_eq!(
            spec.params.get("noise_type"),
            Some(&ParamValue::Text("pink".to_string()))
        );
    }

    #[test]
    fn test_parse_effect_bare_name() {
        let spec = parse_effect("timestretch").unwrap();
        assert_eq!(spec.kind, EffectKind::TimeStretch);
        assert!(spec.params.is_empty());
    }

    #[test]
    fn test_parse_unknown_effect() {
        assert!(matches!(
            parse_effect("reverb:size=1"),
            Err(SstvError::UnknownEffect { .. })
        ));
    }

    #[test]
    fn test_build_chain_layers_sources() {
        let args = ChainArgs {
            preset: Some("Analog Warmth".to_string()),
            effects: vec!["delay:delay_ms=50".to_string()],
            seed: Some(11),
            ..ChainArgs::default()
        };
        let chain = build_chain(&args, &AppConfig::default()).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.effects.last().map(|e| e.kind), Some(EffectKind::Delay));
        assert_eq!(chain.seed, Some(11));
    }
}
