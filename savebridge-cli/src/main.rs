/*!
SaveBridge CLI - copy Balatro saves between the Steam and Apple Arcade versions.

This CLI wraps the core sync engine: copying slots in either direction,
printing decoded slots, listing what each backend holds, and converting blobs
to and from the base64 transport form.
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use savebridge_core::{
    base64_and_inflate, compress_and_base64, create_default_engine,
    observability::{init_observability, LogFormat},
    BackendKind, SaveLocations, SaveStorage, Slot,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "savebridge")]
#[command(about = "Balatro save manager - sync saves between Steam and Apple Arcade versions")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Steam save root (contains the 1/, 2/ and 3/ slot directories)
    #[arg(long, global = true, env = "SAVEBRIDGE_STEAM_DIR")]
    steam_dir: Option<PathBuf>,

    /// Apple Arcade preferences property list
    #[arg(long, global = true, env = "SAVEBRIDGE_ARCADE_PLIST")]
    arcade_plist: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy save from Arcade to Steam
    ArcadeToSteam {
        /// Arcade save slot number (1, 2, or 3)
        #[arg(long)]
        arcade_save: Slot,
        /// Steam save slot number (1, 2, or 3)
        #[arg(long)]
        steam_save: Slot,
    },
    /// Copy save from Steam to Arcade
    SteamToArcade {
        /// Steam save slot number (1, 2, or 3)
        #[arg(long)]
        steam_save: Slot,
        /// Arcade save slot number (1, 2, or 3)
        #[arg(long)]
        arcade_save: Slot,
    },
    /// Print Arcade save data
    PrintArcade {
        /// Save slot number (1, 2, or 3)
        #[arg(long)]
        save: Slot,
    },
    /// Print Steam save data
    PrintSteam {
        /// Save slot number (1, 2, or 3)
        #[arg(long)]
        save: Slot,
    },
    /// Show which slots hold saves in each backend
    Status,
    /// Compress a file into the base64 transport form
    Encode {
        /// File to compress ("-" for stdin)
        input: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Inflate a base64 transport string back into raw bytes
    Decode {
        /// File holding the base64 text ("-" for stdin)
        input: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct SlotInfo {
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Meta")]
    meta: String,
    #[tabled(rename = "Profile")]
    profile: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Initialize logging
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_observability(cli.verbose, format)?;

    // Execute command
    run(cli)
}

fn run(cli: Cli) -> Result<(), anyhow::Error> {
    match cli.command {
        Commands::ArcadeToSteam {
            arcade_save,
            steam_save,
        } => {
            let locations = resolve_locations(cli.steam_dir, cli.arcade_plist)?;
            copy_save(&locations, BackendKind::Arcade, arcade_save, BackendKind::Steam, steam_save)
        }
        Commands::SteamToArcade {
            steam_save,
            arcade_save,
        } => {
            let locations = resolve_locations(cli.steam_dir, cli.arcade_plist)?;
            copy_save(&locations, BackendKind::Steam, steam_save, BackendKind::Arcade, arcade_save)
        }
        Commands::PrintArcade { save } => {
            let locations = resolve_locations(cli.steam_dir, cli.arcade_plist)?;
            print_save(&locations, BackendKind::Arcade, save)
        }
        Commands::PrintSteam { save } => {
            let locations = resolve_locations(cli.steam_dir, cli.arcade_plist)?;
            print_save(&locations, BackendKind::Steam, save)
        }
        Commands::Status => {
            let locations = resolve_locations(cli.steam_dir, cli.arcade_plist)?;
            show_status(&locations)
        }
        Commands::Encode { input, out } => {
            let raw = read_input(&input)?;
            let encoded = compress_and_base64(&raw)?;
            write_output(out.as_ref(), format!("{encoded}\n").as_bytes())
        }
        Commands::Decode { input, out } => {
            let text = read_input(&input)?;
            let raw = base64_and_inflate(&text)?;
            write_output(out.as_ref(), &raw)
        }
    }
}

fn resolve_locations(
    steam_dir: Option<PathBuf>,
    arcade_plist: Option<PathBuf>,
) -> Result<SaveLocations, anyhow::Error> {
    let locations = match (steam_dir, arcade_plist) {
        (Some(steam), Some(arcade)) => {
            let locations = SaveLocations::new(steam, arcade);
            locations.validate()?;
            locations
        }
        (steam, arcade) => SaveLocations::default_paths()?.with_overrides(steam, arcade)?,
    };
    info!(
        steam = %locations.steam_root.display(),
        arcade = %locations.arcade_plist.display(),
        "using save locations"
    );
    Ok(locations)
}

fn copy_save(
    locations: &SaveLocations,
    from: BackendKind,
    from_slot: Slot,
    to: BackendKind,
    to_slot: Slot,
) -> Result<(), anyhow::Error> {
    println!("Copying save from {from} slot {from_slot} to {to} slot {to_slot}...");

    let mut source = locations.open_backend(from);
    let mut dest = locations.open_backend(to);
    let engine = create_default_engine();

    let copied = engine.sync(&mut source, from_slot, &mut dest, to_slot)?;
    println!(
        "✓ Save copied from {from} to {to} (meta {}, profile {})",
        format_size(copied.meta.len() as u64),
        format_size(copied.profile.len() as u64)
    );
    Ok(())
}

fn print_save(locations: &SaveLocations, kind: BackendKind, slot: Slot) -> Result<(), anyhow::Error> {
    let mut backend = locations.open_backend(kind);
    let engine = create_default_engine();

    let report = engine.inspect(&mut backend, slot)?;
    println!("{}", report.to_json_pretty()?);

    if !report.is_complete() {
        for (field, e) in report.errors() {
            error!("Failed to decode {} of {} slot {}: {}", field, kind, slot, e);
        }
        anyhow::bail!("{kind} slot {slot} could only be partially decoded");
    }
    Ok(())
}

fn show_status(locations: &SaveLocations) -> Result<(), anyhow::Error> {
    let mut rows = Vec::new();

    for kind in [BackendKind::Steam, BackendKind::Arcade] {
        let mut backend = locations.open_backend(kind);
        for slot in Slot::ALL {
            rows.push(slot_info(backend.as_mut(), kind, slot));
        }
    }

    let table = Table::new(rows);
    println!("{table}");
    Ok(())
}

fn slot_info(backend: &mut dyn SaveStorage, kind: BackendKind, slot: Slot) -> SlotInfo {
    let (state, meta, profile) = match backend.load(slot) {
        Ok(loaded) if loaded.is_fresh() => ("empty".to_string(), "-".to_string(), "-".to_string()),
        Ok(loaded) => (
            "saved".to_string(),
            format_size(loaded.blobs.meta.len() as u64),
            format_size(loaded.blobs.profile.len() as u64),
        ),
        Err(e) if e.is_not_found() => ("missing".to_string(), "-".to_string(), "-".to_string()),
        Err(e) => (format!("error: {e}"), "-".to_string(), "-".to_string()),
    };

    SlotInfo {
        backend: kind.to_string(),
        slot: slot.to_string(),
        state,
        meta,
        profile,
    }
}

fn read_input(input: &str) -> Result<Vec<u8>, anyhow::Error> {
    if input == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn write_output(out: Option<&PathBuf>, bytes: &[u8]) -> Result<(), anyhow::Error> {
    match out {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_invalid_slot_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["savebridge", "print-steam", "--save", "4"]);
        let err = result.err().expect("slot 4 must be rejected");
        assert!(err.to_string().contains("invalid save slot"));
    }

    #[test]
    fn test_sync_arguments_parse_into_slots() {
        let cli = Cli::try_parse_from([
            "savebridge",
            "arcade-to-steam",
            "--arcade-save",
            "1",
            "--steam-save",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::ArcadeToSteam {
                arcade_save,
                steam_save,
            } => {
                assert_eq!(arcade_save, Slot::One);
                assert_eq!(steam_save, Slot::Three);
            }
            _ => panic!("expected arcade-to-steam"),
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
