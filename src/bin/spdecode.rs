//! Telemetry dump decoder CLI
//!
//! Usage:
//!   spdecode dump.hex --catalog catalog.yaml
//!   spdecode dump.bin --catalog catalog.yaml --apid 0x1A3 --table

use anyhow::{Context, Result};
use clap::Parser;
use spacepacket::{DecodeOptions, PacketCatalog, StreamTable, TelemetryDump, decode_telemetry};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spdecode", about = "Decode a spacecraft telemetry dump into engineering values")]
struct Args {
    /// Telemetry dump: hex text or raw binary
    dump: PathBuf,

    /// Field catalog (YAML)
    #[arg(short, long)]
    catalog: PathBuf,

    /// Only decode this stream identifier (e.g. 0x1A3)
    #[arg(long, value_parser = parse_apid)]
    apid: Option<u16>,

    /// Decode segments individually instead of reassembling them
    #[arg(long)]
    no_reassembly: bool,

    /// Print the decoded table for --apid
    #[arg(long, requires = "apid")]
    table: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_apid(text: &str) -> Result<u16, String> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
    let parsed = match digits {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    match parsed {
        Ok(apid) if apid <= spacepacket::catalog::MAX_APID => Ok(apid),
        Ok(apid) => Err(format!("apid {:#x} does not fit in 11 bits", apid)),
        Err(err) => Err(format!("invalid apid '{}': {}", text, err)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "spacepacket=debug,spdecode=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let catalog = PacketCatalog::open(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog.display()))?;
    let dump = TelemetryDump::open(&args.dump)
        .with_context(|| format!("loading dump {}", args.dump.display()))?;

    let options = DecodeOptions { reassemble: !args.no_reassembly, apid: args.apid };
    let report = decode_telemetry(&dump, &catalog, &options)
        .with_context(|| format!("decoding {}", args.dump.display()))?;

    info!("Framed {} packets, decoded {}", report.framed_packets, report.packets.len());
    if let Some(stats) = report.reassembly {
        info!(
            "Reassembled {} groups ({} duplicate starts, {} orphan segments, {} unterminated)",
            stats.reassembled, stats.duplicate_starts, stats.orphan_segments, stats.unterminated
        );
    }

    println!("{:<8} {:<32} {:>8}", "APID", "STREAM", "PACKETS");
    for (apid, count) in report.counts() {
        println!("{:<8} {:<32} {:>8}", format!("{:#x}", apid), catalog.display_name(apid), count);
    }
    for (apid, count) in &report.undecoded {
        println!("{:<8} {:<32} {:>8}", format!("{:#x}", apid), "(not in catalog)", count);
    }

    if let Some(err) = &report.framing_error {
        println!("\nFraming stopped: {}", err);
        for suggestion in err.recovery_suggestions() {
            println!("  - {}", suggestion);
        }
    }
    if !report.failures.is_empty() {
        println!("\nFailed packets:");
        for failure in &report.failures {
            println!("  byte {:#x}: {}", failure.byte_offset, failure.error);
        }
    }
    let formats = report.unsupported_formats();
    if !formats.is_empty() {
        println!("\nFormats without a conversion:");
        for summary in formats {
            println!("  '{}' x{} (e.g. {}): {}", summary.format, summary.occurrences, summary.example_bits, summary.reason);
        }
    }

    if let (true, Some(apid)) = (args.table, args.apid) {
        println!("\n{}", catalog.display_name(apid));
        print!("{}", StreamTable::from_packets(apid, &report.packets));
    }

    Ok(())
}
