use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use ddc_control::config::{find_config_file, load_configs};
use ddc_control::enumerate::{discover, select_target};
use ddc_control::preset::{apply_feature, INPUT_SOURCE, PBP_MODE};
use ddc_control::{parse_hex_u16, parse_hex_u8, Ddc, Device, MonitorConfig, Sequencer};

/// VCP codes probed by `--scan`.
const SCAN_CODES: std::ops::RangeInclusive<u8> = 0xe0..=0xf2;

/// Switch monitor inputs, picture-by-picture and USB routing over DDC/CI.
#[derive(Debug, Parser)]
#[command(version, about, arg_required_else_help = true)]
struct Args {
    /// Path to the monitor configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// I2C bus device node, skipping discovery
    #[arg(long, env = "MONITOR_BUS")]
    bus: Option<PathBuf>,

    /// Show the current value of every configured feature
    #[arg(long)]
    status: bool,

    /// Switch the input source
    #[arg(long, value_name = "LABEL")]
    input: Option<String>,

    /// Set the picture-by-picture mode
    #[arg(long, value_name = "LABEL")]
    pbp: Option<String>,

    /// Apply a named preset
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Read VCP codes 0xE0 to 0xF2
    #[arg(long)]
    scan: bool,

    /// Read a raw VCP code
    #[arg(long, value_name = "VCP")]
    get: Option<String>,

    /// Write a raw VCP value
    #[arg(long, value_name = "VCP=VALUE")]
    set: Option<String>,

    /// Trace frame bytes and retries
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "ddc_control=debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

fn configs(explicit: Option<&Path>) -> Vec<MonitorConfig> {
    let loaded = find_config_file(explicit).and_then(|path| load_configs(&path));
    match loaded {
        Ok(configs) => configs,
        Err(e) => {
            warn!("{}", e);
            warn!("continuing without monitor configurations; only --get, --set and --scan are available");
            Vec::new()
        },
    }
}

fn run(args: &Args) -> Result<()> {
    let configs = configs(args.config.as_ref().map(|p| p.as_path()));
    let mut ddc = Ddc::linux();

    let devices = match args.bus {
        // an explicit bus still gets identified, but the rest are left alone
        Some(ref bus) => discover(&mut ddc, Some(bus.clone()), &configs),
        None => discover(&mut ddc, buses()?, &configs),
    };
    let target = select_target(devices, &configs, args.bus.as_ref().map(|p| p.as_path()))
        .context("no monitor detected")?;

    if args.scan {
        println!("Scanning VCP codes E0-F2 on {}...", target.bus.display());
        for (code, value) in ddc.scan(&target.bus, SCAN_CODES)? {
            println!("VCP 0x{:02X}: 0x{:04X}", code, value);
        }
        return Ok(())
    }

    if let Some(ref code) = args.get {
        let code = parse_hex_u8(code)?;
        let value = ddc.get_vcp(&target.bus, code)?;
        println!("VCP 0x{:02X}: 0x{:04X}", code, value);
    }

    if let Some(ref assignment) = args.set {
        let (code, value) = parse_assignment(assignment)?;
        ddc.set_vcp(&target.bus, code, value)?;
    }

    if let Some(ref name) = args.preset {
        println!("Applying preset: {} on {}", name, target.bus.display());
        let report = Sequencer::default().apply(&mut ddc, &target, name)?;
        for failure in report.failures() {
            if let Err(ref e) = failure.result {
                eprintln!("error applying {}: {}", failure.step.feature, e);
            }
        }
        if !report.is_success() {
            bail!("preset {} partially applied: {}", name, report);
        }
    }

    if let Some(ref label) = args.input {
        apply_feature(&mut ddc, &target, INPUT_SOURCE, label)?;
    }
    if let Some(ref label) = args.pbp {
        apply_feature(&mut ddc, &target, PBP_MODE, label)?;
    }

    let acted = args.input.is_some() || args.pbp.is_some() || args.preset.is_some()
        || args.get.is_some() || args.set.is_some();
    if args.status || !acted {
        status(&mut ddc, &target);
    }

    Ok(())
}

#[cfg(not(feature = "udev"))]
fn buses() -> Result<ddc_control::Enumerator> {
    ddc_control::Enumerator::new().context("failed to list i2c devices")
}

#[cfg(feature = "udev")]
fn buses() -> Result<ddc_control::UdevEnumerator> {
    ddc_control::UdevEnumerator::new().context("failed to list i2c devices through udev")
}

fn parse_assignment(s: &str) -> Result<(u8, u16)> {
    let mut parts = s.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(code), Some(value)) => Ok((parse_hex_u8(code)?, parse_hex_u16(value)?)),
        _ => Err(anyhow!("expected VCP=VALUE, got '{}'", s)),
    }
}

fn status(ddc: &mut Ddc, target: &Device) {
    println!("--- Status for {} ({}) ---", target.bus.display(), target.identity);
    let config = match target.config {
        Some(config) => config,
        None => return,
    };

    for (name, feature) in &config.features {
        let value = parse_hex_u8(&feature.vcp).and_then(|code| ddc.get_vcp(&target.bus, code));
        match value {
            Ok(value) => match config.label_for(name, value) {
                Some(label) => println!("{}: 0x{:04X} ({})", name, value, label),
                None => println!("{}: 0x{:04X}", name, value),
            },
            Err(e) => println!("{}: {}", name, e),
        }
    }
}
