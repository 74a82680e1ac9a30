//! Motion rig driver CLI
//!
//! Usage: digibow [OPTIONS] <COMMAND>
//!
//! Commands:
//!   download <path> <segment>   Fetch and validate a trajectory
//!   play <path> <segment>       Fetch a trajectory and play it
//!   random                      Play the synthetic sequence
//!   list-ports                  List serial ports
//!
//! Examples:
//!   digibow --config rig.json play runs/day1 warmup
//!   digibow --dry-run random --input 5,0,0,0,0,0.01 --period 3
//!   digibow --port /dev/ttyACM0 random

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use digibow::{
    Device, DeviceRegistry, DirectoryFetcher, DownloadRequest, DryRunOpener, ExecuteRequest,
    PacketCodec, PortOpener, RigConfig, StewartSolver,
};

enum Action {
    Download { path: String, segment: String },
    Play { path: String, segment: String },
    Random { input: Vec<f64>, period: u64 },
    ListPorts,
}

struct Args {
    config: Option<PathBuf>,
    port: Option<String>,
    dry_run: bool,
    action: Action,
}

fn parse_input(text: &str) -> Option<Vec<f64>> {
    text.split(',')
        .map(|v| v.trim().parse::<f64>().ok())
        .collect()
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return None;
    }

    let mut config = None;
    let mut port = None;
    let mut dry_run = false;
    let mut input = Vec::new();
    let mut period = 0u64;
    let mut positional = Vec::new();
    let mut i = 1;

    while i < args.len() {
        let arg = &args[i];

        if arg == "--config" {
            if i + 1 < args.len() {
                config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            } else {
                eprintln!("Error: --config requires a file argument");
                return None;
            }
        }

        if arg == "--port" {
            if i + 1 < args.len() {
                port = Some(args[i + 1].clone());
                i += 2;
                continue;
            } else {
                eprintln!("Error: --port requires a port name");
                return None;
            }
        }

        if arg == "--input" {
            if i + 1 < args.len() {
                match parse_input(&args[i + 1]) {
                    Some(values) => input = values,
                    None => {
                        eprintln!("Error: --input expects comma-separated numbers");
                        return None;
                    }
                }
                i += 2;
                continue;
            } else {
                eprintln!("Error: --input requires a value list");
                return None;
            }
        }

        if arg == "--period" {
            if let Some(p) = args.get(i + 1).and_then(|s| s.parse::<u64>().ok()) {
                period = p;
                i += 2;
                continue;
            } else {
                eprintln!("Error: --period requires a number of seconds");
                return None;
            }
        }

        if arg == "--dry-run" {
            dry_run = true;
            i += 1;
            continue;
        }

        if arg == "--help" || arg == "-h" {
            return None;
        }

        positional.push(arg.clone());
        i += 1;
    }

    let action = match positional.first().map(String::as_str)? {
        "download" if positional.len() == 3 => Action::Download {
            path: positional[1].clone(),
            segment: positional[2].clone(),
        },
        "play" if positional.len() == 3 => Action::Play {
            path: positional[1].clone(),
            segment: positional[2].clone(),
        },
        "random" if positional.len() == 1 => Action::Random { input, period },
        "list-ports" => Action::ListPorts,
        other => {
            eprintln!("Error: unrecognized command {:?}", other);
            return None;
        }
    };

    Some(Args {
        config,
        port,
        dry_run,
        action,
    })
}

fn print_usage() {
    println!("Usage: digibow [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  download <path> <segment>   Fetch and validate a trajectory");
    println!("  play <path> <segment>       Fetch a trajectory and play it");
    println!("  random                      Play the synthetic sequence");
    println!("  list-ports                  List serial ports");
    println!();
    println!("Options:");
    println!("  --config <file>      JSON rig configuration (default: built-in)");
    println!("  --port <name>        Serial port, overrides the configuration");
    println!("  --dry-run            Log packets instead of writing to the port");
    println!("  --input <a,b,c,d,e,f>  Explicit command for random (deg, deg, deg, m, m, m)");
    println!("  --period <s>         Seconds between random steps");
    println!();
    println!("Examples:");
    println!("  digibow --config rig.json play runs/day1 warmup");
    println!("  digibow --dry-run random --input 5,0,0,0,0,0.01 --period 3");
}

fn print_ports() {
    println!("Available ports:");
    #[cfg(feature = "serial")]
    match digibow::list_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                println!("  (none found)");
            } else {
                for port in ports {
                    println!("  {}", port);
                }
            }
        }
        Err(e) => println!("  Error listing ports: {}", e),
    }
    #[cfg(not(feature = "serial"))]
    println!("  (built without the serial feature)");
}

fn opener(dry_run: bool, codec: PacketCodec) -> Result<Arc<dyn PortOpener>> {
    if dry_run {
        return Ok(Arc::new(DryRunOpener::new(codec)));
    }
    #[cfg(feature = "serial")]
    return Ok(Arc::new(digibow::SerialPortOpener));
    #[cfg(not(feature = "serial"))]
    bail!("built without the serial feature, use --dry-run");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("digibow=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = match parse_args() {
        Some(a) => a,
        None => {
            print_usage();
            return Ok(());
        }
    };

    if let Action::ListPorts = args.action {
        print_ports();
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => RigConfig::from_json_file(path)?,
        None => RigConfig::default(),
    };
    if let Some(port) = args.port {
        config.com.port = port;
    }

    let codec = PacketCodec::new(config.calibration)?;
    let opener = opener(args.dry_run, codec)?;
    let device = DeviceRegistry::global().get_or_create(&config.com.port, || {
        Device::new(
            &config,
            Arc::new(StewartSolver::new(config.geometry)?),
            Arc::new(DirectoryFetcher::new(&config.storage_root)),
            opener,
        )
    })?;

    tracing::info!("Device: {}", device.id());
    tracing::info!(
        "Storage: {}{}",
        config.storage_root.display(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let request = match args.action {
        Action::Download { path, segment } => {
            device.download(&DownloadRequest::new(path, segment)).await?;
            return Ok(());
        }
        Action::Play { path, segment } => {
            device
                .download(&DownloadRequest::new(path, segment.clone()))
                .await?;
            ExecuteRequest::segment(segment)
        }
        Action::Random { input, period } => {
            ExecuteRequest::random().with_input(input).with_period(period)
        }
        Action::ListPorts => return Ok(()),
    };

    let handle = device.execute(&request)?;

    let signal_device = Arc::clone(&device);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping playback");
            signal_device.shutdown();
        }
    });

    let report = handle.join().await?;
    if !report.reset_written {
        bail!("rig was not returned to neutral");
    }
    println!(
        "Played {}/{} steps{}",
        report.steps_written,
        report.steps_planned,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
