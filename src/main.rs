// src/main.rs
//
// switchboard - command line front end for the switchboard link.
// A thin presentation layer over the controller: list ports, send commands
// or raw frames, and watch incoming traffic.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use switchboard_lib::{commands, logging, settings, LinkEvent, LinkSettings, SendTarget};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Drive the switchboard controller over serial")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List candidate serial devices
    Ports {
        /// Show USB details reported by the OS
        #[arg(long)]
        detail: bool,
    },
    /// List command keys and their frames
    Keys,
    /// Send one command key or raw hex frame
    Send {
        /// Device path (defaults to the last used port)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Command key, e.g. "LIGHT 1"
        #[arg(long, conflicts_with = "raw", required_unless_present = "raw")]
        key: Option<String>,
        /// Raw hex, e.g. "AA 55 02 01"
        #[arg(long)]
        raw: Option<String>,
        /// Keep listening for replies this many milliseconds
        #[arg(long, default_value_t = 300)]
        wait_ms: u64,
    },
    /// Print received bytes and frames until interrupted
    Monitor {
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("error: {}", e);
        logging::stop_file_logging();
        std::process::exit(1);
    }
    logging::stop_file_logging();
}

async fn run(cli: Cli) -> Result<(), String> {
    let link_settings = match &cli.settings {
        Some(path) => settings::load_settings_from(path)?,
        None => settings::load_settings()?,
    };

    if let Some(dir) = &link_settings.log_dir {
        logging::init_file_logging(std::path::Path::new(dir))?;
    }

    match cli.command {
        Command::Ports { detail } => {
            if detail {
                for device in link_settings.describe_ports() {
                    println!("{}", device.summary());
                }
            } else {
                for port in link_settings.list_ports() {
                    println!("{}", port);
                }
            }
            Ok(())
        }
        Command::Keys => {
            for key in commands::keys() {
                let frame = commands::frame_for(key).map_err(|e| e.to_string())?;
                println!("{:<8} {}", key, frame);
            }
            Ok(())
        }
        Command::Send {
            port,
            baud,
            key,
            raw,
            wait_ms,
        } => {
            let (mut controller, mut events) =
                connect(&link_settings, port, baud, cli.settings.as_ref())?;

            let result = match (key, raw) {
                (Some(key), _) => controller.send_cmd(&key),
                (None, Some(raw)) => controller.send_raw(&raw),
                (None, None) => return Err("either --key or --raw is required".to_string()),
            };

            let deadline = tokio::time::sleep(Duration::from_millis(wait_ms));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    received = controller.next_chunk() => {
                        if received.is_none() {
                            break;
                        }
                    }
                }
                print_events(&mut events, cli.json);
            }

            controller.disconnect();
            print_events(&mut events, cli.json);
            result.map(|_| ()).map_err(|e| e.to_string())
        }
        Command::Monitor {
            port,
            baud,
            seconds,
        } => {
            let (mut controller, mut events) =
                connect(&link_settings, port, baud, cli.settings.as_ref())?;
            print_events(&mut events, cli.json);

            let limit = seconds.map(Duration::from_secs).unwrap_or(Duration::MAX);
            let deadline = tokio::time::sleep(limit.min(Duration::from_secs(u32::MAX as u64)));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    _ = tokio::signal::ctrl_c() => break,
                    received = controller.next_chunk() => {
                        if received.is_none() {
                            break;
                        }
                    }
                }
                print_events(&mut events, cli.json);
            }

            controller.disconnect();
            print_events(&mut events, cli.json);
            Ok(())
        }
    }
}

fn connect(
    link_settings: &LinkSettings,
    port: Option<String>,
    baud: Option<u32>,
    settings_path: Option<&PathBuf>,
) -> Result<
    (
        switchboard_lib::Controller<switchboard_lib::SerialLink>,
        switchboard_lib::EventReceiver,
    ),
    String,
> {
    let path = port
        .or_else(|| link_settings.port.clone())
        .ok_or_else(|| "no port given and no last used port in settings".to_string())?;
    let baud = baud.unwrap_or(link_settings.baud_rate);

    let (mut controller, events) = switchboard_lib::open_controller(link_settings);
    controller.connect(&path, baud).map_err(|e| e.to_string())?;

    // Remember the port for next time
    if link_settings.port.as_deref() != Some(path.as_str()) {
        let updated = LinkSettings {
            port: Some(path),
            ..link_settings.clone()
        };
        let saved = match settings_path {
            Some(p) => settings::save_settings_to(p, &updated),
            None => settings::save_settings(&updated),
        };
        if let Err(e) = saved {
            eprintln!("warning: {}", e);
        }
    }

    Ok((controller, events))
}

fn print_events(events: &mut switchboard_lib::EventReceiver, json: bool) {
    while let Ok(event) = events.try_recv() {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("Failed to serialize event: {}", e),
            }
            continue;
        }

        match event {
            LinkEvent::RawReceived { hex, .. } => println!("RX  {}", hex),
            LinkEvent::FrameReceived { hex, frame, .. } => match commands::key_for(&frame) {
                Some(key) => println!("FRM {}  ({})", hex, key),
                None => println!("FRM {}", hex),
            },
            LinkEvent::SendResult {
                target,
                success,
                hex,
                error,
                ..
            } => {
                let label = match target {
                    SendTarget::Key(k) => k,
                    SendTarget::Raw(r) => format!("raw {}", r),
                };
                if success {
                    println!("TX  {}  ({})", hex.unwrap_or_default(), label);
                } else {
                    println!("TX  failed ({}): {}", label, error.unwrap_or_default());
                }
            }
            LinkEvent::ConnectionChanged {
                open, port, baud_rate, ..
            } => {
                if open {
                    println!(
                        "--  connected {} @ {}",
                        port.unwrap_or_default(),
                        baud_rate.unwrap_or_default()
                    );
                } else {
                    println!("--  disconnected");
                }
            }
            LinkEvent::Error { message, .. } => println!("ERR {}", message),
        }
    }
}
