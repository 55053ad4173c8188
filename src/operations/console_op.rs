use crate::config_loader::MasterConfig;
use crate::core::preview::{launch_preview, PreviewOptions};
use crate::core::session_supervisor::SessionSupervisor;
use crate::operations::op_helper;
use anyhow::Result;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
Commands:
  load <file>                 load a camera settings file
  groups                      list camera groups
  start <group> [container]   start recording a group
  stop                        stop the current recording
  status                      show recording status and elapsed time
  preview <group> <camera>    open a live preview of one camera
  help                        show this help
  quit                        stop any recording and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Load(PathBuf),
    Groups,
    Start { group: String, container: Option<String> },
    Stop,
    Status,
    Preview { group: String, camera: String },
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ConsoleCommand::Empty);
    };
    let rest: Vec<&str> = words.collect();
    let command = match (verb.to_lowercase().as_str(), rest.as_slice()) {
        ("load", [path]) => ConsoleCommand::Load(PathBuf::from(path)),
        ("groups", []) => ConsoleCommand::Groups,
        ("start", [group]) => ConsoleCommand::Start { group: group.to_string(), container: None },
        ("start", [group, container]) => ConsoleCommand::Start {
            group: group.to_string(),
            container: Some(container.to_string()),
        },
        ("stop", []) => ConsoleCommand::Stop,
        ("status", []) => ConsoleCommand::Status,
        ("preview", [group, camera]) => ConsoleCommand::Preview {
            group: group.to_string(),
            camera: camera.to_string(),
        },
        ("help", _) | ("?", _) => ConsoleCommand::Help,
        ("quit", []) | ("exit", []) => ConsoleCommand::Quit,
        (verb @ ("load" | "groups" | "start" | "stop" | "status" | "preview" | "quit" | "exit"), _) => {
            return Err(format!("Wrong arguments for '{}'. Type 'help'.", verb));
        }
        (other, _) => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };
    Ok(command)
}

/// Reads commands from stdin and prints supervisor status events as they
/// arrive. Stops run in their own task so input keeps being accepted while
/// engines shut down.
pub async fn handle_console_cli(master_config: &MasterConfig, supervisor: &Arc<SessionSupervisor>) -> Result<()> {
    let preview_options = PreviewOptions::from_config(&master_config.app_settings);
    let default_container = master_config.app_settings.default_container.clone();
    let mut events = supervisor.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(master_config.app_settings.status_interval());

    println!("{}", HELP);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!("⚠️ Failed to read from stdin: {}", e);
                        break;
                    }
                };
                match parse_command(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => run_command(command, supervisor, &preview_options, &default_container).await,
                    Err(message) => println!("{}", message),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => println!("{}", event),
                    Err(RecvError::Lagged(skipped)) => warn!("⚠️ {} status message(s) dropped.", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
            _ = ticker.tick() => {
                supervisor.poll().await;
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("⚠️ Could not listen for Ctrl-C: {}", e);
                }
                info!("🛑 Ctrl-C received.");
                break;
            }
        }
    }

    if let Some(report) = supervisor.shutdown().await {
        println!("{}", report.to_string().trim_end());
    }
    Ok(())
}

async fn run_command(
    command: ConsoleCommand,
    supervisor: &Arc<SessionSupervisor>,
    preview_options: &PreviewOptions,
    default_container: &str,
) {
    match command {
        ConsoleCommand::Empty | ConsoleCommand::Quit => {}
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Load(path) => match supervisor.reload_settings(&path).await {
            Ok(_) => {
                let settings = supervisor.settings();
                let settings = settings.read().await;
                for line in op_helper::describe_settings(&settings) {
                    println!("{}", line);
                }
            }
            // Previous groups stay loaded.
            Err(e) => println!("Error loading camera settings file: {}", e),
        },
        ConsoleCommand::Groups => {
            let settings = supervisor.settings();
            let settings = settings.read().await;
            if settings.is_empty() {
                println!("No camera groups loaded. Use 'load <file>'.");
            }
            for line in op_helper::describe_settings(&settings) {
                println!("{}", line);
            }
        }
        ConsoleCommand::Start { group, container } => {
            let container = container.unwrap_or_else(|| default_container.to_string());
            // Success is announced through the SessionStarted event.
            if let Err(e) = supervisor.start(&group, &container).await {
                println!("Cannot start recording: {}", e);
            }
        }
        ConsoleCommand::Stop => {
            let supervisor = Arc::clone(supervisor);
            tokio::spawn(async move {
                if let Err(e) = supervisor.stop().await {
                    println!("Cannot stop recording: {}", e);
                }
            });
        }
        ConsoleCommand::Status => println!("{}", supervisor.status_text().await),
        ConsoleCommand::Preview { group, camera } => {
            match op_helper::find_camera(supervisor, &group, &camera).await {
                Ok(setting) => {
                    if let Err(e) = launch_preview(&setting, preview_options) {
                        println!("Cannot open preview: {}", e);
                    }
                }
                Err(e) => println!("Cannot open preview: {}", e),
            }
        }
    }
}
