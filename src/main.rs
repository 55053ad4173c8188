use rtsp_recorder::common::logging_setup;
use rtsp_recorder::{cli, config_loader, operations};
use log::{info, error, debug};
use anyhow::{Context, Result, bail};
use std::time::Instant;

const DEFAULT_CONFIG_PATH: &str = "config/recorder.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let master_config = match config_loader::load_config_or_default(config_path, DEFAULT_CONFIG_PATH) {
        Ok(cfg) => {
            logging_setup::initialize_logging(Some(&cfg), &matches);
            cfg
        }
        Err(e) => {
            logging_setup::initialize_logging(None, &matches);
            error!("❌ Failed to load configuration: {:#}. Exiting.", e);
            return Err(e);
        }
    };

    let Some((operation_name, sub_matches)) = matches.subcommand() else {
        info!("🤔 No subcommand provided. Try 'rtsp-recorder --help'.");
        return Ok(());
    };

    if operation_name == "check" {
        return operations::check_op::handle_check_cli(&master_config).await;
    }

    let settings = operations::op_helper::load_initial_settings(&master_config, &matches)?;
    let supervisor = operations::op_helper::build_supervisor(&master_config, settings);
    debug!("🎬 Dispatching to subcommand: {}", operation_name);
    let op_start_time = Instant::now();

    let op_result: Result<()> = match operation_name {
        "groups" => operations::op_helper::handle_groups_cli(&supervisor).await,
        "record" => operations::record_op::handle_record_cli(&master_config, &supervisor, sub_matches).await,
        "console" => operations::console_op::handle_console_cli(&master_config, &supervisor).await,
        "preview" => operations::op_helper::handle_preview_cli(&master_config, &supervisor, sub_matches).await,
        "probe" => operations::probe_op::handle_probe_cli(&master_config, &supervisor, sub_matches).await,
        other => bail!("Subcommand '{}' not implemented.", other),
    };

    // Never leave engines running behind us, whatever the operation did.
    if let Some(report) = supervisor.shutdown().await {
        println!("{}", report.to_string().trim_end());
    }

    match op_result {
        Err(e) => {
            error!("❌ Operation '{}' failed after {:?}: {:#}", operation_name, op_start_time.elapsed(), e);
            Err(e).context(format!("Operation '{}' failed", operation_name))
        }
        Ok(()) => {
            info!("🏁 '{}' finished in {:?}.", operation_name, main_start_time.elapsed());
            Ok(())
        }
    }
}
