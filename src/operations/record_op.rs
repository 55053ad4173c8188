use crate::config_loader::MasterConfig;
use crate::core::session_supervisor::SessionSupervisor;
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use log::{info, warn, debug};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub async fn handle_record_cli(
    master_config: &MasterConfig,
    supervisor: &Arc<SessionSupervisor>,
    args: &ArgMatches,
) -> Result<()> {
    let op_start_time = Instant::now();
    let group_name = args.get_one::<String>("group")
        .context("Missing --group argument for record command")?;
    let container = args.get_one::<String>("container")
        .cloned()
        .unwrap_or_else(|| master_config.app_settings.default_container.clone());
    let duration = args.get_one::<u64>("duration").copied().map(Duration::from_secs);
    debug!("Record CLI: group: {}, container: {}, duration: {:?}", group_name, container, duration);

    let handle = supervisor
        .start(group_name, &container)
        .await
        .with_context(|| format!("Could not start recording group '{}'", group_name))?;
    println!(
        "Recording {} started at {} save in {} folder",
        handle.group_name,
        handle.started_at.format("%Y%m%d_%H%M%S"),
        handle.output_folder.display()
    );
    for task in handle.failed() {
        println!("  {} failed: {}", task.camera_name, task.failure.as_deref().unwrap_or("unknown error"));
    }
    if handle.running_count() == 0 {
        warn!("⚠️ No camera of '{}' is recording; stopping right away.", group_name);
    } else {
        match duration {
            Some(d) => info!("📹 Recording for {:?}. Press Ctrl-C to stop earlier.", d),
            None => info!("📹 Recording until Ctrl-C."),
        }
        wait_for_stop_request(supervisor, duration, master_config.app_settings.status_interval()).await;
    }

    let report = supervisor.stop().await.context("Failed to stop recording session")?;
    println!("{}", report.to_string().trim_end());
    info!("🏁 Record operation finished in {:?}.", op_start_time.elapsed());

    if report.stopped_count() == 0 {
        bail!("No camera of group '{}' recorded successfully.", report.group_name);
    }
    Ok(())
}

/// Prints the status line every `status_interval` until Ctrl-C, the optional
/// duration, or every camera having failed.
async fn wait_for_stop_request(supervisor: &SessionSupervisor, duration: Option<Duration>, status_interval: Duration) {
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(status_interval);

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("⚠️ Could not listen for Ctrl-C: {}", e);
                }
                info!("🛑 Ctrl-C received, stopping.");
                break;
            }
            _ = &mut deadline => {
                info!("⏰ Requested duration elapsed, stopping.");
                break;
            }
            _ = ticker.tick() => {
                supervisor.poll().await;
                println!("{}", supervisor.status_text().await);
                let all_failed = supervisor
                    .active_handle()
                    .await
                    .map(|h| h.running_count() == 0)
                    .unwrap_or(true);
                if all_failed {
                    warn!("⚠️ Every camera has stopped recording.");
                    break;
                }
            }
        }
    }
}
