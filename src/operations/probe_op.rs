use crate::config_loader::MasterConfig;
use crate::core::capture_engine::{CaptureEngine, FfmpegEngine};
use crate::core::session_supervisor::SessionSupervisor;
use crate::operations::op_helper;
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use futures::future::join_all;
use log::{info, error, debug};
use std::time::Instant;

pub async fn handle_probe_cli(
    master_config: &MasterConfig,
    supervisor: &SessionSupervisor,
    args: &ArgMatches,
) -> Result<()> {
    let op_start_time = Instant::now();
    let group_name = args.get_one::<String>("group")
        .context("Missing --group argument for probe command")?;
    let group = op_helper::find_group(supervisor, group_name).await?;
    let engine = FfmpegEngine::from_config(&master_config.app_settings);
    info!("🔎 Probing {} camera(s) of '{}'...", group.members.len(), group.group_name);

    let probes = group.members.iter().map(|camera| {
        let engine = &engine;
        async move {
            let probe_start = Instant::now();
            let result = engine.probe_stream(&camera.source_url).await;
            debug!("Probe of '{}' took {:?}", camera.name, probe_start.elapsed());
            (camera, result)
        }
    });

    let mut failures = 0;
    for (camera, result) in join_all(probes).await {
        match result {
            Ok(info) => println!(
                "{}: {} {}x{} @ {:.2} fps",
                camera.name,
                info.codec.as_deref().unwrap_or("unknown codec"),
                info.width,
                info.height,
                info.frame_rate
            ),
            Err(e) => {
                error!("❌ Probe of '{}' failed: {}", camera.name, e);
                println!("{}: {}", camera.name, e);
                failures += 1;
            }
        }
    }
    info!("🏁 Probe finished in {:?}.", op_start_time.elapsed());
    if failures > 0 {
        bail!("{} of {} camera(s) could not be probed.", failures, group.members.len());
    }
    Ok(())
}
