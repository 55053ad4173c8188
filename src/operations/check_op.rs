use crate::common::file_utils;
use crate::config_loader::MasterConfig;
use anyhow::{Result, bail};
use log::{info, error, debug};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

struct DiagnosticResult {
    test_name: String,
    success: bool,
    details: String,
}

async fn check_tool(label: &str, program: &str) -> DiagnosticResult {
    let test_start = Instant::now();
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await;
    let (success, details) = match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let first_line = stdout.lines().next().unwrap_or("").trim().to_string();
            (true, first_line)
        }
        Ok(out) => (false, format!("'{} -version' exited with {}", program, out.status)),
        Err(e) => (false, format!("cannot run '{}': {}", program, e)),
    };
    debug!("Checked {} in {:?}", label, test_start.elapsed());
    DiagnosticResult { test_name: label.to_string(), success, details }
}

fn check_output_directory(base: &str) -> DiagnosticResult {
    let test_name = "Output directory".to_string();
    match file_utils::ensure_output_directory(Path::new(base)) {
        Ok(dir) => {
            let probe_file = dir.join(".rtsp-recorder-write-test");
            match std::fs::write(&probe_file, b"ok").and_then(|_| std::fs::remove_file(&probe_file)) {
                Ok(()) => DiagnosticResult { test_name, success: true, details: format!("{} is writable", dir.display()) },
                Err(e) => DiagnosticResult { test_name, success: false, details: format!("{} is not writable: {}", dir.display(), e) },
            }
        }
        Err(e) => DiagnosticResult { test_name, success: false, details: e.to_string() },
    }
}

pub async fn handle_check_cli(master_config: &MasterConfig) -> Result<()> {
    let overall_start_time = Instant::now();
    info!("🩺 Starting environment check...");
    let app = &master_config.app_settings;

    let mut results = vec![
        check_tool("Capture engine (ffmpeg)", &app.ffmpeg_path).await,
        check_tool("Preview player (ffplay)", &app.ffplay_path).await,
        check_tool("Stream probe (ffprobe)", &app.ffprobe_path).await,
    ];
    results.push(check_output_directory(&app.output_directory_base));

    let mut failed = 0;
    for result in &results {
        if result.success {
            println!("✅ {}: {}", result.test_name, result.details);
        } else {
            error!("❌ {}: {}", result.test_name, result.details);
            println!("❌ {}: {}", result.test_name, result.details);
            failed += 1;
        }
    }
    info!("🏁 Environment check finished in {:?}.", overall_start_time.elapsed());
    if failed > 0 {
        bail!("{} of {} check(s) failed.", failed, results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tool_is_reported_not_raised() {
        let result = check_tool("nothing", "/nonexistent/tool-binary").await;
        assert!(!result.success);
        assert!(result.details.contains("cannot run"));
    }

    #[test]
    fn writable_output_directory_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("data");
        let result = check_output_directory(base.to_str().unwrap());
        assert!(result.success, "{}", result.details);
    }
}
