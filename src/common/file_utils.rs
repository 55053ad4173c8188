use std::path::{Path, PathBuf};
use crate::errors::AppError;
use log::debug;

/// `<base>/<timestamp>` folder for one recording session.
pub fn session_folder_path(base: &Path, timestamp: &str) -> PathBuf {
    base.join(timestamp)
}

/// Like `session_folder_path`, but appends `_1`, `_2`, ... when a folder with
/// that timestamp already exists (a stop and restart within one second).
pub fn unique_session_folder(base: &Path, timestamp: &str) -> PathBuf {
    let candidate = session_folder_path(base, timestamp);
    if !candidate.exists() {
        return candidate;
    }
    let mut suffix = 1u32;
    loop {
        let candidate = base.join(format!("{}_{}", timestamp, suffix));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// `<folder>/<output_base_name>.<container>` for one camera.
pub fn destination_path(folder: &Path, output_base_name: &str, container: &str) -> PathBuf {
    folder.join(format!("{}.{}", output_base_name, container))
}

/// Creates `dir_path` (and parents) if missing. Already existing is fine.
pub fn ensure_output_directory(dir_path: &Path) -> Result<PathBuf, AppError> {
    if !dir_path.exists() {
        debug!("Output directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(dir_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to create output directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(AppError::Io(format!(
            "Output path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    Ok(dir_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_scenario_layout() {
        let folder = session_folder_path(Path::new("./data"), "20240101_120000");
        let dest = destination_path(&folder, "lobby_cam", "mp4");
        assert_eq!(dest, PathBuf::from("./data/20240101_120000/lobby_cam.mp4"));
    }

    #[test]
    fn repeated_timestamps_get_a_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let first = unique_session_folder(tmp.path(), "20240101_120000");
        assert_eq!(first, tmp.path().join("20240101_120000"));
        std::fs::create_dir_all(&first).unwrap();
        let second = unique_session_folder(tmp.path(), "20240101_120000");
        assert_eq!(second, tmp.path().join("20240101_120000_1"));
    }

    #[test]
    fn ensure_output_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        ensure_output_directory(&dir).unwrap();
        ensure_output_directory(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn ensure_output_directory_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(ensure_output_directory(&file), Err(AppError::Io(_))));
    }
}
