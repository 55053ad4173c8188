use crate::errors::AppError;
use serde::Deserialize;
use std::collections::HashSet;

/// One camera entry as it appears in the settings file.
#[derive(Debug, Deserialize, Clone)]
struct RawCameraEntry {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Save_name")]
    save_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSetting {
    pub name: String,
    pub source_url: String,
    pub output_base_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraGroup {
    pub group_name: String,
    pub members: Vec<CameraSetting>,
}

impl CameraGroup {
    pub fn camera(&self, name: &str) -> Option<&CameraSetting> {
        self.members.iter().find(|c| c.name == name)
    }
}

/// All camera groups from one settings file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSettings {
    groups: Vec<CameraGroup>,
}

impl CameraSettings {
    pub fn new(groups: Vec<CameraGroup>) -> Self {
        CameraSettings { groups }
    }

    /// Parses the `{ "<group>": [ { "URL": .., "Save_name": .. } ] }` document.
    /// Either every group parses or the whole document is rejected.
    pub fn from_json_str(content: &str) -> Result<Self, AppError> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)
            .map_err(|e| AppError::SettingsLoad(format!("not a JSON object of camera groups: {}", e)))?;

        if document.is_empty() {
            return Err(AppError::SettingsLoad("no camera groups defined".to_string()));
        }

        let mut groups = Vec::with_capacity(document.len());
        for (group_name, value) in document {
            let entries: Vec<RawCameraEntry> = serde_json::from_value(value).map_err(|e| {
                AppError::SettingsLoad(format!("group '{}' is malformed: {}", group_name, e))
            })?;
            groups.push(build_group(group_name, entries)?);
        }
        Ok(CameraSettings { groups })
    }

    pub fn groups(&self) -> &[CameraGroup] {
        &self.groups
    }

    pub fn group(&self, group_name: &str) -> Option<&CameraGroup> {
        self.groups.iter().find(|g| g.group_name == group_name)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.group_name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn build_group(group_name: String, entries: Vec<RawCameraEntry>) -> Result<CameraGroup, AppError> {
    if group_name.trim().is_empty() {
        return Err(AppError::SettingsLoad("group name cannot be empty".to_string()));
    }
    if entries.is_empty() {
        return Err(AppError::SettingsLoad(format!("group '{}' has no cameras", group_name)));
    }

    let mut seen = HashSet::new();
    let mut members = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let url = entry.url.trim();
        let save_name = entry.save_name.trim();
        if url.is_empty() {
            return Err(AppError::SettingsLoad(format!(
                "camera #{} of group '{}' has an empty URL",
                idx + 1,
                group_name
            )));
        }
        if save_name.is_empty() {
            return Err(AppError::SettingsLoad(format!(
                "camera #{} of group '{}' has an empty Save_name",
                idx + 1,
                group_name
            )));
        }
        // Save_name becomes a file name inside the session folder.
        if save_name.contains(['/', '\\']) || save_name == "." || save_name == ".." {
            return Err(AppError::SettingsLoad(format!(
                "Save_name '{}' in group '{}' is not a plain file name",
                save_name, group_name
            )));
        }
        if !seen.insert(save_name.to_string()) {
            return Err(AppError::SettingsLoad(format!(
                "duplicate Save_name '{}' in group '{}'",
                save_name, group_name
            )));
        }
        members.push(CameraSetting {
            name: save_name.to_string(),
            source_url: url.to_string(),
            output_base_name: save_name.to_string(),
        });
    }
    Ok(CameraGroup { group_name, members })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GROUPS: &str = r#"{
        "Lobby": [
            {"URL": "rtsp://cam1/stream", "Save_name": "lobby_cam"},
            {"URL": "rtsp://cam2/stream", "Save_name": "door_cam"}
        ],
        "Atrium": [
            {"URL": "rtsp://cam3/stream", "Save_name": "atrium"}
        ]
    }"#;

    #[test]
    fn parses_groups_in_file_order() {
        let settings = CameraSettings::from_json_str(TWO_GROUPS).unwrap();
        assert_eq!(settings.group_names(), vec!["Lobby", "Atrium"]);

        let lobby = settings.group("Lobby").unwrap();
        let names: Vec<&str> = lobby.members.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["lobby_cam", "door_cam"]);
        assert_eq!(lobby.camera("door_cam").unwrap().source_url, "rtsp://cam2/stream");
    }

    #[test]
    fn rejects_group_with_wrong_shape() {
        let err = CameraSettings::from_json_str(r#"{"Lobby": [{"URL": "rtsp://x"}]}"#).unwrap_err();
        assert!(matches!(err, AppError::SettingsLoad(ref m) if m.contains("Lobby")));

        let err = CameraSettings::from_json_str(r#"{"Lobby": {"URL": "rtsp://x", "Save_name": "a"}}"#).unwrap_err();
        assert!(matches!(err, AppError::SettingsLoad(_)));
    }

    #[test]
    fn rejects_non_object_and_empty_documents() {
        assert!(CameraSettings::from_json_str("[1, 2]").is_err());
        assert!(CameraSettings::from_json_str("{}").is_err());
        assert!(CameraSettings::from_json_str("not json").is_err());
    }

    #[test]
    fn rejects_duplicate_and_path_like_save_names() {
        let dup = r#"{"G": [
            {"URL": "rtsp://a", "Save_name": "cam"},
            {"URL": "rtsp://b", "Save_name": "cam"}
        ]}"#;
        assert!(CameraSettings::from_json_str(dup).is_err());

        let path_like = r#"{"G": [{"URL": "rtsp://a", "Save_name": "../escape"}]}"#;
        assert!(CameraSettings::from_json_str(path_like).is_err());
    }

    #[test]
    fn unknown_group_lookup_returns_none() {
        let settings = CameraSettings::from_json_str(TWO_GROUPS).unwrap();
        assert!(settings.group("Garage").is_none());
    }
}
