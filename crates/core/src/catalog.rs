//! Model catalog entries reported by `GET /models`.

use serde::{Deserialize, Serialize};

/// Installation state of a model on the generation host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    #[serde(rename = "installed")]
    Installed,
    #[serde(rename = "not installed")]
    NotInstalled,
    #[serde(rename = "installing")]
    Installing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name, also the path segment for install/remove.
    pub model: String,
    /// Upstream download location.
    pub url: String,
    pub is_installed: InstallStatus,
}

impl ModelInfo {
    /// Installing models accept neither install nor remove.
    pub fn can_install(&self) -> bool {
        self.is_installed == InstallStatus::NotInstalled
    }

    pub fn can_remove(&self) -> bool {
        self.is_installed == InstallStatus::Installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_status_strings() {
        let json = r#"[
            {"model":"flux1-dev","url":"https://example.test/dev","is_installed":"installed"},
            {"model":"flux1-schnell","url":"https://example.test/schnell","is_installed":"not installed"},
            {"model":"ae","url":"https://example.test/ae","is_installed":"installing"}
        ]"#;
        let models: Vec<ModelInfo> = serde_json::from_str(json).unwrap();

        assert_eq!(models[0].is_installed, InstallStatus::Installed);
        assert!(models[0].can_remove());
        assert!(models[1].can_install());
        assert!(!models[2].can_install());
        assert!(!models[2].can_remove());
    }
}
