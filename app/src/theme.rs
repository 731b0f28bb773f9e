use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tether_core::settings::{config_dir, read_json_file, write_json_file};

/// View-layer color scheme. Persisted next to the settings file with the
/// same JSON helpers; the orchestrator never reads it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

fn theme_path() -> PathBuf {
    config_dir().join("theme.json")
}

pub async fn load_theme() -> ThemeMode {
    read_json_file(&theme_path()).await.unwrap_or_default()
}

pub async fn save_theme(mode: ThemeMode) {
    write_json_file(&theme_path(), &mode).await;
}
