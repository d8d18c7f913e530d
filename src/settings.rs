//! Persisted settings: storage mode, image storage mode, theme.
//!
//! The mode selectors live on the local backend so they are readable
//! before the active backend is known.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{
    Backend, BackendError, IMAGE_STORAGE_MODE_KEY, LAST_IMAGE_STORAGE_MODE_KEY, STORAGE_MODE_KEY,
    THEME_KEY,
};

/// Which backend holds the active collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Sync,
    Local,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Local => "local",
        }
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown storage mode: {other} (expected: sync, local)")),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How captured images are stored: by source URL or inlined as base64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageStorageMode {
    #[default]
    #[serde(rename = "srcurl")]
    SrcUrl,
    #[serde(rename = "base64")]
    Base64,
}

impl ImageStorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SrcUrl => "srcurl",
            Self::Base64 => "base64",
        }
    }

    fn parse(value: Option<&Value>) -> Option<Self> {
        match value.and_then(Value::as_str)? {
            "srcurl" => Some(Self::SrcUrl),
            "base64" => Some(Self::Base64),
            _ => None,
        }
    }
}

/// Read the active storage mode from the local backend.
///
/// An unset or unrecognized selector falls back to [`StorageMode::Sync`],
/// which is written back so later reads agree.
pub async fn resolve_storage_mode(local: &dyn Backend) -> Result<StorageMode, BackendError> {
    let stored = local.get(STORAGE_MODE_KEY).await?;
    if let Some(mode) = stored.as_ref().and_then(Value::as_str).and_then(|s| s.parse().ok()) {
        tracing::debug!(%mode, "storage mode resolved");
        return Ok(mode);
    }
    tracing::info!(?stored, "storage mode unset or invalid, defaulting to sync");
    let mode = StorageMode::default();
    local
        .set(STORAGE_MODE_KEY, Value::String(mode.as_str().into()))
        .await?;
    Ok(mode)
}

/// Resolve how images are captured.
///
/// The sync backend is too small for inlined images, so sync mode always
/// reads as [`ImageStorageMode::SrcUrl`]. Otherwise the stored selector
/// wins, then the last known one (persisted as current), then `srcurl`
/// (persisted).
pub async fn resolve_image_storage_mode(
    local: &dyn Backend,
    mode: StorageMode,
) -> Result<ImageStorageMode, BackendError> {
    if mode == StorageMode::Sync {
        return Ok(ImageStorageMode::SrcUrl);
    }
    if let Some(current) = ImageStorageMode::parse(local.get(IMAGE_STORAGE_MODE_KEY).await?.as_ref()) {
        return Ok(current);
    }
    let fallback = ImageStorageMode::parse(local.get(LAST_IMAGE_STORAGE_MODE_KEY).await?.as_ref())
        .unwrap_or_default();
    local
        .set(
            IMAGE_STORAGE_MODE_KEY,
            Value::String(fallback.as_str().into()),
        )
        .await?;
    Ok(fallback)
}

// -- Theme --

/// Named colour palettes. Each has seven tokens: primary, primary-light,
/// primary-dark, primary-darkest, secondary, background, accent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemePreset {
    #[default]
    Blue,
    Red,
    Purple,
    Green,
    Yellow,
}

const BLUE: [&str; 7] = [
    "#2196F3", "#64B5F6", "#1976D2", "#0D47A1", "#03A9F4", "#E3F2FD", "#FFC107",
];
const RED: [&str; 7] = [
    "#F44336", "#e57373", "#d32f2f", "#b71c1c", "#e91e63", "#ffebee", "#4CAF50",
];
const PURPLE: [&str; 7] = [
    "#9C27B0", "#BA68C8", "#7B1FA2", "#4A148C", "#673AB7", "#F3E5F5", "#FFEB3B",
];
const GREEN: [&str; 7] = [
    "#4CAF50", "#81C784", "#388E3C", "#1B5E20", "#8BC34A", "#E8F5E9", "#f44336",
];
const YELLOW: [&str; 7] = [
    "#FFEB3B", "#FFF176", "#FBC02D", "#F57F17", "#FFC107", "#FFFDE7", "#9C27B0",
];

impl ThemePreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "blue" => Some(Self::Blue),
            "red" => Some(Self::Red),
            "purple" => Some(Self::Purple),
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            _ => None,
        }
    }

    pub fn tokens(self) -> [&'static str; 7] {
        match self {
            Self::Blue => BLUE,
            Self::Red => RED,
            Self::Purple => PURPLE,
            Self::Green => GREEN,
            Self::Yellow => YELLOW,
        }
    }

    pub fn to_value(self) -> Value {
        Value::Array(self.tokens().iter().map(|t| Value::String((*t).into())).collect())
    }
}

/// Icon colour name for a theme, keyed on its primary token.
pub fn icon_color_name(theme: &[String]) -> &'static str {
    match theme.first().map(String::as_str) {
        Some("#F44336") => "red",
        Some("#9C27B0") => "purple",
        Some("#4CAF50") => "green",
        Some("#FFEB3B") => "yellow",
        // Every blue-family primary and anything unrecognized.
        _ => "blue",
    }
}

/// Read the theme, writing the blue default when none is stored.
pub async fn retrieve_theme(backend: &dyn Backend) -> Result<Vec<String>, BackendError> {
    let stored = backend.get(THEME_KEY).await?;
    let tokens: Option<Vec<String>> = stored.as_ref().and_then(Value::as_array).and_then(|arr| {
        arr.iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
    });
    match tokens {
        Some(tokens) if !tokens.is_empty() => Ok(tokens),
        _ => {
            tracing::info!(backend = backend.name(), "no theme stored, writing default");
            let preset = ThemePreset::default();
            backend.set(THEME_KEY, preset.to_value()).await?;
            Ok(preset.tokens().iter().map(|t| (*t).to_owned()).collect())
        }
    }
}

pub async fn save_theme(backend: &dyn Backend, preset: ThemePreset) -> Result<(), BackendError> {
    backend.set(THEME_KEY, preset.to_value()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn storage_mode_defaults_to_sync_and_persists() {
        let local = MemoryBackend::new("local");
        assert_eq!(resolve_storage_mode(&local).await.unwrap(), StorageMode::Sync);
        assert_eq!(
            local.get(STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("sync"))
        );
    }

    #[tokio::test]
    async fn storage_mode_invalid_value_is_replaced() {
        let local = MemoryBackend::new("local");
        local.set(STORAGE_MODE_KEY, json!(true)).await.unwrap();
        assert_eq!(resolve_storage_mode(&local).await.unwrap(), StorageMode::Sync);
        assert_eq!(
            local.get(STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("sync"))
        );
    }

    #[tokio::test]
    async fn storage_mode_reads_local() {
        let local = MemoryBackend::new("local");
        local.set(STORAGE_MODE_KEY, json!("local")).await.unwrap();
        assert_eq!(resolve_storage_mode(&local).await.unwrap(), StorageMode::Local);
    }

    #[tokio::test]
    async fn image_mode_forced_to_srcurl_in_sync_mode() {
        let local = MemoryBackend::new("local");
        local.set(IMAGE_STORAGE_MODE_KEY, json!("base64")).await.unwrap();
        let mode = resolve_image_storage_mode(&local, StorageMode::Sync)
            .await
            .unwrap();
        assert_eq!(mode, ImageStorageMode::SrcUrl);
    }

    #[tokio::test]
    async fn image_mode_stored_value_wins_in_local_mode() {
        let local = MemoryBackend::new("local");
        local.set(IMAGE_STORAGE_MODE_KEY, json!("base64")).await.unwrap();
        let mode = resolve_image_storage_mode(&local, StorageMode::Local)
            .await
            .unwrap();
        assert_eq!(mode, ImageStorageMode::Base64);
    }

    #[tokio::test]
    async fn image_mode_falls_back_to_last_known() {
        let local = MemoryBackend::new("local");
        local
            .set(LAST_IMAGE_STORAGE_MODE_KEY, json!("base64"))
            .await
            .unwrap();
        let mode = resolve_image_storage_mode(&local, StorageMode::Local)
            .await
            .unwrap();
        assert_eq!(mode, ImageStorageMode::Base64);
        assert_eq!(
            local.get(IMAGE_STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("base64"))
        );
    }

    #[tokio::test]
    async fn image_mode_defaults_to_srcurl() {
        let local = MemoryBackend::new("local");
        let mode = resolve_image_storage_mode(&local, StorageMode::Local)
            .await
            .unwrap();
        assert_eq!(mode, ImageStorageMode::SrcUrl);
        assert_eq!(
            local.get(IMAGE_STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("srcurl"))
        );
    }

    #[tokio::test]
    async fn theme_default_is_written_once() {
        let b = MemoryBackend::new("sync");
        let theme = retrieve_theme(&b).await.unwrap();
        assert_eq!(theme.len(), 7);
        assert_eq!(theme[0], "#2196F3");
        assert_eq!(b.get(THEME_KEY).await.unwrap(), Some(ThemePreset::Blue.to_value()));
    }

    #[tokio::test]
    async fn saved_theme_is_returned() {
        let b = MemoryBackend::new("sync");
        save_theme(&b, ThemePreset::Green).await.unwrap();
        let theme = retrieve_theme(&b).await.unwrap();
        assert_eq!(theme[0], "#4CAF50");
        assert_eq!(icon_color_name(&theme), "green");
    }

    #[test]
    fn icon_colors() {
        let named = |s: &str| vec![s.to_string()];
        assert_eq!(icon_color_name(&named("#64B5F6")), "blue");
        assert_eq!(icon_color_name(&named("#F44336")), "red");
        assert_eq!(icon_color_name(&named("#9C27B0")), "purple");
        assert_eq!(icon_color_name(&named("#FFEB3B")), "yellow");
        assert_eq!(icon_color_name(&named("#123456")), "blue");
        assert_eq!(icon_color_name(&[]), "blue");
    }

    #[test]
    fn storage_mode_parse() {
        assert_eq!("local".parse::<StorageMode>(), Ok(StorageMode::Local));
        assert!("cloud".parse::<StorageMode>().is_err());
    }
}
