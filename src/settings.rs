use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "flowpitch";

/// Smallest raster scale used for export captures.
pub const MIN_EXPORT_SCALE: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default = "default_export_file_name")]
    pub export_file_name: String,

    /// Physical pixels per logical pixel of the display being emulated.
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Delay between successive blocks of the staggered reveal.
    #[serde(default = "default_reveal_step_ms")]
    pub reveal_step_ms: u64,

    #[serde(default = "default_true")]
    pub smooth_scroll: bool,

    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,

    /// Extra font directories for the export rasterizer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub font_dirs: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_export_file_name() -> String {
    "FlowPitch.pdf".to_string()
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_reveal_step_ms() -> u64 {
    90
}

fn default_tick_rate_ms() -> u64 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            export_dir: default_export_dir(),
            export_file_name: default_export_file_name(),
            device_pixel_ratio: default_device_pixel_ratio(),
            frame_interval_ms: default_frame_interval_ms(),
            reveal_step_ms: default_reveal_step_ms(),
            smooth_scroll: true,
            tick_rate_ms: default_tick_rate_ms(),
            font_dirs: Vec::new(),
        }
    }
}

impl Settings {
    /// Raster scale for export captures: `max(2, floor(device_pixel_ratio))`.
    pub fn export_scale(&self) -> u32 {
        let ratio = if self.device_pixel_ratio.is_finite() {
            self.device_pixel_ratio.floor().max(0.0) as u32
        } else {
            1
        };
        ratio.max(MIN_EXPORT_SCALE)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Load settings from an explicit file. Errors are logged and leave the
/// current settings untouched.
pub fn load_settings_from_path(path: &Path) {
    match read_settings(path) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }
            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
        }
        Err(e) => error!("Failed to load settings file {path:?}: {e:#}"),
    }
}

fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str::<Settings>(&content)?)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str("# FlowPitch settings\n");
    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Where exported PDFs are written, and under which name.\n");
    content.push_str(&format!(
        "export_dir: \"{}\"\n",
        settings.export_dir.display()
    ));
    content.push_str(&format!(
        "export_file_name: \"{}\"\n",
        settings.export_file_name
    ));
    content.push_str("# Export captures use max(2, floor(device_pixel_ratio)) as raster scale.\n");
    content.push_str(&format!(
        "device_pixel_ratio: {}\n",
        settings.device_pixel_ratio
    ));
    content.push_str(&format!(
        "frame_interval_ms: {}\n",
        settings.frame_interval_ms
    ));
    content.push('\n');
    content.push_str("# Presenter behaviour\n");
    content.push_str(&format!("reveal_step_ms: {}\n", settings.reveal_step_ms));
    content.push_str(&format!("smooth_scroll: {}\n", settings.smooth_scroll));
    content.push_str(&format!("tick_rate_ms: {}\n", settings.tick_rate_ms));
    content.push('\n');

    if settings.font_dirs.is_empty() {
        content.push_str("# font_dirs:\n#   - \"/usr/share/fonts/custom\"\n");
    } else {
        content.push_str("font_dirs:\n");
        for dir in &settings.font_dirs {
            content.push_str(&format!("  - \"{}\"\n", dir.display()));
        }
    }

    content
}

// Public API for accessing/modifying settings

pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}

/// Apply in-memory overrides (command line flags). Nothing is persisted.
pub fn override_settings(apply: impl FnOnce(&mut Settings)) {
    if let Ok(mut settings) = SETTINGS.write() {
        apply(&mut settings);
    }
}
