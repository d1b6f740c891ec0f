use crate::animation::SPEED_MAX;
use crate::body::BodySpec;
use anyhow::{bail, ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) initial_speed: u32,
    pub(crate) orbit_overlay_alpha: f64,
    pub(crate) enable_color: bool,
    pub(crate) log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            initial_speed: 0,
            orbit_overlay_alpha: 0.25,
            enable_color: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub(crate) fn fps(&self) -> u32 {
        self.fps_cap.clamp(10, 240)
    }

    pub(crate) fn speed(&self) -> u32 {
        self.initial_speed.min(SPEED_MAX)
    }
}

pub(crate) struct Paths {
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "nested-orrery", "NestedOrrery")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("orrery.log"),
    })
}

/// Reads settings, falling back to defaults; a missing file is written out.
pub(crate) fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str::<Settings>(&s) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        },
        Err(_) => {
            let settings = Settings::default();
            if let Err(e) = save_settings_atomic(path, &settings) {
                warn!(path = %path.display(), error = %e, "could not write default settings");
            }
            settings
        }
    }
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}

/// Loads a body tree description and checks it before anything is built.
pub(crate) fn load_system_spec(path: &Path) -> Result<BodySpec> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let spec: BodySpec =
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    validate_spec(&spec, true).with_context(|| format!("invalid system in {}", path.display()))?;
    Ok(spec)
}

pub(crate) fn validate_spec(spec: &BodySpec, is_root: bool) -> Result<()> {
    ensure!(!spec.name.trim().is_empty(), "a body has an empty name");
    ensure!(
        spec.radius.is_finite() && spec.radius > 0.0,
        "{}: radius must be positive, got {}",
        spec.name,
        spec.radius
    );
    if !spec.distance.is_finite() || spec.distance < 0.0 {
        bail!("{}: distance must be non-negative, got {}", spec.name, spec.distance);
    }
    if !is_root && spec.distance == 0.0 {
        warn!(body = %spec.name, "orbits at distance 0 and will not revolve");
    }
    for child in &spec.children {
        validate_spec(child, false).with_context(|| format!("in the orbit of {}", spec.name))?;
    }
    Ok(())
}
