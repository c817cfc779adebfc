use crate::{motion::MotionConfig, session::SessionConfig};
use bevy::{asset::FileAssetIo, prelude::*};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tap::Tap;

pub const SETTINGS_FILE: &str = "settings.json";

/// Location of `relative` inside the assets directory.
pub fn asset_path(relative: &str) -> PathBuf {
    FileAssetIo::get_base_path()
        .tap_mut(|path| path.push("assets"))
        .tap_mut(|path| path.push(relative))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Not shipped with the repo; drop an ogg file here or point this at one.
    pub song: String,
    pub timeline: String,
    /// Recorded pose sessions, tried in order until one starts.
    pub pose_replays: Vec<String>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            song: "music/song.ogg".into(),
            timeline: "music/timeline.json".into(),
            pose_replays: Vec::new(),
        }
    }
}

#[derive(Resource, Default, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub motion: MotionConfig,
    pub session: SessionConfig,
    pub paths: AssetPaths,
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reads `assets/settings.json`, falling back to defaults.
    pub fn load() -> Self {
        let path = asset_path(SETTINGS_FILE);

        let Ok(text) = fs::read_to_string(&path) else {
            info!("no {}, using default settings", path.display());
            return Self::default();
        };

        Self::parse(&text).unwrap_or_else(|error| {
            error!("{}: {error}, using default settings", path.display());
            Self::default()
        })
    }
}
