//! Precomputed audio features keyed by song time, and the per frame
//! synchronizer that maps the playback clock onto them.

use crate::{
    audio::SongInfo,
    settings::{asset_path, Settings},
    utils::*,
    PipelineSet,
};
use bevy::prelude::*;
use derive_more::{Deref, Display, From};
use itertools::Itertools;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tap::Pipe;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimelineFrame {
    /// Seconds from the start of the song.
    pub t: f64,
    /// Band intensities, optionally with a `beat` strength.
    #[serde(default)]
    pub audio: BTreeMap<String, f32>,
}

impl TimelineFrame {
    pub fn beat(&self) -> f32 {
        self.audio.get("beat").copied().unwrap_or(0.)
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.audio
            .iter()
            .filter(|(name, _)| name.as_str() != "beat")
            .map(|(name, value)| (name.as_str(), *value))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Frames(Vec<TimelineFrame>),
    Beats { beats: Vec<TimelineFrame> },
}

#[derive(Debug, Display, From)]
pub enum TimelineError {
    #[display(fmt = "could not read timeline: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "malformed timeline: {}", _0)]
    Parse(serde_json::Error),
}

impl std::error::Error for TimelineError {}

/// Read-only once loaded. `None` until loaded, and forever if loading failed.
#[derive(Resource, Default, Debug, Clone, PartialEq, Deref)]
pub struct Timeline(Option<Vec<TimelineFrame>>);

impl Timeline {
    pub fn parse(text: &str) -> Result<Self, TimelineError> {
        let (Document::Frames(mut frames) | Document::Beats { beats: mut frames }) =
            serde_json::from_str::<Document>(text)?;

        if !frames.iter().tuple_windows().all(|(a, b)| a.t <= b.t) {
            warn!("timeline frames are out of order, sorting");
            frames.sort_by(|a, b| a.t.total_cmp(&b.t));
        }

        Ok(Self(Some(frames)))
    }

    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        fs::read_to_string(path)?.pipe(|text| Self::parse(&text))
    }

    pub fn frames(&self) -> &[TimelineFrame] {
        self.0.as_deref().unwrap_or_default()
    }

    pub fn frame(&self, CurrentFrame(index): CurrentFrame) -> Option<&TimelineFrame> {
        index.and_then(|index| self.frames().get(index))
    }
}

/// Index of the earliest frame at or after `time`.
pub fn lookup(frames: &[TimelineFrame], time: f64) -> Option<usize> {
    frames.iter().position(|frame| time <= frame.t)
}

#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq, Deref, From)]
pub struct CurrentFrame(pub Option<usize>);

/// Sent once, the first time the song clock jumps backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopCompleted;

#[derive(Resource, Default, Debug, Clone, Copy, PartialEq)]
pub struct TimelineSync {
    last_time: f64,
    looped: Latch,
}

impl TimelineSync {
    /// Records `time` and reports whether it completed the first loop.
    pub fn observe(&mut self, time: f64) -> bool {
        let wrapped = time < self.last_time && 0. < self.last_time && self.looped.fire();
        self.last_time = time;
        wrapped
    }

    pub fn looped(&self) -> bool {
        self.looped.fired()
    }
}

fn load_timeline(settings: Res<Settings>, mut timeline: ResMut<Timeline>) {
    let path = asset_path(&settings.paths.timeline);

    match Timeline::load(&path) {
        Ok(loaded) => {
            info!("loaded {} timeline frames", loaded.frames().len());
            *timeline = loaded;
        }
        Err(error) => error!("{}: {error}", path.display()),
    }
}

pub fn sync_timeline(
    song_info: Res<SongInfo>,
    timeline: Res<Timeline>,
    mut sync: ResMut<TimelineSync>,
    mut current: ResMut<CurrentFrame>,
    mut loops: EventWriter<LoopCompleted>,
) {
    let time = song_info.pos.raw();

    // Runs with an empty timeline too: a missing beat map must not keep the
    // session from ending when the song wraps.
    if sync.observe(time) {
        info!("song looped at {time:.2}s");
        loops.send(LoopCompleted);
    }

    *current = CurrentFrame(lookup(timeline.frames(), time));
}

pub struct TimelinePlugin;

impl Plugin for TimelinePlugin {
    fn build(&self, game: &mut App) {
        game.init_resource::<Settings>()
            .init_resource::<Timeline>()
            .init_resource::<TimelineSync>()
            .init_resource::<CurrentFrame>()
            .add_event::<LoopCompleted>()
            .add_startup_system(load_timeline)
            .add_system(sync_timeline.in_set(PipelineSet::Sync));
    }
}
