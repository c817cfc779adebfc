//! Body landmarks as delivered by a perception backend, and the plumbing that
//! feeds them into the app.

mod channel;
mod replay;

pub use channel::{channel, ChannelSource};
pub use replay::ReplaySource;

use bevy::{app::AppExit, prelude::*};
use derive_more::{Deref, Display, From};
use serde::Deserialize;

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;

/// Normalized image coordinates, `y` grows downwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub visibility: f32,
}

/// Landmarks indexed by the 33 point pose topology.
#[derive(Debug, Default, Clone, PartialEq, Deref, From, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSnapshot(pub Vec<Landmark>);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoseSample {
    /// Capture time in seconds.
    pub at: f64,
    /// `None` when no body was detected.
    #[serde(default)]
    pub landmarks: Option<LandmarkSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointGroup {
    pub name: &'static str,
    pub indices: &'static [usize],
}

pub const HIPS: PointGroup = PointGroup {
    name: "hips",
    indices: &[LEFT_HIP, RIGHT_HIP],
};

pub const SHOULDERS: PointGroup = PointGroup {
    name: "shoulders",
    indices: &[LEFT_SHOULDER, RIGHT_SHOULDER],
};

/// Groups tried in priority order when estimating body height.
pub const FALLBACK_GROUPS: [PointGroup; 2] = [HIPS, SHOULDERS];

impl PointGroup {
    /// Mean `y` over the points of this group that meet `min_confidence`.
    pub fn mean_y(&self, snapshot: &LandmarkSnapshot, min_confidence: f32) -> Option<f32> {
        let (sum, count) = self
            .indices
            .iter()
            .filter_map(|index| snapshot.get(*index))
            .filter(|landmark| landmark.y.is_finite() && min_confidence <= landmark.visibility)
            .fold((0., 0), |(sum, count), landmark| (sum + landmark.y, count + 1));

        (0 < count).then(|| sum / count as f32)
    }
}

impl LandmarkSnapshot {
    /// First group in `groups` with a qualifying point wins.
    pub fn representative_y(&self, groups: &[PointGroup], min_confidence: f32) -> Option<f32> {
        groups
            .iter()
            .find_map(|group| group.mean_y(self, min_confidence))
    }
}

#[derive(Debug, Display, From)]
pub enum PerceptionError {
    #[display(fmt = "could not read pose recording: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "malformed pose recording: {}", _0)]
    Parse(serde_json::Error),
    #[display(fmt = "perception feed disconnected")]
    #[from(ignore)]
    Disconnected,
}

impl std::error::Error for PerceptionError {}

/// Opaque perception capability. Implementors hand out the newest sample
/// available at `now`, or nothing if no new frame was produced.
pub trait LandmarkSource: Send + Sync {
    fn start(&mut self) -> Result<(), PerceptionError>;
    fn poll(&mut self, now: f64) -> Option<PoseSample>;
    fn close(&mut self) {}
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerceptionStatus {
    #[default]
    Idle,
    Running,
    /// Start failed; retried on the next user input.
    Unavailable,
}

/// Sources in priority order. `start` settles on the first one that comes up.
#[derive(Resource, Default)]
pub struct LandmarkFeed {
    sources: Vec<Box<dyn LandmarkSource>>,
    active: Option<usize>,
    status: PerceptionStatus,
}

impl LandmarkFeed {
    pub fn new(source: impl LandmarkSource + 'static) -> Self {
        Self::default().with_source(source)
    }

    /// Appends a lower priority source.
    pub fn with_source(mut self, source: impl LandmarkSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn status(&self) -> PerceptionStatus {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Index of the source being polled, if any.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn start(&mut self) {
        if self.sources.is_empty() {
            return;
        }

        self.active = self
            .sources
            .iter_mut()
            .enumerate()
            .find_map(|(index, source)| match source.start() {
                Ok(()) => Some(index),
                Err(error) => {
                    warn!("pose source {index} failed to start: {error}");
                    None
                }
            });

        self.status = match self.active {
            Some(index) => {
                info!("perception running on source {index}");
                PerceptionStatus::Running
            }
            None => {
                warn!("perception unavailable, will retry on input");
                PerceptionStatus::Unavailable
            }
        };
    }

    pub fn poll(&mut self, now: f64) -> Option<PoseSample> {
        match self.status {
            PerceptionStatus::Running => self.sources.get_mut(self.active?)?.poll(now),
            _ => None,
        }
    }

    /// Releases every source. Nothing is polled afterwards.
    pub fn close(&mut self) {
        if !self.sources.is_empty() {
            self.sources.drain(..).for_each(|mut source| source.close());
            info!("perception closed");
        }
        self.active = None;
        self.status = PerceptionStatus::Idle;
    }
}

fn start_perception(mut feed: ResMut<LandmarkFeed>) {
    feed.start();
}

fn retry_perception(
    keys: Res<Input<KeyCode>>,
    buttons: Res<Input<MouseButton>>,
    mut feed: ResMut<LandmarkFeed>,
) {
    let gesture = keys.get_just_pressed().next().is_some()
        || buttons.get_just_pressed().next().is_some();

    if gesture && matches!(feed.status(), PerceptionStatus::Unavailable) {
        feed.start();
    }
}

fn close_perception(mut exits: EventReader<AppExit>, mut feed: ResMut<LandmarkFeed>) {
    if exits.iter().last().is_some() {
        feed.close();
    }
}

pub struct PosePlugin;

impl Plugin for PosePlugin {
    fn build(&self, game: &mut App) {
        game.init_resource::<LandmarkFeed>()
            .add_startup_system(start_perception)
            .add_system(retry_perception)
            .add_system(close_perception);
    }
}

#[cfg(test)]
pub(crate) fn snapshot(points: &[(usize, f32, f32)]) -> LandmarkSnapshot {
    let mut landmarks = vec![Landmark::default(); 33];
    points.iter().for_each(|(index, y, visibility)| {
        landmarks[*index] = Landmark {
            x: 0.5,
            y: *y,
            z: 0.,
            visibility: *visibility,
        }
    });
    LandmarkSnapshot(landmarks)
}
