use super::Session;
use crate::utils::*;
use bevy::prelude::*;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    #[display(fmt = "song is not loaded")]
    NotLoaded,
}

impl std::error::Error for PlaybackError {}

/// Audio collaborator of the score loop.
pub trait Transport {
    /// Starting may fail; the caller retries on a later tick.
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn is_playing(&self) -> bool;
}

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ScoreKeeper {
    multiplier: f64,
    accumulated: f64,
    playback: Latch,
}

impl ScoreKeeper {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            accumulated: 0.,
            playback: Latch::default(),
        }
    }

    /// One scoring tick. `motion` is expected to already be session gated.
    pub fn tick(&mut self, motion: P32, session: Session, transport: &mut impl Transport) {
        if !self.playback.fired() && 0. < motion.raw() {
            match transport.play() {
                Ok(()) => {
                    self.playback.fire();
                }
                Err(error) => warn!("could not start playback, retrying: {error}"),
            }
        }

        if self.playback.fired() && session.is_active() && transport.is_playing() {
            self.accumulated += motion.raw() as f64 * self.multiplier;
        }
    }

    pub fn started(&self) -> bool {
        self.playback.fired()
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    pub fn score(&self) -> u64 {
        self.accumulated.floor() as u64
    }
}
