//! Session lifecycle and the fixed tick score loop.

mod score;

pub use score::{PlaybackError, ScoreKeeper, Transport};

use crate::{
    audio::SongTransport,
    motion::MotionValue,
    settings::Settings,
    timeline::LoopCompleted,
    utils::*,
    PipelineSet,
};
use bevy::prelude::*;
use derive_more::{Deref, From};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Score loop frequency.
    pub tick_hz: f64,
    pub score_multiplier: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_hz: 1.,
            score_multiplier: 0.2,
        }
    }
}

#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    #[default]
    Active,
    /// Terminal.
    Finished,
}

impl Session {
    /// Returns `true` on the transition, `false` if already finished.
    pub fn finish(&mut self) -> bool {
        matches!(std::mem::replace(self, Session::Finished), Session::Active)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Session::Active)
    }
}

/// Motion value as seen by everything downstream of the session.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Deref, From)]
pub struct ActiveMotion(pub P32);

/// What the presentation layer shows.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoreboard {
    pub score: u64,
    pub finished: bool,
}

pub fn finish_session(
    mut loops: EventReader<LoopCompleted>,
    mut session: ResMut<Session>,
    mut scoreboard: ResMut<Scoreboard>,
) {
    if loops.iter().last().is_some() && session.finish() {
        scoreboard.finished = true;
        info!("session finished with score {}", scoreboard.score);
    }
}

pub fn gate_motion(
    motion: Res<MotionValue>,
    session: Res<Session>,
    mut active_motion: ResMut<ActiveMotion>,
) {
    *active_motion = match *session {
        Session::Active => ActiveMotion(**motion),
        Session::Finished => ActiveMotion(p32(0.)),
    };
}

/// Fixed tick body, generic over whatever plays the song.
pub fn tick_score<T: Transport + Resource>(
    active_motion: Res<ActiveMotion>,
    session: Res<Session>,
    mut transport: ResMut<T>,
    mut keeper: ResMut<ScoreKeeper>,
    mut scoreboard: ResMut<Scoreboard>,
) {
    keeper.tick(**active_motion, *session, &mut *transport);
    scoreboard.score = keeper.score();
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, game: &mut App) {
        let config = game
            .world
            .get_resource::<Settings>()
            .map(|settings| settings.session.clone())
            .unwrap_or_default();

        game.init_resource::<Session>()
            .init_resource::<ActiveMotion>()
            .init_resource::<Scoreboard>()
            .init_resource::<SongTransport>()
            .insert_resource(ScoreKeeper::new(config.score_multiplier))
            .insert_resource(FixedTime::new_from_secs(1. / config.tick_hz.max(1e-3) as f32))
            .add_systems((finish_session, gate_motion).chain().in_set(PipelineSet::Gate))
            .add_system(tick_score::<SongTransport>.in_schedule(CoreSchedule::FixedUpdate));
    }
}
