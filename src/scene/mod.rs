//! Read-only consumers of the pipeline.

mod backdrop;
mod hud;

use crate::PipelineSet;
use bevy::prelude::*;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, game: &mut App) {
        game.init_resource::<backdrop::Backdrop>()
            .add_systems(
                (hud::theme, hud::scoreboard, backdrop::cycle_backdrop)
                    .in_set(PipelineSet::Consume),
            );
    }
}
