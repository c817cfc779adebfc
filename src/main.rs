mod audio;
mod motion;
mod pose;
mod scene;
mod session;
mod settings;
mod timeline;
mod utils;

use audio::SongPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_screen_diagnostics::{ScreenDiagnosticsPlugin, ScreenFrameDiagnosticsPlugin};
use motion::MotionPlugin;
use pose::{LandmarkFeed, PosePlugin, ReplaySource};
use scene::ScenePlugin;
use session::SessionPlugin;
use settings::{asset_path, Settings};
use timeline::TimelinePlugin;

/// Per frame ordering: sensing, then timeline sync and loop detection, then
/// session gating, and only then anything that reads the results.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineSet {
    Sense,
    Sync,
    Gate,
    Consume,
}

fn main() {
    let mut game = App::new();

    game.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Pose Rhythm".into(),
            ..default()
        }),
        ..default()
    }))
    .add_plugin(ScreenDiagnosticsPlugin::default())
    .add_plugin(ScreenFrameDiagnosticsPlugin)
    .add_plugin(EguiPlugin)
    .configure_sets(
        (
            PipelineSet::Sense,
            PipelineSet::Sync,
            PipelineSet::Gate,
            PipelineSet::Consume,
        )
            .chain(),
    )
    .insert_resource(Settings::load());

    let feed = game
        .world
        .resource::<Settings>()
        .paths
        .pose_replays
        .iter()
        .fold(LandmarkFeed::default(), |feed, recording| {
            feed.with_source(ReplaySource::new(asset_path(recording)))
        });

    if feed.is_empty() {
        warn!("no pose source configured, motion will stay at zero");
    }

    game.insert_resource(feed)
        .add_plugin(SongPlugin)
        .add_plugin(PosePlugin)
        .add_plugin(MotionPlugin)
        .add_plugin(TimelinePlugin)
        .add_plugin(SessionPlugin)
        .add_plugin(ScenePlugin)
        .run();
}
