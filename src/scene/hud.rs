use crate::{
    audio::SongInfo,
    pose::{LandmarkFeed, PerceptionStatus},
    session::{ActiveMotion, Scoreboard},
};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

/// Motion value that fills the energy bar.
const FULL_ENERGY: f32 = 100.;

pub fn theme(mut contexts: EguiContexts) {
    catppuccin_egui::set_theme(contexts.ctx_mut(), catppuccin_egui::MACCHIATO);
}

pub fn scoreboard(
    mut contexts: EguiContexts,
    scoreboard: Res<Scoreboard>,
    active_motion: Res<ActiveMotion>,
    song_info: Res<SongInfo>,
    feed: Res<LandmarkFeed>,
) {
    egui::Window::new("score")
        .title_bar(false)
        .resizable(false)
        .anchor(egui::Align2::LEFT_TOP, [10., 10.])
        .show(contexts.ctx_mut(), |ui| {
            ui.horizontal(|ui| {
                ui.strong(format!("Score: {}", scoreboard.score));
                if scoreboard.finished {
                    ui.colored_label(egui::Color32::GOLD, "FINISHED!");
                }
            });

            ui.add(
                egui::ProgressBar::new((active_motion.raw() / FULL_ENERGY).min(1.))
                    .text("energy"),
            );

            if 0. < song_info.dur.raw() {
                ui.label(format!(
                    "{} {:.0}/{:.0}s",
                    song_info.title,
                    song_info.pos.raw(),
                    song_info.dur.raw()
                ));
            }

            if matches!(feed.status(), PerceptionStatus::Unavailable) {
                ui.label("camera unavailable, press any key to retry");
            }
        });
}
