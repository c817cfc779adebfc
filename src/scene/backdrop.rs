use crate::timeline::{CurrentFrame, Timeline};
use bevy::prelude::*;

const PALETTE: [&str; 15] = [
    "b37474", "602323", "615423", "b3a674", "779b68", "396028", "29614a", "66c59e", "66c0c4",
    "1c5053", "201d54", "874dd2", "9e3f70", "741549", "9b0505",
];

const BEAT_TRIGGER: f32 = 1.;
const BEAT_REARM: f32 = 0.4;
const EASE: f32 = 0.1;

/// Palette cursor that advances once per beat.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backdrop {
    index: usize,
    armed: bool,
}

impl Default for Backdrop {
    fn default() -> Self {
        Self {
            index: 0,
            armed: true,
        }
    }
}

impl Backdrop {
    /// Returns `true` if `beat` advanced the palette.
    pub fn on_beat(&mut self, beat: f32) -> bool {
        let advanced = BEAT_TRIGGER <= beat && std::mem::replace(&mut self.armed, false);

        if advanced {
            self.index = (self.index + 1) % PALETTE.len();
        }

        if beat < BEAT_REARM {
            self.armed = true;
        }

        advanced
    }

    pub fn target(&self) -> Color {
        Color::hex(PALETTE[self.index]).unwrap_or(Color::BLACK)
    }
}

fn ease(from: Color, to: Color, t: f32) -> Color {
    let [r, g, b, a] = from.as_rgba_f32();
    let [tr, tg, tb, ta] = to.as_rgba_f32();
    Color::rgba(
        r + (tr - r) * t,
        g + (tg - g) * t,
        b + (tb - b) * t,
        a + (ta - a) * t,
    )
}

pub fn cycle_backdrop(
    timeline: Res<Timeline>,
    current: Res<CurrentFrame>,
    mut backdrop: ResMut<Backdrop>,
    mut clear_color: ResMut<ClearColor>,
) {
    let Some(frame) = timeline.frame(*current) else {
        return
    };

    backdrop.on_beat(frame.beat());
    clear_color.0 = ease(clear_color.0, backdrop.target(), EASE);
}
