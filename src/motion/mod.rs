//! Turns noisy body landmarks into a single non-negative movement energy.

use crate::{
    pose::{LandmarkFeed, LandmarkSnapshot, PoseSample, FALLBACK_GROUPS},
    settings::Settings,
    utils::*,
    PipelineSet,
};
use bevy::prelude::*;
use derive_more::{Deref, From};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Seconds between processed samples.
    pub min_gap: f64,
    pub min_confidence: f32,
    /// Lower bound on the velocity time step, seconds.
    pub min_dt: f32,
    pub velocity_deadzone: f32,
    pub lift_deadzone: f32,
    /// Blend rate of the ground reference towards the lowest observed body.
    pub ground_follow: f32,
    pub speed_weight: f32,
    pub lift_weight: f32,
    /// Weight of the newest raw sample in the running output.
    pub smoothing: f32,
    pub output_scale: f32,
    /// Drop the velocity anchor when the body is lost so the next detection
    /// re-seeds instead of measuring across the gap.
    pub reanchor_on_loss: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_gap: 1. / 15.,
            min_confidence: 0.5,
            min_dt: 1e-3,
            velocity_deadzone: 0.0015,
            lift_deadzone: 0.002,
            ground_follow: 0.015,
            speed_weight: 1100.,
            lift_weight: 550.,
            smoothing: 0.7,
            output_scale: 10.,
            reanchor_on_loss: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    y: f32,
    at: f64,
}

#[derive(Resource, Debug, Clone)]
pub struct MotionExtractor {
    config: MotionConfig,
    throttle: Throttle,
    anchor: Option<Anchor>,
    ground: Option<f32>,
    output: f32,
}

impl Default for MotionExtractor {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionExtractor {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            throttle: Throttle::new(config.min_gap),
            config,
            anchor: None,
            ground: None,
            output: 0.,
        }
    }

    /// Feeds one perception result captured at `at` seconds.
    ///
    /// Returns `None` if the call was throttled, otherwise the new motion value.
    pub fn process(&mut self, at: f64, landmarks: Option<&LandmarkSnapshot>) -> Option<P32> {
        if !self.throttle.admit(at) {
            return None;
        }

        let Some(y) = landmarks.and_then(|snapshot| {
            snapshot.representative_y(&FALLBACK_GROUPS, self.config.min_confidence)
        }) else {
            return Some(self.lose());
        };

        let Some(previous) = self.anchor.replace(Anchor { y, at }) else {
            self.output = 0.;
            return Some(p32(0.));
        };

        let MotionConfig {
            min_dt,
            velocity_deadzone,
            lift_deadzone,
            ground_follow,
            speed_weight,
            lift_weight,
            smoothing,
            output_scale,
            ..
        } = self.config;

        let dt = ((at - previous.at) as f32).max(min_dt);
        let vy = (previous.y - y) / dt;
        let speed = (vy.abs() - velocity_deadzone).max(0.);

        let ground = self.ground.get_or_insert(y);
        *ground = *ground * (1. - ground_follow) + y.max(*ground) * ground_follow;
        let lift = (*ground - y).max(0.);

        let raw = speed * speed_weight + lift * lift_weight;
        self.output = smoothing * raw + (1. - smoothing) * self.output;

        if speed <= 0. && lift < lift_deadzone {
            self.output = 0.;
        }

        debug!("motion {:.2} vy {vy:.4} lift {lift:.4}", self.output);
        Some(p32((self.output / output_scale).max(0.)))
    }

    fn lose(&mut self) -> P32 {
        self.output = 0.;
        if self.config.reanchor_on_loss {
            self.anchor = None;
        }
        p32(0.)
    }
}

/// Latest extractor output, ungated by the session.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Deref, From)]
pub struct MotionValue(pub P32);

fn extract_motion(
    time: Res<Time>,
    mut feed: ResMut<LandmarkFeed>,
    mut extractor: ResMut<MotionExtractor>,
    mut motion: ResMut<MotionValue>,
) {
    let Some(PoseSample { at, landmarks }) = feed.poll(time.elapsed_seconds_f64()) else {
        return
    };

    if let Some(value) = extractor.process(at, landmarks.as_ref()) {
        *motion = MotionValue(value);
    }
}

pub struct MotionPlugin;

impl Plugin for MotionPlugin {
    fn build(&self, game: &mut App) {
        let config = game
            .world
            .get_resource::<Settings>()
            .map(|settings| settings.motion.clone())
            .unwrap_or_default();

        game.insert_resource(MotionExtractor::new(config))
            .init_resource::<MotionValue>()
            .add_system(extract_motion.in_set(PipelineSet::Sense));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{channel, snapshot, LEFT_HIP, LEFT_SHOULDER, RIGHT_HIP, RIGHT_SHOULDER};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn hips(y: f32, visibility: f32) -> LandmarkSnapshot {
        snapshot(&[(LEFT_HIP, y, visibility), (RIGHT_HIP, y, visibility)])
    }

    fn run(extractor: &mut MotionExtractor, frames: &[(f64, Option<f32>)]) -> Vec<Option<f32>> {
        frames
            .iter()
            .map(|(at, y)| {
                let landmarks = y.map(|y| hips(y, 0.9));
                extractor.process(*at, landmarks.as_ref()).map(|value| value.raw())
            })
            .collect()
    }

    #[test]
    fn upward_motion_emits_within_one_tick() {
        let mut extractor = MotionExtractor::default();

        assert_eq!(extractor.process(0.0, Some(&hips(0.50, 0.6))), Some(p32(0.)));
        let value = extractor.process(0.1, Some(&hips(0.40, 0.6))).unwrap();
        assert!((76.0..78.0).contains(&value.raw()), "{value}");
    }

    #[test]
    fn throttled_calls_change_nothing() {
        let mut throttled = MotionExtractor::default();
        let mut reference = MotionExtractor::default();

        let spammed = run(&mut throttled, &[
            (0.00, Some(0.50)),
            (0.02, Some(0.10)),
            (0.04, None),
            (0.06, Some(0.90)),
            (0.10, Some(0.40)),
        ]);
        let clean = run(&mut reference, &[(0.00, Some(0.50)), (0.10, Some(0.40))]);

        assert_eq!(spammed[1..4].to_vec(), vec![None, None, None]);
        assert_eq!(spammed[4], clean[1]);
    }

    #[test]
    fn stillness_is_exactly_zero() {
        let mut extractor = MotionExtractor::default();
        let values = run(&mut extractor, &[
            (0.0, Some(0.5)),
            (0.1, Some(0.5)),
            (0.2, Some(0.5)),
        ]);
        assert_eq!(values, [Some(0.), Some(0.), Some(0.)]);
    }

    #[test]
    fn settles_after_dropping() {
        let mut extractor = MotionExtractor::default();
        let values = run(&mut extractor, &[
            (0.0, Some(0.4)),
            (0.1, Some(0.5)),
            (0.2, Some(0.5)),
            (0.3, Some(0.5)),
        ]);

        assert!(values[1].unwrap() > 0.);
        assert_eq!(values[2..].to_vec(), vec![Some(0.), Some(0.)]);
    }

    #[test]
    fn sub_deadzone_jitter_is_zero() {
        let mut extractor = MotionExtractor::default();
        // 0.0001 over 0.1s is 0.001/s, under the velocity deadzone.
        let values = run(&mut extractor, &[
            (0.0, Some(0.5)),
            (0.1, Some(0.5001)),
            (0.2, Some(0.5)),
            (0.3, Some(0.5001)),
        ]);
        assert_eq!(values, [Some(0.); 4]);
    }

    #[test]
    fn never_negative() {
        let mut extractor = MotionExtractor::default();
        let frames = (0..300)
            .map(|i| {
                let at = i as f64 / 15.;
                let y = match i % 17 {
                    0 => None,
                    _ => Some(0.5 + 0.3 * (i as f32 * 0.7).sin() * (i as f32 * 0.13).cos()),
                };
                (at, y)
            })
            .collect::<Vec<_>>();

        run(&mut extractor, &frames)
            .into_iter()
            .flatten()
            .for_each(|value| assert!(0. <= value, "{value}"));
    }

    #[test]
    fn shoulders_stand_in_for_hidden_hips() {
        let mut extractor = MotionExtractor::default();
        let frame = |y: f32| snapshot(&[
            (LEFT_HIP, 0.9, 0.1),
            (RIGHT_HIP, 0.9, 0.1),
            (LEFT_SHOULDER, y, 0.8),
            (RIGHT_SHOULDER, y, 0.8),
        ]);

        assert_eq!(extractor.process(0.0, Some(&frame(0.3))), Some(p32(0.)));
        assert!(extractor.process(0.1, Some(&frame(0.2))).unwrap().raw() > 0.);
    }

    #[test]
    fn unconfident_body_counts_as_lost() {
        let mut extractor = MotionExtractor::default();
        assert_eq!(extractor.process(0.0, Some(&hips(0.5, 0.9))), Some(p32(0.)));
        assert_eq!(extractor.process(0.1, Some(&hips(0.1, 0.2))), Some(p32(0.)));
    }

    #[rustfmt::skip]
    #[test_case(true, false; "reanchored detection reseeds")]
    #[test_case(false, true; "stale anchor measures across gap")]
    fn detection_gap(reanchor_on_loss: bool, moves: bool) {
        let mut extractor = MotionExtractor::new(MotionConfig { reanchor_on_loss, ..default() });
        let values = run(&mut extractor, &[
            (0.0, Some(0.5)),
            (0.1, None),
            (0.2, Some(0.4)),
        ]);

        assert_eq!(values[1], Some(0.));
        assert_eq!(values[2].unwrap() > 0., moves);
    }

    #[test]
    fn system_publishes_latest_value() {
        let (sender, source) = channel();
        let mut feed = LandmarkFeed::new(source);
        feed.start();

        let mut game = App::new();
        game.init_resource::<Time>()
            .init_resource::<MotionExtractor>()
            .init_resource::<MotionValue>()
            .insert_resource(feed)
            .add_system(extract_motion);

        sender.send(PoseSample { at: 0.0, landmarks: Some(hips(0.5, 0.9)) }).unwrap();
        game.update();
        assert_eq!(**game.world.resource::<MotionValue>(), p32(0.));

        sender.send(PoseSample { at: 0.1, landmarks: Some(hips(0.4, 0.9)) }).unwrap();
        game.update();
        assert!(game.world.resource::<MotionValue>().raw() > 0.);

        sender.send(PoseSample { at: 0.2, landmarks: None }).unwrap();
        game.update();
        assert_eq!(**game.world.resource::<MotionValue>(), p32(0.));
    }
}
