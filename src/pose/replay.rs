use super::{LandmarkSource, PerceptionError, PoseSample};
use std::{collections::VecDeque, fs, path::PathBuf};
use tap::{Pipe, Tap};

/// Plays a recorded pose session back against the app clock.
///
/// Recordings are JSON arrays of samples whose `at` is relative to the start
/// of the recording. Playback begins at the first poll after `start`.
pub struct ReplaySource {
    path: Option<PathBuf>,
    pending: Vec<PoseSample>,
    queue: VecDeque<PoseSample>,
    origin: Option<f64>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            pending: vec![],
            queue: VecDeque::new(),
            origin: None,
        }
    }

    pub fn from_samples(samples: Vec<PoseSample>) -> Self {
        Self {
            path: None,
            pending: samples,
            queue: VecDeque::new(),
            origin: None,
        }
    }
}

impl LandmarkSource for ReplaySource {
    fn start(&mut self) -> Result<(), PerceptionError> {
        if let Some(path) = &self.path {
            self.pending = fs::read_to_string(path)?
                .pipe(|text| serde_json::from_str::<Vec<PoseSample>>(&text))?;
        }

        self.queue = self
            .pending
            .clone()
            .tap_mut(|samples| samples.sort_by(|a, b| a.at.total_cmp(&b.at)))
            .into();
        self.origin = None;
        Ok(())
    }

    /// Drains every sample that is due and hands out the newest one.
    fn poll(&mut self, now: f64) -> Option<PoseSample> {
        let origin = *self.origin.get_or_insert(now);
        let mut latest = None;

        while self
            .queue
            .front()
            .map_or(false, |sample| sample.at <= now - origin)
        {
            latest = self.queue.pop_front();
        }

        latest.map(|sample| PoseSample {
            at: origin + sample.at,
            ..sample
        })
    }

    fn close(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{snapshot, LEFT_HIP};
    use pretty_assertions::assert_eq;

    #[test]
    fn replays_relative_to_first_poll() {
        let mut source = ReplaySource::from_samples(vec![
            PoseSample { at: 0.2, landmarks: None },
            PoseSample { at: 0.0, landmarks: Some(snapshot(&[(LEFT_HIP, 0.5, 1.)])) },
            PoseSample { at: 0.1, landmarks: None },
        ]);
        assert!(source.start().is_ok());

        let first = source.poll(10.).map(|sample| (sample.at, sample.landmarks.is_some()));
        assert_eq!(first, Some((10., true)));
        assert_eq!(source.poll(10.05), None);

        let skipped = source.poll(10.25).map(|sample| sample.at);
        assert_eq!(skipped, Some(10.2));
        assert_eq!(source.poll(11.), None);
    }

    #[test]
    fn parses_recording_with_missing_detections() {
        let text = r#"[
            { "at": 0.0, "landmarks": null },
            { "at": 0.1, "landmarks": [{ "x": 0.5, "y": 0.4, "visibility": 0.9 }] },
            { "at": 0.2 }
        ]"#;
        let samples = serde_json::from_str::<Vec<PoseSample>>(text).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].landmarks, None);
        assert_eq!(samples[1].landmarks.as_ref().map(|lm| lm[0].y), Some(0.4));
        assert_eq!(samples[2].landmarks, None);
    }

    #[test]
    fn missing_recording_fails_to_start() {
        let mut source = ReplaySource::new("does/not/exist.json");
        assert!(matches!(source.start(), Err(PerceptionError::Io(_))));
    }
}
