use super::{LandmarkSource, PerceptionError, PoseSample};
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex,
};

/// Receiving end of a live perception thread.
///
/// The producer owns the camera and pushes one [`PoseSample`] per processed
/// image. Closing drops the receiver, so the producer's next `send` fails and
/// it can release the camera.
pub struct ChannelSource {
    receiver: Option<Mutex<Receiver<PoseSample>>>,
}

pub fn channel() -> (Sender<PoseSample>, ChannelSource) {
    let (sender, receiver) = mpsc::channel();
    (
        sender,
        ChannelSource {
            receiver: Some(Mutex::new(receiver)),
        },
    )
}

impl LandmarkSource for ChannelSource {
    fn start(&mut self) -> Result<(), PerceptionError> {
        self.receiver
            .as_ref()
            .map(|_| ())
            .ok_or(PerceptionError::Disconnected)
    }

    fn poll(&mut self, _now: f64) -> Option<PoseSample> {
        self.receiver
            .as_ref()?
            .lock()
            .ok()?
            .try_iter()
            .last()
    }

    fn close(&mut self) {
        self.receiver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(at: f64) -> PoseSample {
        PoseSample { at, landmarks: None }
    }

    #[test]
    fn latest_pending_sample_wins() {
        let (sender, mut source) = channel();
        assert!(source.start().is_ok());
        assert_eq!(source.poll(0.), None);

        [0.1, 0.2, 0.3].into_iter().for_each(|at| sender.send(sample(at)).unwrap());
        assert_eq!(source.poll(0.3), Some(sample(0.3)));
        assert_eq!(source.poll(0.4), None);
    }

    #[test]
    fn close_disconnects_producer() {
        let (sender, mut source) = channel();
        source.close();

        assert!(sender.send(sample(0.)).is_err());
        assert_eq!(source.poll(0.), None);
        assert!(matches!(source.start(), Err(PerceptionError::Disconnected)));
    }
}
