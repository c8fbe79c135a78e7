use crate::types::Frame;

/// Logical frame clock.
///
/// Only [`advance`](Self::advance) moves time; wall-clock pacing is the
/// host's concern, so pausing simply means not advancing.
#[derive(Clone, Debug)]
pub struct FrameLoop {
    current: Frame,
    frame_millis: f64,
}

impl FrameLoop {
    pub fn new(fps: u32) -> Self {
        Self {
            current: Frame::ZERO,
            frame_millis: 1000.0 / f64::from(fps.max(1)),
        }
    }

    /// Frame the next step will simulate.
    pub fn current(&self) -> Frame {
        self.current
    }

    pub fn advance(&mut self) -> Frame {
        let ticked = self.current;
        self.current = self.current + 1;
        ticked
    }

    /// Logical time elapsed at the start of the current frame.
    pub fn elapsed_millis(&self) -> f64 {
        self.current.0 as f64 * self.frame_millis
    }

    pub fn reset(&mut self) {
        self.current = Frame::ZERO;
    }
}
