//! Capture backends.
//!
//! The matcher only ever sees an [`Image`]; which backend produced it is
//! selected by configuration and hidden behind [`CaptureSource`].

use crate::image::Image;
use crate::util::{MatchError, MatchResult};
use std::sync::{Mutex, PoisonError};

/// Something that can produce a fresh capture on demand.
pub trait CaptureSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn capture(&self) -> MatchResult<Image>;
}

/// Always returns the same image.
#[derive(Clone, Debug)]
pub struct StillCapture {
    image: Image,
}

impl StillCapture {
    /// Wraps a fixed image.
    pub fn new(image: Image) -> Self {
        Self { image }
    }
}

impl CaptureSource for StillCapture {
    fn name(&self) -> &str {
        "still"
    }

    fn capture(&self) -> MatchResult<Image> {
        Ok(self.image.clone())
    }
}

/// Replays a fixed list of frames in order, one per call.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<Image>,
    next: Mutex<usize>,
    looping: bool,
}

impl FrameSequence {
    /// Fails with `InvalidInput` once every frame has been returned.
    pub fn new(frames: Vec<Image>) -> Self {
        Self {
            frames,
            next: Mutex::new(0),
            looping: false,
        }
    }

    /// Starts over at the first frame after the last one.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Returns the number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true when the sequence holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl CaptureSource for FrameSequence {
    fn name(&self) -> &str {
        "frames"
    }

    fn capture(&self) -> MatchResult<Image> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        if self.frames.is_empty() {
            return Err(MatchError::InvalidInput("frame sequence is empty"));
        }
        if *next >= self.frames.len() {
            if !self.looping {
                return Err(MatchError::InvalidInput("frame sequence exhausted"));
            }
            *next = 0;
        }
        let frame = self.frames[*next].clone();
        *next += 1;
        Ok(frame)
    }
}

/// Reads a screenshot from disk on every call.
#[cfg(feature = "image-io")]
#[derive(Clone, Debug)]
pub struct FileCapture {
    path: std::path::PathBuf,
}

#[cfg(feature = "image-io")]
impl FileCapture {
    /// Reads captures from the image file at `path`.
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the image file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(feature = "image-io")]
impl CaptureSource for FileCapture {
    fn name(&self) -> &str {
        "file"
    }

    fn capture(&self) -> MatchResult<Image> {
        crate::image::io::load_image(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureSource, FrameSequence, StillCapture};
    use crate::image::Image;

    fn frame(v: u8) -> Image {
        Image::gray(vec![v; 4], 2, 2).unwrap()
    }

    #[test]
    fn still_capture_repeats() {
        let cap = StillCapture::new(frame(3));
        assert_eq!(cap.capture().unwrap().as_u8(), Some(&[3u8; 4][..]));
        assert_eq!(cap.capture().unwrap().as_u8(), Some(&[3u8; 4][..]));
    }

    #[test]
    fn frames_play_in_order_then_stop() {
        let seq = FrameSequence::new(vec![frame(1), frame(2)]);
        assert_eq!(seq.capture().unwrap().as_u8().unwrap()[0], 1);
        assert_eq!(seq.capture().unwrap().as_u8().unwrap()[0], 2);
        assert!(seq.capture().is_err());
    }

    #[test]
    fn looping_frames_wrap_around() {
        let seq = FrameSequence::new(vec![frame(1), frame(2)]).looping();
        let firsts: Vec<u8> = (0..5)
            .map(|_| seq.capture().unwrap().as_u8().unwrap()[0])
            .collect();
        assert_eq!(firsts, vec![1, 2, 1, 2, 1]);
        assert!(FrameSequence::new(Vec::new()).capture().is_err());
    }
}
