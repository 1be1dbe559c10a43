//! Boundary between the engine and whatever stores the frames.
//!
//! File formats, virtual stacks and display live outside this crate. They
//! hand frames in through a [`FrameSource`] and take corrected frames back
//! through a [`FrameSink`]. In-memory implementations are provided for
//! volumes that are already loaded.

use std::ops::Range;

use common::Buffer3;

use crate::error::BoxedError;
use crate::sample::Sample;

/// Random access to a series of equally sized frames.
pub trait FrameSource<S: Sample> {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn frame_count(&self) -> usize;

    /// Loads the frames in `frames` into a new volume.
    fn load(&mut self, frames: Range<usize>) -> Result<Buffer3<S>, BoxedError>;
}

/// Receives corrected frames, in increasing frame order.
pub trait FrameSink<S: Sample> {
    /// `frames` holds whole frames, the first of which is series frame
    /// `first_frame`.
    fn emit(&mut self, first_frame: usize, frames: &[S]) -> Result<(), BoxedError>;
}

/// Serves frames out of a volume that is already in memory.
#[derive(Debug)]
pub struct VolumeSource<'a, S> {
    volume: &'a Buffer3<S>,
}

impl<'a, S: Sample> VolumeSource<'a, S> {
    pub fn new(volume: &'a Buffer3<S>) -> Self {
        Self { volume }
    }
}

impl<S: Sample> FrameSource<S> for VolumeSource<'_, S> {
    fn width(&self) -> usize {
        self.volume.width()
    }

    fn height(&self) -> usize {
        self.volume.height()
    }

    fn frame_count(&self) -> usize {
        self.volume.frames()
    }

    fn load(&mut self, frames: Range<usize>) -> Result<Buffer3<S>, BoxedError> {
        if frames.end > self.volume.frames() {
            return Err(format!(
                "frames {frames:?} requested from a {}-frame volume",
                self.volume.frames()
            )
            .into());
        }
        Ok(self.volume.slice_frames(frames))
    }
}

/// Collects emitted frames into a volume of the full series size.
///
/// Frames that are never emitted keep their default value.
#[derive(Debug)]
pub struct VolumeSink<S> {
    output: Buffer3<S>,
}

impl<S: Sample> VolumeSink<S> {
    pub fn new(width: usize, height: usize, frames: usize) -> Self {
        Self {
            output: Buffer3::new_default(width, height, frames),
        }
    }

    pub fn into_inner(self) -> Buffer3<S> {
        self.output
    }
}

impl<S: Sample> FrameSink<S> for VolumeSink<S> {
    fn emit(&mut self, first_frame: usize, frames: &[S]) -> Result<(), BoxedError> {
        let plane = self.output.plane_len();
        if frames.len() % plane != 0 {
            return Err(format!(
                "{} samples do not form whole {plane}-sample frames",
                frames.len()
            )
            .into());
        }
        let range = first_frame..first_frame + frames.len() / plane;
        if range.end > self.output.frames() {
            return Err(format!(
                "frames {range:?} exceed the {}-frame output",
                self.output.frames()
            )
            .into());
        }
        self.output.frame_range_mut(range).copy_from_slice(frames);
        Ok(())
    }
}
