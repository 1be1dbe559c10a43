use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};
use std::slice;

/// Dense `width × height × frames` volume stored frame after frame.
///
/// Element `(x, y, t)` lives at `t * width * height + y * width + x`, so one
/// frame is a contiguous row-major image and a run of frames is a contiguous
/// slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer3<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    frames: usize,
}

impl<T> Buffer3<T> {
    pub fn new(width: usize, height: usize, frames: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height * frames,
            "data length must equal width * height * frames"
        );
        Self {
            data,
            width,
            height,
            frames,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of elements in one frame.
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Position of `(x, y, t)` in the flat data.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, t: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && t < self.frames);
        t * self.plane_len() + y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, t: usize) -> &T {
        &self.data[self.offset(x, y, t)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, t: usize) -> &mut T {
        let idx = self.offset(x, y, t);
        &mut self.data[idx]
    }

    #[inline]
    pub fn frame(&self, t: usize) -> &[T] {
        let plane = self.plane_len();
        &self.data[t * plane..(t + 1) * plane]
    }

    #[inline]
    pub fn frame_mut(&mut self, t: usize) -> &mut [T] {
        let plane = self.plane_len();
        &mut self.data[t * plane..(t + 1) * plane]
    }

    /// Contiguous slice covering the frames in `range`.
    #[inline]
    pub fn frame_range(&self, range: Range<usize>) -> &[T] {
        assert!(range.end <= self.frames, "frame range out of bounds");
        let plane = self.plane_len();
        &self.data[range.start * plane..range.end * plane]
    }

    #[inline]
    pub fn frame_range_mut(&mut self, range: Range<usize>) -> &mut [T] {
        assert!(range.end <= self.frames, "frame range out of bounds");
        let plane = self.plane_len();
        &mut self.data[range.start * plane..range.end * plane]
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Shared handle for writing whole pixel columns from several threads.
    pub fn column_writer(&mut self) -> ColumnWriter<'_, T> {
        ColumnWriter {
            ptr: self.data.as_mut_ptr(),
            plane: self.width * self.height,
            frames: self.frames,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Values of pixel `(x, y)` across all frames, in frame order.
    pub fn column(&self, x: usize, y: usize) -> impl Iterator<Item = &T> + '_ {
        let plane = self.plane_len();
        let offset = y * self.width + x;
        self.data.iter().skip(offset).step_by(plane)
    }
}

/// Writes the time series of single pixels into a [`Buffer3`] while other
/// threads write other pixels.
///
/// The writer mutably borrows the volume, so nothing else can observe it
/// while columns are being written.
pub struct ColumnWriter<'a, T> {
    ptr: *mut T,
    plane: usize,
    frames: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: the pointer comes from a live `&mut Buffer3<T>`; callers of
// `write_column` guarantee each pixel is written by one thread at a time.
unsafe impl<T: Send> Send for ColumnWriter<'_, T> {}
unsafe impl<T: Send> Sync for ColumnWriter<'_, T> {}

impl<T> ColumnWriter<'_, T> {
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.plane
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Overwrites every frame of pixel `pixel` (row-major index within a frame).
    ///
    /// # Safety
    ///
    /// No other thread may read or write the same `pixel` concurrently.
    #[inline]
    pub unsafe fn write_column(&self, pixel: usize, values: &[T])
    where
        T: Copy,
    {
        assert!(pixel < self.plane, "pixel index out of bounds");
        assert_eq!(values.len(), self.frames, "column length must equal frame count");
        for (t, &value) in values.iter().enumerate() {
            // SAFETY: in bounds by the asserts above; exclusivity is on the caller.
            unsafe { self.ptr.add(t * self.plane + pixel).write(value) };
        }
    }
}

impl<T: Clone> Buffer3<T> {
    pub fn new_filled(width: usize, height: usize, frames: usize, value: T) -> Self {
        Self {
            data: vec![value; width * height * frames],
            width,
            height,
            frames,
        }
    }

    /// Copies the frames in `range` into a new volume.
    pub fn slice_frames(&self, range: Range<usize>) -> Self {
        let frames = range.len();
        Self {
            data: self.frame_range(range).to_vec(),
            width: self.width,
            height: self.height,
            frames,
        }
    }
}

impl<T: Default + Clone> Buffer3<T> {
    pub fn new_default(width: usize, height: usize, frames: usize) -> Self {
        Self::new_filled(width, height, frames, T::default())
    }
}

impl<T> Index<(usize, usize, usize)> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y, t): (usize, usize, usize)) -> &T {
        self.get(x, y, t)
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, (x, y, t): (usize, usize, usize)) -> &mut T {
        self.get_mut(x, y, t)
    }
}
