/// Errors a [`FrameSource`] can report.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No frame has been rendered yet.
    #[error("no frame available")]
    NotReady,

    /// The source failed to read back pixels.
    #[error("{0}")]
    Failed(String),
}

/// Something that can hand out the most recently rendered frame as RGBA.
pub trait FrameSource {
    /// Current output size in pixels.
    fn output_size(&mut self) -> Result<(u32, u32), CaptureError>;

    /// Fill `dst` with tightly packed RGBA rows of `stride` bytes
    /// (`stride == width * 4`). `dst` holds exactly `stride * height` bytes.
    fn read_pixels(&mut self, dst: &mut [u8], stride: usize) -> Result<(), CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn output_size(&mut self) -> Result<(u32, u32), CaptureError> {
        (**self).output_size()
    }

    fn read_pixels(&mut self, dst: &mut [u8], stride: usize) -> Result<(), CaptureError> {
        (**self).read_pixels(dst, stride)
    }
}
