use mirrorlink_transmit::{CaptureError, FrameSource};

/// Synthetic RGBA source: a diagonal gradient that scrolls by one step per
/// captured frame, so consecutive frames are distinguishable.
#[derive(Debug)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn output_size(&mut self) -> Result<(u32, u32), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::NotReady);
        }
        Ok((self.width, self.height))
    }

    fn read_pixels(&mut self, dst: &mut [u8], stride: usize) -> Result<(), CaptureError> {
        let row_bytes = self.width as usize * 4;
        if stride < row_bytes || dst.len() < stride * self.height as usize {
            return Err(CaptureError::Failed(format!(
                "destination too small for {}x{}",
                self.width, self.height
            )));
        }

        let tick = self.tick;
        for (y, row) in dst.chunks_exact_mut(stride).take(self.height as usize).enumerate() {
            for (x, pixel) in row[..row_bytes].chunks_exact_mut(4).enumerate() {
                pixel[0] = (x as u32).wrapping_add(tick) as u8;
                pixel[1] = (y as u32).wrapping_add(tick) as u8;
                pixel[2] = tick as u8;
                pixel[3] = 0xff;
            }
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }
}
