use crate::error::{Result, ShmError};
use crate::header::{FrameHeader, FRAME_HEADER_SIZE};

/// Read-only view over a frame slot: header, then payload.
#[derive(Debug, Clone, Copy)]
pub struct SharedFrameBuffer<'a> {
    region: &'a [u8],
}

impl<'a> SharedFrameBuffer<'a> {
    pub fn new(region: &'a [u8]) -> Result<Self> {
        check_capacity(region.len())?;
        Ok(Self { region })
    }

    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Largest payload the slot can hold.
    pub fn max_payload(&self) -> usize {
        self.region.len() - FRAME_HEADER_SIZE
    }

    pub fn header(&self) -> FrameHeader {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&self.region[..FRAME_HEADER_SIZE]);
        FrameHeader::from_bytes(&raw)
    }

    /// Copy the current frame into `out`, returning its header.
    ///
    /// Fails if the declared `frame_size` exceeds `out` or the slot itself.
    pub fn read_into(&self, out: &mut [u8]) -> Result<FrameHeader> {
        let header = self.header();
        let size = header.frame_size as usize;
        if size > out.len() {
            return Err(ShmError::FrameTooLarge {
                size,
                max: out.len(),
            });
        }
        if size > self.max_payload() {
            return Err(ShmError::FrameTooLarge {
                size,
                max: self.max_payload(),
            });
        }

        out[..size].copy_from_slice(&self.region[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + size]);
        Ok(header)
    }
}

/// Writable view over a frame slot.
#[derive(Debug)]
pub struct SharedFrameBufferMut<'a> {
    region: &'a mut [u8],
}

impl<'a> SharedFrameBufferMut<'a> {
    pub fn new(region: &'a mut [u8]) -> Result<Self> {
        check_capacity(region.len())?;
        Ok(Self { region })
    }

    pub fn max_payload(&self) -> usize {
        self.region.len() - FRAME_HEADER_SIZE
    }

    /// Store `header` and the first `header.frame_size` bytes of `payload`.
    ///
    /// Nothing is written when the frame does not fit or the payload is short.
    pub fn write(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        let size = header.frame_size as usize;
        if size > self.max_payload() {
            return Err(ShmError::FrameTooLarge {
                size,
                max: self.max_payload(),
            });
        }
        if payload.len() < size {
            return Err(ShmError::PayloadTooShort {
                expected: size,
                actual: payload.len(),
            });
        }

        self.region[..FRAME_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        self.region[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + size].copy_from_slice(&payload[..size]);
        Ok(())
    }

    pub fn as_shared(&self) -> SharedFrameBuffer<'_> {
        SharedFrameBuffer {
            region: &self.region[..],
        }
    }
}

fn check_capacity(capacity: usize) -> Result<()> {
    if capacity < FRAME_HEADER_SIZE {
        return Err(ShmError::CapacityTooSmall {
            capacity,
            min: FRAME_HEADER_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PixelFormat;

    fn header(frame_size: u32) -> FrameHeader {
        FrameHeader {
            width: 2,
            height: 1,
            format: PixelFormat::Rgba.code(),
            frame_size,
            timestamp: 1_700_000_000_000_000,
            sequence: 1,
            ..FrameHeader::default()
        }
    }

    #[test]
    fn every_payload_size_round_trips() {
        let mut region = vec![0u8; FRAME_HEADER_SIZE + 64];
        let payload: Vec<u8> = (0..64u8).collect();

        for size in [0usize, 1, 35, 63, 64] {
            let mut slot = SharedFrameBufferMut::new(&mut region).unwrap();
            slot.write(&header(size as u32), &payload).unwrap();

            let mut out = vec![0xAAu8; 64];
            let read = slot.as_shared().read_into(&mut out).unwrap();
            assert_eq!(read.frame_size as usize, size);
            assert_eq!(&out[..size], &payload[..size]);
        }
    }

    #[test]
    fn oversize_write_leaves_region_untouched() {
        let mut region = vec![0u8; FRAME_HEADER_SIZE + 8];
        let mut slot = SharedFrameBufferMut::new(&mut region).unwrap();
        slot.write(&header(4), &[1, 2, 3, 4]).unwrap();
        let before = slot.as_shared().header();

        let err = slot.write(&header(9), &[0u8; 9]).unwrap_err();
        assert!(matches!(err, ShmError::FrameTooLarge { size: 9, max: 8 }));
        assert_eq!(slot.as_shared().header(), before);
        drop(slot);
        assert_eq!(&region[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut region = vec![0u8; FRAME_HEADER_SIZE + 8];
        let mut slot = SharedFrameBufferMut::new(&mut region).unwrap();
        let err = slot.write(&header(8), &[0u8; 3]).unwrap_err();
        assert!(matches!(
            err,
            ShmError::PayloadTooShort {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn reader_buffer_limit_is_enforced() {
        let mut region = vec![0u8; FRAME_HEADER_SIZE + 16];
        let mut slot = SharedFrameBufferMut::new(&mut region).unwrap();
        slot.write(&header(16), &[7u8; 16]).unwrap();

        let mut small = [0u8; 8];
        let err = slot.as_shared().read_into(&mut small).unwrap_err();
        assert!(matches!(err, ShmError::FrameTooLarge { size: 16, max: 8 }));
    }

    #[test]
    fn corrupt_frame_size_is_rejected() {
        let mut region = vec![0u8; FRAME_HEADER_SIZE + 4];
        region[..FRAME_HEADER_SIZE].copy_from_slice(&header(1000).to_bytes());

        let view = SharedFrameBuffer::new(&region).unwrap();
        let mut out = vec![0u8; 2000];
        assert!(matches!(
            view.read_into(&mut out),
            Err(ShmError::FrameTooLarge { size: 1000, max: 4 })
        ));
    }

    #[test]
    fn region_smaller_than_header_is_rejected() {
        let region = [0u8; FRAME_HEADER_SIZE - 1];
        assert!(matches!(
            SharedFrameBuffer::new(&region),
            Err(ShmError::CapacityTooSmall { .. })
        ));
    }
}
