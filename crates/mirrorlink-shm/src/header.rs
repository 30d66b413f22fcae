/// Size of the serialized [`FrameHeader`].
pub const FRAME_HEADER_SIZE: usize = 36;

const WIDTH: usize = 0;
const HEIGHT: usize = 4;
const FORMAT: usize = 8;
const FRAME_SIZE: usize = 12;
const TIMESTAMP: usize = 16;
const SEQUENCE: usize = 24;
const RESERVED0: usize = 28;
const RESERVED1: usize = 32;

/// Pixel layout of a shared frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PixelFormat {
    Yuv420p = 0,
    Rgb24 = 1,
    Rgba = 2,
}

impl PixelFormat {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Yuv420p),
            1 => Some(Self::Rgb24),
            2 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Payload size of a `width` x `height` frame, or `None` on overflow.
    pub fn frame_size(self, width: u32, height: u32) -> Option<u32> {
        let pixels = width.checked_mul(height)?;
        match self {
            Self::Yuv420p => pixels.checked_mul(3).map(|n| n / 2),
            Self::Rgb24 => pixels.checked_mul(3),
            Self::Rgba => pixels.checked_mul(4),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Rgb24 => "rgb24",
            Self::Rgba => "rgba",
        }
    }
}

/// Metadata stored ahead of the payload in the shared region.
///
/// Serialized as 36 packed bytes in native byte order, readable by
/// non-Rust consumers that overlay a C struct on the mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    /// Raw [`PixelFormat`] code.
    pub format: u32,
    /// Payload length in bytes.
    pub frame_size: u32,
    /// Capture time, microseconds since the Unix epoch.
    pub timestamp: u64,
    pub sequence: u32,
    pub reserved0: u32,
    pub reserved1: u32,
}

impl FrameHeader {
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::from_code(self.format)
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[WIDTH..WIDTH + 4].copy_from_slice(&self.width.to_ne_bytes());
        out[HEIGHT..HEIGHT + 4].copy_from_slice(&self.height.to_ne_bytes());
        out[FORMAT..FORMAT + 4].copy_from_slice(&self.format.to_ne_bytes());
        out[FRAME_SIZE..FRAME_SIZE + 4].copy_from_slice(&self.frame_size.to_ne_bytes());
        out[TIMESTAMP..TIMESTAMP + 8].copy_from_slice(&self.timestamp.to_ne_bytes());
        out[SEQUENCE..SEQUENCE + 4].copy_from_slice(&self.sequence.to_ne_bytes());
        out[RESERVED0..RESERVED0 + 4].copy_from_slice(&self.reserved0.to_ne_bytes());
        out[RESERVED1..RESERVED1 + 4].copy_from_slice(&self.reserved1.to_ne_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            width: read_u32(bytes, WIDTH),
            height: read_u32(bytes, HEIGHT),
            format: read_u32(bytes, FORMAT),
            frame_size: read_u32(bytes, FRAME_SIZE),
            timestamp: read_u64(bytes, TIMESTAMP),
            sequence: read_u32(bytes, SEQUENCE),
            reserved0: read_u32(bytes, RESERVED0),
            reserved1: read_u32(bytes, RESERVED1),
        }
    }
}

fn read_u32(bytes: &[u8; FRAME_HEADER_SIZE], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(raw)
}

fn read_u64(bytes: &[u8; FRAME_HEADER_SIZE], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(raw)
}
