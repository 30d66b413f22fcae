use std::time::{SystemTime, UNIX_EPOCH};

use mirrorlink_shm::{FrameHeader, FrameMapping, MappingConfig, PixelFormat, FRAME_HEADER_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, TransmitError};
use crate::notice::{FrameNotice, FrameNotifier};
use crate::source::FrameSource;

/// Default payload limit: one 1920x1080 RGBA frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1920 * 1080 * 4;

const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Configuration for the frame transmitter.
#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    /// Name of the shared frame channel to create.
    pub mapping_name: String,
    /// Largest payload that can be published, in bytes.
    pub max_frame_size: usize,
    /// Backing selection for the shared frame channel.
    pub mapping: MappingConfig,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            mapping_name: "mirrorlink".to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            mapping: MappingConfig::default(),
        }
    }
}

/// Publishes rendered frames into a shared frame channel it creates and owns.
#[derive(Debug)]
pub struct FrameTransmitter {
    mapping: FrameMapping,
    staging: Vec<u8>,
    sequence: u32,
    enabled: bool,
}

impl FrameTransmitter {
    /// Create the shared frame channel. Publishing starts disabled.
    pub fn new(config: &TransmitterConfig) -> Result<Self> {
        let capacity = FRAME_HEADER_SIZE + config.max_frame_size;
        let mapping =
            FrameMapping::create_with_config(&config.mapping_name, capacity, &config.mapping)?;
        info!(
            name = %config.mapping_name,
            max_frame_size = config.max_frame_size,
            "frame transmitter ready"
        );

        Ok(Self {
            mapping,
            staging: vec![0u8; config.max_frame_size],
            sequence: 0,
            enabled: false,
        })
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(enabled, "frame publishing toggled");
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sequence number of the most recently captured frame (0 before any).
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn mapping(&self) -> &FrameMapping {
        &self.mapping
    }

    /// Capture, publish and announce one frame.
    ///
    /// Returns `Ok(None)` while disabled. The sequence number advances once
    /// pixels were captured, even if publishing that frame then fails.
    pub fn send_frame<S, N>(&mut self, source: &mut S, notifier: &mut N) -> Result<Option<FrameHeader>>
    where
        S: FrameSource + ?Sized,
        N: FrameNotifier + ?Sized,
    {
        if !self.enabled {
            return Ok(None);
        }

        let (width, height) = source.output_size()?;
        let size = PixelFormat::Rgba
            .frame_size(width, height)
            .map(|size| size as usize)
            .filter(|size| *size <= self.staging.len())
            .ok_or_else(|| TransmitError::FrameTooLarge {
                width,
                height,
                size: u64::from(width) * u64::from(height) * RGBA_BYTES_PER_PIXEL as u64,
                max: self.staging.len(),
            })?;

        let stride = width as usize * RGBA_BYTES_PER_PIXEL;
        source.read_pixels(&mut self.staging[..size], stride)?;

        self.sequence = self.sequence.wrapping_add(1);
        let header = FrameHeader {
            width,
            height,
            format: PixelFormat::Rgba.code(),
            frame_size: size as u32,
            timestamp: now_micros(),
            sequence: self.sequence,
            ..FrameHeader::default()
        };

        self.mapping.write_frame(&header, &self.staging[..size])?;
        notifier.notify_frame(&FrameNotice::from(&header))?;

        debug!(
            width,
            height,
            sequence = header.sequence,
            "frame published"
        );
        Ok(Some(header))
    }

    /// Render-loop hook: publish one frame, logging and dropping failures.
    pub fn on_frame_rendered<S, N>(&mut self, source: &mut S, notifier: &mut N)
    where
        S: FrameSource + ?Sized,
        N: FrameNotifier + ?Sized,
    {
        if let Err(err) = self.send_frame(source, notifier) {
            warn!(error = %err, sequence = self.sequence, "frame dropped");
        }
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use mirrorlink_shm::ShmError;

    use super::*;
    use crate::source::CaptureError;

    struct SolidSource {
        width: u32,
        height: u32,
        value: u8,
        fail: bool,
    }

    impl SolidSource {
        fn new(width: u32, height: u32, value: u8) -> Self {
            Self {
                width,
                height,
                value,
                fail: false,
            }
        }
    }

    impl FrameSource for SolidSource {
        fn output_size(&mut self) -> std::result::Result<(u32, u32), CaptureError> {
            Ok((self.width, self.height))
        }

        fn read_pixels(
            &mut self,
            dst: &mut [u8],
            stride: usize,
        ) -> std::result::Result<(), CaptureError> {
            if self.fail {
                return Err(CaptureError::Failed("readback failed".into()));
            }
            assert_eq!(stride, self.width as usize * 4);
            assert_eq!(dst.len(), stride * self.height as usize);
            dst.fill(self.value);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        notices: Vec<FrameNotice>,
    }

    impl FrameNotifier for Recorder {
        fn notify_frame(&mut self, notice: &FrameNotice) -> Result<()> {
            self.notices.push(*notice);
            Ok(())
        }
    }

    fn transmitter(dir: &tempfile::TempDir, max_frame_size: usize) -> FrameTransmitter {
        let config = TransmitterConfig {
            mapping_name: "tx".to_string(),
            max_frame_size,
            mapping: MappingConfig::default().with_dir(dir.path()),
        };
        FrameTransmitter::new(&config).unwrap()
    }

    #[test]
    fn disabled_transmitter_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tx = transmitter(&dir, 64);
        let mut recorder = Recorder::default();

        let sent = tx
            .send_frame(&mut SolidSource::new(2, 2, 1), &mut recorder)
            .unwrap();
        assert!(sent.is_none());
        assert!(recorder.notices.is_empty());
        assert_eq!(tx.sequence(), 0);
    }

    #[test]
    fn published_frame_is_readable_and_announced() {
        let dir = tempfile::tempdir().unwrap();
        let mut tx = transmitter(&dir, 64);
        tx.set_enabled(true);
        let mut recorder = Recorder::default();

        let header = tx
            .send_frame(&mut SolidSource::new(2, 3, 0x5A), &mut recorder)
            .unwrap()
            .unwrap();
        assert_eq!(header.frame_size, 24);
        assert_eq!(header.pixel_format(), Some(PixelFormat::Rgba));

        let reader = FrameMapping::open_with_config(
            "tx",
            FRAME_HEADER_SIZE + 64,
            &MappingConfig::default().with_dir(dir.path()),
        )
        .unwrap();
        let mut out = [0u8; 64];
        let read = reader.read_frame(&mut out).unwrap();
        assert_eq!(read, header);
        assert!(out[..24].iter().all(|b| *b == 0x5A));

        assert_eq!(recorder.notices.len(), 1);
        assert_eq!(recorder.notices[0], FrameNotice::from(&header));
    }

    #[test]
    fn sequence_survives_disable_and_enable() {
        let dir = tempfile::tempdir().unwrap();
        let mut tx = transmitter(&dir, 64);
        let mut source = SolidSource::new(1, 1, 0);
        let mut recorder = Recorder::default();

        tx.set_enabled(true);
        tx.send_frame(&mut source, &mut recorder).unwrap();
        tx.send_frame(&mut source, &mut recorder).unwrap();
        tx.set_enabled(false);
        tx.send_frame(&mut source, &mut recorder).unwrap();
        tx.set_enabled(true);
        tx.send_frame(&mut source, &mut recorder).unwrap();

        let sequences: Vec<u32> = recorder.notices.iter().map(|n| n.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn oversize_frame_is_dropped_without_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut tx = transmitter(&dir, 16);
        tx.set_enabled(true);
        let mut recorder = Recorder::default();

        let err = tx
            .send_frame(&mut SolidSource::new(4, 4, 1), &mut recorder)
            .unwrap_err();
        assert!(matches!(
            err,
            TransmitError::FrameTooLarge {
                size: 64,
                max: 16,
                ..
            }
        ));
        assert!(recorder.notices.is_empty());
        assert_eq!(tx.sequence(), 0);

        // The log-and-drop hook swallows the same failure.
        tx.on_frame_rendered(&mut SolidSource::new(4, 4, 1), &mut recorder);
        assert!(recorder.notices.is_empty());
    }

    #[test]
    fn capture_failure_aborts_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut tx = transmitter(&dir, 16);
        tx.set_enabled(true);
        let mut source = SolidSource::new(1, 1, 0);
        source.fail = true;
        let mut recorder = Recorder::default();

        let err = tx.send_frame(&mut source, &mut recorder).unwrap_err();
        assert!(matches!(err, TransmitError::Capture(CaptureError::Failed(_))));
        assert!(recorder.notices.is_empty());
    }

    #[test]
    fn mapping_name_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransmitterConfig {
            mapping_name: "bad/name".to_string(),
            max_frame_size: 16,
            mapping: MappingConfig::default().with_dir(dir.path()),
        };
        let err = FrameTransmitter::new(&config).unwrap_err();
        assert!(matches!(
            err,
            TransmitError::Shm(ShmError::InvalidName { .. })
        ));
    }
}
