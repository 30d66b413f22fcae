use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::buffer::{SharedFrameBuffer, SharedFrameBufferMut};
use crate::error::{Result, ShmError};
use crate::header::{FrameHeader, FRAME_HEADER_SIZE};
use crate::naming::{BackingIdentity, BackingKind};
use crate::sys::{self, BackingStamp, Region};

/// How a mapping name is turned into a backing store.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    /// Backing kind. Default: file.
    pub kind: BackingKind,
    /// Directory for file backings. Default: the resolved temp directory.
    pub dir: Option<PathBuf>,
    /// Permission bits for created stores (Unix). Default: `0o600`.
    pub mode: u32,
}

impl MappingConfig {
    /// Default permission mode for created backing stores.
    pub const DEFAULT_MODE: u32 = 0o600;

    pub fn with_kind(mut self, kind: BackingKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn identity(&self, name: &str) -> Result<BackingIdentity> {
        BackingIdentity::derive(name, self.kind, self.dir.as_deref())
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            kind: BackingKind::File,
            dir: None,
            mode: Self::DEFAULT_MODE,
        }
    }
}

/// A handle on one shared frame slot.
///
/// The creator owns the backing store and removes it when the handle is
/// destroyed or dropped; openers only unmap.
pub struct FrameMapping {
    region: Option<Region>,
    identity: BackingIdentity,
    capacity: usize,
    creator: bool,
    stamp: BackingStamp,
}

impl std::fmt::Debug for FrameMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMapping")
            .field("identity", &self.identity)
            .field("capacity", &self.capacity)
            .field("creator", &self.creator)
            .finish()
    }
}

impl FrameMapping {
    /// Create a zeroed mapping of `capacity` bytes under the default config.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        Self::create_with_config(name, capacity, &MappingConfig::default())
    }

    pub fn create_with_config(name: &str, capacity: usize, config: &MappingConfig) -> Result<Self> {
        check_capacity(capacity)?;
        let identity = config.identity(name)?;

        let (region, stamp) = Region::create(&identity, capacity, config.mode)?;
        info!(%identity, capacity, "frame mapping created");

        Ok(Self {
            region: Some(region),
            identity,
            capacity,
            creator: true,
            stamp,
        })
    }

    /// Open an existing mapping of at least `capacity` bytes under the
    /// default config.
    pub fn open(name: &str, capacity: usize) -> Result<Self> {
        Self::open_with_config(name, capacity, &MappingConfig::default())
    }

    pub fn open_with_config(name: &str, capacity: usize, config: &MappingConfig) -> Result<Self> {
        check_capacity(capacity)?;
        let identity = config.identity(name)?;

        let region = Region::open(&identity, capacity)?;
        debug!(%identity, capacity, "frame mapping opened");

        Ok(Self {
            region: Some(region),
            identity,
            capacity,
            creator: false,
            stamp: BackingStamp::default(),
        })
    }

    /// Total mapped bytes (header plus payload).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest frame payload this mapping can hold.
    pub fn max_payload(&self) -> usize {
        self.capacity - FRAME_HEADER_SIZE
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    pub fn identity(&self) -> &BackingIdentity {
        &self.identity
    }

    /// Publish one frame, replacing whatever the slot held.
    ///
    /// The write-back request that follows is asynchronous; if it fails the
    /// frame is still visible to readers of the mapping and only a warning is
    /// logged.
    pub fn write_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        let region = self.region_mut()?;
        SharedFrameBufferMut::new(region.as_mut_slice())?.write(header, payload)?;

        if let Err(err) = region.flush() {
            warn!(identity = %self.identity, error = %err, "asynchronous flush failed");
        }
        Ok(())
    }

    /// Copy the current frame into `out` (at most `out.len()` bytes of payload).
    pub fn read_frame(&self, out: &mut [u8]) -> Result<FrameHeader> {
        self.view()?.read_into(out)
    }

    /// The current header without copying the payload.
    pub fn read_header(&self) -> Result<FrameHeader> {
        Ok(self.view()?.header())
    }

    /// Unmap and, for the creator, remove the backing store.
    pub fn destroy(mut self) -> std::io::Result<()> {
        self.release()
    }

    fn view(&self) -> Result<SharedFrameBuffer<'_>> {
        let region = self.region.as_ref().ok_or_else(|| released(&self.identity))?;
        SharedFrameBuffer::new(region.as_slice())
    }

    fn region_mut(&mut self) -> Result<&mut Region> {
        let identity = &self.identity;
        self.region.as_mut().ok_or_else(|| released(identity))
    }

    fn release(&mut self) -> std::io::Result<()> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        drop(region);

        if self.creator {
            let stamp = std::mem::take(&mut self.stamp);
            if sys::remove_backing(&self.identity, stamp)? {
                info!(identity = %self.identity, "frame mapping removed");
            }
        } else {
            debug!(identity = %self.identity, "frame mapping closed");
        }
        Ok(())
    }
}

impl Drop for FrameMapping {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(identity = %self.identity, error = %err, "failed to remove frame mapping");
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

fn released(identity: &BackingIdentity) -> ShmError {
    ShmError::Map {
        identity: identity.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotConnected, "mapping was released"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PixelFormat;

    fn file_config(dir: &tempfile::TempDir) -> MappingConfig {
        MappingConfig::default().with_dir(dir.path())
    }

    fn rgba_header(width: u32, height: u32, sequence: u32) -> FrameHeader {
        FrameHeader {
            width,
            height,
            format: PixelFormat::Rgba.code(),
            frame_size: width * height * 4,
            timestamp: 42,
            sequence,
            ..FrameHeader::default()
        }
    }

    #[test]
    fn create_places_file_under_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = FrameMapping::create_with_config("screen", 1024, &file_config(&dir)).unwrap();

        let expected = dir.path().join("scrcpy_screen.map");
        assert_eq!(mapping.identity(), &BackingIdentity::File(expected.clone()));
        assert_eq!(std::fs::metadata(&expected).unwrap().len(), 1024);
        assert!(mapping.is_creator());
        assert_eq!(mapping.max_payload(), 1024 - FRAME_HEADER_SIZE);
        // Freshly created regions are zeroed.
        assert_eq!(mapping.read_header().unwrap(), FrameHeader::default());
    }

    #[test]
    fn opener_sees_creator_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let mut writer = FrameMapping::create_with_config("pipe", 4096, &config).unwrap();
        let reader = FrameMapping::open_with_config("pipe", 4096, &config).unwrap();
        assert!(!reader.is_creator());

        let payload: Vec<u8> = (0..64u8).collect();
        writer
            .write_frame(&rgba_header(4, 4, 7), &payload)
            .unwrap();

        let mut out = vec![0u8; 4096];
        let header = reader.read_frame(&mut out).unwrap();
        assert_eq!(header.sequence, 7);
        assert_eq!(header.pixel_format(), Some(PixelFormat::Rgba));
        assert_eq!(&out[..64], payload.as_slice());
    }

    #[test]
    fn oversize_frame_is_rejected_and_slot_kept() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let capacity = FRAME_HEADER_SIZE + 16;
        let mut writer = FrameMapping::create_with_config("small", capacity, &config).unwrap();
        writer.write_frame(&rgba_header(2, 2, 1), &[9u8; 16]).unwrap();

        let err = writer
            .write_frame(&rgba_header(3, 3, 2), &[0u8; 36])
            .unwrap_err();
        assert!(matches!(err, ShmError::FrameTooLarge { size: 36, max: 16 }));

        let mut out = [0u8; 16];
        let header = writer.read_frame(&mut out).unwrap();
        assert_eq!(header.sequence, 1);
        assert_eq!(out, [9u8; 16]);
    }

    #[test]
    fn creator_destroy_removes_file_opener_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let path = dir.path().join("scrcpy_life.map");

        let mut writer = FrameMapping::create_with_config("life", 256, &config).unwrap();
        let reader = FrameMapping::open_with_config("life", 256, &config).unwrap();

        reader.destroy().unwrap();
        assert!(path.exists(), "opener must leave the backing store intact");

        // The creator keeps publishing after an opener went away.
        writer
            .write_frame(&rgba_header(2, 1, 5), &[7u8; 8])
            .unwrap();
        let mut own = [0u8; 8];
        assert_eq!(writer.read_frame(&mut own).unwrap().sequence, 5);
        assert_eq!(own, [7u8; 8]);

        let late = FrameMapping::open_with_config("life", 256, &config).unwrap();
        let mut seen = [0u8; 8];
        let header = late.read_frame(&mut seen).unwrap();
        assert_eq!(header, rgba_header(2, 1, 5));
        assert_eq!(seen, [7u8; 8]);
        drop(late);

        writer.destroy().unwrap();
        assert!(!path.exists(), "creator must remove the backing store");
    }

    #[test]
    fn drop_removes_creator_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrcpy_dropped.map");
        {
            let _writer =
                FrameMapping::create_with_config("dropped", 128, &file_config(&dir)).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn replaced_file_is_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrcpy_swap.map");
        let writer = FrameMapping::create_with_config("swap", 128, &file_config(&dir)).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"someone else").unwrap();

        writer.destroy().unwrap();
        assert!(path.exists(), "cleanup must skip a file it did not create");
    }

    #[test]
    fn open_checks_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let _writer = FrameMapping::create_with_config("sized", 128, &config).unwrap();

        let err = FrameMapping::open_with_config("sized", 256, &config).unwrap_err();
        assert!(matches!(
            err,
            ShmError::SizeMismatch {
                actual: 128,
                required: 256,
                ..
            }
        ));
    }

    #[test]
    fn open_missing_mapping_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrameMapping::open_with_config("absent", 128, &file_config(&dir)).unwrap_err();
        assert!(matches!(err, ShmError::Open { .. }));
    }

    #[test]
    fn capacity_must_hold_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrameMapping::create_with_config("tiny", 10, &file_config(&dir)).unwrap_err();
        assert!(matches!(err, ShmError::CapacityTooSmall { capacity: 10, .. }));
    }

    // Large enough that sizing or mapping fails after the store was created.
    #[cfg(target_pointer_width = "64")]
    const UNMAPPABLE: usize = 1 << 62;

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn failed_create_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrameMapping::create_with_config("leak", UNMAPPABLE, &file_config(&dir))
            .unwrap_err();
        assert!(matches!(
            err,
            ShmError::Create { .. } | ShmError::Map { .. }
        ));
        assert!(!dir.path().join("scrcpy_leak.map").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn failed_create_leaves_no_shared_memory_object() {
        let name = format!("mirrorlink-leak-{}", std::process::id());
        let config = MappingConfig::default().with_kind(BackingKind::SharedMemory);

        let err = FrameMapping::create_with_config(&name, UNMAPPABLE, &config).unwrap_err();
        assert!(matches!(
            err,
            ShmError::Create { .. } | ShmError::Map { .. }
        ));
        assert!(!std::path::Path::new("/dev/shm").join(&name).exists());
        assert!(matches!(
            FrameMapping::open_with_config(&name, 512, &config),
            Err(ShmError::Open { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn shared_memory_backing_round_trips() {
        let name = format!("mirrorlink-test-{}", std::process::id());
        let config = MappingConfig::default().with_kind(BackingKind::SharedMemory);

        let mut writer = FrameMapping::create_with_config(&name, 512, &config).unwrap();
        let reader = FrameMapping::open_with_config(&name, 512, &config).unwrap();

        writer.write_frame(&rgba_header(1, 1, 3), &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(reader.read_frame(&mut out).unwrap().sequence, 3);
        assert_eq!(out, [1, 2, 3, 4]);

        drop(reader);
        writer.destroy().unwrap();
        assert!(FrameMapping::open_with_config(&name, 512, &config).is_err());
    }
}
