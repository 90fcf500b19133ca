//! Cursors over one or more volumes.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use super::{ReadAt, Volume};

/// A `Read + Seek` cursor over a single volume.
///
/// Each cursor owns its position, so several can share one volume.
pub struct VolumeReader {
    source: Arc<dyn ReadAt>,
    size: u64,
    position: u64,
}

impl VolumeReader {
    /// Creates a cursor at the start of `volume`.
    pub fn new(volume: &Volume) -> Self {
        Self {
            source: Arc::clone(volume.source()),
            size: volume.size(),
            position: 0,
        }
    }

    /// Returns the declared size of the volume.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the volume is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Read for VolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.size {
            return Ok(0);
        }
        let remaining = self.size - self.position;
        let to_read = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.source.read_at(&mut buf[..to_read], self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for VolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(pos, self.position, self.size)?;
        Ok(self.position)
    }
}

impl std::fmt::Debug for VolumeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeReader")
            .field("size", &self.size)
            .field("position", &self.position)
            .finish()
    }
}

/// A reader that presents split volumes as one continuous byte range.
///
/// Logical offsets map to (volume, offset) by cumulative declared sizes, so
/// formats addressed as one address space (7-Zip split archives) can be
/// decoded without joining the parts first.
///
/// # Example
///
/// ```rust
/// use arcfs::volume::{MultiVolumeReader, Volume};
/// use std::io::{Read, Seek, SeekFrom};
///
/// let parts = vec![
///     Volume::from_bytes("a.7z.001", vec![1, 2, 3]),
///     Volume::from_bytes("a.7z.002", vec![4, 5]),
/// ];
/// let mut reader = MultiVolumeReader::new(&parts);
/// reader.seek(SeekFrom::Start(2)).unwrap();
/// let mut buf = [0u8; 2];
/// reader.read_exact(&mut buf).unwrap();
/// assert_eq!(buf, [3, 4]);
/// ```
pub struct MultiVolumeReader {
    /// Volume sources in part order.
    volumes: Vec<Arc<dyn ReadAt>>,
    /// Size of each volume in bytes.
    volume_sizes: Vec<u64>,
    /// Current position in the logical stream.
    position: u64,
    /// Total size across all volumes.
    total_size: u64,
}

impl MultiVolumeReader {
    /// Joins `volumes` in slice order.
    pub fn new(volumes: &[Volume]) -> Self {
        let volume_sizes: Vec<u64> = volumes.iter().map(Volume::size).collect();
        Self {
            volumes: volumes.iter().map(|v| Arc::clone(v.source())).collect(),
            total_size: volume_sizes.iter().sum(),
            volume_sizes,
            position: 0,
        }
    }

    /// Returns the total number of volumes.
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Returns the sizes of all volumes in bytes.
    pub fn volume_sizes(&self) -> &[u64] {
        &self.volume_sizes
    }

    /// Returns the total logical size across all volumes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Returns the current volume number (1-indexed).
    pub fn current_volume(&self) -> usize {
        self.position_to_volume(self.position).0 + 1
    }

    /// Calculates volume index and offset for a logical position.
    fn position_to_volume(&self, pos: u64) -> (usize, u64) {
        let mut remaining = pos;
        for (i, &size) in self.volume_sizes.iter().enumerate() {
            if remaining < size {
                return (i, remaining);
            }
            remaining -= size;
        }
        // Position is at or beyond end
        let last = self.volume_sizes.len().saturating_sub(1);
        (last, self.volume_sizes.get(last).copied().unwrap_or(0))
    }
}

impl ReadAt for MultiVolumeReader {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut total_read = 0;
        let mut logical = offset;

        while total_read < buf.len() && logical < self.total_size {
            let (index, volume_offset) = self.position_to_volume(logical);
            let remaining_in_volume = self.volume_sizes[index] - volume_offset;
            if remaining_in_volume == 0 {
                break;
            }
            let to_read = (buf.len() - total_read)
                .min(usize::try_from(remaining_in_volume).unwrap_or(usize::MAX));
            let n = self.volumes[index]
                .read_at(&mut buf[total_read..total_read + to_read], volume_offset)?;
            if n == 0 {
                // Volume shorter than its declared size
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("volume {} ended early", index + 1),
                ));
            }
            total_read += n;
            logical += n as u64;
        }

        Ok(total_read)
    }
}

impl Read for MultiVolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for MultiVolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(pos, self.position, self.total_size)?;
        Ok(self.position)
    }
}

impl std::fmt::Debug for MultiVolumeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiVolumeReader")
            .field("volume_count", &self.volumes.len())
            .field("total_size", &self.total_size)
            .field("position", &self.position)
            .field("current_volume", &self.current_volume())
            .finish()
    }
}

/// Applies a seek to `current` within `0..=size`.
fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> io::Result<u64> {
    let new_pos = match pos {
        SeekFrom::Start(p) => i128::from(p),
        SeekFrom::End(p) => i128::from(size) + i128::from(p),
        SeekFrom::Current(p) => i128::from(current) + i128::from(p),
    };

    if new_pos < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Cannot seek before start of stream",
        ));
    }

    Ok(u64::try_from(new_pos).unwrap_or(u64::MAX).min(size))
}
