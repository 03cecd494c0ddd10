//! Anvil region file: a 32x32 chunk sector container with an offset table,
//! timestamps, and per-chunk compression.
//!
//! Shaped like a synchronous `ChunkReader`/`ChunkWriter` over
//! `std::fs::File` rather than an async rewrite; this crate's concurrency
//! model is blocking throughout, matching that shape.

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use voxel_nbt::Nbt;
use voxel_nbt::deserializer::ReadAdaptor;

use crate::cancel::CancellationToken;
use crate::chunk::RawChunk;
use crate::error::{CompressionError, VoxelError, VoxelResult};

/// Side length of a region, in chunks.
pub const REGION_SIZE: usize = 32;
/// Chunk slots held by one region file.
pub const CHUNK_COUNT: usize = REGION_SIZE * REGION_SIZE;
/// Bytes in one sector.
pub const SECTOR_BYTES: u64 = 4096;
/// The header (location + timestamp tables) occupies the first two sectors,
/// which are never freed.
pub const HEADER_SECTORS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Compression {
    GZip = 1,
    ZLib = 2,
    Uncompressed = 3,
    Lz4 = 4,
}

impl Compression {
    fn from_byte(byte: u8) -> VoxelResult<Self> {
        match byte {
            1 => Ok(Self::GZip),
            2 => Ok(Self::ZLib),
            3 => Ok(Self::Uncompressed),
            4 => Ok(Self::Lz4),
            other => Err(VoxelError::CorruptRegionHeader(format!(
                "unknown compression id {other}"
            ))),
        }
    }

    fn decompress(self, data: &[u8]) -> VoxelResult<Vec<u8>> {
        match self {
            Self::GZip => {
                let mut decoder = flate2::read::GzDecoder::new(data);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(CompressionError::GZip)?;
                Ok(out)
            }
            Self::ZLib => {
                let mut decoder = flate2::read::ZlibDecoder::new(data);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(CompressionError::ZLib)?;
                Ok(out)
            }
            Self::Uncompressed => Ok(data.to_vec()),
            Self::Lz4 => decompress_lz4(data),
        }
    }

    fn compress(self, data: &[u8], level: u32) -> VoxelResult<Vec<u8>> {
        match self {
            Self::GZip => {
                let mut encoder =
                    flate2::read::GzEncoder::new(data, flate2::Compression::new(level));
                let mut out = Vec::new();
                encoder
                    .read_to_end(&mut out)
                    .map_err(CompressionError::GZip)?;
                Ok(out)
            }
            Self::ZLib => {
                let mut encoder =
                    flate2::read::ZlibEncoder::new(data, flate2::Compression::new(level));
                let mut out = Vec::new();
                encoder
                    .read_to_end(&mut out)
                    .map_err(CompressionError::ZLib)?;
                Ok(out)
            }
            Self::Uncompressed => Ok(data.to_vec()),
            Self::Lz4 => compress_lz4(data, level),
        }
    }
}

#[cfg(feature = "lz4")]
fn decompress_lz4(data: &[u8]) -> VoxelResult<Vec<u8>> {
    let mut decoder = lz4::Decoder::new(data).map_err(CompressionError::Lz4)?;
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CompressionError::Lz4)?;
    Ok(out)
}

#[cfg(not(feature = "lz4"))]
fn decompress_lz4(_data: &[u8]) -> VoxelResult<Vec<u8>> {
    Err(CompressionError::UnknownCompression.into())
}

#[cfg(feature = "lz4")]
fn compress_lz4(data: &[u8], level: u32) -> VoxelResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = lz4::EncoderBuilder::new()
        .level(level)
        .build(&mut out)
        .map_err(CompressionError::Lz4)?;
    encoder.write_all(data).map_err(CompressionError::Lz4)?;
    let (_, result) = encoder.finish();
    result.map_err(CompressionError::Lz4)?;
    Ok(out)
}

#[cfg(not(feature = "lz4"))]
fn compress_lz4(_data: &[u8], _level: u32) -> VoxelResult<Vec<u8>> {
    Err(CompressionError::UnknownCompression.into())
}

/// Per-region settings: which compression scheme new writes use, and at
/// what level. Grounded on `pumpkin-config`'s advanced chunk-compression
/// settings, reshaped into a plain caller-supplied struct since this is a
/// library, not an application with a config singleton.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RegionConfig {
    pub compression: Compression,
    pub compression_level: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            compression: Compression::ZLib,
            compression_level: 6,
        }
    }
}

/// A sparse 32x32 chunk store backed by one `.mca`-style file.
///
/// Owns an in-process reader/writer lock guarding the file: mutating
/// operations take it exclusively, reads take it shared, so a header+sector
/// read pair can never tear against a concurrent write.
pub struct AnvilRegion {
    path: PathBuf,
    lock: RwLock<()>,
    config: RegionConfig,
    /// Set once a corruption error (malformed header, undecodable payload)
    /// is observed. Corruption marks the region read-only rather than
    /// letting later operations retry against data already known to be
    /// broken.
    poisoned: Cell<bool>,
}

impl AnvilRegion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, RegionConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: RegionConfig) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
            config,
            poisoned: Cell::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this region was poisoned by a prior corruption error and is
    /// now read-only.
    pub fn is_read_only(&self) -> bool {
        self.poisoned.get()
    }

    fn check_not_poisoned(&self) -> VoxelResult<()> {
        if self.poisoned.get() {
            return Err(VoxelError::CorruptRegionHeader(
                "region is read-only after a prior corruption error".to_string(),
            ));
        }
        Ok(())
    }

    fn poison(&self, err: VoxelError) -> VoxelError {
        if matches!(err, VoxelError::CorruptRegionHeader(_)) {
            self.poisoned.set(true);
        }
        err
    }

    fn open_read(&self) -> VoxelResult<Option<File>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn open_write(&self) -> VoxelResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }

    #[inline]
    fn slot_index(lx: u8, lz: u8) -> VoxelResult<usize> {
        if lx as usize >= REGION_SIZE || lz as usize >= REGION_SIZE {
            return Err(VoxelError::InvalidArgument(format!(
                "local chunk coordinate ({lx}, {lz}) is outside [0, 32)"
            )));
        }
        Ok(lx as usize + REGION_SIZE * lz as usize)
    }

    fn read_header(file: &mut File) -> VoxelResult<([u8; 4096], [u8; 4096])> {
        let mut locations = [0u8; 4096];
        let mut timestamps = [0u8; 4096];
        let len = file.metadata()?.len();
        if len >= 2 * SECTOR_BYTES {
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut locations)?;
            file.read_exact(&mut timestamps)?;
        } else if len != 0 {
            return Err(VoxelError::CorruptRegionHeader(format!(
                "region file shorter than one header ({len} bytes)"
            )));
        }
        Ok((locations, timestamps))
    }

    fn location_entry(locations: &[u8; 4096], slot: usize) -> (u32, u8) {
        let i = slot * 4;
        let offset = u32::from_be_bytes([0, locations[i], locations[i + 1], locations[i + 2]]);
        (offset, locations[i + 3])
    }

    fn write_location_entry(locations: &mut [u8; 4096], slot: usize, offset_sector: u32, sector_count: u8) {
        let i = slot * 4;
        locations[i] = (offset_sector >> 16) as u8;
        locations[i + 1] = (offset_sector >> 8) as u8;
        locations[i + 2] = offset_sector as u8;
        locations[i + 3] = sector_count;
    }

    fn write_timestamp_entry(timestamps: &mut [u8; 4096], slot: usize, epoch_secs: u32) {
        let i = slot * 4;
        timestamps[i..i + 4].copy_from_slice(&epoch_secs.to_be_bytes());
    }

    pub fn has_chunk(&self, lx: u8, lz: u8) -> VoxelResult<bool> {
        self.check_not_poisoned()?;
        let slot = Self::slot_index(lx, lz)?;
        let _guard = self.lock.read().unwrap();
        let Some(mut file) = self.open_read()? else {
            return Ok(false);
        };
        let (locations, _) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;
        let (offset, count) = Self::location_entry(&locations, slot);
        Ok(offset != 0 && count != 0)
    }

    pub fn get_chunk(&self, lx: u8, lz: u8) -> VoxelResult<RawChunk> {
        self.get_chunk_cancellable(lx, lz, &CancellationToken::new())
    }

    pub fn get_chunk_cancellable(
        &self,
        lx: u8,
        lz: u8,
        cancel: &CancellationToken,
    ) -> VoxelResult<RawChunk> {
        self.check_not_poisoned()?;
        let slot = Self::slot_index(lx, lz)?;
        cancel.check()?;
        let _guard = self.lock.read().unwrap();
        let Some(mut file) = self.open_read()? else {
            return Err(VoxelError::RegionDoesNotExist);
        };

        let (locations, _) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;
        let (offset_sector, sector_count) = Self::location_entry(&locations, slot);
        if offset_sector == 0 && sector_count == 0 {
            return Err(VoxelError::ChunkDoesNotExist);
        }

        file.seek(SeekFrom::Start(offset_sector as u64 * SECTOR_BYTES))?;
        let mut frame_header = [0u8; 5];
        file.read_exact(&mut frame_header)?;
        let length = u32::from_be_bytes(frame_header[0..4].try_into().unwrap()) as usize;
        if length == 0 {
            return Err(self.poison(VoxelError::CorruptRegionHeader(
                "chunk frame has zero length".to_string(),
            )));
        }
        let compression = Compression::from_byte(frame_header[4]).map_err(|e| self.poison(e))?;

        let mut payload = vec![0u8; length - 1];
        file.read_exact(&mut payload)?;
        cancel.check()?;

        let decompressed = compression.decompress(&payload)?;
        let mut reader = ReadAdaptor::new(decompressed.as_slice());
        let nbt = Nbt::read_unnamed(&mut reader)
            .map_err(|e| self.poison(VoxelError::CorruptRegionHeader(e.to_string())))?;

        Ok(RawChunk::from_root(nbt.root_tag))
    }

    pub fn set_chunk(&self, lx: u8, lz: u8, chunk: &RawChunk) -> VoxelResult<()> {
        self.set_chunk_cancellable(lx, lz, chunk, &CancellationToken::new())
    }

    pub fn set_chunk_cancellable(
        &self,
        lx: u8,
        lz: u8,
        chunk: &RawChunk,
        cancel: &CancellationToken,
    ) -> VoxelResult<()> {
        self.check_not_poisoned()?;
        let slot = Self::slot_index(lx, lz)?;
        let compound = chunk
            .root()
            .cloned()
            .ok_or_else(|| VoxelError::InvalidArgument("RawChunk has no root compound".to_string()))?;

        cancel.check()?;
        let _guard = self.lock.write().unwrap();
        let mut file = self.open_write()?;
        let (mut locations, mut timestamps) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;

        let raw_bytes = Nbt::from(compound).write_unnamed();
        let compressed = self
            .config
            .compression
            .compress(&raw_bytes, self.config.compression_level)?;
        cancel.check()?;

        // [len:u32][compression:u8][data]; len counts the compression byte + data.
        let body_len = compressed.len() as u32 + 1;
        let mut frame = Vec::with_capacity(4 + body_len as usize);
        frame.extend_from_slice(&body_len.to_be_bytes());
        frame.push(self.config.compression as u8);
        frame.extend_from_slice(&compressed);

        let sector_count = (frame.len() as u64).div_ceil(SECTOR_BYTES) as u8;
        if sector_count == 0 {
            return Err(VoxelError::InvalidArgument(
                "encoded chunk frame must occupy at least one sector".to_string(),
            ));
        }

        let (existing_offset, existing_count) = Self::location_entry(&locations, slot);
        let offset_sector = if existing_offset != 0 && existing_count >= sector_count {
            existing_offset
        } else {
            Self::find_free_sector(&locations, sector_count as usize)
        };

        Self::write_location_entry(&mut locations, slot, offset_sector, sector_count);
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        Self::write_timestamp_entry(&mut timestamps, slot, epoch);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&locations)?;
        file.write_all(&timestamps)?;

        file.seek(SeekFrom::Start(offset_sector as u64 * SECTOR_BYTES))?;
        file.write_all(&frame)?;
        let padding = sector_count as u64 * SECTOR_BYTES - frame.len() as u64;
        if padding > 0 {
            file.write_all(&vec![0u8; padding as usize])?;
        }
        file.flush()?;

        Ok(())
    }

    pub fn delete_chunk(&self, lx: u8, lz: u8) -> VoxelResult<()> {
        self.check_not_poisoned()?;
        let slot = Self::slot_index(lx, lz)?;
        let _guard = self.lock.write().unwrap();
        let Some(mut file) = self.open_read_write_if_exists()? else {
            // Nothing to delete; deleting from an absent region is a no-op,
            // not an error, since there is no state to reconcile.
            return Ok(());
        };

        let (mut locations, mut timestamps) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;
        Self::write_location_entry(&mut locations, slot, 0, 0);
        Self::write_timestamp_entry(&mut timestamps, slot, 0);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&locations)?;
        file.write_all(&timestamps)?;
        file.flush()?;
        Ok(())
    }

    fn open_read_write_if_exists(&self) -> VoxelResult<Option<File>> {
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn all_coords(&self) -> VoxelResult<Vec<(u8, u8)>> {
        self.check_not_poisoned()?;
        let _guard = self.lock.read().unwrap();
        let Some(mut file) = self.open_read()? else {
            return Ok(Vec::new());
        };
        let (locations, _) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;
        let mut coords = Vec::new();
        for slot in 0..CHUNK_COUNT {
            let (offset, count) = Self::location_entry(&locations, slot);
            if offset != 0 && count != 0 {
                let lx = (slot % REGION_SIZE) as u8;
                let lz = (slot / REGION_SIZE) as u8;
                coords.push((lx, lz));
            }
        }
        Ok(coords)
    }

    /// Defragments sector allocations: live slots are repacked contiguously
    /// from sector 2 onward, in ascending order of their current offset, and
    /// the file is truncated to the new end. `find_free_sector` only ever
    /// grows the file, so this is the reclamation pass that walks live slots
    /// in on-disk order and rewrites them back-to-back.
    pub fn compact(&self) -> VoxelResult<()> {
        self.check_not_poisoned()?;
        let _guard = self.lock.write().unwrap();
        let Some(mut file) = self.open_read_write_if_exists()? else {
            return Ok(());
        };
        let (mut locations, timestamps) = Self::read_header(&mut file).map_err(|e| self.poison(e))?;

        let mut slots: Vec<(usize, u32, u8)> = (0..CHUNK_COUNT)
            .filter_map(|slot| {
                let (offset, count) = Self::location_entry(&locations, slot);
                (offset != 0 && count != 0).then_some((slot, offset, count))
            })
            .collect();
        slots.sort_by_key(|&(_, offset, _)| offset);

        let mut bodies = Vec::with_capacity(slots.len());
        for &(_, offset, count) in &slots {
            file.seek(SeekFrom::Start(offset as u64 * SECTOR_BYTES))?;
            let mut buf = vec![0u8; count as usize * SECTOR_BYTES as usize];
            file.read_exact(&mut buf)?;
            bodies.push(buf);
        }

        let mut cursor = HEADER_SECTORS;
        for ((slot, _, count), body) in slots.iter().zip(bodies.iter()) {
            Self::write_location_entry(&mut locations, *slot, cursor, *count);
            file.seek(SeekFrom::Start(cursor as u64 * SECTOR_BYTES))?;
            file.write_all(body)?;
            cursor += *count as u32;
        }

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&locations)?;
        file.write_all(&timestamps)?;
        file.set_len(cursor as u64 * SECTOR_BYTES)?;
        file.flush()?;
        Ok(())
    }

    /// Scans the location table for the first run of `needed` contiguous
    /// free sectors at or after sector 2, the header's permanent reservation.
    fn find_free_sector(locations: &[u8; 4096], needed: usize) -> u32 {
        let mut occupied: Vec<(u32, u32)> = vec![(0, HEADER_SECTORS)];
        for slot in 0..CHUNK_COUNT {
            let (offset, count) = Self::location_entry(locations, slot);
            if offset != 0 && count != 0 {
                occupied.push((offset, offset + count as u32));
            }
        }
        occupied.sort_unstable();

        let mut candidate = HEADER_SECTORS;
        for (start, end) in occupied {
            if candidate + needed as u32 <= start {
                return candidate;
            }
            candidate = candidate.max(end);
        }
        candidate
    }
}
