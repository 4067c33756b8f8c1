use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ::log::{info, warn};

use super::memory::prefix_range;
use super::{KvStore, ScanIter, WriteBatch};
use crate::error::StoreError;

/// Size of the little-endian length header in front of every frame.
const FRAME_HEADER: usize = 4;

/// Durable, log-structured store.
///
/// Every batch is encoded with `postcard` and appended to a single file as
/// one length-framed record. The full key space is kept in memory and rebuilt
/// on open by replaying the file from the start.
///
/// # Invariants
/// - One frame holds exactly one batch, so replay applies a batch whole or
///   not at all.
/// - A frame cut short by a crash can only be the last one; it is dropped
///   and the file truncated back to the last complete frame.
#[derive(Debug)]
pub struct LogStore {
	path: PathBuf,
	file: File,
	entries: BTreeMap<Vec<u8>, Vec<u8>>,
	sync: bool,
}

impl LogStore {
	/// Opens (or creates) the log at `path` and replays it.
	///
	/// # Errors
	/// - `StoreError::Io` if the file cannot be read or truncated.
	/// - `StoreError::Corrupt` if a complete frame fails to decode.
	pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, StoreError> {
		let path = path.as_ref().to_path_buf();
		let mut file = OpenOptions::new().read(true).append(true).create(true).open(&path)?;

		let mut bytes = Vec::new();
		file.read_to_end(&mut bytes)?;

		let mut entries = BTreeMap::new();
		let valid = replay(&bytes, &mut entries)?;
		if valid < bytes.len() {
			warn!(
				"dropping {} bytes of torn batch at the end of {}",
				bytes.len() - valid,
				path.display()
			);
			file.set_len(valid as u64)?;
			file.sync_all()?;
		}

		info!("opened {} with {} keys", path.display(), entries.len());
		Ok(Self { path, file, entries, sync })
	}

	/// Path of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Number of live keys.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Rewrites the log as a single frame holding every live key.
	///
	/// The new log is written next to the old one and renamed over it, so a
	/// crash during compaction leaves the previous log intact.
	pub fn compact(&mut self) -> Result<(), StoreError> {
		let mut batch = WriteBatch::new();
		for (key, value) in &self.entries {
			batch.put(key.clone(), value.clone());
		}

		let tmp_path = self.path.with_extension("compact");
		{
			let mut tmp = File::create(&tmp_path)?;
			if !batch.is_empty() {
				tmp.write_all(&encode_frame(&batch)?)?;
			}
			tmp.sync_all()?;
		}
		fs::rename(&tmp_path, &self.path)?;

		self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
		info!("compacted {} to {} keys", self.path.display(), self.entries.len());
		Ok(())
	}

	fn append(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
		if batch.is_empty() {
			return Ok(());
		}
		let frame = encode_frame(&batch)?;
		self.file.write_all(&frame)?;
		if self.sync {
			self.file.sync_data()?;
		}
		self.entries.extend(batch);
		Ok(())
	}
}

/// Frames a batch: 4-byte little-endian payload length, then the payload.
fn encode_frame(batch: &WriteBatch) -> Result<Vec<u8>, StoreError> {
	let payload = postcard::to_stdvec(batch)?;
	let len = u32::try_from(payload.len()).map_err(|_| StoreError::Corrupt {
		offset: 0,
		reason: format!("batch of {} bytes does not fit in one frame", payload.len()),
	})?;

	let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
	frame.extend_from_slice(&len.to_le_bytes());
	frame.extend_from_slice(&payload);
	Ok(frame)
}

/// Applies every complete frame of `bytes` to `entries`.
///
/// Returns the number of bytes covered by complete frames; anything after
/// that is a torn tail.
fn replay(bytes: &[u8], entries: &mut BTreeMap<Vec<u8>, Vec<u8>>) -> Result<usize, StoreError> {
	let mut offset = 0;
	while bytes.len() - offset >= FRAME_HEADER {
		let mut header = [0u8; FRAME_HEADER];
		header.copy_from_slice(&bytes[offset..offset + FRAME_HEADER]);
		let len = u32::from_le_bytes(header) as usize;

		let start = offset + FRAME_HEADER;
		if bytes.len() - start < len {
			break;
		}

		let batch: WriteBatch = postcard::from_bytes(&bytes[start..start + len]).map_err(|e| {
			StoreError::Corrupt { offset: offset as u64, reason: e.to_string() }
		})?;
		entries.extend(batch);
		offset = start + len;
	}
	Ok(offset)
}

impl KvStore for LogStore {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		Ok(self.entries.get(key).cloned())
	}

	fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		let mut batch = WriteBatch::new();
		batch.put(key, value);
		self.append(batch)
	}

	fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
		self.append(batch)
	}

	fn scan<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError> {
		Ok(prefix_range(&self.entries, prefix))
	}
}
