use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{FabricError, Result};
use crate::event::LedgerEvent;

/// A single journaled event.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LedgerEvent)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    pub event: LedgerEvent,
}

/// Flush/sync strategy for the journal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every write.
    #[default]
    EveryWrite,
    /// Flush to the OS page cache only.
    OsDefault,
}

#[derive(Clone, Debug, Default)]
pub struct WalConfig {
    /// When appended frames are forced to stable storage.
    pub sync_mode: SyncMode,
}

const HEADER_SIZE: u64 = 8;

/// Largest payload a frame may declare. A header claiming more than this
/// cannot come from an unfinished append.
pub const MAX_ENTRY_BYTES: u32 = 16 * 1024 * 1024;

struct WalWriter {
    /// Buffered handle opened in append mode.
    writer: BufWriter<File>,
    /// File length after the last committed frame.
    offset: u64,
    /// Set when a failed append could not be rolled back.
    failed: bool,
}

impl WalWriter {
    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        if sync_mode == SyncMode::EveryWrite {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Drop buffered bytes and cut the file back to the last committed frame.
    fn rollback(&mut self) -> io::Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // `into_parts` hands back the buffer without flushing it.
        let (_file, _unwritten) = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.offset)?;
        file.sync_data()
    }
}

/// How a front-to-back scan of the journal ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEnd {
    /// The file ends exactly on a frame boundary.
    Clean,
    /// The file ends inside a frame that was still being appended.
    TornTail { bytes: u64 },
    /// A frame header that no unfinished append could have produced.
    /// Everything from `offset` on is unreadable.
    Corrupted { offset: u64, reason: String },
}

/// A complete frame the scan had to skip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DamagedFrame {
    /// Byte offset of the frame header.
    pub offset: u64,
    /// Number of good entries that precede this frame.
    pub preceding_entries: usize,
    pub reason: String,
}

/// Everything a read-only scan learned about a journal file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalScan {
    pub entries: Vec<WalEntry>,
    pub damaged: Vec<DamagedFrame>,
    /// Byte length of the prefix that ends on a frame boundary.
    pub valid_len: u64,
    pub end: ScanEnd,
}

/// Crash-recoverable, append-only event journal.
///
/// Entries are bincode-serialized and framed with a length prefix and CRC32.
/// On open, a torn tail left by a crash mid-append is cut off so new appends
/// start on a frame boundary. A header that cannot be a torn tail (an
/// oversized length, or one that runs over complete frames) makes `open`
/// fail and leaves the file alone. Complete entries whose CRC fails are skipped with a
/// warning.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open (or create) the journal file, repairing a torn tail if present.
    pub fn open(path: &Path, config: WalConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let scan = Self::scan(path)?;
        match scan.end {
            ScanEnd::Clean => {}
            ScanEnd::TornTail { bytes } => {
                warn!(
                    path = %path.display(),
                    file_len,
                    valid_len = scan.valid_len,
                    torn_bytes = bytes,
                    "cutting torn journal tail"
                );
                file.set_len(scan.valid_len)?;
                file.sync_all()?;
            }
            ScanEnd::Corrupted { offset, reason } => {
                return Err(FabricError::Corrupted { offset, reason });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                writer: BufWriter::new(file),
                offset: scan.valid_len,
                failed: false,
            }),
            config,
        })
    }

    /// Scan a journal without opening it for writing. The file is never
    /// modified; a missing file reads as an empty journal.
    pub fn read_entries(path: &Path) -> Result<JournalScan> {
        if !path.exists() {
            return Ok(JournalScan {
                entries: Vec::new(),
                damaged: Vec::new(),
                valid_len: 0,
                end: ScanEnd::Clean,
            });
        }
        Self::scan(path)
    }

    /// Append a single entry. Returns the byte offset it was written at.
    ///
    /// A failed write is rolled back to the previous frame boundary. If the
    /// rollback itself fails, the journal refuses all further appends.
    pub fn append(&self, entry: &WalEntry) -> Result<u64> {
        let payload = bincode::serialize(&entry.event)
            .map_err(|e| FabricError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_ENTRY_BYTES)
            .ok_or_else(|| {
                FabricError::Serialization(format!(
                    "journal entry of {} bytes exceeds {MAX_ENTRY_BYTES}",
                    payload.len()
                ))
            })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| FabricError::LockPoisoned)?;
        if w.failed {
            return Err(FabricError::JournalFailed);
        }
        let entry_offset = w.offset;

        if let Err(e) = w.write_frame(&frame, self.config.sync_mode) {
            warn!(offset = entry_offset, error = %e, "journal append failed; rolling back");
            if let Err(rollback) = w.rollback() {
                error!(offset = entry_offset, error = %rollback, "journal rollback failed");
                w.failed = true;
            }
            return Err(e.into());
        }

        w.offset += HEADER_SIZE + u64::from(length);

        debug!(
            offset = entry_offset,
            len = payload.len(),
            seq = entry.event.seq,
            "journal append"
        );
        Ok(entry_offset)
    }

    /// Read every valid entry in append order.
    pub fn recover(&self) -> Result<Vec<WalEntry>> {
        // Hold the writer lock so a concurrent append is never half-read.
        let _guard = self.writer.lock().map_err(|_| FabricError::LockPoisoned)?;
        let scan = Self::scan(&self.path)?;
        if let ScanEnd::Corrupted { offset, reason } = scan.end {
            return Err(FabricError::Corrupted { offset, reason });
        }
        debug!(recovered = scan.entries.len(), "journal recovery complete");
        Ok(scan.entries)
    }

    /// Current write offset.
    pub fn offset(&self) -> Result<u64> {
        Ok(self.writer.lock().map_err(|_| FabricError::LockPoisoned)?.offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan(path: &Path) -> Result<JournalScan> {
        let mut file = BufReader::new(File::open(path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut entries = Vec::new();
        let mut damaged = Vec::new();
        let mut offset: u64 = 0;

        let end = loop {
            let remaining = file_len - offset;
            if remaining == 0 {
                break ScanEnd::Clean;
            }
            if remaining < HEADER_SIZE {
                break ScanEnd::TornTail { bytes: remaining };
            }

            file.seek(SeekFrom::Start(offset))?;
            let mut header = [0u8; HEADER_SIZE as usize];
            file.read_exact(&mut header)?;

            let (length, expected_crc) = split_header(&header);
            let frame_end = offset + HEADER_SIZE + u64::from(length);

            if length == 0 {
                // A crash can leave zero-filled blocks past the last frame.
                if expected_crc == 0 && Self::rest_is_zeroed(&mut file)? {
                    break ScanEnd::TornTail { bytes: remaining };
                }
                break ScanEnd::Corrupted {
                    offset,
                    reason: "zero-length frame followed by data".into(),
                };
            }
            if length > MAX_ENTRY_BYTES {
                break ScanEnd::Corrupted {
                    offset,
                    reason: format!("frame declares {length} bytes, limit is {MAX_ENTRY_BYTES}"),
                };
            }
            if frame_end > file_len {
                // Bounded by MAX_ENTRY_BYTES: the frame runs past the end.
                let mut rest = header.to_vec();
                file.read_to_end(&mut rest)?;
                if let Some(at) = find_frame(&rest[1..]) {
                    break ScanEnd::Corrupted {
                        offset,
                        reason: format!(
                            "frame declares {length} bytes past end of file, \
                             but a complete frame starts at offset {}",
                            offset + 1 + at as u64
                        ),
                    };
                }
                warn!(offset, length, file_len, "incomplete journal entry at end of file");
                break ScanEnd::TornTail { bytes: remaining };
            }

            let mut payload = vec![0u8; length as usize];
            file.read_exact(&mut payload)?;

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "journal CRC mismatch; skipping entry"
                );
                damaged.push(DamagedFrame {
                    offset,
                    preceding_entries: entries.len(),
                    reason: format!(
                        "CRC mismatch: stored {expected_crc:08x}, computed {actual_crc:08x}"
                    ),
                });
                offset = frame_end;
                continue;
            }

            match bincode::deserialize::<LedgerEvent>(&payload) {
                Ok(event) => entries.push(WalEntry { event }),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable journal entry; skipping");
                    damaged.push(DamagedFrame {
                        offset,
                        preceding_entries: entries.len(),
                        reason: format!("undecodable entry: {e}"),
                    });
                }
            }

            offset = frame_end;
        };

        Ok(JournalScan {
            entries,
            damaged,
            valid_len: offset,
            end,
        })
    }

    fn rest_is_zeroed(file: &mut BufReader<File>) -> Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            match file.read(&mut chunk)? {
                0 => return Ok(true),
                n if chunk[..n].iter().any(|b| *b != 0) => return Ok(false),
                _ => {}
            }
        }
    }
}

fn split_header(header: &[u8; HEADER_SIZE as usize]) -> (u32, u32) {
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (length, crc)
}

/// Position of the first complete, decodable frame in `bytes`, if any.
fn find_frame(bytes: &[u8]) -> Option<usize> {
    (0..bytes.len()).find(|&at| {
        let Some(header) = bytes[at..].get(..HEADER_SIZE as usize) else {
            return false;
        };
        let mut fixed = [0u8; HEADER_SIZE as usize];
        fixed.copy_from_slice(header);
        let (length, crc) = split_header(&fixed);
        if length == 0 {
            return false;
        }
        let start = at + HEADER_SIZE as usize;
        bytes
            .get(start..start + length as usize)
            .is_some_and(|payload| {
                crc32fast::hash(payload) == crc
                    && bincode::deserialize::<LedgerEvent>(payload).is_ok()
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use streetsource_types::{CallerId, TemporalAnchor};

    fn make_entry(seq: u64) -> WalEntry {
        WalEntry {
            event: LedgerEvent::new(
                seq,
                TemporalAnchor::new(1000 + seq, 0, 1),
                EventPayload::RatingAdded {
                    caller: CallerId::account(format!("vendor-{seq}")),
                    supplier_name: "Green Valley Farms".into(),
                    score: 4,
                    comment: "consistent quality".into(),
                },
            ),
        }
    }

    fn temp_wal(name: &str) -> (tempfile::TempDir, PathBuf, WriteAheadLog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        (dir, path, wal)
    }

    #[test]
    fn appended_entries_are_recovered_in_order() {
        let (_dir, _path, wal) = temp_wal("journal.wal");
        for seq in 1..=3 {
            wal.append(&make_entry(seq)).unwrap();
        }

        let recovered = wal.recover().unwrap();
        assert_eq!(recovered, vec![make_entry(1), make_entry(2), make_entry(3)]);
    }

    #[test]
    fn recover_empty_journal() {
        let (_dir, _path, wal) = temp_wal("empty.wal");
        assert!(wal.recover().unwrap().is_empty());
        assert_eq!(wal.offset().unwrap(), 0);
    }

    #[test]
    fn crc_mismatch_skips_only_the_corrupt_entry() {
        let (_dir, path, wal) = temp_wal("corrupt.wal");
        wal.append(&make_entry(1)).unwrap();
        wal.append(&make_entry(2)).unwrap();
        drop(wal);

        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
            file.write_all(&buf).unwrap();
        }

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![make_entry(2)]);
    }

    #[test]
    fn torn_tail_is_cut_and_appends_continue_cleanly() {
        let (_dir, path, wal) = temp_wal("tail.wal");
        wal.append(&make_entry(1)).unwrap();
        wal.append(&make_entry(2)).unwrap();
        let total_len = wal.offset().unwrap();
        drop(wal);

        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(total_len - 4)
            .unwrap();

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![make_entry(1)]);

        wal.append(&make_entry(2)).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![make_entry(1), make_entry(2)]);
    }

    fn patch_byte(path: &Path, at: u64, value: u8) {
        let mut file = OpenOptions::new().write(true).open(path).unwrap();
        file.seek(SeekFrom::Start(at)).unwrap();
        file.write_all(&[value]).unwrap();
    }

    #[test]
    fn oversized_length_mid_file_refuses_to_open() {
        let (_dir, path, wal) = temp_wal("length.wal");
        for seq in 1..=3 {
            wal.append(&make_entry(seq)).unwrap();
        }
        let total_len = wal.offset().unwrap();
        drop(wal);

        patch_byte(&path, 3, 0x7f);

        let err = WriteAheadLog::open(&path, WalConfig::default()).err().unwrap();
        assert!(matches!(err, FabricError::Corrupted { offset: 0, .. }), "{err}");
        assert_eq!(path.metadata().unwrap().len(), total_len);

        let scan = WriteAheadLog::read_entries(&path).unwrap();
        assert!(scan.entries.is_empty());
        assert!(matches!(scan.end, ScanEnd::Corrupted { offset: 0, .. }));
        assert_eq!(path.metadata().unwrap().len(), total_len);
    }

    #[test]
    fn length_past_eof_with_later_frames_is_not_a_torn_tail() {
        let (_dir, path, wal) = temp_wal("overrun.wal");
        wal.append(&make_entry(1)).unwrap();
        let second = wal.append(&make_entry(2)).unwrap();
        wal.append(&make_entry(3)).unwrap();
        let total_len = wal.offset().unwrap();
        drop(wal);

        // Stretch frame 2 just past the end of the file, within the size cap.
        let stretched = u32::try_from(total_len - second).unwrap();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(second)).unwrap();
        file.write_all(&stretched.to_le_bytes()).unwrap();
        drop(file);

        let err = WriteAheadLog::open(&path, WalConfig::default()).err().unwrap();
        assert!(matches!(err, FabricError::Corrupted { offset, .. } if offset == second));
        assert_eq!(path.metadata().unwrap().len(), total_len);
    }

    #[test]
    fn zero_filled_tail_is_cut() {
        let (_dir, path, wal) = temp_wal("zeros.wal");
        wal.append(&make_entry(1)).unwrap();
        let committed = wal.offset().unwrap();
        drop(wal);

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(committed + 512).unwrap();
        drop(file);

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.offset().unwrap(), committed);
        assert_eq!(wal.recover().unwrap(), vec![make_entry(1)]);
    }

    #[test]
    fn read_entries_reports_damage_without_touching_the_file() {
        let (_dir, path, wal) = temp_wal("readonly.wal");
        wal.append(&make_entry(1)).unwrap();
        wal.append(&make_entry(2)).unwrap();
        let committed = wal.offset().unwrap();
        drop(wal);

        let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let mut first = [0u8; 1];
        file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
        file.read_exact(&mut first).unwrap();
        drop(file);
        patch_byte(&path, HEADER_SIZE, first[0] ^ 0xFF);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        let scan = WriteAheadLog::read_entries(&path).unwrap();
        assert_eq!(scan.entries, vec![make_entry(2)]);
        assert_eq!(scan.damaged.len(), 1);
        assert_eq!(scan.damaged[0].offset, 0);
        assert_eq!(scan.damaged[0].preceding_entries, 0);
        assert_eq!(scan.valid_len, committed);
        assert_eq!(scan.end, ScanEnd::TornTail { bytes: 3 });
        assert_eq!(path.metadata().unwrap().len(), committed + 3);
    }

    #[test]
    fn missing_journal_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.wal");
        let scan = WriteAheadLog::read_entries(&path).unwrap();
        assert!(scan.entries.is_empty());
        assert_eq!(scan.end, ScanEnd::Clean);
        assert!(!path.exists());
    }

    #[test]
    fn rollback_discards_a_partial_frame() {
        let (_dir, path, wal) = temp_wal("rollback.wal");
        wal.append(&make_entry(1)).unwrap();
        let committed = wal.offset().unwrap();

        {
            let mut w = wal.writer.lock().unwrap();
            // Half a frame reaches the file and more sits in the buffer.
            w.writer.write_all(&[0x40, 0, 0, 0, 9, 9]).unwrap();
            w.writer.flush().unwrap();
            w.writer.write_all(&[7; 32]).unwrap();
            w.rollback().unwrap();
        }
        assert_eq!(path.metadata().unwrap().len(), committed);

        wal.append(&make_entry(2)).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![make_entry(1), make_entry(2)]);
        assert_eq!(wal.offset().unwrap(), path.metadata().unwrap().len());

        drop(wal);
        let reopened = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(reopened.recover().unwrap().len(), 2);
    }

    #[test]
    fn failed_journal_refuses_appends() {
        let (_dir, _path, wal) = temp_wal("failed.wal");
        wal.append(&make_entry(1)).unwrap();
        wal.writer.lock().unwrap().failed = true;

        assert!(matches!(
            wal.append(&make_entry(2)),
            Err(FabricError::JournalFailed)
        ));
        assert_eq!(wal.recover().unwrap(), vec![make_entry(1)]);
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let (_dir, _path, wal) = temp_wal("offsets.wal");
        let off1 = wal.append(&make_entry(1)).unwrap();
        let off2 = wal.append(&make_entry(2)).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
        assert_eq!(wal.offset().unwrap(), wal.path().metadata().unwrap().len());
    }

    #[test]
    fn os_default_sync_mode_is_still_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fast.wal");
        let wal = WriteAheadLog::open(
            &path,
            WalConfig {
                sync_mode: SyncMode::OsDefault,
            },
        )
        .unwrap();
        wal.append(&make_entry(1)).unwrap();
        assert_eq!(wal.recover().unwrap().len(), 1);
    }
}
