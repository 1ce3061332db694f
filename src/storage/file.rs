//! File backend - a workbook persisted as a single checksummed file.
//!
//! The [`FileBackend`] lets several processes share one store the way
//! they would share a hosted workbook: every mutating call rewrites the
//! file, and a process that reopens it sees the other's writes.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::common::{BackendError, CellRange, Error, Result, TableId};
use crate::storage::backend::{Grid, RangeUpdate, TabularBackend};
use crate::storage::workbook::Workbook;

/// First line of every workbook file.
const MAGIC: &str = "CASEGRID-WORKBOOK";
const FORMAT_VERSION: u32 = 1;

/// Persists a [`Workbook`] to one file.
///
/// # File Layout
/// ```text
/// CASEGRID-WORKBOOK 1 <crc32 hex>\n
/// { ...workbook JSON... }
/// ```
///
/// The checksum is the CRC32 of the JSON body. A mismatch on open is
/// reported as `Error::Corrupt`.
///
/// # Durability
/// Mutations are written to a sibling temp file, fsynced and renamed
/// over the original, so a crash leaves either the old or the new
/// workbook.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    workbook: Mutex<Workbook>,
}

impl FileBackend {
    /// Create a new workbook file with the given (empty) tables.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P, I>(path: P, tables: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = TableId>,
    {
        let mut workbook = Workbook::new();
        for table in tables {
            workbook.add_sheet(&table);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        file.write_all(&encode(&workbook)?)?;
        file.sync_all()?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            workbook: Mutex::new(workbook),
        })
    }

    /// Open an existing workbook file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable, or fails
    /// its checksum.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut raw = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut raw)?;
        let workbook = decode(&raw)?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            workbook: Mutex::new(workbook),
        })
    }

    /// Open an existing workbook, or create one with `tables`.
    pub fn open_or_create<P, I>(path: P, tables: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = TableId>,
    {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path, tables)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables(&self) -> Vec<TableId> {
        self.workbook.lock().sheet_names()
    }

    /// Apply `op` to a copy of the workbook, persist it, then publish it.
    fn mutate<F>(&self, op: &'static str, table: &TableId, f: F) -> std::result::Result<(), BackendError>
    where
        F: FnOnce(&mut Workbook) -> std::result::Result<(), BackendError>,
    {
        let mut guard = self.workbook.lock();
        let mut next = guard.clone();
        f(&mut next)?;
        self.persist(&next)
            .map_err(|e| BackendError::new(op, table.as_str(), e.to_string()))?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, workbook: &Workbook) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&encode(workbook)?)?;
            file.sync_all()?; // fsync before rename
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn encode(workbook: &Workbook) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(workbook)?;
    let checksum = crc32fast::hash(&body);
    let mut out = format!("{} {} {:08x}\n", MAGIC, FORMAT_VERSION, checksum).into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode(raw: &[u8]) -> Result<Workbook> {
    let newline = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::Corrupt("missing header line".into()))?;
    let header = std::str::from_utf8(&raw[..newline])
        .map_err(|_| Error::Corrupt("header is not UTF-8".into()))?;
    let body = &raw[newline + 1..];

    let mut parts = header.split_whitespace();
    if parts.next() != Some(MAGIC) {
        return Err(Error::Corrupt("not a casegrid workbook".into()));
    }
    match parts.next().and_then(|v| v.parse::<u32>().ok()) {
        Some(FORMAT_VERSION) => {}
        other => return Err(Error::Corrupt(format!("unsupported format version {:?}", other))),
    }
    let expected = parts
        .next()
        .and_then(|c| u32::from_str_radix(c, 16).ok())
        .ok_or_else(|| Error::Corrupt("missing checksum".into()))?;

    let actual = crc32fast::hash(body);
    if actual != expected {
        return Err(Error::Corrupt(format!(
            "checksum mismatch: expected {:08x}, found {:08x}",
            expected, actual
        )));
    }

    Ok(serde_json::from_slice(body)?)
}

impl TabularBackend for FileBackend {
    fn batch_get(&self, table: &TableId, ranges: &[CellRange]) -> std::result::Result<Vec<Grid>, BackendError> {
        self.workbook.lock().get(table, ranges)
    }

    fn batch_write(&self, table: &TableId, writes: &[(CellRange, Grid)]) -> std::result::Result<(), BackendError> {
        self.mutate("batch_write", table, |wb| wb.write(table, writes))
    }

    fn batch_update(&self, table: &TableId, updates: &[RangeUpdate]) -> std::result::Result<(), BackendError> {
        self.mutate("batch_update", table, |wb| wb.update(table, updates))
    }

    fn batch_clear(&self, table: &TableId, ranges: &[CellRange]) -> std::result::Result<(), BackendError> {
        self.mutate("batch_clear", table, |wb| wb.clear(table, ranges))
    }
}
