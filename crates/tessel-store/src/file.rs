//! Byte-range file accessors.
//!
//! A transfer reads or writes its local content through [`FileAccess`] at
//! offsets chosen by the remote side, so accessors are random access and
//! never truncate existing content when (re)opened.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Largest buffer a [`MemFile`] grows to.
pub const MEM_FILE_LIMIT: u64 = 1 << 32;

/// Capability an accessor was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

pub trait FileAccess: std::fmt::Debug + Send {
    fn can_read(&self) -> bool;
    fn can_write(&self) -> bool;

    /// False once the underlying handle hit an unrecoverable error.
    fn is_good(&self) -> bool;

    /// Read exactly `len` bytes at `pos`. A short read is an error.
    fn read_at(&mut self, pos: u64, len: u64) -> io::Result<Vec<u8>>;

    fn write_at(&mut self, pos: u64, data: &[u8]) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FsFile {
    path: PathBuf,
    file: File,
    mode: AccessMode,
    good: bool,
}

impl FsFile {
    pub fn open_read(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file,
            mode: AccessMode::Read,
            good: true,
        })
    }

    /// Open for writing without truncating. The file is created if missing
    /// and grown to `size_hint` if it is shorter.
    pub fn open_write(path: impl AsRef<Path>, size_hint: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if file.metadata()?.len() < size_hint {
            file.set_len(size_hint)?;
        }
        Ok(Self {
            path,
            file,
            mode: AccessMode::Write,
            good: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn track<T>(&mut self, res: io::Result<T>) -> io::Result<T> {
        if res.is_err() {
            self.good = false;
        }
        res
    }
}

impl FileAccess for FsFile {
    fn can_read(&self) -> bool {
        // write handles are opened read+write
        true
    }

    fn can_write(&self) -> bool {
        self.mode == AccessMode::Write
    }

    fn is_good(&self) -> bool {
        self.good
    }

    fn read_at(&mut self, pos: u64, len: u64) -> io::Result<Vec<u8>> {
        let file_len = self.len()?;
        if pos.checked_add(len).map_or(true, |end| end > file_len) {
            return self.track(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of file",
            )));
        }
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "read length too large"))?;
        let res = self.file.seek(SeekFrom::Start(pos)).and_then(|_| {
            let mut buf = vec![0u8; len];
            self.file.read_exact(&mut buf)?;
            Ok(buf)
        });
        self.track(res)
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) -> io::Result<()> {
        if !self.can_write() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened read-only",
            ));
        }
        let res = self
            .file
            .seek(SeekFrom::Start(pos))
            .and_then(|_| self.file.write_all(data));
        self.track(res)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Shared in-memory buffer. Clones of [`MemFile::handle`] observe writes, so
/// callers can hand a sink to a transfer and inspect it afterwards.
#[derive(Debug, Clone)]
pub struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    readable: bool,
    writable: bool,
}

impl MemFile {
    pub fn reader(content: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(content)),
            readable: true,
            writable: false,
        }
    }

    pub fn writer() -> Self {
        Self {
            data: Arc::new(Mutex::new(Vec::new())),
            readable: true,
            writable: true,
        }
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.data)
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.data.lock() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.data
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory file lock poisoned"))
    }
}

impl FileAccess for MemFile {
    fn can_read(&self) -> bool {
        self.readable
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn is_good(&self) -> bool {
        !self.data.is_poisoned()
    }

    fn read_at(&mut self, pos: u64, len: u64) -> io::Result<Vec<u8>> {
        let data = self.lock()?;
        let start = usize::try_from(pos).unwrap_or(usize::MAX);
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| start.checked_add(len))
            .unwrap_or(usize::MAX);
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of memory file",
            ));
        }
        Ok(data[start..end].to_vec())
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory file is read-only",
            ));
        }
        let mut data = self.lock()?;
        let start = usize::try_from(pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let end = start
            .checked_add(bytes.len())
            .filter(|&end| end as u64 <= MEM_FILE_LIMIT)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write beyond memory file limit"))?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }
}
