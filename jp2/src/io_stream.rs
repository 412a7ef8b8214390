//! Byte streams an image reads from and writes back to.

use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// A seekable byte source whose whole content can be replaced.
///
/// Reads and seeks go through the std traits. `transfer` swaps the content for a fully
/// written replacement, which is how rewritten files are committed.
pub trait BasicIo: io::Read + io::Seek {
    /// Open the stream for reading, positioned at the start.
    fn open(&mut self) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;

    fn is_open(&self) -> bool;

    /// Total size in bytes.
    fn size(&mut self) -> io::Result<u64>;

    /// Human readable location, used in messages and the structure listing.
    fn path(&self) -> String;

    /// Replace the entire content with the content of `source`.
    fn transfer(&mut self, source: MemIo) -> io::Result<()>;
}

/// Length of a seekable stream, leaving the position where it was.
pub(crate) fn stream_len<R: io::Seek + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let pos = reader.stream_position()?;
    let end = reader.seek(io::SeekFrom::End(0))?;
    reader.seek(io::SeekFrom::Start(pos))?;
    Ok(end)
}

/// In-memory stream.
#[derive(Debug, Default, Clone)]
pub struct MemIo {
    cursor: Cursor<Vec<u8>>,
    open: bool,
}

impl MemIo {
    pub fn new() -> MemIo {
        MemIo::default()
    }

    pub fn from_vec(data: Vec<u8>) -> MemIo {
        MemIo {
            cursor: Cursor::new(data),
            open: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl From<Vec<u8>> for MemIo {
    fn from(data: Vec<u8>) -> Self {
        MemIo::from_vec(data)
    }
}

impl From<&[u8]> for MemIo {
    fn from(data: &[u8]) -> Self {
        MemIo::from_vec(data.to_vec())
    }
}

impl io::Read for MemIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.cursor, buf)
    }
}

impl io::Seek for MemIo {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        io::Seek::seek(&mut self.cursor, pos)
    }
}

impl io::Write for MemIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BasicIo for MemIo {
    fn open(&mut self) -> io::Result<()> {
        self.cursor.set_position(0);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }

    fn path(&self) -> String {
        "MemIo".to_string()
    }

    fn transfer(&mut self, source: MemIo) -> io::Result<()> {
        self.cursor = Cursor::new(source.into_inner());
        Ok(())
    }
}

/// File backed stream.
///
/// The file is opened read-only; `transfer` writes the replacement to a temporary file
/// next to it and renames it over the original.
#[derive(Debug)]
pub struct FileIo {
    path: PathBuf,
    file: Option<File>,
}

impl FileIo {
    pub fn new<P: AsRef<Path>>(path: P) -> FileIo {
        FileIo {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not open", self.path.display()),
            )),
        }
    }
}

impl io::Read for FileIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self.file_mut()?, buf)
    }
}

impl io::Seek for FileIo {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        io::Seek::seek(self.file_mut()?, pos)
    }
}

impl BasicIo for FileIo {
    fn open(&mut self) -> io::Result<()> {
        self.file = Some(File::open(&self.path)?);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn size(&mut self) -> io::Result<u64> {
        match self.file.as_mut() {
            Some(file) => stream_len(file),
            None => Ok(fs::metadata(&self.path)?.len()),
        }
    }

    fn path(&self) -> String {
        self.path.display().to_string()
    }

    fn transfer(&mut self, source: MemIo) -> io::Result<()> {
        let was_open = self.is_open();
        self.close()?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(source.data())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Replaced {} ({} bytes)", self.path.display(), source.data().len());

        if was_open {
            self.open()?;
        }
        Ok(())
    }
}

/// Closes the wrapped stream when dropped.
pub struct IoCloser<'a, S: BasicIo + ?Sized> {
    io: &'a mut S,
}

impl<'a, S: BasicIo + ?Sized> IoCloser<'a, S> {
    pub fn new(io: &'a mut S) -> IoCloser<'a, S> {
        IoCloser { io }
    }
}

impl<'a, S: BasicIo + ?Sized> Deref for IoCloser<'a, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.io
    }
}

impl<'a, S: BasicIo + ?Sized> DerefMut for IoCloser<'a, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.io
    }
}

impl<'a, S: BasicIo + ?Sized> Drop for IoCloser<'a, S> {
    fn drop(&mut self) {
        if self.io.is_open() {
            if let Err(e) = self.io.close() {
                warn!("Failed to close {}: {}", self.io.path(), e);
            }
        }
    }
}
