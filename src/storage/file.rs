//! File storage for host builds
//!
//! Names are resolved inside a base directory. Only plain file names are
//! accepted, so a peer cannot write outside it.

use crate::config::wire::MAX_NAME_LEN;
use crate::protocol::checksum::Crc16;
use crate::storage::traits::{SegmentSink, SegmentSource, StorageError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound,
            io::ErrorKind::UnexpectedEof => StorageError::OutOfRange,
            _ => StorageError::Io,
        }
    }
}

fn resolve(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let plain = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if !plain {
        return Err(StorageError::InvalidName);
    }
    Ok(dir.join(name))
}

fn file_crc(file: &mut File, length: u32) -> Result<u16, StorageError> {
    let resume = file.stream_position()?;
    file.seek(SeekFrom::Start(0))?;

    let mut crc = Crc16::new();
    let mut chunk = [0u8; 256];
    let mut remaining = length as usize;
    while remaining > 0 {
        let n = remaining.min(chunk.len());
        file.read_exact(&mut chunk[..n])?;
        crc.update(&chunk[..n]);
        remaining -= n;
    }

    file.seek(SeekFrom::Start(resume))?;
    Ok(crc.finish())
}

/// Reads files from a directory
pub struct FileSource {
    dir: PathBuf,
    file: Option<File>,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
        }
    }

    fn file(&mut self) -> Result<&mut File, StorageError> {
        self.file.as_mut().ok_or(StorageError::NotOpen)
    }
}

impl SegmentSource for FileSource {
    fn open_for_read(&mut self, name: &str) -> Result<u32, StorageError> {
        let file = File::open(resolve(&self.dir, name)?)?;
        let length = u32::try_from(file.metadata()?.len()).map_err(|_| StorageError::OutOfRange)?;
        self.file = Some(file);
        Ok(length)
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        self.file()?.read_exact(buf)?;
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        self.file()?.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        file_crc(self.file()?, length)
    }
}

/// Writes files into a directory
pub struct FileSink {
    dir: PathBuf,
    file: Option<File>,
    written: u32,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
            written: 0,
        }
    }

    fn file(&mut self) -> Result<&mut File, StorageError> {
        self.file.as_mut().ok_or(StorageError::NotOpen)
    }
}

impl SegmentSink for FileSink {
    fn open_for_write(&mut self, name: &str) -> Result<(), StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(resolve(&self.dir, name)?)?;
        self.file = Some(file);
        self.written = 0;
        Ok(())
    }

    fn write_segment(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let file = self.file()?;
        file.write_all(data)?;
        let end = file.stream_position()?;
        self.written = self.written.max(end as u32);
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        if offset > self.written {
            return Err(StorageError::OutOfRange);
        }
        self.file()?.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        if length > self.written {
            return Err(StorageError::OutOfRange);
        }
        let file = self.file()?;
        file.flush()?;
        file_crc(file, length)
    }

    fn bytes_written(&self) -> u32 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::checksum::crc16;

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();

        let mut sink = FileSink::new(dir.path());
        sink.open_for_write("image.jpg").unwrap();
        sink.write_segment(b"0123456789").unwrap();
        sink.write_segment(b"abc").unwrap();
        assert_eq!(sink.bytes_written(), 13);
        assert_eq!(sink.compute_crc(13), Ok(crc16(b"0123456789abc")));
        sink.close();

        let mut source = FileSource::new(dir.path());
        assert_eq!(source.open_for_read("image.jpg"), Ok(13));
        assert_eq!(source.compute_crc(13), Ok(crc16(b"0123456789abc")));

        let mut buf = [0u8; 4];
        source.seek(8).unwrap();
        source.read_segment(&mut buf).unwrap();
        assert_eq!(&buf, b"89ab");
    }

    #[test]
    fn test_crc_keeps_read_position() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), b"abcdefgh").unwrap();

        let mut source = FileSource::new(dir.path());
        source.open_for_read("data.bin").unwrap();
        let mut buf = [0u8; 3];
        source.read_segment(&mut buf).unwrap();
        source.compute_crc(8).unwrap();
        source.read_segment(&mut buf).unwrap();
        assert_eq!(&buf, b"def");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(dir.path());
        assert_eq!(source.open_for_read("absent.txt"), Err(StorageError::NotFound));
    }

    #[test]
    fn test_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path());

        assert_eq!(sink.open_for_write("../escape"), Err(StorageError::InvalidName));
        assert_eq!(sink.open_for_write(""), Err(StorageError::InvalidName));
        assert_eq!(sink.open_for_write(".."), Err(StorageError::InvalidName));
    }

    #[test]
    fn test_short_read_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("short.bin"), b"ab").unwrap();

        let mut source = FileSource::new(dir.path());
        source.open_for_read("short.bin").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(source.read_segment(&mut buf), Err(StorageError::OutOfRange));
    }
}
