//! Storage collaborator and the packed file image served from it.
//!
//! A file image is a flat blob, usually written to flash, laid out as:
//!
//! ```text
//! i32 count
//! count x [ name: 16 bytes, NUL terminated, space padded | size: i32 | address: i32 ]
//! file contents
//! ```
//!
//! Integers are little-endian and `address` is the offset of a file's
//! contents from the start of the image.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use log::debug;

use crate::server::error::Error;

/// Bytes reserved for a file name in an image entry, including its NUL.
pub const NAME_LEN: usize = 16;

const ENTRY_LEN: usize = NAME_LEN + 8;

/// Chunked-read access to bulk storage.
pub trait Storage: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number
    /// of bytes read; 0 means `offset` is past the end.
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

fn read_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    let Some(src) = data.get(start..) else {
        return 0;
    };
    let n = src.len().min(buf.len());
    buf[..n].copy_from_slice(&src[..n]);
    n
}

impl Storage for Vec<u8> {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

impl Storage for &'static [u8] {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

/// A storage backed by a file on the host filesystem.
#[derive(Debug)]
pub struct FileStorage {
    file: Mutex<File>,
}

impl FileStorage {
    /// Open a file for reading as storage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl Storage for FileStorage {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "storage lock poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}

/// A byte range of storage streamed as a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargePayload {
    /// Storage offset of the next byte to send.
    pub offset: u64,
    /// Bytes left to send.
    pub remaining: u64,
}

impl LargePayload {
    /// A payload of `size` bytes starting at `offset`.
    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            remaining: size,
        }
    }
}

/// A file listed in an image directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    /// Absolute storage offset of the contents.
    pub offset: u64,
    pub size: u64,
}

impl FsEntry {
    /// The file's contents as a streamable payload.
    pub fn payload(&self) -> LargePayload {
        LargePayload::new(self.offset, self.size)
    }
}

/// The directory of a file image.
#[derive(Debug, Clone, Default)]
pub struct FsImage {
    entries: Vec<FsEntry>,
}

fn read_exact(storage: &dyn Storage, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match storage.read(offset + filled as u64, &mut buf[filled..])? {
            0 => return Err(Error::InvalidImage(format!("truncated at byte {}", offset + filled as u64))),
            n => filled += n,
        }
    }
    Ok(())
}

fn read_i32(bytes: &[u8], what: &str) -> Result<u64, Error> {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u64::try_from(i32::from_le_bytes(raw))
        .map_err(|_| Error::InvalidImage(format!("negative {what}")))
}

impl FsImage {
    /// Read the directory of an image that starts at `base` in `storage`.
    pub fn load(storage: &dyn Storage, base: u64) -> Result<Self, Error> {
        let mut word = [0u8; 4];
        read_exact(storage, base, &mut word)?;
        let count = read_i32(&word, "file count")?;

        let mut entries = Vec::new();
        let mut entry = [0u8; ENTRY_LEN];
        for i in 0..count {
            read_exact(storage, base + 4 + i * ENTRY_LEN as u64, &mut entry)?;

            let raw_name = &entry[..NAME_LEN];
            let end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            let name = std::str::from_utf8(&raw_name[..end])
                .map_err(|_| Error::InvalidImage(format!("entry {i} has a non UTF-8 name")))?
                .trim_end()
                .to_string();
            let size = read_i32(&entry[NAME_LEN..NAME_LEN + 4], "file size")?;
            let address = read_i32(&entry[NAME_LEN + 4..], "file address")?;

            debug!("Image file {name}: {size} bytes at {address}");
            entries.push(FsEntry {
                name,
                offset: base + address,
                size,
            });
        }

        Ok(Self { entries })
    }

    /// Look a file up by exact name.
    pub fn find(&self, name: &str) -> Option<&FsEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The files in directory order.
    pub fn entries(&self) -> &[FsEntry] {
        &self.entries
    }

    /// Build an image holding `files` in the given order.
    pub fn pack(files: &[(&str, &[u8])]) -> Result<Vec<u8>, Error> {
        let too_big = || Error::InvalidImage("image exceeds i32 addressing".to_string());
        let count = i32::try_from(files.len()).map_err(|_| too_big())?;
        let header_len = 4 + files.len() * ENTRY_LEN;

        let mut image = Vec::with_capacity(header_len + files.iter().map(|(_, d)| d.len()).sum::<usize>());
        image.extend_from_slice(&count.to_le_bytes());

        let mut address = header_len;
        for (name, data) in files {
            if name.len() >= NAME_LEN || name.contains('\0') {
                return Err(Error::FileNameTooLong(name.to_string()));
            }
            let mut raw_name = [b' '; NAME_LEN];
            raw_name[..name.len()].copy_from_slice(name.as_bytes());
            raw_name[name.len()] = 0;
            image.extend_from_slice(&raw_name);

            let size = i32::try_from(data.len()).map_err(|_| too_big())?;
            let addr = i32::try_from(address).map_err(|_| too_big())?;
            image.extend_from_slice(&size.to_le_bytes());
            image.extend_from_slice(&addr.to_le_bytes());
            address += data.len();
        }

        for (_, data) in files {
            image.extend_from_slice(data);
        }
        Ok(image)
    }
}
