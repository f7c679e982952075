//! On-disk storage backend
//!
//! Each key is one file in the store directory, named by the hex SHA-256 of
//! the key so names stay short and never differ only by letter case. The
//! file starts with the percent-encoded key on its own line, followed by the
//! value. Values are written to a temporary file and renamed into place.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{check_quota, entry_size, Storage, StoreError};

/// Characters kept verbatim in the key header; newlines are always encoded
const KEY_HEADER: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

const TEMP_EXTENSION: &str = "tmp";

/// Storage persisted in a directory
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    quota: u64,
    write_lock: Mutex<()>,
}

/// File name for `key`
fn file_name(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn encode_header(key: &str) -> String {
    utf8_percent_encode(key, KEY_HEADER).to_string()
}

impl FileStorage {
    /// Open (creating if needed) a storage directory limited to `quota` bytes
    pub fn open<P: AsRef<Path>>(dir: P, quota: u64) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Opened post store at {:?}", dir);
        Ok(Self {
            dir,
            quota,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }

    /// Bytes used by every entry except `skip_key`
    fn usage_excluding(&self, skip_key: &str) -> Result<u64, StoreError> {
        let mut usage = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            // Unreadable or headerless files are not entries
            let Ok(file) = File::open(&path) else {
                continue;
            };
            let mut header = String::new();
            if BufReader::new(file).read_line(&mut header).is_err() || !header.ends_with('\n') {
                continue;
            }

            let key = percent_decode_str(header.trim_end_matches('\n')).decode_utf8_lossy();
            if key == skip_key {
                continue;
            }

            let value_len = metadata.len().saturating_sub(header.len() as u64);
            usage += entry_size(&key, value_len);
        }

        Ok(usage)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = || StoreError::Corrupt {
            key: key.to_string(),
        };

        let newline = bytes.iter().position(|&b| b == b'\n').ok_or_else(corrupt)?;
        let (header, value) = (&bytes[..newline], &bytes[newline + 1..]);
        if header != encode_header(key).as_bytes() {
            return Err(corrupt());
        }

        String::from_utf8(value.to_vec())
            .map(Some)
            .map_err(|_| corrupt())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let usage = self.usage_excluding(key)?;
        check_quota(key, usage, value.len() as u64, self.quota)?;

        let path = self.path_for(key);
        let temp = path.with_extension(TEMP_EXTENSION);
        let mut contents = encode_header(key);
        contents.push('\n');
        contents.push_str(value);

        fs::write(&temp, contents)?;
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        Ok(())
    }
}
