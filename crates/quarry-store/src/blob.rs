use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::header::{
    content_hash, ArtifactKind, BlobHeader, Compression, WriteCompression, HEADER_LEN,
};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `payload` under a blob header, atomically replacing `path`.
pub(crate) fn write_blob_atomic(
    path: &Path,
    kind: ArtifactKind,
    schema_version: u32,
    payload: &[u8],
    compression: WriteCompression,
) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or(StoreError::InvalidHeader("missing parent directory"))?;
    fs::create_dir_all(parent)?;

    let uncompressed_len = payload.len() as u64;
    let hash = content_hash(payload);

    let (compression, stored): (Compression, std::borrow::Cow<'_, [u8]>) = match compression {
        WriteCompression::None => (Compression::None, payload.into()),
        WriteCompression::Zstd { level } => (
            Compression::Zstd,
            zstd::bulk::compress(payload, level)
                .map_err(|e| StoreError::Decompression(e.to_string()))?
                .into(),
        ),
        WriteCompression::Auto { threshold } => {
            if uncompressed_len >= threshold {
                (
                    Compression::Zstd,
                    zstd::bulk::compress(payload, 0)
                        .map_err(|e| StoreError::Decompression(e.to_string()))?
                        .into(),
                )
            } else {
                (Compression::None, payload.into())
            }
        }
    };

    let header = BlobHeader {
        kind,
        schema_version,
        compression,
        payload_len: stored.len() as u64,
        uncompressed_len,
        content_hash: hash,
    };

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    let result = (|| -> Result<(), StoreError> {
        file.write_all(&header.encode())?;
        file.write_all(&stored)?;
        file.sync_all()?;
        drop(file);
        rename_overwrite(&tmp_path, path).map_err(StoreError::from)
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

/// Read and validate a blob, returning the decompressed payload.
///
/// `Ok(None)` means the file does not exist; every other problem (torn
/// write, version skew, hash mismatch) is an error the caller decides how
/// to handle.
pub(crate) fn read_blob_optional(
    path: &Path,
    expected_kind: ArtifactKind,
    expected_schema: u32,
) -> Result<Option<Vec<u8>>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let header = BlobHeader::decode(&bytes)?;
    if header.kind != expected_kind {
        return Err(StoreError::WrongArtifact {
            expected: expected_kind,
            found: header.kind,
        });
    }
    if header.schema_version != expected_schema {
        return Err(StoreError::WrongSchema {
            expected: expected_schema,
            found: header.schema_version,
        });
    }

    let payload_len = header.payload_len as usize;
    let expected_len = HEADER_LEN
        .checked_add(payload_len)
        .ok_or(StoreError::InvalidHeader("payload length overflow"))?;
    if bytes.len() < expected_len {
        return Err(StoreError::Truncated {
            expected: expected_len,
            found: bytes.len(),
        });
    }

    let payload = &bytes[HEADER_LEN..expected_len];
    let payload = match header.compression {
        Compression::None => payload.to_vec(),
        Compression::Zstd => zstd::bulk::decompress(payload, header.uncompressed_len as usize)
            .map_err(|e| StoreError::Decompression(e.to_string()))?,
    };

    let found = content_hash(&payload);
    if found != header.content_hash {
        return Err(StoreError::HashMismatch {
            expected: header.content_hash,
            found,
        });
    }
    Ok(Some(payload))
}

fn rename_overwrite(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 1024;
    let mut attempts = 0_usize;

    loop {
        match fs::rename(tmp_path, dest) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists || dest.exists() => {
                // On Windows, `rename` doesn't overwrite. Under concurrent
                // writers, multiple `remove + rename` sequences can race;
                // retry until we win.
                let _ = fs::remove_file(dest);

                attempts += 1;
                if attempts >= MAX_RENAME_ATTEMPTS {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
