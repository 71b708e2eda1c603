/// Zip packaging of protected files
///
/// Archive layout, in entry order:
///
/// ```text
/// phacprotect_loader_<id>.lua
/// <each protected file, under its original name>
/// README.txt
/// ```
///
/// Entries are stored uncompressed.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::Utc;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use super::{
    archive_filename, date_stamp, loader, validate_encryption_id, validate_license_key,
    ProtectError, ProtectedFile,
};

/// Name of the instructions entry
pub const README_NAME: &str = "README.txt";

/// A finished archive ready to send
#[derive(Debug, Clone)]
pub struct ProtectedArchive {
    /// Download name, `phacprotect-<date>-<id>.zip`
    pub filename: String,

    pub bytes: Vec<u8>,
}

/// Rejects entry names that are empty, absolute or could escape the
/// extraction directory
///
/// Names are also quoted into the loader's `client_script '<name>'` lines,
/// so quotes and control characters are refused.
pub fn validate_entry_name(name: &str) -> Result<(), ProtectError> {
    let unsafe_name = name.is_empty()
        || name.starts_with('/')
        || name.split('/').any(|segment| segment == "..")
        || name
            .chars()
            .any(|c| matches!(c, '\\' | '\'' | '"') || c.is_control());

    if unsafe_name {
        Err(ProtectError::UnsafeEntryName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Packages `files` with a standalone loader and README
///
/// # Errors
///
/// - `ProtectError::NoFiles` for an empty list
/// - `ProtectError::InvalidEncryptionId` for an ID unusable in file names
/// - `ProtectError::InvalidLicenseKey` for a key unusable in the loader
/// - `ProtectError::UnsafeEntryName` / `DuplicateEntry` for bad names
/// - `ProtectError::EmptyArchive` if the writer produced nothing
pub fn build_archive(
    files: &[ProtectedFile],
    encryption_id: &str,
    license_key: &str,
) -> Result<ProtectedArchive, ProtectError> {
    if files.is_empty() {
        return Err(ProtectError::NoFiles);
    }
    validate_encryption_id(encryption_id)?;
    validate_license_key(license_key)?;

    let file_names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let loader_name = loader::loader_filename(encryption_id);

    let mut entries: Vec<(String, String)> = Vec::with_capacity(files.len() + 2);
    entries.push((
        loader_name,
        loader::standalone_loader(encryption_id, license_key, &file_names),
    ));
    for file in files {
        entries.push((file.name.clone(), file.content.clone()));
    }
    entries.push((
        README_NAME.to_string(),
        loader::readme(encryption_id, license_key, &file_names),
    ));

    let mut seen = HashSet::new();
    for (name, _) in &entries {
        validate_entry_name(name)?;
        if !seen.insert(name.as_str()) {
            return Err(ProtectError::DuplicateEntry(name.clone()));
        }
    }

    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in &entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(content.as_bytes())?;
    }
    let bytes = writer.finish()?.into_inner();

    if bytes.is_empty() {
        return Err(ProtectError::EmptyArchive);
    }

    let filename = archive_filename(&date_stamp(Utc::now()), encryption_id);
    tracing::debug!(
        filename = %filename,
        entries = entries.len(),
        bytes = bytes.len(),
        "Archive generated"
    );

    Ok(ProtectedArchive { filename, bytes })
}
