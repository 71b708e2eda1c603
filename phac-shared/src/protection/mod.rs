/// Script protection engine
///
/// Applies the per-type transforms, assigns the run its encryption ID and
/// packages the result. The transforms are text rewrites (identifier renaming,
/// minification, base64) and make no claim of cryptographic strength.
///
/// # Pipeline
///
/// ```text
/// SourceFile[] ──process_files──▶ ProtectionOutcome (files, id, loader, stats)
///                                        │
///                                        └──package::build_archive──▶ zip bytes
/// ```
///
/// # Example
///
/// ```
/// use phac_shared::protection::{process_files, ProtectionLevel, SourceFile};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let files = vec![SourceFile::new("client.lua", "local speed = 10", "lua")];
///
/// let outcome = process_files(&files, ProtectionLevel::Standard)?;
/// assert_eq!(outcome.stats.lua, 1);
/// assert!(outcome.loader_code.is_some());
/// assert!(outcome.zip_filename.starts_with("phacprotect-"));
/// # Ok(())
/// # }
/// ```

pub mod analysis;
pub mod loader;
pub mod lua;
pub mod package;
pub mod web;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lowercase base36 digits
pub(crate) const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase hex digits
pub(crate) const HEX: &[u8] = b"0123456789abcdef";

/// Longest accepted encryption ID
pub const MAX_ENCRYPTION_ID_LENGTH: usize = 64;

/// Longest accepted license key
pub const MAX_LICENSE_KEY_LENGTH: usize = 64;

/// Protection engine error
#[derive(Debug, thiserror::Error)]
pub enum ProtectError {
    /// Nothing to process
    #[error("No files to process")]
    NoFiles,

    /// Built-in pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Two archive entries share a name
    #[error("Duplicate file name in archive: {0}")]
    DuplicateEntry(String),

    /// Entry name is empty, absolute or escapes the archive root
    #[error("Unsafe file name: {0:?}")]
    UnsafeEntryName(String),

    /// Encryption ID contains characters outside `[A-Za-z0-9-]`
    #[error("Invalid encryption ID: {0:?}")]
    InvalidEncryptionId(String),

    /// License key contains characters outside `[A-Za-z0-9_-]`
    #[error("Invalid license key: {0:?}")]
    InvalidLicenseKey(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive writer produced no bytes
    #[error("Generated archive is empty")]
    EmptyArchive,
}

/// Protection strength selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    /// Identifier renaming / minification
    Standard,

    /// Standard plus renaming in web files
    Advanced,

    /// Lua emitted as a base64 payload
    Premium,
}

impl ProtectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionLevel::Standard => "standard",
            ProtectionLevel::Advanced => "advanced",
            ProtectionLevel::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(ProtectionLevel::Standard),
            "advanced" => Some(ProtectionLevel::Advanced),
            "premium" => Some(ProtectionLevel::Premium),
            _ => None,
        }
    }

    /// Uppercase name written into file headers
    pub fn label(&self) -> &'static str {
        match self {
            ProtectionLevel::Standard => "STANDARD",
            ProtectionLevel::Advanced => "ADVANCED",
            ProtectionLevel::Premium => "PREMIUM",
        }
    }

    /// Credits charged per file
    pub fn credit_cost(&self) -> i32 {
        match self {
            ProtectionLevel::Standard => 1,
            ProtectionLevel::Advanced => 3,
            ProtectionLevel::Premium => 5,
        }
    }
}

/// File kind, taken from the lowercased `type` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Lua,
    Js,
    Html,
    Css,
    Json,
    Other(String),
}

impl FileType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "lua" => FileType::Lua,
            "js" => FileType::Js,
            "html" => FileType::Html,
            "css" => FileType::Css,
            "json" => FileType::Json,
            other => FileType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FileType::Lua => "lua",
            FileType::Js => "js",
            FileType::Html => "html",
            FileType::Css => "css",
            FileType::Json => "json",
            FileType::Other(other) => other,
        }
    }
}

/// A file submitted for protection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            file_type: file_type.into(),
        }
    }
}

/// A file after protection; `type` is always lowercase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedFile {
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

/// Per-type file counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionStats {
    pub total: usize,
    pub lua: usize,
    pub js: usize,
    pub html: usize,
    pub css: usize,
    pub json: usize,
}

impl ProtectionStats {
    fn count(files: &[ProtectedFile]) -> Self {
        let of = |kind: &str| files.iter().filter(|f| f.file_type == kind).count();

        Self {
            total: files.len(),
            lua: of("lua"),
            js: of("js"),
            html: of("html"),
            css: of("css"),
            json: of("json"),
        }
    }
}

/// Result of one protection run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionOutcome {
    pub files: Vec<ProtectedFile>,

    /// `<unix millis base36>-<4 random base36>`, uppercase
    pub encryption_id: String,

    /// `YYYYMMDD` (UTC)
    pub date_str: String,

    /// `phacprotect-<date>-<id>.zip`
    pub zip_filename: String,

    /// fxmanifest snippet; None when the run has no Lua files
    pub loader_code: Option<String>,

    pub stats: ProtectionStats,
}

/// Protects `files` at `level`
///
/// # Errors
///
/// `ProtectError::NoFiles` when `files` is empty.
pub fn process_files(
    files: &[SourceFile],
    level: ProtectionLevel,
) -> Result<ProtectionOutcome, ProtectError> {
    process_files_with(files, level, &mut rand::thread_rng(), Utc::now())
}

/// [`process_files`] with an explicit random source and clock
pub fn process_files_with<R: Rng + ?Sized>(
    files: &[SourceFile],
    level: ProtectionLevel,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<ProtectionOutcome, ProtectError> {
    if files.is_empty() {
        return Err(ProtectError::NoFiles);
    }

    tracing::debug!(files = files.len(), level = level.as_str(), "Processing files");

    let mut protected = Vec::with_capacity(files.len());
    for file in files {
        protected.push(protect_file(file, level, rng)?);
    }

    let encryption_id = encryption_id(now, rng);
    let date_str = date_stamp(now);
    let zip_filename = archive_filename(&date_str, &encryption_id);

    let lua_names: Vec<&str> = protected
        .iter()
        .filter(|f| f.file_type == FileType::Lua.as_str())
        .map(|f| f.name.as_str())
        .collect();
    let loader_code = if lua_names.is_empty() {
        None
    } else {
        Some(loader::manifest_loader(&encryption_id, &lua_names))
    };

    let stats = ProtectionStats::count(&protected);

    Ok(ProtectionOutcome {
        files: protected,
        encryption_id,
        date_str,
        zip_filename,
        loader_code,
        stats,
    })
}

/// Applies the transform for the file's type
pub fn protect_file<R: Rng + ?Sized>(
    file: &SourceFile,
    level: ProtectionLevel,
    rng: &mut R,
) -> Result<ProtectedFile, ProtectError> {
    let file_type = FileType::parse(&file.file_type);

    let content = match &file_type {
        FileType::Lua => lua::protect_lua(&file.content, level, rng)?,
        FileType::Js => web::protect_js(&file.content, level, rng)?,
        FileType::Html => web::protect_html(&file.content, level, rng)?,
        FileType::Css => web::protect_css(&file.content)?,
        FileType::Json => web::protect_json(&file.content),
        FileType::Other(_) => file.content.clone(),
    };

    Ok(ProtectedFile {
        name: file.name.clone(),
        content,
        file_type: file_type.as_str().to_string(),
    })
}

/// Builds an encryption ID from the clock and four random base36 digits
pub fn encryption_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let suffix = random_token(rng, BASE36, 4);

    format!("{}-{}", to_base36(millis), suffix).to_uppercase()
}

/// `YYYYMMDD` in UTC
pub fn date_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Download name of a run's archive
pub fn archive_filename(date_str: &str, encryption_id: &str) -> String {
    format!("phacprotect-{}-{}.zip", date_str, encryption_id)
}

/// Checks that a client-supplied encryption ID is safe to embed in file
/// names and headers
pub fn validate_encryption_id(id: &str) -> Result<(), ProtectError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ENCRYPTION_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(ProtectError::InvalidEncryptionId(id.to_string()))
    }
}

/// Checks that a client-supplied license key is safe to embed in a Lua
/// string literal. An empty key is accepted; the loader rejects it at runtime.
pub fn validate_license_key(key: &str) -> Result<(), ProtectError> {
    let valid = key.len() <= MAX_LICENSE_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ProtectError::InvalidLicenseKey(key.to_string()))
    }
}

pub(crate) fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8_lossy(&digits).into_owned()
}

pub(crate) fn random_token<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Maps original identifiers to generated ones, one mapping per file
pub(crate) struct NameMapper {
    prefix: &'static str,
    alphabet: &'static [u8],
    length: usize,
    names: HashMap<String, String>,
    issued: HashSet<String>,
}

impl NameMapper {
    pub(crate) fn new(prefix: &'static str, alphabet: &'static [u8], length: usize) -> Self {
        Self {
            prefix,
            alphabet,
            length,
            names: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Returns the replacement for `original`, generating it on first use
    pub(crate) fn rename<R: Rng + ?Sized>(&mut self, original: &str, rng: &mut R) -> String {
        if let Some(existing) = self.names.get(original) {
            return existing.clone();
        }

        let generated = loop {
            let candidate = format!(
                "{}{}",
                self.prefix,
                random_token(rng, self.alphabet, self.length)
            );
            if self.issued.insert(candidate.clone()) {
                break candidate;
            }
        };

        self.names.insert(original.to_string(), generated.clone());
        generated
    }
}
