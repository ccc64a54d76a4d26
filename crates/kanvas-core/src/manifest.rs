//! Bundle manifest for archive integrity verification
//!
//! The MANIFEST file is the first entry of every bundle archive and lists:
//! - Bundle metadata (name, creation timestamp)
//! - SHA256 checksums for every document file
//! - An overall digest for quick integrity verification

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// A file entry in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative path within the archive
    pub path: String,
    /// SHA256 hash of the file contents
    pub sha256: String,
}

/// Bundle manifest containing checksums and metadata
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Manifest format version
    pub version: u32,
    /// Bundle name
    pub name: String,
    /// Creation timestamp
    pub created: DateTime<Utc>,
    /// Files and their checksums, in archive order
    pub files: Vec<FileEntry>,
    /// Overall digest of all file checksums
    pub digest: String,
}

impl std::fmt::Display for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "kanvas-manifest-version: {}", self.version)?;
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "created: {}", self.created.to_rfc3339())?;
        writeln!(f)?;

        writeln!(f, "[files]")?;
        for entry in &self.files {
            writeln!(f, "{} sha256:{}", entry.path, entry.sha256)?;
        }
        writeln!(f)?;

        writeln!(f, "[digest]")?;
        write!(f, "sha256:{}", self.digest)
    }
}

impl Manifest {
    /// Build a manifest over `(path, content)` pairs
    pub fn generate<'a, I>(name: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let files: Vec<FileEntry> = files
            .into_iter()
            .map(|(path, content)| FileEntry {
                path: path.to_string(),
                sha256: hash_bytes(content),
            })
            .collect();
        let digest = calculate_digest(&files);

        Self {
            version: MANIFEST_VERSION,
            name: name.to_string(),
            created: Utc::now(),
            files,
            digest,
        }
    }

    /// Parse a manifest from its text representation
    pub fn parse(content: &str) -> Result<Self> {
        let mut version: Option<u32> = None;
        let mut name: Option<String> = None;
        let mut created: Option<DateTime<Utc>> = None;
        let mut files = Vec::new();
        let mut digest: Option<String> = None;

        let mut in_files_section = false;
        let mut in_digest_section = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "[files]" {
                in_files_section = true;
                in_digest_section = false;
                continue;
            }
            if line == "[digest]" {
                in_files_section = false;
                in_digest_section = true;
                continue;
            }

            if in_digest_section {
                if let Some(hash) = line.strip_prefix("sha256:") {
                    digest = Some(hash.to_string());
                }
            } else if in_files_section {
                if let Some((path, hash)) = line
                    .rsplit_once(' ')
                    .and_then(|(path, part)| part.strip_prefix("sha256:").map(|h| (path, h)))
                {
                    files.push(FileEntry {
                        path: path.to_string(),
                        sha256: hash.to_string(),
                    });
                }
            } else if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "kanvas-manifest-version" => version = value.parse().ok(),
                    "name" => name = Some(value.to_string()),
                    "created" => {
                        created = DateTime::parse_from_rfc3339(value)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc));
                    }
                    _ => {}
                }
            }
        }

        let missing = |what: &str| CoreError::InvalidManifest {
            message: format!("Missing {}", what),
        };

        Ok(Self {
            version: version.ok_or_else(|| missing("kanvas-manifest-version"))?,
            name: name.ok_or_else(|| missing("name"))?,
            created: created.ok_or_else(|| missing("or invalid created timestamp"))?,
            files,
            digest: digest.ok_or_else(|| missing("digest"))?,
        })
    }

    /// Verify that all files match their checksums
    ///
    /// Takes a function that reads file content given a relative path
    pub fn verify_files<F>(&self, read_file: F) -> VerificationResult
    where
        F: Fn(&str) -> Option<Vec<u8>>,
    {
        let mut result = VerificationResult {
            valid: true,
            mismatched: Vec::new(),
            missing: Vec::new(),
        };

        for entry in &self.files {
            match read_file(&entry.path) {
                Some(content) => {
                    let actual = hash_bytes(&content);
                    if actual != entry.sha256 {
                        result.valid = false;
                        result.mismatched.push(MismatchedFile {
                            path: entry.path.clone(),
                            expected: entry.sha256.clone(),
                            actual,
                        });
                    }
                }
                None => {
                    result.valid = false;
                    result.missing.push(entry.path.clone());
                }
            }
        }

        if calculate_digest(&self.files) != self.digest {
            result.valid = false;
        }

        result
    }
}

/// Result of manifest verification
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub valid: bool,
    pub mismatched: Vec<MismatchedFile>,
    pub missing: Vec<String>,
}

/// A file with a mismatched checksum
#[derive(Debug, Clone)]
pub struct MismatchedFile {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Calculate SHA256 hash of bytes
fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Calculate overall digest from file entries
fn calculate_digest(files: &[FileEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in files {
        hasher.update(entry.path.as_bytes());
        hasher.update(b":");
        hasher.update(entry.sha256.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
