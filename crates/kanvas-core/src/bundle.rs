//! Bundle archives
//!
//! Packages a set of resolved documents as a `.tar.gz`: a `MANIFEST` first,
//! then one YAML file per document, named `NN-<kind>-<name>.yaml` in output
//! order.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};
use crate::manifest::{Manifest, VerificationResult};

/// Name of the manifest entry inside an archive
pub const MANIFEST_FILE: &str = "MANIFEST";

/// One rendered document file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub path: String,
    pub content: String,
}

/// A named set of rendered documents
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub files: Vec<BundleFile>,
}

impl Bundle {
    /// Render documents to YAML files with stable, ordered names
    pub fn from_documents<'a, I>(name: &str, documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a JsonValue>,
    {
        let mut files = Vec::new();
        for (index, doc) in documents.into_iter().enumerate() {
            files.push(BundleFile {
                path: file_name(index, doc),
                content: serde_yaml::to_string(doc)?,
            });
        }
        Ok(Self {
            name: name.to_string(),
            files,
        })
    }

    /// Generate the manifest for the current files
    pub fn manifest(&self) -> Manifest {
        Manifest::generate(
            &self.name,
            self.files
                .iter()
                .map(|f| (f.path.as_str(), f.content.as_bytes())),
        )
    }

    /// Write the bundle as a gzip-compressed tar archive
    pub fn write_archive(&self, output: &Path) -> Result<()> {
        let manifest = self.manifest().to_string();

        let file = File::create(output)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        add_bytes_to_archive(&mut builder, MANIFEST_FILE, manifest.as_bytes())?;
        for file in &self.files {
            add_bytes_to_archive(&mut builder, &file.path, file.content.as_bytes())?;
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    }

    /// Write each document to its own file in a directory
    pub fn write_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for file in &self.files {
            std::fs::write(dir.join(&file.path), &file.content)?;
        }
        Ok(())
    }
}

/// `NN-<kind>-<name>.yaml`, lowercase, with unsafe characters replaced
fn file_name(index: usize, doc: &JsonValue) -> String {
    let kind = doc.get("kind").and_then(JsonValue::as_str).unwrap_or("resource");
    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(JsonValue::as_str)
        .unwrap_or("unnamed");

    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect()
    };

    format!("{:02}-{}-{}.yaml", index, sanitize(kind), sanitize(name))
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible archives: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;
    Ok(())
}

/// Read every file of an archive in one pass
fn read_all_files(archive_path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut contents = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        contents.insert(path, data);
    }

    Ok(contents)
}

/// Read the MANIFEST from an archive
pub fn read_manifest(archive_path: &Path) -> Result<Manifest> {
    let mut files = read_all_files(archive_path)?;
    let content = files.remove(MANIFEST_FILE).ok_or_else(|| CoreError::Archive {
        message: format!("{} not found in {}", MANIFEST_FILE, archive_path.display()),
    })?;
    let text = String::from_utf8(content).map_err(|e| CoreError::Archive {
        message: format!("Invalid UTF-8 in MANIFEST: {}", e),
    })?;
    Manifest::parse(&text)
}

/// Verify every file of an archive against its MANIFEST
pub fn verify_archive(archive_path: &Path) -> Result<VerificationResult> {
    let manifest = read_manifest(archive_path)?;
    let files = read_all_files(archive_path)?;
    Ok(manifest.verify_files(|path| files.get(path).cloned()))
}
