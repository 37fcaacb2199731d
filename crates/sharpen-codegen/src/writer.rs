//! Atomic publication of a generated tree
//!
//! Files are written into a staging directory created next to the output
//! root, then swapped in with two renames. A run that fails or is cancelled
//! before [`OutputWriter::publish`] returns leaves the previous tree intact.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CodegenError;

/// Written at the top of every published tree
pub const MANIFEST_FILE: &str = ".sharpen-manifest.json";

/// One generated file, path relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub generated_at: String,
    pub files: Vec<OutputEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// `/`-separated, relative to the output root
    pub path: String,
    pub sha256: String,
    pub bytes: usize,
}

impl OutputManifest {
    pub fn build(files: &[EmittedFile], generated_at: DateTime<Utc>) -> Self {
        let mut entries: Vec<OutputEntry> = files
            .iter()
            .map(|file| OutputEntry {
                path: manifest_path(&file.path),
                sha256: format!("{:x}", Sha256::digest(file.contents.as_bytes())),
                bytes: file.contents.len(),
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            files: entries,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CodegenError> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn manifest_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every file plus the manifest, then replace the output root
    #[tracing::instrument(skip_all, fields(root = %self.root.display(), files = files.len()))]
    pub fn publish(
        &self,
        files: &[EmittedFile],
        generated_at: DateTime<Utc>,
    ) -> Result<OutputManifest, CodegenError> {
        self.check_replaceable()?;

        let parent = match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".sharpen-staging-")
            .tempdir_in(&parent)?;
        let tree = staging.path().join("tree");
        fs::create_dir(&tree)?;

        let mut seen = BTreeSet::new();
        for file in files {
            check_relative(&file.path)?;
            if !seen.insert(file.path.clone()) {
                return Err(CodegenError::DuplicateOutput(manifest_path(&file.path)));
            }
            let target = tree.join(&file.path);
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&target, &file.contents)?;
        }

        let manifest = OutputManifest::build(files, generated_at);
        fs::write(
            tree.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        // the old tree moves into staging and is removed with it
        let previous = staging.path().join("previous");
        swap_in(&tree, &self.root, &previous, |from, to| fs::rename(from, to))?;

        tracing::info!(files = manifest.files.len(), "published output tree");
        Ok(manifest)
    }

    /// Only an empty directory or a tree sharpen wrote itself is replaced
    fn check_replaceable(&self) -> Result<(), CodegenError> {
        if !self.root.exists() {
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(CodegenError::ForeignOutputDir(self.root.display().to_string()));
        }
        let empty = fs::read_dir(&self.root)?.next().is_none();
        if empty || self.root.join(MANIFEST_FILE).is_file() {
            Ok(())
        } else {
            Err(CodegenError::ForeignOutputDir(self.root.display().to_string()))
        }
    }
}

/// Move `root` aside to `previous`, then `tree` into its place. When the
/// second move fails the old root is moved back before the error returns.
fn swap_in(
    tree: &Path,
    root: &Path,
    previous: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> io::Result<()> {
    let replacing = root.exists();
    if replacing {
        rename(root, previous)?;
    }
    if let Err(err) = rename(tree, root) {
        if replacing {
            if let Err(restore) = rename(previous, root) {
                tracing::error!(
                    error = %restore,
                    previous = %previous.display(),
                    "could not restore previous output tree"
                );
            }
        }
        return Err(err);
    }
    Ok(())
}

fn check_relative(path: &Path) -> Result<(), CodegenError> {
    let safe = !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(())
    } else {
        Err(CodegenError::UnsafeOutputPath(path.display().to_string()))
    }
}
