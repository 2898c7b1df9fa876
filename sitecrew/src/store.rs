//! Project file store.
//!
//! An in-memory view of the project tree keyed by normalized relative path,
//! mirrored to disk under the project root. Text files are held verbatim;
//! images and other binaries are held as sentinels.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::StoreError;

/// Sentinel stored for binary files that are not held in memory.
pub const BINARY_SENTINEL: &str = "binary_file";
/// Sentinel stored for image files that are not held in memory.
pub const IMAGE_SENTINEL: &str = "image_file";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "ico"];
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "__pycache__", "dist", "build"];

/// Value of one store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    Text(String),
    Binary,
    Image,
}

impl FileEntry {
    /// The text content, if held in memory.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileEntry::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text content or the sentinel string.
    pub fn as_str(&self) -> &str {
        match self {
            FileEntry::Text(s) => s,
            FileEntry::Binary => BINARY_SENTINEL,
            FileEntry::Image => IMAGE_SENTINEL,
        }
    }
}

/// Project file store. Single writer; callers serialize access.
#[derive(Debug)]
pub struct ProjectFileStore {
    root: PathBuf,
    files: BTreeMap<String, FileEntry>,
}

impl ProjectFileStore {
    /// Open a store rooted at `root`, creating it and its `images/` directory.
    pub async fn open(root: &Path) -> Result<Self, StoreError> {
        let images = root.join("images");
        tokio::fs::create_dir_all(&images)
            .await
            .map_err(|e| StoreError::io(&images.to_string_lossy(), e))?;
        Ok(Self {
            root: root.to_path_buf(),
            files: BTreeMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path on disk for a relative project path.
    pub fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let rel = normalize_path(path)?;
        let full = self.root.join(&rel);
        Ok((rel, full))
    }

    /// Create a file, writing through to disk.
    pub async fn create(&mut self, path: &str, content: &str) -> Result<String, StoreError> {
        self.write(path, content).await
    }

    /// Overwrite a file, writing through to disk. Missing files are created.
    pub async fn modify(&mut self, path: &str, content: &str) -> Result<String, StoreError> {
        self.write(path, content).await
    }

    async fn write(&mut self, path: &str, content: &str) -> Result<String, StoreError> {
        let (rel, full) = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(&rel, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| StoreError::io(&rel, e))?;
        tracing::debug!(path = %rel, bytes = content.len(), "Wrote project file");
        self.files.insert(rel.clone(), FileEntry::Text(content.to_string()));
        Ok(rel)
    }

    /// Read a file. Falls back to disk (and caches the result) when the
    /// path is not yet in memory.
    pub async fn read(&mut self, path: &str) -> Result<FileEntry, StoreError> {
        let (rel, full) = self.resolve(path)?;
        if let Some(entry) = self.files.get(&rel) {
            return Ok(entry.clone());
        }
        if full.is_dir() {
            return Err(StoreError::NotFound(rel));
        }
        let bytes = match tokio::fs::read(&full).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(rel));
            }
            Err(e) => return Err(StoreError::io(&rel, e)),
        };
        let entry = classify(&rel, bytes);
        self.files.insert(rel, entry.clone());
        Ok(entry)
    }

    /// Record an entry that already exists on disk (e.g. a generated image).
    pub fn mark(&mut self, path: &str, entry: FileEntry) -> Result<String, StoreError> {
        let rel = normalize_path(path)?;
        self.files.insert(rel.clone(), entry);
        Ok(rel)
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        let rel = normalize_path(path).ok()?;
        self.files.get(&rel)
    }

    pub fn files(&self) -> &BTreeMap<String, FileEntry> {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reload the whole map from disk.
    pub async fn load_tree(&mut self) -> Result<usize, StoreError> {
        let root = self.root.clone();
        let loaded = tokio::task::spawn_blocking(move || load_tree_sync(&root))
            .await
            .map_err(|e| StoreError::io(".", std::io::Error::other(e)))??;
        self.files = loaded;
        tracing::info!(root = %self.root.display(), files = self.files.len(), "Loaded project tree");
        Ok(self.files.len())
    }

    /// Path to byte size, read from disk.
    pub async fn structure(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || structure_sync(&root))
            .await
            .map_err(|e| StoreError::io(".", std::io::Error::other(e)))?
    }

    /// Names and sizes of the in-memory files, for agent prompts.
    pub fn summary(&self) -> String {
        let mut out = String::from("Current project files:\n");
        for (path, entry) in &self.files {
            match entry {
                FileEntry::Text(s) => {
                    out.push_str(&format!("- {path}: {} characters\n", s.chars().count()))
                }
                FileEntry::Image => out.push_str(&format!("- {path}: image file\n")),
                FileEntry::Binary => out.push_str(&format!("- {path}: binary file\n")),
            }
        }
        out
    }
}

/// Normalize a relative project path: forward slashes, a single leading
/// separator stripped, `.` removed, `..` resolved without leaving the root.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let cleaned = path
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .replace('\\', "/");
    let cleaned = cleaned.strip_prefix('/').unwrap_or(&cleaned);

    let mut parts: Vec<&str> = Vec::new();
    for part in cleaned.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(StoreError::PathTraversal(path.to_string()));
                }
            }
            p if p.contains(':') || p.contains('\0') => {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}

fn is_image_path(rel: &str) -> bool {
    Path::new(rel)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn classify(rel: &str, bytes: Vec<u8>) -> FileEntry {
    if is_image_path(rel) {
        return FileEntry::Image;
    }
    match String::from_utf8(bytes) {
        Ok(s) => FileEntry::Text(s),
        Err(_) => FileEntry::Binary,
    }
}

fn walk(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn load_tree_sync(root: &Path) -> Result<BTreeMap<String, FileEntry>, StoreError> {
    let mut files = BTreeMap::new();
    for entry in walk(root) {
        let Some(rel) = relative(root, entry.path()) else {
            continue;
        };
        let bytes = std::fs::read(entry.path()).map_err(|e| StoreError::io(&rel, e))?;
        let value = classify(&rel, bytes);
        files.insert(rel, value);
    }
    Ok(files)
}

fn structure_sync(root: &Path) -> Result<BTreeMap<String, u64>, StoreError> {
    let mut sizes = BTreeMap::new();
    for entry in walk(root) {
        let Some(rel) = relative(root, entry.path()) else {
            continue;
        };
        let meta = entry.metadata().map_err(|e| StoreError::io(&rel, e.into()))?;
        sizes.insert(rel, meta.len());
    }
    Ok(sizes)
}
