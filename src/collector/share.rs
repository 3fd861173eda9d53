// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cancel::CancelFlag;
use crate::collector::extract;
use crate::collector::{RawDocument, SourceCollector};
use crate::config::ShareConfig;
use crate::document::SourceType;
use crate::error::WissenError;

/// Files larger than this are listed but not read; the share carries
/// raw measurement data that is useless as text.
const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

const WRITE_PROBE_NAME: &str = ".wissen_write_probe";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShareState {
    Ready,
    Disabled(String),
}

/// Collector for the read-only network share mount.
///
/// The mount being read-only is a safety invariant: this system must
/// never hold write access to the source of truth. A writable or
/// missing mount disables the collector instead of crashing it.
pub struct FileShareCollector {
    mount: PathBuf,
    max_files: usize,
    state: ShareState,
}

impl FileShareCollector {
    pub fn new(mount: PathBuf, config: &ShareConfig) -> Self {
        let state = verify_mount(&mount);
        match &state {
            ShareState::Ready => info!("file share mounted read-only at {}", mount.display()),
            ShareState::Disabled(reason) => {
                warn!("file share collector disabled: {}", reason)
            }
        }
        Self {
            mount,
            max_files: config.max_files,
            state,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state == ShareState::Ready
    }

    /// Enumerate allow-listed files under the mount with their
    /// metadata, without reading content yet.
    fn list_entries(&self) -> Vec<ShareEntry> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.mount)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entries.len() >= self.max_files {
                warn!(
                    "share listing capped at {} files, remainder skipped",
                    self.max_files
                );
                break;
            }

            let extension = match entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
            {
                Some(ext) if extract::is_allowed(&ext) => ext,
                _ => continue,
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let relative = entry
                .path()
                .strip_prefix(&self.mount)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();

            entries.push(ShareEntry {
                absolute: entry.path().to_path_buf(),
                relative,
                extension,
                size: metadata.len(),
                modified: metadata
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from),
            });
        }

        entries
    }

    /// Read and extract one file's content. Failures are reported as
    /// absent content, never as collection-stopping errors.
    fn fetch_content(&self, entry: &ShareEntry) -> Option<String> {
        if !extract::has_strategy(&entry.extension) {
            debug!(
                "{}: {}",
                entry.relative,
                WissenError::ExtractionUnsupported(entry.extension.clone())
            );
            return None;
        }

        if entry.size > MAX_FILE_BYTES {
            warn!(
                "skipping content of {} ({} bytes over limit)",
                entry.relative, entry.size
            );
            return None;
        }

        let bytes = match fs::read(&entry.absolute) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to read {}: {}", entry.relative, e);
                return None;
            }
        };

        extract::extract(&entry.extension, &bytes)
    }

    fn to_raw_document(&self, entry: &ShareEntry, text: Option<String>) -> RawDocument {
        let name = Path::new(&entry.relative)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.relative.clone());

        let mut extra = BTreeMap::new();
        extra.insert("extension".to_string(), entry.extension.clone());
        extra.insert("size".to_string(), entry.size.to_string());
        extra.insert("mime_type".to_string(), mime_for(&entry.extension).to_string());
        extra.insert(
            "download_url".to_string(),
            format!("/nas/download/{}", entry.relative),
        );

        RawDocument {
            source_type: SourceType::FileShare,
            source_path: entry.relative.clone(),
            title: name,
            text,
            last_modified: entry.modified,
            extra,
        }
    }
}

#[async_trait]
impl SourceCollector for FileShareCollector {
    fn name(&self) -> &'static str {
        "file-share"
    }

    async fn collect(&self, cancel: &CancelFlag) -> Vec<RawDocument> {
        let entries = self.list_entries();
        info!("listed {} files from share", entries.len());

        let mut documents = Vec::with_capacity(entries.len());
        for entry in &entries {
            if cancel.is_cancelled() {
                warn!("share collection cancelled after {} files", documents.len());
                break;
            }
            let text = self.fetch_content(entry);
            documents.push(self.to_raw_document(entry, text));
        }
        documents
    }
}

struct ShareEntry {
    absolute: PathBuf,
    relative: String,
    extension: String,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

/// Mount must exist, be a directory, and refuse writes. The write
/// probe is created and immediately removed when it unexpectedly
/// succeeds.
fn verify_mount(mount: &Path) -> ShareState {
    if !mount.exists() {
        return ShareState::Disabled(format!("mount {} does not exist", mount.display()));
    }
    if !mount.is_dir() {
        return ShareState::Disabled(format!("mount {} is not a directory", mount.display()));
    }

    let probe = mount.join(WRITE_PROBE_NAME);
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            ShareState::Disabled(format!(
                "mount {} is writable but must be read-only",
                mount.display()
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            // Leftover probe from an earlier run; if we can delete it
            // the mount is writable after all.
            match fs::remove_file(&probe) {
                Ok(_) => ShareState::Disabled(format!(
                    "mount {} is writable but must be read-only",
                    mount.display()
                )),
                Err(_) => ShareState::Ready,
            }
        }
        Err(_) => ShareState::Ready,
    }
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShareConfig;

    fn share_config(max_files: usize) -> ShareConfig {
        ShareConfig {
            mount_path: String::new(),
            max_files,
        }
    }

    #[cfg(unix)]
    fn make_read_only(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o555)).unwrap();
    }

    #[cfg(unix)]
    fn make_writable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_missing_mount_yields_empty_listing() {
        let collector = FileShareCollector::new(
            PathBuf::from("/nonexistent/wissen-share"),
            &share_config(100),
        );
        assert!(!collector.is_enabled());
        assert!(collector.collect(&CancelFlag::new()).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writable_mount_disables_collector() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notiz.txt"), "Inhalt").unwrap();

        let collector = FileShareCollector::new(dir.path().to_path_buf(), &share_config(100));
        assert!(!collector.is_enabled());
        assert!(collector.collect(&CancelFlag::new()).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_mount_lists_allowed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anleitung.txt"), "Anleitung für Laborgeräte").unwrap();
        fs::write(dir.path().join("bild.jpg"), [0xFFu8, 0xD8]).unwrap();
        make_read_only(dir.path());

        let collector = FileShareCollector::new(dir.path().to_path_buf(), &share_config(100));
        if !collector.is_enabled() {
            // An effective-root test run can write anywhere, so the
            // read-only probe cannot be exercised here.
            make_writable(dir.path());
            return;
        }

        let documents = collector.collect(&CancelFlag::new()).await;
        make_writable(dir.path());

        assert_eq!(documents.len(), 1);
        let doc = &documents[0];
        assert_eq!(doc.source_path, "anleitung.txt");
        assert_eq!(doc.title, "anleitung.txt");
        assert_eq!(doc.text.as_deref(), Some("Anleitung für Laborgeräte"));
        assert_eq!(doc.extra.get("mime_type").unwrap(), "text/plain");
        assert_eq!(
            doc.extra.get("download_url").unwrap(),
            "/nas/download/anleitung.txt"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unextractable_format_is_listed_without_text() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alt.doc"), b"legacy binary").unwrap();
        make_read_only(dir.path());

        let collector = FileShareCollector::new(dir.path().to_path_buf(), &share_config(100));
        if !collector.is_enabled() {
            make_writable(dir.path());
            return;
        }
        let documents = collector.collect(&CancelFlag::new()).await;
        make_writable(dir.path());

        assert_eq!(documents.len(), 1);
        assert!(documents[0].text.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_listing_respects_max_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("datei{}.txt", i)), "Inhalt").unwrap();
        }
        make_read_only(dir.path());

        let collector = FileShareCollector::new(dir.path().to_path_buf(), &share_config(3));
        if !collector.is_enabled() {
            make_writable(dir.path());
            return;
        }
        let documents = collector.collect(&CancelFlag::new()).await;
        make_writable(dir.path());

        assert_eq!(documents.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_between_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Inhalt").unwrap();
        fs::write(dir.path().join("b.txt"), "Inhalt").unwrap();
        make_read_only(dir.path());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let collector = FileShareCollector::new(dir.path().to_path_buf(), &share_config(100));
        let documents = collector.collect(&cancel).await;
        make_writable(dir.path());

        assert!(documents.is_empty());
    }
}
