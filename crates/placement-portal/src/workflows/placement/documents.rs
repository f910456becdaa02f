use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use mime::Mime;
use tracing::{info, warn};

use super::domain::{DocumentKind, DocumentRef};

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Accepts an uploaded blob and hands back a reference the records can keep.
pub trait DocumentStore: Send + Sync {
    fn store(
        &self,
        kind: DocumentKind,
        file_name: &str,
        contents: &[u8],
    ) -> Result<DocumentRef, DocumentError>;

    /// Returns `reference` as this store issued it, or `NotIssued` when the
    /// store never handed it out.
    fn verify(&self, reference: &DocumentRef) -> Result<DocumentRef, DocumentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("'{0}' is not a usable file name")]
    InvalidFileName(String),
    #[error("{kind} uploads do not accept {content_type}")]
    UnsupportedType {
        kind: DocumentKind,
        content_type: String,
    },
    #[error("uploaded file is empty")]
    Empty,
    #[error("document '{0}' was not issued by this store")]
    NotIssued(String),
    #[error("document storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce a client supplied name to its final path component.
pub(crate) fn sanitize_file_name(raw: &str) -> Result<String, DocumentError> {
    let name = Path::new(raw.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() || name.starts_with('.') {
        return Err(DocumentError::InvalidFileName(raw.to_string()));
    }
    Ok(name.to_string())
}

fn accepts(kind: DocumentKind, content_type: &Mime) -> bool {
    match kind {
        DocumentKind::Resume => {
            *content_type == mime::APPLICATION_PDF
                || *content_type == mime::TEXT_PLAIN
                || content_type.essence_str() == DOCX
        }
        DocumentKind::Logo => content_type.type_() == mime::IMAGE,
    }
}

/// Validate name, size, and type; returns the sanitised name and content type.
pub(crate) fn classify(
    kind: DocumentKind,
    file_name: &str,
    contents: &[u8],
) -> Result<(String, Mime), DocumentError> {
    let file_name = sanitize_file_name(file_name)?;
    if contents.is_empty() {
        return Err(DocumentError::Empty);
    }
    let content_type = content_type_for(kind, &file_name)?;
    Ok((file_name, content_type))
}

fn content_type_for(kind: DocumentKind, file_name: &str) -> Result<Mime, DocumentError> {
    let content_type = mime_guess::from_path(file_name).first_or_octet_stream();
    if !accepts(kind, &content_type) {
        return Err(DocumentError::UnsupportedType {
            kind,
            content_type: content_type.to_string(),
        });
    }
    Ok(content_type)
}

/// Writes uploads below `<root>/resumes` and `<root>/logos`.
///
/// Every upload gets its own file; an existing file is never opened for writing.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    sequence: Arc<AtomicU64>,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Claims a fresh `<millis>-<seq>-<name>` path, moving past names another
    /// store or process already took.
    fn create_unique(&self, directory: &Path, file_name: &str) -> io::Result<(PathBuf, File)> {
        let stamp = Utc::now().timestamp_millis();
        loop {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let path = directory.join(format!("{stamp}-{sequence:04}-{file_name}"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl DocumentStore for LocalDocumentStore {
    fn store(
        &self,
        kind: DocumentKind,
        file_name: &str,
        contents: &[u8],
    ) -> Result<DocumentRef, DocumentError> {
        let (file_name, content_type) = classify(kind, file_name, contents)?;
        let directory = self.root.join(kind.directory());
        fs::create_dir_all(&directory)?;

        let (path, mut file) = self.create_unique(&directory, &file_name)?;
        file.write_all(contents)?;
        file.sync_all()?;

        info!(kind = kind.label(), path = %path.display(), "stored uploaded document");

        Ok(DocumentRef {
            kind,
            file_name,
            location: path.to_string_lossy().into_owned(),
            content_type: content_type.to_string(),
        })
    }

    fn verify(&self, reference: &DocumentRef) -> Result<DocumentRef, DocumentError> {
        let not_issued = || DocumentError::NotIssued(reference.location.clone());
        let file_name = sanitize_file_name(&reference.file_name).map_err(|_| not_issued())?;
        let path = PathBuf::from(&reference.location);
        let directory = self.root.join(reference.kind.directory());

        let stored_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(not_issued)?;
        if path.parent() != Some(directory.as_path())
            || !stored_name.ends_with(&format!("-{file_name}"))
            || !path.is_file()
        {
            warn!(location = %reference.location, "rejected document reference");
            return Err(not_issued());
        }

        let content_type = content_type_for(reference.kind, &file_name)?;
        Ok(DocumentRef {
            kind: reference.kind,
            file_name,
            location: reference.location.clone(),
            content_type: content_type.to_string(),
        })
    }
}

/// Keeps uploads in memory; used by the demo command and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    blobs: Mutex<BTreeMap<String, (DocumentRef, Vec<u8>)>>,
}

impl MemoryDocumentStore {
    pub fn contents(&self, location: &str) -> Option<Vec<u8>> {
        let blobs = self.blobs.lock().ok()?;
        blobs.get(location).map(|(_, contents)| contents.clone())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn store(
        &self,
        kind: DocumentKind,
        file_name: &str,
        contents: &[u8],
    ) -> Result<DocumentRef, DocumentError> {
        let (file_name, content_type) = classify(kind, file_name, contents)?;
        let mut blobs = self.blobs.lock().map_err(|_| {
            DocumentError::Io(std::io::Error::other("document store mutex poisoned"))
        })?;
        let location = format!(
            "memory://{}/{:04}-{}",
            kind.directory(),
            blobs.len() + 1,
            file_name
        );
        let reference = DocumentRef {
            kind,
            file_name,
            location: location.clone(),
            content_type: content_type.to_string(),
        };
        blobs.insert(location, (reference.clone(), contents.to_vec()));
        Ok(reference)
    }

    fn verify(&self, reference: &DocumentRef) -> Result<DocumentRef, DocumentError> {
        let blobs = self.blobs.lock().map_err(|_| {
            DocumentError::Io(std::io::Error::other("document store mutex poisoned"))
        })?;
        match blobs.get(&reference.location) {
            Some((issued, _)) if issued.kind == reference.kind => Ok(issued.clone()),
            _ => Err(DocumentError::NotIssued(reference.location.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(
            sanitize_file_name("../../etc/cv.pdf").expect("usable name"),
            "cv.pdf"
        );
        assert!(matches!(
            sanitize_file_name(".."),
            Err(DocumentError::InvalidFileName(_))
        ));
        assert!(matches!(
            sanitize_file_name(".env"),
            Err(DocumentError::InvalidFileName(_))
        ));
    }

    #[test]
    fn resumes_accept_pdf_docx_and_text() {
        for name in ["cv.pdf", "cv.docx", "cv.txt"] {
            assert!(
                classify(DocumentKind::Resume, name, b"data").is_ok(),
                "{name} should be accepted"
            );
        }
        assert!(matches!(
            classify(DocumentKind::Resume, "cv.exe", b"data"),
            Err(DocumentError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn logos_must_be_images() {
        let (_, content_type) =
            classify(DocumentKind::Logo, "acme.png", b"png").expect("png accepted");
        assert_eq!(content_type, mime::IMAGE_PNG);
        assert!(classify(DocumentKind::Logo, "acme.pdf", b"pdf").is_err());
    }

    #[test]
    fn empty_uploads_are_rejected() {
        assert!(matches!(
            classify(DocumentKind::Resume, "cv.pdf", b""),
            Err(DocumentError::Empty)
        ));
    }

    #[test]
    fn local_store_writes_under_kind_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalDocumentStore::new(dir.path());

        let reference = store
            .store(DocumentKind::Resume, "cv.pdf", b"%PDF-1.7")
            .expect("stored");

        assert_eq!(reference.file_name, "cv.pdf");
        assert_eq!(reference.content_type, "application/pdf");
        let path = PathBuf::from(&reference.location);
        assert!(path.starts_with(dir.path().join("resumes")));
        assert_eq!(fs::read(path).expect("readable"), b"%PDF-1.7");
    }

    #[test]
    fn same_named_uploads_keep_their_own_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalDocumentStore::new(dir.path());

        let stored: Vec<(DocumentRef, Vec<u8>)> = (0..50)
            .map(|round| {
                let contents = format!("resume #{round}").into_bytes();
                let reference = store
                    .store(DocumentKind::Resume, "cv.pdf", &contents)
                    .expect("stored");
                (reference, contents)
            })
            .collect();

        for (reference, contents) in &stored {
            assert_eq!(reference.file_name, "cv.pdf");
            assert_eq!(&fs::read(&reference.location).expect("readable"), contents);
        }
    }

    #[test]
    fn separate_stores_on_one_directory_do_not_clobber() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = LocalDocumentStore::new(dir.path());
        let second = LocalDocumentStore::new(dir.path());

        let a = first
            .store(DocumentKind::Resume, "cv.pdf", b"first")
            .expect("stored");
        let b = second
            .store(DocumentKind::Resume, "cv.pdf", b"second")
            .expect("stored");

        assert_ne!(a.location, b.location);
        assert_eq!(fs::read(&a.location).expect("readable"), b"first");
        assert_eq!(fs::read(&b.location).expect("readable"), b"second");
    }

    #[test]
    fn local_store_verifies_only_its_own_references() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalDocumentStore::new(dir.path().join("uploads"));
        let issued = store
            .store(DocumentKind::Resume, "cv.pdf", b"%PDF-1.7")
            .expect("stored");

        let tampered = DocumentRef {
            content_type: "text/html".to_string(),
            ..issued.clone()
        };
        assert_eq!(store.verify(&tampered).expect("issued"), issued);

        let outside = dir.path().join("cv.pdf");
        fs::write(&outside, b"%PDF-1.7").expect("write");
        let forged = [
            DocumentRef {
                location: outside.to_string_lossy().into_owned(),
                ..issued.clone()
            },
            DocumentRef {
                location: format!("{}/../../cv.pdf", issued.location),
                ..issued.clone()
            },
            DocumentRef {
                kind: DocumentKind::Logo,
                ..issued.clone()
            },
            DocumentRef {
                location: issued.location.replace("cv.pdf", "other.pdf"),
                ..issued.clone()
            },
        ];
        for reference in forged {
            assert!(
                matches!(store.verify(&reference), Err(DocumentError::NotIssued(_))),
                "{reference:?} should be refused"
            );
        }
    }

    #[test]
    fn memory_store_verifies_issued_references() {
        let store = MemoryDocumentStore::default();
        let issued = store
            .store(DocumentKind::Logo, "acme.png", b"png-bytes")
            .expect("stored");
        assert_eq!(store.verify(&issued).expect("issued"), issued);

        let foreign = DocumentRef {
            location: "memory://logos/0099-acme.png".to_string(),
            ..issued
        };
        assert!(matches!(
            store.verify(&foreign),
            Err(DocumentError::NotIssued(_))
        ));
    }

    #[test]
    fn memory_store_keeps_blobs_retrievable() {
        let store = MemoryDocumentStore::default();
        let reference = store
            .store(DocumentKind::Logo, "acme.png", b"png-bytes")
            .expect("stored");
        assert_eq!(
            store.contents(&reference.location),
            Some(b"png-bytes".to_vec())
        );
    }
}
