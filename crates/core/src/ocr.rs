//! Photographed problems: the image is kept under `uploads/`, transcribed
//! and stored as a new problem document.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::capability::{ImageInput, Transcriber};
use crate::document::Document;
use crate::error::OcrError;
use crate::header::{Header, HeaderValue};
use crate::normalization::normalize_digits;
use crate::store::DocumentStore;

/// Header values applied on top of the transcription.
#[derive(Debug, Clone, Default)]
pub struct Stamp {
    pub university: Option<String>,
    pub exam_year: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub problem_id: String,
    pub upload: PathBuf,
    pub text: String,
}

pub fn load_image(path: &Path) -> Result<ImageInput, OcrError> {
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageInput::mime_for_extension)
        .ok_or_else(|| OcrError::UnsupportedImage(path.to_path_buf()))?;
    let bytes = fs::read(path).map_err(|source| OcrError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ImageInput {
        bytes,
        mime: mime.to_string(),
    })
}

/// Forces `problem_id` and applies the stamp. A transcription without a
/// header gets one with `title` and `problem_id`.
pub fn stamp_document(transcript: &str, problem_id: &str, stamp: &Stamp) -> String {
    let mut doc = Document::parse_lenient(transcript).unwrap_or_else(|_| {
        let mut header = Header::new();
        header.insert("title".to_string(), HeaderValue::str(problem_id));
        Document::new(header, transcript.lines().map(str::to_string).collect())
    });
    doc.set_str("problem_id", problem_id);
    if let Some(university) = stamp.university.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        doc.set_str("university", university);
    }
    if let Some(year) = stamp.exam_year.as_deref().map(str::trim).filter(|y| !y.is_empty()) {
        doc.set_str("exam_year", normalize_digits(year));
    }
    doc.to_text()
}

/// Copies `image` to `uploads/{problem_id}_{filename}`, transcribes it and
/// stores the result. Transcription failures are returned, nothing is stored.
pub fn ingest_image<S, T>(
    store: &S,
    uploads_dir: &Path,
    transcriber: &T,
    image: &Path,
    problem_id: &str,
    stamp: &Stamp,
) -> Result<Ingested, OcrError>
where
    S: DocumentStore + ?Sized,
    T: Transcriber + ?Sized,
{
    let input = load_image(image)?;
    if store.exists(problem_id) {
        return Err(OcrError::DuplicateTarget(problem_id.to_string()));
    }
    let file_name = image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let upload = uploads_dir.join(format!("{problem_id}_{file_name}"));
    fs::create_dir_all(uploads_dir)
        .and_then(|_| fs::write(&upload, &input.bytes))
        .map_err(|source| OcrError::Io {
            path: upload.clone(),
            source,
        })?;

    let transcript = transcriber.transcribe(&input, problem_id)?;
    let text = stamp_document(&transcript, problem_id, stamp);
    if !store.put_new(problem_id, &text)? {
        return Err(OcrError::DuplicateTarget(problem_id.to_string()));
    }
    info!(problem_id, upload = %upload.display(), "[generate] transcribed problem");
    Ok(Ingested {
        problem_id: problem_id.to_string(),
        upload,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalError;
    use crate::store::MemoryStore;
    use tempfile::tempdir;

    struct FixedTranscriber(Result<String, ExternalError>);

    impl Transcriber for FixedTranscriber {
        fn transcribe(
            &self,
            image: &ImageInput,
            problem_id: &str,
        ) -> Result<String, ExternalError> {
            assert_eq!(image.mime, "image/png");
            assert_eq!(problem_id, "abc123def456");
            self.0.clone()
        }
    }

    #[test]
    fn ingest_copies_upload_and_stamps_header() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.png");
        fs::write(&image, b"png").unwrap();
        let store = MemoryStore::new();
        let transcriber = FixedTranscriber(Ok(
            "---\ntitle: \"abc123def456\"\nproblem_id: \"abc123def456\"\n---\n$x$ を求めよ。\n".into(),
        ));
        let stamp = Stamp {
            university: Some("東京大学".into()),
            exam_year: Some("２０２０".into()),
        };
        let uploads = dir.path().join("uploads");
        let ingested =
            ingest_image(&store, &uploads, &transcriber, &image, "abc123def456", &stamp).unwrap();
        assert_eq!(ingested.upload, uploads.join("abc123def456_photo.png"));
        assert_eq!(fs::read(&ingested.upload).unwrap(), b"png");

        let doc = Document::parse(&store.get("abc123def456").unwrap().unwrap()).unwrap();
        assert_eq!(doc.get_str("university"), Some("東京大学"));
        assert_eq!(doc.get_str("exam_year"), Some("2020"));
        assert_eq!(doc.body, vec!["$x$ を求めよ。"]);
    }

    #[test]
    fn transcription_failure_surfaces_and_stores_nothing() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.png");
        fs::write(&image, b"png").unwrap();
        let store = MemoryStore::new();
        let transcriber = FixedTranscriber(Err(ExternalError::EmptyResponse { call: "ocr" }));
        let err = ingest_image(
            &store,
            &dir.path().join("uploads"),
            &transcriber,
            &image,
            "abc123def456",
            &Stamp::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OcrError::Transcription(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("scan.gif");
        fs::write(&image, b"gif").unwrap();
        assert!(matches!(load_image(&image), Err(OcrError::UnsupportedImage(_))));
    }

    #[test]
    fn headerless_transcription_gets_a_header() {
        let text = stamp_document("問題文\n", "id1", &Stamp::default());
        let doc = Document::parse(&text).unwrap();
        assert_eq!(doc.get_str("title"), Some("id1"));
        assert_eq!(doc.problem_id(), Some("id1"));
        assert_eq!(doc.body, vec!["問題文"]);
    }
}
