//! Injected external capabilities. Production wiring supplies model-backed
//! implementations; tests use closures or fixed fakes.

use crate::error::ExternalError;

/// Body shown when solution generation fails.
pub const GENERATION_FAILED_BODY: &str = "## 解答\n\n(解答生成に失敗しました。)";

/// Suggests classification tags for a problem body (header already stripped).
/// Failures yield an empty list.
pub trait Classifier {
    fn classify(&self, body: &str) -> Vec<String>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn classify(&self, body: &str) -> Vec<String> {
        self(body)
    }
}

/// Produces a solution body (no header) for a full problem document.
/// Failures yield [`GENERATION_FAILED_BODY`].
pub trait SolutionGenerator {
    fn generate(&self, problem_text: &str, problem_id: &str) -> String;
}

impl<F> SolutionGenerator for F
where
    F: Fn(&str, &str) -> String,
{
    fn generate(&self, problem_text: &str, problem_id: &str) -> String {
        self(problem_text, problem_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageInput {
    /// Mime type from a file extension; only jpg/jpeg/png are accepted.
    pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            _ => None,
        }
    }
}

/// Transcribes a photographed problem into a complete document
/// (header and body). Failures surface to the caller.
pub trait Transcriber {
    fn transcribe(&self, image: &ImageInput, problem_id: &str) -> Result<String, ExternalError>;
}
