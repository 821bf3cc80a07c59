use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render tool {tool:?} not found; install Quarto or set EXAMDOC_QUARTO")]
    ToolMissing { tool: String },
    #[error("render failed with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("render finished but {0:?} was not produced")]
    ArtifactMissing(PathBuf),
    #[error("could not start render tool: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Page path produced for a `.qmd` source.
pub fn artifact_for(source: &Path) -> PathBuf {
    source.with_extension("html")
}

/// Runs `{tool} render <file> --to html` inside the source's directory and
/// returns the produced page.
pub fn render_page(tool: &str, source: &Path) -> Result<PathBuf, RenderError> {
    let dir = source
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = source.file_name().unwrap_or(source.as_os_str());
    debug!(tool, source = %source.display(), "rendering");
    let output = Command::new(tool)
        .arg("render")
        .arg(file_name)
        .args(["--to", "html"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => RenderError::ToolMissing {
                tool: tool.to_string(),
            },
            _ => RenderError::Spawn(err),
        })?;
    if !output.status.success() {
        return Err(RenderError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let artifact = artifact_for(source);
    if !artifact.is_file() {
        return Err(RenderError::ArtifactMissing(artifact));
    }
    info!(page = %artifact.display(), "rendered");
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_replaces_extension() {
        assert_eq!(
            artifact_for(Path::new("output/abc_handout.qmd")),
            PathBuf::from("output/abc_handout.html")
        );
    }

    #[test]
    fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x_handout.qmd");
        std::fs::write(&source, "---\n---\n").unwrap();
        let err = render_page("examdoc-no-such-render-tool", &source).unwrap_err();
        assert!(matches!(err, RenderError::ToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x_handout.qmd");
        std::fs::write(&source, "---\n---\n").unwrap();
        let err = render_page("false", &source).unwrap_err();
        assert!(matches!(err, RenderError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn silent_tool_without_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x_handout.qmd");
        std::fs::write(&source, "---\n---\n").unwrap();
        let err = render_page("true", &source).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ArtifactMissing(path) if path.ends_with("x_handout.html")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn existing_artifact_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x_handout.qmd");
        std::fs::write(&source, "---\n---\n").unwrap();
        std::fs::write(dir.path().join("x_handout.html"), "<html></html>").unwrap();
        assert_eq!(render_page("true", &source).unwrap(), dir.path().join("x_handout.html"));
    }
}
