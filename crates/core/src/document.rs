use crate::error::DocError;
use crate::header::{
    parse_header, parse_header_lenient, render_header, repair_header_lines, split, Header,
    HeaderValue, DELIMITER,
};

/// A header plus body. Body lines carry no trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub header: Header,
    pub body: Vec<String>,
}

impl Document {
    pub fn new(header: Header, body: Vec<String>) -> Self {
        Self { header, body }
    }

    /// Strict parse: headerless and unparsable headers are both errors.
    pub fn parse(text: &str) -> Result<Self, DocError> {
        let parts = split(text)?;
        let header = parse_header(&parts.header)?;
        Ok(Self::new(header, to_owned_lines(&parts.body)))
    }

    /// Unparsable header text becomes an empty header; a missing header
    /// boundary is still an error.
    pub fn parse_lenient(text: &str) -> Result<Self, DocError> {
        let parts = split(text)?;
        let header = parse_header_lenient(&parts.header);
        Ok(Self::new(header, to_owned_lines(&parts.body)))
    }

    /// Runs [`repair_header_lines`] before parsing. Returns the repairs made.
    pub fn parse_repaired(text: &str) -> Result<(Self, Vec<String>), DocError> {
        let parts = split(text)?;
        let repaired = repair_header_lines(&parts.header);
        let header = parse_header(&repaired.lines)?;
        Ok((
            Self::new(header, to_owned_lines(&parts.body)),
            repaired.repairs,
        ))
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.header.len() + self.body.len() + 2);
        lines.push(DELIMITER.to_string());
        lines.extend(render_header(&self.header));
        lines.push(DELIMITER.to_string());
        lines.extend(self.body.iter().cloned());
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.header.get(key).and_then(HeaderValue::as_str)
    }

    pub fn set_str(&mut self, key: &str, value: impl Into<String>) {
        self.header.insert(key.to_string(), HeaderValue::str(value));
    }

    pub fn problem_id(&self) -> Option<&str> {
        self.get_str("problem_id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn body_text(&self) -> String {
        self.body.join("\n")
    }
}

fn to_owned_lines(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}
