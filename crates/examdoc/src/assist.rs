//! Model-backed implementations of the core capability traits.

use examdoc_core::{
    retain_known, Classifier, ExternalError, ImageInput, SolutionGenerator, Transcriber,
    FIELDS, GENERATION_FAILED_BODY,
};
use examdoc_llm::{ImagePart, LlmClient, LlmRequest};
use tracing::{debug, warn};

use crate::config::ExamdocConfig;

const CLASSIFY_MAX_TOKENS: u32 = 512;
const GENERATE_MAX_TOKENS: u32 = 4096;

const CLASSIFY_SYSTEM_PROMPT: &str = "あなたは高校数学の問題を分類する数学の教員です。

与えられた問題文（日本語、qmd互換テキスト）に対して、以下の分野リストから
最も適切だと思われる分野タグを1〜3個選んでください。

分野リスト:
{field_list}

ルール:
- 問題文の内容から判断し、当てはまるものだけ選ぶこと。
- 迷う場合は主要な分野を優先して 1〜2 個に絞ること。
- 出力は YAML 形式で、以下の形だけを返してください:

---
fields: [\"タグ1\", \"タグ2\"]
---

それ以外の文章や説明は一切書かないでください。
";

const CLASSIFY_USER_PREFIX: &str =
    "以下は高校数学の問題文です。指定の YAML 形式で分野タグを返してください。\n\n";

const TRANSCRIBE_SYSTEM_PROMPT: &str = r#"You are an OCR assistant for mathematical exam problems.
You receive a photo of a math problem and must output only a Quarto-compatible Markdown (qmd) of the problem statement.

Requirements:
- Detect and transcribe all text and math formulas.
- Use inline math as $...$.
- Use display math as $$ ... $$ on separate lines.
- Do NOT use \[ ... \] or any LaTeX environments like \begin{align}.
- Preserve line breaks in a natural way, suitable for exam problems.
- Do NOT invent problem statements; strictly follow the image.
- Output MUST be a complete qmd document starting with a YAML header.

YAML header template (fill title with the problem_id you are given and keep problem_id field):
---
title: "{problem_id}"
problem_id: "{problem_id}"
format:
  html:
    math: mathjax
---

After the YAML header, write the problem text as qmd.
Do not include explanations or answers, only the problem statement.
"#;

const TRANSCRIBE_USER_PROMPT: &str =
    "以下の画像から、指定のルールに従って qmd 形式で問題文だけを書き起こしてください。";

const SOLUTION_SYSTEM_PROMPT: &str = "あなたは高校数学〜大学入試レベルの模範解答を作成する数学講師です。

# 役割
- 与えられた問題文（Quarto互換の qmd）に対して、日本語で丁寧な模範解答を作成します。
- 誘導がある場合は必ず従って解答を構成します。
- 途中式を省略せず、論理の飛躍を避けて説明します。
- 証明問題では、日本語の文章を丁寧に書き、理由を明記します。

# 出力形式
- 出力は qmd 互換の Markdown とします。
- 数式のルール：
  - インライン数式は $...$ を用いる。
  - ディスプレイ数式は $$ ... $$ を用い、前後を空行で囲む。
  - \\[ ... \\] や \\begin{align} などの環境は使用しない。
- 問題本文をそのまま繰り返さず、「解答」だけを記述します。
- 見出しとして `## 解答` を最初に置いてください。

# 重要
- 解答が複数の小問に分かれる場合は、(1),(2),... のようなラベルを明示してください。
- 定義や定理を使うときは、何を用いたかを文章で簡潔に述べてください。
";

const SOLUTION_USER_PREFIX: &str = "以下は大学入試数学の問題文です。これに対する模範解答を、指定された qmd 形式で作成してください。\n\n";

pub fn classify_system_prompt() -> String {
    let field_list = FIELDS
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    CLASSIFY_SYSTEM_PROMPT.replace("{field_list}", &field_list)
}

pub fn transcribe_system_prompt(problem_id: &str) -> String {
    TRANSCRIBE_SYSTEM_PROMPT.replace("{problem_id}", problem_id)
}

/// Extracts the tags of the first `fields: [...]` line. Items are unquoted
/// and anything outside the vocabulary is dropped.
pub fn parse_fields_response(content: &str) -> Vec<String> {
    let Some(line) = content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("fields:"))
    else {
        return Vec::new();
    };
    let Some((_, rest)) = line.split_once('[') else {
        return Vec::new();
    };
    let inside = rest.rsplit_once(']').map_or(rest, |(inside, _)| inside);
    let items: Vec<&str> = inside
        .split(',')
        .map(|item| item.trim().trim_matches(|c: char| c == '"' || c == '\''))
        .filter(|item| !item.is_empty())
        .collect();
    retain_known(&items)
}

pub struct LlmClassifier {
    client: LlmClient,
}

impl LlmClassifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl Classifier for LlmClassifier {
    fn classify(&self, body: &str) -> Vec<String> {
        let body = body.trim();
        if body.is_empty() {
            return Vec::new();
        }
        let req = LlmRequest {
            system: Some(classify_system_prompt()),
            user: format!("{CLASSIFY_USER_PREFIX}{body}"),
            image: None,
            max_completion_tokens: Some(CLASSIFY_MAX_TOKENS),
        };
        match self.client.chat_blocking(&req) {
            Ok(resp) => {
                debug!(tokens = resp.total_tokens(), "classification reply");
                parse_fields_response(&resp.content)
            }
            Err(err) => {
                warn!(reason = %err, "classification failed");
                Vec::new()
            }
        }
    }
}

pub struct LlmSolver {
    client: LlmClient,
}

impl LlmSolver {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl SolutionGenerator for LlmSolver {
    fn generate(&self, problem_text: &str, problem_id: &str) -> String {
        let req = LlmRequest {
            system: Some(SOLUTION_SYSTEM_PROMPT.to_string()),
            user: format!("{SOLUTION_USER_PREFIX}{problem_text}"),
            image: None,
            max_completion_tokens: Some(GENERATE_MAX_TOKENS),
        };
        match self.client.chat_blocking(&req) {
            Ok(resp) if !resp.content.trim().is_empty() => resp.content,
            Ok(_) => {
                warn!(problem_id, "solution generation returned nothing");
                GENERATION_FAILED_BODY.to_string()
            }
            Err(err) => {
                warn!(problem_id, reason = %err, "solution generation failed");
                GENERATION_FAILED_BODY.to_string()
            }
        }
    }
}

pub struct LlmTranscriber {
    client: LlmClient,
}

impl LlmTranscriber {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl Transcriber for LlmTranscriber {
    fn transcribe(&self, image: &ImageInput, problem_id: &str) -> Result<String, ExternalError> {
        let req = LlmRequest {
            system: Some(transcribe_system_prompt(problem_id)),
            user: TRANSCRIBE_USER_PROMPT.to_string(),
            image: Some(ImagePart {
                mime: image.mime.clone(),
                data: image.bytes.clone(),
            }),
            max_completion_tokens: Some(GENERATE_MAX_TOKENS),
        };
        let resp = self
            .client
            .chat_blocking(&req)
            .map_err(|err| ExternalError::CallFailed {
                call: "transcribe",
                message: format!("{err:#}"),
            })?;
        if resp.content.trim().is_empty() {
            return Err(ExternalError::EmptyResponse { call: "transcribe" });
        }
        Ok(resp.content)
    }
}

/// The three model roles, each on its own configured model.
pub struct Assistants {
    pub classifier: LlmClassifier,
    pub solver: LlmSolver,
    pub transcriber: LlmTranscriber,
}

impl Assistants {
    pub fn from_config(cfg: &ExamdocConfig) -> anyhow::Result<Self> {
        Ok(Self {
            classifier: LlmClassifier::new(LlmClient::new(cfg.provider, &cfg.classify_model)?),
            solver: LlmSolver::new(LlmClient::new(cfg.provider, &cfg.solution_model)?),
            transcriber: LlmTranscriber::new(LlmClient::new(cfg.provider, &cfg.vision_model)?),
        })
    }
}
