//! Handout composer: a problem and its solution combined into one
//! presentation document with its own rendering header.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::header::strip_header;

pub const HANDOUT_HEADER: &str = "---
lang: ja
format:
  html:
    theme: default
    toc: false
    number-sections: false
    css: ../static/handout-print.css
---";

const PROVENANCE_LABELS: [&str; 2] = ["元問題 PDF:", "元問題スキャン:"];
const SOLUTION_HEADINGS: [&str; 2] = ["## 解答", "## Solution"];

static HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\hspace\*?\{[^}]*\}").unwrap());
static DESCRIPTION_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\\(?:begin|end)\{description\}\s*$").unwrap());
static DESCRIPTION_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\\item\[([^\]]*)\]\s*(.*)$").unwrap());

/// Problem body without provenance link lines and trailing rules.
pub fn clean_problem_body(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body
        .lines()
        .filter(|line| {
            let line = line.trim();
            !PROVENANCE_LABELS.iter().any(|label| line.starts_with(label))
        })
        .map(str::to_string)
        .collect();
    while lines
        .last()
        .is_some_and(|line| line.trim().is_empty() || line.trim() == "---")
    {
        lines.pop();
    }
    trim_leading_blank(lines)
}

/// Drops leading `## 解答` / `## Solution` headings and the blank lines after
/// them. Applying it twice gives the same result as once.
pub fn strip_solution_heading(body: &str) -> Vec<String> {
    let mut lines = trim_leading_blank(body.lines().map(str::to_string).collect());
    while lines
        .first()
        .is_some_and(|line| SOLUTION_HEADINGS.contains(&line.trim()))
    {
        lines.remove(0);
        lines = trim_leading_blank(lines);
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}

fn trim_leading_blank(lines: Vec<String>) -> Vec<String> {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    lines.into_iter().skip(start).collect()
}

/// Replaces `\hspace{..}` with `\quad` and turns description lists into
/// bold-label paragraphs. Other lines pass through.
pub fn sanitize(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if DESCRIPTION_BOUNDARY.is_match(line) {
            continue;
        }
        let line = HSPACE.replace_all(line, r"\quad ");
        match DESCRIPTION_ITEM.captures(&line) {
            Some(caps) => {
                out.push(format!("**{}** {}", &caps[1], &caps[2]).trim_end().to_string());
                out.push(String::new());
            }
            None => out.push(line.into_owned()),
        }
    }
    out
}

/// Composes the presentation document. Both inputs may carry headers; they
/// are dropped.
pub fn compose(problem_text: &str, solution_text: &str) -> String {
    let problem = sanitize(&clean_problem_body(&strip_header(problem_text)));
    let solution = sanitize(&strip_solution_heading(&strip_header(solution_text)));

    let mut parts: Vec<String> = vec![
        HANDOUT_HEADER.to_string(),
        String::new(),
        "<div class=\"main-wrap\">".to_string(),
        String::new(),
        "<section id=\"problem-section\">".to_string(),
        "# 問題".to_string(),
        String::new(),
    ];
    parts.push(problem.join("\n").trim().to_string());
    parts.extend(
        [
            "</section>",
            "",
            "<section id=\"solution-section\">",
            "# 解答",
            "",
        ]
        .map(String::from),
    );
    parts.push(solution.join("\n").trim().to_string());
    parts.extend(["</section>", "", "</div>"].map(String::from));
    let mut text = parts.join("\n");
    text.push('\n');
    text
}
