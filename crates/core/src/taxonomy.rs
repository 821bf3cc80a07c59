/// Closed vocabulary of classification tags for the `fields` header key.
pub const FIELDS: &[&str] = &[
    "数と式",
    "集合と論証",
    "2次関数",
    "図形と計量",
    "データの分析",
    "場合の数",
    "確率",
    "整数の性質",
    "図形の性質",
    "式と証明",
    "複素数と方程式",
    "図形と方程式",
    "三角関数",
    "指数関数・対数関数",
    "微分法",
    "積分法",
    "数列",
    "統計的な推測",
    "ベクトル",
    "複素数平面",
    "平面上の曲線",
    "極限",
    "微分法の応用",
    "積分法の応用",
];

pub fn is_known(tag: &str) -> bool {
    FIELDS.contains(&tag)
}

/// Drops unknown and repeated tags, keeping first-seen order.
pub fn retain_known<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if is_known(tag) && !out.iter().any(|seen| seen == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retain_known_filters_and_dedupes() {
        let tags = retain_known(&["数列", "unknownTag", " 積分法 ", "数列"]);
        assert_eq!(tags, vec!["数列", "積分法"]);
    }
}
