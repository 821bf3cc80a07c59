/// Archive institution codes and their display labels.
pub const INSTITUTIONS: [(&str, &str); 8] = [
    ("01_tokyo", "東京大学"),
    ("02_kyoto", "京都大学"),
    ("03_hokudai", "北海道大学"),
    ("04_tohoku", "東北大学"),
    ("05_nagoya", "名古屋大学"),
    ("06_osaka", "大阪大学"),
    ("07_kyushu", "九州大学"),
    ("08_titech", "東京科学大学"),
];

pub fn label_for(code: &str) -> Option<&'static str> {
    INSTITUTIONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, label)| *label)
}

/// The display label for `code`, or the code itself when it is unknown.
pub fn display_label(code: &str) -> &str {
    label_for(code).unwrap_or(code)
}

/// Replaces a leading `"<code> "` in a title with `"<label> "`.
pub fn relabel_title(title: &str) -> Option<String> {
    INSTITUTIONS.iter().find_map(|(code, label)| {
        title
            .strip_prefix(code)
            .filter(|rest| rest.starts_with(' '))
            .map(|rest| format!("{label}{rest}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_labels() {
        assert_eq!(label_for("01_tokyo"), Some("東京大学"));
        assert_eq!(label_for("東京大学"), None);
        assert_eq!(display_label("99_other"), "99_other");
    }

    #[test]
    fn title_prefix_requires_code_and_space() {
        assert_eq!(
            relabel_title("01_tokyo problem3").as_deref(),
            Some("東京大学 problem3")
        );
        assert_eq!(relabel_title("01_tokyoproblem3"), None);
        assert_eq!(relabel_title("x 01_tokyo problem3"), None);
        assert_eq!(relabel_title("東京大学 problem3"), None);
    }
}
