use examdoc_core::{
    parse_header, render_header, Document, FieldsMerge, Header, HeaderValue,
    LabelCanonicalization, NormalizeError, Normalizer, NumberExtraction, Outcome, ReorderNumber,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn header_render_parse_roundtrip(header in header_strategy()) {
        let rendered = render_header(&header);
        let parsed = parse_header(&rendered).expect("rendered header parses");
        prop_assert_eq!(&parsed, &header);
        prop_assert_eq!(render_header(&parsed), rendered);
    }

    #[test]
    fn document_text_roundtrip(header in header_strategy(), body in body_strategy()) {
        let doc = Document::new(header, body);
        let text = doc.to_text();
        let parsed = Document::parse(&text).expect("document parses");
        prop_assert_eq!(&parsed, &doc);
        prop_assert_eq!(parsed.to_text(), text);
    }

    #[test]
    fn number_extraction_second_run_never_changes(
        number in "[0-9０-９]{1,4}",
        rest in prop::collection::vec("[a-zあ-ん][a-zあ-ん ]{0,10}", 0..4),
    ) {
        let mut body = vec![number];
        body.extend(rest);
        let mut header = Header::new();
        header.insert("problem_id".into(), HeaderValue::str("p"));
        let doc = Document::new(header, body);
        let Outcome::Changed(once) = NumberExtraction.apply(&doc).expect("leading number") else {
            panic!("expected a change");
        };
        let number = once.get_str("problem_number").expect("number stored");
        prop_assert!(number.chars().all(|c| c.is_ascii_digit()));
        let second = NumberExtraction.apply(&once);
        prop_assert!(matches!(
            second,
            Err(NormalizeError::NoLeadingNumber) | Err(NormalizeError::EmptyBody)
        ));
    }

    #[test]
    fn header_normalizers_are_idempotent(header in header_strategy(), tags in tag_strategy()) {
        let doc = Document::new(header, vec!["body".into()]);
        let merge = FieldsMerge::new(&tags);
        let passes: [&dyn Normalizer; 3] = [&LabelCanonicalization, &ReorderNumber, &merge];
        for pass in passes {
            let once = match pass.apply(&doc).expect("header passes never refuse") {
                Outcome::Changed(next) => next,
                Outcome::Unchanged => doc.clone(),
            };
            prop_assert_eq!(pass.apply(&once).expect("second run"), Outcome::Unchanged);
        }
    }
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 あ-ん一-龥:#,'\"\\\\\\[\\]{}-]{0,16}"
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,8}",
        Just("university".to_string()),
        Just("title".to_string()),
        Just("exam_year".to_string()),
        Just("problem_number".to_string()),
        Just("format".to_string()),
    ]
}

fn value_strategy() -> impl Strategy<Value = HeaderValue> {
    let leaf = prop_oneof![
        text_strategy().prop_map(HeaderValue::Str),
        Just(HeaderValue::str("01_tokyo")),
        prop::collection::vec(text_strategy(), 0..4).prop_map(HeaderValue::List),
    ];
    leaf.prop_recursive(2, 12, 4, |inner| {
        prop::collection::vec(("[a-z][a-z0-9_-]{0,6}", inner), 0..4)
            .prop_map(|entries| HeaderValue::Map(entries.into_iter().collect()))
    })
}

fn header_strategy() -> impl Strategy<Value = Header> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

fn body_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[^\r\n]{0,24}", 0..6)
}

fn tag_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            Just("数列".to_string()),
            Just("積分法".to_string()),
            Just("unknownTag".to_string()),
        ],
        0..4,
    )
}
