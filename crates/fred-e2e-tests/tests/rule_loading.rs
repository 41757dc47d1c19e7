//! E2E tests for loading rule files from disk.

mod helpers;

use fred_chat::loader::load_rule_files;
use fred_rules::RuleError;
use helpers::{SAMPLE_RULES, scratch_dir, write_rules};

/// The shipped sample loads and summarizes as expected.
#[tokio::test]
async fn e2e_sample_rule_file_summary() {
    let dir = scratch_dir();
    let path = write_rules(&dir, "fred.txt", SAMPLE_RULES);

    let base = load_rule_files(&[path]).await.unwrap();
    let summary = base.summary();
    assert_eq!(summary.actions, 10);
    assert_eq!(summary.intros, 1);
    assert_eq!(summary.responses, 1);
    assert_eq!(summary.regexes, 5);
    assert_eq!(summary.fuzzies, 2);
    assert_eq!(summary.rules, 19);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["first_action"], "hello");
    assert!(
        json["trigger_phrases"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "good morning")
    );
}

/// Rules may reference actions defined in an earlier file, and a later
/// definition of a name replaces the earlier one.
#[tokio::test]
async fn e2e_multiple_files_merge() {
    let dir = scratch_dir();
    let actions = write_rules(&dir, "actions.txt", "action: greet\nHi there!\n\naction: bye\nBye.\n");
    let extra = write_rules(
        &dir,
        "extra.txt",
        "regex: hello\ninvokes: greet\nhello\n\naction: bye\nrepeat: true\nSee you.\n",
    );

    let base = load_rule_files(&[actions, extra]).await.unwrap();
    assert_eq!(base.len(), 3);
    assert_eq!(base.get("bye").unwrap().vector, vec!["See you."]);
    assert!(base.get("bye").unwrap().as_action().unwrap().repeat);
    assert_eq!(base.first_action().unwrap().name, "greet");
}

/// A dangling reference fails the whole load and the error names the file
/// and the offending block.
#[tokio::test]
async fn e2e_dangling_reference_fails_load() {
    let dir = scratch_dir();
    let actions = write_rules(&dir, "actions.txt", "action: greet\nHi there!\n");
    let broken = write_rules(&dir, "broken.txt", "regex: hello\ninvokes: ghost\nhello\n");

    let err = load_rule_files(&[actions, broken]).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("ghost"), "{message}");
    assert!(message.contains("regex: hello"), "{message}");

    let rule_error = err.downcast_ref::<RuleError>().unwrap();
    assert!(matches!(
        rule_error.root(),
        RuleError::UnknownRuleReference { reference, .. } if reference == "ghost"
    ));
}

/// A malformed block reports its starting line within its own file.
#[tokio::test]
async fn e2e_bad_block_reports_line() {
    let dir = scratch_dir();
    let path = write_rules(
        &dir,
        "bad.txt",
        "# comment\naction: ok\nFine.\n\nfuzzy: pets\nlots\tcats\n",
    );

    let err = load_rule_files(&[&path]).await.unwrap_err();
    assert!(format!("{err:#}").contains("bad.txt"));
    match err.downcast_ref::<RuleError>().unwrap() {
        RuleError::RuleLoad { line, source, .. } => {
            assert_eq!(*line, 5);
            assert!(matches!(**source, RuleError::MalformedFuzzyMember { .. }));
        }
        other => panic!("expected RuleLoad, got {other:?}"),
    }
}
