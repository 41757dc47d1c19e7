//! E2E tests for swapping rule bases while conversations are running.

mod helpers;

use fred_chat::config::SessionMode;
use fred_chat::loader::reload_from_files;
use helpers::{ChatHarness, tcp_converse, write_rules};

/// New connections see the reloaded rules; an already open session keeps
/// talking to the rules it started with.
#[tokio::test]
async fn e2e_reload_swaps_for_new_sessions() {
    let h = ChatHarness::from_text(
        "action: greet\nHi there!\n\naction: old\nrepeat: true\nOld rules.\n",
        SessionMode::Shared,
    )
    .await;
    let addr = h.spawn_server().await;
    let mut open = h.handle.open_session().await;

    assert_eq!(tcp_converse(addr, &["x"]).await[1], "Old rules.");

    let path = &h.rule_files[0];
    std::fs::write(path, "action: welcome\nWelcome back.\n\naction: new\nrepeat: true\nNew rules.\n")
        .unwrap();
    let generation = reload_from_files(&h.handle, &h.rule_files).await.unwrap();
    assert_eq!(generation, 2);

    assert_eq!(
        tcp_converse(addr, &["x"]).await,
        vec!["Welcome back.", "New rules."]
    );
    assert_eq!(open.generation(), 1);
    assert_eq!(open.respond("x").await.unwrap(), "Old rules.");
}

/// A reload that fails to parse leaves the running rules in place.
#[tokio::test]
async fn e2e_failed_reload_keeps_serving() {
    let h = ChatHarness::from_text(
        "action: greet\nHi there!\n\naction: more\nrepeat: true\nGo on.\n",
        SessionMode::PerSession,
    )
    .await;
    let addr = h.spawn_server().await;

    let dir = h.rule_files[0].parent().unwrap().to_path_buf();
    let broken = write_rules(&dir, "broken.txt", "action: a\npriority: high\nA\n");
    let err = reload_from_files(&h.handle, &[broken]).await.unwrap_err();
    assert!(format!("{err:#}").contains("priority"));

    assert_eq!(h.handle.generation().await, 1);
    assert_eq!(tcp_converse(addr, &["x"]).await, vec!["Hi there!", "Go on."]);
}
