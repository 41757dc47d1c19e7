//! Rule-file loading from disk.

use std::path::Path;

use anyhow::Context;

use fred_rules::{RuleBase, RuleBaseBuilder};

use crate::shared::EngineHandle;

/// Read each file in order into one builder and compile the result.
///
/// Any unreadable file or failing block aborts the whole load.
pub async fn load_rule_files<P: AsRef<Path>>(paths: &[P]) -> anyhow::Result<RuleBase> {
    let mut builder = RuleBaseBuilder::new();

    for path in paths {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading rule file {}", path.display()))?;
        builder
            .add_text(&text)
            .with_context(|| format!("loading rules from {}", path.display()))?;
        tracing::info!(path = %path.display(), rules = builder.len(), "rule file read");
    }

    let base = builder.build().context("compiling rule base")?;
    tracing::info!(
        rules = base.len(),
        actions = base.actions().len(),
        trigger_phrases = base.regex_phrases().len(),
        "rule base loaded"
    );
    Ok(base)
}

/// Load the rule files afresh and swap them into `handle`. On failure the
/// handle keeps serving its current rule base.
pub async fn reload_from_files<P: AsRef<Path>>(
    handle: &EngineHandle,
    paths: &[P],
) -> anyhow::Result<u64> {
    let base = load_rule_files(paths).await?;
    Ok(handle.reload(base).await)
}
