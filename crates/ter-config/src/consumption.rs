//! Config consumption map and unused-key guard.
//!
//! Each consumer lists the JSON-pointer prefixes it actually reads. A leaf is
//! consumed when it sits under any listed prefix; every other leaf is unused.
//! Prefix `/a/b` consumes `/a/b/c` but not `/a/bc`.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which command is reading the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigConsumer {
    /// `ter read`: source options, buffer and output format.
    Read,
    /// `ter index`: source options only.
    Index,
}

impl ConfigConsumer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigConsumer::Read => "READ",
            ConfigConsumer::Index => "INDEX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumer: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Must match what `ReaderSettings::from_config_json` reads for each consumer.
pub fn consumed_pointers(consumer: ConfigConsumer) -> &'static [&'static str] {
    match consumer {
        ConfigConsumer::Read => &[
            "/reader/buffer_capacity",
            "/source/delimiter",
            "/source/trim",
            "/output/pretty",
        ],
        ConfigConsumer::Index => &["/source/delimiter", "/source/trim"],
    }
}

/// `Fail` returns an error when any leaf is unused; `Warn` always returns the report.
pub fn report_unused_keys(
    consumer: ConfigConsumer,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed_pointers(consumer)
        .iter()
        .map(|p| p.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut pointer = String::new();
    let mut unused = BTreeSet::new();
    visit_leaves(config_json, &mut pointer, &mut |leaf| {
        if !consumed_prefixes.iter().any(|cp| covers(cp, leaf)) {
            unused.insert(leaf.to_string());
        }
    });

    let report = UnusedKeyReport {
        consumer: consumer.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let first: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        bail!(
            "CONFIG_UNUSED_KEYS (consumer={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {:?}",
            report.consumer,
            report.unused_leaf_pointers.len(),
            first
        );
    }

    Ok(report)
}

/// `/a/b` covers `/a/b` and `/a/b/c`, never `/a/bc`.
fn covers(prefix: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Call `on_leaf` with the RFC 6901 pointer of every scalar under `v`.
///
/// `pointer` is the path so far; it is restored before returning. A scalar
/// root is reported as `/`.
fn visit_leaves(v: &Value, pointer: &mut String, on_leaf: &mut dyn FnMut(&str)) {
    let children: Vec<(String, &Value)> = match v {
        Value::Object(map) => map.iter().map(|(k, child)| (k.clone(), child)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| (i.to_string(), child))
            .collect(),
        _ => {
            on_leaf(if pointer.is_empty() { "/" } else { pointer.as_str() });
            return;
        }
    };

    for (token, child) in children {
        let mark = pointer.len();
        pointer.push('/');
        for c in token.chars() {
            match c {
                '~' => pointer.push_str("~0"),
                '/' => pointer.push_str("~1"),
                c => pointer.push(c),
            }
        }
        visit_leaves(child, pointer, on_leaf);
        pointer.truncate(mark);
    }
}
