use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable that overrides `/reader/buffer_capacity`.
pub const ENV_BUFFER_CAPACITY: &str = "TER_BUFFER_CAPACITY";

pub const DEFAULT_BUFFER_CAPACITY: usize = 16;

/// Typed view of the keys listed in [`crate::consumed_pointers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSettings {
    pub buffer_capacity: usize,
    pub delimiter: u8,
    pub trim: bool,
    pub pretty: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            delimiter: b',',
            trim: true,
            pretty: false,
        }
    }
}

impl ReaderSettings {
    /// Every key is optional. Present keys must be well-formed.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut s = Self::default();

        // Accept number or numeric string.
        match cfg.pointer("/reader/buffer_capacity") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                let n = n.as_u64().ok_or_else(|| {
                    anyhow!("reader.buffer_capacity must be a positive integer (got {n})")
                })?;
                s.buffer_capacity = capacity_from_u64(n)?;
            }
            Some(Value::String(raw)) => s.buffer_capacity = parse_capacity(raw)?,
            Some(other) => {
                return Err(anyhow!(
                    "reader.buffer_capacity must be a positive integer (got {other})"
                ))
            }
        }

        if let Some(v) = cfg.pointer("/source/delimiter") {
            let raw = v.as_str().context("source.delimiter must be a string")?;
            s.delimiter = parse_delimiter(raw)?;
        }

        if let Some(v) = cfg.pointer("/source/trim") {
            s.trim = v.as_bool().context("source.trim must be a bool")?;
        }

        if let Some(v) = cfg.pointer("/output/pretty") {
            s.pretty = v.as_bool().context("output.pretty must be a bool")?;
        }

        Ok(s)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|k| std::env::var(k).ok())
    }

    /// Same as [`Self::apply_env_overrides`] with an injectable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BUFFER_CAPACITY) {
            self.buffer_capacity = parse_capacity(&raw)
                .with_context(|| format!("invalid {ENV_BUFFER_CAPACITY}"))?;
        }
        Ok(())
    }
}

fn parse_capacity(raw: &str) -> Result<usize> {
    let n: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("buffer capacity must be a positive integer (got '{raw}')"))?;
    capacity_from_u64(n)
}

fn capacity_from_u64(n: u64) -> Result<usize> {
    if n == 0 {
        return Err(anyhow!("buffer capacity must be at least 1"));
    }
    usize::try_from(n).map_err(|_| anyhow!("buffer capacity out of range: {n}"))
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(anyhow!(
            "source.delimiter must be a single ASCII character (got '{raw}')"
        )),
    }
}
