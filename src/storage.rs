use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, ensure};
use tracing::debug;

/// Last partition/queue the user looked at, stored as `partition:queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMemo {
    pub partition: String,
    pub queue: Option<String>,
}

impl SelectionMemo {
    pub fn new(partition: impl Into<String>, queue: Option<String>) -> Self {
        Self {
            partition: partition.into(),
            queue,
        }
    }
}

impl Display for SelectionMemo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.queue {
            Some(queue) => write!(f, "{}:{queue}", self.partition),
            None => f.write_str(&self.partition),
        }
    }
}

impl FromStr for SelectionMemo {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (partition, queue) = match value.split_once(':') {
            Some((partition, queue)) => (partition, Some(queue)),
            None => (value, None),
        };
        ensure!(
            !partition.is_empty(),
            "selection memo `{value}` has no partition"
        );

        Ok(Self {
            partition: partition.to_owned(),
            queue: queue
                .filter(|queue| !queue.is_empty())
                .map(str::to_owned),
        })
    }
}

/// Reads the memo; a missing file means nothing was stored yet.
pub fn load_selection(path: &Path) -> Result<Option<SelectionMemo>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(anyhow!(error))
                .with_context(|| format!("failed to read selection memo `{}`", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    raw.parse::<SelectionMemo>()
        .map(Some)
        .with_context(|| format!("failed to parse selection memo `{}`", path.display()))
}

pub fn save_selection(path: &Path, memo: &SelectionMemo) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    fs::write(path, memo.to_string())
        .with_context(|| format!("failed to write selection memo `{}`", path.display()))?;
    debug!(path = %path.display(), memo = %memo, "selection memo saved");
    Ok(())
}
