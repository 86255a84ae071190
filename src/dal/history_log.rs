use std::{fs, io, path::PathBuf};

use crate::domain::history::HistoryEntry;

/// Finished jobs, newest first, kept in a small JSON file.
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        HistoryLog { path }
    }

    /// A missing or unreadable file reads as an empty history.
    pub fn list(&self) -> Vec<HistoryEntry> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!(
                    "Ignoring corrupt history file {}: {:?}",
                    self.path.display(),
                    e
                );
                vec![]
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => vec![],
            Err(e) => {
                log::error!("Failed to read history file {}: {:?}", self.path.display(), e);
                vec![]
            }
        }
    }

    pub fn record(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        let mut history = self.list();
        history.insert(0, entry);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&history)?)?;
        Ok(())
    }
}
