use std::collections::HashSet;

/// Identifiers already accepted by this job or by earlier runs.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<I>(&mut self, existing_ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.seen.extend(
            existing_ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        );
    }

    pub fn accept(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
