use std::collections::HashSet;

/// Ids that already produced a record during this run. Only grows.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: HashSet<String>,
}

impl Ledger {
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns false if the id was already present.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_grows() {
        let mut ledger = Ledger::default();
        assert!(!ledger.has_seen("6543"));
        assert!(ledger.mark_seen("6543"));
        assert!(ledger.has_seen("6543"));
        assert!(!ledger.mark_seen("6543"));
        assert_eq!(ledger.len(), 1);
    }
}
