use crate::recognition::domain::identity_store::{IdentityKey, IdentityStore, IdentityTable};

/// Identity store that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    table: IdentityTable,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn resolve_or_create(&mut self, hint: &str) -> Result<IdentityKey, Box<dyn std::error::Error>> {
        Ok(self.table.resolve_or_insert(hint).0)
    }

    fn lookup(&self, key: IdentityKey) -> Result<Option<String>, Box<dyn std::error::Error>> {
        Ok(self.table.name_of(key).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_names() {
        let mut store = InMemoryIdentityStore::new();
        let key = store.resolve_or_create("alice").unwrap();
        assert_eq!(store.lookup(key).unwrap().as_deref(), Some("alice"));
        assert_eq!(store.resolve_or_create("alice").unwrap(), key);
    }
}
