use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric label the face recognizer trains and predicts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(pub u32);

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps human-readable identity names to recognizer labels and back.
pub trait IdentityStore: Send {
    /// Key for `hint`, allocating a fresh one the first time a name is seen.
    fn resolve_or_create(&mut self, hint: &str) -> Result<IdentityKey, Box<dyn std::error::Error>>;

    fn lookup(&self, key: IdentityKey) -> Result<Option<String>, Box<dyn std::error::Error>>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    pub key: IdentityKey,
    pub name: String,
}

/// Name/key table shared by the store implementations. Keys start at 1 and
/// are never reused.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityTable {
    identities: Vec<IdentityRecord>,
}

impl IdentityTable {
    pub fn find(&self, name: &str) -> Option<IdentityKey> {
        self.identities.iter().find(|r| r.name == name).map(|r| r.key)
    }

    pub fn name_of(&self, key: IdentityKey) -> Option<&str> {
        self.identities
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.name.as_str())
    }

    /// Returns the key and whether it was newly allocated.
    pub fn resolve_or_insert(&mut self, name: &str) -> (IdentityKey, bool) {
        if let Some(key) = self.find(name) {
            return (key, false);
        }
        let next = self.identities.iter().map(|r| r.key.0).max().unwrap_or(0) + 1;
        let key = IdentityKey(next);
        self.identities.push(IdentityRecord {
            key,
            name: name.to_string(),
        });
        (key, true)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Rejects tables with repeated keys or names.
    pub fn validate(&self) -> Result<(), String> {
        for (i, a) in self.identities.iter().enumerate() {
            for b in &self.identities[i + 1..] {
                if a.key == b.key {
                    return Err(format!("duplicate key {}", a.key));
                }
                if a.name == b.name {
                    return Err(format!("duplicate name {:?}", a.name));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_start_at_one_and_are_stable() {
        let mut table = IdentityTable::default();
        assert_eq!(table.resolve_or_insert("alice"), (IdentityKey(1), true));
        assert_eq!(table.resolve_or_insert("bob"), (IdentityKey(2), true));
        assert_eq!(table.resolve_or_insert("alice"), (IdentityKey(1), false));
        assert_eq!(table.name_of(IdentityKey(2)), Some("bob"));
        assert_eq!(table.name_of(IdentityKey(9)), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut table = IdentityTable::default();
        table.resolve_or_insert("alice");
        assert_eq!(table.find("Alice"), None);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let table: IdentityTable = serde_json::from_str(
            r#"{"identities":[{"key":1,"name":"a"},{"key":1,"name":"b"}]}"#,
        )
        .unwrap();
        assert!(table.validate().is_err());
    }
}
