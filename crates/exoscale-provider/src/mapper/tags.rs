//! Tag map updates

use std::collections::BTreeMap;

/// Pairs to delete and pairs to create to move from one tag map to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub remove: BTreeMap<String, String>,
    pub add: BTreeMap<String, String>,
}

impl TagDiff {
    pub fn between(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Self {
        let unchanged = |map: &BTreeMap<String, String>, k: &String, v: &String| {
            map.get(k).is_some_and(|other| other == v)
        };

        Self {
            remove: old
                .iter()
                .filter(|(k, v)| !unchanged(new, *k, *v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            add: new
                .iter()
                .filter(|(k, v)| !unchanged(old, *k, *v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_changed_value_is_removed_then_added() {
        let diff = TagDiff::between(
            &tags(&[("env", "prod"), ("team", "core"), ("old", "x")]),
            &tags(&[("env", "staging"), ("team", "core"), ("new", "y")]),
        );
        assert_eq!(diff.remove, tags(&[("env", "prod"), ("old", "x")]));
        assert_eq!(diff.add, tags(&[("env", "staging"), ("new", "y")]));
    }

    #[test]
    fn test_identical_maps() {
        let same = tags(&[("env", "prod")]);
        assert!(TagDiff::between(&same, &same).is_empty());
    }
}
