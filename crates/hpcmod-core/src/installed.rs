use std::collections::BTreeMap;

/// Installed software, keyed by bare name, each with its tags in install order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledIndex {
    entries: BTreeMap<String, Vec<String>>,
}

impl InstalledIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `tag` for `name`; a tag already present keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, tag: impl Into<String>) {
        let tags = self.entries.entry(name.into()).or_default();
        let tag = tag.into();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    pub fn remove(&mut self, name: &str, tag: &str) -> bool {
        let Some(tags) = self.entries.get_mut(name) else {
            return false;
        };
        let before = tags.len();
        tags.retain(|existing| existing != tag);
        let removed = tags.len() != before;
        if tags.is_empty() {
            self.entries.remove(name);
        }
        removed
    }

    pub fn tags(&self, name: &str) -> &[String] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn contains_tag(&self, name: &str, tag: &str) -> bool {
        self.tags(name).iter().any(|existing| existing == tag)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, tags)| (name.as_str(), tags.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filtered(&self, pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return self.clone();
        };
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(name, _)| name.contains(pattern))
                .map(|(name, tags)| (name.clone(), tags.clone()))
                .collect(),
        }
    }
}
