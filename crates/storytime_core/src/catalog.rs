//! crates/storytime_core/src/catalog.rs
//!
//! The read-only story catalog.

use crate::domain::Story;

const SAMPLE_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    stories: Vec<Story>,
}

impl Catalog {
    pub fn new(stories: Vec<Story>) -> Self {
        Self { stories }
    }

    /// Parses a JSON array of stories.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let stories: Vec<Story> = serde_json::from_str(json)?;
        Ok(Self::new(stories))
    }

    /// The catalog that ships with the app.
    pub fn bundled() -> Result<Self, serde_json::Error> {
        Self::from_json(SAMPLE_CATALOG)
    }

    #[cfg(test)]
    pub(crate) fn bundled_sample() -> Self {
        Self::bundled().expect("bundled catalog is valid JSON")
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, story_id: &str) -> Option<&Story> {
        self.stories.iter().find(|story| story.id == story_id)
    }

    /// Stories matching `predicate`, in catalog order.
    pub fn select<F>(&self, mut predicate: F) -> Vec<Story>
    where
        F: FnMut(&Story) -> bool,
    {
        self.stories
            .iter()
            .filter(|story| predicate(story))
            .cloned()
            .collect()
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for category in self.stories.iter().filter_map(|s| s.category.as_ref()) {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }

    pub fn in_category(&self, category: &str) -> Vec<Story> {
        self.select(|story| {
            story
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category))
        })
    }

    pub fn new_releases(&self) -> Vec<Story> {
        self.select(|story| story.is_new)
    }

    /// Case-insensitive match on title or description. A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<Story> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.stories.clone();
        }
        self.select(|story| {
            story.title.to_lowercase().contains(&needle)
                || story.description.to_lowercase().contains(&needle)
        })
    }
}
