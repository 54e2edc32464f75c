//! File-backed [`LabelCatalog`].
//!
//! The label file maps `{language: {group: {slug: label}}}`. Titles from the
//! facet catalog are merged in for the default language so that words typed
//! in the store's own language resolve even without a file.

use std::collections::HashMap;
use std::path::Path;

use agora_core::schema::schema_for;
use agora_core::{EntityKind, FacetCatalog, LabelCatalog, Result};
use tracing::{debug, warn};

type Labels = HashMap<String, HashMap<String, HashMap<String, String>>>;

/// Labels loaded from JSON, optionally merged with catalog titles.
#[derive(Debug, Clone, Default)]
pub struct StaticLabelCatalog {
    labels: Labels,
}

impl StaticLabelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let labels: Labels = serde_json::from_str(json)?;
        Ok(Self { labels })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            languages = catalog.labels.len(),
            "Label catalog loaded"
        );
        Ok(catalog)
    }

    /// Load `path` if given, falling back to an empty catalog when the file
    /// cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new();
        };
        match Self::from_file(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Label catalog unavailable, using catalog titles only");
                Self::new()
            }
        }
    }

    /// Add facet titles from the store as labels of `language`, without
    /// overriding labels the file already defines.
    pub fn with_catalog_titles(mut self, catalog: &FacetCatalog, language: &str) -> Self {
        let groups = self.labels.entry(language.to_string()).or_default();
        for kind in EntityKind::ALL {
            for facet in schema_for(kind).facets {
                let Some(table) = facet.value_table() else {
                    continue;
                };
                let group = groups.entry(facet.label_group.to_string()).or_default();
                for value in catalog.values(table) {
                    group
                        .entry(value.slug.clone())
                        .or_insert_with(|| value.title.clone());
                }
            }
        }
        self
    }
}

impl LabelCatalog for StaticLabelCatalog {
    fn slug_for_word(&self, word: &str, group: &str, language: &str) -> Option<String> {
        let labels = self.labels.get(language)?.get(group)?;
        let word = word.to_lowercase();
        let mut matches = labels
            .iter()
            .filter(|(_, label)| label.to_lowercase() == word)
            .map(|(slug, _)| slug);
        let slug = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(slug.clone())
    }

    fn label(&self, slug: &str, group: &str, language: &str) -> Option<String> {
        self.labels.get(language)?.get(group)?.get(slug).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::FacetValue;
    use std::collections::BTreeMap;
    use std::io::Write;

    const LABELS: &str = r#"{
        "en": {
            "area": {"bayern": "Bavaria", "berlin": "Berlin"},
            "periodOfTime": {"past": "Past events"}
        },
        "de": {
            "offer": {"coaching": "Coaching", "mentoring": "coaching"}
        }
    }"#;

    #[test]
    fn test_exact_case_insensitive_lookup() {
        let labels = StaticLabelCatalog::from_json_str(LABELS).unwrap();
        assert_eq!(labels.slug_for_word("bavaria", "area", "en").as_deref(), Some("bayern"));
        assert_eq!(labels.slug_for_word("BAVARIA", "area", "en").as_deref(), Some("bayern"));
        assert_eq!(labels.slug_for_word("bav", "area", "en"), None);
        assert_eq!(labels.slug_for_word("bavaria", "area", "fr"), None);
    }

    #[test]
    fn test_ambiguous_word_has_no_slug() {
        let labels = StaticLabelCatalog::from_json_str(LABELS).unwrap();
        assert_eq!(labels.slug_for_word("coaching", "offer", "de"), None);
    }

    #[test]
    fn test_label() {
        let labels = StaticLabelCatalog::from_json_str(LABELS).unwrap();
        assert_eq!(labels.label("past", "periodOfTime", "en").as_deref(), Some("Past events"));
        assert_eq!(labels.label("past", "periodOfTime", "de"), None);
    }

    #[test]
    fn test_catalog_titles_merge_without_override() {
        let mut values = BTreeMap::new();
        values.insert(
            "area".to_string(),
            vec![FacetValue::new("bayern", "Bayern"), FacetValue::new("hessen", "Hessen")],
        );
        let labels = StaticLabelCatalog::from_json_str(LABELS)
            .unwrap()
            .with_catalog_titles(&FacetCatalog::new(values), "en");
        assert_eq!(labels.label("bayern", "area", "en").as_deref(), Some("Bavaria"));
        assert_eq!(labels.slug_for_word("hessen", "area", "en").as_deref(), Some("hessen"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LABELS.as_bytes()).unwrap();
        let labels = StaticLabelCatalog::from_file(file.path()).unwrap();
        assert_eq!(labels.label("berlin", "area", "en").as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("labels.json");
        assert!(StaticLabelCatalog::from_file(&missing).is_err());
        let labels = StaticLabelCatalog::load_or_default(Some(&missing));
        assert_eq!(labels.label("berlin", "area", "en"), None);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = StaticLabelCatalog::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, agora_core::Error::Serialization(_)));
    }
}
