use std::fmt;

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, rename = "urlToImage", deserialize_with = "empty_as_none")]
    pub url_to_image: Option<String>,
}

impl Article {
    /// Text read aloud by the Listen action
    pub fn speech_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{}. {}", self.title, description),
            None => self.title.clone(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

/// Topical filter applied by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Science => "Science",
            Category::Health => "Health",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryState {
    pub category: Category,
    /// Free-text filter; empty means no filter
    pub query: String,
}
