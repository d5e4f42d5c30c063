use serde::{Deserialize, Serialize};

/// A single article as returned by the search API
///
/// Serializes in the same shape it is received in, so a cached result set
/// decodes back into identical values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(rename = "urlToImage", default)]
    pub image_url: Option<String>,
}

/// Response envelope of the search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
}

/// Error body the API sends alongside non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Article {
    /// Get a preview of the description (first N characters)
    pub fn description_preview(&self, max_len: usize) -> String {
        let text = self.description.as_deref().unwrap_or("");

        if max_len == 0 {
            return String::new();
        }

        if text.chars().count() <= max_len {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_len).collect();
            format!("{}...", truncated)
        }
    }
}

impl SearchResponse {
    /// Article list of the response; an absent list is empty
    pub fn into_articles(self) -> Vec<Article> {
        self.articles.unwrap_or_default()
    }
}
