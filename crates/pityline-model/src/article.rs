use crate::role::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const SLUG_MAX_LEN: usize = 96;
pub const TITLE_MAX_LEN: usize = 256;

pub fn parse_slug(input: &str) -> Result<String, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError("slug must not be empty".to_string()));
    }
    if input.len() > SLUG_MAX_LEN {
        return Err(ValidationError(format!(
            "slug exceeds max length {SLUG_MAX_LEN}"
        )));
    }
    if !input
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(ValidationError("slug must match [a-z0-9-]+".to_string()));
    }
    if input.starts_with('-') || input.ends_with('-') || input.contains("--") {
        return Err(ValidationError(
            "slug must not start/end with '-' or contain '--'".to_string(),
        ));
    }
    Ok(input.to_string())
}

/// Content section a published article belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    News,
    Guides,
}

impl Section {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input {
            "news" => Ok(Self::News),
            "guides" => Ok(Self::Guides),
            other => Err(ValidationError(format!("unknown section: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Guides => "guides",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub section: Section,
    pub published_at: DateTime<Utc>,
}

/// Listing projection: everything but the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub section: Section,
    pub published_at: DateTime<Utc>,
}

impl From<Article> for ArticleSummary {
    fn from(a: Article) -> Self {
        Self {
            slug: a.slug,
            title: a.title,
            summary: a.summary,
            section: a.section,
            published_at: a.published_at,
        }
    }
}
