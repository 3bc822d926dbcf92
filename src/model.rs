use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Article as served by a backend fetch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    List,
    Get { id: String },
    Search { keyword: String },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get { .. } => "get",
            Operation::Search { .. } => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub operation: Operation,
    pub target_domain: Option<String>,
}

impl RequestEnvelope {
    pub fn list(domain: impl Into<String>) -> Self {
        Self {
            operation: Operation::List,
            target_domain: Some(domain.into()),
        }
    }

    pub fn get(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            operation: Operation::Get { id: id.into() },
            target_domain: Some(domain.into()),
        }
    }

    /// Search every registered site when `domain` is `None`.
    pub fn search(keyword: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            operation: Operation::Search {
                keyword: keyword.into(),
            },
            target_domain: domain,
        }
    }
}

/// Raw outcome of one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Articles(Vec<Article>),
    Article(Article),
}

impl Reply {
    pub fn into_articles(self) -> Vec<Article> {
        match self {
            Reply::Articles(articles) => articles,
            Reply::Article(article) => vec![article],
        }
    }
}

/// An article tagged with the site it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteArticle {
    pub domain: String,
    pub article: Article,
}

impl SiteArticle {
    pub fn new(domain: impl Into<String>, article: Article) -> Self {
        Self {
            domain: domain.into(),
            article,
        }
    }

    /// Most recent first, then site domain, then article id.
    pub fn merge_order(&self, other: &Self) -> Ordering {
        other
            .article
            .timestamp
            .cmp(&self.article.timestamp)
            .then_with(|| self.domain.cmp(&other.domain))
            .then_with(|| self.article.id.cmp(&other.article.id))
    }
}

/// Best-effort result of a fan-out across several sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub articles: Vec<SiteArticle>,
    pub per_site_errors: BTreeMap<String, BackendError>,
    /// Every domain a call was issued to, in dispatch order.
    pub dispatched: Vec<String>,
}

impl AggregateResult {
    pub fn source_count(&self) -> usize {
        self.dispatched.len()
    }

    pub fn failed_count(&self) -> usize {
        self.per_site_errors.len()
    }

    pub fn is_complete(&self) -> bool {
        self.per_site_errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Articles(Vec<SiteArticle>),
    Article(SiteArticle),
    Aggregate(AggregateResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(id: &str, secs: i64) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {}", id),
            body: String::new(),
            summary: String::new(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            website: None,
        }
    }

    #[test]
    fn test_merge_order_newest_first() {
        let newer = SiteArticle::new("b", article("1", 20));
        let older = SiteArticle::new("a", article("2", 10));
        assert_eq!(newer.merge_order(&older), Ordering::Less);
        assert_eq!(older.merge_order(&newer), Ordering::Greater);
    }

    #[test]
    fn test_merge_order_ties_by_domain_then_id() {
        let a1 = SiteArticle::new("site-a", article("1", 10));
        let a2 = SiteArticle::new("site-a", article("2", 10));
        let b1 = SiteArticle::new("site-b", article("1", 10));

        assert_eq!(a2.merge_order(&b1), Ordering::Less);
        assert_eq!(a1.merge_order(&a2), Ordering::Less);
        assert_eq!(a1.merge_order(&a1.clone()), Ordering::Equal);
    }

    #[test]
    fn test_article_deserializes_with_optional_fields_missing() {
        let json = r#"{"id":"42","title":"Hello","timestamp":"2024-01-02T03:04:05Z"}"#;
        let article: Article = serde_json::from_str(json).unwrap();

        assert_eq!(article.id, "42");
        assert!(article.body.is_empty());
        assert!(article.website.is_none());
        assert_eq!(article.timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_envelope_constructors() {
        let env = RequestEnvelope::search("news", None);
        assert_eq!(env.operation.name(), "search");
        assert!(env.target_domain.is_none());

        let env = RequestEnvelope::get("www.bbc.com", "7");
        assert_eq!(env.operation, Operation::Get { id: "7".into() });
        assert_eq!(env.target_domain.as_deref(), Some("www.bbc.com"));
    }

    #[test]
    fn test_aggregate_counts() {
        let mut result = AggregateResult {
            dispatched: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        assert!(result.is_complete());

        result
            .per_site_errors
            .insert("b".into(), BackendError::DeadlineExceeded);
        assert_eq!(result.source_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_complete());
    }
}
