use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{new_id, slugify};
use crate::util::valid_target;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateReq {
    pub target_url: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub target_url: String,
    pub created_at: String, // RFC 3339, UTC
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateError {
    #[error("target url must be an absolute http(s) url")]
    InvalidDestinationUrl,
    #[error("title must not be empty")]
    EmptyTitle,
}

impl LinkRecord {
    /// Validates operator input and builds a fresh record. `attempt` feeds the id
    /// generator so a collision can be retried with a new id.
    pub fn create(req: &CreateReq, attempt: u32) -> Result<Self, CreateError> {
        let target = req.target_url.trim();
        if !valid_target(target) {
            return Err(CreateError::InvalidDestinationUrl);
        }
        let title = req.title.trim();
        if title.is_empty() {
            return Err(CreateError::EmptyTitle);
        }
        let now = Utc::now();
        Ok(Self {
            id: new_id(title, target, now.timestamp(), attempt),
            title: title.to_string(),
            slug: slugify(title),
            target_url: target.to_string(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub fn share_links(&self, base: &str) -> ShareLinks {
        ShareLinks::new(base, &self.id, &self.slug)
    }
}

/// The three equivalent public addresses of one record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub path: String,
    pub hash: String,
    pub query: String,
}

impl ShareLinks {
    pub fn new(base: &str, id: &str, slug: &str) -> Self {
        let base = base.trim_end_matches('/');
        let id = urlencoding::encode(id);
        let slug = urlencoding::encode(slug);
        Self {
            path: format!("{base}/out/{id}/{slug}"),
            hash: format!("{base}/article.html#/out/{id}/{slug}"),
            query: format!("{base}/article.html?id={id}&slug={slug}"),
        }
    }
}

/// Whether a new record reached the remote store or only the local cache.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Persisted {
    Remote,
    LocalOnly,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateResp {
    pub record: LinkRecord,
    pub links: ShareLinks,
    pub persisted: Persisted,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListedLink {
    #[serde(flatten)]
    pub record: LinkRecord,
    pub links: ShareLinks,
}
