//! Maps an incoming location to a stored [`LinkRecord`].
//!
//! Three addressing schemes are understood, tried in this order:
//!
//! 1. hash fragment `#/out/{id}/{slug}` (works for pages opened from disk)
//! 2. path `/out/{id}/{slug}`
//! 3. query `?id={id}&slug={slug}`; `id` alone is enough
//!
//! Only the id takes part in the lookup. The slug is cosmetic.

use lambda_http::http::Uri;
use thiserror::Error;
use url::Url;

use crate::model::LinkRecord;
use crate::store::{CachedStore, RecordStore};

const OUT_PREFIX: &str = "/out/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Location {
    /// Accepts an absolute URL or an origin-relative `path?query#fragment`.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = match Url::parse(raw) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost").ok()?.join(raw).ok()?
            }
            Err(_) => return None,
        };
        Some(Self {
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            fragment: url.fragment().map(str::to_string),
        })
    }

    /// Server-side view of a request; browsers never send the fragment.
    pub fn from_uri(uri: &Uri) -> Self {
        Self {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScheme {
    Hash,
    Path,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub id: String,
    pub slug: Option<String>,
    pub scheme: AddressScheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub record: LinkRecord,
    pub scheme: AddressScheme,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("record not found")]
    NotFound,
}

fn decode(seg: &str) -> String {
    urlencoding::decode(seg)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| seg.to_string())
}

/// `.../out/{id}/{slug}` where both parts are non-empty; the slug may contain `/`.
fn split_out(s: &str) -> Option<(String, String)> {
    let start = s.find(OUT_PREFIX)? + OUT_PREFIX.len();
    let (id, slug) = s[start..].split_once('/')?;
    if id.is_empty() || slug.is_empty() {
        return None;
    }
    Some((decode(id), decode(slug)))
}

pub fn extract(loc: &Location) -> Option<Address> {
    if let Some(frag) = loc.fragment.as_deref() {
        if frag.starts_with(OUT_PREFIX) {
            if let Some((id, slug)) = split_out(frag) {
                return Some(Address {
                    id,
                    slug: Some(slug),
                    scheme: AddressScheme::Hash,
                });
            }
        }
    }

    if let Some((id, slug)) = split_out(&loc.path) {
        return Some(Address {
            id,
            slug: Some(slug),
            scheme: AddressScheme::Path,
        });
    }

    let qs = loc.query.as_deref().unwrap_or("");
    let mut id = None;
    let mut slug = None;
    for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
        match k.as_ref() {
            "id" if id.is_none() => id = Some(v.into_owned()),
            "slug" if slug.is_none() => slug = Some(v.into_owned()),
            _ => {}
        }
    }
    let id = id.filter(|s| !s.is_empty())?;
    Some(Address {
        id,
        slug: slug.filter(|s| !s.is_empty()),
        scheme: AddressScheme::Query,
    })
}

pub async fn resolve<R: RecordStore>(
    store: &CachedStore<R>,
    loc: &Location,
) -> Result<Resolved, ResolveError> {
    let Some(addr) = extract(loc) else {
        tracing::debug!(path = %loc.path, "no address in location");
        return Err(ResolveError::NotFound);
    };
    let Some(record) = store.find(&addr.id).await else {
        tracing::info!(id = %addr.id, scheme = ?addr.scheme, "unknown record");
        return Err(ResolveError::NotFound);
    };
    tracing::debug!(id = %record.id, scheme = ?addr.scheme, "resolved");
    Ok(Resolved {
        record,
        scheme: addr.scheme,
    })
}
