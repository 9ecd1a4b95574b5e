use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CatalogError;

const HTTP_TIMEOUT_SECS: u64 = 6;
const HTTP_USER_AGENT: &str = "bookrack/0.1";

pub const OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";
pub const OPENLIBRARY_COVERS_URL: &str = "https://covers.openlibrary.org";

/// Normalized work record as exposed to the ingestor. Decoded and validated
/// once here; the rest of the crate never sees raw catalog JSON.
#[derive(Debug, Clone)]
pub struct WorkRecord {
    pub title: Option<String>,
    pub author_refs: Vec<String>,
    pub cover_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AuthorRecord {
    pub name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchDoc {
    pub external_id: String,
    pub title: Option<String>,
    pub author_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub docs: Vec<SearchDoc>,
    pub num_found: u64,
}

#[derive(Deserialize)]
struct WorkPayload {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<WorkAuthorEntry>,
    #[serde(default)]
    covers: Vec<Value>,
}

#[derive(Deserialize)]
struct WorkAuthorEntry {
    author: Option<KeyRef>,
}

#[derive(Deserialize)]
struct KeyRef {
    key: String,
}

#[derive(Deserialize)]
struct AuthorPayload {
    name: Option<String>,
    bio: Option<Value>,
}

#[derive(Deserialize)]
struct SearchPayload {
    #[serde(default)]
    docs: Vec<SearchDocPayload>,
    #[serde(rename = "numFound", default)]
    num_found: u64,
}

#[derive(Deserialize)]
struct SearchDocPayload {
    key: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
}

/// Read-only client for the remote bibliographic catalog. Every lookup is a
/// single bounded request; non-2xx statuses, transport errors and timeouts
/// come back as `RemoteUnavailable`, undecodable bodies as `RemoteMalformed`.
pub struct CatalogClient {
    base_url: String,
    covers_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, covers_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            covers_url: covers_url.into(),
        }
    }

    pub fn openlibrary() -> Self {
        Self::new(OPENLIBRARY_BASE_URL, OPENLIBRARY_COVERS_URL)
    }

    pub fn fetch_work(&self, external_id: &str) -> Result<WorkRecord, CatalogError> {
        let url = format!("{}/works/{}.json", self.base_url, external_id);
        let payload: WorkPayload = self.get_json(&url)?;
        Ok(normalize_work(payload))
    }

    pub fn fetch_author(&self, author_id: &str) -> Result<AuthorRecord, CatalogError> {
        let url = format!("{}/authors/{}.json", self.base_url, author_id);
        let payload: AuthorPayload = self.get_json(&url)?;
        normalize_author(payload, &url)
    }

    pub fn fetch_cover(&self, cover_id: i64) -> Result<CoverImage, CatalogError> {
        let url = format!("{}/b/id/{}-L.jpg", self.covers_url, cover_id);
        let response = self
            .http()?
            .get(&url)
            .send()
            .map_err(|err| CatalogError::RemoteUnavailable(format!("{}: {}", url, err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RemoteUnavailable(format!(
                "{} returned {}",
                url, status
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let bytes = response
            .bytes()
            .map_err(|err| CatalogError::RemoteUnavailable(format!("{}: {}", url, err)))?
            .to_vec();
        Ok(CoverImage {
            bytes,
            content_type,
        })
    }

    pub fn search(&self, query: &str, offset: u64, limit: u64) -> Result<SearchPage, CatalogError> {
        let url = format!(
            "{}/search.json?q={}&start={}&limit={}",
            self.base_url,
            urlencoding::encode(query),
            offset,
            limit
        );
        let payload: SearchPayload = self.get_json(&url)?;
        Ok(normalize_search(payload))
    }

    fn http(&self) -> Result<Client, CatalogError> {
        Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(HTTP_USER_AGENT)
            .build()
            .map_err(|err| CatalogError::RemoteUnavailable(err.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let response = self
            .http()?
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|err| CatalogError::RemoteUnavailable(format!("{}: {}", url, err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RemoteUnavailable(format!(
                "{} returned {}",
                url, status
            )));
        }
        response
            .json::<T>()
            .map_err(|err| CatalogError::RemoteMalformed(format!("{}: {}", url, err)))
    }
}

/// Last path segment of a catalog key, e.g. "/authors/OL23919A" -> "OL23919A".
pub fn trailing_segment(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

fn normalize_work(payload: WorkPayload) -> WorkRecord {
    let author_refs = payload
        .authors
        .into_iter()
        .filter_map(|entry| entry.author.map(|author| author.key))
        .collect();
    // Cover lists occasionally carry -1 or null for removed images.
    let cover_id = payload
        .covers
        .iter()
        .filter_map(|value| value.as_i64())
        .find(|id| *id > 0);
    WorkRecord {
        title: payload
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty()),
        author_refs,
        cover_id,
    }
}

fn normalize_author(payload: AuthorPayload, url: &str) -> Result<AuthorRecord, CatalogError> {
    let name = payload
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CatalogError::RemoteMalformed(format!("{}: author name missing", url)))?;
    Ok(AuthorRecord {
        name,
        bio: extract_bio(payload.bio),
    })
}

// Open Library serves bios either as a plain string or as {"type", "value"}.
fn extract_bio(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) => non_empty(text),
        Value::Object(map) => map
            .get("value")
            .and_then(|entry| entry.as_str())
            .map(|text| text.to_string())
            .and_then(non_empty),
        _ => None,
    }
}

fn normalize_search(payload: SearchPayload) -> SearchPage {
    let docs = payload
        .docs
        .into_iter()
        .filter_map(|doc| {
            let key = doc.key?;
            let external_id = trailing_segment(&key).to_string();
            if external_id.is_empty() {
                return None;
            }
            Some(SearchDoc {
                external_id,
                title: doc.title,
                author_names: doc.author_name,
            })
        })
        .collect();
    SearchPage {
        docs,
        num_found: payload.num_found,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_segment_takes_last_path_part() {
        assert_eq!(trailing_segment("/works/OL45883W"), "OL45883W");
        assert_eq!(trailing_segment("/authors/OL23919A"), "OL23919A");
        assert_eq!(trailing_segment("/authors/OL23919A/"), "OL23919A");
        assert_eq!(trailing_segment("OL23919A"), "OL23919A");
    }

    #[test]
    fn normalizes_work_with_authors_and_cover() {
        let payload: WorkPayload = serde_json::from_str(
            r#"{
                "title": "The Hobbit",
                "authors": [
                    {"author": {"key": "/authors/OL26320A"}},
                    {"author": {"key": "/authors/OL99999A"}}
                ],
                "covers": [-1, null, 240727]
            }"#,
        )
        .expect("parse work payload");
        let work = normalize_work(payload);
        assert_eq!(work.title.as_deref(), Some("The Hobbit"));
        assert_eq!(
            work.author_refs,
            vec!["/authors/OL26320A", "/authors/OL99999A"]
        );
        assert_eq!(work.cover_id, Some(240727));
    }

    #[test]
    fn work_without_title_or_covers_normalizes_to_none() {
        let payload: WorkPayload =
            serde_json::from_str(r#"{"authors": []}"#).expect("parse work payload");
        let work = normalize_work(payload);
        assert!(work.title.is_none());
        assert!(work.author_refs.is_empty());
        assert!(work.cover_id.is_none());
    }

    #[test]
    fn author_bio_accepts_string_and_object_shapes() {
        let plain: AuthorPayload =
            serde_json::from_str(r#"{"name": "Ursula K. Le Guin", "bio": "Wrote Earthsea."}"#)
                .expect("parse author payload");
        let record = normalize_author(plain, "test").expect("normalize author");
        assert_eq!(record.bio.as_deref(), Some("Wrote Earthsea."));

        let wrapped: AuthorPayload = serde_json::from_str(
            r#"{"name": "Ursula K. Le Guin", "bio": {"type": "/type/text", "value": "Wrote Earthsea."}}"#,
        )
        .expect("parse author payload");
        let record = normalize_author(wrapped, "test").expect("normalize author");
        assert_eq!(record.bio.as_deref(), Some("Wrote Earthsea."));
    }

    #[test]
    fn author_without_name_is_malformed() {
        let payload: AuthorPayload =
            serde_json::from_str(r#"{"bio": "No name here."}"#).expect("parse author payload");
        let err = normalize_author(payload, "test").expect_err("expected malformed error");
        assert!(matches!(err, CatalogError::RemoteMalformed(_)));
    }

    #[test]
    fn search_docs_carry_trailing_segment_ids() {
        let payload: SearchPayload = serde_json::from_str(
            r#"{
                "numFound": 2,
                "docs": [
                    {"key": "/works/OL45883W", "title": "Dune", "author_name": ["Frank Herbert"]},
                    {"title": "Keyless entry is dropped"}
                ]
            }"#,
        )
        .expect("parse search payload");
        let page = normalize_search(payload);
        assert_eq!(page.num_found, 2);
        assert_eq!(page.docs.len(), 1);
        assert_eq!(page.docs[0].external_id, "OL45883W");
        assert_eq!(page.docs[0].author_names, vec!["Frank Herbert"]);
    }
}
