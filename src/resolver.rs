//! Content metadata resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::session::{ApiEnvelope, Session};

/// Password state reported for a content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordStatus {
    /// No password needed, or the supplied one matched.
    Ok,
    /// A password is needed and none was supplied.
    Required,
    /// The supplied password did not match.
    Wrong,
    /// Any status this crate does not know about.
    Other(String),
}

impl PasswordStatus {
    /// Parses the service's `passwordStatus` field. A missing field means `Ok`.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("passwordOk") => Self::Ok,
            Some("passwordRequired") => Self::Required,
            Some("passwordWrong") => Self::Wrong,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PasswordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("passwordOk"),
            Self::Required => f.write_str("passwordRequired"),
            Self::Wrong => f.write_str("passwordWrong"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Kind of an entry listed inside a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildKind {
    /// A file with its direct download link.
    File {
        /// Direct download link.
        link: String,
        /// Size announced by the API.
        size: Option<u64>,
    },
    /// A nested folder, resolved separately.
    Folder,
}

/// An entry listed inside a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// Content id.
    pub id: String,
    /// Remote name, unsanitized.
    pub name: String,
    /// File or folder.
    pub kind: ChildKind,
}

/// What a content id turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// A single file.
    File {
        /// Direct download link.
        link: String,
        /// Size announced by the API.
        size: Option<u64>,
    },
    /// A folder with its immediate children, in listing order.
    Folder {
        /// Immediate children.
        children: Vec<Child>,
    },
}

/// Metadata for one resolved content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Content id.
    pub id: String,
    /// Remote name, unsanitized.
    pub name: String,
    /// File or folder.
    pub kind: ContentKind,
}

/// Source of content metadata.
///
/// The walker only talks to this trait, so trees can be served from memory
/// in tests.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Resolves one content id into its metadata.
    ///
    /// # Errors
    ///
    /// See [`ApiResolver::resolve`] for the errors the HTTP implementation returns.
    async fn resolve(&self, content_id: &str, password: Option<&str>) -> Result<ContentDescriptor>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawKind {
    File,
    Folder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChild {
    #[serde(rename = "type")]
    kind: RawKind,
    #[serde(default)]
    name: String,
    link: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    #[serde(rename = "type")]
    kind: Option<RawKind>,
    id: Option<String>,
    #[serde(default)]
    name: String,
    link: Option<String>,
    size: Option<u64>,
    #[serde(default)]
    children_ids: Vec<String>,
    #[serde(default)]
    children: HashMap<String, RawChild>,
    password_status: Option<String>,
}

/// Hashes a plaintext password the way the contents endpoint expects it:
/// lowercase hex SHA-256, or an empty string when there is no password.
#[must_use]
pub fn hash_password(password: Option<&str>) -> String {
    match password {
        Some(p) if !p.is_empty() => format!("{:x}", Sha256::digest(p.as_bytes())),
        _ => String::new(),
    }
}

/// Resolves content ids through the HTTP API.
#[derive(Debug, Clone)]
pub struct ApiResolver {
    session: Arc<Session>,
}

impl ApiResolver {
    /// Creates a resolver sharing `session`.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Queries the contents endpoint for `content_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] if a credential cannot be obtained.
    /// - [`Error::Http`] on transport failure.
    /// - [`Error::Api`] if the service reports a non-`ok` status.
    /// - [`Error::Password`] if the password is missing or wrong.
    /// - [`Error::Malformed`] if the response lacks required fields.
    pub async fn resolve(
        &self,
        content_id: &str,
        password: Option<&str>,
    ) -> Result<ContentDescriptor> {
        let api_token = self.session.api_token().await?;
        let access_token = self.session.access_token().await?;
        let hashed = hash_password(password);

        let envelope: ApiEnvelope = self
            .session
            .http()
            .get(self.session.endpoints().contents_url(content_id))
            .query(&[
                ("wt", access_token),
                ("cache", "true"),
                ("password", hashed.as_str()),
            ])
            .bearer_auth(api_token)
            .send()
            .await?
            .json()
            .await?;

        if envelope.status != "ok" {
            return Err(Error::Api {
                id: content_id.to_string(),
                status: envelope.status,
            });
        }

        let data = envelope
            .data
            .ok_or_else(|| Error::Malformed(format!("content {content_id} has no data")))?;
        let raw: RawContent = serde_json::from_value(data)
            .map_err(|e| Error::Malformed(format!("content {content_id}: {e}")))?;

        into_descriptor(content_id, raw)
    }
}

#[async_trait]
impl ContentSource for ApiResolver {
    async fn resolve(&self, content_id: &str, password: Option<&str>) -> Result<ContentDescriptor> {
        Self::resolve(self, content_id, password).await
    }
}

fn into_descriptor(content_id: &str, raw: RawContent) -> Result<ContentDescriptor> {
    let status = PasswordStatus::parse(raw.password_status.as_deref());
    if status != PasswordStatus::Ok {
        return Err(Error::Password {
            id: content_id.to_string(),
            status,
        });
    }

    let id = raw.id.unwrap_or_else(|| content_id.to_string());
    let kind = match raw.kind {
        Some(RawKind::File) => ContentKind::File {
            link: raw
                .link
                .ok_or_else(|| Error::Malformed(format!("file {content_id} has no link")))?,
            size: raw.size,
        },
        Some(RawKind::Folder) => ContentKind::Folder {
            children: collect_children(content_id, raw.children_ids, raw.children),
        },
        None => {
            return Err(Error::Malformed(format!(
                "content {content_id} has no type"
            )));
        }
    };

    Ok(ContentDescriptor {
        id,
        name: raw.name,
        kind,
    })
}

/// Orders children by `children_ids`, dropping entries that cannot be used.
fn collect_children(
    folder_id: &str,
    ids: Vec<String>,
    mut children: HashMap<String, RawChild>,
) -> Vec<Child> {
    ids.into_iter()
        .filter_map(|id| {
            let Some(child) = children.remove(&id) else {
                log::warn!("Folder {folder_id} lists child {id} without metadata, skipping");
                return None;
            };
            let kind = match child.kind {
                RawKind::Folder => ChildKind::Folder,
                RawKind::File => match child.link {
                    Some(link) => ChildKind::File {
                        link,
                        size: child.size,
                    },
                    None => {
                        log::warn!("File {} ({id}) has no link, skipping", child.name);
                        return None;
                    }
                },
            };
            Some(Child {
                id,
                name: child.name,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloadConfig, Endpoints};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_credentials(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "ok", "data": { "token": "tok" } })),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"a={wt: "wt-1"}"#))
            .mount(server)
            .await;
    }

    fn resolver_for(server: &MockServer) -> ApiResolver {
        let session =
            Session::new(&DownloadConfig::default(), Endpoints::single(&server.uri())).unwrap();
        ApiResolver::new(Arc::new(session))
    }

    fn raw(value: serde_json::Value) -> RawContent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password(Some("password")),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        assert_eq!(hash_password(None), "");
        assert_eq!(hash_password(Some("")), "");
    }

    #[test]
    fn password_status_parse_and_display() {
        assert_eq!(PasswordStatus::parse(None), PasswordStatus::Ok);
        assert_eq!(PasswordStatus::parse(Some("passwordOk")), PasswordStatus::Ok);
        assert_eq!(
            PasswordStatus::parse(Some("passwordRequired")),
            PasswordStatus::Required
        );
        assert_eq!(
            PasswordStatus::parse(Some("passwordWrong")),
            PasswordStatus::Wrong
        );
        let other = PasswordStatus::parse(Some("passwordExpired"));
        assert_eq!(other.to_string(), "passwordExpired");
    }

    #[test]
    fn folder_children_follow_listing_order() {
        let content = raw(json!({
            "type": "folder",
            "id": "ROOT",
            "name": "My Files",
            "childrenIds": ["c2", "c1", "ghost", "c3"],
            "children": {
                "c1": {
                    "type": "file",
                    "name": "report.pdf",
                    "link": "https://x/report.pdf",
                    "size": 10
                },
                "c2": { "type": "folder", "name": "Sub" },
                "c3": { "type": "file", "name": "broken.bin" }
            }
        }));

        let desc = into_descriptor("ROOT", content).unwrap();
        assert_eq!(desc.name, "My Files");
        let ContentKind::Folder { children } = desc.kind else {
            panic!("expected folder");
        };
        assert_eq!(
            children,
            vec![
                Child {
                    id: "c2".into(),
                    name: "Sub".into(),
                    kind: ChildKind::Folder
                },
                Child {
                    id: "c1".into(),
                    name: "report.pdf".into(),
                    kind: ChildKind::File {
                        link: "https://x/report.pdf".into(),
                        size: Some(10)
                    }
                },
            ]
        );
    }

    #[test]
    fn wrong_password_checked_before_shape() {
        let content = raw(json!({ "passwordStatus": "passwordWrong" }));
        let err = into_descriptor("LOCKED", content).unwrap_err();
        assert!(matches!(
            err,
            Error::Password { ref id, status: PasswordStatus::Wrong } if id == "LOCKED"
        ));
    }

    #[test]
    fn file_without_link_is_malformed() {
        let content = raw(json!({ "type": "file", "name": "a.bin" }));
        assert!(matches!(
            into_descriptor("F", content),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn missing_type_is_malformed() {
        let content = raw(json!({ "name": "mystery" }));
        assert!(matches!(
            into_descriptor("M", content),
            Err(Error::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn resolve_sends_tokens_and_hashed_password() {
        let server = MockServer::start().await;
        mount_credentials(&server).await;
        Mock::given(method("GET"))
            .and(path("/contents/ABC123"))
            .and(query_param("wt", "wt-1"))
            .and(query_param("cache", "true"))
            .and(query_param("password", hash_password(Some("secret"))))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": {
                    "type": "file",
                    "id": "ABC123",
                    "name": "notes.txt",
                    "link": "https://store/notes.txt",
                    "size": 1024
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let desc = resolver_for(&server)
            .resolve("ABC123", Some("secret"))
            .await
            .unwrap();
        assert_eq!(
            desc,
            ContentDescriptor {
                id: "ABC123".into(),
                name: "notes.txt".into(),
                kind: ContentKind::File {
                    link: "https://store/notes.txt".into(),
                    size: Some(1024)
                },
            }
        );
    }

    #[tokio::test]
    async fn resolve_non_ok_status_is_api_error() {
        let server = MockServer::start().await;
        mount_credentials(&server).await;
        Mock::given(method("GET"))
            .and(path("/contents/GONE"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": "error-notFound" })),
            )
            .mount(&server)
            .await;

        let err = resolver_for(&server).resolve("GONE", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Api { ref id, ref status } if id == "GONE" && status == "error-notFound"
        ));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn resolve_without_credentials_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "error" })))
            .mount(&server)
            .await;

        let err = resolver_for(&server).resolve("ABC", None).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
