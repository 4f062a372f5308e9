//! Firestore REST document store.
//!
//! Documents are read and merged through the v1 REST API. Writes are PATCH
//! requests with one `updateMask.fieldPaths` per top-level field, so stored
//! fields the aggregate does not name are left alone.

use anyhow::Context;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

use super::document_store::DocumentStore;
use crate::error::{AnalyticsError, Result};
use crate::models::{Document, RemoteSettings};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    KeyFile(PathBuf),
    /// Injected blob: raw JSON or base64 of it.
    Blob(String),
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default)]
    project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credentials {
    fn load(&self) -> anyhow::Result<ServiceAccount> {
        let raw = match self {
            Credentials::KeyFile(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading key file {}", path.display()))?,
            Credentials::Blob(blob) => {
                let trimmed = blob.trim();
                if trimmed.starts_with('{') {
                    trimmed.to_string()
                } else {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(trimmed)
                        .context("credential blob is neither JSON nor base64")?;
                    String::from_utf8(bytes).context("decoded credential blob is not UTF-8")?
                }
            }
        };
        serde_json::from_str(&raw).context("parsing service-account JSON")
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

struct ServiceAuth {
    account: ServiceAccount,
    key: OnceCell<EncodingKey>,
    token: Mutex<Option<CachedToken>>,
}

impl ServiceAuth {
    fn new(account: ServiceAccount) -> Self {
        Self {
            account,
            key: OnceCell::new(),
            token: Mutex::new(None),
        }
    }

    fn signed_assertion(&self) -> Result<String> {
        let key = self.key.get_or_try_init(|| {
            EncodingKey::from_rsa_pem(self.account.private_key.as_bytes()).map_err(|e| {
                AnalyticsError::Configuration(format!("service-account private key: {}", e))
            })
        })?;
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(|e| AnalyticsError::Configuration(format!("signing token request: {}", e)))
    }

    fn bearer(&self, client: &Client) -> Result<String> {
        let mut cached = self.token.lock();
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &self.signed_assertion()?)
            .finish();
        let resp = client
            .post(&self.account.token_uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()?;
        let token: TokenResponse = check_status(resp, "token exchange")?.json()?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!("firestore access token refreshed for {}", self.account.client_email);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }
}

pub struct FirestoreStore {
    client: Client,
    documents_url: Url,
    auth: Option<ServiceAuth>,
}

impl FirestoreStore {
    /// Builds the store from remote settings. Credentials are taken from the
    /// key file, then from the named environment variable; with neither, only
    /// an explicit endpoint (an emulator) is accepted.
    pub fn from_settings(remote: &RemoteSettings) -> Result<Self> {
        let credentials = if let Some(path) = &remote.key_file {
            Some(Credentials::KeyFile(path.clone()))
        } else if let Some(var) = &remote.credentials_env {
            let blob = std::env::var(var).map_err(|_| {
                AnalyticsError::Configuration(format!("environment variable {} is not set", var))
            })?;
            Some(Credentials::Blob(blob))
        } else {
            None
        };

        let account = credentials.as_ref().map(Credentials::load).transpose()?;
        if account.is_none() && remote.endpoint.is_none() {
            return Err(AnalyticsError::Configuration(
                "firestore needs key_file, credentials_env or an emulator endpoint".to_string(),
            ));
        }

        let project = remote
            .project
            .clone()
            .or_else(|| account.as_ref().and_then(|a| a.project_id.clone()))
            .ok_or_else(|| {
                AnalyticsError::Configuration("firestore project id is not configured".to_string())
            })?;

        Self::build(&project, remote.endpoint.as_deref(), account)
    }

    fn build(
        project: &str,
        endpoint: Option<&str>,
        account: Option<ServiceAccount>,
    ) -> Result<Self> {
        let documents_url = documents_url(endpoint.unwrap_or(DEFAULT_ENDPOINT), project)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        info!("firestore store at {}", documents_url);
        Ok(Self {
            client,
            documents_url,
            auth: account.map(ServiceAuth::new),
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AnalyticsError::Configuration("endpoint cannot be a base URL".to_string())
            })?
            .extend([collection, id]);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.auth {
            Some(auth) => Ok(request.bearer_auth(auth.bearer(&self.client)?)),
            None => Ok(request),
        }
    }
}

fn documents_url(endpoint: &str, project: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| AnalyticsError::Configuration(format!("endpoint {:?}: {}", endpoint, e)))?;
    url.path_segments_mut()
        .map_err(|_| {
            AnalyticsError::Configuration(format!("endpoint {:?} cannot be a base URL", endpoint))
        })?
        .pop_if_empty()
        .extend(["v1", "projects", project, "databases", "(default)", "documents"]);
    Ok(url)
}

fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AnalyticsError::PermissionDenied(
            format!("{}: {} {}", what, status, body.trim()),
        )),
        _ => Err(AnalyticsError::StorageUnavailable(format!(
            "{}: {} {}",
            what,
            status,
            body.trim()
        ))),
    }
}

impl DocumentStore for FirestoreStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.document_url(collection, id)?;
        let resp = self.authorized(self.client.get(url))?.send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = check_status(resp, "get document")?.json()?;
        match body.get("fields") {
            Some(fields) => decode_fields(fields).map(Some),
            None => Ok(Some(Document::new())),
        }
    }

    fn merge(&self, collection: &str, id: &str, fields: &Document) -> Result<()> {
        let mut url = self.document_url(collection, id)?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", &field_path(name));
            }
        }
        let body = json!({ "fields": encode_fields(fields) });
        let resp = self.authorized(self.client.patch(url))?.json(&body).send()?;
        check_status(resp, "merge document")?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = self.document_url(collection, id)?;
        let resp = self.authorized(self.client.delete(url))?.send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp, "delete document")?;
        Ok(())
    }
}

/// Field names outside `[A-Za-z_][A-Za-z0-9_]*` must be backtick-quoted in a
/// field path.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn encode_fields(fields: &Document) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Plain JSON to a Firestore typed value.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(fields: &Value) -> Result<Document> {
    let Some(map) = fields.as_object() else {
        return Err(AnalyticsError::MalformedData(
            "firestore `fields` is not an object".to_string(),
        ));
    };
    map.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Firestore typed value back to plain JSON.
fn decode_value(typed: &Value) -> Result<Value> {
    let malformed =
        |what: &str| AnalyticsError::MalformedData(format!("firestore value: {}", what));
    let Some((kind, inner)) = typed.as_object().and_then(|m| m.iter().next()) else {
        return Err(malformed("expected a single-key object"));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool).ok_or_else(|| malformed("bad boolean")),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed.map(Value::from).ok_or_else(|| malformed("bad integer"))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| malformed("bad or non-finite double"))
        }
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed("bad string")),
        "arrayValue" => match inner.get("values") {
            None => Ok(Value::Array(Vec::new())),
            Some(Value::Array(items)) => items
                .iter()
                .map(decode_value)
                .collect::<Result<_>>()
                .map(Value::Array),
            Some(_) => Err(malformed("bad array")),
        },
        "mapValue" => match inner.get("fields") {
            None => Ok(Value::Object(Document::new())),
            Some(fields) => decode_fields(fields).map(Value::Object),
        },
        other => Err(malformed(&format!("unsupported type {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values_encode_the_way_firestore_expects() {
        let doc = json!({
            "total_pageviews": 3,
            "total_active_seconds": 2.5,
            "widgets": { "Pet": { "cat": 1 }, "Go": 0 },
            "per_day": [ { "date": "2024-05-01" } ],
            "flag": true,
            "nothing": null
        });
        let encoded = encode_fields(doc.as_object().expect("object"));

        assert_eq!(encoded["total_pageviews"], json!({ "integerValue": "3" }));
        assert_eq!(encoded["total_active_seconds"], json!({ "doubleValue": 2.5 }));
        assert_eq!(
            encoded["widgets"]["mapValue"]["fields"]["Pet"]["mapValue"]["fields"]["cat"],
            json!({ "integerValue": "1" })
        );
        assert_eq!(
            encoded["per_day"]["arrayValue"]["values"][0]["mapValue"]["fields"]["date"],
            json!({ "stringValue": "2024-05-01" })
        );
        assert_eq!(encoded["flag"], json!({ "booleanValue": true }));
        assert_eq!(encoded["nothing"], json!({ "nullValue": null }));

        let decoded = decode_fields(&encoded).expect("decode");
        assert_eq!(Value::Object(decoded), doc);
    }

    #[test]
    fn decode_accepts_server_side_shapes() {
        let fields = json!({
            "empty_map": { "mapValue": {} },
            "empty_list": { "arrayValue": {} },
            "at": { "timestampValue": "2024-05-01T00:00:00Z" },
            "big": { "integerValue": "9007199254740993" }
        });
        let doc = decode_fields(&fields).expect("decode");
        assert_eq!(doc["empty_map"], json!({}));
        assert_eq!(doc["empty_list"], json!([]));
        assert_eq!(doc["at"], json!("2024-05-01T00:00:00Z"));
        assert_eq!(doc["big"], json!(9_007_199_254_740_993_i64));
    }

    #[test]
    fn decode_rejects_unknown_types() {
        let fields = json!({ "where": { "geoPointValue": { "latitude": 1.0 } } });
        let err = decode_fields(&fields).expect_err("unsupported");
        assert_eq!(err.kind(), "malformed_data");
    }

    #[test]
    fn field_paths_quote_non_identifiers() {
        assert_eq!(field_path("per_day"), "per_day");
        assert_eq!(field_path("2nd"), "`2nd`");
        assert_eq!(field_path("a b"), "`a b`");
        assert_eq!(field_path("tick`s"), "`tick\\`s`");
    }

    #[test]
    fn credential_blob_may_be_json_or_base64() {
        let raw = r#"{"client_email":"svc@p.iam","private_key":"k","project_id":"p"}"#;
        let from_json = Credentials::Blob(raw.to_string()).load().expect("json");
        assert_eq!(from_json.client_email, "svc@p.iam");
        assert_eq!(from_json.token_uri, DEFAULT_TOKEN_URI);

        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let from_b64 = Credentials::Blob(encoded).load().expect("base64");
        assert_eq!(from_b64.project_id.as_deref(), Some("p"));

        assert!(Credentials::Blob("not json, not base64!".into()).load().is_err());
    }

    #[test]
    fn emulator_endpoint_needs_no_credentials() {
        let remote = RemoteSettings {
            project: Some("demo".into()),
            endpoint: Some("http://localhost:8080".into()),
            ..RemoteSettings::default()
        };
        let store = FirestoreStore::from_settings(&remote).expect("build");
        let url = store.document_url("usage", "counts").expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/usage/counts"
        );
    }

    #[test]
    fn missing_credentials_and_project_are_configuration_errors() {
        let err = FirestoreStore::from_settings(&RemoteSettings::default())
            .err()
            .expect("no creds");
        assert_eq!(err.kind(), "configuration");

        let no_project = RemoteSettings {
            endpoint: Some("http://localhost:8080".into()),
            ..RemoteSettings::default()
        };
        let err = FirestoreStore::from_settings(&no_project).err().expect("no project");
        assert_eq!(err.kind(), "configuration");
    }
}
