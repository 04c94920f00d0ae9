//! OciRegistryResolver - OCI distribution API で tag を digest に解決する
//!
//! # フロー
//! 1. `HEAD /v2/<repo>/manifests/<tag>`（manifest / index の media type を Accept に列挙）
//! 2. 401 + `WWW-Authenticate: Bearer ...` なら realm から token を取得して 1 回だけ再試行
//! 3. `Docker-Content-Digest` ヘッダを `ContentDigest` として返す
//!
//! 失敗はすべて `RegistryError` に分類して返す（soft failure 扱いは呼び出し側）。

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::domain::reference::DEFAULT_REGISTRY;
use crate::domain::{ContentDigest, RegistryError, ServiceReference};
use crate::ports::RegistryResolver;

/// Sent in `Accept` so that multi-platform images answer with their index digest.
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.docker.distribution.manifest.v2+json",
];

pub const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Docker Hub serves the registry API from a different host than its index name.
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Parsed `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    Basic,
}

impl Challenge {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in auth_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }
        Some(Challenge::Bearer {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// `key="value", key2=value2` with commas allowed inside quotes.
fn auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut quoted = false;

    let mut flush = |key: &mut String, value: &mut String| {
        let k = key.trim();
        if !k.is_empty() {
            params.push((k.to_string(), value.trim().to_string()));
        }
        key.clear();
        value.clear();
    };

    for c in input.chars() {
        match c {
            '"' if in_value => quoted = !quoted,
            '=' if !in_value => in_value = true,
            ',' if !quoted => {
                flush(&mut key, &mut value);
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }
    flush(&mut key, &mut value);
    params
}

enum Auth {
    Bearer(String),
    Basic(Credentials),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Resolver speaking the OCI distribution API over reqwest.
///
/// # 使用例
/// ```ignore
/// let resolver = OciRegistryResolver::new("berth/0.1")?;
/// let digest = resolver.resolve(&"alpine:3.20".parse()?).await?;
/// ```
pub struct OciRegistryResolver {
    client: Client,
    credentials: Option<Credentials>,
}

impl OciRegistryResolver {
    pub fn new(user_agent: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Base URL of the registry API. Local registries are assumed to speak plain HTTP.
    pub fn base_url(registry: &str) -> String {
        let host = if registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            registry
        };
        let scheme = if is_local_registry(host) { "http" } else { "https" };
        format!("{scheme}://{host}")
    }

    pub fn manifest_url(reference: &ServiceReference) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            Self::base_url(reference.registry()),
            reference.repository(),
            reference.manifest_reference()
        )
    }

    async fn head_manifest(
        &self,
        url: &str,
        auth: Option<&Auth>,
    ) -> Result<reqwest::Response, RegistryError> {
        let mut request = self.client.head(url).header(ACCEPT, MANIFEST_MEDIA_TYPES.join(", "));
        request = match auth {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic(creds)) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))
    }

    async fn fetch_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
    ) -> Result<String, RegistryError> {
        let mut params = vec![("scope", scope)];
        if let Some(service) = service {
            params.push(("service", service));
        }
        let url = Url::parse_with_params(realm, &params)
            .map_err(|e| RegistryError::Token(format!("invalid realm {realm:?}: {e}")))?;

        let mut request = self.client.get(url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }
        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Token(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "token endpoint refused the request"));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Token(format!("decoding token response: {e}")))?;
        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::Token("token response carried no token".to_string()))
    }

    /// Authorization for the retry after a 401, if the challenge is one we can answer.
    async fn answer_challenge(
        &self,
        headers: &HeaderMap,
        reference: &ServiceReference,
    ) -> Result<Option<Auth>, RegistryError> {
        let challenge = headers
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse);
        match challenge {
            Some(Challenge::Bearer {
                realm,
                service,
                scope,
            }) => {
                let scope =
                    scope.unwrap_or_else(|| format!("repository:{}:pull", reference.repository()));
                tracing::debug!(%realm, %scope, "fetching registry token");
                let token = self.fetch_token(&realm, service.as_deref(), &scope).await?;
                Ok(Some(Auth::Bearer(token)))
            }
            Some(Challenge::Basic) => Ok(self.credentials.clone().map(Auth::Basic)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RegistryResolver for OciRegistryResolver {
    async fn resolve(&self, reference: &ServiceReference) -> Result<ContentDigest, RegistryError> {
        let url = Self::manifest_url(reference);
        tracing::debug!(%url, "resolving image digest");

        let mut response = self.head_manifest(&url, None).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(auth) = self.answer_challenge(response.headers(), reference).await? {
                response = self.head_manifest(&url, Some(&auth)).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &format!("HEAD {url}")));
        }
        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(RegistryError::MissingDigest)?;
        Ok(ContentDigest::parse(digest.trim())?)
    }
}

fn classify_status(status: StatusCode, context: &str) -> RegistryError {
    let message = format!(
        "{context}: {}",
        status.canonical_reason().unwrap_or("unknown status")
    );
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistryError::Denied {
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => RegistryError::RateLimited(message),
        _ => RegistryError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn is_local_registry(host: &str) -> bool {
    let hostname = match host.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => host.rsplit_once(':').map_or(host, |(h, _)| h),
    };
    matches!(hostname, "localhost" | "127.0.0.1" | "::1") || hostname.ends_with(".local")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::tests::DIGEST_A;
    use rstest::rstest;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MANIFEST_PATH: &str = "/v2/berth/engine/manifests/v0.9.1";

    fn reference(server: &MockServer) -> ServiceReference {
        ServiceReference::parse(&format!("{}/berth/engine:v0.9.1", server.address())).unwrap()
    }

    fn resolver() -> OciRegistryResolver {
        OciRegistryResolver::new("berth-test/0.0").unwrap()
    }

    #[tokio::test]
    async fn head_returns_content_digest() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(200).insert_header(DIGEST_HEADER, DIGEST_A))
            .expect(1)
            .mount(&server)
            .await;

        let digest = resolver().resolve(&reference(&server)).await.unwrap();
        assert_eq!(digest.to_string(), DIGEST_A);

        let requests = server.received_requests().await.unwrap();
        let accept = requests[0].headers.get("accept").unwrap().to_str().unwrap();
        assert!(accept.contains("application/vnd.oci.image.index.v1+json"));
        assert!(accept.contains("application/vnd.docker.distribution.manifest.v2+json"));
        let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
        assert_eq!(agent, "berth-test/0.0");
    }

    #[tokio::test]
    async fn bearer_challenge_fetches_token_and_retries_once() {
        let server = MockServer::start().await;
        let realm = format!("{}/token", server.uri());

        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .and(header("authorization", "Bearer t0k3n"))
            .respond_with(ResponseTemplate::new(200).insert_header(DIGEST_HEADER, DIGEST_A))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "WWW-Authenticate",
                format!("Bearer realm=\"{realm}\",service=\"test-registry\"").as_str(),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("service", "test-registry"))
            .and(query_param("scope", "repository:berth/engine:pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t0k3n" })))
            .expect(1)
            .mount(&server)
            .await;

        let digest = resolver().resolve(&reference(&server)).await.unwrap();
        assert_eq!(digest.to_string(), DIGEST_A);
    }

    #[tokio::test]
    async fn token_request_carries_credentials() {
        let server = MockServer::start().await;
        let realm = format!("{}/token", server.uri());

        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).insert_header(DIGEST_HEADER, DIGEST_A))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("WWW-Authenticate", format!("Bearer realm=\"{realm}\"").as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "abc" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver().with_credentials(Credentials::new("user", "pass"));
        assert!(resolver.resolve(&reference(&server)).await.is_ok());
    }

    #[rstest]
    #[case(401, "denied")]
    #[case(403, "denied")]
    #[case(429, "rate_limited")]
    #[case(404, "status")]
    #[case(500, "status")]
    #[tokio::test]
    async fn failures_are_classified(#[case] status: u16, #[case] class: &str) {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let err = resolver().resolve(&reference(&server)).await.unwrap_err();
        let got = match err {
            RegistryError::Denied { .. } => "denied",
            RegistryError::RateLimited(_) => "rate_limited",
            RegistryError::Status { .. } => "status",
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(got, class);
    }

    #[tokio::test]
    async fn missing_and_malformed_digest_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let err = resolver().resolve(&reference(&server)).await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingDigest));

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(200).insert_header(DIGEST_HEADER, "sha256:nothex"))
            .mount(&server)
            .await;
        let err = resolver().resolve(&reference(&server)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Digest(_)));
    }

    #[tokio::test]
    async fn unreachable_registry_is_transport_error() {
        let reference = ServiceReference::parse("127.0.0.1:1/berth/engine:v1").unwrap();
        let err = resolver().resolve(&reference).await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }

    #[rstest]
    #[case("index.docker.io", "https://registry-1.docker.io")]
    #[case("ghcr.io", "https://ghcr.io")]
    #[case("localhost:5000", "http://localhost:5000")]
    #[case("127.0.0.1:5000", "http://127.0.0.1:5000")]
    #[case("[::1]:5000", "http://[::1]:5000")]
    #[case("registry.local", "http://registry.local")]
    #[case("registry.localdomain.example", "https://registry.localdomain.example")]
    fn base_url_picks_scheme_and_host(#[case] registry: &str, #[case] expected: &str) {
        assert_eq!(OciRegistryResolver::base_url(registry), expected);
    }

    #[test]
    fn parses_docker_hub_challenge() {
        let challenge = Challenge::parse(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/alpine:pull""#,
        )
        .unwrap();
        assert_eq!(
            challenge,
            Challenge::Bearer {
                realm: "https://auth.docker.io/token".to_string(),
                service: Some("registry.docker.io".to_string()),
                scope: Some("repository:library/alpine:pull".to_string()),
            }
        );
    }

    #[test]
    fn scope_with_commas_stays_intact() {
        let challenge =
            Challenge::parse(r#"Bearer realm="https://a/token",scope="repository:x:pull,push""#).unwrap();
        match challenge {
            Challenge::Bearer { scope, .. } => assert_eq!(scope.as_deref(), Some("repository:x:pull,push")),
            other => panic!("expected bearer, got {other:?}"),
        }
    }

    #[test]
    fn bearer_without_realm_is_rejected() {
        assert_eq!(Challenge::parse("Bearer service=\"x\""), None);
        assert_eq!(Challenge::parse("Basic realm=\"x\""), Some(Challenge::Basic));
        assert_eq!(Challenge::parse("Negotiate"), None);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let out = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(!out.contains("hunter2"));
    }
}
