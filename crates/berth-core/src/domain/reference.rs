//! Service references: the image locator an engine instance is created from.
//!
//! Grammar (subset of the OCI/Docker reference grammar):
//!
//! ```text
//! reference  := [registry "/"] repository [":" tag | "@" digest]
//! registry   := host[":" port]   (first component containing "." or ":", or "localhost")
//! repository := component ("/" component)*
//! ```
//!
//! A bare Docker Hub name is expanded the way `docker pull` does it:
//! `alpine` becomes `index.docker.io/library/alpine:latest`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::digest::{ContentDigest, DigestError};

pub const DEFAULT_REGISTRY: &str = "index.docker.io";
pub const DEFAULT_TAG: &str = "latest";

/// Scheme of runner-host locators that point at an engine image.
pub const IMAGE_PROVIDER_SCHEME: &str = "docker-image";

const LEGACY_DEFAULT_REGISTRY: &str = "docker.io";
const MAX_TAG_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("empty image reference")]
    Empty,

    #[error("invalid registry {0:?}")]
    InvalidRegistry(String),

    #[error("invalid repository {0:?}")]
    InvalidRepository(String),

    #[error("invalid tag {0:?}")]
    InvalidTag(String),

    #[error("invalid digest in image reference: {0}")]
    Digest(#[from] DigestError),

    #[error("unsupported runner host scheme {0:?}, expected {IMAGE_PROVIDER_SCHEME}://")]
    UnsupportedScheme(String),

    #[error("invalid runner host {input:?}: {reason}")]
    InvalidRunnerHost { input: String, reason: String },
}

/// Either a mutable tag or a pinned digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Tag(String),
    Digest(ContentDigest),
}

/// A parsed, normalized image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceReference {
    registry: String,
    repository: String,
    selector: Selector,
}

impl ServiceReference {
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (name, selector) = match input.split_once('@') {
            Some((name, digest)) => {
                let digest = ContentDigest::parse(digest)?;
                // `repo:tag@digest`: the tag must be well formed but the digest wins
                let (name, tag) = split_tag(name);
                if let Selector::Tag(tag) = &tag
                    && !is_valid_tag(tag)
                {
                    return Err(ReferenceError::InvalidTag(tag.clone()));
                }
                (name, Selector::Digest(digest))
            }
            None => split_tag(input),
        };

        let (registry, repository) = split_registry(name);
        let registry = if registry == LEGACY_DEFAULT_REGISTRY {
            DEFAULT_REGISTRY.to_string()
        } else {
            registry.to_string()
        };
        if !is_valid_registry(&registry) {
            return Err(ReferenceError::InvalidRegistry(registry));
        }

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository.to_string()
        };
        if !is_valid_repository(&repository) {
            return Err(ReferenceError::InvalidRepository(repository));
        }

        if let Selector::Tag(tag) = &selector
            && !is_valid_tag(tag)
        {
            return Err(ReferenceError::InvalidTag(tag.clone()));
        }

        Ok(Self {
            registry,
            repository,
            selector,
        })
    }

    /// Parse a runner-host locator such as `docker-image://registry.example.com/engine:v1`.
    ///
    /// Strings without a scheme are parsed as plain references.
    pub fn from_runner_host(input: &str) -> Result<Self, ReferenceError> {
        if !input.contains("://") {
            return Self::parse(input);
        }

        let url = url::Url::parse(input).map_err(|e| ReferenceError::InvalidRunnerHost {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != IMAGE_PROVIDER_SCHEME {
            return Err(ReferenceError::UnsupportedScheme(url.scheme().to_string()));
        }
        let Some(host) = url.host_str() else {
            return Err(ReferenceError::InvalidRunnerHost {
                input: input.to_string(),
                reason: "missing host".to_string(),
            });
        };

        let mut image = host.to_string();
        if let Some(port) = url.port() {
            image.push_str(&format!(":{port}"));
        }
        image.push_str(url.path());
        Self::parse(&image)
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The digest this reference is pinned to, if any.
    pub fn pinned_digest(&self) -> Option<&ContentDigest> {
        match &self.selector {
            Selector::Digest(d) => Some(d),
            Selector::Tag(_) => None,
        }
    }

    /// The tag or digest string used in a manifest request.
    pub fn manifest_reference(&self) -> String {
        match &self.selector {
            Selector::Tag(tag) => tag.clone(),
            Selector::Digest(d) => d.to_string(),
        }
    }
}

impl fmt::Display for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::Tag(tag) => write!(f, "{}/{}:{}", self.registry, self.repository, tag),
            Selector::Digest(d) => write!(f, "{}/{}@{}", self.registry, self.repository, d),
        }
    }
}

impl FromStr for ServiceReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `host:5000/repo:tag` has two colons; only one after the last `/` is a tag.
fn split_tag(name: &str) -> (&str, Selector) {
    let last_slash = name.rfind('/').map_or(0, |i| i + 1);
    match name[last_slash..].rfind(':') {
        Some(i) => {
            let at = last_slash + i;
            (&name[..at], Selector::Tag(name[at + 1..].to_string()))
        }
        None => (name, Selector::Tag(DEFAULT_TAG.to_string())),
    }
}

fn split_registry(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first, rest)
        }
        _ => (DEFAULT_REGISTRY, name),
    }
}

fn is_valid_registry(registry: &str) -> bool {
    !registry.is_empty()
        && registry
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}

fn is_valid_repository(repository: &str) -> bool {
    !repository.is_empty() && repository.split('/').all(is_valid_component)
}

fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    alnum(first)
        && alnum(last)
        && bytes
            .iter()
            .all(|b| alnum(b) || matches!(b, b'.' | b'_' | b'-'))
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    tag.len() <= MAX_TAG_LEN
        && (first.is_ascii_alphanumeric() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::tests::DIGEST_A;
    use rstest::rstest;

    #[rstest]
    #[case("alpine", "index.docker.io", "library/alpine", "latest")]
    #[case("docker.io/library/alpine:3.20", "index.docker.io", "library/alpine", "3.20")]
    #[case("registry.example.com/berth/engine:v0.9.1", "registry.example.com", "berth/engine", "v0.9.1")]
    #[case("localhost:5000/engine", "localhost:5000", "engine", "latest")]
    #[case("localhost/engine:dev", "localhost", "engine", "dev")]
    #[case("ghcr.io/acme/tools/engine:main", "ghcr.io", "acme/tools/engine", "main")]
    fn parses_tagged_references(
        #[case] input: &str,
        #[case] registry: &str,
        #[case] repository: &str,
        #[case] tag: &str,
    ) {
        let r = ServiceReference::parse(input).unwrap();
        assert_eq!(r.registry(), registry);
        assert_eq!(r.repository(), repository);
        assert_eq!(r.selector(), &Selector::Tag(tag.to_string()));
        assert!(r.pinned_digest().is_none());
    }

    #[rstest]
    #[case::digest_only("registry.example.com/berth/engine", "registry.example.com/berth/engine")]
    #[case::tag_and_digest("registry.example.com/berth/engine:v0.9.1", "registry.example.com/berth/engine")]
    #[case::port_tag_and_digest("localhost:5000/berth/engine:dev", "localhost:5000/berth/engine")]
    fn parses_pinned_digest(#[case] name: &str, #[case] untagged: &str) {
        let input = format!("{name}@{DIGEST_A}");
        let r = ServiceReference::parse(&input).unwrap();
        assert_eq!(r.pinned_digest().map(|d| d.to_string()).as_deref(), Some(DIGEST_A));
        assert_eq!(r.manifest_reference(), DIGEST_A);

        assert_eq!(r.to_string(), format!("{untagged}@{DIGEST_A}"));
    }

    #[test]
    fn tag_next_to_digest_is_still_validated() {
        let input = format!("registry.example.com/berth/engine:-bad@{DIGEST_A}");
        assert!(matches!(
            ServiceReference::parse(&input),
            Err(ReferenceError::InvalidTag(_))
        ));
    }

    #[rstest]
    #[case::empty("")]
    #[case::uppercase_repo("registry.example.com/Engine:v1")]
    #[case::bad_tag("registry.example.com/engine:-v1")]
    #[case::empty_component("registry.example.com//engine")]
    #[case::bad_digest("registry.example.com/engine@sha256:abc")]
    #[case::md5_digest("registry.example.com/engine@md5:d41d8cd98f00b204e9800998ecf8427e")]
    fn rejects_malformed_references(#[case] input: &str) {
        assert!(ServiceReference::parse(input).is_err());
    }

    #[test]
    fn display_is_normalized_pull_target() {
        let r = ServiceReference::parse("alpine").unwrap();
        assert_eq!(r.to_string(), "index.docker.io/library/alpine:latest");
        let again = ServiceReference::parse(&r.to_string()).unwrap();
        assert_eq!(again, r);
    }

    #[test]
    fn runner_host_joins_host_and_path() {
        let r = ServiceReference::from_runner_host("docker-image://registry.example.com/berth/engine:v0.9.1")
            .unwrap();
        assert_eq!(r.to_string(), "registry.example.com/berth/engine:v0.9.1");

        let r = ServiceReference::from_runner_host("docker-image://localhost:5000/engine").unwrap();
        assert_eq!(r.registry(), "localhost:5000");
    }

    #[test]
    fn runner_host_rejects_other_schemes() {
        let err = ServiceReference::from_runner_host("tcp://127.0.0.1:1234").unwrap_err();
        assert!(matches!(err, ReferenceError::UnsupportedScheme(s) if s == "tcp"));
    }
}
