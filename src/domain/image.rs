//! Container image references.

use std::fmt;

use crate::error::{ConfigError, Error, Result};

const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
const DEFAULT_TAG: &str = "latest";
/// Hostnames the engine treats as the default registry.
const HUB_ALIASES: [&str; 2] = ["docker.io", "index.docker.io"];

/// `registry/repository:tag` split into parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Parse an image reference the way the container engine does.
    ///
    /// A first path segment containing `.` or `:` (or equal to `localhost`)
    /// names the registry; Docker Hub aliases collapse onto the default
    /// registry and single-segment Hub images live under `library/`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains('@') {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "container.image",
                reason: format!("'{raw}' is not a tagged image reference"),
            }));
        }

        let (name, tag) = match raw.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag.to_string()),
            _ => (raw, DEFAULT_TAG.to_string()),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if HUB_ALIASES.contains(&first) => {
                (DEFAULT_REGISTRY.to_string(), hub_repository(rest))
            }
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), hub_repository(name)),
        };

        Ok(Self {
            registry,
            repository,
            tag,
        })
    }
}

fn hub_repository(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{name}")
    }
}

impl ImageRef {
    /// Repository name as the engine prints it, without tag.
    #[must_use]
    pub fn name(&self) -> String {
        if self.registry == DEFAULT_REGISTRY {
            self.repository
                .strip_prefix("library/")
                .unwrap_or(&self.repository)
                .to_string()
        } else {
            format!("{}/{}", self.registry, self.repository)
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name(), self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::ImageRef;

    #[test]
    fn parses_registry_repository_and_tag() {
        let image = ImageRef::parse("ghcr.io/open-webui/open-webui:main").unwrap();
        assert_eq!(image.registry, "ghcr.io");
        assert_eq!(image.repository, "open-webui/open-webui");
        assert_eq!(image.tag, "main");
        assert_eq!(image.to_string(), "ghcr.io/open-webui/open-webui:main");
    }

    #[test]
    fn docker_hub_defaults() {
        let image = ImageRef::parse("nginx").unwrap();
        assert_eq!(image.registry, "registry-1.docker.io");
        assert_eq!(image.repository, "library/nginx");
        assert_eq!(image.tag, "latest");
        assert_eq!(image.to_string(), "nginx:latest");
    }

    #[test]
    fn hub_aliases_collapse_to_default_registry() {
        for raw in ["docker.io/nginx:1.27", "index.docker.io/library/nginx:1.27", "nginx:1.27"] {
            let image = ImageRef::parse(raw).unwrap();
            assert_eq!(image.registry, "registry-1.docker.io", "{raw}");
            assert_eq!(image.repository, "library/nginx", "{raw}");
            assert_eq!(image.to_string(), "nginx:1.27", "{raw}");
        }

        let image = ImageRef::parse("docker.io/ollama/ollama").unwrap();
        assert_eq!(image.repository, "ollama/ollama");
        assert_eq!(image.name(), "ollama/ollama");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let image = ImageRef::parse("localhost:5000/webui").unwrap();
        assert_eq!(image.registry, "localhost:5000");
        assert_eq!(image.repository, "webui");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn digest_references_are_rejected() {
        assert!(ImageRef::parse("repo@sha256:abc").is_err());
        assert!(ImageRef::parse("  ").is_err());
    }
}
