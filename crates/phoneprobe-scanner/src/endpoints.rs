//! Endpoint templates and their resolution against an identifier.

use crate::error::{Result, ScanError};
use phoneprobe_core::{EndpointTemplate, Identifier, IDENTIFIER_PLACEHOLDER};

/// Built-in endpoint patterns as `(url_pattern, is_private_variant)`.
const DEFAULT_TEMPLATES: [(&str, bool); 7] = [
    ("https://media.avatar-cdn.net/v1/profile/{id}/photo.jpg", false),
    ("https://media.avatar-cdn.net/v1/profile/{id}/thumb.jpg", false),
    ("https://static.avatar-cdn.net/p/{id}?size=640", false),
    ("https://static.avatar-cdn.net/p/{id}?size=96", false),
    ("https://media.avatar-cdn.net/v1/contact/{id}/photo.jpg", true),
    ("https://media.avatar-cdn.net/v1/contact/{id}/thumb.jpg", true),
    ("https://static.avatar-cdn.net/c/{id}?size=640", true),
];

/// A template with the identifier substituted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Concrete URL to fetch
    pub url: String,
    /// Copied from the template
    pub is_private_variant: bool,
}

/// Ordered, immutable set of endpoint templates.
#[derive(Debug, Clone)]
pub struct EndpointSet {
    templates: Vec<EndpointTemplate>,
}

impl EndpointSet {
    /// Build a set, rejecting an empty list and patterns without exactly one placeholder.
    pub fn new(templates: Vec<EndpointTemplate>) -> Result<Self> {
        if templates.is_empty() {
            return Err(ScanError::InvalidEndpoint {
                pattern: String::new(),
                reason: "at least one endpoint template is required".to_string(),
            });
        }

        for template in &templates {
            let placeholders = template.url_pattern.matches(IDENTIFIER_PLACEHOLDER).count();
            if placeholders != 1 {
                return Err(ScanError::InvalidEndpoint {
                    pattern: template.url_pattern.clone(),
                    reason: format!(
                        "expected exactly one {IDENTIFIER_PLACEHOLDER} placeholder, found {placeholders}"
                    ),
                });
            }
        }

        Ok(Self { templates })
    }

    /// Configured templates, or the built-in set when none are configured.
    pub fn from_config(templates: &[EndpointTemplate]) -> Result<Self> {
        if templates.is_empty() {
            Ok(Self::default())
        } else {
            Self::new(templates.to_vec())
        }
    }

    /// Number of endpoints probed per scan.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in declaration order.
    pub fn templates(&self) -> &[EndpointTemplate] {
        &self.templates
    }

    /// Substitute `identifier` into every template, in declaration order.
    pub fn resolve(&self, identifier: &Identifier) -> Vec<ResolvedEndpoint> {
        self.templates
            .iter()
            .map(|template| ResolvedEndpoint {
                url: template
                    .url_pattern
                    .replace(IDENTIFIER_PLACEHOLDER, identifier.as_str()),
                is_private_variant: template.is_private_variant,
            })
            .collect()
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(pattern, private)| EndpointTemplate::new(*pattern, *private))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_shape() {
        let set = EndpointSet::default();
        assert_eq!(set.len(), 7);
        let private = set
            .templates()
            .iter()
            .filter(|t| t.is_private_variant)
            .count();
        assert_eq!(private, 3);
    }

    #[test]
    fn test_resolve_substitutes_identifier() {
        let set = EndpointSet::default();
        let id = Identifier::normalize("555-0100", "1").expect("valid phone");

        let resolved = set.resolve(&id);

        assert_eq!(resolved.len(), set.len());
        for endpoint in &resolved {
            assert!(endpoint.url.contains("15550100"));
            assert!(!endpoint.url.contains(IDENTIFIER_PLACEHOLDER));
        }
    }

    #[test]
    fn test_resolve_preserves_declaration_order() {
        let set = EndpointSet::new(vec![
            EndpointTemplate::new("https://a.example/{id}", false),
            EndpointTemplate::new("https://b.example/{id}", true),
            EndpointTemplate::new("https://c.example/{id}", false),
        ])
        .expect("valid set");
        let id = Identifier::from_normalized("4412");

        let resolved = set.resolve(&id);
        assert_eq!(
            resolved,
            vec![
                ResolvedEndpoint {
                    url: "https://a.example/4412".to_string(),
                    is_private_variant: false
                },
                ResolvedEndpoint {
                    url: "https://b.example/4412".to_string(),
                    is_private_variant: true
                },
                ResolvedEndpoint {
                    url: "https://c.example/4412".to_string(),
                    is_private_variant: false
                },
            ]
        );
    }

    #[test]
    fn test_rejects_bad_templates() {
        assert!(EndpointSet::new(Vec::new()).is_err());
        assert!(EndpointSet::new(vec![EndpointTemplate::new("https://a.example/x", false)]).is_err());
        assert!(
            EndpointSet::new(vec![EndpointTemplate::new("https://a.example/{id}/{id}", false)])
                .is_err()
        );
    }

    #[test]
    fn test_from_config_falls_back_to_defaults() {
        let set = EndpointSet::from_config(&[]).expect("default set");
        assert_eq!(set.len(), 7);

        let custom = EndpointSet::from_config(&[EndpointTemplate::new("https://x.example/{id}", true)])
            .expect("custom set");
        assert_eq!(custom.len(), 1);
    }
}
