//! Namespaced stream identifiers.
//!
//! Every logical subscription is keyed by `<namespace>:<local-id>`. The
//! namespace belongs to one consumer service; the local id comes from the
//! client's connect URL. Neither half may contain [`NAMESPACE_SEPARATOR`],
//! so two consumers can never produce the same identifier.

use thiserror::Error;

pub const NAMESPACE_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier {0:?} contains the namespace separator")]
    ContainsSeparator(String),
}

/// The namespace owned by one consumer service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        check_part(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the full identifier for a consumer-supplied id.
    pub fn identifier(&self, local_id: &str) -> Result<Identifier, IdentifierError> {
        check_part(local_id)?;
        Ok(Identifier {
            full: format!("{}{}{}", self.0, NAMESPACE_SEPARATOR, local_id),
            split: self.0.len(),
        })
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A namespaced subscription key, e.g. `task:42`.
///
/// Only constructible through [`Namespace::identifier`], which guarantees
/// exactly one separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    full: String,
    split: usize,
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn namespace(&self) -> &str {
        &self.full[..self.split]
    }

    pub fn local_id(&self) -> &str {
        &self.full[self.split + NAMESPACE_SEPARATOR.len_utf8()..]
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

fn check_part(part: &str) -> Result<(), IdentifierError> {
    if part.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if part.contains(NAMESPACE_SEPARATOR) {
        return Err(IdentifierError::ContainsSeparator(part.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parts() {
        let ns = Namespace::new("task").unwrap();
        let id = ns.identifier("42").unwrap();
        assert_eq!(id.as_str(), "task:42");
        assert_eq!(id.namespace(), "task");
        assert_eq!(id.local_id(), "42");
        assert_eq!(id.to_string(), "task:42");
    }

    #[test]
    fn test_separator_is_rejected() {
        let ns = Namespace::new("task").unwrap();
        assert_eq!(
            ns.identifier("version:1"),
            Err(IdentifierError::ContainsSeparator("version:1".into()))
        );
        assert_eq!(ns.identifier(""), Err(IdentifierError::Empty));
        assert!(Namespace::new("a:b").is_err());
        assert!(Namespace::new("").is_err());
    }

    #[test]
    fn test_namespaces_never_collide() {
        let tasks = Namespace::new("task").unwrap();
        let versions = Namespace::new("version").unwrap();
        assert_ne!(
            tasks.identifier("1").unwrap(),
            versions.identifier("1").unwrap()
        );
    }
}
