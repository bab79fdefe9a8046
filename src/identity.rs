use std::collections::BTreeMap;

/// An authenticated user or service principal.
///
/// Produced by an [`Authenticator`](crate::authn::Authenticator) and immutable
/// for the lifetime of the request it was resolved for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    /// User name
    pub name: String,
    /// Group memberships, in the order the identity source reported them
    pub groups: Vec<String>,
    /// Arbitrary extra attributes attached by the identity source
    pub extra: BTreeMap<String, Vec<String>>,
}

impl Identity {
    /// Creates an identity with a name and no groups.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds groups to the identity.
    pub fn with_groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Adds an extra attribute value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Joins the group names with `separator`.
    pub fn joined_groups(&self, separator: &str) -> String {
        self.groups.join(separator)
    }
}
