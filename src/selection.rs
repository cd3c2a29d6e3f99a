use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of apps and categories targeted by a restriction
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Selection {
    #[serde(default)]
    pub application_ids: BTreeSet<String>,
    #[serde(default)]
    pub category_ids: BTreeSet<String>,
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from application and category identifiers
    pub fn from_ids<A, C>(applications: A, categories: C) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            application_ids: applications.into_iter().map(Into::into).collect(),
            category_ids: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if nothing is selected
    pub fn is_empty(&self) -> bool {
        self.application_ids.is_empty() && self.category_ids.is_empty()
    }

    /// Total number of selected apps and categories
    pub fn len(&self) -> usize {
        self.application_ids.len() + self.category_ids.len()
    }
}

/// Shield to apply, derived from the discourage selection.
///
/// `None` removes the shield entirely.
pub type ShieldDirective = Option<Selection>;

/// Derive the shield directive for a discourage selection
pub fn derive_shield_directive(selection: &Selection) -> ShieldDirective {
    if selection.is_empty() {
        None
    } else {
        Some(selection.clone())
    }
}

/// The selections owned by the restriction policy store
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RestrictionState {
    pub discourage_selection: Selection,
    pub encourage_selection: Selection,
    /// Last requested enforcement intent
    #[serde(default)]
    pub blocking: bool,
}

impl RestrictionState {
    pub fn shield_directive(&self) -> ShieldDirective {
        derive_shield_directive(&self.discourage_selection)
    }
}
