//! Tag shapes and tag value sanitization.
//!
//! Two tag shapes exist: [`TagPair`] is the configuration shape (`Key`/`Value`)
//! and [`Tag`] is the shape the container service tagging calls accept
//! (`key`/`value`). Conversion happens when tags are handed to the client.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Tag key holding the desired count a service had before it was stopped.
pub const SAVED_CAPACITY_TAG: &str = "desiredCount";

/// Characters the container service rejects in tag values.
///
/// Allowed: unicode letters, digits, white-space and `_ . : + / = \ @ -`.
static RESTRICTED_TAG_VALUE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{L}\d\s_.:+/=\\@-]").expect("restricted tag value pattern is valid")
});

/// A tag as written in scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default)]
    pub value: String,
}

impl TagPair {
    /// Create a new tag pair.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A tag in the shape the provider's tagging calls use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a new provider tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<&TagPair> for Tag {
    fn from(pair: &TagPair) -> Self {
        Tag::new(pair.key.clone(), pair.value.clone())
    }
}

impl From<TagPair> for Tag {
    fn from(pair: TagPair) -> Self {
        Tag::new(pair.key, pair.value)
    }
}

/// A tag value that had to be rewritten before it could be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedValue {
    pub key: String,
    pub original: String,
    pub sanitized: String,
}

/// Replace every character not allowed in a tag value with a single space.
///
/// Newlines are matched by the white-space class but are still collapsed to
/// spaces afterwards. Returns the input unchanged (borrowed) when nothing had
/// to be replaced.
pub fn sanitize_tag_value(value: &str) -> Cow<'_, str> {
    let replaced = RESTRICTED_TAG_VALUE_CHARS.replace_all(value, " ");
    if replaced.contains('\n') {
        Cow::Owned(replaced.replace('\n', " "))
    } else {
        replaced
    }
}

/// Sanitize the values of a configured tag list.
///
/// Returns the cleaned tags in their original order together with one
/// [`SanitizedValue`] for every value that changed.
pub fn sanitize_tags(tags: &[TagPair]) -> (Vec<TagPair>, Vec<SanitizedValue>) {
    let mut changed = Vec::new();
    let cleaned = tags
        .iter()
        .map(|tag| match sanitize_tag_value(&tag.value) {
            Cow::Borrowed(_) => tag.clone(),
            Cow::Owned(sanitized) => {
                changed.push(SanitizedValue {
                    key: tag.key.clone(),
                    original: tag.value.clone(),
                    sanitized: sanitized.clone(),
                });
                TagPair::new(tag.key.clone(), sanitized)
            }
        })
        .collect();
    (cleaned, changed)
}

/// Keys of `opposite` that do not also appear in `active`, in `opposite` order.
pub fn stale_keys(active: &[TagPair], opposite: &[TagPair]) -> Vec<String> {
    opposite
        .iter()
        .filter(|t| !active.iter().any(|a| a.key == t.key))
        .map(|t| t.key.clone())
        .collect()
}
