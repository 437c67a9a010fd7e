//! URL slugs for blog posts.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A lowercase, hyphen-separated URL segment such as `caring-for-opals`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length in characters.
    pub const MAX_LENGTH: usize = 80;

    /// Derive a slug from a title.
    ///
    /// ASCII letters and digits are kept (lowercased), every other run of
    /// characters collapses into one hyphen, and leading/trailing hyphens are
    /// dropped. Titles with no usable characters produce `post`.
    #[must_use]
    pub fn from_title(title: &str) -> Self {
        let mut slug = String::with_capacity(title.len());
        let mut pending_hyphen = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }

            if slug.len() >= Self::MAX_LENGTH {
                break;
            }
        }

        let slug = slug.trim_end_matches('-').to_owned();
        if slug.is_empty() {
            Self("post".to_owned())
        } else {
            Self(slug)
        }
    }

    /// Append a numeric suffix, used when the base slug is taken.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title_basic() {
        assert_eq!(
            Slug::from_title("Caring for Opals").as_str(),
            "caring-for-opals"
        );
    }

    #[test]
    fn test_from_title_collapses_punctuation() {
        assert_eq!(
            Slug::from_title("  Sapphires: Blue, Pink & Padparadscha!! ").as_str(),
            "sapphires-blue-pink-padparadscha"
        );
    }

    #[test]
    fn test_from_title_drops_non_ascii() {
        assert_eq!(Slug::from_title("Émeraude 101").as_str(), "meraude-101");
    }

    #[test]
    fn test_from_title_empty_falls_back() {
        assert_eq!(Slug::from_title("!!!").as_str(), "post");
        assert_eq!(Slug::from_title("").as_str(), "post");
    }

    #[test]
    fn test_from_title_truncates() {
        let slug = Slug::from_title(&"ruby ".repeat(50));
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_with_suffix() {
        let slug = Slug::from_title("Diamond Grading");
        assert_eq!(slug.with_suffix(2).as_str(), "diamond-grading-2");
    }
}
