//! Product codes for restricted product families.
//!
//! A product code is a merchant-defined identifier (e.g. `FII-1001`), distinct
//! from the Shopify product id. One affidavit filing covers a set of codes and
//! one catalog product may map to several codes.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`ProductCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductCodeError {
    /// The input was empty after trimming.
    #[error("product code cannot be empty")]
    Empty,
}

/// A single trimmed, non-empty product code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProductCode(String);

impl ProductCode {
    /// Parse a product code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ProductCodeError::Empty`] for blank input.
    pub fn parse(s: &str) -> Result<Self, ProductCodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProductCodeError::Empty);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProductCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An ordered set of product codes.
///
/// Keeps first-seen order and drops duplicates, so the list a customer typed
/// is echoed back the way they typed it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ProductCodes(Vec<ProductCode>);

impl ProductCodes {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a comma-delimited list, skipping blank entries.
    ///
    /// ```
    /// use affidavit_core::ProductCodes;
    ///
    /// let codes = ProductCodes::parse_delimited(" A123, B456,,A123 ");
    /// assert_eq!(codes.join(","), "A123,B456");
    /// ```
    #[must_use]
    pub fn parse_delimited(s: &str) -> Self {
        s.split(',')
            .filter_map(|part| ProductCode::parse(part).ok())
            .collect()
    }

    /// Parse a product metafield value.
    ///
    /// `list.single_line_text_field` metafields hold a JSON array of strings;
    /// older products were tagged with a plain comma-delimited string.
    #[must_use]
    pub fn parse_metafield(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with('[')
            && let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed)
        {
            return list
                .iter()
                .filter_map(|code| ProductCode::parse(code).ok())
                .collect();
        }
        Self::parse_delimited(trimmed)
    }

    /// Add a code; returns `false` if it was already present.
    pub fn insert(&mut self, code: ProductCode) -> bool {
        if self.0.contains(&code) {
            return false;
        }
        self.0.push(code);
        true
    }

    /// Whether `code` is in the set.
    #[must_use]
    pub fn contains(&self, code: &ProductCode) -> bool {
        self.0.contains(code)
    }

    /// Whether any of `codes` is in the set.
    #[must_use]
    pub fn intersects(&self, codes: &[ProductCode]) -> bool {
        codes.iter().any(|code| self.contains(code))
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProductCode> {
        self.0.iter()
    }

    /// Borrow the codes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ProductCode] {
        &self.0
    }

    /// Number of codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join the codes with `sep`.
    #[must_use]
    pub fn join(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(ProductCode::as_str)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl FromIterator<ProductCode> for ProductCodes {
    fn from_iter<I: IntoIterator<Item = ProductCode>>(iter: I) -> Self {
        let mut codes = Self::new();
        for code in iter {
            codes.insert(code);
        }
        codes
    }
}

impl Extend<ProductCode> for ProductCodes {
    fn extend<I: IntoIterator<Item = ProductCode>>(&mut self, iter: I) {
        for code in iter {
            self.insert(code);
        }
    }
}

impl<'a> IntoIterator for &'a ProductCodes {
    type Item = &'a ProductCode;
    type IntoIter = std::slice::Iter<'a, ProductCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ProductCodes {
    type Item = ProductCode;
    type IntoIter = std::vec::IntoIter<ProductCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for ProductCodes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let codes = Vec::<ProductCode>::deserialize(deserializer)?;
        Ok(codes.into_iter().collect())
    }
}
