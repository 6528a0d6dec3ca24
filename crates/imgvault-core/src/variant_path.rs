//! Rewrites hosting delivery URLs into internal CDN paths.
//!
//! Delivery URLs look like `https://<host>/<account_hash>/<image_id>/<variant>`.
//! The account hash is dropped and the remainder is mounted under the CDN root,
//! so clients never see the hosting account or host.

use std::collections::BTreeMap;

use url::Url;

const DEFAULT_CDN_ROOT: &str = "/cdn-images";

#[derive(Debug, Clone)]
pub struct VariantPathTranslator {
    cdn_root: String,
}

impl Default for VariantPathTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_CDN_ROOT)
    }
}

impl VariantPathTranslator {
    pub fn new(cdn_root: impl Into<String>) -> Self {
        let cdn_root = cdn_root.into();
        Self {
            cdn_root: cdn_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn cdn_root(&self) -> &str {
        &self.cdn_root
    }

    /// Returns `(variant_name, internal_path)`, or `None` when the URL cannot
    /// be parsed or its path has fewer than two non-empty segments.
    pub fn translate(&self, hosting_url: &str) -> Option<(String, String)> {
        let parsed = Url::parse(hosting_url).ok()?;
        let path = parsed.path();

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return None;
        }
        let variant = segments[segments.len() - 1].to_string();

        // Everything after the first segment, trailing slash included.
        let without_leading = path.trim_start_matches('/');
        let suffix_start = without_leading.find('/')?;
        let suffix = &without_leading[suffix_start..];

        Some((variant, format!("{}{}", self.cdn_root, suffix)))
    }

    /// Translates every URL, skipping the ones [`translate`](Self::translate)
    /// rejects. Later URLs win on duplicate variant names.
    pub fn translate_all<I, S>(&self, urls: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut variants = BTreeMap::new();
        for url in urls {
            match self.translate(url.as_ref()) {
                Some((name, path)) => {
                    variants.insert(name, path);
                }
                None => {
                    tracing::debug!(url = %url.as_ref(), "Skipping untranslatable variant URL");
                }
            }
        }
        variants
    }
}
