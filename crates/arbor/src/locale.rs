// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Locale resolution and translation dictionaries.
//!
//! The active locale comes from, in order: a locale prefix in the URL, the
//! locale cookie, the first `Accept-Language` tag, the configured default.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::I18nConfig;
use crate::error::{ArborError, Result};

lazy_static! {
    static ref LOCALE_TOKEN: Regex = Regex::new(r"^([A-Za-z]{2})(?:[-_]([A-Za-z]{2}))?$").unwrap();
}

/// Canonicalises a locale token (`en_us` → `en-US`), or `None` when malformed.
pub fn canonicalize(token: &str) -> Option<String> {
    let caps = LOCALE_TOKEN.captures(token.trim())?;
    let language = caps.get(1)?.as_str().to_ascii_lowercase();
    Some(match caps.get(2) {
        Some(region) => format!("{}-{}", language, region.as_str().to_ascii_uppercase()),
        None => language,
    })
}

/// Derives the active locale for a request.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    default_locale: String,
    supported: Vec<String>,
    cookie_name: String,
}

impl LocaleResolver {
    /// Creates a resolver. An empty `supported` list accepts only the
    /// default locale until more are added with [`LocaleResolver::with_supported`].
    pub fn new(default_locale: impl Into<String>, supported: Vec<String>) -> Self {
        let default_locale = default_locale.into();
        let default_locale = canonicalize(&default_locale).unwrap_or(default_locale);
        let supported = if supported.is_empty() {
            vec![default_locale.clone()]
        } else {
            supported
        };
        Self {
            default_locale,
            supported: Vec::new(),
            cookie_name: "locale".to_string(),
        }
        .with_supported(supported)
    }

    /// Creates a resolver from the `[i18n]` section.
    pub fn from_config(config: &I18nConfig) -> Self {
        Self::new(config.default_locale.clone(), config.locales.clone())
            .with_cookie_name(config.cookie_name.clone())
    }

    /// Adds locales to the accepted set, skipping duplicates.
    pub fn with_supported<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for locale in locales {
            let locale = locale.as_ref();
            let canonical = canonicalize(locale).unwrap_or_else(|| locale.to_string());
            if !self.supported.contains(&canonical) {
                self.supported.push(canonical);
            }
        }
        self
    }

    /// Overrides the cookie consulted after the URL.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// The fallback locale.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Name of the locale cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Accepted locales.
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// Canonical form of `token` if it is well-formed and accepted.
    pub fn accept(&self, token: &str) -> Option<String> {
        let canonical = canonicalize(token)?;
        self.supported.contains(&canonical).then_some(canonical)
    }

    /// Locale carried by the first path segment.
    pub fn locale_from_path(&self, pathname: &str) -> Option<String> {
        let first = pathname.split('/').find(|s| !s.is_empty())?;
        self.accept(first)
    }

    /// Resolves the active locale: URL, then cookie, then `Accept-Language`,
    /// then the default.
    pub fn resolve(
        &self,
        pathname: &str,
        cookie: Option<&str>,
        accept_language: Option<&str>,
    ) -> String {
        if let Some(locale) = self.locale_from_path(pathname) {
            return locale;
        }
        if let Some(locale) = cookie.and_then(|c| self.accept(c)) {
            return locale;
        }
        if let Some(locale) = accept_language.and_then(|h| self.from_accept_language(h)) {
            return locale;
        }
        self.default_locale.clone()
    }

    fn from_accept_language(&self, header: &str) -> Option<String> {
        let tag = header.split(',').next()?.split(';').next()?.trim();
        if tag.is_empty() || tag == "*" {
            return None;
        }
        self.accept(tag).or_else(|| {
            let primary = tag.split(['-', '_']).next()?;
            self.accept(primary)
        })
    }

    /// Removes every leading locale segment. Idempotent.
    pub fn strip_locale_from_path(&self, pathname: &str) -> String {
        let mut rest = pathname.trim_start_matches('/');
        let mut stripped = false;

        loop {
            let first = rest.split('/').next().unwrap_or_default();
            if first.is_empty() || self.accept(first).is_none() {
                break;
            }
            rest = rest[first.len()..].trim_start_matches('/');
            stripped = true;
        }

        if stripped {
            format!("/{}", rest)
        } else {
            pathname.to_string()
        }
    }

    /// Prefixes `path` with `locale`.
    pub fn with_locale(&self, locale: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("/{}", locale)
        } else {
            format!("/{}/{}", locale, path)
        }
    }
}

impl Default for LocaleResolver {
    fn default() -> Self {
        Self::from_config(&I18nConfig::default())
    }
}

/// Translation tables keyed by locale, with nested keys flattened by `.`.
#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    default_locale: String,
    entries: HashMap<String, HashMap<String, String>>,
}

impl Dictionaries {
    /// Creates an empty set.
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            entries: HashMap::new(),
        }
    }

    /// Loads every `<locale>.json` file in `dir`. A missing directory yields
    /// an empty set.
    pub fn load(dir: &Path, default_locale: &str) -> Result<Self> {
        let mut dictionaries = Self::new(default_locale);
        if !dir.is_dir() {
            return Ok(dictionaries);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let locale = canonicalize(stem).unwrap_or_else(|| stem.to_string());

            let content = fs::read_to_string(&path)?;
            let value: JsonValue = serde_json::from_str(&content)
                .map_err(|e| ArborError::Config(format!("{}: {}", path.display(), e)))?;
            dictionaries.insert(&locale, &value);
            debug!(locale = %locale, path = %path.display(), "Loaded dictionary");
        }

        Ok(dictionaries)
    }

    /// Merges a JSON document into `locale`'s table.
    pub fn insert(&mut self, locale: &str, value: &JsonValue) {
        let table = self.entries.entry(locale.to_string()).or_default();
        flatten_into("", value, table);
    }

    /// Locales with a table.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The flattened table for `locale`.
    pub fn table(&self, locale: &str) -> Option<&HashMap<String, String>> {
        self.entries.get(locale)
    }

    /// Looks `key` up in `locale`, its primary subtag, then the default locale.
    pub fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        let primary = locale.split('-').next().unwrap_or(locale);
        [locale, primary, self.default_locale.as_str()]
            .into_iter()
            .find_map(|l| self.entries.get(l)?.get(key))
            .map(String::as_str)
    }

    /// Like [`Dictionaries::lookup`], falling back to the key itself.
    pub fn translate(&self, locale: &str, key: &str) -> String {
        self.lookup(locale, key).unwrap_or(key).to_string()
    }
}

fn flatten_into(prefix: &str, value: &JsonValue, out: &mut HashMap<String, String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, child, out);
            }
        }
        JsonValue::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        JsonValue::Null | JsonValue::Array(_) => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn resolver() -> LocaleResolver {
        LocaleResolver::new("en", vec!["en".into(), "de".into(), "pt-br".into()])
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("EN").as_deref(), Some("en"));
        assert_eq!(canonicalize("en_us").as_deref(), Some("en-US"));
        assert_eq!(canonicalize("pt-br").as_deref(), Some("pt-BR"));
        assert_eq!(canonicalize("english"), None);
        assert_eq!(canonicalize("e1"), None);
    }

    #[test]
    fn test_resolve_priority() {
        let r = resolver();
        assert_eq!(r.resolve("/de/about", Some("en"), Some("pt-BR")), "de");
        assert_eq!(r.resolve("/about", Some("de"), Some("pt-BR")), "de");
        assert_eq!(r.resolve("/about", None, Some("pt-BR,en;q=0.8")), "pt-BR");
        assert_eq!(r.resolve("/about", None, None), "en");
    }

    #[test]
    fn test_unsupported_values_fall_through() {
        let r = resolver();
        assert_eq!(r.resolve("/fr/about", Some("it"), Some("de-CH")), "de");
        assert_eq!(r.resolve("/fr/about", Some("it"), Some("ja")), "en");
    }

    #[test]
    fn test_unconfigured_accepts_default_only() {
        let r = LocaleResolver::new("en", Vec::new());
        assert_eq!(r.supported(), ["en".to_string()]);
        assert_eq!(r.resolve("/ja/about", None, None), "en");
        assert_eq!(r.resolve("/en/about", None, None), "en");

        let r = r.with_supported(["ja", "EN"]);
        assert_eq!(r.supported(), ["en".to_string(), "ja".to_string()]);
        assert_eq!(r.resolve("/ja/about", None, None), "ja");
    }

    #[test]
    fn test_short_segments_survive_default_resolver() {
        let r = LocaleResolver::default();
        assert_eq!(r.strip_locale_from_path("/go"), "/go");
        assert_eq!(r.strip_locale_from_path("/de/go"), "/de/go");
        assert_eq!(r.strip_locale_from_path("/en/go"), "/go");
        assert_eq!(r.with_locale("en", &r.strip_locale_from_path("/en/go")), "/en/go");

        let r = r.with_supported(["de"]);
        let stripped = r.strip_locale_from_path("/de/go");
        assert_eq!(stripped, "/go");
        assert_eq!(r.with_locale("de", &stripped), "/de/go");
        assert_eq!(r.strip_locale_from_path("/ui"), "/ui");
    }

    #[test]
    fn test_strip_locale() {
        let r = resolver();
        assert_eq!(r.strip_locale_from_path("/de/about"), "/about");
        assert_eq!(r.strip_locale_from_path("/de"), "/");
        assert_eq!(r.strip_locale_from_path("/about"), "/about");
        assert_eq!(r.strip_locale_from_path("/fr/about"), "/fr/about");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let r = resolver();
        for path in ["/de/about", "/de/en/about", "/", "/about/de", "/pt-BR", "/en/"] {
            let once = r.strip_locale_from_path(path);
            assert_eq!(r.strip_locale_from_path(&once), once, "path {}", path);
        }
    }

    #[test]
    fn test_strip_then_prefix_round_trips() {
        let r = resolver();
        for path in ["/de/about", "/en/blog/post", "/de"] {
            let locale = r.locale_from_path(path).unwrap();
            let stripped = r.strip_locale_from_path(path);
            assert_eq!(r.with_locale(&locale, &stripped), path);
        }
    }

    #[test]
    fn test_dictionary_lookup_fallbacks() {
        let mut dicts = Dictionaries::new("en");
        dicts.insert("en", &json!({ "nav": { "home": "Home", "about": "About" }, "count": 3 }));
        dicts.insert("de", &json!({ "nav": { "home": "Startseite" } }));
        dicts.insert("pt", &json!({ "nav": { "home": "Início" } }));

        assert_eq!(dicts.translate("de", "nav.home"), "Startseite");
        assert_eq!(dicts.translate("de", "nav.about"), "About");
        assert_eq!(dicts.translate("pt-BR", "nav.home"), "Início");
        assert_eq!(dicts.translate("de", "count"), "3");
        assert_eq!(dicts.translate("de", "missing.key"), "missing.key");
    }

    #[test]
    fn test_dictionaries_load() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"hello": "Hello"}"#).unwrap();
        fs::write(dir.path().join("pt_br.json"), r#"{"hello": "Olá"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let dicts = Dictionaries::load(dir.path(), "en").unwrap();
        assert_eq!(dicts.lookup("pt-BR", "hello"), Some("Olá"));
        assert_eq!(dicts.lookup("en", "hello"), Some("Hello"));

        let missing = Dictionaries::load(&dir.path().join("nope"), "en").unwrap();
        assert_eq!(missing.locales().count(), 0);
    }

    #[test]
    fn test_dictionaries_load_rejects_bad_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), "{ not json").unwrap();
        assert!(matches!(
            Dictionaries::load(dir.path(), "en"),
            Err(ArborError::Config(_))
        ));
    }
}
