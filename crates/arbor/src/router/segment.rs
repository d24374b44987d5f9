// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Directory-name conventions and pattern tokens.

/// How discovery treats a directory, decided from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirKind {
    /// `(name)`: transparent, contents keep the parent prefix.
    Group,
    /// `[name]`: appends `:name`.
    Dynamic(String),
    /// `[...name]`: appends `*name`.
    CatchAll(String),
    /// `[[...name]]`: appends `*name`, may match nothing.
    OptionalCatchAll(String),
    /// `api`: the subtree holds API handlers.
    Api,
    /// Configured utility directory; never scanned.
    Utility,
    /// Dot-prefixed, `_`-prefixed or `node_modules`; never scanned.
    Hidden,
    /// Anything else; appends the name verbatim.
    Plain(String),
}

impl DirKind {
    /// Classifies a directory name.
    pub fn parse(name: &str, skip_dirs: &[String]) -> Self {
        if name.starts_with('.') || name.starts_with('_') || name == "node_modules" {
            return DirKind::Hidden;
        }
        if skip_dirs.iter().any(|d| d == name) {
            return DirKind::Utility;
        }
        if name == "api" {
            return DirKind::Api;
        }
        if name.len() > 2 && name.starts_with('(') && name.ends_with(')') {
            return DirKind::Group;
        }
        if let Some(inner) = name.strip_prefix("[[...").and_then(|s| s.strip_suffix("]]")) {
            if !inner.is_empty() {
                return DirKind::OptionalCatchAll(inner.to_string());
            }
        }
        if let Some(inner) = name.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
            if !inner.is_empty() {
                return DirKind::CatchAll(inner.to_string());
            }
        }
        if let Some(inner) = name.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if !inner.is_empty() && !inner.contains(['[', ']']) {
                return DirKind::Dynamic(inner.to_string());
            }
        }
        DirKind::Plain(name.to_string())
    }

    /// Pattern segment this directory contributes, if any.
    pub fn to_pattern(&self) -> Option<String> {
        match self {
            DirKind::Dynamic(name) => Some(format!(":{}", name)),
            DirKind::CatchAll(name) | DirKind::OptionalCatchAll(name) => {
                Some(format!("*{}", name))
            }
            DirKind::Api => Some("api".to_string()),
            DirKind::Plain(name) => Some(name.clone()),
            DirKind::Group | DirKind::Utility | DirKind::Hidden => None,
        }
    }

    /// Returns true for both catch-all forms.
    pub fn is_catch_all(&self) -> bool {
        matches!(self, DirKind::CatchAll(_) | DirKind::OptionalCatchAll(_))
    }
}

/// A parsed segment of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSegment<'a> {
    /// Must equal the path segment.
    Literal(&'a str),
    /// `:name`, binds one segment.
    Param(&'a str),
    /// `*name`, binds the remaining tail.
    CatchAll(&'a str),
}

impl<'a> PatternSegment<'a> {
    /// Parses one pattern segment.
    pub fn parse(segment: &'a str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            PatternSegment::Param(name)
        } else if let Some(name) = segment.strip_prefix('*') {
            PatternSegment::CatchAll(name)
        } else {
            PatternSegment::Literal(segment)
        }
    }
}

/// Splits a pattern into its non-empty segments.
pub fn pattern_segments(pattern: &str) -> impl Iterator<Item = PatternSegment<'_>> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(PatternSegment::parse)
}

/// Parameter names of a pattern, in order.
pub fn extract_params(pattern: &str) -> Vec<String> {
    pattern_segments(pattern)
        .filter_map(|segment| match segment {
            PatternSegment::Param(name) | PatternSegment::CatchAll(name) => {
                Some(name.to_string())
            }
            PatternSegment::Literal(_) => None,
        })
        .collect()
}

/// Joins pattern segments into a pattern, `/` when empty.
pub fn join_pattern(segments: &[String]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip() -> Vec<String> {
        vec!["lib".to_string(), "styles".to_string()]
    }

    #[test]
    fn test_dir_kind_parse() {
        assert_eq!(DirKind::parse("(marketing)", &skip()), DirKind::Group);
        assert_eq!(DirKind::parse("[slug]", &skip()), DirKind::Dynamic("slug".into()));
        assert_eq!(DirKind::parse("[...path]", &skip()), DirKind::CatchAll("path".into()));
        assert_eq!(
            DirKind::parse("[[...path]]", &skip()),
            DirKind::OptionalCatchAll("path".into())
        );
        assert_eq!(DirKind::parse("api", &skip()), DirKind::Api);
        assert_eq!(DirKind::parse("lib", &skip()), DirKind::Utility);
        assert_eq!(DirKind::parse("_components", &skip()), DirKind::Hidden);
        assert_eq!(DirKind::parse(".git", &skip()), DirKind::Hidden);
        assert_eq!(DirKind::parse("node_modules", &skip()), DirKind::Hidden);
        assert_eq!(DirKind::parse("blog", &skip()), DirKind::Plain("blog".into()));
    }

    #[test]
    fn test_dir_kind_malformed_is_plain() {
        assert_eq!(DirKind::parse("[]", &skip()), DirKind::Plain("[]".into()));
        assert_eq!(DirKind::parse("[...]", &skip()), DirKind::Plain("[...]".into()));
        assert_eq!(DirKind::parse("()", &skip()), DirKind::Plain("()".into()));
    }

    #[test]
    fn test_dir_kind_to_pattern() {
        assert_eq!(DirKind::Dynamic("id".into()).to_pattern().as_deref(), Some(":id"));
        assert_eq!(DirKind::CatchAll("p".into()).to_pattern().as_deref(), Some("*p"));
        assert_eq!(
            DirKind::OptionalCatchAll("p".into()).to_pattern().as_deref(),
            Some("*p")
        );
        assert_eq!(DirKind::Group.to_pattern(), None);
    }

    #[test]
    fn test_extract_params() {
        assert_eq!(extract_params("/"), Vec::<String>::new());
        assert_eq!(extract_params("/blog/:slug"), vec!["slug"]);
        assert_eq!(extract_params("/u/:id/files/*rest"), vec!["id", "rest"]);
    }

    #[test]
    fn test_join_pattern() {
        assert_eq!(join_pattern(&[]), "/");
        assert_eq!(join_pattern(&["blog".into(), ":slug".into()]), "/blog/:slug");
    }
}
