// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render tree and rendering engine interface.
//!
//! The dispatcher builds `Provider > Layout* > Page` and hands it to a
//! [`RenderEngine`]. Control flow raised by components (redirect, not found)
//! comes back as an [`Outcome`] instead of an error.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{ArborError, Result};
use crate::locale::Dictionaries;
use crate::module::Component;

/// Status used when a redirect does not name one.
pub const DEFAULT_REDIRECT_STATUS: u16 = 307;

/// A redirect requested by module code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Target URL.
    pub location: String,
    /// 3xx status.
    pub status: u16,
}

impl Redirect {
    /// A redirect with [`DEFAULT_REDIRECT_STATUS`].
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: DEFAULT_REDIRECT_STATUS,
        }
    }

    /// A redirect with an explicit status.
    pub fn with_status(location: impl Into<String>, status: u16) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }
}

/// Result of running module code: a value, or a control-flow signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Completed normally.
    Done(T),
    /// Stop and redirect.
    Redirect(Redirect),
    /// Stop and render the not-found page.
    NotFound,
}

impl<T> Outcome<T> {
    /// Maps the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Redirect(redirect) => Outcome::Redirect(redirect),
            Outcome::NotFound => Outcome::NotFound,
        }
    }

    /// Returns true for [`Outcome::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

/// A node of the render tree.
#[derive(Debug, Clone)]
pub enum Element {
    /// Supplies locale and dictionaries to everything below.
    Provider {
        /// Active locale.
        locale: String,
        /// Translation tables.
        dictionaries: Arc<Dictionaries>,
        /// Wrapped subtree.
        child: Box<Element>,
    },
    /// A layout wrapping its child's markup.
    Layout {
        /// Layout component.
        component: Component,
        /// Props; `children` is added at render time.
        props: JsonValue,
        /// Wrapped subtree.
        child: Box<Element>,
    },
    /// The page itself.
    Page {
        /// Page component.
        component: Component,
        /// Page props.
        props: JsonValue,
    },
}

impl Element {
    /// Builds `Provider > layouts (outer → inner) > Page`.
    pub fn compose(
        locale: impl Into<String>,
        dictionaries: Arc<Dictionaries>,
        layouts: Vec<Component>,
        page: Component,
        props: JsonValue,
    ) -> Self {
        let mut tree = Element::Page {
            component: page,
            props: props.clone(),
        };
        for component in layouts.into_iter().rev() {
            tree = Element::Layout {
                component,
                props: props.clone(),
                child: Box::new(tree),
            };
        }
        Element::Provider {
            locale: locale.into(),
            dictionaries,
            child: Box::new(tree),
        }
    }

    /// Number of layouts in the tree.
    pub fn layout_depth(&self) -> usize {
        match self {
            Element::Provider { child, .. } => child.layout_depth(),
            Element::Layout { child, .. } => 1 + child.layout_depth(),
            Element::Page { .. } => 0,
        }
    }
}

/// Turns a render tree into markup.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Renders `element`. Signals raised by components come back as
    /// [`Outcome`]; faults as [`ArborError::Render`].
    async fn render(&self, element: &Element, ctx: &RequestContext) -> Result<Outcome<String>>;
}

/// Default engine: renders the page, then each layout outward with the
/// inner markup as its `children` prop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRenderer;

#[async_trait]
impl RenderEngine for TreeRenderer {
    async fn render(&self, element: &Element, ctx: &RequestContext) -> Result<Outcome<String>> {
        let mut ctx = ctx.clone();
        let mut layouts = Vec::new();
        let mut node = element;

        let (page, page_props) = loop {
            match node {
                Element::Provider {
                    locale,
                    dictionaries,
                    child,
                } => {
                    ctx.locale = locale.clone();
                    ctx.dictionaries = dictionaries.clone();
                    node = &**child;
                }
                Element::Layout {
                    component,
                    props,
                    child,
                } => {
                    layouts.push((component, props));
                    node = &**child;
                }
                Element::Page { component, props } => break (component, props),
            }
        };

        let mut html = match page.call(page_props.clone(), &ctx).await {
            Ok(Outcome::Done(html)) => html,
            Ok(signal) => return Ok(signal),
            Err(fault) => return Err(ArborError::Render(fault)),
        };

        for (component, props) in layouts.into_iter().rev() {
            let mut props = props.clone();
            if let JsonValue::Object(map) = &mut props {
                map.insert("children".to_string(), JsonValue::String(html));
            } else {
                props = serde_json::json!({ "children": html });
            }
            html = match component.call(props, &ctx).await {
                Ok(Outcome::Done(html)) => html,
                Ok(signal) => return Ok(signal),
                Err(fault) => return Err(ArborError::Render(fault)),
            };
        }

        debug!(bytes = html.len(), "Rendered tree");
        Ok(Outcome::Done(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wrap(tag: &'static str) -> Component {
        Component::sync(move |props, _| {
            Ok(Outcome::Done(format!(
                "<{tag}>{}</{tag}>",
                props["children"].as_str().unwrap_or_default()
            )))
        })
    }

    #[tokio::test]
    async fn test_layouts_wrap_outer_to_inner() {
        let page = Component::sync(|props, ctx| {
            Ok(Outcome::Done(format!("{}-{}", props["params"]["id"], ctx.locale)))
        });
        let tree = Element::compose(
            "de",
            Arc::default(),
            vec![wrap("html"), wrap("main")],
            page,
            json!({ "params": { "id": 7 } }),
        );
        assert_eq!(tree.layout_depth(), 2);

        let ctx = RequestContext::new("/", "en", Arc::default());
        let out = TreeRenderer.render(&tree, &ctx).await.unwrap();
        assert_eq!(out, Outcome::Done("<html><main>7-de</main></html>".to_string()));
    }

    #[tokio::test]
    async fn test_redirect_short_circuits_layouts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let layout = Component::sync(move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Done(String::new()))
        });
        let page = Component::sync(|_, _| Ok(Outcome::Redirect(Redirect::with_status("/login", 307))));

        let tree = Element::compose("en", Arc::default(), vec![layout], page, json!({}));
        let ctx = RequestContext::new("/", "en", Arc::default());
        let out = TreeRenderer.render(&tree, &ctx).await.unwrap();

        assert_eq!(out, Outcome::Redirect(Redirect::with_status("/login", 307)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fault_becomes_render_error() {
        let page = Component::sync(|_, _| Err(Fault::new("boom").with_status_code(418)));
        let tree = Element::compose("en", Arc::default(), Vec::new(), page, json!({}));
        let ctx = RequestContext::new("/", "en", Arc::default());

        match TreeRenderer.render(&tree, &ctx).await {
            Err(ArborError::Render(fault)) => assert_eq!(fault.classify_status(), 418),
            other => panic!("expected render error, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_map() {
        assert_eq!(Outcome::Done(2).map(|n| n * 2), Outcome::Done(4));
        assert_eq!(Outcome::<i32>::NotFound.map(|n| n * 2), Outcome::NotFound);
    }
}
