//! Edge payload transforms.
//!
//! A [`Transform`] rewrites the payload travelling along an edge before it
//! reaches the target node. Transforms are pure: they see the payload, the
//! original query, the conversation history, and every prior node output,
//! and they return a new payload or a [`TransformError`]. They never touch
//! the ledger or emit events.
//!
//! On a map edge the transform's result must be a JSON array; each element
//! becomes one branch. On a reduce edge the transform receives the joined
//! branch outputs as an array (failed branches appear as `null` when the
//! run is configured to continue past them).
//!
//! # Examples
//!
//! ```rust
//! use braidflow::transform::{SplitTags, Transform, TransformContext};
//! use serde_json::{json, Value};
//!
//! let split = SplitTags::new("question");
//! let ctx = TransformContext::default();
//! let out = split
//!     .apply(json!("<question>a</question><question>b</question>"), &ctx)
//!     .unwrap();
//! assert_eq!(out, json!(["a", "b"]));
//! ```

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::context::NodeOutput;
use crate::message::Message;

/// Read-only view handed to every transform invocation.
///
/// `query` is the run's initial input rendered as text. `nodes` is the
/// ledger snapshot in append order, so a transform can address any
/// ancestor's output by key rather than only the immediate upstream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformContext<'a> {
    pub query: &'a str,
    pub nodes: &'a [NodeOutput],
    pub history: &'a [Message],
}

/// A payload rewrite applied while traversing an edge.
pub trait Transform: Send + Sync {
    /// Rewrite `payload`. Errors mark the edge's target node as failed.
    fn apply(&self, payload: Value, ctx: &TransformContext<'_>) -> Result<Value, TransformError>;

    /// Short name used in logs and error reports.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Failure raised by a [`Transform`], optionally bound to the edge it ran on.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("transform{} failed: {message}", .edge.as_deref().map(|e| format!(" on edge `{e}`")).unwrap_or_default())]
#[diagnostic(
    code(braidflow::transform::failed),
    help("check the transform's expected payload shape against what the upstream node produced")
)]
pub struct TransformError {
    /// `from -> to` label, filled in by the executor when the edge is known.
    pub edge: Option<String>,
    pub message: String,
}

impl TransformError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            edge: None,
            message: message.into(),
        }
    }

    /// Attach the `from -> to` label of the edge the transform ran on.
    #[must_use]
    pub fn bind_edge(mut self, edge: impl Into<String>) -> Self {
        self.edge = Some(edge.into());
        self
    }
}

/// Render a payload as prompt text: strings pass through unchanged, any
/// other JSON value is compact-encoded.
#[must_use]
pub fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Passes the payload through untouched. The default when an edge declares
/// no transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, payload: Value, _ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
        Ok(payload)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Joins an array of branch outputs into one string.
///
/// `null` elements (branches that failed under a continue policy) are
/// skipped rather than rendered.
#[derive(Clone, Debug)]
pub struct JoinResponses {
    separator: String,
}

impl JoinResponses {
    #[must_use]
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Default for JoinResponses {
    fn default() -> Self {
        Self::new("\n\n")
    }
}

impl Transform for JoinResponses {
    fn apply(&self, payload: Value, _ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
        let Value::Array(items) = payload else {
            return Err(TransformError::new(
                "join expects an array of branch outputs",
            ));
        };
        let joined = items
            .iter()
            .filter(|item| !item.is_null())
            .map(payload_text)
            .collect::<Vec<_>>()
            .join(&self.separator);
        Ok(Value::String(joined))
    }

    fn name(&self) -> &str {
        "join_responses"
    }
}

/// Extracts the contents of every `<tag>...</tag>` block into an array.
///
/// Produces an empty array when the input contains no complete block, which
/// a map edge treats as zero branches.
#[derive(Clone, Debug)]
pub struct SplitTags {
    open: String,
    close: String,
}

impl SplitTags {
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref();
        Self {
            open: format!("<{tag}>"),
            close: format!("</{tag}>"),
        }
    }
}

impl Transform for SplitTags {
    fn apply(&self, payload: Value, _ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
        let text = payload_text(&payload);
        let mut items = Vec::new();
        let mut rest = text.as_str();
        while let Some(start) = rest.find(&self.open) {
            let after_open = &rest[start + self.open.len()..];
            let Some(end) = after_open.find(&self.close) else {
                break;
            };
            items.push(Value::String(after_open[..end].trim().to_owned()));
            rest = &after_open[end + self.close.len()..];
        }
        Ok(Value::Array(items))
    }

    fn name(&self) -> &str {
        "split_tags"
    }
}

/// Fills a template with the run query and the incoming payload.
///
/// `{query}` is replaced with the original query text and `{input}` with
/// the payload rendered as text. Unknown placeholders are left alone.
#[derive(Clone, Debug)]
pub struct TemplateQuery {
    template: String,
}

impl TemplateQuery {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Transform for TemplateQuery {
    fn apply(&self, payload: Value, ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
        let rendered = self
            .template
            .replace("{query}", ctx.query)
            .replace("{input}", &payload_text(&payload));
        Ok(Value::String(rendered))
    }

    fn name(&self) -> &str {
        "template_query"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_passes_payload_through() {
        let ctx = TransformContext::default();
        let payload = json!({"k": [1, 2]});
        assert_eq!(Identity.apply(payload.clone(), &ctx).unwrap(), payload);
    }

    #[test]
    fn join_skips_null_slots() {
        let ctx = TransformContext::default();
        let joined = JoinResponses::new(" | ")
            .apply(json!(["a", null, "c"]), &ctx)
            .unwrap();
        assert_eq!(joined, json!("a | c"));
    }

    #[test]
    fn join_rejects_non_array_payloads() {
        let ctx = TransformContext::default();
        let err = JoinResponses::default()
            .apply(json!("not an array"), &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn split_tags_extracts_blocks_in_order() {
        let ctx = TransformContext::default();
        let out = SplitTags::new("q")
            .apply(json!("intro <q> first </q> mid <q>second</q> tail"), &ctx)
            .unwrap();
        assert_eq!(out, json!(["first", "second"]));
    }

    #[test]
    fn split_tags_without_blocks_yields_empty_array() {
        let ctx = TransformContext::default();
        let out = SplitTags::new("q")
            .apply(json!("no tags here, also an unclosed <q> one"), &ctx)
            .unwrap();
        assert_eq!(out, json!([]));
    }

    #[test]
    fn template_fills_query_and_input() {
        let ctx = TransformContext {
            query: "weather in oslo",
            ..TransformContext::default()
        };
        let out = TemplateQuery::new("Q: {query}\nA draft: {input}")
            .apply(json!("cold"), &ctx)
            .unwrap();
        assert_eq!(out, json!("Q: weather in oslo\nA draft: cold"));
    }

    #[test]
    fn bound_edge_shows_in_display() {
        let err = TransformError::new("boom").bind_edge("a -> b");
        assert_eq!(err.to_string(), "transform on edge `a -> b` failed: boom");
    }
}
