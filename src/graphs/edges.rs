//! Edge declarations: patterns, transforms, and priorities.
//!
//! An [`EdgeSpec`] connects two nodes and declares how payloads travel
//! between them. The optional `output_transform` rewrites what leaves the
//! source (for a map edge it must produce the fan-out array; for a reduce
//! edge it receives the joined branch outputs), and the optional
//! `input_transform` rewrites the payload into the target's input, applied
//! once per target invocation.

use std::fmt;
use std::sync::Arc;

use crate::transform::Transform;
use crate::types::EdgePattern;

/// A directed edge in the workflow graph. Immutable once added.
///
/// # Examples
///
/// ```
/// use braidflow::graphs::EdgeSpec;
/// use braidflow::transform::SplitTags;
/// use braidflow::types::EdgePattern;
///
/// let fan_out = EdgeSpec::map("planner", "research")
///     .with_output_transform(SplitTags::new("question"));
/// assert_eq!(fan_out.pattern(), EdgePattern::Map);
/// assert_eq!(fan_out.label(), "planner -> research");
/// ```
#[derive(Clone)]
pub struct EdgeSpec {
    from: String,
    to: String,
    pattern: EdgePattern,
    input_transform: Option<Arc<dyn Transform>>,
    output_transform: Option<Arc<dyn Transform>>,
    priority: i32,
}

impl EdgeSpec {
    /// A sequential edge: one upstream completion, one downstream dispatch.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            pattern: EdgePattern::Sequential,
            input_transform: None,
            output_transform: None,
            priority: 0,
        }
    }

    /// A map edge: the source's transformed output must be an array, and
    /// the target runs once per element.
    pub fn map(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to).with_pattern(EdgePattern::Map)
    }

    /// A reduce edge: the target runs once, after every branch of the
    /// source settles, with the branch outputs joined in branch order.
    pub fn reduce(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to).with_pattern(EdgePattern::Reduce)
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: EdgePattern) -> Self {
        self.pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_input_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.input_transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn with_output_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.output_transform = Some(Arc::new(transform));
        self
    }

    /// Edges into a multi-incoming node are ranked by priority; the lowest
    /// value owns the payload handed to the target. Ties fall back to
    /// declaration order.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn pattern(&self) -> EdgePattern {
        self.pattern
    }

    pub fn input_transform(&self) -> Option<&Arc<dyn Transform>> {
        self.input_transform.as_ref()
    }

    pub fn output_transform(&self) -> Option<&Arc<dyn Transform>> {
        self.output_transform.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `from -> to` label for logs and transform error binding.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.from, self.to)
    }
}

impl fmt::Debug for EdgeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSpec")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("pattern", &self.pattern)
            .field("priority", &self.priority)
            .field("input_transform", &self.input_transform.is_some())
            .field("output_transform", &self.output_transform.is_some())
            .finish()
    }
}
