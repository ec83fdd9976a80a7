//! Node declarations.
//!
//! A [`NodeSpec`] describes one agent in a workflow: who it is (role and
//! system prompt), what it may do (tools, tool budget, reasoning), and how
//! the engine should treat its output. Specs are built once at graph-build
//! time and immutable for every run; all execution behavior lives in the
//! executor.
//!
//! # Examples
//!
//! ```rust
//! use braidflow::node::NodeSpec;
//! use braidflow::types::AgentRole;
//!
//! let researcher = NodeSpec::new("researcher", AgentRole::Research)
//!     .with_system_prompt("Answer one question using the search tool.")
//!     .with_tools(["search"])
//!     .with_tool_steps(4)
//!     .with_reasoning(true);
//!
//! assert_eq!(researcher.name, "researcher");
//! assert_eq!(researcher.tool_steps, 4);
//! ```

use crate::types::AgentRole;

/// Reference to a tool by its advertised name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolRef {
    pub name: String,
}

impl<S: Into<String>> From<S> for ToolRef {
    fn from(name: S) -> Self {
        Self { name: name.into() }
    }
}

/// Declarative description of one agent node.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    /// Unique id within the graph; also the base of the node's branch keys.
    pub id: String,
    /// Display name for events and logs. Defaults to the id.
    pub name: String,
    pub role: AgentRole,
    pub system_prompt: Option<String>,
    /// Tools this node may call. The intersection with what the bridge
    /// actually registered is advertised to the model.
    pub tools: Vec<ToolRef>,
    /// Maximum tool round-trips per execution. With `0` the node never
    /// enters the tool loop, whatever it declares in `tools`.
    pub tool_steps: usize,
    /// Request an incremental reasoning trace before the answer.
    pub reasoning: bool,
    /// Step nodes announce themselves with a pending marker event when
    /// dispatched, so subscribers can show them as in progress.
    pub is_step: bool,
    /// Marks this node's output as the preferred run result.
    pub return_output: bool,
    /// How many trailing history messages to include in the model
    /// conversation. `None` falls back to the executor's default window.
    pub history_limit: Option<usize>,
}

impl NodeSpec {
    #[must_use]
    pub fn new(id: impl Into<String>, role: AgentRole) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role,
            system_prompt: None,
            tools: Vec::new(),
            tool_steps: 0,
            reasoning: false,
            is_step: false,
            return_output: false,
            history_limit: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ToolRef>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_tool_steps(mut self, tool_steps: usize) -> Self {
        self.tool_steps = tool_steps;
        self
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Mark this node as a step, announced with a pending event at dispatch.
    #[must_use]
    pub fn as_step(mut self) -> Self {
        self.is_step = true;
        self
    }

    #[must_use]
    pub fn with_return_output(mut self, return_output: bool) -> Self {
        self.return_output = return_output;
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Whether the tool loop is enabled for this node.
    #[must_use]
    pub fn uses_tools(&self) -> bool {
        !self.tools.is_empty() && self.tool_steps > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_inert() {
        let node = NodeSpec::new("planner", AgentRole::Planner);
        assert_eq!(node.name, "planner");
        assert_eq!(node.tool_steps, 0);
        assert!(!node.reasoning);
        assert!(!node.is_step);
        assert!(!node.return_output);
        assert!(!node.uses_tools());
    }

    #[test]
    fn tools_without_steps_stay_disabled() {
        let node = NodeSpec::new("r", AgentRole::Research).with_tools(["search"]);
        assert!(!node.uses_tools());

        let node = node.with_tool_steps(2);
        assert!(node.uses_tools());
    }

    #[test]
    fn tool_refs_convert_from_strings() {
        let node =
            NodeSpec::new("r", AgentRole::Research).with_tools(vec!["search".to_owned(), "calc".to_owned()]);
        assert_eq!(node.tools[0].name, "search");
        assert_eq!(node.tools[1].name, "calc");
    }
}
