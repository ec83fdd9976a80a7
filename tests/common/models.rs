//! Model doubles.
//!
//! One [`braidflow::llm::ModelClient`] serves every node of a run, so the
//! scripted double routes by content: a route matches when its marker occurs
//! in the request's system prompt or anywhere in its conversation. The
//! built-in role directives ("planning agent", "research agent",
//! "summarizing agent") make handy markers without any per-node setup.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use braidflow::llm::{ModelChunk, ModelClient, ModelError, ModelRequest, ModelStream};
use braidflow::message::Message;
use braidflow::types::ToolCall;
use futures_util::stream;
use futures_util::StreamExt;
use parking_lot::Mutex;

/// One model turn: the chunks a single `stream` call yields.
pub type Turn = Vec<Result<ModelChunk, ModelError>>;

/// A turn that streams `text` and finishes.
pub fn text_turn(text: &str) -> Turn {
    vec![Ok(ModelChunk::Text(text.to_string())), Ok(ModelChunk::Done)]
}

/// A turn that requests `calls` and finishes without text.
pub fn tool_turn(calls: Vec<ToolCall>) -> Turn {
    let mut turn: Turn = calls
        .into_iter()
        .map(|call| Ok(ModelChunk::ToolRequest(call)))
        .collect();
    turn.push(Ok(ModelChunk::Done));
    turn
}

/// A turn that fails mid-stream.
pub fn error_turn(message: &str) -> Turn {
    vec![Err(ModelError::stream(message))]
}

struct Route {
    marker: String,
    delay: Duration,
    turns: VecDeque<Turn>,
    repeat_last: bool,
}

/// Scripted model keyed by content markers.
///
/// Routes are checked in registration order and the first match wins; an
/// empty marker matches every request. Requests nothing matches fail with a
/// provider error, which keeps a miswired test loud instead of hanging.
#[derive(Default)]
pub struct StubModel {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl StubModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every matching request with the same single text turn.
    #[must_use]
    pub fn reply(self, marker: &str, text: &str) -> Self {
        self.route(marker, Duration::ZERO, vec![text_turn(text)], true)
    }

    /// Like [`reply`](Self::reply), but sleeps before the stream opens, so a
    /// test can pin which branch settles first.
    #[must_use]
    pub fn reply_after(self, marker: &str, delay: Duration, text: &str) -> Self {
        self.route(marker, delay, vec![text_turn(text)], true)
    }

    /// Play `turns` in order; requests past the end get a provider error.
    #[must_use]
    pub fn script(self, marker: &str, turns: Vec<Turn>) -> Self {
        self.route(marker, Duration::ZERO, turns, false)
    }

    fn route(self, marker: &str, delay: Duration, turns: Vec<Turn>, repeat_last: bool) -> Self {
        self.routes.lock().push(Route {
            marker: marker.to_string(),
            delay,
            turns: turns.into(),
            repeat_last,
        });
        self
    }

    /// Every request served so far, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request whose prompt or conversation mentions `marker`.
    pub fn last_request_matching(&self, marker: &str) -> Option<ModelRequest> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|request| mentions(request, marker))
            .cloned()
    }
}

fn mentions(request: &ModelRequest, marker: &str) -> bool {
    request
        .system_prompt
        .as_deref()
        .is_some_and(|prompt| prompt.contains(marker))
        || request
            .messages
            .iter()
            .any(|message| message.content.contains(marker))
}

#[async_trait]
impl ModelClient for StubModel {
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        self.requests.lock().push(request.clone());

        let (delay, turn) = {
            let mut routes = self.routes.lock();
            let Some(route) = routes
                .iter_mut()
                .find(|route| mentions(&request, &route.marker))
            else {
                let last = request
                    .messages
                    .last()
                    .map_or("<empty conversation>", |message| message.content.as_str());
                return Err(ModelError::provider(format!(
                    "no scripted reply matches: {last}"
                )));
            };
            let turn = match route.turns.pop_front() {
                Some(turn) => {
                    if route.repeat_last && route.turns.is_empty() {
                        route.turns.push_back(turn.clone());
                    }
                    turn
                }
                None => {
                    return Err(ModelError::provider(format!(
                        "script for `{}` is exhausted",
                        route.marker
                    )));
                }
            };
            (route.delay, turn)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(stream::iter(turn).boxed())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Replies `echo:<last user message>`, keeping payload flow visible through
/// a chain without any scripting.
#[derive(Debug, Default)]
pub struct EchoModel;

#[async_trait]
impl ModelClient for EchoModel {
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|message| message.has_role(Message::USER))
            .map_or_else(String::new, |message| message.content.clone());
        Ok(stream::iter([
            Ok(ModelChunk::Text(format!("echo:{last}"))),
            Ok(ModelChunk::Done),
        ])
        .boxed())
    }

    fn name(&self) -> &str {
        "echo"
    }
}
