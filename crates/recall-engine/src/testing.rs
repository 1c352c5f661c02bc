//! Test doubles for the completion backend

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use recall_ai::{ChatRequest, CompletionBackend, Error, Result, StreamEvent, TokenStream};

/// What the next `stream` call does
pub(crate) enum Script {
    /// Replay these events
    Events(Vec<StreamEvent>),
    /// Replay these events, sleeping before each one
    Slow(Vec<StreamEvent>, Duration),
    /// Fail to open the stream
    Refuse(String),
}

/// Backend that replays queued scripts and records every request.
///
/// With an empty queue, `stream` replies `"ok"` and `complete` returns a
/// numbered summary.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    summaries: Mutex<VecDeque<std::result::Result<String, String>>>,
    stream_requests: Mutex<Vec<ChatRequest>>,
    complete_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_script(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    /// Queue a reply streamed as the given deltas followed by `Done`
    pub(crate) fn push_reply(&self, deltas: &[&str]) {
        let mut events: Vec<_> = deltas.iter().map(|d| StreamEvent::delta(*d)).collect();
        events.push(StreamEvent::Done);
        self.push_script(Script::Events(events));
    }

    pub(crate) fn push_summary(&self, summary: std::result::Result<String, String>) {
        self.summaries.lock().push_back(summary);
    }

    pub(crate) fn stream_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests.lock().clone()
    }

    pub(crate) fn complete_requests(&self) -> Vec<ChatRequest> {
        self.complete_requests.lock().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream> {
        self.stream_requests.lock().push(request.clone());

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![StreamEvent::delta("ok"), StreamEvent::Done]));

        match script {
            Script::Events(events) => Ok(Box::pin(tokio_stream::iter(events))),
            Script::Slow(events, delay) => Ok(Box::pin(tokio_stream::iter(events).then(
                move |event| async move {
                    tokio::time::sleep(delay).await;
                    event
                },
            ))),
            Script::Refuse(message) => Err(Error::status(503, message)),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let call = {
            let mut requests = self.complete_requests.lock();
            requests.push(request.clone());
            requests.len()
        };

        match self.summaries.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(Error::status(500, message)),
            None => Ok(format!("summary {}", call)),
        }
    }
}
