//! The conversation engine: turn handling, token relay, and compaction

use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use recall_ai::{ChatRequest, CompletionBackend, Content, Message, StreamEvent, TextAccumulator};
use tokio::sync::{OwnedMappedMutexGuard, OwnedMutexGuard, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::{
    compaction::Summarizer,
    conversation::{ConversationId, ConversationState},
    events::OutputChunk,
    message_log::MessageLog,
    prompt::{PromptPlan, resolve_attachment},
    window, Error, Result,
};

/// Chunks buffered between the backend relay and a slow caller
const CHANNEL_CAPACITY: usize = 32;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Window capacity in messages
    pub capacity: usize,
    /// System prompt; omitted from requests when empty
    pub system_prompt: String,
    /// Sampling temperature; omitted from requests when `None`
    pub temperature: Option<f32>,
    /// Base URL for relative attachment references
    pub attachment_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            capacity: 4,
            system_prompt: String::new(),
            temperature: None,
            attachment_base_url: "http://localhost:3000".to_string(),
        }
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<ConversationState>>>;
type StateGuard = OwnedMappedMutexGuard<Option<ConversationState>, ConversationState>;

/// Conversation engine shared by all conversations.
///
/// Each conversation has its own lock, held from reading the window until
/// the assistant reply is recorded and compaction has run. Different
/// conversations never wait on each other.
pub struct Engine {
    inner: Arc<Inner>,
    conversations: Mutex<HashMap<ConversationId, Slot>>,
}

struct Inner {
    config: EngineConfig,
    backend: Arc<dyn CompletionBackend>,
    log: Arc<dyn MessageLog>,
    summarizer: Summarizer,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn CompletionBackend>,
        log: Arc<dyn MessageLog>,
    ) -> Self {
        let summarizer = Summarizer::new(backend.clone(), config.model.clone())
            .with_temperature(config.temperature);
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                log,
                summarizer,
            }),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one user turn.
    ///
    /// Input is validated before anything is recorded. The user message is
    /// appended to the log, the prompt is built from the summary and the last
    /// `capacity` stored messages, and the backend stream is relayed through
    /// the returned [`TurnStream`].
    ///
    /// The relay runs on its own task and keeps going if the stream is
    /// dropped: the reply is still recorded and compaction still runs.
    pub async fn handle_turn(
        &self,
        conversation: &ConversationId,
        text: &str,
        attachments: &[String],
    ) -> Result<TurnStream> {
        let user_message = self.inner.user_message(text, attachments)?;

        let slot = self.slot(conversation);
        let mut guard = slot.lock_owned().await;
        if guard.is_none() {
            *guard = Some(self.inner.restore(conversation).await?);
        }
        let capacity = self.inner.config.capacity;
        let mut state = OwnedMutexGuard::map(guard, |loaded| {
            loaded.get_or_insert_with(|| ConversationState::new(capacity))
        });

        let window = window::prompt_window(&state.recent, state.capacity);
        let plan = PromptPlan::build(
            &self.inner.config.system_prompt,
            &state.summary,
            window,
            &user_message,
        );
        let conversation_messages = plan.conversation_len();
        let request = plan.into_request(&self.inner.config.model, self.inner.config.temperature);

        self.inner.log.append(conversation, &user_message).await?;
        state.recent.push(user_message);

        debug!(
            conversation = %conversation,
            prompt_messages = request.messages.len(),
            conversation_messages,
            attachments = attachments.len(),
            "Starting turn"
        );

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(
            self.inner
                .clone()
                .drive_turn(conversation.clone(), state, request, tx),
        );

        Ok(TurnStream {
            inner: ReceiverStream::new(rx),
        })
    }

    /// Start over under the same identity.
    ///
    /// Waits for any in-flight turn, archives the conversation in the log and
    /// forgets the in-memory state.
    pub async fn reset(&self, conversation: &ConversationId) -> Result<()> {
        let slot = self.slot(conversation);
        {
            let mut guard = slot.lock().await;
            self.inner.log.archive(conversation).await?;
            *guard = None;
        }
        self.release(conversation, slot);
        info!(conversation = %conversation, "Conversation reset");
        Ok(())
    }

    /// Copy of the current state, once a turn has loaded it.
    ///
    /// Waits for any in-flight turn on the conversation to finish.
    pub async fn snapshot(&self, conversation: &ConversationId) -> Option<ConversationState> {
        let slot = self.conversations.lock().get(conversation).cloned()?;
        let guard = slot.lock().await;
        guard.clone()
    }

    fn slot(&self, conversation: &ConversationId) -> Slot {
        self.conversations
            .lock()
            .entry(conversation.clone())
            .or_default()
            .clone()
    }

    /// Drop the slot from the map unless another turn still holds it
    fn release(&self, conversation: &ConversationId, slot: Slot) {
        let mut conversations = self.conversations.lock();
        // One reference in the map, one here
        if Arc::strong_count(&slot) <= 2 {
            conversations.remove(conversation);
        }
    }
}

impl Inner {
    fn user_message(&self, text: &str, attachments: &[String]) -> Result<Message> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(Error::validation(
                "message text must not be empty without attachments",
            ));
        }

        let mut content = Vec::with_capacity(attachments.len() + 1);
        if !text.is_empty() {
            content.push(Content::text(text));
        }
        for reference in attachments {
            let url = resolve_attachment(reference, &self.config.attachment_base_url)?;
            content.push(Content::image(url));
        }

        Ok(Message::user_with_content(content))
    }

    async fn restore(&self, conversation: &ConversationId) -> Result<ConversationState> {
        let capacity = self.config.capacity;
        let recent = self.log.recent(conversation, capacity).await?;
        let summary = self.log.summary(conversation).await?;
        debug!(
            conversation = %conversation,
            recent = recent.len(),
            has_summary = summary.is_some(),
            "Loaded conversation"
        );
        Ok(ConversationState::restore(capacity, summary, recent))
    }

    async fn drive_turn(
        self: Arc<Self>,
        conversation: ConversationId,
        mut state: StateGuard,
        request: ChatRequest,
        tx: mpsc::Sender<OutputChunk>,
    ) {
        let mut relay = Relay::new(tx);

        let mut stream = match self.backend.stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(conversation = %conversation, "Backend stream failed to open: {}", e);
                relay.send(OutputChunk::error(e.to_string())).await;
                self.hold_back_overflow(&conversation, &mut state);
                return;
            }
        };

        let mut reply = TextAccumulator::new();
        while let Some(event) = stream.next().await {
            reply.process_event(&event);
            match event {
                StreamEvent::Delta { text } => relay.send(OutputChunk::token(text)).await,
                StreamEvent::Done => break,
                StreamEvent::Error { message } => {
                    warn!(conversation = %conversation, "Backend stream failed: {}", message);
                    relay.send(OutputChunk::error(message)).await;
                    break;
                }
            }
        }

        let deltas = reply.delta_count();
        let Some(text) = reply.finish() else {
            debug!(conversation = %conversation, "No tokens received, nothing recorded");
            self.hold_back_overflow(&conversation, &mut state);
            return;
        };

        let message = Message::assistant(text);
        if let Err(e) = self.log.append(&conversation, &message).await {
            error!(
                conversation = %conversation,
                "Assistant reply was not persisted: {}", e
            );
        }
        state.recent.push(message);
        debug!(
            conversation = %conversation,
            deltas,
            caller_connected = relay.connected,
            "Turn complete"
        );

        self.compact_if_needed(&conversation, &mut state).await;
    }

    /// Keep a turn without a reply from growing the window.
    ///
    /// Only the current user message may sit beyond capacity; anything older
    /// moves to the carry-over. No compaction runs here.
    fn hold_back_overflow(&self, conversation: &ConversationId, state: &mut ConversationState) {
        let evicted = window::trim(&mut state.recent, state.capacity + 1);
        if evicted.is_empty() {
            return;
        }
        let held = evicted.len();
        let dropped = state.carry_over(evicted);
        debug!(
            conversation = %conversation,
            held,
            held_back = state.unsummarized.len(),
            "Moved unanswered messages out of the window"
        );
        if dropped > 0 {
            error!(
                conversation = %conversation,
                dropped,
                "Unsummarized backlog full, oldest messages left the window unsummarized"
            );
        }
    }

    async fn compact_if_needed(&self, conversation: &ConversationId, state: &mut ConversationState) {
        if !window::needs_compaction(state.recent.len(), state.capacity) {
            return;
        }

        let mut dialog = state.unsummarized.clone();
        dialog.extend(state.recent.iter().cloned());

        match self.summarizer.compact(&state.summary, &dialog).await {
            Ok(summary) => {
                if let Err(e) = self.log.set_summary(conversation, &summary).await {
                    error!(conversation = %conversation, "Summary was not persisted: {}", e);
                }
                state.summary = summary;
                state.unsummarized.clear();
                let evicted = window::trim(&mut state.recent, state.capacity);
                info!(
                    conversation = %conversation,
                    summarized = dialog.len(),
                    evicted = evicted.len(),
                    summary_len = state.summary.len(),
                    "Compacted conversation"
                );
            }
            Err(e) => {
                let evicted = window::trim(&mut state.recent, state.capacity);
                let dropped = state.carry_over(evicted);
                warn!(
                    conversation = %conversation,
                    held_back = state.unsummarized.len(),
                    "Keeping previous summary: {}", e
                );
                if dropped > 0 {
                    error!(
                        conversation = %conversation,
                        dropped,
                        "Unsummarized backlog full, oldest messages left the window unsummarized"
                    );
                }
            }
        }
    }
}

/// Forwards chunks to the caller until the caller goes away
struct Relay {
    tx: mpsc::Sender<OutputChunk>,
    connected: bool,
}

impl Relay {
    fn new(tx: mpsc::Sender<OutputChunk>) -> Self {
        Self {
            tx,
            connected: true,
        }
    }

    async fn send(&mut self, chunk: OutputChunk) {
        if self.connected && self.tx.send(chunk).await.is_err() {
            self.connected = false;
            debug!("Caller disconnected, draining backend stream");
        }
    }
}

/// Single-pass stream of a turn's output chunks.
///
/// Ends after the backend finishes. If the turn failed, the last chunk is an
/// [`OutputChunk::Error`].
pub struct TurnStream {
    inner: ReceiverStream<OutputChunk>,
}

impl Stream for TurnStream {
    type Item = OutputChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
