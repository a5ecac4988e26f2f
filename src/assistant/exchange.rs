use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ Context, Poll };

use futures::{ Stream, StreamExt };
use log::{ debug, info, warn };
use thiserror::Error;
use tokio::sync::{ mpsc, oneshot };
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use super::prompt::build_messages;
use crate::llm::chat::ChatClient;
use crate::llm::GenerationParams;
use crate::models::chat::{ ChatMessage, Conversation, ConversationError, ConversationSnapshot };

pub const CANCELLED_CAUSE: &str = "exchange cancelled";

const SNAPSHOT_BUFFER: usize = 32;

pub fn error_reply(cause: impl Display) -> String {
    format!("An error occurred: {}", cause)
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error("exchange task failed: {0}")]
    Task(String),
}

/// One chat request in flight.
///
/// Yields a [`ConversationSnapshot`] for every non-empty fragment the backend
/// sends. If the backend fails (or the exchange is cancelled) the pending turn is
/// settled with an `"An error occurred: ..."` reply and one last snapshot is yielded.
/// A normal end of stream yields nothing extra; [`Exchange::finish`] returns the
/// settled conversation either way.
pub struct Exchange {
    updates: ReceiverStream<ConversationSnapshot>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<Conversation>,
}

impl Exchange {
    pub fn start(
        client: Arc<dyn ChatClient>,
        mut conversation: Conversation,
        system_prompt: &str,
        message: &str,
        params: GenerationParams
    ) -> Result<Self, ExchangeError> {
        let messages = build_messages(&conversation, system_prompt, message)?;
        conversation.begin_turn(message)?;
        info!(
            "Starting exchange on conversation {} ({} prior turns)",
            conversation.id(),
            conversation.settled_turns().len()
        );

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(run_exchange(client, conversation, messages, params, tx, cancel_rx));

        Ok(Self {
            updates: ReceiverStream::new(rx),
            cancel: Some(cancel_tx),
            task,
        })
    }

    /// Stops waiting on the backend. The pending turn is settled as failed.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Drains any remaining snapshots and returns the settled conversation.
    pub async fn finish(mut self) -> Result<Conversation, ExchangeError> {
        while self.updates.next().await.is_some() {}
        self.task.await.map_err(|e| ExchangeError::Task(e.to_string()))
    }
}

impl Stream for Exchange {
    type Item = ConversationSnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().updates).poll_next(cx)
    }
}

async fn run_exchange(
    client: Arc<dyn ChatClient>,
    mut conversation: Conversation,
    messages: Vec<ChatMessage>,
    params: GenerationParams,
    tx: mpsc::Sender<ConversationSnapshot>,
    mut cancel_rx: oneshot::Receiver<()>
) -> Conversation {
    let opened = tokio::select! {
        biased;
        _ = &mut cancel_rx => {
            return settle_failed(conversation, CANCELLED_CAUSE, &tx).await;
        }
        opened = client.complete_stream(&messages, &params) => opened,
    };
    let mut tokens = match opened {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Failed to open stream for conversation {}: {}", conversation.id(), e);
            return settle_failed(conversation, e, &tx).await;
        }
    };

    let mut fragments = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                info!("Exchange on conversation {} cancelled", conversation.id());
                return settle_failed(conversation, CANCELLED_CAUSE, &tx).await;
            }
            next = tokens.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                if fragment.is_empty() {
                    continue;
                }
                if let Err(e) = conversation.append_fragment(&fragment) {
                    warn!("Dropping fragment for conversation {}: {}", conversation.id(), e);
                    return conversation;
                }
                fragments += 1;
                if tx.send(conversation.snapshot()).await.is_err() {
                    debug!("Snapshot listener for {} went away", conversation.id());
                    return settle_failed(conversation, CANCELLED_CAUSE, &tx).await;
                }
            }
            Some(Err(e)) => {
                warn!(
                    "Stream for conversation {} failed after {} fragments: {}",
                    conversation.id(),
                    fragments,
                    e
                );
                return settle_failed(conversation, e, &tx).await;
            }
            None => {
                if let Err(e) = conversation.resolve() {
                    warn!("Could not resolve conversation {}: {}", conversation.id(), e);
                }
                info!(
                    "Exchange on conversation {} finished with {} fragments",
                    conversation.id(),
                    fragments
                );
                return conversation;
            }
        }
    }
}

async fn settle_failed(
    mut conversation: Conversation,
    cause: impl Display,
    tx: &mpsc::Sender<ConversationSnapshot>
) -> Conversation {
    if let Err(e) = conversation.fail(error_reply(cause)) {
        warn!("Could not fail conversation {}: {}", conversation.id(), e);
        return conversation;
    }
    let _ = tx.send(conversation.snapshot()).await;
    conversation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::{ CompletionResponse, TokenStream };
    use crate::llm::LlmError;
    use crate::models::chat::{ Outcome, TurnState };
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    enum Script {
        Tokens(Vec<&'static str>),
        FailAfter(Vec<&'static str>, &'static str),
        OpenError(&'static str),
        Hang(Vec<&'static str>),
    }

    struct ScriptedClient {
        script: Script,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self { script, seen: Mutex::new(Vec::new()) })
        }
    }

    fn ok_tokens(tokens: &[&'static str]) -> Vec<Result<String, LlmError>> {
        tokens
            .iter()
            .map(|t| Ok(t.to_string()))
            .collect()
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams
        ) -> Result<CompletionResponse, LlmError> {
            unreachable!("chat exchanges always stream")
        }

        async fn complete_stream(
            &self,
            messages: &[ChatMessage],
            params: &GenerationParams
        ) -> Result<TokenStream, LlmError> {
            assert_eq!(*params, GenerationParams::CHAT);
            self.seen.lock().unwrap().push(messages.to_vec());
            match &self.script {
                Script::Tokens(tokens) => Ok(Box::pin(stream::iter(ok_tokens(tokens)))),
                Script::FailAfter(tokens, cause) => {
                    let mut items = ok_tokens(tokens);
                    items.push(Err(LlmError::Provider(cause.to_string())));
                    Ok(Box::pin(stream::iter(items)))
                }
                Script::OpenError(cause) => Err(LlmError::Provider(cause.to_string())),
                Script::Hang(tokens) => {
                    Ok(Box::pin(stream::iter(ok_tokens(tokens)).chain(stream::pending())))
                }
            }
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn start(client: Arc<ScriptedClient>, conversation: Conversation, message: &str) -> Exchange {
        Exchange::start(client, conversation, "sys", message, GenerationParams::CHAT).unwrap()
    }

    fn partial(snapshot: &ConversationSnapshot) -> Option<String> {
        snapshot.turns
            .last()
            .filter(|turn| turn.state == TurnState::Pending)
            .and_then(|turn| turn.assistant.clone())
    }

    fn reply(snapshot: &ConversationSnapshot, index: usize) -> (TurnState, Option<&str>) {
        let turn = &snapshot.turns[index];
        (turn.state, turn.assistant.as_deref())
    }

    #[tokio::test]
    async fn emits_one_snapshot_per_non_empty_fragment() {
        let client = ScriptedClient::new(Script::Tokens(vec!["Hel", "", "lo", " world"]));
        let exchange = start(client, Conversation::with_id("c"), "hi");
        let snapshots: Vec<ConversationSnapshot> = exchange.collect().await;

        let partials: Vec<Option<String>> = snapshots.iter().map(partial).collect();
        assert_eq!(
            partials,
            vec![Some("Hel".into()), Some("Hello".into()), Some("Hello world".into())]
        );
        assert!(snapshots.iter().all(|s| s.id == "c" && s.turns.len() == 1));
    }

    #[tokio::test]
    async fn finish_resolves_the_turn() {
        let client = ScriptedClient::new(Script::Tokens(vec!["a", "b"]));
        let exchange = start(client.clone(), Conversation::with_id("c"), "hi");
        let conversation = exchange.finish().await.unwrap();

        assert!(!conversation.is_pending());
        assert_eq!(conversation.settled_turns()[0].outcome, Outcome::Resolved("ab".into()));

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0], vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn empty_stream_resolves_without_updates() {
        let client = ScriptedClient::new(Script::Tokens(vec!["", ""]));
        let mut exchange = start(client, Conversation::with_id("c"), "");
        assert!(exchange.next().await.is_none());

        let conversation = exchange.finish().await.unwrap();
        assert_eq!(conversation.settled_turns()[0].user, "");
        assert_eq!(conversation.settled_turns()[0].outcome, Outcome::Resolved(String::new()));
    }

    #[tokio::test]
    async fn failure_after_k_fragments_emits_k_plus_one() {
        let client = ScriptedClient::new(Script::FailAfter(vec!["x", "y"], "connection reset"));
        let exchange = start(client, Conversation::with_id("c"), "hi");
        let snapshots: Vec<ConversationSnapshot> = exchange.collect().await;

        assert_eq!(snapshots.len(), 3);
        assert_eq!(partial(&snapshots[0]).as_deref(), Some("x"));
        assert_eq!(partial(&snapshots[1]).as_deref(), Some("xy"));

        assert_eq!(
            reply(&snapshots[2], 0),
            (TurnState::Failed, Some("An error occurred: connection reset"))
        );
    }

    #[tokio::test]
    async fn open_failure_emits_single_error_snapshot() {
        let client = ScriptedClient::new(Script::OpenError("HTTP 503: overloaded"));
        let exchange = start(client, Conversation::with_id("c"), "hi");
        let snapshots: Vec<ConversationSnapshot> = exchange.collect().await;

        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            reply(&snapshots[0], 0),
            (TurnState::Failed, Some("An error occurred: HTTP 503: overloaded"))
        );
    }

    #[tokio::test]
    async fn conversation_stays_usable_after_error() {
        let failing = ScriptedClient::new(Script::OpenError("down"));
        let conversation = start(failing, Conversation::with_id("c"), "q1").finish().await.unwrap();

        let working = ScriptedClient::new(Script::Tokens(vec!["ok"]));
        let conversation = start(working.clone(), conversation, "q2").finish().await.unwrap();

        assert_eq!(conversation.settled_turns().len(), 2);
        assert_eq!(conversation.settled_turns()[1].outcome, Outcome::Resolved("ok".into()));
        assert_eq!(working.seen.lock().unwrap()[0].len(), 4);
    }

    #[tokio::test]
    async fn pending_conversation_cannot_start_another_exchange() {
        let mut conversation = Conversation::with_id("c");
        conversation.begin_turn("still going").unwrap();
        let client = ScriptedClient::new(Script::Tokens(vec!["a"]));

        let result = Exchange::start(client, conversation, "sys", "again", GenerationParams::CHAT);
        assert!(matches!(result, Err(ExchangeError::Conversation(ConversationError::TurnPending))));
    }

    #[tokio::test]
    async fn cancel_settles_hung_stream() {
        let client = ScriptedClient::new(Script::Hang(vec!["partial"]));
        let mut exchange = start(client, Conversation::with_id("c"), "hi");

        let first = exchange.next().await.unwrap();
        assert_eq!(partial(&first).as_deref(), Some("partial"));

        exchange.cancel();
        let last = exchange.next().await.unwrap();
        assert_eq!(reply(&last, 0), (TurnState::Failed, Some("An error occurred: exchange cancelled")));

        let conversation = exchange.finish().await.unwrap();
        assert!(!conversation.is_pending());
    }

    #[tokio::test]
    async fn dropping_the_handle_settles_as_cancelled() {
        let client = ScriptedClient::new(Script::Hang(vec!["half"]));
        let mut exchange = start(client, Conversation::with_id("c"), "hi");
        assert_eq!(partial(&exchange.next().await.unwrap()).as_deref(), Some("half"));

        let Exchange { updates, cancel, task } = exchange;
        drop(updates);
        drop(cancel);

        let conversation = task.await.unwrap();
        assert!(!conversation.is_pending());
        assert_eq!(
            conversation.settled_turns()[0].outcome,
            Outcome::Failed("An error occurred: exchange cancelled".into())
        );
    }

    #[tokio::test]
    async fn snapshots_leave_the_event_log_behind() {
        let mut conversation = Conversation::with_id("c");
        for n in 0..3 {
            conversation.begin_turn(format!("q{}", n)).unwrap();
            conversation.resolve().unwrap();
        }
        conversation.clear().unwrap();

        let client = ScriptedClient::new(Script::Tokens(vec!["fresh"]));
        let mut exchange = start(client, conversation, "next");
        let snapshot = exchange.next().await.unwrap();
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(reply(&snapshot, 0), (TurnState::Pending, Some("fresh")));

        let conversation = exchange.finish().await.unwrap();
        assert_eq!(conversation.events().len(), 9);
    }
}
