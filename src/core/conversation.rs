//! Conversation state and the submission/settlement cycle.
//!
//! The conversation is a two-state machine: idle, or awaiting exactly one
//! in-flight call. A submission appends the user message immediately and
//! marks the conversation busy; the matching settlement appends the reply
//! (or an inline error line) and clears the flag. The busy flag is the
//! only guard serializing submissions, and settlement is keyed by request
//! id so a stale outcome can never touch the transcript.

use std::collections::VecDeque;

use crate::core::chat_call::CallResult;
use crate::core::message::{Message, MessageId, Role};

pub struct ConversationState {
    /// Append-only transcript; insertion order is display order.
    pub messages: VecDeque<Message>,
    pub pending_input: String,
    pub busy: bool,
}

impl ConversationState {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            pending_input: String::new(),
            busy: false,
        }
    }
}

/// Receives a notification after every conversation mutation. The
/// presentation layer registers one of these instead of reaching into the
/// controller.
pub trait ConversationObserver {
    fn conversation_changed(&mut self, state: &ConversationState);
}

/// An accepted submission, ready to be dispatched as a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub request_id: u64,
    pub prompt: String,
}

pub struct ConversationController {
    state: ConversationState,
    next_message_id: u64,
    next_request_id: u64,
    in_flight: Option<u64>,
    observers: Vec<Box<dyn ConversationObserver>>,
}

impl ConversationController {
    pub fn new() -> Self {
        Self {
            state: ConversationState::new(),
            next_message_id: 0,
            next_request_id: 0,
            in_flight: None,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn messages(&self) -> &VecDeque<Message> {
        &self.state.messages
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    pub fn pending_input(&self) -> &str {
        &self.state.pending_input
    }

    pub fn add_observer(&mut self, observer: Box<dyn ConversationObserver>) {
        self.observers.push(observer);
    }

    pub fn push_input_char(&mut self, c: char) {
        self.state.pending_input.push(c);
        self.notify();
    }

    pub fn backspace_input(&mut self) {
        self.state.pending_input.pop();
        self.notify();
    }

    /// Accept the pending input as a submission.
    ///
    /// Whitespace-only input and submissions while a call is in flight are
    /// no-ops. On acceptance the trimmed text is appended as a user
    /// message, the input is cleared, and the conversation goes busy until
    /// the returned submission settles.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.state.busy {
            return None;
        }
        let trimmed = self.state.pending_input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let prompt = trimmed.to_string();

        self.state.pending_input.clear();
        self.push_message(Role::User, prompt.clone());
        self.state.busy = true;

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some(request_id);

        self.notify();
        Some(Submission { request_id, prompt })
    }

    /// Record the outcome of an in-flight call.
    ///
    /// Exactly one assistant message is appended per accepted submission:
    /// the reply text on success, an inline `Error:` line on failure. An
    /// outcome whose request id is not the in-flight one is dropped.
    pub fn settle(&mut self, request_id: u64, outcome: CallResult) {
        if self.in_flight != Some(request_id) {
            return;
        }
        self.in_flight = None;

        let content = match outcome {
            Ok(reply) => reply,
            Err(err) => format!("Error: {err}"),
        };
        self.push_message(Role::Assistant, content);
        self.state.busy = false;

        self.notify();
    }

    fn push_message(&mut self, role: Role, content: String) {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;
        self.state.messages.push_back(Message::new(id, role, content));
    }

    fn notify(&mut self) {
        let Self {
            state, observers, ..
        } = self;
        for observer in observers.iter_mut() {
            observer.conversation_changed(state);
        }
    }
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_call::{CallError, ChatCallService, RetryPolicy};
    use crate::utils::test_utils::{reply_body, ScriptedTransport};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn controller_with_input(input: &str) -> ConversationController {
        let mut controller = ConversationController::new();
        for c in input.chars() {
            controller.push_input_char(c);
        }
        controller
    }

    struct CountingObserver {
        hits: Rc<Cell<usize>>,
    }

    impl ConversationObserver for CountingObserver {
        fn conversation_changed(&mut self, _state: &ConversationState) {
            self.hits.set(self.hits.get() + 1);
        }
    }

    #[test]
    fn accepted_submission_appends_exactly_one_pair() {
        let mut controller = controller_with_input("  hello there  ");

        let submission = controller.submit().expect("input should be accepted");
        assert_eq!(submission.prompt, "hello there");
        assert!(controller.is_busy());
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.pending_input(), "");
        let user = controller.messages().front().unwrap();
        assert!(user.is_user());
        assert_eq!(user.content, "hello there");

        controller.settle(submission.request_id, Ok("hi!".to_string()));
        assert!(!controller.is_busy());
        assert_eq!(controller.messages().len(), 2);
        let reply = controller.messages().back().unwrap();
        assert!(reply.is_assistant());
        assert_eq!(reply.content, "hi!");
    }

    #[test]
    fn whitespace_only_input_is_a_noop() {
        let mut controller = controller_with_input("   \t ");

        assert!(controller.submit().is_none());
        assert!(!controller.is_busy());
        assert!(controller.messages().is_empty());
        // The untouched input is preserved, not cleared
        assert_eq!(controller.pending_input(), "   \t ");
    }

    #[test]
    fn empty_input_is_a_noop() {
        let mut controller = ConversationController::new();

        assert!(controller.submit().is_none());
        assert!(controller.messages().is_empty());
    }

    #[test]
    fn submission_while_busy_is_a_noop() {
        let mut controller = controller_with_input("first");
        let submission = controller.submit().unwrap();

        for c in "second".chars() {
            controller.push_input_char(c);
        }
        assert!(controller.submit().is_none());
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.is_busy());
        // The rejected input stays in the buffer for after settlement
        assert_eq!(controller.pending_input(), "second");

        controller.settle(submission.request_id, Ok("done".to_string()));
        let second = controller.submit().expect("idle again after settlement");
        assert_eq!(second.prompt, "second");
    }

    #[test]
    fn failed_call_settles_as_inline_error_message() {
        let mut controller = controller_with_input("hello");
        let submission = controller.submit().unwrap();

        controller.settle(
            submission.request_id,
            Err(CallError::Http {
                status: 401,
                body: "API key not valid".to_string(),
            }),
        );

        assert!(!controller.is_busy());
        let reply = controller.messages().back().unwrap();
        assert!(reply.is_assistant());
        assert!(reply.content.starts_with("Error: "));
        assert!(reply.content.contains("401"));
    }

    #[test]
    fn stale_settlement_is_dropped() {
        let mut controller = controller_with_input("hello");
        let submission = controller.submit().unwrap();

        controller.settle(submission.request_id + 1, Ok("stale".to_string()));

        assert!(controller.is_busy());
        assert_eq!(controller.messages().len(), 1);

        // Settling twice with the right id only lands once
        controller.settle(submission.request_id, Ok("real".to_string()));
        controller.settle(submission.request_id, Ok("echo".to_string()));
        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.messages().back().unwrap().content, "real");
    }

    #[test]
    fn message_ids_are_unique_and_increasing() {
        let mut controller = ConversationController::new();
        for turn in 0..3 {
            for c in format!("turn {turn}").chars() {
                controller.push_input_char(c);
            }
            let submission = controller.submit().unwrap();
            controller.settle(submission.request_id, Ok("ok".to_string()));
        }

        let ids: Vec<_> = controller.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 6);
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn observers_hear_submission_and_settlement() {
        let hits = Rc::new(Cell::new(0));
        let mut controller = ConversationController::new();
        controller.add_observer(Box::new(CountingObserver { hits: hits.clone() }));

        for c in "hi".chars() {
            controller.push_input_char(c);
        }
        let after_input = hits.get();
        assert_eq!(after_input, 2);

        let submission = controller.submit().unwrap();
        assert_eq!(hits.get(), after_input + 1);

        controller.settle(submission.request_id, Ok("hello".to_string()));
        assert_eq!(hits.get(), after_input + 2);

        // Rejected submissions notify nobody
        controller.submit();
        assert_eq!(hits.get(), after_input + 2);
    }

    #[tokio::test]
    async fn full_round_trip_through_scripted_transport() {
        let transport = ScriptedTransport::with_statuses(&[
            (503, "overloaded".to_string()),
            (200, reply_body("Bonjour!")),
        ]);
        let service = ChatCallService::new(
            transport,
            RetryPolicy {
                attempts: 3,
                delay: Duration::ZERO,
            },
        );

        let mut controller = controller_with_input("salut");
        let submission = controller.submit().unwrap();
        let outcome = service.execute(&submission.prompt).await;
        controller.settle(submission.request_id, outcome);

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.messages().back().unwrap().content, "Bonjour!");
        assert!(!controller.is_busy());
    }
}
