//! Chat Dispatcher - turns one inbound message into a reply.
//!
//! Records the message in participant memory, asks the completion service for
//! a reply under the channel's continuation token, then acts on the reply's
//! directive (stay silent, send text, or run verified image delivery).

use anyhow::Result;
use chrono::{DateTime, Utc};
use relaybot_ai::{CompletionGateway, CompletionRequest, ImageSynthesizer};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{ChatDelivery, InboundMessage, MessageHandle, OutboundMessage};
use crate::config::RelayConfig;
use crate::memory::{ConversationMemory, Summarizer};

use super::attachments::AttachmentFetcher;
use super::delivery::{DeliveryReport, DeliveryRequest, ImageDeliveryMachine};
use super::directive::{Directive, DirectiveParser};

/// Sent when the completion service cannot be reached.
pub const TROUBLE_THINKING_NOTICE: &str = "Sorry, I'm having trouble thinking right now!";

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Authored by a bot; not processed.
    IgnoredBot,
    /// The completion call failed; a notice was sent.
    CompletionFailed,
    /// The model declined to engage.
    Suppressed,
    /// The reply was blank; nothing was sent.
    EmptyReply,
    /// A text reply was sent.
    Replied(MessageHandle),
    /// An image reply was delivered.
    Image(DeliveryReport),
}

/// Handles natural language messages end to end.
pub struct ChatDispatcher {
    memory: Arc<ConversationMemory>,
    completion: Arc<dyn CompletionGateway>,
    delivery: Arc<dyn ChatDelivery>,
    parser: DirectiveParser,
    images: ImageDeliveryMachine,
    fetcher: AttachmentFetcher,
    system_prompt: String,
}

impl ChatDispatcher {
    pub fn new(
        memory: Arc<ConversationMemory>,
        completion: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        delivery: Arc<dyn ChatDelivery>,
    ) -> Self {
        Self {
            memory,
            images: ImageDeliveryMachine::new(completion.clone(), synthesizer),
            completion,
            delivery,
            parser: DirectiveParser::default(),
            fetcher: AttachmentFetcher::new(),
            system_prompt: String::new(),
        }
    }

    /// Build a dispatcher whose memory, directives, prompts and retry budget
    /// all come from `config`.
    pub fn from_config(
        config: &RelayConfig,
        completion: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        delivery: Arc<dyn ChatDelivery>,
    ) -> Self {
        let summarizer = Summarizer::new(
            completion.clone(),
            config.completion.summarizer_model.clone(),
        );
        let memory = ConversationMemory::new(summarizer)
            .with_summary_threshold(config.memory.summary_threshold);

        let images = ImageDeliveryMachine::new(completion.clone(), synthesizer.clone())
            .with_max_attempts(config.delivery.max_attempts)
            .with_verifier_model(config.completion.verifier_model());

        Self::new(Arc::new(memory), completion, synthesizer, delivery)
            .with_parser(DirectiveParser::new(&config.directives))
            .with_system_prompt(config.prompts.system_prompt.clone())
            .with_image_machine(images)
    }

    pub fn with_parser(mut self, parser: DirectiveParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_image_machine(mut self, images: ImageDeliveryMachine) -> Self {
        self.images = images;
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Process one inbound message.
    ///
    /// Errors are returned only when a plain text reply cannot be sent; every
    /// other failure is absorbed and reflected in the outcome.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<DispatchOutcome> {
        if message.sender_is_bot {
            debug!("Ignoring bot message {}", message.id);
            return Ok(DispatchOutcome::IgnoredBot);
        }

        let timestamp =
            DateTime::<Utc>::from_timestamp_millis(message.timestamp).unwrap_or_else(Utc::now);
        self.memory
            .record_participant_message(
                &message.sender_id,
                &message.sender_name,
                &message.content,
                timestamp,
            )
            .await;

        let images = self.fetcher.fetch_images(&message.attachments).await;
        let summary = self.memory.get_participant_summary(&message.sender_id).await;
        let prompt = self.build_prompt(message, &summary);

        let reply = {
            let mut lease = self.memory.lease_channel(&message.conversation_id).await;
            let request = CompletionRequest::new(prompt)
                .with_context(lease.token())
                .with_images(images);

            match self.completion.complete(request).await {
                Ok(response) => {
                    lease.set_token(response.context);
                    response.text
                }
                Err(err) => {
                    warn!(
                        channel_id = %message.conversation_id,
                        "Completion failed: {}", err
                    );
                    drop(lease);
                    let notice = OutboundMessage::text(
                        &message.conversation_id,
                        TROUBLE_THINKING_NOTICE,
                    )
                    .with_reply_to(&message.id);
                    if let Err(err) = self.delivery.send(notice).await {
                        warn!("Failed to send completion failure notice: {}", err);
                    }
                    return Ok(DispatchOutcome::CompletionFailed);
                }
            }
        };

        match self.parser.classify(&reply) {
            Directive::Suppressed => {
                debug!(channel_id = %message.conversation_id, "Reply suppressed");
                Ok(DispatchOutcome::Suppressed)
            }
            Directive::PlainReply(text) => {
                if text.trim().is_empty() {
                    return Ok(DispatchOutcome::EmptyReply);
                }
                let handle = self
                    .delivery
                    .send(OutboundMessage::text(&message.conversation_id, text))
                    .await?;
                info!(channel_id = %message.conversation_id, "Sent reply {}", handle);
                Ok(DispatchOutcome::Replied(handle))
            }
            Directive::ImageReply {
                leading_text,
                image_prompt,
            } => {
                debug!(
                    channel_id = %message.conversation_id,
                    "Reply requests an image: {}", image_prompt
                );
                let request =
                    DeliveryRequest::new(&message.conversation_id, leading_text, image_prompt);
                let report = self.images.run(&request, self.delivery.as_ref()).await;
                Ok(DispatchOutcome::Image(report))
            }
        }
    }

    fn build_prompt(&self, message: &InboundMessage, summary: &str) -> String {
        let turn = format!(
            "{} {} says: {}",
            self.system_prompt, message.sender_name, message.content
        );
        let turn = turn.trim();
        if summary.is_empty() {
            turn.to_string()
        } else {
            format!(
                "What you remember about {}: {}\n\n{}",
                message.sender_name, summary, turn
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InboundAttachment;
    use crate::channel::mock::MockDelivery;
    use crate::runtime::delivery::DeliveryOutcome;
    use relaybot_ai::ContinuationToken;
    use relaybot_ai::image::{MockImageStep, MockImageSynthesizer};
    use relaybot_ai::llm::{MockCompletionClient, MockStep};

    struct Fixture {
        completion: MockCompletionClient,
        summarizer: MockCompletionClient,
        synthesizer: MockImageSynthesizer,
        chat: Arc<MockDelivery>,
        dispatcher: ChatDispatcher,
    }

    fn fixture(steps: Vec<MockStep>) -> Fixture {
        let completion = MockCompletionClient::from_steps("Smooj", steps);
        let summarizer = MockCompletionClient::from_steps(
            "llama3.2",
            vec![MockStep::text("Alice likes foxes.")],
        );
        let synthesizer = MockImageSynthesizer::new();
        let chat = Arc::new(MockDelivery::new());
        let memory = ConversationMemory::new(Summarizer::new(
            Arc::new(summarizer.clone()),
            "llama3.2",
        ))
        .with_summary_threshold(1);
        let dispatcher = ChatDispatcher::new(
            Arc::new(memory),
            Arc::new(completion.clone()),
            Arc::new(synthesizer.clone()),
            chat.clone(),
        );
        Fixture {
            completion,
            summarizer,
            synthesizer,
            chat,
            dispatcher,
        }
    }

    fn message(content: &str) -> InboundMessage {
        InboundMessage::new("m-1", "user-1", "chan-1", content).with_sender_name("Alice")
    }

    #[tokio::test]
    async fn test_bot_messages_are_ignored() {
        let f = fixture(Vec::new());

        let outcome = f.dispatcher.dispatch(&message("hi").from_bot()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::IgnoredBot);
        assert_eq!(f.completion.call_count().await, 0);
        assert!(f.dispatcher.memory().participant_snapshot("user-1").await.is_none());
    }

    #[tokio::test]
    async fn test_plain_reply_is_sent_and_token_stored() {
        let f = fixture(vec![MockStep::text_with_context("Hello Alice!", vec![4, 5])]);

        let outcome = f.dispatcher.dispatch(&message("hi")).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Replied(_)));
        let sent = f.chat.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content.as_deref(), Some("Hello Alice!"));
        assert_eq!(
            f.dispatcher.memory().get_channel_token("chan-1").await.as_slice(),
            &[4, 5]
        );

        let requests = f.completion.requests().await;
        assert_eq!(requests[0].prompt, "Alice says: hi");
        assert_eq!(requests[0].context, ContinuationToken::seed());
        assert!(requests[0].model.is_none());
    }

    #[tokio::test]
    async fn test_memory_entry_keeps_message_timestamp() {
        let f = fixture(vec![MockStep::text("Hi!")]);
        let sent_at = 1_700_000_000_000;

        f.dispatcher
            .dispatch(&message("hi").with_timestamp(sent_at))
            .await
            .unwrap();

        let snapshot = f
            .dispatcher
            .memory()
            .participant_snapshot("user-1")
            .await
            .unwrap();
        assert_eq!(snapshot.entries()[0].timestamp.timestamp_millis(), sent_at);
        assert_eq!(snapshot.entries()[0].speaker, "Alice");
    }

    #[tokio::test]
    async fn test_context_is_threaded_between_turns() {
        let f = fixture(vec![
            MockStep::text_with_context("one", vec![1, 2, 3]),
            MockStep::text_with_context("two", vec![9]),
        ]);

        f.dispatcher.dispatch(&message("first")).await.unwrap();
        f.dispatcher.dispatch(&message("second")).await.unwrap();

        let requests = f.completion.requests().await;
        assert_eq!(requests[1].context.as_slice(), &[1, 2, 3]);
        assert_eq!(
            f.dispatcher.memory().get_channel_token("chan-1").await.as_slice(),
            &[9]
        );
    }

    #[tokio::test]
    async fn test_prompt_includes_system_prompt_and_summary() {
        let mut f = fixture(vec![MockStep::text("ok"), MockStep::text("ok")]);
        f.dispatcher = f.dispatcher.with_system_prompt("You are Smooj.");

        f.dispatcher.dispatch(&message("first")).await.unwrap();
        f.dispatcher.dispatch(&message("second")).await.unwrap();

        assert_eq!(f.summarizer.call_count().await, 1);
        let requests = f.completion.requests().await;
        assert_eq!(requests[0].prompt, "You are Smooj. Alice says: first");
        assert!(requests[1].prompt.starts_with("What you remember about Alice: Alice likes foxes."));
        assert!(requests[1].prompt.ends_with("You are Smooj. Alice says: second"));
    }

    #[tokio::test]
    async fn test_suppressed_reply_sends_nothing_but_keeps_token() {
        let f = fixture(vec![MockStep::text_with_context("PASS", vec![3])]);

        let outcome = f.dispatcher.dispatch(&message("hi")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert!(f.chat.events().await.is_empty());
        assert_eq!(
            f.dispatcher.memory().get_channel_token("chan-1").await.as_slice(),
            &[3]
        );
    }

    #[tokio::test]
    async fn test_blank_reply_sends_nothing() {
        let f = fixture(vec![MockStep::text("   ")]);

        let outcome = f.dispatcher.dispatch(&message("hi")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::EmptyReply);
        assert!(f.chat.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_replies_with_notice() {
        let f = fixture(vec![MockStep::transport_error("connection refused")]);

        let outcome = f.dispatcher.dispatch(&message("hi")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::CompletionFailed);
        let sent = f.chat.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content.as_deref(), Some(TROUBLE_THINKING_NOTICE));
        assert_eq!(sent[0].reply_to.as_deref(), Some("m-1"));
        assert_eq!(
            f.dispatcher.memory().get_channel_token("chan-1").await,
            ContinuationToken::seed()
        );
    }

    #[tokio::test]
    async fn test_image_reply_runs_delivery() {
        let f = fixture(vec![
            MockStep::text("Sure! image attached a red fox"),
            MockStep::text("YES"),
        ]);
        f.synthesizer
            .push_step(MockImageStep::Image(b"fox".to_vec()))
            .await;

        let outcome = f.dispatcher.dispatch(&message("draw a fox")).await.unwrap();

        let report = match outcome {
            DispatchOutcome::Image(report) => report,
            other => panic!("expected image delivery, got {other:?}"),
        };
        assert_eq!(report.outcome, DeliveryOutcome::Verified);
        assert_eq!(f.synthesizer.prompts().await, vec!["a red fox"]);
        let sent = f.chat.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content.as_deref(), Some("Sure!"));
        assert!(sent[0].image.is_some());
    }

    #[tokio::test]
    async fn test_empty_image_prompt_sends_leading_text() {
        let f = fixture(vec![MockStep::text("Sure! image attached   ")]);

        let outcome = f.dispatcher.dispatch(&message("draw")).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Replied(_)));
        assert_eq!(f.synthesizer.call_count().await, 0);
        assert_eq!(f.chat.sent().await[0].content.as_deref(), Some("Sure!"));
    }

    #[tokio::test]
    async fn test_plain_reply_send_failure_is_an_error() {
        let completion = MockCompletionClient::from_steps("Smooj", vec![MockStep::text("hi")]);
        let memory = ConversationMemory::new(Summarizer::new(
            Arc::new(MockCompletionClient::new("llama3.2")),
            "llama3.2",
        ));
        let dispatcher = ChatDispatcher::new(
            Arc::new(memory),
            Arc::new(completion),
            Arc::new(MockImageSynthesizer::new()),
            Arc::new(MockDelivery::new().fail_send_number(1)),
        );

        assert!(dispatcher.dispatch(&message("hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_image_attachments_are_forwarded() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"photo".to_vec()))
            .mount(&server)
            .await;

        let f = fixture(vec![MockStep::text("Nice photo")]);
        let inbound = message("look").with_attachment(InboundAttachment {
            url: format!("{}/photo.png", server.uri()),
            content_type: Some("image/png".to_string()),
            name: "photo.png".to_string(),
        });

        f.dispatcher.dispatch(&inbound).await.unwrap();

        use base64::Engine;
        let requests = f.completion.requests().await;
        assert_eq!(
            requests[0].images,
            vec![base64::engine::general_purpose::STANDARD.encode(b"photo")]
        );
    }

    #[tokio::test]
    async fn test_from_config_applies_settings() {
        let mut config = RelayConfig::default();
        config.prompts.system_prompt = "Be brief.".to_string();
        config.directives.decline_token = "[skip]".to_string();

        let completion = MockCompletionClient::from_steps(
            "Smooj",
            vec![MockStep::text("PASS then"), MockStep::text("[skip]")],
        );
        let chat = Arc::new(MockDelivery::new());
        let dispatcher = ChatDispatcher::from_config(
            &config,
            Arc::new(completion.clone()),
            Arc::new(MockImageSynthesizer::new()),
            chat.clone(),
        );

        let first = dispatcher.dispatch(&message("hi")).await.unwrap();
        let second = dispatcher.dispatch(&message("again")).await.unwrap();

        assert!(matches!(first, DispatchOutcome::Replied(_)));
        assert_eq!(second, DispatchOutcome::Suppressed);
        assert_eq!(
            completion.requests().await[0].prompt,
            "Be brief. Alice says: hi"
        );
        assert_eq!(dispatcher.memory().summary_threshold(), 20);
    }

    #[tokio::test]
    async fn test_from_config_applies_image_delivery_settings() {
        let mut config = RelayConfig::default();
        config.completion.verifier_model = Some("llava".to_string());
        config.delivery.max_attempts = 1;

        let completion = MockCompletionClient::from_steps(
            "Smooj",
            vec![
                MockStep::text("Sure! image attached a red fox"),
                MockStep::text("NO"),
            ],
        );
        let synthesizer = MockImageSynthesizer::new();
        let dispatcher = ChatDispatcher::from_config(
            &config,
            Arc::new(completion.clone()),
            Arc::new(synthesizer.clone()),
            Arc::new(MockDelivery::new()),
        );

        let outcome = dispatcher.dispatch(&message("draw a fox")).await.unwrap();

        let report = match outcome {
            DispatchOutcome::Image(report) => report,
            other => panic!("expected image delivery, got {other:?}"),
        };
        assert_eq!(report.outcome, DeliveryOutcome::BestEffort);
        assert_eq!(report.attempts, 1);
        assert_eq!(synthesizer.call_count().await, 1);
        assert_eq!(
            completion.requests().await[1].model.as_deref(),
            Some("llava")
        );
    }
}
