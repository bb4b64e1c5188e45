use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use relaybot_ai::image::MockImageSynthesizer;
use relaybot_ai::llm::MockCompletionClient;
use relaybot_ai::{
    CompletionGateway, CompletionRequest, CompletionResponse, ContinuationToken, OllamaClient,
    RetryConfig, StableDiffusionClient,
};
use relaybot_core::channel::mock::MockDelivery;
use relaybot_core::memory::Summarizer;
use relaybot_core::runtime::{DeliveryOutcome, run_message_loop};
use relaybot_core::{ChatDispatcher, ConversationMemory, DispatchOutcome, InboundMessage};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_reply(text: &str, context: &[i64]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "Smooj",
        "response": text,
        "done": true,
        "context": context,
    }))
}

#[tokio::test]
async fn image_reply_is_regenerated_until_verified() {
    let ollama = MockServer::start().await;
    let sd = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("says:"))
        .respond_with(ollama_reply(
            "Here you go! image attached a lighthouse at night",
            &[42, 43],
        ))
        .expect(1)
        .mount(&ollama)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("YES or NO"))
        .respond_with(ollama_reply("NO", &[]))
        .up_to_n_times(1)
        .mount(&ollama)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("YES or NO"))
        .respond_with(ollama_reply("yes", &[]))
        .mount(&ollama)
        .await;

    let png = base64::engine::general_purpose::STANDARD.encode(b"lighthouse.png");
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .and(body_string_contains("a lighthouse at night"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": [png] })))
        .expect(2)
        .mount(&sd)
        .await;

    let completion: Arc<dyn CompletionGateway> = Arc::new(
        OllamaClient::new(format!("{}/api/generate", ollama.uri()))
            .with_model("Smooj")
            .with_retry_config(RetryConfig::none()),
    );
    let synthesizer = Arc::new(
        StableDiffusionClient::new(format!("{}/sdapi/v1/txt2img", sd.uri()))
            .with_retry_config(RetryConfig::none()),
    );
    let chat = Arc::new(MockDelivery::new());
    let memory = ConversationMemory::new(Summarizer::new(completion.clone(), "llama3.2"));
    let dispatcher = ChatDispatcher::new(Arc::new(memory), completion, synthesizer, chat.clone());

    let message = InboundMessage::new("m-1", "user-1", "chan-1", "draw me a lighthouse")
        .with_sender_name("Alice");
    let outcome = dispatcher.dispatch(&message).await.unwrap();

    let report = match outcome {
        DispatchOutcome::Image(report) => report,
        other => panic!("expected image delivery, got {other:?}"),
    };
    assert_eq!(report.outcome, DeliveryOutcome::Verified);
    assert_eq!(report.attempts, 2);
    assert_eq!(chat.image_posts().await, 2);
    assert_eq!(chat.deleted().await.len(), 1);
    assert_eq!(chat.edits().await, vec!["Here you go!"]);

    let sent = chat.sent().await;
    assert_eq!(
        sent[1].image.as_ref().map(|image| image.bytes.as_slice()),
        Some(b"lighthouse.png".as_slice())
    );
    assert_eq!(
        dispatcher.memory().get_channel_token("chan-1").await.as_slice(),
        &[42, 43]
    );
}

#[tokio::test]
async fn unreachable_completion_service_sends_notice() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .mount(&ollama)
        .await;

    let completion: Arc<dyn CompletionGateway> = Arc::new(
        OllamaClient::new(format!("{}/api/generate", ollama.uri()))
            .with_retry_config(RetryConfig::none()),
    );
    let chat = Arc::new(MockDelivery::new());
    let memory = ConversationMemory::new(Summarizer::new(completion.clone(), "llama3.2"));
    let dispatcher = ChatDispatcher::new(
        Arc::new(memory),
        completion,
        Arc::new(MockImageSynthesizer::new()),
        chat.clone(),
    );

    let outcome = dispatcher
        .dispatch(&InboundMessage::new("m-1", "user-1", "chan-1", "hello"))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::CompletionFailed);
    let sent = chat.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].content.as_deref(),
        Some("Sorry, I'm having trouble thinking right now!")
    );
}

/// Appends one value to the incoming token after a short pause, so any lost
/// update between concurrent turns shows up as a short token.
struct CountingGateway;

#[async_trait]
impl CompletionGateway for CountingGateway {
    fn provider(&self) -> &str {
        "counting"
    }

    fn model(&self) -> &str {
        "counting"
    }

    async fn complete(&self, request: CompletionRequest) -> relaybot_ai::Result<CompletionResponse> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let mut values = request.context.as_slice().to_vec();
        values.push(1);
        Ok(CompletionResponse {
            text: "PASS".to_string(),
            context: ContinuationToken::from_values(values),
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_channels_keep_every_turn() {
    let channel_count = 6;
    let turns_per_channel = 8;

    let summarizer = MockCompletionClient::new("llama3.2");
    let memory = ConversationMemory::new(Summarizer::new(Arc::new(summarizer), "llama3.2"))
        .with_summary_threshold(1000);
    let dispatcher = Arc::new(ChatDispatcher::new(
        Arc::new(memory),
        Arc::new(CountingGateway),
        Arc::new(MockImageSynthesizer::new()),
        Arc::new(MockDelivery::new()),
    ));

    let mut messages = Vec::new();
    for turn in 0..turns_per_channel {
        for channel in 0..channel_count {
            messages.push(InboundMessage::new(
                format!("m-{channel}-{turn}"),
                format!("user-{channel}"),
                format!("chan-{channel}"),
                format!("turn {turn}"),
            ));
        }
    }

    run_message_loop(tokio_stream::iter(messages), dispatcher.clone()).await;

    for channel in 0..channel_count {
        let token = dispatcher
            .memory()
            .get_channel_token(&format!("chan-{channel}"))
            .await;
        assert_eq!(token.len(), 1 + turns_per_channel);
        let participant = dispatcher
            .memory()
            .participant_snapshot(&format!("user-{channel}"))
            .await
            .unwrap();
        assert_eq!(participant.len(), turns_per_channel);
    }
}
