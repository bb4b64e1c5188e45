use relaybot_ai::{OllamaClient, StableDiffusionClient};
use relaybot_core::{ChatDelivery, ChatDispatcher, RelayConfig};
use std::sync::Arc;
use tracing::info;

/// Wire the HTTP gateways described by `config` into a dispatcher.
pub fn build_dispatcher(config: &RelayConfig, delivery: Arc<dyn ChatDelivery>) -> ChatDispatcher {
    let completion = OllamaClient::new(config.completion.endpoint())
        .with_model(config.completion.model.clone());
    let synthesizer = StableDiffusionClient::new(config.image.endpoint())
        .with_params(config.image.sampling.clone());

    info!(
        completion = completion.endpoint(),
        model = config.completion.model.as_str(),
        image = synthesizer.endpoint(),
        delivery = delivery.name(),
        "Relay configured"
    );

    ChatDispatcher::from_config(
        config,
        Arc::new(completion),
        Arc::new(synthesizer),
        delivery,
    )
}
