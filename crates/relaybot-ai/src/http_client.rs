//! Shared reqwest client construction for the service gateways.

use std::time::Duration;

use reqwest::Client;

/// Set to talk to the services directly even when a system proxy is configured.
const NO_PROXY_ENV: &str = "RELAYBOT_DISABLE_SYSTEM_PROXY";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client with a short connect timeout and a per-service request timeout.
pub(crate) fn build_http_client(request_timeout: Duration) -> Client {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .user_agent(concat!("relaybot/", env!("CARGO_PKG_VERSION")));
    if bypass_proxy() {
        builder = builder.no_proxy();
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("HTTP client setup failed, falling back to defaults: {}", err);
        Client::new()
    })
}

fn bypass_proxy() -> bool {
    cfg!(test) || std::env::var_os(NO_PROXY_ENV).is_some()
}
