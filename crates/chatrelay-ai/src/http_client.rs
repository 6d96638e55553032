use std::time::Duration;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "CHATRELAY_DISABLE_SYSTEM_PROXY";

/// Build the HTTP client used for completion and Bot API calls.
///
/// `request_timeout` bounds a whole request including the response body.
/// A per-request `RequestBuilder::timeout` overrides it.
pub fn build_http_client(request_timeout: Duration) -> Client {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(request_timeout);

    if should_disable_system_proxy() {
        builder = builder.no_proxy();
    }

    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default HTTP client");
        Client::new()
    })
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
