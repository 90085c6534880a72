use std::time::Duration;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "AURORAMIND_DISABLE_SYSTEM_PROXY";

/// Shared client for the AI service. `timeout` bounds connecting and each
/// read, not the whole response, so long token streams are not cut off.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    let builder = Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout);

    if should_disable_system_proxy() {
        builder.no_proxy().build()
    } else {
        builder.build()
    }
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
