use crate::error::{
    Error,
    Result,
};
use ogame_stats_config::HttpConfig;
use reqwest::Client;

/// Shared client for the lobby and the universe APIs. Every request inherits the configured
/// timeout, so a stalled endpoint surfaces as an ordinary request failure.
pub fn http_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .build()
        .map_err(|source| Error::Http {
            url: "<client>".to_string(),
            source,
        })
}

/// GETs `url` and returns the body, mapping transport errors and non-2xx statuses.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.map_err(|source| Error::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| Error::Http {
        url: url.to_string(),
        source,
    })
}
