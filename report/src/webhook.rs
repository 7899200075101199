//! # Discord webhook
//!
//! Posts JSON payloads to a Discord webhook, as multipart with the report attached when there is
//! one. Without a webhook URL, or in dry-run mode, payloads are only logged.

use crate::error::{
    Error,
    Result,
};
use ogame_stats_config::DiscordConfig;
use reqwest::{
    multipart::{
        Form,
        Part,
    },
    Client,
};
use serde_json::Value;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    DryRun,
}

#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: Option<Url>,
    username: String,
    avatar_url: Option<Url>,
    dry_run: bool,
    http: Client,
}

impl DiscordWebhook {
    pub fn new(url: Option<Url>, username: impl Into<String>, avatar_url: Option<Url>, dry_run: bool, http: Client) -> Self {
        Self {
            url,
            username: username.into(),
            avatar_url,
            dry_run,
            http,
        }
    }

    pub fn from_config(config: &DiscordConfig, http: Client) -> Self {
        Self::new(
            config.webhook_url.clone(),
            config.username.clone(),
            config.avatar_url.clone(),
            config.dry_run,
            http,
        )
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run || self.url.is_none()
    }

    /// Fills `username` and `avatar_url` unless the payload already sets them.
    fn with_identity(&self, mut payload: Value) -> Value {
        if let Some(object) = payload.as_object_mut() {
            object
                .entry("username")
                .or_insert_with(|| Value::String(self.username.clone()));
            if let Some(avatar) = &self.avatar_url {
                object
                    .entry("avatar_url")
                    .or_insert_with(|| Value::String(avatar.to_string()));
            }
        }
        payload
    }

    pub async fn send(&self, payload: Value, attachment: Option<&Path>) -> Result<Delivery> {
        let payload = self.with_identity(payload);
        let url = match (&self.url, self.dry_run) {
            (Some(url), false) => url,
            _ => {
                info!(payload = %payload, attachment = ?attachment, "Dry run, webhook not called");
                return Ok(Delivery::DryRun);
            }
        };

        let request = match attachment {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(Error::io("Reading", path))?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("report.html")
                    .to_string();
                let form = Form::new()
                    .part(
                        "payload_json",
                        Part::text(payload.to_string())
                            .mime_str("application/json")
                            .map_err(Error::Webhook)?,
                    )
                    .part(
                        "files[0]",
                        Part::bytes(bytes)
                            .file_name(file_name)
                            .mime_str("text/html")
                            .map_err(Error::Webhook)?,
                    );
                self.http.post(url.clone()).multipart(form)
            }
            None => self.http.post(url.clone()).json(&payload),
        };

        let response = request.send().await.map_err(Error::Webhook)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Webhook rejected the message");
            return Err(Error::WebhookStatus {
                status: status.as_u16(),
                body,
            });
        }
        info!(attachment = attachment.is_some(), "Webhook message sent");
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use temp_dir::TempDir;

    fn webhook(url: Option<Url>, dry_run: bool) -> DiscordWebhook {
        DiscordWebhook::new(url, "OGame Stats", None, dry_run, Client::new())
    }

    #[tokio::test]
    async fn posts_json_with_default_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({"content": "hi", "username": "OGame Stats"})))
            .with_status(204)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/hook", server.url())).unwrap();
        let delivery = webhook(Some(url), false).send(json!({"content": "hi"}), None).await.unwrap();

        assert_eq!(delivery, Delivery::Sent);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn attaches_the_report_as_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="payload_json""#.to_string()),
                Matcher::Regex(r#"name="files(\[|%5B)0(\]|%5D)""#.to_string()),
                Matcher::Regex(r#"filename="report.html""#.to_string()),
                Matcher::Regex("<html>ok</html>".to_string()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let report = dir.path().join("report.html");
        std::fs::write(&report, "<html>ok</html>").unwrap();

        let url = Url::parse(&format!("{}/hook", server.url())).unwrap();
        webhook(Some(url), false)
            .send(json!({"embeds": []}), Some(&report))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn dry_run_and_missing_url_make_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;
        let url = Url::parse(&server.url()).unwrap();

        assert_eq!(webhook(Some(url), true).send(json!({}), None).await.unwrap(), Delivery::DryRun);
        assert_eq!(webhook(None, false).send(json!({}), None).await.unwrap(), Delivery::DryRun);
        assert!(webhook(None, false).is_dry_run());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_messages_are_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(400)
            .with_body("bad embed")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/hook", server.url())).unwrap();
        match webhook(Some(url), false).send(json!({}), None).await {
            Err(Error::WebhookStatus { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad embed");
            }
            other => panic!("expected WebhookStatus, got {other:?}"),
        }
    }

    #[test]
    fn payload_identity_is_not_overridden() {
        let hook = DiscordWebhook::new(
            None,
            "Bot",
            Some(Url::parse("https://cdn.example.org/a.png").unwrap()),
            true,
            Client::new(),
        );
        let payload = hook.with_identity(json!({"username": "Custom"}));
        assert_eq!(payload, json!({"username": "Custom", "avatar_url": "https://cdn.example.org/a.png"}));
    }
}
