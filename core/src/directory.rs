//! # Universe directory
//!
//! Resolves a community tag or a server id (`s256-fr`) to a [`Universe`] through the public
//! lobby listing. Any failure to read the listing is reported as
//! [`Error::DirectoryUnavailable`]; a wrong base URL would poison the `server_id` of every snapshot
//! stored afterwards, so nothing here falls back to a guess.

use crate::{
    error::{
        Error,
        Result,
    },
    http::get_text,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Universe {
    pub server_id: String,
    pub community: String,
    pub name: String,
    pub language: String,
    pub base_url: Url,
}

impl Universe {
    /// Universe described by a configured base URL, bypassing the lobby.
    ///
    /// The server id comes from the host (`s256-fr.ogame.gameforge.com`) or, failing that, from
    /// `server_id`.
    pub fn from_override(base_url: &Url, server_id: &str, community: &str) -> Result<Self> {
        let server_id = server_id_from_base_url(base_url)
            .or_else(|| Some(server_id.trim().to_lowercase()).filter(|s| !s.is_empty()))
            .ok_or_else(|| {
                Error::UniverseNotFound(format!("base_url {base_url} given but no server id could be derived"))
            })?;
        Ok(Self {
            name: server_id.clone(),
            language: community.to_string(),
            community: community.to_string(),
            server_id,
            base_url: base_url.clone(),
        })
    }
}

/// `s<number>-<two letter language>`, case-insensitive.
pub fn is_server_id(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix(['s', 'S']) else {
        return false;
    };
    let Some((number, language)) = rest.split_once('-') else {
        return false;
    };
    !number.is_empty()
        && number.bytes().all(|b| b.is_ascii_digit())
        && language.len() == 2
        && language.bytes().all(|b| b.is_ascii_alphabetic())
}

pub fn server_id_from_base_url(base_url: &Url) -> Option<String> {
    let host = base_url.host_str()?;
    let label = host.strip_suffix(".ogame.gameforge.com")?;
    is_server_id(label).then(|| label.to_lowercase())
}

pub fn default_base_url(server_id: &str) -> Result<Url> {
    Url::parse(&format!("https://{server_id}.ogame.gameforge.com"))
        .map_err(|e| Error::UniverseNotFound(format!("invalid server id {server_id:?}: {e}")))
}

fn text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads one lobby entry. Entries that do not name a valid server are skipped.
fn universe_from_item(item: &Value) -> Option<Universe> {
    if !item.is_object() {
        return None;
    }
    let language = text(item, &["language", "lang"]).unwrap_or_default().to_lowercase();

    let server_id = text(item, &["serverId", "server_id"])
        .or_else(|| {
            let number = text(item, &["number"])?;
            (!language.is_empty()).then(|| format!("s{number}-{language}"))
        })
        .or_else(|| text(item, &["id", "server"]).filter(|s| is_server_id(s)))
        .filter(|s| is_server_id(s))?
        .to_lowercase();

    let community = text(item, &["community", "country", "locale"])
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| language.clone());
    let name = text(item, &["name", "serverName"]).unwrap_or_else(|| server_id.clone());
    let base_url = default_base_url(&server_id).ok()?;

    Some(Universe {
        server_id,
        community,
        name,
        language,
        base_url,
    })
}

pub fn parse_lobby(body: &str, url: &str) -> Result<Vec<Universe>> {
    let unavailable = |reason: String| Error::DirectoryUnavailable {
        url: url.to_string(),
        reason,
    };
    let data: Value = serde_json::from_str(body).map_err(|e| unavailable(e.to_string()))?;
    let items = data
        .as_array()
        .ok_or_else(|| unavailable("expected a JSON array of servers".to_string()))?;

    let mut universes: Vec<Universe> = items.iter().filter_map(universe_from_item).collect();
    if universes.len() < items.len() {
        debug!(skipped = items.len() - universes.len(), "Skipped unreadable lobby entries");
    }
    universes.sort_by(|a, b| a.server_id.cmp(&b.server_id));
    universes.dedup_by(|a, b| a.server_id == b.server_id);
    Ok(universes)
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    lobby_url: Url,
    http: Client,
}

impl DirectoryClient {
    pub fn new(lobby_url: Url, http: Client) -> Self {
        Self { lobby_url, http }
    }

    /// Every universe the lobby knows, sorted by server id.
    pub async fn list(&self) -> Result<Vec<Universe>> {
        let url = self.lobby_url.as_str();
        let body = get_text(&self.http, url).await.map_err(|e| Error::DirectoryUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let universes = parse_lobby(&body, url)?;
        debug!(count = universes.len(), "Lobby listing read");
        Ok(universes)
    }

    /// Universes of one community; an unknown community yields an empty list.
    pub async fn resolve(&self, community: &str) -> Result<Vec<Universe>> {
        let community = community.trim().to_lowercase();
        let suffix = format!("-{community}");
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|u| u.community == community || u.language == community || u.server_id.ends_with(&suffix))
            .collect())
    }

    pub async fn resolve_one(&self, server_id: &str) -> Result<Universe> {
        let wanted = server_id.trim().to_lowercase();
        if !is_server_id(&wanted) {
            return Err(Error::UniverseNotFound(format!("{server_id:?} is not a server id like s256-fr")));
        }
        self.list()
            .await?
            .into_iter()
            .find(|u| u.server_id == wanted)
            .ok_or(Error::UniverseNotFound(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOBBY: &str = r#"[
        {"language": "fr", "number": 256, "name": "Fornax", "accountGroup": "fr_1"},
        {"serverId": "S1-DE", "name": "Andromeda", "community": "de"},
        {"language": "en", "number": 1, "name": "Zagadka"},
        {"name": "no id at all"},
        "junk"
    ]"#;

    fn client(server: &mockito::ServerGuard) -> DirectoryClient {
        DirectoryClient::new(Url::parse(&format!("{}/api/servers", server.url())).unwrap(), Client::new())
    }

    #[test]
    fn recognizes_server_ids() {
        assert!(is_server_id("s256-fr"));
        assert!(is_server_id("S1-DE"));
        assert!(!is_server_id("s-fr"));
        assert!(!is_server_id("s12-fra"));
        assert!(!is_server_id("256-fr"));
    }

    #[test]
    fn derives_server_id_from_host() {
        let url = Url::parse("https://s256-fr.ogame.gameforge.com/").unwrap();
        assert_eq!(server_id_from_base_url(&url).as_deref(), Some("s256-fr"));
        assert_eq!(server_id_from_base_url(&Url::parse("http://127.0.0.1:9000").unwrap()), None);

        let mirror = Url::parse("http://127.0.0.1:9000").unwrap();
        assert_eq!(Universe::from_override(&mirror, "S3-FR", "fr").unwrap().server_id, "s3-fr");
        assert!(Universe::from_override(&mirror, "", "fr").unwrap_err().is_universe_error());
    }

    #[test]
    fn parses_lobby_entries_tolerantly() {
        let universes = parse_lobby(LOBBY, "lobby").unwrap();
        let ids: Vec<&str> = universes.iter().map(|u| u.server_id.as_str()).collect();
        assert_eq!(ids, vec!["s1-de", "s1-en", "s256-fr"]);
        assert_eq!(universes[2].name, "Fornax");
        assert_eq!(universes[2].community, "fr");
        assert_eq!(universes[2].base_url.as_str(), "https://s256-fr.ogame.gameforge.com/");
    }

    #[test]
    fn non_array_listing_is_unavailable() {
        assert!(matches!(
            parse_lobby(r#"{"error": "maintenance"}"#, "lobby"),
            Err(Error::DirectoryUnavailable { .. })
        ));
        assert!(matches!(parse_lobby("<html>", "lobby"), Err(Error::DirectoryUnavailable { .. })));
    }

    #[tokio::test]
    async fn resolves_by_community_and_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/servers")
            .with_header("content-type", "application/json")
            .with_body(LOBBY)
            .expect(3)
            .create_async()
            .await;
        let directory = client(&server);

        let fr = directory.resolve("FR").await.unwrap();
        assert_eq!(fr.len(), 1);
        assert_eq!(fr[0].server_id, "s256-fr");

        assert_eq!(directory.resolve_one("s1-de").await.unwrap().name, "Andromeda");
        assert!(matches!(
            directory.resolve_one("s999-fr").await,
            Err(Error::UniverseNotFound(id)) if id == "s999-fr"
        ));
    }

    #[tokio::test]
    async fn unreachable_lobby_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/api/servers").with_status(500).create_async().await;

        assert!(matches!(client(&server).list().await, Err(Error::DirectoryUnavailable { .. })));
    }
}
