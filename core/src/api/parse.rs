//! Response parsers for `highscore.xml` and `players.xml`.
//!
//! Rows that cannot be read are dropped one by one; only a document that cannot be read at all
//! is an error.

use super::types::{
    HighscoreEntry,
    HighscoreSnapshot,
    PlayerEntry,
    PlayersSnapshot,
};
use crate::{
    error::{
        Error,
        Result,
    },
    metrics::SourceTimestamp,
};
use quick_xml::{
    events::Event,
    Reader,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct HighscoreXml {
    #[serde(rename = "@timestamp")]
    timestamp: Option<String>,
    #[serde(rename = "@total")]
    total: Option<String>,
    #[serde(rename = "player", default)]
    players: Vec<HighscorePlayerXml>,
}

#[derive(Debug, Deserialize)]
struct HighscorePlayerXml {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@position")]
    position: Option<String>,
    #[serde(rename = "@score")]
    score: Option<String>,
    #[serde(rename = "@ships")]
    ships: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayersXml {
    #[serde(rename = "@timestamp")]
    timestamp: Option<String>,
    #[serde(rename = "player", default)]
    players: Vec<PlayerXml>,
}

#[derive(Debug, Deserialize)]
struct PlayerXml {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@status")]
    status: Option<String>,
    #[serde(rename = "@alliance")]
    alliance: Option<String>,
}

/// Name of the first element, skipping the declaration, comments and doctype.
fn root_name(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn expect_root(body: &str, what: &'static str) -> Result<()> {
    match root_name(body) {
        Some(name) if name == what => Ok(()),
        other => Err(Error::Payload {
            what,
            reason: format!("expected <{what}> document, found {:?}", other.as_deref().unwrap_or("no element")),
        }),
    }
}

fn number<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim).filter(|s| !s.is_empty())?.parse().ok()
}

/// A row without a positive id or rank cannot be attributed and is dropped.
fn highscore_entry(id: Option<i64>, rank: Option<u32>, points: Option<i64>, ships: Option<u64>) -> Option<HighscoreEntry> {
    let player_id = id.filter(|id| *id > 0)?;
    let rank = rank.filter(|rank| *rank > 0)?;
    Some(HighscoreEntry {
        player_id,
        rank,
        points: points.unwrap_or(0),
        ships,
    })
}

/// Parses a highscore response, XML or the JSON rendering some mirrors serve.
pub fn parse_highscore(body: &str) -> Result<HighscoreSnapshot> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        parse_highscore_json(trimmed)
    } else {
        parse_highscore_xml(trimmed)
    }
}

pub fn parse_highscore_xml(body: &str) -> Result<HighscoreSnapshot> {
    expect_root(body, "highscore")?;
    let doc: HighscoreXml = quick_xml::de::from_str(body).map_err(|e| Error::Payload {
        what: "highscore",
        reason: e.to_string(),
    })?;

    let entries = doc
        .players
        .iter()
        .filter_map(|p| {
            highscore_entry(
                number(p.id.as_deref()),
                number(p.position.as_deref()),
                number(p.score.as_deref()),
                number(p.ships.as_deref()),
            )
        })
        .collect::<Vec<_>>();
    let skipped = doc.players.len() - entries.len();
    if skipped > 0 {
        debug!(skipped, "Dropped unreadable highscore rows");
    }

    Ok(HighscoreSnapshot {
        timestamp: SourceTimestamp::from_attribute(doc.timestamp.as_deref()),
        total: number(doc.total.as_deref()),
        entries,
    })
}

fn json_field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let attrs = obj.get("@attributes");
    keys.iter()
        .find_map(|k| obj.get(*k).or_else(|| attrs.and_then(|a| a.get(*k))))
        .filter(|v| !v.is_null())
}

fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_number<T: std::str::FromStr>(value: Option<&Value>) -> Option<T> {
    number(json_string(value).as_deref())
}

pub fn parse_highscore_json(body: &str) -> Result<HighscoreSnapshot> {
    let root: Value = serde_json::from_str(body).map_err(|e| Error::Payload {
        what: "highscore",
        reason: e.to_string(),
    })?;
    let obj = root.get("highscore").filter(|v| v.is_object()).unwrap_or(&root);

    let rows = ["players", "player", "data", "entries"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Payload {
            what: "highscore",
            reason: "no player list in JSON document".to_string(),
        })?;

    let entries = rows
        .iter()
        .filter(|row| row.is_object())
        .filter_map(|row| {
            highscore_entry(
                json_number(json_field(row, &["id", "playerId"])),
                json_number(json_field(row, &["position", "rank"])),
                json_number(json_field(row, &["score", "points"])),
                json_number(json_field(row, &["ships"])),
            )
        })
        .collect();

    Ok(HighscoreSnapshot {
        timestamp: SourceTimestamp::from_attribute(json_string(json_field(obj, &["timestamp", "apiTimestamp"])).as_deref()),
        total: json_number(json_field(obj, &["total"])),
        entries,
    })
}

pub fn parse_players_xml(body: &str) -> Result<PlayersSnapshot> {
    let body = body.trim_start();
    expect_root(body, "players")?;
    let doc: PlayersXml = quick_xml::de::from_str(body).map_err(|e| Error::Payload {
        what: "players",
        reason: e.to_string(),
    })?;

    let players = doc
        .players
        .into_iter()
        .filter_map(|p| {
            let player_id = number::<i64>(p.id.as_deref()).filter(|id| *id > 0)?;
            let name = p.name.filter(|n| !n.trim().is_empty())?;
            Some(PlayerEntry {
                player_id,
                name,
                status: p.status.filter(|s| !s.is_empty()),
                alliance_id: number(p.alliance.as_deref()),
            })
        })
        .collect();

    Ok(PlayersSnapshot {
        timestamp: SourceTimestamp::from_attribute(doc.timestamp.as_deref()),
        players,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HIGHSCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<highscore timestamp="1700000000" category="1" type="3" total="3" serverId="s256-fr">
  <player id="1" position="1" score="100" ships="40"/>
  <player id="2" position="2" score="90"/>
  <player id="" position="3" score="80"/>
</highscore>"#;

    #[test]
    fn parses_highscore_xml() {
        let snap = parse_highscore(HIGHSCORE).unwrap();
        assert_eq!(snap.timestamp, SourceTimestamp::Epoch(1_700_000_000));
        assert_eq!(snap.total, Some(3));
        assert_eq!(
            snap.entries,
            vec![
                HighscoreEntry {
                    player_id: 1,
                    rank: 1,
                    points: 100,
                    ships: Some(40),
                },
                HighscoreEntry {
                    player_id: 2,
                    rank: 2,
                    points: 90,
                    ships: None,
                },
            ]
        );
        assert_eq!(snap.find(2).map(|e| e.points), Some(90));
        assert!(snap.find(3).is_none());
    }

    #[test]
    fn missing_root_timestamp_is_kept_as_missing() {
        let snap = parse_highscore(r#"<highscore total="0"></highscore>"#).unwrap();
        assert_eq!(snap.timestamp, SourceTimestamp::Missing);
        assert!(snap.entries.is_empty());
    }

    #[test]
    fn parses_highscore_json() {
        let body = r#"{"highscore": {"@attributes": {"timestamp": 1700000100, "total": "2"},
            "player": [{"@attributes": {"id": "5", "position": "1", "score": "77"}}, {"playerId": 6, "rank": 2, "points": 12}]}}"#;
        let snap = parse_highscore(body).unwrap();
        assert_eq!(snap.timestamp, SourceTimestamp::Epoch(1_700_000_100));
        assert_eq!(snap.total, Some(2));
        assert_eq!(snap.entries.len(), 2);
        assert_eq!(snap.entries[1].player_id, 6);
        assert_eq!(snap.entries[1].points, 12);
    }

    #[test]
    fn root_element_skips_prolog_and_comments() {
        let body = "<?xml version=\"1.0\"?>\n<!-- mirror <beta> -->\n<highscore timestamp=\"1700000000\"></highscore>";
        assert_eq!(root_name(body).as_deref(), Some("highscore"));
        assert_eq!(parse_highscore(body).unwrap().timestamp, SourceTimestamp::Epoch(1_700_000_000));
        assert_eq!(root_name("<!DOCTYPE players>\n<players/>").as_deref(), Some("players"));
        assert_eq!(root_name("   ").as_deref(), None);
    }

    #[test]
    fn garbage_is_a_payload_error() {
        assert!(matches!(parse_highscore("<html><body>maintenance"), Err(Error::Payload { .. })));
        assert!(matches!(parse_highscore("{\"status\": \"down\"}"), Err(Error::Payload { .. })));
    }

    #[test]
    fn parses_players_xml() {
        let body = r#"<players timestamp="1700000000" serverId="s256-fr">
  <player id="100" name="Galoup" status="" alliance="12"/>
  <player id="101" name="Vador" status="vI"/>
  <player id="0" name="Ghost"/>
</players>"#;
        let snap = parse_players_xml(body).unwrap();
        assert_eq!(snap.timestamp, SourceTimestamp::Epoch(1_700_000_000));
        assert_eq!(
            snap.players,
            vec![
                PlayerEntry {
                    player_id: 100,
                    name: "Galoup".to_string(),
                    status: None,
                    alliance_id: Some(12),
                },
                PlayerEntry {
                    player_id: 101,
                    name: "Vador".to_string(),
                    status: Some("vI".to_string()),
                    alliance_id: None,
                },
            ]
        );
    }
}
