//! Upstream battle-log payload
//!
//! Every field is optional at this layer: the feed is loosely shaped and
//! the normalizer decides which absences are fatal for a payload.

use serde::Deserialize;

/// One entry of a player's battle log
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBattle {
    #[serde(rename = "type")]
    pub battle_type: Option<String>,
    /// Compact UTC timestamp, e.g. `20251013T235247.000Z`
    pub battle_time: Option<String>,
    pub game_mode: Option<RawGameMode>,
    pub event_tag: Option<String>,
    #[serde(default)]
    pub team: Vec<RawParticipant>,
    #[serde(default)]
    pub opponent: Vec<RawParticipant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGameMode {
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// One participant of either side
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParticipant {
    pub tag: Option<String>,
    pub name: Option<String>,
    /// Crowns of the participant's side (each participant carries the side total)
    pub crowns: Option<i64>,
    pub elixir_leaked: Option<f64>,
    pub clan: Option<RawClan>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cards: Vec<RawCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClan {
    pub tag: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCard {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl RawBattle {
    /// Decode one payload of a fetched battle log
    pub fn deserialize_payload(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Game mode id, if reported
    pub fn mode_id(&self) -> Option<i64> {
        self.game_mode.as_ref().and_then(|m| m.id)
    }

    /// All participants, `team` first
    pub fn participants(&self) -> impl Iterator<Item = &RawParticipant> {
        self.team.iter().chain(self.opponent.iter())
    }
}

impl RawParticipant {
    pub fn clan_tag(&self) -> Option<&str> {
        self.clan.as_ref().and_then(|c| c.tag.as_deref())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
