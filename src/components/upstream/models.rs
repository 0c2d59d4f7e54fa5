use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

/// Deserialize a string field that upstream may send as `null`
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an optional string, treating blank values as absent
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

/// One event as returned by the event detail service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawEventPayload {
    #[serde(rename = "title_de")]
    pub title: String,
    #[serde(rename = "subtitle_de", default, deserialize_with = "null_as_empty")]
    pub subtitle: String,
    #[serde(rename = "description_long_de", default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "room_dispname", default, deserialize_with = "null_as_empty")]
    pub room: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub website_url: String,
    pub date_start: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_end: Option<String>,
}

/// Event identifiers, either as the keys of an object or as a plain list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FavoriteIds {
    Map(serde_json::Map<String, Value>),
    List(Vec<Value>),
}

impl Default for FavoriteIds {
    fn default() -> Self {
        FavoriteIds::List(Vec::new())
    }
}

/// Body of the favorites service response
#[derive(Debug, Default, Deserialize)]
pub struct FavoritesPayload {
    #[serde(default)]
    events: Option<FavoriteIds>,
}

/// The event identifiers a user has saved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesList {
    ids: Vec<String>,
}

impl FavoritesList {
    /// Build a list, dropping blank and repeated identifiers
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<FavoritesPayload> for FavoritesList {
    fn from(payload: FavoritesPayload) -> Self {
        match payload.events.unwrap_or_default() {
            FavoriteIds::Map(map) => {
                let mut ids: Vec<String> = map.into_iter().map(|(id, _)| id).collect();
                ids.sort();
                FavoritesList::new(ids)
            }
            FavoriteIds::List(values) => FavoritesList::new(values.into_iter().filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })),
        }
    }
}
