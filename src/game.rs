use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use time::Date;

pub const STEAM_DECK: &str = "steamdeck";
pub const STEAM_DECK_VERIFIED: &str = "verified";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlatformSupport {
    Flag(bool),
    Tier(String),
    Other(Value),
}

impl PlatformSupport {
    pub fn label(&self) -> String {
        match self {
            PlatformSupport::Flag(true) => "yes".to_string(),
            PlatformSupport::Flag(false) => "no".to_string(),
            PlatformSupport::Tier(tier) => tier.clone(),
            PlatformSupport::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Game {
    #[serde(default, deserialize_with = "deserialize_title")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_release_date")]
    pub release_date: Option<Date>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub platforms: BTreeMap<String, PlatformSupport>,
    #[serde(default, deserialize_with = "deserialize_rankings")]
    pub rankings: BTreeMap<String, i64>,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub harmony_score: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub metacritic: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub total_score: Option<f64>,
}

impl Game {
    pub fn rank_for(&self, source: &str) -> Option<i64> {
        self.rankings.get(source).copied()
    }

    pub fn best_rank(&self) -> Option<i64> {
        self.rankings.values().copied().min()
    }

    pub fn release_label(&self) -> String {
        match self.release_date {
            Some(date) => format_date(date),
            None => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Metadata {
    /// Declared sources first, then any source seen in rankings but missing
    /// from the metadata, alphabetically.
    pub fn known_sources(&self, games: &[Game]) -> Vec<String> {
        let mut sources = self.sources.clone();
        let declared: BTreeSet<&str> = self.sources.iter().map(String::as_str).collect();
        let extra: BTreeSet<&str> = games
            .iter()
            .flat_map(|game| game.rankings.keys())
            .map(String::as_str)
            .filter(|source| !declared.contains(source))
            .collect();
        sources.extend(extra.into_iter().map(str::to_string));
        sources
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "deserialize_games")]
    pub games: Vec<Game>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub total_games: Option<usize>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Manifest {
    pub fn last_updated(&self) -> Option<&str> {
        self.metadata
            .last_updated
            .as_deref()
            .or(self.last_updated.as_deref())
    }
}

/// Steam Deck has a tri-state rating where only "verified" counts; every
/// other platform needs a literal `true`.
pub fn is_platform_supported(game: &Game, platform: &str) -> bool {
    match game.platforms.get(platform) {
        Some(PlatformSupport::Tier(tier)) if platform == STEAM_DECK => tier == STEAM_DECK_VERIFIED,
        Some(PlatformSupport::Flag(flag)) if platform != STEAM_DECK => *flag,
        _ => false,
    }
}

pub fn known_platforms(games: &[Game]) -> Vec<String> {
    let platforms: BTreeSet<&str> = games
        .iter()
        .flat_map(|game| game.platforms.keys())
        .map(String::as_str)
        .collect();
    platforms.into_iter().map(str::to_string).collect()
}

pub fn format_date(date: Date) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_else(|_| date.to_string())
}

pub fn parse_release_date(value: &str) -> Option<Date> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_format = time::macros::format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(trimmed, &date_format) {
        return Some(date);
    }
    // Some producers emit full timestamps; keep the calendar day.
    trimmed
        .get(..10)
        .and_then(|prefix| Date::parse(prefix, &date_format).ok())
}

fn deserialize_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(title) => Ok(title),
        _ => Ok(String::new()),
    }
}

fn deserialize_release_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(parse_release_date(&raw)),
        _ => Ok(None),
    }
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => Ok(number.as_f64()),
        _ => Ok(None),
    }
}

/// Wrong-typed or `null` values fall back to the default.
fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn deserialize_rankings<'de, D>(deserializer: D) -> Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(raw) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    let mut rankings = BTreeMap::new();
    for (source, value) in raw {
        let rank = match value {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.round() as i64)),
            _ => None,
        };
        if let Some(rank) = rank {
            rankings.insert(source, rank);
        }
    }
    Ok(rankings)
}

/// Entries that are not objects are skipped; the rest of the list survives.
fn deserialize_games<'de, D>(deserializer: D) -> Result<Vec<Game>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}
