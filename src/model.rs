//! Data types exchanged with the poetry service and persisted locally.

use serde::{Deserialize, Serialize};

/// A poem as served by `/v1/daily`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poem {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "linecount")]
    pub line_count: u32,
}

/// The author attached to a daily poem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(rename = "bio_short")]
    pub short_bio: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The single featured poem for a calendar date.
///
/// Immutable once fetched and identified by `date` (ISO `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoem {
    pub date: String,
    pub poem: Poem,
    pub author: Author,
}

impl DailyPoem {
    /// Builds the favourites entry that represents this poem.
    #[must_use]
    pub fn to_favourite(&self) -> FavouriteEntry {
        FavouriteEntry {
            poem_id: self.poem.id.clone(),
            title: self.poem.title.clone(),
            author: self.author.name.clone(),
            date_featured: self.date.clone(),
            poem_text: Some(self.poem.text.clone()),
        }
    }
}

/// Returns the built-in poem served when neither network nor cache can help.
#[must_use]
pub fn sample_daily_poem() -> DailyPoem {
    DailyPoem {
        date: "2026-02-19".to_string(),
        poem: Poem {
            id: "mock-ozymandias".to_string(),
            title: "Ozymandias".to_string(),
            text: [
                "I met a traveller from an antique land",
                "Who said: \"Two vast and trunkless legs of stone",
                "Stand in the desert. Near them, on the sand,",
                "Half sunk, a shattered visage lies...",
            ]
            .join("\n"),
            line_count: 4,
        },
        author: Author {
            id: "percy-bysshe-shelley".to_string(),
            name: "Percy Bysshe Shelley".to_string(),
            short_bio: "English Romantic poet known for lyrical intensity and political radicalism."
                .to_string(),
            image_url: Some(
                "https://upload.wikimedia.org/wikipedia/commons/6/64/Percy_Bysshe_Shelley_by_Alfred_Clint_1829.jpg"
                    .to_string(),
            ),
        },
    }
}

/// A poem the user has marked as a favourite.
///
/// Stored locally in camelCase; the service speaks snake_case and is read
/// through [`crate::favourites::normalize_favourite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteEntry {
    pub poem_id: String,
    pub title: String,
    pub author: String,
    pub date_featured: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poem_text: Option<String>,
}

/// Where the current favourites list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavouritesSource {
    Remote,
    Local,
}

impl std::fmt::Display for FavouritesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => f.write_str("remote"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// Hour used for reminders until the user picks another.
pub const DEFAULT_LOCAL_HOUR: u8 = 9;

/// The per-user daily reminder preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub enabled: bool,
    pub time_zone: String,
    pub local_hour: u8,
}

impl NotificationPreference {
    /// Disabled preference in the given zone at the default hour.
    #[must_use]
    pub fn disabled_in(time_zone: Option<String>) -> Self {
        Self {
            enabled: false,
            time_zone: time_zone
                .filter(|z| !z.trim().is_empty())
                .unwrap_or_else(|| "UTC".to_string()),
            local_hour: DEFAULT_LOCAL_HOUR,
        }
    }
}

/// Keys of a push subscription, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A platform-issued push endpoint registered with the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionRecord {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Colour scheme preference persisted next to the other client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_poem_parses_service_payload() {
        let raw = r#"{
            "date": "2026-03-01",
            "poem": {"id": "p1", "title": "T", "text": "a\nb", "linecount": 2},
            "author": {"id": "a1", "name": "N", "bio_short": "B", "image_url": null}
        }"#;
        let daily: DailyPoem = serde_json::from_str(raw).unwrap();
        assert_eq!(daily.poem.line_count, 2);
        assert_eq!(daily.author.short_bio, "B");
        assert!(daily.author.image_url.is_none());
    }

    #[test]
    fn daily_poem_serializes_with_wire_names() {
        let value = serde_json::to_value(sample_daily_poem()).unwrap();
        assert_eq!(value["poem"]["linecount"], 4);
        assert!(value["author"]["bio_short"].is_string());
    }

    #[test]
    fn favourite_entry_uses_camel_case_locally() {
        let entry = sample_daily_poem().to_favourite();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["poemId"], "mock-ozymandias");
        assert_eq!(value["dateFeatured"], "2026-02-19");
        assert_eq!(value["author"], "Percy Bysshe Shelley");
    }

    #[test]
    fn disabled_preference_defaults_zone_to_utc() {
        let pref = NotificationPreference::disabled_in(Some("  ".to_string()));
        assert_eq!(pref.time_zone, "UTC");
        assert_eq!(pref.local_hour, DEFAULT_LOCAL_HOUR);
        assert!(!pref.enabled);

        let pref = NotificationPreference::disabled_in(Some("Europe/London".to_string()));
        assert_eq!(pref.time_zone, "Europe/London");
    }

    #[test]
    fn theme_round_trips_as_lowercase() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        assert_eq!(Theme::default(), Theme::System);
    }
}
