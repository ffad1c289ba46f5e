//! Daily mood check-ins.

use crate::{Filter, RecordKind, StoreError, StoreResult};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Longest note accepted on a mood entry, in characters.
pub const NOTE_MAX_CHARS: usize = 200;

const EMOJIS: [&str; 5] = ["😢", "😔", "😐", "😊", "😄"];
const LABELS: [&str; 5] = ["Very sad", "Sad", "Neutral", "Happy", "Very happy"];

/// Mood on a 1 (worst) to 5 (best) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mood(u8);

impl Mood {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> StoreResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(StoreError::Validation(format!(
                "mood must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn emoji(self) -> &'static str {
        EMOJIS[usize::from(self.0 - 1)]
    }

    pub fn label(self) -> &'static str {
        LABELS[usize::from(self.0 - 1)]
    }

    /// All moods, worst first.
    pub fn all() -> impl Iterator<Item = Mood> {
        (Self::MIN..=Self::MAX).map(Mood)
    }
}

impl TryFrom<u8> for Mood {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Mood::new(value)
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> Self {
        mood.0
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

/// Trim a note; blank notes become `None`.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
}

fn check_note(note: Option<&str>) -> StoreResult<()> {
    if let Some(note) = normalize_note(note) {
        let len = note.chars().count();
        if len > NOTE_MAX_CHARS {
            return Err(StoreError::Validation(format!(
                "note is {} characters; the limit is {}",
                len, NOTE_MAX_CHARS
            )));
        }
    }
    Ok(())
}

/// One row of `mood_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub mood: Mood,
    pub emoji: String,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodDraft {
    pub date: NaiveDate,
    pub mood: Mood,
    /// Defaults to the mood's own emoji.
    pub emoji: Option<String>,
    pub note: Option<String>,
}

impl MoodDraft {
    pub fn new(date: NaiveDate, mood: Mood) -> Self {
        Self {
            date,
            mood,
            emoji: None,
            note: None,
        }
    }

    /// Check-in for the local calendar day.
    pub fn today(mood: Mood) -> Self {
        Self::new(Local::now().date_naive(), mood)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

/// Change to an existing check-in. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoodPatch {
    pub mood: Option<Mood>,
    pub note: Option<Option<String>>,
}

/// `mood_entries`: at most one row per user and day.
pub struct MoodKind;

impl RecordKind for MoodKind {
    type Record = MoodEntry;
    type Draft = MoodDraft;
    type Patch = MoodPatch;

    const TABLE: &'static str = "mood_entries";
    const UPSERT_CONFLICT: Option<&'static [&'static str]> = Some(&["user_id", "date"]);

    fn id(record: &MoodEntry) -> &str {
        &record.id
    }

    fn owner(record: &MoodEntry) -> &str {
        &record.user_id
    }

    fn created_at(record: &MoodEntry) -> DateTime<Utc> {
        record.created_at
    }

    fn validate_draft(draft: &MoodDraft) -> StoreResult<()> {
        if draft.emoji.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err(StoreError::Validation("emoji must not be blank".into()));
        }
        check_note(draft.note.as_deref())
    }

    fn draft_row(draft: &MoodDraft, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "date": draft.date,
            "mood": draft.mood,
            "emoji": draft.emoji.as_deref().unwrap_or_else(|| draft.mood.emoji()),
            "note": normalize_note(draft.note.as_deref()),
        })
    }

    fn validate_patch(patch: &MoodPatch, _current: Option<&MoodEntry>) -> StoreResult<()> {
        if patch.mood.is_none() && patch.note.is_none() {
            return Err(StoreError::Validation("nothing to update".into()));
        }
        match &patch.note {
            Some(note) => check_note(note.as_deref()),
            None => Ok(()),
        }
    }

    fn patch_row(patch: &MoodPatch) -> Value {
        let mut row = Map::new();
        if let Some(mood) = patch.mood {
            row.insert("mood".into(), json!(mood));
            row.insert("emoji".into(), json!(mood.emoji()));
        }
        if let Some(note) = &patch.note {
            row.insert("note".into(), json!(normalize_note(note.as_deref())));
        }
        Value::Object(row)
    }

    fn supersedes(new: &MoodEntry, old: &MoodEntry) -> bool {
        new.user_id == old.user_id && new.date == old.date
    }

    fn matches(record: &MoodEntry, filter: &Filter) -> bool {
        match filter.column() {
            "id" => record.id == filter.value(),
            "date" => record.date.to_string() == filter.value(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn mood_range_and_emoji_table() {
        assert!(Mood::new(0).is_err());
        assert!(Mood::new(6).is_err());

        let emojis: Vec<&str> = Mood::all().map(Mood::emoji).collect();
        assert_eq!(emojis, vec!["😢", "😔", "😐", "😊", "😄"]);
        assert_eq!(Mood::new(4).unwrap().label(), "Happy");
    }

    #[test]
    fn mood_deserialization_rejects_out_of_range() {
        assert_eq!(serde_json::from_str::<Mood>("3").unwrap().value(), 3);
        assert!(serde_json::from_str::<Mood>("9").is_err());
    }

    #[test]
    fn draft_row_derives_emoji_and_normalizes_note() {
        let draft = MoodDraft::new(date("2024-01-01"), Mood::new(4).unwrap()).with_note("   ");
        let row = MoodKind::draft_row(&draft, "u-1");

        assert_eq!(row["user_id"], "u-1");
        assert_eq!(row["date"], "2024-01-01");
        assert_eq!(row["mood"], 4);
        assert_eq!(row["emoji"], "😊");
        assert!(row["note"].is_null());
    }

    #[test]
    fn explicit_emoji_is_kept() {
        let draft = MoodDraft::new(date("2024-01-01"), Mood::new(2).unwrap()).with_emoji("🌧️");
        assert_eq!(MoodKind::draft_row(&draft, "u")["emoji"], "🌧️");
    }

    #[test]
    fn note_length_is_checked_in_characters() {
        let mood = Mood::new(3).unwrap();
        let at_limit = MoodDraft::new(date("2024-01-01"), mood).with_note("é".repeat(200));
        assert!(MoodKind::validate_draft(&at_limit).is_ok());

        let over = MoodDraft::new(date("2024-01-01"), mood).with_note("x".repeat(201));
        assert!(matches!(
            MoodKind::validate_draft(&over),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn patch_rules() {
        assert!(MoodKind::validate_patch(&MoodPatch::default(), None).is_err());

        let patch = MoodPatch {
            mood: Some(Mood::new(5).unwrap()),
            note: Some(None),
        };
        assert!(MoodKind::validate_patch(&patch, None).is_ok());
        let row = MoodKind::patch_row(&patch);
        assert_eq!(row["emoji"], "😄");
        assert!(row["note"].is_null());
        assert!(row.get("date").is_none());
    }

    #[test]
    fn entry_parses_postgrest_row() {
        let entry: MoodEntry = serde_json::from_value(json!({
            "id": "e-1",
            "user_id": "u-1",
            "date": "2024-01-01",
            "mood": 4,
            "emoji": "😊",
            "note": null,
            "created_at": "2024-01-01T08:30:00.123456+00:00"
        }))
        .unwrap();

        assert_eq!(entry.date, date("2024-01-01"));
        assert!(MoodKind::matches(&entry, &Filter::eq("date", "2024-01-01")));
        assert!(MoodKind::matches(&entry, &Filter::eq("id", "e-1")));
        assert!(!MoodKind::matches(&entry, &Filter::eq("mood", 4)));
    }

    #[test]
    fn today_uses_local_calendar_day() {
        let draft = MoodDraft::today(Mood::new(3).unwrap());
        assert_eq!(draft.date, Local::now().date_naive());
    }
}
