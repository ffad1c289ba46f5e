//! Record kinds stored per user.

mod kind;
mod letter;
mod mood;

pub use kind::RecordKind;
pub use letter::{LetterDraft, LetterKind, LetterPatch, UnsentLetter};
pub use mood::{normalize_note, Mood, MoodDraft, MoodEntry, MoodKind, MoodPatch, NOTE_MAX_CHARS};
