use super::harness::{day, Harness, ALICE};
use crate::memory::RecordOp;
use crate::{LetterDraft, Mood, MoodDraft, MoodPatch, StoreError};
use std::sync::Arc;

fn server_error() -> StoreError {
    StoreError::Remote {
        status: 500,
        message: "upstream timeout".into(),
    }
}

#[tokio::test]
async fn failed_calls_leave_the_mood_list_untouched() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();
    let entry = moods
        .add(MoodDraft::new(day("2024-01-01"), Mood::new(3).unwrap()))
        .await
        .unwrap();
    let before = moods.list();

    h.records.fail_next(RecordOp::Select, server_error());
    assert!(moods.refresh().await.is_err());
    assert!(Arc::ptr_eq(&before, &moods.list()));
    assert!(moods.last_error().unwrap().contains("500"));

    h.records.fail_next(RecordOp::Upsert, server_error());
    let result = moods
        .add(MoodDraft::new(day("2024-01-02"), Mood::new(5).unwrap()))
        .await;
    assert!(result.unwrap_err().is_transient());
    assert!(Arc::ptr_eq(&before, &moods.list()));

    h.records.fail_next(RecordOp::Update, server_error());
    let patch = MoodPatch {
        mood: Some(Mood::new(1).unwrap()),
        note: None,
    };
    assert!(moods.update(&entry.id, patch).await.is_err());
    assert!(Arc::ptr_eq(&before, &moods.list()));

    h.records.fail_next(RecordOp::Delete, server_error());
    assert!(moods.delete(&entry.id).await.is_err());
    assert!(Arc::ptr_eq(&before, &moods.list()));
    assert!(!moods.loading());

    moods.refresh().await.unwrap();
    assert!(moods.last_error().is_none());
    assert_eq!(moods.list().len(), 1);
}

#[tokio::test]
async fn failed_burn_leaves_the_letter_unburned() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let letters = h.letters();
    let letter = letters.add(LetterDraft::new("still here")).await.unwrap();
    let before = letters.list();

    h.records.fail_next(
        RecordOp::Update,
        StoreError::Remote {
            status: 403,
            message: "permission denied".into(),
        },
    );
    assert!(letters.burn(&letter.id).await.is_err());
    assert!(Arc::ptr_eq(&before, &letters.list()));
    assert!(!letters.find(&letter.id).unwrap().burned);
}

#[tokio::test]
async fn revoked_token_surfaces_as_remote_error() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let letters = h.letters();
    letters.add(LetterDraft::new("first")).await.unwrap();
    let before = letters.list();

    h.auth.revoke_all();
    let result = letters.refresh().await;
    assert!(matches!(result, Err(StoreError::Remote { status: 401, .. })));
    assert!(Arc::ptr_eq(&before, &letters.list()));
}
