use super::harness::{day, Harness, ALICE};
use crate::memory::RecordOp;
use crate::{Mood, MoodDraft};
use chrono::Duration;
use std::time::Duration as StdDuration;

#[tokio::test]
async fn add_during_refresh_runs_after_it() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();
    moods
        .add(MoodDraft::new(day("2024-01-01"), Mood::new(2).unwrap()))
        .await
        .unwrap();

    let held = h.records.hold(RecordOp::Select);
    let refresh = tokio::spawn({
        let moods = moods.clone();
        async move { moods.refresh().await }
    });
    held.entered().await;
    assert!(moods.loading());

    let add = tokio::spawn({
        let moods = moods.clone();
        async move {
            moods
                .add(MoodDraft::new(day("2024-01-02"), Mood::new(4).unwrap()))
                .await
        }
    });
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(h.records.calls(RecordOp::Upsert), 1);

    held.release();
    refresh.await.unwrap().unwrap();
    let added = add.await.unwrap().unwrap();

    let list = moods.list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, added.id);
    assert_eq!(list[1].date, day("2024-01-01"));
    assert!(!moods.loading());
}

#[tokio::test]
async fn repeated_refresh_is_idempotent() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();
    for date in ["2024-01-01", "2024-01-02"] {
        moods
            .add(MoodDraft::new(day(date), Mood::new(3).unwrap()))
            .await
            .unwrap();
    }

    moods.refresh().await.unwrap();
    let first = moods.list();
    moods.refresh().await.unwrap();
    let second = moods.list();

    assert_eq!(first.as_ref(), second.as_ref());
    assert_eq!(h.records.calls(RecordOp::Select), 2);
}

#[tokio::test]
async fn expiring_session_is_refreshed_before_the_write() {
    let h = Harness::new().await;
    h.auth.set_token_ttl(Duration::seconds(30));
    let session = h.sign_in(ALICE).await;
    h.auth.set_token_ttl(Duration::hours(1));
    let letters = h.letters();

    letters
        .add(crate::LetterDraft::new("after refresh"))
        .await
        .unwrap();

    let current = h.provider.current_session().unwrap();
    assert_ne!(current.access_token, session.access_token);
    assert_eq!(letters.list().len(), 1);
    assert_eq!(letters.list()[0].user_id, session.user_id());
}
