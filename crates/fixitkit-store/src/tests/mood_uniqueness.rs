use super::harness::{day, Harness, ALICE};
use crate::memory::RecordOp;
use crate::{Mood, MoodDraft, MoodKind, MoodPatch, RecordKind, StoreError};

#[tokio::test]
async fn second_check_in_for_a_day_replaces_the_first() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();
    moods.refresh().await.unwrap();

    let first = moods
        .add(MoodDraft::new(day("2024-01-01"), Mood::new(4).unwrap()).with_note("good run"))
        .await
        .unwrap();
    let second = moods
        .add(MoodDraft::new(day("2024-01-01"), Mood::new(2).unwrap()))
        .await
        .unwrap();

    let list = moods.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].mood.value(), 2);
    assert_eq!(list[0].emoji, "😔");
    assert_eq!(list[0].note, None);
    assert_eq!(second.id, first.id);
    assert_eq!(h.records.rows(MoodKind::TABLE).len(), 1);
    assert_eq!(h.records.calls(RecordOp::Insert), 0);
    assert_eq!(h.records.calls(RecordOp::Upsert), 2);
}

#[tokio::test]
async fn different_days_list_newest_first() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();

    for (date, mood) in [("2024-01-01", 3), ("2024-01-02", 5), ("2024-01-03", 1)] {
        moods
            .add(MoodDraft::new(day(date), Mood::new(mood).unwrap()))
            .await
            .unwrap();
    }

    let dates: Vec<String> = moods.list().iter().map(|e| e.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);

    // A fresh store loads the same order from the table.
    let reloaded = h.moods();
    reloaded.refresh().await.unwrap();
    let dates: Vec<String> = reloaded.list().iter().map(|e| e.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);

    assert_eq!(moods.entry_for(day("2024-01-02")).unwrap().mood.value(), 5);
    assert!(moods.entry_for(day("2023-12-31")).is_none());
    assert_eq!(moods.recent_average(2), Some(3.0));
    assert_eq!(moods.recent_average(10), Some(3.0));
}

#[tokio::test]
async fn update_keeps_position_and_delete_by_date_removes() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();

    let older = moods
        .add(MoodDraft::new(day("2024-02-01"), Mood::new(3).unwrap()))
        .await
        .unwrap();
    moods
        .add(MoodDraft::new(day("2024-02-02"), Mood::new(4).unwrap()))
        .await
        .unwrap();

    let updated = moods
        .update(
            &older.id,
            MoodPatch {
                mood: None,
                note: Some(Some("better by evening".into())),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.note.as_deref(), Some("better by evening"));
    assert_eq!(moods.list()[1].id, older.id);
    assert_eq!(moods.list()[1].note.as_deref(), Some("better by evening"));

    moods.delete_by_date(day("2024-02-02")).await.unwrap();
    assert_eq!(moods.list().len(), 1);
    assert_eq!(moods.list()[0].id, older.id);
    assert_eq!(h.records.rows(MoodKind::TABLE).len(), 1);
}

#[tokio::test]
async fn updating_a_missing_entry_is_not_found() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();

    let result = moods
        .update(
            "no-such-id",
            MoodPatch {
                mood: Some(Mood::new(1).unwrap()),
                note: None,
            },
        )
        .await;
    assert!(matches!(result, Err(StoreError::NotFound { table: "mood_entries", .. })));
    assert!(moods.last_error().is_some());
}

#[tokio::test]
async fn overlong_note_is_rejected_before_any_call() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();

    let note = "x".repeat(201);
    let result = moods
        .add(MoodDraft::new(day("2024-01-01"), Mood::new(3).unwrap()).with_note(note))
        .await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
    assert_eq!(h.records.total_calls(), 0);
}

#[tokio::test]
async fn relogging_an_older_day_keeps_the_order_a_reload_gives() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let moods = h.moods();

    for (date, mood) in [("2024-03-01", 2), ("2024-03-02", 4), ("2024-03-01", 5)] {
        moods
            .add(MoodDraft::new(day(date), Mood::new(mood).unwrap()))
            .await
            .unwrap();
    }

    let local: Vec<(String, String, u8)> = moods
        .list()
        .iter()
        .map(|e| (e.id.clone(), e.date.to_string(), e.mood.value()))
        .collect();
    assert_eq!(local.len(), 2);
    assert_eq!(local[0].1, "2024-03-02");
    assert_eq!(local[1].1, "2024-03-01");
    assert_eq!(local[1].2, 5);

    moods.refresh().await.unwrap();
    let reloaded: Vec<(String, String, u8)> = moods
        .list()
        .iter()
        .map(|e| (e.id.clone(), e.date.to_string(), e.mood.value()))
        .collect();
    assert_eq!(local, reloaded);
}
