use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use editqueue::{
    core::{
        entry::{EditQueueEntry, EntryState, NewEntry},
        retention::{normalize, parse_report_created},
    },
    edit::{Attributes, Edit, Feature},
    persist::{
        KvStore, LEGACY_QUEUE_KEY, QueueRepository, memory::MemoryKvStore,
        sqlite::SqliteKvStore, user_queue_key,
    },
    types::FeatureLayer,
};

fn entry_created(report_created: &str, state: EntryState) -> EditQueueEntry {
    let mut entry = NewEntry::new(
        "report",
        "icon",
        vec![Edit::adds(
            FeatureLayer::SignsOfPresenceObservation,
            vec![Feature {
                geometry: None,
                attributes: Attributes::new(report_created).with("notes", "tracks"),
            }],
        )],
    )
    .into_entry();
    entry.state = state;
    entry
}

#[test]
fn reset_round_trip_through_sqlite() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("queue.db");
    let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).single().expect("now");

    let queue = vec![
        entry_created("2024-06-29T08:00:00.000Z", EntryState::Success),
        entry_created("2024-06-29T09:00:00.000Z", EntryState::Pending),
        entry_created("2024-06-29T10:00:00.000Z", EntryState::Active),
        entry_created(
            "2024-06-29T11:00:00.000Z",
            EntryState::Error {
                error: Some("limit".to_string()),
            },
        ),
        entry_created("2024-04-01T11:00:00.000Z", EntryState::Pending),
    ];

    {
        let store = SqliteKvStore::open(&db).expect("open");
        let mut repo = QueueRepository::new(Box::new(store), "u1");
        repo.save(&queue).expect("save");
    }

    let store = SqliteKvStore::open(&db).expect("reopen");
    let mut repo = QueueRepository::new(Box::new(store), "u1");
    let loaded = repo.load().expect("load");
    assert_eq!(loaded, queue);

    let normalized = normalize(loaded, now, 30);
    let states: Vec<EntryState> = normalized.iter().map(|e| e.state.clone()).collect();
    assert_eq!(
        states,
        vec![
            EntryState::Success,
            EntryState::Pending,
            EntryState::Pending,
            EntryState::Pending,
        ]
    );
    assert_eq!(
        normalized.iter().map(|e| e.id).collect::<Vec<_>>(),
        queue[..4].iter().map(|e| e.id).collect::<Vec<_>>()
    );
}

#[test]
fn entries_without_attributes_are_dropped() {
    let now = Utc::now();
    let mut empty_adds = entry_created(&now.to_rfc3339(), EntryState::Pending);
    empty_adds.edits[0].adds = Some(Vec::new());
    let mut no_edits = entry_created(&now.to_rfc3339(), EntryState::Pending);
    no_edits.edits.clear();
    let mut updates_only = entry_created(&now.to_rfc3339(), EntryState::Pending);
    updates_only.edits[0].updates = updates_only.edits[0].adds.take();
    let kept = entry_created(&now.to_rfc3339(), EntryState::Pending);

    let out = normalize(
        vec![empty_adds, no_edits, updates_only.clone(), kept.clone()],
        now,
        30,
    );
    assert_eq!(
        out.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![updates_only.id, kept.id]
    );
}

#[test]
fn retention_boundary_and_unparseable_dates() {
    let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).single().expect("now");
    let just_inside = (now - Duration::days(7) + Duration::seconds(1)).to_rfc3339();
    let just_outside = (now - Duration::days(7) - Duration::seconds(1)).to_rfc3339();

    let inside = entry_created(&just_inside, EntryState::Pending);
    let outside = entry_created(&just_outside, EntryState::Pending);
    let garbage = entry_created("not a date", EntryState::Pending);

    let out = normalize(vec![inside.clone(), outside, garbage.clone()], now, 7);
    assert_eq!(
        out.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![inside.id, garbage.id]
    );
}

#[test]
fn report_created_accepts_offsets_and_naive_times() {
    let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("ts");
    assert_eq!(parse_report_created("2024-05-01T10:00:00Z"), Some(expected));
    assert_eq!(parse_report_created("2024-05-01T13:00:00+03:00"), Some(expected));
    assert_eq!(parse_report_created("2024-05-01T10:00:00"), Some(expected));
    assert_eq!(parse_report_created("yesterday"), None);
}

#[test]
fn legacy_key_is_used_only_without_user_record() {
    let legacy = vec![entry_created("2024-06-29T08:00:00Z", EntryState::Pending)];
    let store = MemoryKvStore::new().with_value(
        LEGACY_QUEUE_KEY,
        serde_json::to_value(&legacy).expect("encode"),
    );
    let mut repo = QueueRepository::new(Box::new(store), "u2");
    assert_eq!(repo.load().expect("load legacy"), legacy);

    let own = vec![entry_created("2024-06-30T08:00:00Z", EntryState::Success)];
    repo.save(&own).expect("save");
    assert_eq!(repo.load().expect("load own"), own);
}

#[test]
fn stored_entries_without_ids_get_fresh_ones_and_bad_entries_are_skipped() {
    let stored = json!([
        {
            "title": "Old report",
            "icon": "hunt",
            "state": { "status": "error", "error": "Limit reached" },
            "edits": [{
                "id": 8,
                "adds": [{
                    "geometry": { "x": 24.1, "y": 56.9 },
                    "attributes": {
                        "guid": "a5c1",
                        "reportCreated": "2024-06-29T08:00:00.000Z",
                        "permitId": 42
                    }
                }]
            }],
            "photo": { "path": "/photos/1.jpg", "webPath": "capacitor://photos/1.jpg" }
        },
        { "title": "Broken", "icon": "x", "state": { "status": "pending" }, "edits": [{ "id": 99 }] }
    ]);
    let mut store = MemoryKvStore::new();
    store.set(&user_queue_key("u3"), &stored).expect("seed");
    let mut repo = QueueRepository::new(Box::new(store), "u3");

    let loaded = repo.load().expect("load");
    assert_eq!(loaded.len(), 1);
    let entry = &loaded[0];
    assert_eq!(entry.layer(), Some(FeatureLayer::LimitedHuntReport));
    let attributes = entry.attributes().expect("attributes");
    assert_eq!(attributes.guid, "a5c1");
    assert_eq!(attributes.extra.get("permitId"), Some(&json!(42)));

    let reencoded = serde_json::to_value(entry).expect("encode");
    assert_eq!(reencoded["edits"], stored[0]["edits"]);
    assert_eq!(reencoded["photo"], stored[0]["photo"]);
    assert!(reencoded["id"].is_string());
}

#[test]
fn stored_idle_check_ignores_success_and_error() {
    let mut repo = QueueRepository::new(Box::new(MemoryKvStore::new()), "u4");
    assert!(repo.is_stored_queue_idle().expect("empty"));

    repo.save(&[
        entry_created("2024-06-29T08:00:00Z", EntryState::Success),
        entry_created("2024-06-29T08:00:00Z", EntryState::Error { error: None }),
    ])
    .expect("save");
    assert!(repo.is_stored_queue_idle().expect("done"));

    repo.save(&[entry_created("2024-06-29T08:00:00Z", EntryState::Pending)])
        .expect("save");
    assert!(!repo.is_stored_queue_idle().expect("pending"));
}

#[test]
fn sqlite_store_overwrites_and_lists_keys() {
    let mut store = SqliteKvStore::open_in_memory().expect("open");
    store.set("b", &json!([1])).expect("set");
    store.set("a", &json!({ "x": 1 })).expect("set");
    store.set("b", &json!([2])).expect("overwrite");

    assert_eq!(store.get("b").expect("get"), Some(json!([2])));
    assert_eq!(store.get("missing").expect("get"), None);
    assert_eq!(store.keys().expect("keys"), vec!["a".to_string(), "b".to_string()]);
    assert!(store.remove("a").expect("remove"));
    assert!(!store.remove("a").expect("remove again"));
}

#[test]
fn undecodable_entries_survive_load_and_save() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("queue.db");
    let good = entry_created("2024-06-29T08:00:00Z", EntryState::Pending);
    let unknown_layer = json!({
        "title": "Future layer",
        "icon": "x",
        "state": { "status": "pending" },
        "edits": [{ "id": 9, "adds": [] }]
    });

    {
        let mut store = SqliteKvStore::open(&db).expect("open");
        let stored = json!([serde_json::to_value(&good).expect("encode"), unknown_layer.clone()]);
        store.set(&user_queue_key("u5"), &stored).expect("seed");
        let mut repo = QueueRepository::new(Box::new(store), "u5");

        let mut loaded = repo.load().expect("load");
        assert_eq!(loaded, vec![good.clone()]);
        loaded[0].state = EntryState::Success;
        repo.save(&loaded).expect("save");
    }

    let store = SqliteKvStore::open(&db).expect("reopen");
    let raw = store
        .get(&user_queue_key("u5"))
        .expect("get")
        .expect("stored");
    let items = raw.as_array().expect("array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["state"], json!({ "status": "success" }));
    assert_eq!(items[1], unknown_layer);
}
