use chrono::NaiveDate;
use pantry_tracker::config::Config;
use pantry_tracker::{
    require_owner, ExpiryStatus, HistoryAction, ListQuery, OwnerId, Pantry, PantryError,
    RawCandidate, SessionIdentity, SortKey,
};
use std::time::Duration;
use tempfile::TempDir;

// Test fixtures

fn config_in(dir: &TempDir) -> Config {
    Config {
        database: dir.path().join("nested").join("pantry.db"),
        owner: OwnerId::new("u1"),
        busy_timeout: Duration::from_secs(5),
        read_retries: 2,
    }
}

fn raw(name: &str, quantity: &str, expiry: &str, category: &str) -> RawCandidate {
    RawCandidate {
        name: name.to_string(),
        quantity: quantity.to_string(),
        expiry_date: expiry.to_string(),
        category: category.to_string(),
    }
}

fn noon(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[test]
fn test_rice_is_merged_and_audited() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();

    let first = pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
    assert_eq!(first.action, HistoryAction::Added);

    let second = pantry.submit(&u1, &raw("Rice", "3", "2025-01-10", "Grains")).unwrap();
    assert_eq!(second.action, HistoryAction::Updated);
    assert_eq!(second.item.id, first.item.id);
    assert_eq!(second.item.quantity, 5);

    let items = pantry.items(&u1).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);

    let history = pantry.history(&u1).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .any(|h| h.action == HistoryAction::Updated && h.item_quantity == 3));
    assert!(history
        .iter()
        .any(|h| h.action == HistoryAction::Added && h.item_quantity == 2));
}

#[test]
fn test_different_expiry_is_a_separate_item() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();

    pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
    pantry.submit(&u1, &raw("Rice", "1", "2025-02-10", "Grains")).unwrap();

    assert_eq!(pantry.items(&u1).unwrap().len(), 2);
}

#[test]
fn test_owners_are_isolated() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();
    let u2 = OwnerId::new("u2").unwrap();

    let added = pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
    pantry.submit(&u2, &raw("Rice", "7", "2025-01-10", "Grains")).unwrap();

    assert_eq!(pantry.items(&u1).unwrap()[0].quantity, 2);
    assert_eq!(pantry.items(&u2).unwrap()[0].quantity, 7);
    assert_eq!(pantry.history(&u2).unwrap().len(), 1);

    let err = pantry.delete(&u2, added.item.id).unwrap_err();
    assert!(matches!(err, PantryError::NotFound(_)));
    assert_eq!(pantry.items(&u1).unwrap().len(), 1);
}

#[test]
fn test_invalid_submission_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();

    let err = pantry.submit(&u1, &raw("", "-1", "2025-13-01", "Meat")).unwrap_err();
    match err {
        PantryError::Validation(v) => assert_eq!(
            v.field_names(),
            vec!["name", "quantity", "expiry_date", "category"]
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(pantry.items(&u1).unwrap().is_empty());
    assert!(pantry.history(&u1).unwrap().is_empty());
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let u1 = OwnerId::new("u1").unwrap();
    {
        let pantry = Pantry::open(&config).unwrap();
        pantry.submit(&u1, &raw("Yogurt", "4", "2025-01-12", "Dairy")).unwrap();
    }

    let pantry = Pantry::open(&config).unwrap();
    let items = pantry.items(&u1).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Yogurt");
    assert_eq!(pantry.history(&u1).unwrap().len(), 1);
}

#[test]
fn test_list_annotates_and_sorts() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();

    pantry.submit(&u1, &raw("Yogurt", "4", "2025-01-12", "Dairy")).unwrap();
    pantry.submit(&u1, &raw("Bread", "1", "2025-01-08", "Grains")).unwrap();
    pantry.submit(&u1, &raw("Peas", "9", "2025-03-01", "Frozen")).unwrap();

    let query = ListQuery {
        sort: SortKey::ExpiryDate,
        ..Default::default()
    };
    let listed = pantry.list(&u1, &query, noon(2025, 1, 10)).unwrap();

    let summary: Vec<(&str, ExpiryStatus)> = listed
        .iter()
        .map(|l| (l.item.name.as_str(), l.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Bread", ExpiryStatus::Expired),
            ("Yogurt", ExpiryStatus::Nearing),
            ("Peas", ExpiryStatus::Normal),
        ]
    );
}

#[test]
fn test_edit_overwrites_and_logs_update() {
    let dir = TempDir::new().unwrap();
    let pantry = Pantry::open(&config_in(&dir)).unwrap();
    let u1 = OwnerId::new("u1").unwrap();

    let added = pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
    let edited = pantry
        .edit(&u1, added.item.id, &raw("Brown Rice", "1", "2025-03-01", "Grains"))
        .unwrap();

    assert_eq!(edited.id, added.item.id);
    assert_eq!(edited.name, "Brown Rice");
    assert_eq!(edited.quantity, 1);

    let history = pantry.history(&u1).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .any(|h| h.action == HistoryAction::Updated && h.item_name == "Brown Rice"));
}

#[test]
fn test_signed_out_session_is_rejected() {
    let identity = SessionIdentity::new(None);
    assert!(matches!(
        require_owner(&identity),
        Err(PantryError::NotAuthenticated)
    ));

    identity.sign_in(OwnerId::new("u1").unwrap());
    assert_eq!(require_owner(&identity).unwrap().as_str(), "u1");
}
