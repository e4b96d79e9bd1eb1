pub(crate) mod support;

use crate::form::{CreationForm, Notice, SubmitOutcome, CREATE_SUCCESS};
use crate::listing::{matches_filter, ListingView};
use crate::model::{Field, RecordId, SchoolRecord};
use crate::overlay::{DeleteOutcome, DetailOverlay, OverlayMode, SaveOutcome};

use support::{record, valid_draft, MemoryStore};

fn directory() -> Vec<SchoolRecord> {
    vec![
        record("1", "Lakeside High", "Austin", "TX"),
        record("2", "Hill Country Prep", "Austin", "TX"),
        record("3", "Trinity Academy", "Dallas", "TX"),
        record("4", "Magnolia Elementary", "Shreveport", "LA"),
        record("5", "austin Charter", "Houston", "TX"),
    ]
}

fn ids(view: &ListingView) -> Vec<&str> {
    view.filtered().iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn city_selection_keeps_canonical_order() {
    let view = {
        let mut v = ListingView::with_records(vec![
            record("a", "North High", "Austin", "TX"),
            record("b", "South High", "Austin", "TX"),
            record("c", "Trinity Academy", "Dallas", "TX"),
        ]);
        v.set_query("");
        v.set_city(Some("Austin".to_string()));
        v
    };
    assert_eq!(ids(&view), vec!["a", "b"]);
}

#[test]
fn query_matches_name_city_or_state_case_insensitively() {
    let records = directory();
    for query in ["", "a", "AUSTIN", "tx", "la", "prep", "zzz", " "] {
        let mut view = ListingView::with_records(records.clone());
        view.set_query(query);
        let needle = query.to_lowercase();
        let expected: Vec<&str> = records
            .iter()
            .filter(|r| {
                [&r.name, &r.city, &r.state]
                    .iter()
                    .any(|v| v.to_lowercase().contains(&needle))
            })
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids(&view), expected, "query {query:?}");
    }
}

#[test]
fn query_and_city_intersect() {
    let records = directory();
    for city in ["Austin", "Dallas", "Houston", "austin"] {
        for query in ["", "austin", "high", "t"] {
            let mut view = ListingView::with_records(records.clone());
            view.set_query(query);
            view.set_city(Some(city.to_string()));
            let expected: Vec<&str> = records
                .iter()
                .filter(|r| matches_filter(r, query, None) && r.city == city)
                .map(|r| r.id.as_str())
                .collect();
            assert_eq!(ids(&view), expected, "query {query:?} city {city:?}");
        }
    }
}

#[test]
fn exact_city_does_not_match_other_casing() {
    let mut view = ListingView::with_records(directory());
    view.set_city(Some("austin".to_string()));
    assert!(view.filtered().is_empty());
}

#[tokio::test]
async fn contact_length_is_checked_before_network() {
    let store = MemoryStore::default();
    for (contact, accepted) in [
        ("512555010", false),
        ("51255501000", false),
        ("5125550100", true),
    ] {
        let mut draft = valid_draft();
        draft.set(Field::Contact, contact);
        let mut form = CreationForm::with_draft(draft);
        let outcome = form.submit(&store).await;
        assert_eq!(
            matches!(outcome, SubmitOutcome::Created(_)),
            accepted,
            "contact {contact}"
        );
    }
    assert_eq!(store.calls("insert"), 1);
}

#[tokio::test]
async fn malformed_email_never_reaches_store() {
    let store = MemoryStore::default();
    for email in ["office", "office@", "@lakeside.edu", "office@lakeside", "a b@c.edu"] {
        let mut draft = valid_draft();
        draft.set(Field::EmailId, email);
        let mut form = CreationForm::with_draft(draft);
        match form.submit(&store).await {
            SubmitOutcome::Invalid(errors) => {
                assert!(errors.iter().any(|e| e.field == Field::EmailId), "{email}")
            }
            other => panic!("{email} accepted: {other:?}"),
        }
    }
    assert_eq!(store.calls("insert"), 0);
}

#[tokio::test]
async fn failed_creation_keeps_fields() {
    let store = MemoryStore::default();
    store.fail_next("duplicate key value violates unique constraint \"schools_email_id_key\"");
    let mut form = CreationForm::with_draft(valid_draft());
    let outcome = form.submit(&store).await;
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(form.draft(), &valid_draft());
    assert!(form.notice().map(Notice::is_error).unwrap_or(false));

    let outcome = form.submit(&store).await;
    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    assert_eq!(
        form.notice(),
        Some(&Notice::Success(CREATE_SUCCESS.to_string()))
    );
    assert!(form.draft().name.is_empty());
}

#[tokio::test]
async fn create_edit_delete_round_through_listing() {
    let store = MemoryStore::with_records(directory());
    let mut view = ListingView::new();
    view.load(&store).await.unwrap();
    assert_eq!(view.total(), 5);

    // Create: the new row leads the list.
    let mut form = CreationForm::with_draft(valid_draft());
    let created = match form.submit(&store).await {
        SubmitOutcome::Created(record) => record,
        other => panic!("unexpected outcome {other:?}"),
    };
    view.apply_created(created.clone());
    assert_eq!(view.filtered()[0].id, created.id);
    assert_eq!(view.total(), 6);

    // Edit: values change in place, no reload.
    let mut overlay = DetailOverlay::open(created.clone());
    overlay.begin_edit();
    overlay.draft_mut().unwrap().set(Field::City, "Round Rock");
    let saved = match overlay.save(&store).await {
        SaveOutcome::Saved(record) => record,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(overlay.mode(), &OverlayMode::Viewing);
    view.apply_updated(saved);
    assert_eq!(view.get(&created.id).unwrap().city, "Round Rock");
    assert!(view.cities().contains(&"Round Rock".to_string()));
    assert_eq!(store.calls("list_all"), 1);

    // Delete: confirmed, then gone from the list and the overlay is closed.
    overlay.request_delete();
    let deleted = match overlay.confirm_delete(&store).await {
        DeleteOutcome::Deleted(id) => id,
        other => panic!("unexpected outcome {other:?}"),
    };
    view.apply_deleted(&deleted);
    assert!(!overlay.is_open());
    assert!(view.get(&created.id).is_none());
    assert_eq!(view.total(), 5);
    assert_eq!(store.rows().len(), 5);
}

#[tokio::test]
async fn edit_of_vanished_row_reports_failure() {
    let store = MemoryStore::default();
    let ghost = record("404", "Gone School", "Austin", "TX");
    let mut overlay = DetailOverlay::open(ghost);
    overlay.begin_edit();
    match overlay.save(&store).await {
        SaveOutcome::Failed(text) => assert_eq!(text, "no record with id 404"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(overlay.is_editing());
    assert_eq!(overlay.record().id, RecordId::from("404"));
}
