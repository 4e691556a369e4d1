mod common;

use common::{BOOK, RESULTS, fixture, rows};
use fpm::changeset::{CellWrite, ChangeSet};
use fpm::error::SheetError;
use fpm::permission::Role;
use fpm::update::{UpdateOutcome, apply_changes};

fn changes(entries: &[(usize, &str, &str)]) -> ChangeSet {
    let mut set = ChangeSet::new();
    for (row, col, value) in entries {
        set.entry(*row)
            .or_default()
            .insert(col.to_string(), value.to_string());
    }
    set
}

#[tokio::test]
async fn admin_update_writes_one_batch() {
    let sheets = fixture();
    let set = changes(&[(0, "STATUS", "D"), (2, "STATUS", "W"), (2, "NAME", "Cemil")]);

    let outcome = apply_changes(sheets.as_ref(), BOOK, RESULTS, &set, &Role::Admin)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied { updated: true });

    let batches = sheets.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec![
            CellWrite { range: format!("{}!B2", RESULTS), value: "D".to_string() },
            CellWrite { range: format!("{}!D4", RESULTS), value: "Cemil".to_string() },
            CellWrite { range: format!("{}!B4", RESULTS), value: "W".to_string() },
        ]
    );

    let tab = sheets.tab(BOOK, RESULTS).unwrap();
    assert_eq!(tab[1][1], "D");
    assert_eq!(tab[3][1], "W");
    assert_eq!(tab[3][3], "Cemil");
}

#[tokio::test]
async fn co_admin_may_change_status_only() {
    let sheets = fixture();

    let ok = apply_changes(sheets.as_ref(), BOOK, RESULTS, &changes(&[(1, "STATUS", "W")]), &Role::CoAdmin)
        .await
        .unwrap();
    assert_eq!(ok, UpdateOutcome::Applied { updated: true });

    let denied = apply_changes(
        sheets.as_ref(),
        BOOK,
        RESULTS,
        &changes(&[(1, "STATUS", "W"), (1, "NAME", "x")]),
        &Role::CoAdmin,
    )
    .await
    .unwrap();
    assert_eq!(
        denied,
        UpdateOutcome::Denied("Co-admin can only modify STATUS column".to_string())
    );
    assert_eq!(sheets.batches().len(), 1);
}

#[tokio::test]
async fn denial_happens_before_any_read() {
    let sheets = fixture();

    let outcome = apply_changes(sheets.as_ref(), BOOK, RESULTS, &ChangeSet::new(), &Role::Read)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Denied("Permission denied".to_string()));

    // Misspelled column: denied without resolving it against the header
    let outcome = apply_changes(sheets.as_ref(), BOOK, RESULTS, &changes(&[(0, "STATSU", "W")]), &Role::CoAdmin)
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Denied(_)));

    assert_eq!(sheets.header_reads(), 0);
    assert!(sheets.batches().is_empty());
}

#[tokio::test]
async fn unknown_columns_are_a_no_op() {
    let sheets = fixture();

    let outcome = apply_changes(sheets.as_ref(), BOOK, RESULTS, &changes(&[(0, "AGE", "30")]), &Role::Admin)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied { updated: false });

    let outcome = apply_changes(sheets.as_ref(), BOOK, RESULTS, &ChangeSet::new(), &Role::Admin)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied { updated: false });
    assert!(sheets.batches().is_empty());
}

#[tokio::test]
async fn missing_header_is_an_error() {
    let sheets = fixture();
    sheets.insert_tab(BOOK, "Blank", Vec::new());

    let err = apply_changes(sheets.as_ref(), BOOK, "Blank", &changes(&[(0, "STATUS", "W")]), &Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, SheetError::NoHeader { .. }));
    assert_eq!(err.to_string(), "Cannot read header row of sheet 'Blank'.");
    assert!(sheets.batches().is_empty());
}

#[tokio::test]
async fn service_errors_pass_through_unchanged() {
    let sheets = fixture();
    sheets.set_failure(Some("The caller does not have permission"));

    let err = apply_changes(sheets.as_ref(), BOOK, RESULTS, &changes(&[(0, "STATUS", "W")]), &Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The caller does not have permission");
    assert!(sheets.batches().is_empty());
}

#[tokio::test]
async fn header_is_read_fresh_each_call() {
    let sheets = fixture();
    let set = changes(&[(0, "STATUS", "L")]);

    apply_changes(sheets.as_ref(), BOOK, RESULTS, &set, &Role::Admin)
        .await
        .unwrap();

    // Move STATUS to the first column between calls
    sheets.insert_tab(BOOK, RESULTS, rows(&[&["STATUS", "CLIENT_ID"], &["W", "C2001"]]));
    apply_changes(sheets.as_ref(), BOOK, RESULTS, &set, &Role::Admin)
        .await
        .unwrap();

    let ranges: Vec<String> = sheets
        .batches()
        .iter()
        .map(|batch| batch[0].range.clone())
        .collect();
    assert_eq!(ranges, vec![format!("{}!B2", RESULTS), format!("{}!A2", RESULTS)]);
    assert_eq!(sheets.header_reads(), 2);
}
