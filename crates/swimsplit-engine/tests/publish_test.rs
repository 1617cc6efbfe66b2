mod common;

use common::*;
use std::sync::Arc;
use swimsplit_engine::publish::{PublishError, SheetsError, publish_report};

const REPORT: &str = ",Intervals,Swim Stroke\n\"\",1,Freestyle\n\"\",Summary,--\n";

#[tokio::test]
async fn test_creates_dated_tab_and_writes_rows() {
    let sheets = MockSheets::default();
    let title = publish_report(&sheets, REPORT, "2025-04-13").await.unwrap();

    assert_eq!(title, "2025-04-13");
    assert_eq!(*sheets.state.created.lock().unwrap(), vec!["2025-04-13"]);
    let writes = sheets.state.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "2025-04-13!A1");
    assert_eq!(
        writes[0].1,
        vec![
            vec!["", "Intervals", "Swim Stroke"],
            vec!["\"\"", "1", "Freestyle"],
            vec!["\"\"", "Summary", "--"],
        ]
    );
}

#[tokio::test]
async fn test_collision_falls_back_to_suffixed_tab() {
    let sheets = MockSheets {
        state: Arc::new(SheetsState::with_existing(&["2025-04-13"])),
    };
    let title = publish_report(&sheets, REPORT, "2025-04-13").await.unwrap();

    assert_eq!(title, "2025-04-13-2");
    assert_eq!(*sheets.state.created.lock().unwrap(), vec!["2025-04-13-2"]);
    let writes = sheets.state.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "2025-04-13-2!A1");
}

#[tokio::test]
async fn test_second_collision_fails() {
    let sheets = MockSheets {
        state: Arc::new(SheetsState::with_existing(&["2025-04-13", "2025-04-13-2"])),
    };
    let err = publish_report(&sheets, REPORT, "2025-04-13")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::CreateTab { ref title, source: SheetsError::AlreadyExists(_) } if title == "2025-04-13-2"
    ));
    assert!(sheets.state.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_create_errors_do_not_retry() {
    let sheets = MockSheets::default();
    *sheets.state.fail_create.lock().unwrap() = Some("permission denied".into());
    let err = publish_report(&sheets, REPORT, "2025-04-13")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::CreateTab { ref title, source: SheetsError::Api { status: 403, .. } } if title == "2025-04-13"
    ));
    assert!(sheets.state.created.lock().unwrap().is_empty());
    assert!(sheets.state.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let sheets = MockSheets {
        state: Arc::new(SheetsState {
            fail_write: true,
            ..Default::default()
        }),
    };
    let err = publish_report(&sheets, REPORT, "2025-04-13")
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Write { ref title, .. } if title == "2025-04-13"));
}
