use super::*;

fn row(status: &str) -> QueueRow {
    (
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        "ada".into(),
        "undo".into(),
        status.into(),
        1_700_000_000_000,
        None,
    )
}

#[test]
fn row_converts_known_status() {
    let raw = row("executing");
    let id = raw.0;
    let command = row_to_command(raw).unwrap();
    assert_eq!(command.id, id);
    assert_eq!(command.status, CommandStatus::Executing);
    assert_eq!(command.text, "undo");
}

#[test]
fn row_rejects_unknown_status() {
    let err = row_to_command(row("paused")).unwrap_err();
    assert!(matches!(err, StoreError::Database(sqlx::Error::Decode(_))));
    assert!(err.to_string().contains("paused"));
}
