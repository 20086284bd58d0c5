use std::sync::Arc;

use sql_statement_core::prelude::*;
use sql_statement_core::test_utils::{DriverEvent, DriverScript, EventLog, ScriptedConnection};

fn handle_with(script: DriverScript) -> (Handle, EventLog) {
    let conn = ScriptedConnection::new(script);
    let log = conn.log();
    (
        Handle::new(Box::new(conn), Arc::new(ConfigRegistry::new())),
        log,
    )
}

fn user_rows() -> DriverScript {
    DriverScript::default().with_rows(
        &["id", "name"],
        vec![
            vec![RowValues::Int(1), RowValues::Text("alice".into())],
            vec![RowValues::Int(2), RowValues::Text("bob".into())],
        ],
    )
}

#[test]
fn query_reads_rows_and_releases_statement_and_cursor_once() {
    let (handle, log) = handle_with(user_rows());

    let rows = handle
        .create_query("select id, name from users where id > ?1")
        .bind(0, 0_i64)
        .with_customizer(FetchSize(10))
        .and_then(Query::execute)
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows.results[1].get("name").and_then(RowValues::as_text), Some("bob"));
    assert_eq!(
        log.snapshot(),
        vec![
            DriverEvent::Prepared("select id, name from users where id > ?1".into()),
            DriverEvent::Bound(0, RowValues::Int(0)),
            DriverEvent::FetchSize(10),
            DriverEvent::ExecutedQuery("select id, name from users where id > ?1".into()),
            DriverEvent::RowFetched,
            DriverEvent::RowFetched,
            DriverEvent::StatementClosed("select id, name from users where id > ?1".into()),
            DriverEvent::CursorClosed,
        ]
    );
}

#[test]
fn fetch_failure_still_closes_cursor() {
    let (handle, log) = handle_with(DriverScript {
        fail_fetch_at: Some(1),
        ..user_rows()
    });

    let err = handle.create_query("select * from users").execute().unwrap_err();
    match err {
        StatementError::Execution { message, source, .. } => {
            assert_eq!(message, "unable to fetch row");
            assert_eq!(source.map(|s| s.message).as_deref(), Some("fetch failed"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert_eq!(log.count(|e| *e == DriverEvent::CursorClosed), 1);
    assert_eq!(log.count(|e| matches!(e, DriverEvent::StatementClosed(_))), 1);
}

#[test]
fn execution_failure_wins_over_cleanup_failure() {
    let (handle, log) = handle_with(DriverScript {
        fail_execute: true,
        fail_statement_close: true,
        ..DriverScript::default()
    });

    let err = handle.create_update("update t set a = 1").execute().unwrap_err();
    assert!(matches!(err, StatementError::Execution { .. }));
    match err.suppressed() {
        Some(StatementError::Cleanup { source, .. }) => {
            assert_eq!(source.message, "statement close failed");
        }
        other => panic!("expected suppressed cleanup error, got {other:?}"),
    }
    assert_eq!(log.count(|e| matches!(e, DriverEvent::StatementClosed(_))), 1);
}

struct RejectAfterRun;

impl StatementCustomizer for RejectAfterRun {
    fn after_execution(
        &self,
        _stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        Err(CustomizerError::Other("result rejected".into()))
    }
}

#[test]
fn failing_after_hook_still_closes_cursor() {
    let (handle, log) = handle_with(user_rows());

    let err = handle
        .create_query("select id from t")
        .with_customizer(RejectAfterRun)
        .and_then(Query::execute)
        .unwrap_err();

    assert!(matches!(err, StatementError::Customization { .. }));
    assert_eq!(log.count(|e| *e == DriverEvent::CursorClosed), 1);
    assert_eq!(log.count(|e| matches!(e, DriverEvent::StatementClosed(_))), 1);
    assert_eq!(log.count(|e| *e == DriverEvent::RowFetched), 0);
}

#[test]
fn extreme_bind_position_is_passed_to_the_driver() {
    let (handle, log) = handle_with(DriverScript::default().with_update_count(1));

    let count = handle
        .create_update("update t set a = ?")
        .bind(usize::MAX, RowValues::Null)
        .execute()
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(log.count(|e| *e == DriverEvent::Bound(usize::MAX, RowValues::Null)), 1);
}

#[test]
fn cleanup_failure_surfaces_when_execution_succeeded() {
    let (handle, log) = handle_with(DriverScript {
        fail_statement_close: true,
        ..user_rows()
    });

    let err = handle.create_query("select * from users").execute().unwrap_err();
    match err {
        StatementError::Cleanup { source, suppressed } => {
            assert_eq!(source.message, "statement close failed");
            assert_eq!(suppressed, 0);
        }
        other => panic!("expected cleanup error, got {other:?}"),
    }
    // the cursor registered after the failing entry is still released
    assert_eq!(log.count(|e| *e == DriverEvent::CursorClosed), 1);
}

#[test]
fn dropped_statement_never_touches_the_driver() {
    let (handle, log) = handle_with(user_rows());
    {
        let _query = handle.create_query("select 1").bind(0, "unused");
    }
    assert!(log.snapshot().is_empty());
}

#[test]
fn timing_is_recorded_on_the_context() {
    let registry = Arc::new(ConfigRegistry::new());
    let mut stmt = BaseStatement::new(
        Arc::clone(&registry),
        ExecutionContext::new(registry).with_raw_sql("update t"),
    );
    let log = EventLog::default();
    let mut raw =
        sql_statement_core::test_utils::ScriptedStatement::new("update t", DriverScript::default(), log);

    stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap();
    assert_eq!(stmt.state(), StatementState::Executing);
    assert!(stmt.context().elapsed().is_some());
    stmt.close().unwrap();
}
