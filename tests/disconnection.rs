//! Connection behaviour when the server goes away.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use squall::database::{Connection, ConnectionConfig, ConnectionState, Database, RawStatement};
use squall::error::SquallError;
use squall::value::Value;
use std::sync::Arc;

async fn setup(db: &TempDb) -> (FlakyDatabase, Connection) {
    let flaky = FlakyDatabase::new(db);
    let database: Arc<dyn Database> = Arc::new(flaky.clone());
    let mut connection = Connection::open(database).await.unwrap();
    connection.execute_no_result(CREATE_TEST_TABLE).await.unwrap();
    connection
        .execute_no_result("INSERT INTO test (id, title) VALUES (10, 'Title 10')")
        .await
        .unwrap();
    connection.commit().await.unwrap();
    (flaky, connection)
}

async fn titles(connection: &mut Connection) -> Result<Vec<Value>, SquallError> {
    let mut result = connection.execute("SELECT title FROM test ORDER BY id").await?;
    Ok(result.get_all()?.into_iter().flatten().collect())
}

#[tokio::test]
async fn test_disconnect_during_transaction_needs_rollback() {
    let db = TempDb::new("lost-tx");
    let (flaky, mut connection) = setup(&db).await;

    connection
        .execute_no_result("INSERT INTO test (id, title) VALUES (20, 'Title 20')")
        .await
        .unwrap();
    flaky.restart();

    let err = connection.execute_no_result("SELECT 1").await.unwrap_err();
    assert!(err.is_disconnection(), "{err:?}");
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let err = connection.execute_no_result("SELECT 1").await.unwrap_err();
    assert!(err.is_disconnection(), "{err:?}");

    connection.rollback().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Open);
    assert_eq!(titles(&mut connection).await.unwrap(), vec![text("Title 10")]);
}

#[tokio::test]
async fn test_commit_after_disconnect_always_fails() {
    let db = TempDb::new("commit-lost");
    let (flaky, mut connection) = setup(&db).await;

    connection
        .execute_no_result("INSERT INTO test (id, title) VALUES (20, 'Title 20')")
        .await
        .unwrap();
    flaky.restart();
    assert!(connection.execute_no_result("SELECT 1").await.unwrap_err().is_disconnection());

    for _ in 0..2 {
        let err = connection.commit().await.unwrap_err();
        assert!(err.is_disconnection(), "{err:?}");
    }

    connection.rollback().await.unwrap();
    connection.commit().await.unwrap();
    assert_eq!(titles(&mut connection).await.unwrap(), vec![text("Title 10")]);
}

#[tokio::test]
async fn test_disconnect_detected_by_commit() {
    let db = TempDb::new("commit-detects");
    let (flaky, mut connection) = setup(&db).await;

    connection
        .execute_no_result("INSERT INTO test (id, title) VALUES (20, 'Title 20')")
        .await
        .unwrap();
    flaky.restart();

    assert!(connection.commit().await.unwrap_err().is_disconnection());
    assert!(connection.execute_no_result("SELECT 1").await.unwrap_err().is_disconnection());
    connection.rollback().await.unwrap();
    assert_eq!(titles(&mut connection).await.unwrap(), vec![text("Title 10")]);
}

#[tokio::test]
async fn test_disconnect_outside_transaction_reconnects_on_execute() {
    let db = TempDb::new("idle");
    let (flaky, mut connection) = setup(&db).await;
    flaky.restart();

    let err = titles(&mut connection).await.unwrap_err();
    assert!(err.is_disconnection(), "{err:?}");
    assert_eq!(titles(&mut connection).await.unwrap(), vec![text("Title 10")]);
}

#[tokio::test]
async fn test_autocommit_disconnect_reconnects_on_execute() {
    let db = TempDb::new("autocommit");
    let (flaky, _) = setup(&db).await;
    let database: Arc<dyn Database> = Arc::new(flaky.clone());
    let config = ConnectionConfig::new(database.as_ref()).autocommit(true);
    let mut connection = Connection::open_with(database, config).await.unwrap();

    connection
        .execute_no_result(RawStatement::new("INSERT INTO test (id, title) VALUES (?, ?)").bind(20).bind("Title 20"))
        .await
        .unwrap();
    flaky.restart();
    assert!(titles(&mut connection).await.unwrap_err().is_disconnection());
    assert_eq!(
        titles(&mut connection).await.unwrap(),
        vec![text("Title 10"), text("Title 20")]
    );
}

#[tokio::test]
async fn test_rollback_tolerates_a_stopped_server() {
    let db = TempDb::new("stopped");
    let (flaky, mut connection) = setup(&db).await;

    connection.execute_no_result("SELECT 1").await.unwrap();
    flaky.stop();

    // Rollback itself sees the dead link and treats the transaction as gone.
    connection.rollback().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    // Reconnects are refused while the server is down.
    assert!(titles(&mut connection).await.unwrap_err().is_disconnection());
    connection.rollback().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    flaky.start();
    assert_eq!(titles(&mut connection).await.unwrap(), vec![text("Title 10")]);
}

#[tokio::test]
async fn test_ordinary_errors_keep_the_link() {
    let db = TempDb::new("ordinary");
    let (_flaky, mut connection) = setup(&db).await;

    let err = connection
        .execute_no_result("SELECT * FROM missing_table")
        .await
        .unwrap_err();
    assert!(matches!(err, SquallError::Operational { .. }), "{err:?}");
    assert_eq!(connection.state(), ConnectionState::InTransaction);
    connection.rollback().await.unwrap();
}
