//! MySQL integration tests.
//!
//! Run only when `SQUALL_MYSQL_DESCRIPTOR` holds a TOML connection
//! descriptor, e.g. `scheme = "mysql"\nhost = "127.0.0.1"\nusername = "root"\ndatabase = "squall_test"`.

mod common;

use common::{data, id, text, title};
use pretty_assertions::assert_eq;
use squall::database::{Connection, ConnectionDescriptor};
use squall::expr::{Expr, Insert, Select};
use squall::value::Value;
use squall::variables::{Variable, VariableKind};

async fn connect() -> Option<Connection> {
    let raw = std::env::var("SQUALL_MYSQL_DESCRIPTOR").ok()?;
    let descriptor: ConnectionDescriptor = toml::from_str(&raw).unwrap();
    let database = squall::create_database(&descriptor).unwrap();
    let mut connection = Connection::open(database).await.unwrap();
    connection
        .execute_no_result("DROP TABLE IF EXISTS test")
        .await
        .unwrap();
    connection
        .execute_no_result(
            "CREATE TABLE test (id INT PRIMARY KEY AUTO_INCREMENT, title VARCHAR(50), data BLOB) ENGINE=InnoDB",
        )
        .await
        .unwrap();
    connection.commit().await.unwrap();
    Some(connection)
}

#[tokio::test]
async fn test_insert_identity_and_text_columns() {
    let Some(mut connection) = connect().await else {
        return;
    };

    let insert = Insert::new()
        .value(title(), "Title 30")
        .primary_key(vec![id()], vec![Variable::new(VariableKind::Int)]);
    let generated = {
        let result = connection.execute(insert).await.unwrap();
        result.primary_variables()[0].get(false)
    };
    let Some(Value::Int(generated)) = generated else {
        panic!("no identity recovered: {generated:?}");
    };

    let select = Select::new(vec![title().into()]).where_(Expr::from(id()).eq(generated));
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(result.get_one().unwrap(), Some(vec![text("Title 30")]));
    drop(result);
    connection.rollback().await.unwrap();
}

#[tokio::test]
async fn test_bytes_round_trip() {
    let Some(mut connection) = connect().await else {
        return;
    };
    let original = vec![0xff, 0x00, 0xff, 0x00];

    let insert = Insert::new().value(id(), 1).value(
        data(),
        Variable::with_value(VariableKind::Bytes, original.clone()).unwrap(),
    );
    connection.execute_no_result(insert).await.unwrap();

    let select = Select::new(vec![data().into()]).where_(Expr::from(id()).eq(1));
    let mut result = connection.execute(select).await.unwrap();
    let row = result.get_one().unwrap().unwrap();
    let mut variable = Variable::new(VariableKind::Bytes);
    result.set_variable(&mut variable, row[0].clone()).unwrap();
    assert_eq!(variable.get(false), Some(Value::Bytes(original)));
}

#[tokio::test]
async fn test_offset_without_limit() {
    let Some(mut connection) = connect().await else {
        return;
    };
    for n in 1..=3 {
        connection
            .execute_no_result(Insert::new().value(id(), n).value(title(), format!("Title {n}")))
            .await
            .unwrap();
    }
    let select = Select::new(vec![id().into()])
        .order_by(Expr::from(id()))
        .offset(1);
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(
        result.get_all().unwrap(),
        vec![vec![Value::Int(2)], vec![Value::Int(3)]]
    );
}
