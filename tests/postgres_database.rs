//! PostgreSQL integration tests.
//!
//! Run only when `SQUALL_POSTGRES_DESCRIPTOR` holds a TOML connection
//! descriptor, e.g. `scheme = "postgres"\nhost = "127.0.0.1"\nusername = "postgres"\ndatabase = "squall_test"`.

mod common;

use common::{data, id, text, title};
use pretty_assertions::assert_eq;
use squall::database::{Connection, ConnectionDescriptor, RawStatement};
use squall::expr::{Column, Expr, Insert, Select};
use squall::value::Value;
use squall::variables::{Variable, VariableKind};

async fn connect() -> Option<Connection> {
    let raw = std::env::var("SQUALL_POSTGRES_DESCRIPTOR").ok()?;
    let descriptor: ConnectionDescriptor = toml::from_str(&raw).unwrap();
    let database = squall::create_database(&descriptor).unwrap();
    let mut connection = Connection::open(database).await.unwrap();
    connection
        .execute_no_result("DROP TABLE IF EXISTS test")
        .await
        .unwrap();
    connection
        .execute_no_result(
            "CREATE TABLE test (id SERIAL PRIMARY KEY, title VARCHAR(50), data BYTEA, tags TEXT[])",
        )
        .await
        .unwrap();
    connection.commit().await.unwrap();
    Some(connection)
}

#[tokio::test]
async fn test_insert_identity_through_returning() {
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
    assert_eq!(generated, Some(Value::Int(1)));

    let select = Select::new(vec![title().into()]).where_(Expr::from(id()).eq(1));
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(result.get_one().unwrap(), Some(vec![text("Title 30")]));
}

#[tokio::test]
async fn test_bytes_and_typed_nulls() {
    let Some(mut connection) = connect().await else {
        return;
    };
    let original = vec![0xff, 0x00, 0xff, 0x00];

    connection
        .execute_no_result(
            Insert::new()
                .value(id(), 7)
                .value(data(), Variable::with_value(VariableKind::Bytes, original.clone()).unwrap()),
        )
        .await
        .unwrap();
    connection
        .execute_no_result(
            RawStatement::new("UPDATE test SET title = ? WHERE id = ?")
                .bind_variable(Variable::with_value(VariableKind::Text, Value::Null).unwrap())
                .bind(7),
        )
        .await
        .unwrap();

    let select = Select::new(vec![data().into(), title().into()]).where_(Expr::from(id()).eq(7));
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(
        result.get_one().unwrap(),
        Some(vec![Value::Bytes(original), Value::Null])
    );
}

#[tokio::test]
async fn test_empty_select_reports_columns() {
    let Some(mut connection) = connect().await else {
        return;
    };
    let mut result = connection
        .execute("SELECT id, title FROM test WHERE id = -1")
        .await
        .unwrap();
    let names: Vec<&str> = result.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "title"]);
    assert_eq!(result.get_one().unwrap(), None);
}

#[tokio::test]
async fn test_list_parameters_and_arrays() {
    let Some(mut connection) = connect().await else {
        return;
    };
    let tags = Column::qualified("test", "tags");
    let list = Variable::with_value(
        VariableKind::List(Box::new(VariableKind::Text)),
        Value::List(vec![text("meeting"), text("lunch")]),
    )
    .unwrap();

    connection
        .execute_no_result(Insert::new().value(id(), 3).value(tags.clone(), list))
        .await
        .unwrap();

    let select = Select::new(vec![tags.clone().into()]).where_(Expr::from(id()).eq(3));
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(
        result.get_one().unwrap(),
        Some(vec![Value::List(vec![text("meeting"), text("lunch")])])
    );
    drop(result);

    let empty = Variable::with_value(
        VariableKind::List(Box::new(VariableKind::Text)),
        Value::List(vec![]),
    )
    .unwrap();
    connection
        .execute_no_result(Insert::new().value(id(), 4).value(tags.clone(), empty))
        .await
        .unwrap();
    let select = Select::new(vec![tags.clone().into()]).where_(Expr::from(id()).eq(4));
    let mut result = connection.execute(select).await.unwrap();
    assert_eq!(result.get_one().unwrap(), Some(vec![Value::List(vec![])]));
    drop(result);

    let mut result = connection
        .execute("SELECT ARRAY[ARRAY['a','b'],ARRAY['c',NULL]]::text")
        .await
        .unwrap();
    let row = result.get_one().unwrap().unwrap();
    let mut nested = Variable::new(VariableKind::List(Box::new(VariableKind::List(Box::new(
        VariableKind::Text,
    )))));
    result.set_variable(&mut nested, row[0].clone()).unwrap();
    assert_eq!(
        nested.get(false),
        Some(Value::List(vec![
            Value::List(vec![text("a"), text("b")]),
            Value::List(vec![text("c"), Value::Null]),
        ]))
    );
}
