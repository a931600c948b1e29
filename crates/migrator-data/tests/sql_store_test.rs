//! SqlStore 통합 테스트 (메모리 SQLite)

use migrator_core::{Dialect, Statement, Store, TableSpec, Value};
use migrator_data::{connect_store, DatabaseConfig, SqlStore};

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

async fn setup_store() -> SqlStore {
    let store = connect_store(&DatabaseConfig::in_memory_sqlite())
        .await
        .expect("sqlite 연결");
    store
        .exec(&Statement::new(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, balance REAL, utime INTEGER NOT NULL)",
        ))
        .await
        .expect("테이블 생성");
    store
}

fn insert(id: i64, name: &str, balance: f64, utime: i64) -> Statement {
    Statement::new("INSERT INTO accounts (id, name, balance, utime) VALUES (?1, ?2, ?3, ?4)")
        .bind(id)
        .bind(name)
        .bind(balance)
        .bind(utime)
}

// ============================================================================
// 테스트
// ============================================================================

#[tokio::test]
async fn test_exec_and_query_roundtrip() {
    let store = setup_store().await;
    assert_eq!(store.dialect(), Dialect::Sqlite);

    let result = store.exec(&insert(1, "alice", 10.5, 100)).await.unwrap();
    assert_eq!(result.rows_affected, 1);
    store.exec(&insert(2, "bob", 0.0, 200)).await.unwrap();

    let rows = store
        .query(&Statement::new("SELECT * FROM accounts ORDER BY id"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns(), &["id", "name", "balance", "utime"]);
    assert_eq!(rows[0].get("name"), Some(&Value::Text("alice".into())));
    assert_eq!(rows[0].get("balance"), Some(&Value::Float(10.5)));
    assert_eq!(rows[1].get_i64("utime").unwrap(), 200);
}

#[tokio::test]
async fn test_query_row_not_found_is_none() {
    let store = setup_store().await;
    let table = TableSpec::new("accounts").unwrap();

    let row = store
        .query_row(&table.select_by_id(Dialect::Sqlite, 42))
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_null_values_decode() {
    let store = setup_store().await;
    store
        .exec(
            &Statement::new("INSERT INTO accounts (id, name, balance, utime) VALUES (?1, ?2, ?3, ?4)")
                .bind(1i64)
                .bind(Value::Null)
                .bind(Value::Null)
                .bind(5i64),
        )
        .await
        .unwrap();

    let row = store
        .query_row(&TableSpec::new("accounts").unwrap().select_by_id(Dialect::Sqlite, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("name"), Some(&Value::Null));
    assert_eq!(row.get("balance"), Some(&Value::Null));
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let store = setup_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.exec(&insert(1, "alice", 1.0, 1)).await.unwrap();
    let inside = tx
        .query(&Statement::new("SELECT id FROM accounts"))
        .await
        .unwrap();
    assert_eq!(inside.len(), 1);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.exec(&insert(2, "bob", 1.0, 1)).await.unwrap();
    tx.rollback().await.unwrap();

    let rows = store
        .query(&Statement::new("SELECT id FROM accounts"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64("id").unwrap(), 1);
}

#[tokio::test]
async fn test_columns_without_rows() {
    let store = setup_store().await;
    let columns = store.columns("SELECT * FROM accounts").await.unwrap();
    assert_eq!(columns, vec!["id", "name", "balance", "utime"]);
}

#[tokio::test]
async fn test_prepared_statement() {
    let store = setup_store().await;
    let prepared = store
        .prepare("INSERT INTO accounts (id, name, balance, utime) VALUES (?1, ?2, ?3, ?4)")
        .await
        .unwrap();

    prepared
        .exec(&[
            Value::Int(9),
            Value::Text("carol".into()),
            Value::Float(3.0),
            Value::Int(9),
        ])
        .await
        .unwrap();

    let rows = store
        .query(&Statement::new("SELECT name FROM accounts WHERE id = 9"))
        .await
        .unwrap();
    assert_eq!(rows[0].get_string("name").unwrap(), Some("carol".into()));
    assert!(store.prepare("SELEC nonsense").await.is_err());
}

#[tokio::test]
async fn test_upsert_overwrites_existing_row() {
    let store = setup_store().await;
    let table = TableSpec::new("accounts").unwrap();
    store.exec(&insert(1, "alice", 1.0, 1)).await.unwrap();

    let columns = store.columns(&table.select_all_sql()).await.unwrap();
    let mut source = store
        .query_row(&table.select_by_id(Dialect::Sqlite, 1))
        .await
        .unwrap()
        .unwrap();
    // 다른 값을 가진 행으로 덮어쓰기
    source = migrator_core::Row::new(
        source.columns().to_vec().into(),
        vec![
            Value::Int(1),
            Value::Text("alice2".into()),
            Value::Float(2.0),
            Value::Int(2),
        ],
    )
    .unwrap();

    let stmt = table.upsert(Dialect::Sqlite, &source, &columns).unwrap();
    store.exec(&stmt).await.unwrap();
    store.exec(&stmt).await.unwrap();

    let row = store
        .query_row(&table.select_by_id(Dialect::Sqlite, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row, source);
}

#[tokio::test]
async fn test_server_errors_are_not_retryable() {
    let store = setup_store().await;
    store.exec(&insert(1, "alice", 1.0, 100)).await.unwrap();

    // 기본 키 중복
    let duplicate = store.exec(&insert(1, "again", 2.0, 200)).await.unwrap_err();
    assert!(!duplicate.is_retryable(), "{}", duplicate);

    // 문법 오류
    let syntax = store
        .query(&Statement::new("SELEC id FROM accounts"))
        .await
        .unwrap_err();
    assert!(!syntax.is_retryable(), "{}", syntax);
}
