use std::path::PathBuf;

use tempfile::TempDir;

use wrendb::error::DbError;
use wrendb::storage::row::Row;
use wrendb::storage::table::Table;

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.db")
}

fn sample_row(id: u32) -> Row {
    Row::new(id, &format!("user{id}"), &format!("person{id}@example.com"))
}

#[test]
fn insert_then_select_returns_the_row() {
    let dir = TempDir::new().unwrap();
    let mut table = Table::open(db_path(&dir)).unwrap();

    table.insert(&sample_row(1)).unwrap();

    let rows = table.select().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id(), 1);
    assert_eq!(rows[0].username(), "user1");
    assert_eq!(rows[0].email(), "person1@example.com");
}

#[test]
fn empty_table_selects_nothing() {
    let dir = TempDir::new().unwrap();
    let mut table = Table::open(db_path(&dir)).unwrap();
    assert!(table.select().unwrap().is_empty());
}

#[test]
fn rows_come_back_in_key_order() {
    let dir = TempDir::new().unwrap();
    let mut table = Table::open(db_path(&dir)).unwrap();

    for id in [5, 1, 9, 3, 7, 2, 8, 4, 6] {
        table.insert(&sample_row(id)).unwrap();
    }

    let ids: Vec<u32> = table.select().unwrap().iter().map(Row::id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn duplicate_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut table = Table::open(db_path(&dir)).unwrap();

    table.insert(&sample_row(1)).unwrap();
    assert!(matches!(
        table.insert(&sample_row(1)),
        Err(DbError::DuplicateKey(1))
    ));

    // The reject left the table untouched.
    assert_eq!(table.select().unwrap().len(), 1);
}

#[test]
fn data_survives_reopening_the_file() {
    let dir = TempDir::new().unwrap();

    {
        let mut table = Table::open(db_path(&dir)).unwrap();
        for id in 1..=20 {
            table.insert(&sample_row(id)).unwrap();
        }
        table.close().unwrap();
    }

    let mut table = Table::open(db_path(&dir)).unwrap();
    let rows = table.select().unwrap();
    assert_eq!(rows.len(), 20);
    for (row, id) in rows.iter().zip(1..) {
        assert_eq!(row.id(), id);
        assert_eq!(row.username(), format!("user{id}"));
        assert_eq!(row.email(), format!("person{id}@example.com"));
    }
}

#[test]
fn unflushed_writes_do_not_survive() {
    let dir = TempDir::new().unwrap();

    {
        let mut table = Table::open(db_path(&dir)).unwrap();
        table.insert(&sample_row(1)).unwrap();
        // Dropped without close: nothing reaches the disk.
    }

    let mut table = Table::open(db_path(&dir)).unwrap();
    assert!(table.select().unwrap().is_empty());
}

#[test]
fn multi_leaf_scan_returns_every_row() {
    let dir = TempDir::new().unwrap();
    let mut table = Table::open(db_path(&dir)).unwrap();

    // Descending insert order exercises shifting on every insert and
    // spreads the rows over several leaves.
    for id in (1..=50).rev() {
        table.insert(&sample_row(id)).unwrap();
    }

    let ids: Vec<u32> = table.select().unwrap().iter().map(Row::id).collect();
    assert_eq!(ids, (1..=50).collect::<Vec<u32>>());
}

#[test]
fn multi_leaf_table_survives_reopening() {
    let dir = TempDir::new().unwrap();

    {
        let mut table = Table::open(db_path(&dir)).unwrap();
        for id in 1..=100 {
            table.insert(&sample_row(id)).unwrap();
        }
        table.close().unwrap();
    }

    let mut table = Table::open(db_path(&dir)).unwrap();
    let ids: Vec<u32> = table.select().unwrap().iter().map(Row::id).collect();
    assert_eq!(ids, (1..=100).collect::<Vec<u32>>());
}
