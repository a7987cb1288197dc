//! Cursor positioning over plain and duplicate-key tables.

mod common;

use common::{create_table, fill, int_table, open_env};
use tablekv::prelude::*;

fn dup_table(env: &Environment) -> StoreResult<Table> {
    let table = create_table(env, "dups", &[TableFlag::DupSort])?;
    let txn = env.begin_write()?;
    for (key, value) in [("a", "1"), ("b", "1"), ("b", "2"), ("b", "3"), ("c", "1")] {
        txn.put(table, key, value, PutFlags::empty())?;
    }
    txn.commit()?;
    Ok(table)
}

fn pair(key: &str, value: &str) -> Option<(String, String)> {
    Some((key.to_string(), value.to_string()))
}

#[test]
fn walks_forward_and_backward() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = int_table(&env, "nums", &[(10, "ten"), (2, "two"), (300, "three hundred")])?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<u32, String>(table)?;
    assert!(!cursor.is_positioned());

    let mut keys = Vec::new();
    while let Some((key, _)) = cursor.get(CursorOp::Next)? {
        keys.push(key);
    }
    assert_eq!(keys, vec![2, 10, 300]);

    // A failed step keeps the last position.
    assert!(cursor.is_positioned());
    assert_eq!(cursor.get(CursorOp::GetCurrent)?, Some((300, "three hundred".to_string())));

    assert_eq!(cursor.get(CursorOp::Prev)?.map(|(k, _)| k), Some(10));
    assert_eq!(cursor.get(CursorOp::First)?.map(|(k, _)| k), Some(2));
    assert_eq!(cursor.get(CursorOp::Prev)?, None);
    assert_eq!(cursor.get(CursorOp::Last)?.map(|(k, _)| k), Some(300));
    Ok(())
}

#[test]
fn prev_without_position_starts_at_the_end() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = int_table(&env, "nums", &[(1, "a"), (2, "b")])?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<u32, String>(table)?;
    assert_eq!(cursor.get(CursorOp::Prev)?.map(|(k, _)| k), Some(2));
    Ok(())
}

#[test]
fn empty_table_yields_nothing() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = create_table(&env, "empty", &[])?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    assert_eq!(cursor.get(CursorOp::First)?, None);
    assert_eq!(cursor.get(CursorOp::Next)?, None);
    assert!(!cursor.is_positioned());
    Ok(())
}

#[test]
fn exact_and_range_seeks() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = int_table(&env, "nums", &[(1, "a"), (5, "e"), (9, "i")])?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<u32, String>(table)?;

    assert_eq!(cursor.seek(CursorOp::Set, &5)?, Some((5, "e".to_string())));
    assert_eq!(cursor.seek(CursorOp::SetKey, &9)?.map(|(k, _)| k), Some(9));
    assert_eq!(cursor.seek(CursorOp::SetRange, &6)?.map(|(k, _)| k), Some(9));

    // A missed seek leaves the cursor unpositioned.
    assert_eq!(cursor.seek(CursorOp::Set, &4)?, None);
    assert!(!cursor.is_positioned());
    assert_eq!(cursor.seek(CursorOp::SetRange, &10)?, None);

    assert_eq!(cursor.seek(CursorOp::SetRange, &0)?.map(|(k, _)| k), Some(1));
    assert_eq!(cursor.get(CursorOp::Next)?.map(|(k, _)| k), Some(5));
    Ok(())
}

#[test]
fn misused_operations_are_rejected() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = int_table(&env, "nums", &[(1, "a")])?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<u32, String>(table)?;
    let err = cursor.get(CursorOp::SetRange).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    let err = cursor.seek(CursorOp::Next, &1).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    assert!(cursor.count().is_err());
    Ok(())
}

#[test]
fn duplicate_navigation() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = dup_table(&env)?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;

    assert_eq!(cursor.seek(CursorOp::Set, &"b".to_string())?, pair("b", "1"));
    assert_eq!(cursor.count()?, 3);
    assert_eq!(cursor.get(CursorOp::NextDup)?, pair("b", "2"));
    assert_eq!(cursor.get(CursorOp::LastDup)?, pair("b", "3"));
    // No further duplicate; the cursor stays put.
    assert_eq!(cursor.get(CursorOp::NextDup)?, None);
    assert_eq!(cursor.get(CursorOp::GetCurrent)?, pair("b", "3"));
    assert_eq!(cursor.get(CursorOp::PrevDup)?, pair("b", "2"));
    assert_eq!(cursor.get(CursorOp::FirstDup)?, pair("b", "1"));
    assert_eq!(cursor.get(CursorOp::PrevDup)?, None);

    assert_eq!(cursor.get(CursorOp::NextNoDup)?, pair("c", "1"));
    assert_eq!(cursor.get(CursorOp::PrevNoDup)?, pair("b", "3"));
    assert_eq!(cursor.get(CursorOp::PrevNoDup)?, pair("a", "1"));
    assert_eq!(cursor.count()?, 1);
    Ok(())
}

#[test]
fn next_visits_every_duplicate() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = dup_table(&env)?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    let mut seen = Vec::new();
    while let Some((key, value)) = cursor.get(CursorOp::Next)? {
        seen.push(format!("{key}{value}"));
    }
    assert_eq!(seen, ["a1", "b1", "b2", "b3", "c1"]);

    let mut backwards = Vec::new();
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    while let Some((key, value)) = cursor.get(CursorOp::Prev)? {
        backwards.push(format!("{key}{value}"));
    }
    assert_eq!(backwards, ["c1", "b3", "b2", "b1", "a1"]);
    Ok(())
}

#[test]
fn pair_seeks() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = dup_table(&env)?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    let b = "b".to_string();

    assert_eq!(cursor.seek_both(CursorOp::GetBoth, &b, &"2".to_string())?, pair("b", "2"));
    assert_eq!(cursor.seek_both(CursorOp::GetBoth, &b, &"9".to_string())?, None);
    assert!(!cursor.is_positioned());

    assert_eq!(cursor.seek_both(CursorOp::GetBothRange, &b, &"25".to_string())?, pair("b", "3"));
    assert_eq!(cursor.seek_both(CursorOp::GetBothRange, &b, &"4".to_string())?, None);

    let err = cursor.seek_both(CursorOp::Set, &b, &"1".to_string()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn try_clone_copies_the_exact_position() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = dup_table(&env)?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    let unpositioned = cursor.try_clone()?;
    assert!(!unpositioned.is_positioned());

    cursor.seek_both(CursorOp::GetBoth, &"b".to_string(), &"2".to_string())?;
    let mut copy = cursor.try_clone()?;
    assert_eq!(copy.get(CursorOp::GetCurrent)?, pair("b", "2"));

    // The copy moves independently of its source.
    assert_eq!(copy.get(CursorOp::Next)?, pair("b", "3"));
    assert_eq!(cursor.get(CursorOp::GetCurrent)?, pair("b", "2"));
    Ok(())
}

#[test]
fn write_cursors_see_uncommitted_changes() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = int_table(&env, "nums", &[(1, "a"), (3, "c")])?;

    let txn = env.begin_write()?;
    let mut cursor = txn.open_cursor::<u32, String>(table)?;
    assert_eq!(cursor.get(CursorOp::First)?.map(|(k, _)| k), Some(1));

    // Writes between steps are visible to the next step.
    txn.put(table, &2u32, "b", PutFlags::empty())?;
    assert_eq!(cursor.get(CursorOp::Next)?, Some((2, "b".to_string())));

    txn.delete(table, &3u32)?;
    assert_eq!(cursor.get(CursorOp::Next)?, None);
    Ok(())
}

#[test]
fn duplicate_walks_see_writes_between_steps() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = dup_table(&env)?;

    let txn = env.begin_write()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    assert_eq!(cursor.seek(CursorOp::Set, &"b".to_string())?, pair("b", "1"));

    txn.put(table, "b", "15", PutFlags::empty())?;
    assert_eq!(cursor.get(CursorOp::NextDup)?, pair("b", "15"));
    txn.delete_pair(table, "b", "2")?;
    assert_eq!(cursor.get(CursorOp::NextDup)?, pair("b", "3"));
    assert_eq!(cursor.count()?, 3);

    txn.delete(table, "b")?;
    assert_eq!(cursor.get(CursorOp::GetCurrent)?, None);
    assert_eq!(cursor.get(CursorOp::Next)?, pair("c", "1"));
    Ok(())
}

#[test]
fn long_duplicate_groups_walk_both_ways() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = create_table(&env, "series", &[TableFlag::DupSort, TableFlag::IntegerDup])?;
    let txn = env.begin_write()?;
    for reading in (0..2_000u32).rev() {
        txn.put(table, "sensor", &reading, PutFlags::empty())?;
    }
    txn.put(table, "tail", &0u32, PutFlags::empty())?;
    txn.commit()?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, u32>(table)?;
    let (_, first) = cursor
        .seek(CursorOp::Set, &"sensor".to_string())?
        .ok_or(StoreError::NotFound)?;
    let mut readings = vec![first];
    while let Some((_, reading)) = cursor.get(CursorOp::NextDup)? {
        readings.push(reading);
    }
    assert_eq!(readings, (0..2_000).collect::<Vec<u32>>());
    assert_eq!(cursor.get(CursorOp::Next)?, Some(("tail".to_string(), 0)));

    assert_eq!(cursor.get(CursorOp::Prev)?, Some(("sensor".to_string(), 1_999)));
    let mut steps = 0;
    while cursor.get(CursorOp::PrevDup)?.is_some() {
        steps += 1;
    }
    assert_eq!(steps, 1_999);
    assert_eq!(cursor.get(CursorOp::GetCurrent)?, Some(("sensor".to_string(), 0)));
    Ok(())
}

#[test]
fn reverse_keys_order_from_the_last_byte() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = create_table(&env, "rev", &[TableFlag::ReverseKey])?;
    let txn = env.begin_write()?;
    for key in ["ab", "ba", "ca"] {
        txn.put(table, key, "", PutFlags::empty())?;
    }
    txn.commit()?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, String>(table)?;
    let mut keys = Vec::new();
    while let Some((key, _)) = cursor.get(CursorOp::Next)? {
        keys.push(key);
    }
    assert_eq!(keys, ["ba", "ca", "ab"]);
    Ok(())
}

#[test]
fn integer_duplicates_order_numerically() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = create_table(&env, "scores", &[TableFlag::DupSort, TableFlag::IntegerDup])?;
    let txn = env.begin_write()?;
    for score in [256u32, 1, 17] {
        txn.put(table, "player", &score, PutFlags::empty())?;
    }
    txn.commit()?;

    let txn = env.begin_read()?;
    let mut cursor = txn.open_cursor::<String, u32>(table)?;
    let mut scores = Vec::new();
    while let Some((_, score)) = cursor.get(CursorOp::Next)? {
        scores.push(score);
    }
    assert_eq!(scores, [1, 17, 256]);
    Ok(())
}

#[test]
fn cursors_cannot_open_on_a_reset_transaction() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let table = create_table(&env, "kv", &[])?;
    fill(&env, table, &[(1, "a")])?;

    let mut txn = env.begin_read()?;
    txn.reset()?;
    let err = txn.open_cursor::<u32, String>(table).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    Ok(())
}
