//! Merged traversal over several tables.

mod common;

use common::{create_table, int_table, open_env};
use tablekv::prelude::*;

/// A = {1: "x", 3: "y"}, B = {2: "z", 3: "w"}
fn two_tables(env: &Environment) -> StoreResult<[Table; 2]> {
    let a = int_table(env, "a", &[(1, "x"), (3, "y")])?;
    let b = int_table(env, "b", &[(2, "z"), (3, "w")])?;
    Ok([a, b])
}

fn walk(iter: &mut MergeIter<'_, u32, String>) -> StoreResult<Vec<(u32, usize)>> {
    let mut seen = Vec::new();
    while !iter.is_exhausted() {
        let (key, _) = iter.current()?;
        seen.push((*key, iter.table_index()?));
        iter.advance()?;
    }
    Ok(seen)
}

#[test]
fn interleaves_tables_in_key_order() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let tables = two_tables(&env)?;

    let txn = env.begin_read()?;
    let mut iter = txn.merge_iter::<u32, String>(&tables)?;
    assert_eq!(iter.current()?, (&1, &"x".to_string()));
    assert_eq!(walk(&mut iter)?, vec![(1, 0), (2, 1), (3, 0), (3, 1)]);
    Ok(())
}

#[test]
fn equal_keys_are_not_deduplicated() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let tables = two_tables(&env)?;

    let txn = env.begin_read()?;
    let entries = txn
        .merge_iter::<u32, String>(&tables)?
        .collect::<StoreResult<Vec<_>>>()?;
    let threes: Vec<_> = entries.iter().filter(|e| e.key == 3).collect();
    assert_eq!(threes.len(), 2);
    assert_eq!((threes[0].value.as_str(), threes[0].table_index), ("y", 0));
    assert_eq!((threes[1].value.as_str(), threes[1].table_index), ("w", 1));
    Ok(())
}

#[test]
fn seek_range_repositions_every_table() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let tables = two_tables(&env)?;

    let txn = env.begin_read()?;
    let mut iter = txn.merge_iter::<u32, String>(&tables)?;
    iter.advance()?;
    iter.advance()?;
    iter.advance()?;

    iter.seek_range(&2)?;
    assert_eq!(iter.current()?.0, &2);
    assert_eq!(iter.table_index()?, 1);
    assert_eq!(walk(&mut iter)?, vec![(2, 1), (3, 0), (3, 1)]);

    iter.seek_range(&4)?;
    assert!(iter.is_exhausted());
    assert!(matches!(iter.current(), Err(StoreError::InvalidPosition)));
    assert!(matches!(iter.table_index(), Err(StoreError::InvalidPosition)));
    assert!(matches!(iter.advance(), Err(StoreError::InvalidPosition)));
    Ok(())
}

#[test]
fn equality_compares_keys_only() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let [a, b] = two_tables(&env)?;

    let txn = env.begin_read()?;
    let mut both = txn.merge_iter::<u32, String>(&[a, b])?;
    both.seek_range(&3)?;
    assert_eq!(both.table_index()?, 0);

    // Same key from a different table and value.
    let mut only_b = txn.merge_iter::<u32, String>(&[b])?;
    only_b.seek_range(&3)?;
    assert_eq!(only_b.current()?.1, "w");
    assert!(both == only_b);

    let fresh = txn.merge_iter::<u32, String>(&[a, b])?;
    assert!(both != fresh);

    // Exhausted iterators are all equal.
    let mut drained = txn.merge_iter::<u32, String>(&[a, b])?;
    walk(&mut drained)?;
    let mut past_end = txn.merge_iter::<u32, String>(&[a, b])?;
    past_end.seek_range(&100)?;
    let mut empty = txn.merge_iter::<u32, String>(&[b])?;
    empty.seek_range(&4)?;
    assert!(drained == past_end);
    assert!(drained == empty);
    assert!(drained != fresh);
    Ok(())
}

#[test]
fn scan_until_stops_at_the_sentinel() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let odd = int_table(&env, "odd", &[(1, "1"), (3, "3"), (5, "5"), (7, "7"), (9, "9")])?;
    let even = int_table(&env, "even", &[(2, "2"), (4, "4"), (6, "6"), (8, "8"), (10, "10")])?;

    let txn = env.begin_read()?;
    let mut scan = txn.merge_iter::<u32, String>(&[odd, even])?;
    scan.seek_range(&3)?;
    let mut end = txn.merge_iter::<u32, String>(&[odd, even])?;
    end.seek_range(&7)?;

    let keys: Vec<u32> = scan.scan_until(&end)?.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, [3, 4, 5, 6]);
    assert!(scan == end);

    // An exhausted sentinel scans to the end.
    let mut tail = txn.merge_iter::<u32, String>(&[odd, even])?;
    tail.seek_range(&9)?;
    let mut done = txn.merge_iter::<u32, String>(&[odd])?;
    done.seek_range(&11)?;
    let rest: Vec<(u32, usize)> = tail
        .scan_until(&done)?
        .into_iter()
        .map(|e| (e.key, e.table_index))
        .collect();
    assert_eq!(rest, [(9, 0), (10, 1)]);
    Ok(())
}

#[test]
fn duplicate_tables_merge_every_pair() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let a = create_table(&env, "a", &[TableFlag::DupSort, TableFlag::IntegerKey])?;
    let b = create_table(&env, "b", &[TableFlag::DupSort, TableFlag::IntegerKey])?;

    let txn = env.begin_write()?;
    for (table, key, value) in [(a, 1u32, "p"), (a, 1, "q"), (b, 1, "q"), (a, 2, "r")] {
        txn.put(table, &key, value, PutFlags::empty())?;
    }
    txn.commit()?;

    let txn = env.begin_read()?;
    let mut iter = txn.merge_iter::<u32, String>(&[a, b])?;
    let all: Vec<_> = iter
        .by_ref()
        .map(|e| e.map(|e| (e.key, e.value, e.table_index)))
        .collect::<StoreResult<_>>()?;
    assert_eq!(
        all,
        vec![
            (1, "p".to_string(), 0),
            (1, "q".to_string(), 0),
            (1, "q".to_string(), 1),
            (2, "r".to_string(), 0),
        ]
    );

    iter.seek_both(&1, &"q".to_string())?;
    assert_eq!(iter.current()?, (&1, &"q".to_string()));
    assert_eq!(iter.table_index()?, 0);
    iter.advance()?;
    assert_eq!(iter.table_index()?, 1);

    iter.seek_both(&1, &"p".to_string())?;
    assert_eq!(walk(&mut iter)?, vec![(1, 0), (1, 0), (2, 0)]);
    Ok(())
}

#[test]
fn zero_tables_have_no_position() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let txn = env.begin_read()?;
    let mut iter = txn.merge_iter::<u32, String>(&[])?;
    assert!(iter.is_exhausted());
    assert!(matches!(iter.current(), Err(StoreError::InvalidPosition)));
    assert!(matches!(iter.seek_range(&1), Err(StoreError::InvalidPosition)));
    assert!(iter.next().is_none());
    Ok(())
}

#[test]
fn tables_missing_from_the_snapshot_stay_empty() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let [a, b] = two_tables(&env)?;

    let txn = env.begin_read()?;
    // Created after the reader's snapshot was taken.
    let late = int_table(&env, "late", &[(0, "early bird")])?;

    let mut iter = txn.merge_iter::<u32, String>(&[a, late, b])?;
    assert_eq!(walk(&mut iter)?, vec![(1, 0), (2, 2), (3, 0), (3, 2)]);
    Ok(())
}

#[test]
fn write_transactions_merge_uncommitted_data() -> StoreResult<()> {
    let (env, _dir) = open_env()?;
    let [a, b] = two_tables(&env)?;

    let txn = env.begin_write()?;
    txn.put(b, &0u32, "zero", PutFlags::empty())?;
    let mut iter = txn.merge_iter::<u32, String>(&[a, b])?;
    assert_eq!(iter.current()?, (&0, &"zero".to_string()));
    assert_eq!(iter.table_index()?, 1);
    assert_eq!(walk(&mut iter)?.len(), 5);
    Ok(())
}
