//! Readers running concurrently with a single writer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use logstore::{BasicFilter, LogRead, LogStore, RecordId, RecordRef, Token};

const RECORDS: u64 = 20_000;
const VALUES: u64 = 16;

fn payload(record_id: RecordId) -> [u8; 8] {
    record_id.to_le_bytes()
}

#[test]
fn should_never_observe_partially_inserted_records() {
    // given
    let store = LogStore::new();
    let first = store.add_index(1).unwrap();
    let second = store.add_index(1).unwrap();
    let all = store.add_stream(|_: &RecordRef<'_>| true);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..4 {
            let reader = store.reader();
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let visible = reader.len();
                    if visible == 0 {
                        continue;
                    }
                    let latest = visible - 1;

                    // when
                    let mut buf = [0u8; 8];
                    let found = reader.get(&mut buf, latest);
                    let postings = reader.lookup(second, latest % VALUES);
                    let stream = reader.get_stream(all).unwrap();

                    // then
                    assert!(found);
                    assert_eq!(buf, payload(latest));
                    assert!(postings.contains(&latest));
                    assert!(postings.windows(2).all(|pair| pair[0] < pair[1]));
                    assert!(stream.len() as u64 >= visible);
                    assert_eq!(stream.get(latest as usize), Some(latest));
                }
            });
        }

        // given
        for record_id in 0..RECORDS {
            let value = record_id % VALUES;
            store.insert(
                &payload(record_id),
                &[Token::new(first, value), Token::new(second, value)],
            );
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(store.len(), RECORDS);
    assert_eq!(store.get_stream(all).unwrap().len() as u64, RECORDS);
}

#[test]
fn should_return_only_published_filter_results() {
    // given
    let store = LogStore::new();
    let index = store.add_index(2).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let reader = store.reader();
        let done = &done;
        scope.spawn(move || {
            while !done.load(Ordering::Acquire) {
                // when
                let before = reader.len();
                let mut results = HashSet::new();
                reader.filter(&mut results, &[vec![BasicFilter::new(index, 1)]]);
                let after = reader.len();

                // then
                let expected_min = (0..before).filter(|id| id % 2 == 1).count();
                assert!(results.len() >= expected_min);
                assert!(results.iter().all(|id| id % 2 == 1 && *id < after));
            }
        });

        for record_id in 0..RECORDS {
            store.insert(&payload(record_id), &[Token::new(index, record_id % 2)]);
        }
        done.store(true, Ordering::Release);
    });

    let mut results = HashSet::new();
    store.filter(&mut results, &[vec![BasicFilter::new(index, 1)]]);
    assert_eq!(results.len() as u64, RECORDS / 2);
}
