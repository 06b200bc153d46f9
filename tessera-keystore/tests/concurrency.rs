//! Shared-store behaviour under concurrent callers.

use chrono::Duration;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use tessera_keystore::{Clock, KeyStore, ManualClock, SessionKeys, Ticket};
use zeroize::Zeroizing;

fn ticket(tag: u8) -> Ticket {
    Ticket {
        destination: "dst".into(),
        skey: Zeroizing::new(vec![tag; 32]),
        ekey: Zeroizing::new(vec![tag; 32]),
        esek: format!("esek-{}", tag),
    }
}

#[test]
fn concurrent_put_get_never_tears_entries() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(KeyStore::with_clock(clock.clone()));
    let exp = clock.now() + Duration::seconds(60);

    let handles: Vec<_> = (0..8u8)
        .map(|tag| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    store.put_ticket("src", "dst", ticket(tag), exp);
                    if let Some(t) = store.get_ticket("src", "dst") {
                        // Whichever put landed last, its fields belong together.
                        let owner = t.skey[0];
                        assert!(t.skey.iter().all(|b| *b == owner));
                        assert_eq!(*t.ekey, vec![owner; 32]);
                        assert_eq!(t.esek, format!("esek-{}", owner));
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn distinct_pairs_do_not_interfere() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(KeyStore::with_clock(clock.clone()));
    let exp = clock.now() + Duration::seconds(60);

    let handles: Vec<_> = (0..8u8)
        .map(|tag| {
            let store = store.clone();
            thread::spawn(move || {
                let dst = format!("dst-{}", tag);
                let keys = SessionKeys {
                    skey: Zeroizing::new(vec![tag; 32]),
                    ekey: Zeroizing::new(vec![tag; 32]),
                };
                store.put_sek("src", &dst, keys, exp);
                store.get_sek("src", &dst).map(|k| k.skey[0])
            })
        })
        .collect();

    for (tag, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap(), Some(tag as u8));
    }
    assert_eq!(store.len(), 8);
}

proptest! {
    #[test]
    fn prop_never_returned_past_expiration(ttl in 0i64..1000, elapsed in 0i64..2000) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = KeyStore::with_clock(clock.clone());
        store.put_ticket("a", "b", ticket(1), clock.now() + Duration::seconds(ttl));
        clock.advance(Duration::seconds(elapsed));
        let found = store.get_ticket("a", "b").is_some();
        prop_assert_eq!(found, elapsed < ttl);
    }
}
