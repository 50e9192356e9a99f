//! Unit tests for the value cache and the single-flight cache.
//! No filesystem access.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crate::cache::{Load, SyncCache, ValueCache};

#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    host: String,
    port: u16,
}

#[derive(Debug, Clone, PartialEq)]
struct Limits {
    burst: u32,
    enabled: bool,
}

mod value_cache {
    use super::*;

    #[test]
    fn returns_cached_values_by_type() {
        let cache = ValueCache::new();

        cache.set("/path/to/int", 123_123i64);
        cache.set(
            "/path/to/struct",
            Endpoint {
                host: "db1".to_string(),
                port: 5432,
            },
        );
        cache.set(
            "/path/to/struct",
            Limits {
                burst: 10,
                enabled: true,
            },
        );

        assert_eq!(cache.get::<i64>("/path/to/int"), Some(123_123));
        assert_eq!(
            cache.get::<Endpoint>("/path/to/struct"),
            Some(Endpoint {
                host: "db1".to_string(),
                port: 5432
            })
        );
        assert_eq!(
            cache.get::<Limits>("/path/to/struct"),
            Some(Limits {
                burst: 10,
                enabled: true
            })
        );
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn distinct_types_miss_and_do_not_disturb_each_other() {
        let cache = ValueCache::new();
        cache.set("/p", 7i64);

        assert_eq!(cache.get::<i32>("/p"), None);
        assert_eq!(cache.get::<String>("/p"), None);

        cache.set("/p", "seven".to_string());

        assert_eq!(cache.get::<i64>("/p"), Some(7));
        assert_eq!(cache.get::<String>("/p"), Some("seven".to_string()));
    }

    #[test]
    fn first_writer_wins() {
        let cache = ValueCache::new();

        cache.set("/p", 1i64);
        cache.set("/p", 2i64);

        assert_eq!(cache.get::<i64>("/p"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mutating_a_read_does_not_alter_the_cache() {
        let cache = ValueCache::new();
        let orig = Endpoint {
            host: "db1".to_string(),
            port: 5432,
        };

        cache.set("/path/to", orig.clone());

        let mut from_cache = cache.get::<Endpoint>("/path/to").unwrap();
        assert_eq!(from_cache, orig);

        from_cache.host = "foobar".to_string();

        assert_eq!(cache.get::<Endpoint>("/path/to").unwrap(), orig);
    }

    #[test]
    fn mutating_a_read_list_does_not_alter_the_cache() {
        let cache = ValueCache::new();
        cache.set("/list", vec!["a".to_string(), "b".to_string()]);

        let mut list = cache.get::<Vec<String>>("/list").unwrap();
        list.push("c".to_string());

        assert_eq!(cache.get::<Vec<String>>("/list").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_path_misses() {
        let cache = ValueCache::new();

        assert!(cache.is_empty());
        assert_eq!(cache.get::<i64>("/nothing"), None);
    }
}

mod sync_cache {
    use super::*;

    #[test]
    fn first_load_is_vacant_then_ready() {
        let cache: SyncCache<String, String> = SyncCache::new();

        let guard = match cache.load("test".to_string()) {
            Load::Vacant(guard) => guard,
            Load::Ready(_) => panic!("cache isn't empty on start"),
        };
        assert_eq!(guard.key(), "test");
        guard.store("foobar".to_string());

        match cache.load("test".to_string()) {
            Load::Ready(value) => assert_eq!(value, "foobar"),
            Load::Vacant(_) => panic!("value was not stored"),
        }
        assert_eq!(cache.load_only(&"test".to_string()), Some("foobar".to_string()));
    }

    #[test]
    fn concurrent_waiter_receives_the_stored_value() {
        let cache: Arc<SyncCache<String, String>> = Arc::new(SyncCache::new());

        let Load::Vacant(guard) = cache.load("test".to_string()) else {
            panic!("cache isn't empty on start");
        };

        let waiter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || match cache.load("test".to_string()) {
                Load::Ready(value) => value,
                Load::Vacant(_) => panic!("second load() must not become a loader"),
            })
        };

        thread::sleep(Duration::from_millis(50));
        guard.store("foobar".to_string());

        assert_eq!(waiter.join().unwrap(), "foobar");
    }

    #[test]
    fn load_only_waits_for_an_in_flight_load() {
        let cache: Arc<SyncCache<u32, u32>> = Arc::new(SyncCache::new());

        let Load::Vacant(guard) = cache.load(1) else {
            panic!("cache isn't empty on start");
        };

        let reader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.load_only(&1))
        };

        thread::sleep(Duration::from_millis(50));
        guard.store(42);

        assert_eq!(reader.join().unwrap(), Some(42));
        assert_eq!(cache.load_only(&2), None);
    }

    #[test]
    fn many_concurrent_loads_run_the_loader_once() {
        const CALLERS: usize = 100;

        let cache: Arc<SyncCache<&'static str, Arc<String>>> = Arc::new(SyncCache::new());
        let loads = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                let barrier = Arc::clone(&barrier);

                thread::spawn(move || {
                    barrier.wait();

                    match cache.load("module") {
                        Load::Ready(value) => value,
                        Load::Vacant(guard) => {
                            loads.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));

                            let value = Arc::new("loaded".to_string());
                            guard.store(Arc::clone(&value));
                            value
                        }
                    }
                })
            })
            .collect();

        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[test]
    fn abandoned_load_lets_the_next_caller_retry() {
        let cache: Arc<SyncCache<u32, u32>> = Arc::new(SyncCache::new());

        let Load::Vacant(guard) = cache.load(7) else {
            panic!("cache isn't empty on start");
        };

        let retrier = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || match cache.load(7) {
                Load::Vacant(guard) => {
                    guard.store(70);
                    true
                }
                Load::Ready(_) => false,
            })
        };

        thread::sleep(Duration::from_millis(50));
        drop(guard);

        assert!(retrier.join().unwrap(), "waiter should have become the loader");
        assert_eq!(cache.load_only(&7), Some(70));
    }

    #[test]
    fn abandoned_load_is_not_cached() {
        let cache: SyncCache<u32, u32> = SyncCache::new();

        if let Load::Vacant(guard) = cache.load(1) {
            drop(guard);
        }

        assert!(cache.is_empty());
        assert_eq!(cache.load_only(&1), None);
        assert!(matches!(cache.load(1), Load::Vacant(_)));
    }
}
