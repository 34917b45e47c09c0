use dashmap::DashMap;

/// Handoff between a form submission and the inline query that publishes it.
///
/// Entries are written once and consumed at most once. There is no expiry:
/// a key that is never queried stays until the process exits.
pub trait OfferStore: Send + Sync {
    /// Insert or overwrite. Key collisions are not detected.
    fn put(&self, key: &str, message: String);

    /// Atomically remove and return the entry. Of several callers racing on
    /// one key, exactly one sees `Some`.
    fn take(&self, key: &str) -> Option<String>;

    /// Number of entries still waiting to be consumed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sharded in-memory store; lost on restart.
#[derive(Default)]
pub struct InMemoryOfferStore {
    entries: DashMap<String, String>,
}

impl InMemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OfferStore for InMemoryOfferStore {
    fn put(&self, key: &str, message: String) {
        if self.entries.insert(key.to_string(), message).is_some() {
            tracing::debug!("Offer key {} overwritten", key);
        }
    }

    fn take(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, message)| message)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn take_returns_message_once() {
        let store = InMemoryOfferStore::new();
        store.put("abcde", "offer".to_string());
        assert_eq!(store.len(), 1);

        assert_eq!(store.take("abcde").as_deref(), Some("offer"));
        assert_eq!(store.take("abcde"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_and_empty_keys_are_absent() {
        let store = InMemoryOfferStore::new();
        store.put("abcde", "offer".to_string());
        assert_eq!(store.take("zzzzz"), None);
        assert_eq!(store.take(""), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let store = InMemoryOfferStore::new();
        store.put("abcde", "first".to_string());
        store.put("abcde", "second".to_string());
        assert_eq!(store.len(), 1);
        assert_eq!(store.take("abcde").as_deref(), Some("second"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let store = InMemoryOfferStore::new();
        store.put("AbCdE", "offer".to_string());
        assert_eq!(store.take("abcde"), None);
        assert_eq!(store.take("AbCdE").as_deref(), Some("offer"));
    }

    #[test]
    fn racing_takes_have_single_winner() {
        const CALLERS: usize = 16;

        for round in 0..50 {
            let store = Arc::new(InMemoryOfferStore::new());
            let key = format!("key{round}");
            store.put(&key, "offer".to_string());

            let barrier = Arc::new(Barrier::new(CALLERS));
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    let key = key.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.take(&key)
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(Option::is_some)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn concurrent_puts_on_distinct_keys_all_land() {
        let store = Arc::new(InMemoryOfferStore::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.put(&format!("{worker}-{i}"), format!("offer {i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 800);
        assert_eq!(store.take("3-42").as_deref(), Some("offer 42"));
    }
}
