use cinescope::favorites::{
    FavoritesStore, FileStorage, KeyValueStore, MemoryStorage, StorageError, Toggle,
    FAVORITES_KEY, LOAD_FAILED_MESSAGE, SAVE_FAILED_MESSAGE,
};
use cinescope::models::Movie;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

/// Memory storage whose reads or writes can be switched off, like a full or locked disk.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl KeyValueStore for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read blocked".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

/// Memory storage that, once armed, starts a competing add from another thread while a
/// read is in flight.
#[derive(Default)]
struct ContendedStorage {
    inner: MemoryStorage,
    armed: AtomicBool,
    store: OnceLock<Weak<FavoritesStore>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl KeyValueStore for ContendedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(store) = self.store.get().and_then(Weak::upgrade) {
                let handle = std::thread::spawn(move || {
                    store.add_to_favorites(&Movie::new(5, "Written mid-reload"));
                });
                *self.writer.lock().unwrap() = Some(handle);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

fn movie(id: i64, title: &str) -> Movie {
    Movie::new(id, title)
}

fn ids(list: &[Movie]) -> Vec<i64> {
    list.iter().map(|m| m.id).collect()
}

#[test]
fn favorites_survive_a_reload_in_order() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FavoritesStore::new(storage.clone());
    for (id, title) in [(1, "Alien"), (2, "Aliens"), (3, "Alien 3")] {
        store.add_to_favorites(&movie(id, title));
    }
    drop(store);

    let reopened = FavoritesStore::new(storage);
    assert_eq!(ids(&reopened.favorites()), vec![1, 2, 3]);
    assert_eq!(reopened.favorites()[2].title, "Alien 3");
}

#[test]
fn passthrough_fields_are_persisted_verbatim() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FavoritesStore::new(storage.clone());
    let detailed: Movie = serde_json::from_value(json!({
        "id": 550,
        "title": "Fight Club",
        "runtime": 139,
        "credits": { "cast": [{ "name": "Brad Pitt" }] }
    }))
    .unwrap();
    store.add_to_favorites(&detailed);

    let raw = storage.get(FAVORITES_KEY).unwrap().unwrap();
    let persisted: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted[0]["runtime"], json!(139));
    assert_eq!(persisted[0]["credits"]["cast"][0]["name"], json!("Brad Pitt"));
}

#[test]
fn malformed_persisted_value_is_discarded() {
    let storage = Arc::new(MemoryStorage::with_entry(FAVORITES_KEY, "not a list"));
    let store = FavoritesStore::new(storage.clone());
    let snap = store.snapshot();
    assert!(snap.favorites.is_empty());
    assert!(!snap.is_loading);
    assert_eq!(snap.error.as_deref(), Some(LOAD_FAILED_MESSAGE));
    assert_eq!(storage.get(FAVORITES_KEY).unwrap(), None);
}

#[test]
fn undecodable_entries_are_dropped_and_the_rest_kept() {
    let storage = Arc::new(MemoryStorage::with_entry(
        FAVORITES_KEY,
        r#"[{"id":1,"title":"A"},{"id":2,"title":"B","vote_count":12.5},{"id":3,"title":"C"}]"#,
    ));
    let store = FavoritesStore::new(storage.clone());
    assert_eq!(ids(&store.favorites()), vec![1, 3]);
    assert_eq!(store.error(), None);
    assert!(storage.get(FAVORITES_KEY).unwrap().is_some());

    store.add_to_favorites(&movie(4, "D"));
    let persisted: Vec<Movie> =
        serde_json::from_str(&storage.get(FAVORITES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(ids(&persisted), vec![1, 3, 4]);
}

#[test]
fn non_list_json_is_reset_without_error() {
    let storage = Arc::new(MemoryStorage::with_entry(FAVORITES_KEY, r#"{"id": 1}"#));
    let store = FavoritesStore::new(storage.clone());
    assert_eq!(store.favorite_count(), 0);
    assert_eq!(store.error(), None);
    assert_eq!(storage.get(FAVORITES_KEY).unwrap(), None);
}

#[test]
fn unreadable_storage_reports_load_failure_and_keeps_entry() {
    let storage = Arc::new(FlakyStorage::default());
    storage.inner.set(FAVORITES_KEY, "[]").unwrap();
    storage.fail_reads.store(true, Ordering::SeqCst);

    let store = FavoritesStore::new(storage.clone());
    assert_eq!(store.error().as_deref(), Some(LOAD_FAILED_MESSAGE));
    assert!(store.favorites().is_empty());
    assert!(!store.is_loading());
    assert_eq!(storage.inner.get(FAVORITES_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn save_failure_keeps_memory_change_and_recovers_later() {
    let storage = Arc::new(FlakyStorage::default());
    let store = FavoritesStore::new(storage.clone());

    storage.fail_writes.store(true, Ordering::SeqCst);
    assert!(store.add_to_favorites(&movie(1, "Heat")));
    assert!(store.is_favorite(1));
    assert_eq!(store.error().as_deref(), Some(SAVE_FAILED_MESSAGE));
    assert_eq!(storage.get(FAVORITES_KEY).unwrap(), None);

    // Toggling stays usable while the durable copy lags.
    assert_eq!(store.toggle_favorite(&movie(2, "Thief")), Toggle::Added);

    storage.fail_writes.store(false, Ordering::SeqCst);
    store.add_to_favorites(&movie(3, "Collateral"));
    assert_eq!(store.error(), None);
    let persisted = storage.get(FAVORITES_KEY).unwrap().unwrap();
    let list: Vec<Movie> = serde_json::from_str(&persisted).unwrap();
    assert_eq!(ids(&list), vec![1, 2, 3]);
}

#[test]
fn invalid_input_leaves_list_unchanged() {
    let store = FavoritesStore::new(Arc::new(MemoryStorage::new()));
    store.add_to_favorites(&movie(7, "Se7en"));

    let empty: Movie = serde_json::from_value(json!({})).unwrap();
    assert!(!store.add_to_favorites(&empty));
    assert!(serde_json::from_value::<Movie>(Value::Null).is_err());
    assert_eq!(ids(&store.favorites()), vec![7]);
    assert_eq!(store.error(), None);
}

#[test]
fn declined_clear_keeps_everything_and_persisted_copy() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FavoritesStore::new(storage.clone());
    store.add_to_favorites(&movie(1, "A"));
    store.add_to_favorites(&movie(2, "B"));
    let persisted_before = storage.get(FAVORITES_KEY).unwrap();

    assert!(!store.clear_favorites(|| false));
    assert_eq!(ids(&store.favorites()), vec![1, 2]);
    assert_eq!(storage.get(FAVORITES_KEY).unwrap(), persisted_before);

    assert!(store.clear_favorites(|| true));
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn reload_picks_up_external_changes() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FavoritesStore::new(storage.clone());
    store.add_to_favorites(&movie(1, "A"));
    storage
        .set(FAVORITES_KEY, r#"[{"id": 9, "title": "Nine"}]"#)
        .unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    let _sub = store.subscribe(move |snap| {
        sink.lock().unwrap().push(snap.is_loading);
    });
    store.reload();

    assert_eq!(ids(&store.favorites()), vec![9]);
    assert_eq!(*states.lock().unwrap(), vec![true, false]);
}

#[test]
fn listeners_see_save_errors() {
    let storage = Arc::new(FlakyStorage::default());
    let store = FavoritesStore::new(storage.clone());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let _sub = store.subscribe(move |snap| {
        sink.lock().unwrap().push(snap.error.clone());
    });

    storage.fail_writes.store(true, Ordering::SeqCst);
    store.add_to_favorites(&movie(1, "A"));
    assert_eq!(
        *errors.lock().unwrap(),
        vec![Some(SAVE_FAILED_MESSAGE.to_string())]
    );
}

#[test]
fn file_backed_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let store = FavoritesStore::new(Arc::new(FileStorage::new(&path)));
    store.add_to_favorites(&movie(11, "Ran"));
    store.add_to_favorites(&movie(12, "Ikiru"));
    store.remove_from_favorites(11);
    drop(store);

    let reopened = FavoritesStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(ids(&reopened.favorites()), vec![12]);
    assert!(reopened.is_favorite(12));
    assert!(!reopened.is_favorite(11));
}

#[test]
fn corrupt_storage_file_is_replaced_and_saving_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "{garbage").unwrap();

    let store = FavoritesStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(store.error().as_deref(), Some(LOAD_FAILED_MESSAGE));
    assert!(store.favorites().is_empty());

    assert!(store.add_to_favorites(&movie(1, "Stalker")));
    assert_ne!(store.error().as_deref(), Some(SAVE_FAILED_MESSAGE));
    store.reload();
    assert_eq!(store.error(), None);
    assert_eq!(ids(&store.favorites()), vec![1]);
    drop(store);

    let reopened = FavoritesStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(reopened.error(), None);
    assert_eq!(ids(&reopened.favorites()), vec![1]);
}

#[test]
fn add_during_reload_is_not_lost() {
    let storage = Arc::new(ContendedStorage::default());
    let store = FavoritesStore::new(storage.clone());
    storage.store.set(Arc::downgrade(&store)).unwrap();
    store.add_to_favorites(&movie(1, "A"));

    storage.armed.store(true, Ordering::SeqCst);
    store.reload();
    let writer = storage.writer.lock().unwrap().take().unwrap();
    writer.join().unwrap();

    assert_eq!(ids(&store.favorites()), vec![1, 5]);
    let persisted: Vec<Movie> =
        serde_json::from_str(&storage.get(FAVORITES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(ids(&persisted), vec![1, 5]);
}

#[test]
fn store_is_shared_across_threads() {
    let store = FavoritesStore::new(Arc::new(MemoryStorage::new()));
    let handles: Vec<_> = (1..=4)
        .map(|id| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.add_to_favorites(&Movie::new(id, format!("Movie {id}")));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.favorite_count(), 4);
}
