use std::time::{SystemTime, UNIX_EPOCH};

use swap_client::{JsonFileStore, TokenStore};

fn scratch_dir(label: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("swap-client-{label}-{nanos}"))
}

#[test]
fn json_store_persists_tokens_across_instances() {
    let dir = scratch_dir("tokens");
    let store = JsonFileStore::new(&dir).unwrap();
    assert_eq!(store.load("0xAbC").unwrap(), None);
    store.save("0xAbC", "jwt-1").unwrap();

    let reopened = JsonFileStore::new(&dir).unwrap();
    assert_eq!(reopened.load("0xAbC").unwrap().as_deref(), Some("jwt-1"));
    reopened.save("0xAbC", "jwt-2").unwrap();
    assert_eq!(store.load("0xAbC").unwrap().as_deref(), Some("jwt-2"));

    std::fs::remove_dir_all(dir).unwrap();
}
