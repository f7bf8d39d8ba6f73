use orgscan_cache::{CacheShape, CacheStore, CacheValue};
use serde_json::{json, Map, Value};

#[test]
fn round_trips_every_value_shape() {
    let store = CacheStore::new("orgscan", "it");

    let scalar = CacheValue::from("2024-05-01T00:00:00Z");
    let sequence = CacheValue::from(vec![json!({"Id": "001"}), json!({"Id": "002"})]);
    let mut map = Map::new();
    map.insert("001".to_string(), json!({"Name": "Account"}));
    map.insert("002".to_string(), json!({"Name": "Invoice__c"}));
    let mapping = CacheValue::from(map);

    for (key, value) in [
        ("scalar", &scalar),
        ("sequence", &sequence),
        ("mapping", &mapping),
        ("null", &CacheValue::Null),
    ] {
        store.set(key, value).unwrap();
        assert_eq!(store.get(key).unwrap().as_ref(), Some(value), "key {key}");
    }

    store.remove("scalar");
    assert!(store.get("scalar").unwrap().is_none());
    assert_eq!(store.keys(), vec!["mapping", "null", "sequence"]);
}

#[test]
fn mapping_preserves_key_order() {
    let store = CacheStore::new("orgscan", "it");
    let mut map = Map::new();
    for id in ["z9", "a1", "m5"] {
        map.insert(id.to_string(), Value::from(id));
    }
    store.set("ordered", &CacheValue::from(map.clone())).unwrap();

    match store.get("ordered").unwrap().unwrap() {
        CacheValue::Mapping(out) => {
            let keys: Vec<&String> = out.keys().collect();
            assert_eq!(keys, vec!["z9", "a1", "m5"]);
        }
        other => panic!("expected mapping, got {other:?}"),
    }
}

#[test]
fn large_payloads_compress_transparently() {
    let store = CacheStore::new("orgscan", "it");
    let rows: Vec<Value> = (0..500)
        .map(|i| json!({"Id": format!("001{i:015}"), "Name": format!("Record {i}")}))
        .collect();
    let value = CacheValue::from(rows);
    store.set("bulk", &value).unwrap();
    assert_eq!(store.get("bulk").unwrap(), Some(value));

    let info = store.describe_one("bulk").unwrap();
    assert_eq!(info.shape, CacheShape::Sequence);
    assert_eq!(info.element_count, 500);
}

#[test]
fn clear_empties_the_section() {
    let store = CacheStore::new("orgscan", "it");
    store.set("a", &CacheValue::from("1")).unwrap();
    store.set("b", &CacheValue::from("2")).unwrap();
    store.clear();
    assert!(store.keys().is_empty());
    assert!(store.get("a").unwrap().is_none());
}
