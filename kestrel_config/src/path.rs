//! Dotted key paths over `serde_json` documents.

use serde_json::{Map, Value};

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|s| !s.is_empty())
}

pub(crate) fn lookup<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    segments(key).try_fold(doc, |value, segment| value.get(segment))
}

pub(crate) fn insert(doc: &mut Value, key: &str, value: Value) {
    let parts: Vec<&str> = segments(key).collect();
    let Some((last, parents)) = parts.split_last() else {
        *doc = value;
        return;
    };

    let mut current = doc;
    for part in parents {
        current = object_mut(current)
            .entry((*part).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    object_mut(current).insert((*last).to_owned(), value);
}

pub(crate) fn remove(doc: &mut Value, key: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(key).collect();
    let (last, parents) = parts.split_last()?;

    let mut current = doc;
    for part in parents {
        current = current.get_mut(*part)?;
    }

    current.as_object_mut()?.remove(*last)
}

// Non-object values in the way of a write are replaced.
fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }

    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_overwrites_scalars_in_the_way() {
        let mut doc = json!({ "servers": 5 });
        insert(&mut doc, "servers.leave", json!(["1"]));

        assert_eq!(doc, json!({ "servers": { "leave": ["1"] } }));
    }

    #[test]
    fn empty_key_addresses_the_document() {
        let mut doc = json!({ "a": 1 });
        assert_eq!(lookup(&doc, ""), Some(&json!({ "a": 1 })));

        insert(&mut doc, "", json!({ "b": 2 }));
        assert_eq!(doc, json!({ "b": 2 }));
        assert_eq!(remove(&mut doc, ""), None);
    }
}
