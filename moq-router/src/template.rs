use serde_json::{Map, Value};

use crate::pattern::Binding;

/// Renders a response body from its stored template. Each binding is applied
/// over the whole body before the next one, in the order given.
pub fn apply_bindings(template: &Value, bindings: &[Binding]) -> Value {
    bindings
        .iter()
        .fold(template.clone(), |body, binding| {
            replace_tree(body, &binding.token, &binding.value)
        })
}

/// Replaces `search` in every string of `value`, object keys included.
pub fn replace_tree(value: Value, search: &str, replace: &str) -> Value {
    match value {
        Value::String(text) => Value::String(text.replace(search, replace)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| replace_tree(item, search, replace))
                .collect(),
        ),
        Value::Object(entries) => {
            let mut replaced = Map::with_capacity(entries.len());
            for (key, item) in entries {
                replaced.insert(key.replace(search, replace), replace_tree(item, search, replace));
            }
            Value::Object(replaced)
        }
        other => other,
    }
}

#[cfg(test)]
fn bind(token: &str, value: &str) -> Binding {
    Binding {
        token: token.to_owned(),
        value: value.to_owned(),
    }
}

#[test]
fn test_replace_values_and_keys() {
    let template = serde_json::json!({
        "id": ":id",
        ":id_link": "/users/:id",
        "nested": [{"owner": "user-:id"}, [":id"]],
        "count": 3,
        "active": true,
        "missing": null,
    });

    let rendered = apply_bindings(&template, &[bind(":id", "42")]);
    assert_eq!(
        serde_json::json!({
            "id": "42",
            "42_link": "/users/42",
            "nested": [{"owner": "user-42"}, ["42"]],
            "count": 3,
            "active": true,
            "missing": null,
        }),
        rendered
    );
}

#[test]
fn test_template_is_not_mutated() {
    let template = serde_json::json!({"id": ":id"});

    let first = apply_bindings(&template, &[bind(":id", "1")]);
    let second = apply_bindings(&template, &[bind(":id", "2")]);

    assert_eq!(serde_json::json!({"id": "1"}), first);
    assert_eq!(serde_json::json!({"id": "2"}), second);
    assert_eq!(serde_json::json!({"id": ":id"}), template);
}

#[test]
fn test_bindings_are_sequential() {
    // The value bound to `:a` contains the `:b` token, which is applied
    // afterwards.
    let template = Value::from(":a and :b");
    let rendered = apply_bindings(&template, &[bind(":a", ":b"), bind(":b", "x")]);
    assert_eq!(Value::from("x and x"), rendered);

    // A later binding for the same token finds nothing left to replace.
    let template = Value::from(":id");
    let rendered = apply_bindings(&template, &[bind(":id", "first"), bind(":id", "second")]);
    assert_eq!(Value::from("first"), rendered);
}

#[test]
fn test_prefix_tokens() {
    // `:id` is applied before `:id2` and eats its prefix.
    let template = Value::from(":id2");
    let rendered = apply_bindings(&template, &[bind(":id", "7"), bind(":id2", "8")]);
    assert_eq!(Value::from("72"), rendered);
}

#[test]
fn test_renamed_key_collision_keeps_position() {
    let template = serde_json::json!({"7": "old", "other": 1, ":id": "new"});
    let rendered = apply_bindings(&template, &[bind(":id", "7")]);

    let entries: Vec<(&String, &Value)> = rendered.as_object().unwrap().iter().collect();
    assert_eq!(2, entries.len());
    assert_eq!((&"7".to_owned(), &Value::from("new")), entries[0]);
    assert_eq!("other", entries[1].0);
}
