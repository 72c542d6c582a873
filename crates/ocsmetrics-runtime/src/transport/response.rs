use ocsmetrics_types::{Cursor, FetchErrorKind, Page, ResourceKind};
use reqwest::Url;
use serde_json::Value;

/// Opaque cursor for a `next` link: its `cursor` query parameter, or the
/// whole link when it has none
pub fn cursor_from_next(next: &str) -> Cursor {
    Url::parse(next)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(name, _)| name == "cursor")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|cursor| !cursor.is_empty())
        .map(Cursor::new)
        .unwrap_or_else(|| Cursor::new(next))
}

fn next_cursor(body: &serde_json::Map<String, Value>) -> Option<Cursor> {
    body.get("next")
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
        .map(cursor_from_next)
}

/// Normalise a response body into a page.
///
/// `{results, next}` is a page of a paginated listing; a bare array is a
/// final page; a session detail contributes its `messages` as a final page
/// of messages; any other object is a single-item final page.
pub fn parse_page(resource: ResourceKind, body: Value) -> Result<Page<Value>, FetchErrorKind> {
    match body {
        Value::Array(items) => Ok(Page::last(items)),
        Value::Object(mut map) => {
            if let Some(Value::Array(results)) = map.remove("results") {
                let next = next_cursor(&map);
                return Ok(Page::new(results, next));
            }
            if resource == ResourceKind::Messages {
                return match map.remove("messages") {
                    Some(Value::Array(messages)) => Ok(Page::last(messages)),
                    Some(Value::Null) | None => Ok(Page::last(Vec::new())),
                    Some(other) => Err(FetchErrorKind::Decode(format!(
                        "expected a messages array, got {}",
                        type_name(&other)
                    ))),
                };
            }
            Ok(Page::last(vec![Value::Object(map)]))
        }
        other => Err(FetchErrorKind::Decode(format!(
            "expected an object or array, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
