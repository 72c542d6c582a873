//! Upstream record builders.
//!
//! Shapes follow the OpenChatStudio API closely enough for the wire
//! decoders; fields the pipeline ignores are left out.

use ocsmetrics_types::{Cursor, Page};
use serde_json::{Value, json};

const CREATED_AT: &str = "2025-03-01T09:00:00Z";

/// Session listing record for `experiment` at `version`
pub fn session(id: &str, participant: &str, experiment: &str, version: u32) -> Value {
    session_with(id, participant, experiment, version, &[], None)
}

pub fn session_with(
    id: &str,
    participant: &str,
    experiment: &str,
    version: u32,
    tags: &[&str],
    rating: Option<f64>,
) -> Value {
    json!({
        "id": id,
        "team": { "name": "ECD Nigeria", "slug": "ecd-nigeria" },
        "experiment": { "id": format!("exp-{}", experiment.to_lowercase()), "name": experiment, "version_number": version },
        "participant": { "identifier": participant },
        "created_at": CREATED_AT,
        "updated_at": CREATED_AT,
        "tags": tags.iter().map(|tag| json!({ "name": tag })).collect::<Vec<_>>(),
        "rating": rating,
    })
}

/// Message record without an id; the decoder assigns one from its position
pub fn message(role: &str, content: &str) -> Value {
    json!({
        "role": role,
        "content": content,
        "created_at": CREATED_AT,
    })
}

pub fn participant_message(content: &str) -> Value {
    message("user", content)
}

pub fn bot_message(content: &str) -> Value {
    message("assistant", content)
}

/// Experiment record listing `versions`, with `default` marked as default
pub fn experiment(name: &str, versions: &[u32], default: u32) -> Value {
    json!({
        "id": format!("exp-{}", name.to_lowercase()),
        "name": name,
        "version_number": default,
        "versions": versions
            .iter()
            .map(|number| json!({
                "name": name,
                "version_number": number,
                "is_default_version": *number == default,
                "version_description": format!("{} v{}", name, number),
            }))
            .collect::<Vec<_>>(),
    })
}

/// Split `items` into pages of `per_page`, linked by cursors
/// `<prefix>-2`, `<prefix>-3`, ...
pub fn paginate(items: Vec<Value>, per_page: usize, prefix: &str) -> Vec<Page<Value>> {
    let per_page = per_page.max(1);
    let chunks: Vec<Vec<Value>> = items.chunks(per_page).map(<[Value]>::to_vec).collect();
    let total = chunks.len();

    if total == 0 {
        return vec![Page::last(Vec::new())];
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let next = (index + 1 < total).then(|| Cursor::new(format!("{}-{}", prefix, index + 2)));
            Page::new(chunk, next)
        })
        .collect()
}

/// Split records into pages whose cursors name the last record served,
/// `after-<id>`, the way keyset pagination does. Inserting a record ahead
/// of a page changes the cursor that leads to it.
pub fn paginate_after(items: Vec<Value>, per_page: usize) -> Vec<Page<Value>> {
    let per_page = per_page.max(1);
    let chunks: Vec<Vec<Value>> = items.chunks(per_page).map(<[Value]>::to_vec).collect();
    let total = chunks.len();

    if total == 0 {
        return vec![Page::last(Vec::new())];
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let next = (index + 1 < total)
                .then(|| chunk.last().and_then(|item| item["id"].as_str()))
                .flatten()
                .map(|id| Cursor::new(format!("after-{}", id)));
            Page::new(chunk, next)
        })
        .collect()
}

/// Mark a session record as changed upstream at `updated_at`
pub fn touched(mut session: Value, updated_at: &str) -> Value {
    session["updated_at"] = json!(updated_at);
    session
}
