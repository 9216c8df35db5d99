//! CBOR wire representation of items and their sync metadata.
//!
//! A sync is a map with `id`, `updates`, optional `deleted` and
//! `noconflicts` flags (omitted when false), a `history` array (newest
//! first; each entry carries `sequence` and optionally `when` and `by`),
//! an optional `conflicts` array of nested items and an optional `tag`.
//! Items are maps with `id`, `title`, `summary`, `payload` and `sync`.

use crate::error::{ProtocolError, ProtocolResult};
use crate::history::History;
use crate::item::Item;
use crate::sync::SyncMetadata;
use crate::timestamp;
use ciborium::value::Value;

/// Encodes sync metadata to CBOR.
///
/// # Errors
///
/// Returns [`ProtocolError::Codec`] if serialization fails.
pub fn encode_sync(sync: &SyncMetadata) -> ProtocolResult<Vec<u8>> {
    to_bytes(&sync_to_value(sync))
}

/// Decodes sync metadata from CBOR.
///
/// # Errors
///
/// Returns [`ProtocolError::Codec`] for malformed input and
/// [`ProtocolError::InvalidState`] if the decoded sync breaks the
/// `updates`/history invariant.
pub fn decode_sync(bytes: &[u8]) -> ProtocolResult<SyncMetadata> {
    sync_from_value(&from_bytes(bytes)?)
}

/// Encodes an item to CBOR.
///
/// # Errors
///
/// Returns [`ProtocolError::Codec`] if serialization fails.
pub fn encode_item(item: &Item) -> ProtocolResult<Vec<u8>> {
    to_bytes(&item_to_value(item))
}

/// Decodes an item from CBOR.
///
/// # Errors
///
/// Same as [`decode_sync`].
pub fn decode_item(bytes: &[u8]) -> ProtocolResult<Item> {
    item_from_value(&from_bytes(bytes)?)
}

fn to_bytes(value: &Value) -> ProtocolResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| ProtocolError::codec(format!("encoding failed: {e}")))?;
    Ok(buffer)
}

fn from_bytes(bytes: &[u8]) -> ProtocolResult<Value> {
    ciborium::de::from_reader(bytes)
        .map_err(|e| ProtocolError::codec(format!("decoding failed: {e}")))
}

fn key(name: &str) -> Value {
    Value::Text(name.into())
}

fn history_to_value(entry: &History) -> Value {
    let mut pairs = vec![(key("sequence"), Value::Integer(entry.sequence().into()))];
    if let Some(when) = entry.when() {
        pairs.push((key("when"), Value::Text(timestamp::format(&when))));
    }
    if let Some(by) = entry.by() {
        pairs.push((key("by"), Value::Text(by.to_string())));
    }
    Value::Map(pairs)
}

fn sync_to_value(sync: &SyncMetadata) -> Value {
    let mut pairs = vec![
        (key("id"), Value::Text(sync.id().to_string())),
        (key("updates"), Value::Integer(sync.updates().into())),
    ];
    if sync.deleted() {
        pairs.push((key("deleted"), Value::Bool(true)));
    }
    if sync.no_conflicts() {
        pairs.push((key("noconflicts"), Value::Bool(true)));
    }
    pairs.push((
        key("history"),
        Value::Array(sync.history().iter().map(history_to_value).collect()),
    ));
    if sync.has_conflicts() {
        pairs.push((
            key("conflicts"),
            Value::Array(sync.conflicts().iter().map(item_to_value).collect()),
        ));
    }
    if let Some(tag) = sync.tag() {
        pairs.push((key("tag"), Value::Text(tag.to_string())));
    }
    Value::Map(pairs)
}

fn item_to_value(item: &Item) -> Value {
    Value::Map(vec![
        (key("id"), Value::Text(item.id().to_string())),
        (key("title"), Value::Text(item.title().to_string())),
        (key("summary"), Value::Text(item.summary().to_string())),
        (key("payload"), Value::Bytes(item.payload().to_vec())),
        (key("sync"), sync_to_value(item.sync())),
    ])
}

fn as_map<'a>(value: &'a Value, what: &str) -> ProtocolResult<&'a [(Value, Value)]> {
    value
        .as_map()
        .map(Vec::as_slice)
        .ok_or_else(|| ProtocolError::codec(format!("expected map for {what}")))
}

fn get_field<'a>(map: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(name))
        .map(|(_, v)| v)
}

fn get_u32(map: &[(Value, Value)], name: &str) -> ProtocolResult<u32> {
    let integer = get_field(map, name)
        .and_then(Value::as_integer)
        .ok_or_else(|| ProtocolError::codec(format!("missing {name}")))?;
    u32::try_from(integer).map_err(|_| ProtocolError::codec(format!("{name} out of range")))
}

fn get_text<'a>(map: &'a [(Value, Value)], name: &str) -> Option<&'a str> {
    get_field(map, name).and_then(Value::as_text)
}

fn get_flag(map: &[(Value, Value)], name: &str) -> bool {
    get_field(map, name)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn history_from_value(value: &Value) -> ProtocolResult<History> {
    let map = as_map(value, "history entry")?;
    let sequence = get_u32(map, "sequence")?;
    let when = get_text(map, "when").map(timestamp::parse).transpose()?;
    let by = get_text(map, "by");
    History::new(by, when, sequence)
        .map_err(|e| ProtocolError::codec(format!("invalid history entry: {e}")))
}

fn sync_from_value(value: &Value) -> ProtocolResult<SyncMetadata> {
    let map = as_map(value, "sync")?;
    let id = get_text(map, "id").ok_or_else(|| ProtocolError::codec("missing id"))?;
    let updates = get_u32(map, "updates")?;

    let history = match get_field(map, "history") {
        Some(value) => value
            .as_array()
            .ok_or_else(|| ProtocolError::codec("history must be an array"))?
            .iter()
            .map(history_from_value)
            .collect::<ProtocolResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    let conflicts = match get_field(map, "conflicts") {
        Some(value) => value
            .as_array()
            .ok_or_else(|| ProtocolError::codec("conflicts must be an array"))?
            .iter()
            .map(item_from_value)
            .collect::<ProtocolResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    let sync = SyncMetadata::from_parts(
        id,
        updates,
        get_flag(map, "deleted"),
        get_flag(map, "noconflicts"),
        history,
        conflicts,
    )?;
    Ok(sync.with_tag(get_text(map, "tag").map(str::to_owned)))
}

fn item_from_value(value: &Value) -> ProtocolResult<Item> {
    let map = as_map(value, "item")?;
    let sync_value =
        get_field(map, "sync").ok_or_else(|| ProtocolError::codec("missing sync"))?;
    let sync = sync_from_value(sync_value)?;

    if let Some(id) = get_text(map, "id") {
        if id != sync.id() {
            return Err(ProtocolError::codec(format!(
                "item id {id} does not match sync id {}",
                sync.id()
            )));
        }
    }

    let payload = get_field(map, "payload")
        .and_then(Value::as_bytes)
        .cloned()
        .unwrap_or_default();

    Ok(Item::new(
        get_text(map, "title").unwrap_or_default(),
        get_text(map, "summary").unwrap_or_default(),
        payload,
        sync,
    ))
}
