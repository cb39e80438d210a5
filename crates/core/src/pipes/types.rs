//! Data model shared by the fetch and emit stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multi-valued, ordered string metadata attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Vec<String>>);

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to a key, keeping previous values.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces all values of a key with a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Returns the first value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Returns every value of a key.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Where to fetch a resource from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchKey {
    /// Name of the fetcher that knows how to resolve the key.
    pub fetcher_name: String,
    /// Fetcher-specific key (path, URL, object key, ...).
    pub fetch_key: String,
}

impl FetchKey {
    pub fn new(fetcher_name: impl Into<String>, fetch_key: impl Into<String>) -> Self {
        Self {
            fetcher_name: fetcher_name.into(),
            fetch_key: fetch_key.into(),
        }
    }
}

/// Where to emit the extracted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitKey {
    /// Name of the emitter that receives the result.
    pub emitter_name: String,
    /// Emitter-specific key (output path, index id, ...).
    pub emit_key: String,
}

impl EmitKey {
    pub fn new(emitter_name: impl Into<String>, emit_key: impl Into<String>) -> Self {
        Self {
            emitter_name: emitter_name.into(),
            emit_key: emit_key.into(),
        }
    }
}

/// What the processing client should do when parsing fails part way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnParseException {
    /// Drop whatever was extracted.
    Skip,
    /// Emit whatever was extracted, together with the exception.
    #[default]
    Emit,
}

/// One unit of work: fetch a resource, process it, emit the result.
///
/// Fields are private so a tuple cannot change once it has been handed
/// to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchEmitTuple {
    id: String,
    fetch_key: FetchKey,
    emit_key: EmitKey,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    on_parse_exception: OnParseException,
}

impl FetchEmitTuple {
    /// Creates a tuple with a generated id.
    pub fn new(fetch_key: FetchKey, emit_key: EmitKey) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), fetch_key, emit_key)
    }

    /// Creates a tuple with a caller-supplied tracking id.
    pub fn with_id(id: impl Into<String>, fetch_key: FetchKey, emit_key: EmitKey) -> Self {
        Self {
            id: id.into(),
            fetch_key,
            emit_key,
            metadata: Metadata::default(),
            on_parse_exception: OnParseException::default(),
        }
    }

    /// Attaches user metadata that is forwarded to the emitter.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the parse-exception policy.
    pub fn with_on_parse_exception(mut self, policy: OnParseException) -> Self {
        self.on_parse_exception = policy;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fetch_key(&self) -> &FetchKey {
        &self.fetch_key
    }

    pub fn emit_key(&self) -> &EmitKey {
        &self.emit_key
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn on_parse_exception(&self) -> OnParseException {
        self.on_parse_exception
    }
}

/// Extracted content ready to be handed to an emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitData {
    /// Destination of the result.
    pub emit_key: EmitKey,
    /// Container document first, then one entry per embedded document.
    pub metadata_list: Vec<Metadata>,
}

impl EmitData {
    pub fn new(emit_key: EmitKey, metadata_list: Vec<Metadata>) -> Self {
        Self {
            emit_key,
            metadata_list,
        }
    }

    /// Rough size of the payload in bytes (keys plus values).
    pub fn estimated_size_bytes(&self) -> usize {
        self.metadata_list
            .iter()
            .flat_map(|m| m.iter())
            .map(|(k, vs)| k.len() + vs.iter().map(String::len).sum::<usize>())
            .sum()
    }
}

/// Outcome category of processing one tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipesStatus {
    ParseSuccess,
    ParseSuccessWithException,
    ParseException,
    FetchException,
    Timeout,
    OutOfMemory,
    UnspecifiedCrash,
}

impl PipesStatus {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseSuccess => "parse_success",
            Self::ParseSuccessWithException => "parse_success_with_exception",
            Self::ParseException => "parse_exception",
            Self::FetchException => "fetch_exception",
            Self::Timeout => "timeout",
            Self::OutOfMemory => "out_of_memory",
            Self::UnspecifiedCrash => "unspecified_crash",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::ParseSuccess | Self::ParseSuccessWithException)
    }
}

impl std::fmt::Display for PipesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one tuple.
///
/// Only the success variants carry an [`EmitData`], so a payload exists
/// exactly when the status is a success.
#[derive(Debug, Clone, PartialEq)]
pub enum PipesResult {
    /// Parsed cleanly.
    ParseSuccess(EmitData),
    /// Parsed, but something non-fatal went wrong (e.g. an embedded file).
    ParseSuccessWithException { data: EmitData, message: String },
    /// The parser failed on the fetched bytes.
    ParseException { cause: String },
    /// The resource could not be fetched.
    FetchException { cause: String },
    /// Processing exceeded the client's time limit.
    Timeout,
    /// The processing client ran out of memory.
    OutOfMemory,
    /// The processing client died or its transport broke.
    UnspecifiedCrash,
}

impl PipesResult {
    pub fn status(&self) -> PipesStatus {
        match self {
            Self::ParseSuccess(_) => PipesStatus::ParseSuccess,
            Self::ParseSuccessWithException { .. } => PipesStatus::ParseSuccessWithException,
            Self::ParseException { .. } => PipesStatus::ParseException,
            Self::FetchException { .. } => PipesStatus::FetchException,
            Self::Timeout => PipesStatus::Timeout,
            Self::OutOfMemory => PipesStatus::OutOfMemory,
            Self::UnspecifiedCrash => PipesStatus::UnspecifiedCrash,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Borrow the payload, present only on success.
    pub fn emit_data(&self) -> Option<&EmitData> {
        match self {
            Self::ParseSuccess(data) | Self::ParseSuccessWithException { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Payload to hand to the emitter.
    ///
    /// Only a clean parse is emitted. A parse that hit an exception keeps
    /// its payload for the reporter but is never emitted.
    pub fn emittable(&self) -> Option<&EmitData> {
        match self {
            Self::ParseSuccess(data) => Some(data),
            _ => None,
        }
    }

    /// Failure cause, if the variant carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::ParseSuccessWithException { message, .. } => Some(message),
            Self::ParseException { cause } | Self::FetchException { cause } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> EmitData {
        let mut m = Metadata::new();
        m.set("Content-Type", "application/pdf");
        EmitData::new(EmitKey::new("fs", "out/a.json"), vec![m])
    }

    #[test]
    fn test_metadata_add_and_set() {
        let mut m = Metadata::new();
        m.add("author", "a");
        m.add("author", "b");
        assert_eq!(m.get("author"), Some("a"));
        assert_eq!(m.get_all("author"), &["a".to_string(), "b".to_string()]);

        m.set("author", "c");
        assert_eq!(m.get_all("author"), &["c".to_string()]);
        assert!(m.get_all("missing").is_empty());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_tuple_generates_unique_ids() {
        let a = FetchEmitTuple::new(FetchKey::new("fs", "a.pdf"), EmitKey::new("fs", "a.json"));
        let b = FetchEmitTuple::new(FetchKey::new("fs", "a.pdf"), EmitKey::new("fs", "a.json"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.fetch_key(), b.fetch_key());
        assert_eq!(a.on_parse_exception(), OnParseException::Emit);
    }

    #[test]
    fn test_tuple_deserialize_defaults() {
        let json = r#"{
            "id": "t-1",
            "fetch_key": {"fetcher_name": "fs", "fetch_key": "doc.docx"},
            "emit_key": {"emitter_name": "fs", "emit_key": "doc.json"}
        }"#;
        let tuple: FetchEmitTuple = serde_json::from_str(json).unwrap();
        assert_eq!(tuple.id(), "t-1");
        assert!(tuple.metadata().is_empty());
        assert_eq!(tuple.on_parse_exception(), OnParseException::Emit);
    }

    #[test]
    fn test_payload_only_on_success() {
        let clean = PipesResult::ParseSuccess(sample_data());
        assert!(clean.emit_data().is_some());
        assert!(clean.emittable().is_some());

        let with_exception = PipesResult::ParseSuccessWithException {
            data: sample_data(),
            message: "embedded file skipped".to_string(),
        };
        assert!(with_exception.is_success());
        assert!(with_exception.emit_data().is_some());
        assert!(with_exception.emittable().is_none());

        let failures = [
            PipesResult::ParseException {
                cause: "bad xref".to_string(),
            },
            PipesResult::FetchException {
                cause: "not found".to_string(),
            },
            PipesResult::Timeout,
            PipesResult::OutOfMemory,
            PipesResult::UnspecifiedCrash,
        ];
        for result in failures {
            assert!(!result.is_success());
            assert!(result.emit_data().is_none());
            assert!(result.emittable().is_none());
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PipesStatus::UnspecifiedCrash).unwrap();
        assert_eq!(json, "\"unspecified_crash\"");
        assert_eq!(PipesStatus::OutOfMemory.to_string(), "out_of_memory");
    }

    #[test]
    fn test_estimated_size() {
        let data = sample_data();
        assert_eq!(
            data.estimated_size_bytes(),
            "Content-Type".len() + "application/pdf".len()
        );
    }
}
