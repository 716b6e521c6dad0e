//! Claude Code hook protocol handling.
//!
//! This module handles the stdin/exit-code protocol for the Claude Code
//! `PreToolUse` hook on file reads. It reads the full request, decodes it
//! leniently, extracts the path the tool wants to read, and writes the
//! denial message.

use memchr::memmem;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

/// The exact line written to stderr when a read is blocked.
pub const DENY_MESSAGE: &str = "You cannot read the .env file.";

/// Exit status telling the host to block the tool call and surface stderr.
pub const DENY_EXIT_CODE: u8 = 2;

/// Exit status for input that could not be understood.
///
/// Distinct from both 0 (allow) and 2 (deny).
pub const MALFORMED_INPUT_EXIT_CODE: u8 = 1;

/// Decoded `PreToolUse` request.
///
/// Only the string fields we care about are kept. Any field with an unexpected
/// shape is treated as absent rather than failing the decode, and unknown
/// fields are skipped without being materialized.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookInput {
    /// The name of the tool being invoked (e.g., "Read").
    pub tool_name: Option<String>,

    /// The hook event name (always "`PreToolUse`" in practice).
    pub hook_event_name: Option<String>,

    /// Host session identifier.
    pub session_id: Option<String>,

    /// Working directory of the host session.
    pub cwd: Option<String>,

    /// Tool-specific parameters. Empty when `tool_input` is absent or not an object.
    pub tool_input: ToolInput,
}

/// The path-bearing fields of `tool_input`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolInput {
    /// `tool_input.file_path`, when it is a string.
    pub file_path: Option<String>,
    /// `tool_input.path`, when it is a string.
    pub path: Option<String>,
}

/// Which `tool_input` field supplied the candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    /// `tool_input.file_path`
    FilePath,
    /// `tool_input.path`
    Path,
    /// Neither field held a non-empty string.
    None,
}

impl PathSource {
    /// Dotted field name for logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FilePath => "tool_input.file_path",
            Self::Path => "tool_input.path",
            Self::None => "none",
        }
    }
}

/// The path a read request targets, borrowed from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePath<'a> {
    pub path: &'a str,
    pub source: PathSource,
}

/// Error type for reading and decoding hook input.
#[derive(Debug, Error)]
pub enum HookReadError {
    /// Failed to read stdin to end-of-stream.
    #[error("failed to read hook input: {0}")]
    Io(#[from] io::Error),

    /// Input was not a valid JSON document.
    #[error("failed to parse hook input as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was the JSON literal `null`, which has no fields to read.
    #[error("hook input is null")]
    NullRequest,
}

impl HookInput {
    /// Decode a request from raw bytes.
    ///
    /// Invalid UTF-8 sequences become U+FFFD and unpaired `\uD800`-`\uDFFF`
    /// escapes become `\uFFFD` before parsing, so neither can hide a path.
    /// A top-level value that is not an object decodes as an empty request.
    ///
    /// # Errors
    ///
    /// Returns [`HookReadError::Json`] for malformed JSON (including empty
    /// input) and [`HookReadError::NullRequest`] for a bare `null`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HookReadError> {
        let decoded = String::from_utf8_lossy(bytes);
        let text = replace_lone_surrogates(&decoded);
        let Request(input) = serde_json::from_str(&text)?;
        input.ok_or(HookReadError::NullRequest)
    }

    /// Build a request from an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`HookReadError::NullRequest`] when `value` is `null`.
    pub fn from_value(value: Value) -> Result<Self, HookReadError> {
        let Request(input) = Request::deserialize(value)?;
        input.ok_or(HookReadError::NullRequest)
    }

    /// Extract the path the tool wants to read.
    ///
    /// `file_path` wins when it is a non-empty string; otherwise `path` is used
    /// under the same rule. Falls back to the empty string.
    #[must_use]
    pub fn candidate_path(&self) -> CandidatePath<'_> {
        if let Some(path) = non_empty(self.tool_input.file_path.as_deref()) {
            return CandidatePath {
                path,
                source: PathSource::FilePath,
            };
        }
        if let Some(path) = non_empty(self.tool_input.path.as_deref()) {
            return CandidatePath {
                path,
                source: PathSource::Path,
            };
        }
        CandidatePath {
            path: "",
            source: PathSource::None,
        }
    }
}

/// Read the whole stream, then decode it as one hook request.
///
/// Blocks until the producer closes the stream; there is no size limit and no
/// framing.
///
/// # Errors
///
/// Returns [`HookReadError::Io`] if the stream cannot be read, otherwise the
/// errors of [`HookInput::from_slice`].
pub fn read_hook_input<R: Read>(mut reader: R) -> Result<HookInput, HookReadError> {
    let mut buf = Vec::with_capacity(512);
    reader.read_to_end(&mut buf)?;
    HookInput::from_slice(&buf)
}

/// Write the denial line.
///
/// Write errors are ignored: the exit status alone still blocks the call.
#[cold]
#[inline(never)]
pub fn output_denial<W: Write>(writer: &mut W) {
    let _ = writeln!(writer, "{DENY_MESSAGE}");
    let _ = writer.flush();
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Rewrite `\u` escapes of unpaired UTF-16 surrogates as `\uFFFD`.
///
/// serde_json rejects lone surrogates outright. Only the escape itself is
/// replaced, so the surrounding text, `.env` included, is untouched.
fn replace_lone_surrogates(text: &str) -> Cow<'_, str> {
    if memmem::find(text.as_bytes(), b"\\u").is_none() {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) != Some(&b'u') {
            // Any other escape, including `\\`, is two bytes long.
            i += 2;
            continue;
        }
        let Some(unit) = escaped_code_unit(bytes, i) else {
            i += 2;
            continue;
        };
        if !(0xD800..=0xDFFF).contains(&unit) {
            i += 6;
            continue;
        }
        if (0xD800..=0xDBFF).contains(&unit)
            && escaped_code_unit(bytes, i + 6).is_some_and(|low| (0xDC00..=0xDFFF).contains(&low))
        {
            i += 12;
            continue;
        }

        let out = out.get_or_insert_with(|| String::with_capacity(text.len()));
        out.push_str(&text[copied..i]);
        out.push_str("\\uFFFD");
        i += 6;
        copied = i;
    }

    match out {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// Parse the `\uXXXX` escape starting at `at`.
fn escaped_code_unit(bytes: &[u8], at: usize) -> Option<u16> {
    let escape = bytes.get(at..at + 6)?;
    if escape[0] != b'\\' || escape[1] != b'u' || !escape[2..].iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let hex = std::str::from_utf8(&escape[2..]).ok()?;
    u16::from_str_radix(hex, 16).ok()
}

// ============================================================================
// Lenient decoding
// ============================================================================
//
// Unknown fields go through `IgnoredAny`, which skips nested data without
// recursing. Fields of the wrong shape decode as absent. Later duplicate keys
// overwrite earlier ones.

/// Top-level request. `None` when the document is `null`.
struct Request(Option<HookInput>);

/// A value that only matters when it is a string.
struct LenientString(Option<String>);

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RequestVisitor)
    }
}

struct RequestVisitor;

impl<'de> Visitor<'de> for RequestVisitor {
    type Value = Request;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hook request")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Request, A::Error> {
        let mut input = HookInput::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "tool_name" => input.tool_name = map.next_value::<LenientString>()?.0,
                "hook_event_name" => input.hook_event_name = map.next_value::<LenientString>()?.0,
                "session_id" => input.session_id = map.next_value::<LenientString>()?.0,
                "cwd" => input.cwd = map.next_value::<LenientString>()?.0,
                "tool_input" => input.tool_input = map.next_value::<ToolInput>()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Request(Some(input)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Request, E> {
        Ok(Request(None))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Request, A::Error> {
        IgnoredAny.visit_seq(seq)?;
        Ok(Request(Some(HookInput::default())))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Request, E> {
        Ok(Request(Some(HookInput::default())))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Request, E> {
        Ok(Request(Some(HookInput::default())))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Request, E> {
        Ok(Request(Some(HookInput::default())))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Request, E> {
        Ok(Request(Some(HookInput::default())))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Request, E> {
        Ok(Request(Some(HookInput::default())))
    }
}

impl<'de> Deserialize<'de> for ToolInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ToolInputVisitor)
    }
}

struct ToolInputVisitor;

impl<'de> Visitor<'de> for ToolInputVisitor {
    type Value = ToolInput;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("tool parameters")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ToolInput, A::Error> {
        let mut tool_input = ToolInput::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "file_path" => tool_input.file_path = map.next_value::<LenientString>()?.0,
                "path" => tool_input.path = map.next_value::<LenientString>()?.0,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(tool_input)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<ToolInput, A::Error> {
        IgnoredAny.visit_seq(seq)?;
        Ok(ToolInput::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<ToolInput, E> {
        Ok(ToolInput::default())
    }
}

impl<'de> Deserialize<'de> for LenientString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientStringVisitor)
    }
}

struct LenientStringVisitor;

impl<'de> Visitor<'de> for LenientStringVisitor {
    type Value = LenientString;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<LenientString, E> {
        Ok(LenientString(Some(value.to_owned())))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<LenientString, E> {
        Ok(LenientString(Some(value)))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<LenientString, A::Error> {
        IgnoredAny.visit_map(map)?;
        Ok(LenientString(None))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<LenientString, A::Error> {
        IgnoredAny.visit_seq(seq)?;
        Ok(LenientString(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LenientString, E> {
        Ok(LenientString(None))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<LenientString, E> {
        Ok(LenientString(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<LenientString, E> {
        Ok(LenientString(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<LenientString, E> {
        Ok(LenientString(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<LenientString, E> {
        Ok(LenientString(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HookInput {
        HookInput::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_read_input() {
        let input = parse(
            r#"{"session_id": "abc", "hook_event_name": "PreToolUse", "tool_name": "Read", "tool_input": {"file_path": "/project/src/main.rs"}}"#,
        );
        assert_eq!(input.tool_name.as_deref(), Some("Read"));
        assert_eq!(input.hook_event_name.as_deref(), Some("PreToolUse"));
        assert_eq!(input.session_id.as_deref(), Some("abc"));
        let candidate = input.candidate_path();
        assert_eq!(candidate.path, "/project/src/main.rs");
        assert_eq!(candidate.source, PathSource::FilePath);
    }

    #[test]
    fn test_file_path_takes_precedence_over_path() {
        let input =
            parse(r#"{"tool_input": {"file_path": "/tmp/safe.txt", "path": "/tmp/.env"}}"#);
        assert_eq!(input.candidate_path().path, "/tmp/safe.txt");
    }

    #[test]
    fn test_empty_file_path_falls_back_to_path() {
        let input = parse(r#"{"tool_input": {"file_path": "", "path": "/x/.env"}}"#);
        let candidate = input.candidate_path();
        assert_eq!(candidate.path, "/x/.env");
        assert_eq!(candidate.source, PathSource::Path);
    }

    #[test]
    fn test_non_string_file_path_falls_back_to_path() {
        let input = parse(r#"{"tool_input": {"file_path": 42, "path": "/x/.env"}}"#);
        assert_eq!(input.candidate_path().path, "/x/.env");

        let input = parse(r#"{"tool_input": {"file_path": {"nested": true}}}"#);
        assert_eq!(input.candidate_path().path, "");
    }

    #[test]
    fn test_missing_tool_input_yields_empty_path() {
        let input = parse("{}");
        let candidate = input.candidate_path();
        assert_eq!(candidate.path, "");
        assert_eq!(candidate.source, PathSource::None);
    }

    #[test]
    fn test_tool_input_of_unexpected_shape_is_ignored() {
        for json in [
            r#"{"tool_input": null}"#,
            r#"{"tool_input": "/project/.env"}"#,
            r#"{"tool_input": ["/project/.env"]}"#,
        ] {
            assert_eq!(parse(json).candidate_path().path, "", "input: {json}");
        }
    }

    #[test]
    fn test_non_string_metadata_is_dropped() {
        let input = parse(r#"{"tool_name": 7, "cwd": ["/"], "tool_input": {}}"#);
        assert!(input.tool_name.is_none());
        assert!(input.cwd.is_none());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = HookInput::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, HookReadError::Json(_)));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = HookInput::from_slice(b"").unwrap_err();
        assert!(matches!(err, HookReadError::Json(_)));
    }

    #[test]
    fn test_invalid_utf8_in_path_still_denies() {
        let bytes = b"{\"tool_input\":{\"file_path\":\"\xff/.env\"}}";
        let input = HookInput::from_slice(bytes).unwrap();
        assert_eq!(input.candidate_path().path, "\u{FFFD}/.env");
    }

    #[test]
    fn test_invalid_utf8_in_unrelated_field_is_tolerated() {
        let bytes = b"{\"tool_input\":{\"file_path\":\"/p/a.txt\"},\"cwd\":\"x\xfey\"}";
        let input = HookInput::from_slice(bytes).unwrap();
        assert_eq!(input.candidate_path().path, "/p/a.txt");
        assert_eq!(input.cwd.as_deref(), Some("x\u{FFFD}y"));
    }

    #[test]
    fn test_lone_surrogate_escapes_are_replaced() {
        let input = parse(r#"{"tool_input":{"file_path":"\ud800/.env"}}"#);
        assert_eq!(input.candidate_path().path, "\u{FFFD}/.env");

        let input = parse(r#"{"tool_input":{"path":"/x/\udc00.env\ud800"}}"#);
        assert_eq!(input.candidate_path().path, "/x/\u{FFFD}.env\u{FFFD}");
    }

    #[test]
    fn test_surrogate_pairs_are_kept() {
        let input = parse(r#"{"tool_input":{"file_path":"/\ud83d\ude00/.env"}}"#);
        assert_eq!(input.candidate_path().path, "/\u{1F600}/.env");
    }

    #[test]
    fn test_replace_lone_surrogates_leaves_other_escapes_alone() {
        assert!(matches!(replace_lone_surrogates(r#"{"a":"plain"}"#), Cow::Borrowed(_)));
        // An escaped backslash followed by `ud800` is not a unicode escape.
        let text = r#"{"a":"\\ud800"}"#;
        assert_eq!(replace_lone_surrogates(text), text);
        assert_eq!(replace_lone_surrogates(r#""A\ud800x""#), r#""A\uFFFDx""#);
        assert_eq!(replace_lone_surrogates(r#""\ud800\ud800""#), r#""\uFFFD\uFFFD""#);
    }

    #[test]
    fn test_top_level_non_object_is_an_empty_request() {
        for json in ["[]", r#"[{"tool_input":{"file_path":"/p/.env"}}]"#, "5", "\"s\"", "true"] {
            let input = parse(json);
            assert_eq!(input, HookInput::default(), "input: {json}");
            assert_eq!(input.candidate_path().source, PathSource::None);
        }
    }

    #[test]
    fn test_null_is_an_error() {
        let err = HookInput::from_slice(b"null").unwrap_err();
        assert!(matches!(err, HookReadError::NullRequest));
        assert!(matches!(
            HookInput::from_value(Value::Null),
            Err(HookReadError::NullRequest)
        ));
    }

    #[test]
    fn test_deeply_nested_unknown_fields_are_skipped() {
        let depth = 10_000;
        let nested = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let json = format!(
            r#"{{"extra":{nested},"tool_input":{{"meta":{nested},"file_path":"/p/.env"}}}}"#
        );
        assert_eq!(parse(&json).candidate_path().path, "/p/.env");

        let json = format!(r#"{{"tool_input":{{"file_path":{nested},"path":"/x/.env"}}}}"#);
        assert_eq!(parse(&json).candidate_path().path, "/x/.env");
    }

    #[test]
    fn test_duplicate_keys_keep_the_last_value() {
        let input = parse(r#"{"tool_input":{"file_path":"/p/.env","file_path":"/p/a.txt"}}"#);
        assert_eq!(input.candidate_path().path, "/p/a.txt");
    }

    #[test]
    fn test_from_value_matches_from_slice() {
        let value = serde_json::json!({
            "tool_name": "Read",
            "tool_input": {"file_path": 3, "path": "/x/.env"},
        });
        let input = HookInput::from_value(value).unwrap();
        assert_eq!(input.tool_name.as_deref(), Some("Read"));
        assert_eq!(input.candidate_path().path, "/x/.env");
    }

    #[test]
    fn test_read_hook_input_reads_to_end_of_stream() {
        // Chained readers deliver the document in pieces, like a pipe would.
        let head: &[u8] = br#"{"tool_input": {"fi"#;
        let tail: &[u8] = br#"le_path": "/project/.env"}}"#;
        let input = read_hook_input(head.chain(tail)).unwrap();
        assert_eq!(input.candidate_path().path, "/project/.env");
    }

    #[test]
    fn test_read_hook_input_propagates_io_errors() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
        }
        let err = read_hook_input(FailingReader).unwrap_err();
        assert!(matches!(err, HookReadError::Io(_)));
    }

    #[test]
    fn test_output_denial_writes_exact_line() {
        let mut buf = Vec::new();
        output_denial(&mut buf);
        assert_eq!(String::from_utf8(buf).unwrap(), "You cannot read the .env file.\n");
    }

    #[test]
    fn test_path_source_labels() {
        assert_eq!(PathSource::FilePath.label(), "tool_input.file_path");
        assert_eq!(PathSource::Path.label(), "tool_input.path");
        assert_eq!(PathSource::None.label(), "none");
    }
}
