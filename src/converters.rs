//! App Engine field conversions.
//!
//! Legacy `app.yaml` fields and the configuration API disagree on a few shapes:
//! enums are prefixed constants, durations are `"<seconds>s"` strings, and url
//! handlers nest their type-specific fields in a sub-object. These helpers
//! translate single values; [`convert_handlers`] restructures a whole document.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::path::DocPath;

const SECONDS_PER_MINUTE: u64 = 60;
const MILLISECONDS_PER_SECOND: f64 = 1000.0;

const COMMON_HANDLER_FIELDS: &[&str] = &[
    "urlRegex",
    "login",
    "authFailAction",
    "securityLevel",
    "redirectHttpResponseCode",
];

const STATIC_FILES_FIELDS: &[&str] = &[
    "path",
    "uploadPathRegex",
    "httpHeaders",
    "expiration",
    "applicationReadable",
    "mimeType",
    "requireMatchingFile",
];

const SCRIPT_FIELDS: &[&str] = &["scriptPath"];

/// How a legacy handler field value maps onto the API value.
#[derive(Clone, Copy)]
enum FieldValue {
    Keep,
    Enum(&'static str),
    Expiration,
}

/// Legacy `app.yaml` handler fields and their API names.
const LEGACY_HANDLER_FIELDS: &[(&str, &str, FieldValue)] = &[
    ("url", "urlRegex", FieldValue::Keep),
    ("static_files", "path", FieldValue::Keep),
    ("static_dir", "staticDir", FieldValue::Keep),
    ("upload", "uploadPathRegex", FieldValue::Keep),
    ("http_headers", "httpHeaders", FieldValue::Keep),
    ("expiration", "expiration", FieldValue::Expiration),
    ("application_readable", "applicationReadable", FieldValue::Keep),
    ("mime_type", "mimeType", FieldValue::Keep),
    ("require_matching_file", "requireMatchingFile", FieldValue::Keep),
    ("script", "scriptPath", FieldValue::Keep),
    ("api_endpoint", "apiEndpoint", FieldValue::Keep),
    ("login", "login", FieldValue::Enum("LOGIN")),
    ("secure", "securityLevel", FieldValue::Enum("SECURE")),
    ("auth_fail_action", "authFailAction", FieldValue::Enum("AUTH_FAIL_ACTION")),
    (
        "redirect_http_response_code",
        "redirectHttpResponseCode",
        FieldValue::Enum("REDIRECT_HTTP_RESPONSE_CODE"),
    ),
];

static PENDING_LATENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+((\.[0-9]{1,3})?s|ms)|automatic)$").expect("valid latency regex")
});

static IDLE_TIMEOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(s|m)$").expect("valid idle timeout regex"));

static EXPIRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[0-9]+([DdHhMm]|[sS]?)(\s+[0-9]+([DdHhMm]|[sS]?))*\s*$")
        .expect("valid expiration regex")
});

/// Why a field could not be converted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionError {
    InvalidPrefix { prefix: String, reason: &'static str },
    ExpectedBoolean { got: String },
    ExpectedPrimitive { got: String },
    ExpectedString { got: String },
    ExpectedMapping { got: String },
    InvalidInteger { value: String },
    UnrecognizedLatency { value: String },
    UnrecognizedIdleTimeout { value: String },
    UnrecognizedExpiration { value: String },
    UnrecognizedHandler { handler: String },
    MissingField { field: &'static str },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::InvalidPrefix { prefix, reason } => {
                write!(f, "invalid enum prefix `{prefix}`: {reason}")
            }
            ConversionError::ExpectedBoolean { got } => {
                write!(f, "expected a boolean value, got {got}")
            }
            ConversionError::ExpectedPrimitive { got } => {
                write!(f, "expected a primitive value, got {got}")
            }
            ConversionError::ExpectedString { got } => write!(f, "expected a string, got {got}"),
            ConversionError::ExpectedMapping { got } => {
                write!(f, "expected a mapping, got {got}")
            }
            ConversionError::InvalidInteger { value } => write!(f, "invalid integer: {value}"),
            ConversionError::UnrecognizedLatency { value } => {
                write!(f, "unrecognized latency: {value}")
            }
            ConversionError::UnrecognizedIdleTimeout { value } => {
                write!(f, "unrecognized idle timeout: {value}")
            }
            ConversionError::UnrecognizedExpiration { value } => {
                write!(f, "unrecognized expiration: {value}")
            }
            ConversionError::UnrecognizedHandler { handler } => {
                write!(f, "unrecognized handler type: {handler}")
            }
            ConversionError::MissingField { field } => write!(f, "missing field `{field}`"),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Translates lower-case option values into prefixed enum constants.
///
/// ```rust
/// use convert_yaml::converters::EnumConverter;
///
/// let login = EnumConverter::new("LOGIN").unwrap();
/// assert_eq!(login.convert("admin"), "LOGIN_ADMIN");
/// assert!(EnumConverter::new("login").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumConverter {
    prefix: String,
}

impl EnumConverter {
    pub fn new(prefix: &str) -> Result<Self, ConversionError> {
        let invalid = |reason| ConversionError::InvalidPrefix {
            prefix: prefix.to_owned(),
            reason,
        };
        if prefix.is_empty() {
            return Err(invalid("a prefix must be provided"));
        }
        if prefix != prefix.to_uppercase() {
            return Err(invalid("the prefix must be upper case"));
        }
        if prefix.ends_with('_') {
            return Err(invalid("the prefix must not end with an underscore"));
        }
        Ok(Self {
            prefix: prefix.to_owned(),
        })
    }

    pub fn convert(&self, value: &str) -> String {
        format!("{}_{}", self.prefix, value.to_uppercase())
    }
}

/// Negate a boolean.
pub fn not(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(ConversionError::ExpectedBoolean {
            got: other.to_string(),
        }),
    }
}

/// JSON text of a primitive, with strings unquoted. `None` for arrays and objects.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerce a primitive into a string: `true`/`false`, `null`, numbers as JSON text.
pub fn to_json_string(value: &Value) -> Result<String, ConversionError> {
    scalar_text(value).ok_or_else(|| ConversionError::ExpectedPrimitive {
        got: value.to_string(),
    })
}

/// Integer value of a string or number. With `handle_automatic`, the string
/// `"automatic"` is 0. Fractional numbers are truncated.
pub fn string_to_int(value: &Value, handle_automatic: bool) -> Result<i64, ConversionError> {
    let invalid = || ConversionError::InvalidInteger {
        value: value.to_string(),
    };
    match value {
        Value::String(s) if handle_automatic && s == "automatic" => Ok(0),
        Value::String(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map_err(|_| invalid()),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n
                .as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
                .ok_or_else(invalid),
        },
        _ => Err(invalid()),
    }
}

/// Whole seconds as a duration string: `30` becomes `"30s"`.
pub fn seconds_to_duration(value: &Value) -> Result<String, ConversionError> {
    Ok(format!("{}s", string_to_int(value, false)?))
}

/// Pending latency (`X.Ys`, `Nms` or `automatic`) as a duration in seconds.
/// `automatic` has no duration and yields `None`.
pub fn latency_to_duration(value: &str) -> Result<Option<String>, ConversionError> {
    if !PENDING_LATENCY.is_match(value) {
        return Err(ConversionError::UnrecognizedLatency {
            value: value.to_owned(),
        });
    }
    if value == "automatic" {
        return Ok(None);
    }
    match value.strip_suffix("ms") {
        Some(millis) => {
            let millis: f64 = millis
                .parse()
                .map_err(|_| ConversionError::UnrecognizedLatency {
                    value: value.to_owned(),
                })?;
            Ok(Some(format!(
                "{}s",
                float_str(millis / MILLISECONDS_PER_SECOND)
            )))
        }
        None => Ok(Some(value.to_owned())),
    }
}

/// Idle timeout (`Ns` or `Nm`) as a duration in seconds.
pub fn idle_timeout_to_duration(value: &str) -> Result<String, ConversionError> {
    let unrecognized = || ConversionError::UnrecognizedIdleTimeout {
        value: value.to_owned(),
    };
    if !IDLE_TIMEOUT.is_match(value) {
        return Err(unrecognized());
    }
    match value.strip_suffix('m') {
        Some(minutes) => {
            let seconds = minutes
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(SECONDS_PER_MINUTE))
                .ok_or_else(unrecognized)?;
            Ok(format!("{seconds}s"))
        }
        None => Ok(value.to_owned()),
    }
}

/// Static file expiration (`"4d 5h"`, `"30m"`, `"10"`) as a duration in seconds.
pub fn expiration_to_duration(value: &str) -> Result<String, ConversionError> {
    let unrecognized = || ConversionError::UnrecognizedExpiration {
        value: value.to_owned(),
    };
    if !EXPIRATION.is_match(value) {
        return Err(unrecognized());
    }
    let mut total: u64 = 0;
    for delta in value.split_whitespace() {
        let digits_end = delta
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(delta.len());
        let (count, unit) = delta.split_at(digits_end);
        let multiplier = match unit {
            "d" | "D" => 24 * 60 * 60,
            "h" | "H" => 60 * 60,
            "m" | "M" => 60,
            _ => 1,
        };
        total = count
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(unrecognized)?;
    }
    Ok(format!("{total}s"))
}

/// Float text as Python 2's `str` writes it: `%.12g`, with `.0` appended when
/// the result reads as an integer. Exponents carry a sign and two digits.
fn float_str(f: f64) -> String {
    const SIGNIFICANT: i32 = 12;
    if f == 0.0 {
        return "0.0".to_owned();
    }
    // Rounding to the significant digits first settles the exponent (9.9999999999995 -> 10).
    let sci = format!("{:.*e}", (SIGNIFICANT - 1) as usize, f);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= SIGNIFICANT {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs());
    }
    let precision = (SIGNIFICANT - 1 - exp) as usize;
    let fixed = format!("{f:.precision$}");
    let text = trim_fraction(&fixed);
    if text.contains('.') {
        text.to_owned()
    } else {
        format!("{text}.0")
    }
}

/// Drop trailing fractional zeros, and the point if nothing is left after it.
fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandlerType {
    ApiEndpoint,
    StaticDirectory,
    StaticFiles,
    Script,
}

impl HandlerType {
    fn of(handler: &Map<String, Value>) -> Result<Self, ConversionError> {
        if handler.contains_key("apiEndpoint") {
            Ok(HandlerType::ApiEndpoint)
        } else if handler.contains_key("staticDir") {
            Ok(HandlerType::StaticDirectory)
        } else if handler.contains_key("path") {
            Ok(HandlerType::StaticFiles)
        } else if handler.contains_key("scriptPath") {
            Ok(HandlerType::Script)
        } else {
            Err(ConversionError::UnrecognizedHandler {
                handler: Value::Object(handler.clone()).to_string(),
            })
        }
    }

    fn key(self) -> &'static str {
        match self {
            HandlerType::ApiEndpoint => "apiEndpoint",
            HandlerType::StaticDirectory => "staticDirectory",
            HandlerType::StaticFiles => "staticFiles",
            HandlerType::Script => "script",
        }
    }

    fn fields(self) -> &'static [&'static str] {
        match self {
            HandlerType::StaticFiles | HandlerType::StaticDirectory => STATIC_FILES_FIELDS,
            HandlerType::Script | HandlerType::ApiEndpoint => SCRIPT_FIELDS,
        }
    }
}

fn append_regex(path: &str, regex: &str) -> String {
    format!("{}/{regex}", path.trim_end_matches('/'))
}

fn string_field(handler: &Map<String, Value>, field: &'static str) -> Result<String, ConversionError> {
    match handler.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConversionError::ExpectedString {
            got: other.to_string(),
        }),
        None => Err(ConversionError::MissingField { field }),
    }
}

/// Nest the type-specific fields of a url handler under its type.
///
/// `staticDir` handlers are rewritten as the equivalent `staticFiles` handler
/// first. Fields that belong to neither the type nor the common set are dropped.
///
/// ```rust
/// use serde_json::json;
///
/// let handler = json!({"urlRegex": "/img", "staticDir": "static/img/"});
/// let Some(handler) = handler.as_object().cloned() else { unreachable!() };
/// let converted = convert_yaml::converters::convert_url_handler(handler).unwrap();
/// assert_eq!(
///     serde_json::Value::Object(converted),
///     json!({
///         "staticFiles": {"path": r"static/img/\1", "uploadPathRegex": "static/img/.*"},
///         "urlRegex": "/img/(.*)",
///     })
/// );
/// ```
pub fn convert_url_handler(
    mut handler: Map<String, Value>,
) -> Result<Map<String, Value>, ConversionError> {
    let mut handler_type = HandlerType::of(&handler)?;

    if handler_type == HandlerType::StaticDirectory {
        let dir = string_field(&handler, "staticDir")?;
        let url = string_field(&handler, "urlRegex")?;
        handler.remove("staticDir");
        handler.insert("path".into(), Value::String(append_regex(&dir, r"\1")));
        handler.insert("uploadPathRegex".into(), Value::String(append_regex(&dir, ".*")));
        handler.insert("urlRegex".into(), Value::String(append_regex(&url, "(.*)")));
        handler_type = HandlerType::StaticFiles;
    }

    let mut specific = Map::new();
    for field in handler_type.fields() {
        if let Some(value) = handler.remove(*field) {
            specific.insert((*field).to_owned(), value);
        }
    }

    let mut converted = Map::new();
    converted.insert(handler_type.key().to_owned(), Value::Object(specific));
    for field in COMMON_HANDLER_FIELDS {
        if let Some(value) = handler.remove(*field) {
            converted.insert((*field).to_owned(), value);
        }
    }
    Ok(converted)
}

/// Rename the fields of a handler written in legacy `app.yaml` form (it has a
/// `url` field) to their API names, converting enum and expiration values.
/// Handlers already in API form, and unknown fields, are left as they are.
///
/// ```rust
/// use serde_json::json;
///
/// let handler = json!({"url": "/.*", "script": "main.app", "secure": "always"});
/// let Some(handler) = handler.as_object().cloned() else { unreachable!() };
/// let renamed = convert_yaml::converters::rename_legacy_handler(handler).unwrap();
/// assert_eq!(
///     serde_json::Value::Object(renamed),
///     json!({"urlRegex": "/.*", "scriptPath": "main.app", "securityLevel": "SECURE_ALWAYS"})
/// );
/// ```
pub fn rename_legacy_handler(
    handler: Map<String, Value>,
) -> Result<Map<String, Value>, ConversionError> {
    if !handler.contains_key("url") {
        return Ok(handler);
    }
    let mut renamed = Map::new();
    for (key, value) in handler {
        let Some((_, api_name, field)) = LEGACY_HANDLER_FIELDS
            .iter()
            .find(|(legacy, _, _)| *legacy == key)
        else {
            renamed.insert(key, value);
            continue;
        };
        let value = match field {
            FieldValue::Keep => value,
            FieldValue::Enum(prefix) => {
                Value::String(EnumConverter::new(prefix)?.convert(&to_json_string(&value)?))
            }
            FieldValue::Expiration => {
                Value::String(expiration_to_duration(&to_json_string(&value)?)?)
            }
        };
        renamed.insert((*api_name).to_owned(), value);
    }
    Ok(renamed)
}

/// Apply [`convert_url_handler`] to every entry of the top-level `handlers` list,
/// after [`rename_legacy_handler`]. Documents without one are left alone.
pub fn convert_handlers(root: &mut Value) -> Result<(), Error> {
    let Some(Value::Array(handlers)) = root.get_mut("handlers") else {
        return Ok(());
    };
    for (idx, entry) in handlers.iter_mut().enumerate() {
        let converted = match entry.take() {
            Value::Object(handler) => rename_legacy_handler(handler).and_then(convert_url_handler),
            other => Err(ConversionError::ExpectedMapping {
                got: other.to_string(),
            }),
        };
        *entry = Value::Object(converted.map_err(|cause| Error::Conversion {
            cause,
            path: DocPath::root().join("handlers").join(idx),
        })?);
    }
    tracing::debug!(handlers = handlers.len(), "restructured url handlers");
    Ok(())
}
