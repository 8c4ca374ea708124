use rocket::serde::json::{
    serde_json::{self, Map, Value},
    Error as JsonError, Json,
};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A JSON request body as a route receives it: the parsed value, or the
/// reason it could not be parsed.
pub type JsonBody<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

/// A request type that reports malformed bodies as typed failures.
pub trait RequestBody: DeserializeOwned {
    /// The failure for a JSON object that does not deserialise into `Self`.
    fn shape_error(_fields: &Map<String, Value>, cause: &serde_json::Error) -> Error {
        Error::InvalidInput(format!("Malformed request body: {cause}"))
    }

    /// Unwrap a received body.
    fn from_body(body: JsonBody<'_, Self>) -> Result<Self> {
        match body {
            Ok(body) => Ok(body.into_inner()),
            Err(JsonError::Io(e)) => Err(Error::InvalidInput(format!(
                "Cannot read request body: {e}"
            ))),
            Err(JsonError::Parse(raw, cause)) => Err(match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(fields)) => Self::shape_error(&fields, &cause),
                _ => Error::InvalidInput(format!("Malformed request body: {cause}")),
            }),
        }
    }
}

/// Is this the failure produced by an empty body?
pub fn is_empty_body<T>(body: &JsonBody<'_, T>) -> bool {
    matches!(body, Err(JsonError::Parse(raw, _)) if raw.trim().is_empty())
}
