//! Action Records
//!
//! A client action is a flat event with five core fields and an explicit
//! map of extra scalar fields:
//!
//! ```text
//! { category, route, path, result, time, extra: { ... } }
//! ```
//!
//! The partition between core and extra is a static contract: extra keys
//! can never use a core field name, so splitting a record for the wire and
//! merging it back into a flat object are lossless inverses.

mod extra;
mod input;

pub use extra::ExtraValue;
pub use input::ActionInput;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default UI interaction category
pub const CATEGORY_CLICK: &str = "click";
pub const CATEGORY_LOGIN: &str = "login";
pub const CATEGORY_REGISTER: &str = "register";
/// Router navigation
pub const CATEGORY_ROUTE_CHANGE: &str = "routeChange";
/// Runtime exceptions and aborted requests (not business failures)
pub const CATEGORY_ERROR: &str = "error";

pub const DEFAULT_ROUTE: &str = "unknown";
pub const DEFAULT_PATH: &str = "/";

/// Names that belong to the core record and are never allowed in `extra`.
pub const CORE_FIELDS: [&str; 5] = ["category", "route", "path", "result", "time"];

pub fn is_core_field(key: &str) -> bool {
    CORE_FIELDS.contains(&key)
}

/// Error type for building action records
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("action category must not be empty")]
    EmptyCategory,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("core field `{0}` has an invalid value")]
    InvalidField(&'static str),
    #[error("invalid result code {0}, expected 0 or 1")]
    InvalidResult(u64),
    #[error("extra key `{0}` collides with a core field")]
    ReservedKey(String),
    #[error("extra field `{0}` is not a scalar")]
    NonScalarExtra(String),
    #[error("extra field `{0}` is not a finite number")]
    NonFiniteExtra(String),
    #[error("action buffer is closed")]
    Closed,
}

/// Outcome code of an action: 0 = success, 1 = failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActionResult {
    #[default]
    Success,
    Fail,
}

impl ActionResult {
    pub fn code(self) -> u8 {
        match self {
            ActionResult::Success => 0,
            ActionResult::Fail => 1,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, RecordError> {
        match code {
            0 => Ok(ActionResult::Success),
            1 => Ok(ActionResult::Fail),
            other => Err(RecordError::InvalidResult(other)),
        }
    }
}

impl From<ActionResult> for u8 {
    fn from(result: ActionResult) -> Self {
        result.code()
    }
}

impl TryFrom<u8> for ActionResult {
    type Error = RecordError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ActionResult::from_code(u64::from(code))
    }
}

/// A normalized client action.
///
/// Built through [`ActionInput::normalize`] or [`ActionRecord::from_flat`],
/// both of which fill the defaults and enforce the core/extra partition.
/// The serde form is the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    category: String,
    route: String,
    path: String,
    result: ActionResult,
    time: u64,
    #[serde(default)]
    extra: BTreeMap<String, ExtraValue>,
}

impl ActionRecord {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn result(&self) -> ActionResult {
        self.result
    }

    /// Epoch seconds
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn extra(&self) -> &BTreeMap<String, ExtraValue> {
        &self.extra
    }

    /// Partition a flat JSON object into core fields and extras.
    ///
    /// Absent (or empty / zero) `route`, `path` and `time` take their defaults,
    /// `result` defaults to success, and `category` is required. Every
    /// non-core key must hold a scalar.
    pub fn from_flat(object: Map<String, Value>, now_secs: u64) -> Result<Self, RecordError> {
        let mut category = None;
        let mut input = ActionInput::default();

        for (key, value) in object {
            match key.as_str() {
                "category" => match value {
                    Value::String(s) => category = Some(s),
                    _ => return Err(RecordError::InvalidField("category")),
                },
                "route" => input = input.with_route(optional_string(value, "route")?),
                "path" => input = input.with_path(optional_string(value, "path")?),
                "result" => {
                    let code = match value {
                        Value::Null => 0,
                        other => other.as_u64().ok_or(RecordError::InvalidField("result"))?,
                    };
                    input = input.with_result(ActionResult::from_code(code)?);
                }
                "time" => {
                    let time = match value {
                        Value::Null => 0,
                        other => other.as_u64().ok_or(RecordError::InvalidField("time"))?,
                    };
                    input = input.at(time);
                }
                _ => {
                    let extra = ExtraValue::from_json(&value)
                        .ok_or_else(|| RecordError::NonScalarExtra(key.clone()))?;
                    input = input.with_extra(key, extra);
                }
            }
        }

        let category = category.ok_or(RecordError::MissingField("category"))?;
        input.with_category(category).normalize(now_secs)
    }

    /// Merge core fields and extras back into one flat JSON object.
    pub fn into_flat(self) -> Map<String, Value> {
        let mut object = Map::with_capacity(CORE_FIELDS.len() + self.extra.len());
        object.insert("category".to_string(), Value::String(self.category));
        object.insert("route".to_string(), Value::String(self.route));
        object.insert("path".to_string(), Value::String(self.path));
        object.insert("result".to_string(), Value::from(self.result.code()));
        object.insert("time".to_string(), Value::from(self.time));
        for (key, value) in self.extra {
            object.insert(key, value.to_json());
        }
        object
    }
}

fn optional_string(value: Value, field: &'static str) -> Result<String, RecordError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        _ => Err(RecordError::InvalidField(field)),
    }
}

/// Wire payload posted to the ingestion endpoint: `{"actions": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionBatch {
    actions: Vec<ActionRecord>,
}

impl ActionBatch {
    pub fn new(actions: Vec<ActionRecord>) -> Self {
        ActionBatch { actions }
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<ActionRecord> {
        self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
