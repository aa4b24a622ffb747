//! Producer-facing action builder.

use super::{
    is_core_field, ActionRecord, ActionResult, ExtraValue, RecordError, CATEGORY_CLICK,
    CATEGORY_ERROR, CATEGORY_ROUTE_CHANGE, DEFAULT_PATH, DEFAULT_ROUTE,
};
use std::collections::BTreeMap;

/// An action as reported by a producer, before defaults are applied.
///
/// ```ignore
/// let input = ActionInput::new(CATEGORY_LOGIN)
///     .failed()
///     .with_extra("account", "treexie");
/// buffer.record(input)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionInput {
    category: String,
    route: Option<String>,
    path: Option<String>,
    result: ActionResult,
    time: Option<u64>,
    extra: BTreeMap<String, ExtraValue>,
}

impl ActionInput {
    pub fn new(category: impl Into<String>) -> Self {
        ActionInput {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn click() -> Self {
        Self::new(CATEGORY_CLICK)
    }

    /// Navigation reported by the router.
    pub fn route_change(route: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(CATEGORY_ROUTE_CHANGE)
            .with_route(route)
            .with_path(path)
    }

    /// Exception-class failure carrying its message as an extra field.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CATEGORY_ERROR)
            .failed()
            .with_extra("message", message.into())
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_result(mut self, result: ActionResult) -> Self {
        self.result = result;
        self
    }

    pub fn failed(self) -> Self {
        self.with_result(ActionResult::Fail)
    }

    /// Explicit epoch-seconds timestamp. Zero means "fill at record time".
    pub fn at(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Apply defaults and check the core/extra partition.
    pub fn normalize(self, now_secs: u64) -> Result<ActionRecord, RecordError> {
        if self.category.is_empty() {
            return Err(RecordError::EmptyCategory);
        }
        if let Some(key) = self.extra.keys().find(|key| is_core_field(key)) {
            return Err(RecordError::ReservedKey(key.clone()));
        }
        // A NaN would persist as null and poison the whole snapshot on load
        if let Some((key, _)) = self.extra.iter().find(|(_, value)| !value.is_finite()) {
            return Err(RecordError::NonFiniteExtra(key.clone()));
        }

        Ok(ActionRecord {
            category: self.category,
            route: non_empty_or(self.route, DEFAULT_ROUTE),
            path: non_empty_or(self.path, DEFAULT_PATH),
            result: self.result,
            time: self.time.filter(|t| *t != 0).unwrap_or(now_secs),
            extra: self.extra,
        })
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(s) if !s.is_empty() => s,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CATEGORY_LOGIN;

    #[test]
    fn test_normalize_defaults() {
        let record = ActionInput::new(CATEGORY_LOGIN).normalize(1234).unwrap();
        assert_eq!(record.category(), "login");
        assert_eq!(record.route(), "unknown");
        assert_eq!(record.path(), "/");
        assert_eq!(record.result(), ActionResult::Success);
        assert_eq!(record.time(), 1234);
        assert!(record.extra().is_empty());
    }

    #[test]
    fn test_normalize_keeps_explicit_values() {
        let record = ActionInput::route_change("novelDetail", "/novels/3")
            .at(99)
            .normalize(1234)
            .unwrap();
        assert_eq!(record.route(), "novelDetail");
        assert_eq!(record.path(), "/novels/3");
        assert_eq!(record.time(), 99);
    }

    #[test]
    fn test_error_action_carries_message() {
        let record = ActionInput::error("request aborted").normalize(1).unwrap();
        assert_eq!(record.category(), CATEGORY_ERROR);
        assert_eq!(record.result(), ActionResult::Fail);
        assert_eq!(
            record.extra().get("message").and_then(ExtraValue::as_str),
            Some("request aborted")
        );
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = ActionInput::default().normalize(1).unwrap_err();
        assert_eq!(err, RecordError::EmptyCategory);
    }

    #[test]
    fn test_reserved_extra_key_rejected() {
        let err = ActionInput::click()
            .with_extra("route", "sneaky")
            .normalize(1)
            .unwrap_err();
        assert_eq!(err, RecordError::ReservedKey("route".to_string()));
    }

    #[test]
    fn test_non_finite_extra_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = ActionInput::click()
                .with_extra("ratio", value)
                .normalize(1)
                .unwrap_err();
            assert_eq!(err, RecordError::NonFiniteExtra("ratio".to_string()));
        }

        let record = ActionInput::click()
            .with_extra("ratio", 0.25)
            .normalize(1)
            .unwrap();
        assert_eq!(record.extra().get("ratio"), Some(&ExtraValue::Float(0.25)));
    }
}
