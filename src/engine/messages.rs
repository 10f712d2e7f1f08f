//! User-facing messages for rejected submissions.
//!
//! The remote service rejects an edit with a numeric code and a JSON
//! description holding template variables plus a `placeholder` text. Codes
//! flagged user-friendly in the error-message classifier have a localized
//! template whose `{name}` tokens are filled from that description.

use hashbrown::HashMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{edit::EditResponseError, engine::coordinator::DeliveryFailure};

/// `errorMessages` classifier as served by the classifier endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorMessageClassifier {
    #[serde(default)]
    pub options: Vec<ErrorMessageOption>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessageOption {
    pub id: i64,
    /// Template text per language code.
    #[serde(default)]
    pub description: HashMap<String, String>,
    #[serde(default)]
    pub is_user_friendly: bool,
}

/// Lookup of user-friendly templates by error code.
#[derive(Debug, Clone, Default)]
pub struct ErrorMessageCatalog {
    templates: HashMap<i64, HashMap<String, String>>,
}

impl ErrorMessageCatalog {
    pub fn new(options: impl IntoIterator<Item = ErrorMessageOption>) -> Self {
        let mut templates = HashMap::new();
        for option in options.into_iter().filter(|option| option.is_user_friendly) {
            templates.entry(option.id).or_insert(option.description);
        }
        Self { templates }
    }

    pub fn from_classifier(classifier: ErrorMessageClassifier) -> Self {
        Self::new(classifier.options)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_classifier(serde_json::from_str(json)?))
    }

    pub fn template(&self, code: i64, language: &str) -> Option<&str> {
        self.templates
            .get(&code)
            .and_then(|by_language| by_language.get(language))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Builds the failure reported for a rejected edit.
///
/// A description that is not valid JSON is treated like a malformed
/// response: the failure carries neither code nor message.
pub fn classify_rejection(
    error: &EditResponseError,
    catalog: &ErrorMessageCatalog,
    language: &str,
) -> DeliveryFailure {
    let description: Value = match serde_json::from_str(&error.description) {
        Ok(value) => value,
        Err(err) => {
            warn!(code = error.code, error = %err, "unparseable error description");
            return DeliveryFailure::transport();
        }
    };
    let message = match catalog.template(error.code, language) {
        Some(template) => Some(render_template(template, &description)),
        None => description
            .get("placeholder")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    DeliveryFailure::rejected(error.code, message)
}

/// Replaces each `{name}` in `template` whose value in `vars` is truthy.
/// Tokens with a missing or falsy value stay as written.
pub fn render_template(template: &str, vars: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if close > 0 => {
                let name = &after[..close];
                match vars.get(name).filter(|value| is_truthy(value)) {
                    Some(value) => out.push_str(&display_value(value)),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

