//! Parameter models for the evaluated schema
//!
//! One [`Parameter`] describes one configurable field as the service
//! evaluated it: its type, widget form, default and current value,
//! selectable options and validation rules. Names are unique within a
//! response; `order` is used only for display sequencing.

use serde::{Deserialize, Serialize};

use super::Diagnostic;

/// One schema-defined configurable field with its evaluated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Unique identifier within a response
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Value type (e.g. string, number)
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    /// Widget classification hint from the service
    #[serde(default)]
    pub form_type: FormType,
    /// Evaluated default, which may be unknown (invalid) when it
    /// depends on inputs the service could not resolve
    #[serde(default)]
    pub default_value: NullString,
    /// Current evaluated value for this field
    #[serde(default)]
    pub value: NullString,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub options: Vec<ParameterOption>,
    #[serde(default)]
    pub validations: Vec<ParameterValidation>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub mutable: bool,
    /// Ephemeral parameters reset on every evaluation instead of
    /// persisting their value
    #[serde(default)]
    pub ephemeral: bool,
    /// Display ordering; ties keep the response's original order
    #[serde(default)]
    pub order: i64,
    /// Diagnostics scoped to this parameter, rendered inline with it
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// A string value plus a validity flag.
///
/// The service evaluates expressions that may reference unknown
/// inputs; an unresolvable value arrives with `valid == false` and
/// must not be displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullString {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub valid: bool,
}

impl NullString {
    pub fn some(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            valid: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// The value when valid, otherwise `None`.
    pub fn as_option(&self) -> Option<&str> {
        self.valid.then_some(self.value.as_str())
    }
}

/// One selectable option of a dropdown/radio/multi-select parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: String,
    #[serde(default)]
    pub icon: String,
}

/// Validation constraints the service applies to a parameter value.
///
/// The client never evaluates these; they are relayed so a
/// presentation layer can hint at them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValidation {
    #[serde(rename = "validation_regex", default)]
    pub regex: Option<String>,
    #[serde(rename = "validation_error", default)]
    pub error: String,
    #[serde(rename = "validation_min", default)]
    pub min: Option<i64>,
    #[serde(rename = "validation_max", default)]
    pub max: Option<i64>,
    #[serde(rename = "validation_monotonic", default)]
    pub monotonic: Option<String>,
}

/// Value type of a parameter.
///
/// Tolerant on the wire for the same reason as [`FormType`]: the
/// service has shipped both `bool` and `boolean` spellings, and an
/// unrecognized type on one parameter must not blank the whole
/// evaluation frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ParameterType {
    #[default]
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "list(string)")]
    ListString,
    #[serde(rename = "unknown")]
    Unknown,
}

impl From<String> for ParameterType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            // Both spellings occur across service revisions.
            "bool" | "boolean" => Self::Bool,
            "list(string)" => Self::ListString,
            _ => Self::Unknown,
        }
    }
}

/// Widget form of a parameter as declared by the schema.
///
/// The set of known forms is closed; anything else deserializes to
/// [`FormType::Unknown`] so an unrecognized or missing `form_type`
/// degrades to a diagnostics-only field instead of a parse failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum FormType {
    Dropdown,
    MultiSelect,
    Slider,
    Radio,
    Switch,
    Checkbox,
    Textarea,
    Input,
    #[default]
    Unknown,
}

impl From<String> for FormType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dropdown" => Self::Dropdown,
            "multi-select" => Self::MultiSelect,
            "slider" => Self::Slider,
            "radio" => Self::Radio,
            "switch" => Self::Switch,
            "checkbox" => Self::Checkbox,
            "textarea" => Self::Textarea,
            "input" => Self::Input,
            _ => Self::Unknown,
        }
    }
}
