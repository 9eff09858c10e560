//! Projection of an accepted response into renderable field descriptors
//!
//! The projector is pure: it sorts parameters for display, resolves
//! the value each field should show, and classifies every parameter
//! into a widget kind a presentation layer can dispatch on.

use crate::models::{Diagnostic, FormType, Parameter, ParameterOption};
use crate::protocol::Response;

/// Widget classification of a projected field.
///
/// Matches on this enum are exhaustive by construction; a form kind
/// the schema declares but this client does not know arrives as
/// [`WidgetKind::Unsupported`] and renders diagnostics only, with no
/// input control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Dropdown,
    MultiSelect,
    Slider,
    Radio,
    Switch,
    Checkbox,
    Textarea,
    Input,
    Unsupported,
}

impl WidgetKind {
    /// Whether this widget accepts user input at all.
    pub fn is_editable(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl From<FormType> for WidgetKind {
    fn from(form: FormType) -> Self {
        match form {
            FormType::Dropdown => Self::Dropdown,
            FormType::MultiSelect => Self::MultiSelect,
            FormType::Slider => Self::Slider,
            FormType::Radio => Self::Radio,
            FormType::Switch => Self::Switch,
            FormType::Checkbox => Self::Checkbox,
            FormType::Textarea => Self::Textarea,
            FormType::Input => Self::Input,
            FormType::Unknown => Self::Unsupported,
        }
    }
}

/// One renderable field projected from a [`Parameter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Display name, falling back to `name` when the schema gave none
    pub label: String,
    pub description: String,
    pub widget: WidgetKind,
    /// Resolved display value: the evaluated value when valid, else
    /// the default when valid, else empty
    pub value: String,
    pub options: Vec<ParameterOption>,
    pub required: bool,
    pub mutable: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Projects an accepted response into display order.
///
/// Sorts by `order` ascending; ties keep the response's original
/// relative order. The sort must be stable - tied parameters reorder
/// between responses otherwise, and the form jumps under the user.
pub fn project(response: &Response) -> Vec<FieldDescriptor> {
    let mut params: Vec<&Parameter> = response.parameters.iter().collect();
    params.sort_by_key(|p| p.order);
    params.into_iter().map(project_parameter).collect()
}

fn project_parameter(param: &Parameter) -> FieldDescriptor {
    let label = if param.display_name.is_empty() {
        param.name.clone()
    } else {
        param.display_name.clone()
    };

    let value = param
        .value
        .as_option()
        .or_else(|| param.default_value.as_option())
        .unwrap_or_default()
        .to_string();

    FieldDescriptor {
        name: param.name.clone(),
        label,
        description: param.description.clone(),
        widget: param.form_type.into(),
        value,
        options: param.options.clone(),
        required: param.required,
        mutable: param.mutable,
        diagnostics: param.diagnostics.clone(),
    }
}
