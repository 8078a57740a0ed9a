//! Custom field rows: values, options, and the configuration rows that
//! together describe which fields apply to which issue types.
//!
//! The backup splits field configuration across three kinds. `CustomField`
//! names the field and its type key, `ConfigurationContext` binds a field
//! to a project (or globally), and `FieldConfigSchemeIssueType` constrains
//! a scheme to issue types. The mapping pass joins the three into one
//! `ExternalCustomFieldConfiguration` per field.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::{ExternalCustomFieldOption, ExternalCustomFieldValue};
use crate::xml::Attributes;

pub fn parse_value(attrs: &Attributes) -> Result<ExternalCustomFieldValue> {
    Ok(ExternalCustomFieldValue {
        id: required(kind::CUSTOM_FIELD_VALUE, attrs, "id")?.to_string(),
        custom_field_id: required(kind::CUSTOM_FIELD_VALUE, attrs, "customfield")?.to_string(),
        issue_id: required(kind::CUSTOM_FIELD_VALUE, attrs, "issue")?.to_string(),
        string_value: optional(attrs, "stringvalue"),
        number_value: optional(attrs, "numbervalue"),
        date_value: optional(attrs, "datevalue"),
        text_value: optional(attrs, "textvalue"),
        parent_key: optional(attrs, "parentkey"),
    })
}

#[must_use]
pub fn value_representation(value: &ExternalCustomFieldValue) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), value.id.clone());
    values.insert("customfield".to_string(), value.custom_field_id.clone());
    values.insert("issue".to_string(), value.issue_id.clone());
    push_optional(&mut values, "stringvalue", value.string_value.as_deref());
    push_optional(&mut values, "numbervalue", value.number_value.as_deref());
    push_optional(&mut values, "datevalue", value.date_value.as_deref());
    push_optional(&mut values, "textvalue", value.text_value.as_deref());
    push_optional(&mut values, "parentkey", value.parent_key.as_deref());
    EntityRepresentation::new(kind::CUSTOM_FIELD_VALUE, values)
}

pub fn parse_option(attrs: &Attributes) -> Result<ExternalCustomFieldOption> {
    Ok(ExternalCustomFieldOption {
        id: required(kind::CUSTOM_FIELD_OPTION, attrs, "id")?.to_string(),
        custom_field_id: required(kind::CUSTOM_FIELD_OPTION, attrs, "customfield")?.to_string(),
        field_config_id: required(kind::CUSTOM_FIELD_OPTION, attrs, "customfieldconfig")?
            .to_string(),
        parent_option_id: optional(attrs, "parentoptionid"),
        value: required(kind::CUSTOM_FIELD_OPTION, attrs, "value")?.to_string(),
    })
}

/// A `CustomField` row: (old field id, name, type key).
pub fn parse_field(attrs: &Attributes) -> Result<(String, String, String)> {
    Ok((
        required(kind::CUSTOM_FIELD, attrs, "id")?.to_string(),
        required(kind::CUSTOM_FIELD, attrs, "name")?.to_string(),
        required(kind::CUSTOM_FIELD, attrs, "customfieldtypekey")?.to_string(),
    ))
}

/// A `ConfigurationContext` row scoping a field scheme to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationContext {
    pub scheme_id: String,
    /// The field key, `customfield_{old id}` for custom fields.
    pub field_key: String,
    /// `None` for a global context.
    pub project_id: Option<String>,
}

pub fn parse_configuration_context(attrs: &Attributes) -> Result<ConfigurationContext> {
    Ok(ConfigurationContext {
        scheme_id: required(kind::CONFIGURATION_CONTEXT, attrs, "fieldconfigscheme")?.to_string(),
        field_key: required(kind::CONFIGURATION_CONTEXT, attrs, "key")?.to_string(),
        project_id: optional(attrs, "project"),
    })
}

/// A `FieldConfigSchemeIssueType` row: (scheme id, issue type id or `None`
/// for "all issue types").
pub fn parse_scheme_issue_type(attrs: &Attributes) -> Result<(String, Option<String>)> {
    Ok((
        required(kind::FIELD_CONFIG_SCHEME_ISSUE_TYPE, attrs, "fieldconfigscheme")?.to_string(),
        optional(attrs, "issuetype"),
    ))
}

const CUSTOM_FIELD_KEY_PREFIX: &str = "customfield_";

/// Strip the `customfield_` prefix from a configuration context key.
#[must_use]
pub fn field_id_from_key(field_key: &str) -> Option<&str> {
    field_key.strip_prefix(CUSTOM_FIELD_KEY_PREFIX)
}
