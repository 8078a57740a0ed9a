//! Entity properties and labels.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::{ExternalEntityProperty, ExternalLabel};
use crate::xml::Attributes;

pub fn parse_property(attrs: &Attributes) -> Result<ExternalEntityProperty> {
    let kind_name = kind::ENTITY_PROPERTY;
    Ok(ExternalEntityProperty {
        id: required(kind_name, attrs, "id")?.to_string(),
        entity_name: required(kind_name, attrs, "entityName")?.to_string(),
        entity_id: required(kind_name, attrs, "entityId")?.to_string(),
        property_key: required(kind_name, attrs, "propertyKey")?.to_string(),
        value: optional(attrs, "value"),
    })
}

#[must_use]
pub fn property_representation(property: &ExternalEntityProperty) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), property.id.clone());
    values.insert("entityName".to_string(), property.entity_name.clone());
    values.insert("entityId".to_string(), property.entity_id.clone());
    values.insert("propertyKey".to_string(), property.property_key.clone());
    push_optional(&mut values, "value", property.value.as_deref());
    EntityRepresentation::new(kind::ENTITY_PROPERTY, values)
}

pub fn parse_label(attrs: &Attributes) -> Result<ExternalLabel> {
    Ok(ExternalLabel {
        id: required(kind::LABEL, attrs, "id")?.to_string(),
        issue_id: required(kind::LABEL, attrs, "issue")?.to_string(),
        label: required(kind::LABEL, attrs, "label")?.to_string(),
    })
}

#[must_use]
pub fn label_representation(label: &ExternalLabel) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), label.id.clone());
    values.insert("issue".to_string(), label.issue_id.clone());
    values.insert("label".to_string(), label.label.clone());
    EntityRepresentation::new(kind::LABEL, values)
}
