//! User and group records.

use super::{kind, optional, required};
use crate::error::Result;
use crate::model::ExternalUser;
use crate::xml::Attributes;

pub fn parse(attrs: &Attributes) -> Result<ExternalUser> {
    Ok(ExternalUser {
        name: required(kind::USER, attrs, "userName")?.to_string(),
        full_name: optional(attrs, "displayName"),
        email: optional(attrs, "emailAddress"),
    })
}

/// A `Group` row is only a name.
pub fn parse_group(attrs: &Attributes) -> Result<String> {
    Ok(required(kind::GROUP, attrs, "groupName")?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_is_the_identity() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "10010".to_string());
        attrs.insert("userName".to_string(), "fred".to_string());
        attrs.insert("displayName".to_string(), "Fred Flintstone".to_string());
        let user = parse(&attrs).unwrap();
        assert_eq!(user.name, "fred");
        assert_eq!(user.display_name(), "Fred Flintstone");
    }
}
