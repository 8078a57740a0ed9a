//! File attachment records.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::ExternalAttachment;
use crate::xml::Attributes;
use std::path::{Path, PathBuf};

/// Where an attachment's bytes live on disk, relative to the backup's
/// attachment directory: `<base>/<PROJECT KEY>/<ISSUE KEY>/<attachment id>`.
#[must_use]
pub fn file_path(
    base: &Path,
    project_key: &str,
    issue_key: &str,
    attachment: &ExternalAttachment,
) -> PathBuf {
    base.join(project_key).join(issue_key).join(&attachment.id)
}

pub fn parse(attrs: &Attributes) -> Result<ExternalAttachment> {
    Ok(ExternalAttachment {
        id: required(kind::ATTACHMENT, attrs, "id")?.to_string(),
        issue_id: required(kind::ATTACHMENT, attrs, "issue")?.to_string(),
        file_name: required(kind::ATTACHMENT, attrs, "filename")?.to_string(),
        attacher: optional(attrs, "author"),
        created: optional(attrs, "created"),
    })
}

#[must_use]
pub fn representation(attachment: &ExternalAttachment) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), attachment.id.clone());
    values.insert("issue".to_string(), attachment.issue_id.clone());
    values.insert("filename".to_string(), attachment.file_name.clone());
    push_optional(&mut values, "author", attachment.attacher.as_deref());
    push_optional(&mut values, "created", attachment.created.as_deref());
    EntityRepresentation::new(kind::ATTACHMENT, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_mandatory() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "400".to_string());
        attrs.insert("issue".to_string(), "10000".to_string());
        assert!(parse(&attrs).is_err());
        attrs.insert("filename".to_string(), "screenshot.png".to_string());
        assert_eq!(parse(&attrs).unwrap().file_name, "screenshot.png");
    }
}
