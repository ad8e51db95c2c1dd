//! Shape rules applied to tags before they are stored.

use lazy_static::lazy_static;
use regex::Regex;

use crate::media::MediaKind;

use super::models::{MediaUrls, NewTag};

pub const MAX_FILE_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_REFERENCE_LEN: usize = 200;

lazy_static! {
    static ref MEDIA_URL_PATTERN: Regex = Regex::new(r"(?i)^https?://\S+$").unwrap();
}

/// Check a new tag, collecting every violation.
pub fn validate_new_tag(tag: &NewTag) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let file_name = tag.file_name.trim();
    if file_name.is_empty() {
        errors.push("File name is required".to_string());
    } else if file_name.chars().count() > MAX_FILE_NAME_LEN {
        errors.push(format!(
            "File name cannot be more than {} characters",
            MAX_FILE_NAME_LEN
        ));
    }

    if tag.description.trim().chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(format!(
            "Description cannot be more than {} characters",
            MAX_DESCRIPTION_LEN
        ));
    }

    check_reference("Hash address", tag.fingerprint.as_str(), &mut errors);
    check_reference("Media CID", &tag.media_cid, &mut errors);
    check_reference("Metadata CID", &tag.metadata_cid, &mut errors);
    check_reference("User address", &tag.owner, &mut errors);

    if let Err(mut url_errors) = validate_urls(tag.media_kind, &tag.urls) {
        errors.append(&mut url_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// URL rules shared by creation and URL edits: every URL is http(s) and the
/// declared kind keeps at least one.
pub fn validate_urls(kind: MediaKind, urls: &MediaUrls) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = urls
        .all()
        .into_iter()
        .filter(|url| !MEDIA_URL_PATTERN.is_match(url.trim()))
        .map(|url| format!("Media URL must be an http(s) URL: {}", url))
        .collect();

    if urls.for_kind(kind).is_empty() {
        errors.push(format!("At least one {} URL is required", kind.as_str()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_reference(field: &str, value: &str, errors: &mut Vec<String>) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{} is required", field));
    } else if value.len() > MAX_REFERENCE_LEN {
        errors.push(format!(
            "{} cannot be more than {} characters",
            field, MAX_REFERENCE_LEN
        ));
    }
}
