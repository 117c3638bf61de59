use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub type Id = i64;

/// Zoom levels accepted for training runs and feedback.
pub const MIN_ZOOM_LEVEL: i32 = 19;
pub const MAX_ZOOM_LEVEL: i32 = 23;

pub const MAX_NAME_LENGTH: usize = 255;

/// Key used for errors that are not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Validation messages keyed by payload field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Resolve to `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

pub(crate) const REQUIRED: &str = "This field is required.";

/// Take a required payload field, recording the standard message when absent.
pub(crate) fn required<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// Validate a free-text name: trimmed, non-blank, bounded length.
pub(crate) fn validate_name(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    let Some(value) = required(errors, field, value) else {
        return String::new();
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", MAX_NAME_LENGTH),
        );
    }
    trimmed.to_string()
}

/// Imagery references must be absolute http(s) URLs (usually a TMS template).
pub(crate) fn validate_source_imagery(errors: &mut FieldErrors, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => errors.add(field, "Enter a valid URL."),
    }
}

pub(crate) fn validate_zoom_level(errors: &mut FieldErrors, field: &str, zoom: i32) {
    if !(MIN_ZOOM_LEVEL..=MAX_ZOOM_LEVEL).contains(&zoom) {
        errors.add(
            field,
            format!(
                "\"{}\" is not a valid choice, expected {}..={}.",
                zoom, MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL
            ),
        );
    }
}

/// Message used when a referenced record does not exist.
pub fn missing_reference_message(id: Id) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_accumulate_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());

        errors.add("geom", "first");
        errors.add("geom", "second");
        errors.add("name", REQUIRED);

        assert_eq!(errors.get("geom").unwrap().len(), 2);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["geom", "name"]);
        assert_eq!(
            errors.to_string(),
            "geom: first; geom: second; name: This field is required."
        );
        assert!(errors.finish(()).is_err());
    }

    #[test]
    fn test_validate_name_trims_and_rejects_blank() {
        let mut errors = FieldErrors::new();
        let name = validate_name(&mut errors, "name", Some("  Dataset one ".to_string()));
        assert_eq!(name, "Dataset one");
        assert!(errors.is_empty());

        validate_name(&mut errors, "name", Some("   ".to_string()));
        assert_eq!(
            errors.get("name"),
            Some(&["This field may not be blank.".to_string()][..])
        );
    }

    #[test]
    fn test_source_imagery_must_be_http_url() {
        let mut errors = FieldErrors::new();
        validate_source_imagery(&mut errors, "source_imagery", "https://www.testurl.com");
        validate_source_imagery(
            &mut errors,
            "source_imagery",
            "https://tiles.example.org/{z}/{x}/{y}.png",
        );
        assert!(errors.is_empty());

        validate_source_imagery(&mut errors, "source_imagery", "ftp://example.org/tiles");
        validate_source_imagery(&mut errors, "source_imagery", "not a url");
        assert_eq!(errors.get("source_imagery").unwrap().len(), 2);
    }

    #[test]
    fn test_zoom_level_bounds() {
        let mut errors = FieldErrors::new();
        validate_zoom_level(&mut errors, "zoom_level", 19);
        validate_zoom_level(&mut errors, "zoom_level", 23);
        assert!(errors.is_empty());

        validate_zoom_level(&mut errors, "zoom_level", 18);
        validate_zoom_level(&mut errors, "zoom_level", 24);
        assert_eq!(errors.get("zoom_level").unwrap().len(), 2);
    }
}
