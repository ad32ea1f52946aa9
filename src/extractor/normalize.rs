use anyhow::Result;
use regex::Regex;

use super::permission::PermissionId;

/// Canonical prefix with the member boundary marked by `#`.
pub const PERMISSION_PREFIX: &str = "android.Manifest.permission#";

/// Constant names that some API levels' documentation generator emitted twice
/// in a row (`CONTROL_LOCATION_UPDATESCONTROL_LOCATION_UPDATES` in 23-25,
/// `READ_PRECISE_PHONE_STATEREAD_PRECISE_PHONE_STATE` in 30).
const DUPLICATED_CONSTANTS: &[&str] = &["CONTROL_LOCATION_UPDATES", "READ_PRECISE_PHONE_STATE"];

/// Rewrites the many spellings of a permission constant found in annotations
/// and `{@link}` targets into `android.Manifest.permission#NAME`.
pub struct PermissionNormalizer {
    // android.Manifest.permission[s] followed by `.` or `#`
    qualified_pattern: Regex,
    // Manifest.permission[s] followed by `.` or `#`
    manifest_pattern: Regex,
    // permission[s] followed by `.` or `#`
    class_pattern: Regex,
    // a lone constant such as CAMERA
    constant_pattern: Regex,
}

impl PermissionNormalizer {
    pub fn new() -> Result<Self> {
        Ok(PermissionNormalizer {
            qualified_pattern: Regex::new(r"^(android\.Manifest\.permissions?)[.#]")?,
            manifest_pattern: Regex::new(r"^(Manifest\.permissions?)[.#]")?,
            class_pattern: Regex::new(r"^(permissions?)[.#]")?,
            constant_pattern: Regex::new(r"^[A-Z][_A-Z0-9]*$")?,
        })
    }

    /// Normalize a raw token. The result still has to pass
    /// [`PermissionId::new`]; tokens that are not permissions at all come out
    /// mostly untouched.
    pub fn normalize(&self, raw: &str) -> String {
        let token = raw.trim().trim_matches(|c| matches!(c, '"' | '(' | ')'));

        let mut normalized = if self.qualified_pattern.is_match(token) {
            self.qualified_pattern.replace(token, "${1}#").into_owned()
        } else if self.manifest_pattern.is_match(token) {
            self.manifest_pattern.replace(token, "android.${1}#").into_owned()
        } else if self.class_pattern.is_match(token) {
            self.class_pattern.replace(token, "android.Manifest.${1}#").into_owned()
        } else if self.constant_pattern.is_match(token) {
            format!("{PERMISSION_PREFIX}{token}")
        } else {
            token.to_string()
        };

        for name in DUPLICATED_CONSTANTS {
            if normalized.contains(&name.repeat(2)) {
                normalized = normalized.replacen(name, "", 1);
            }
        }

        normalized
    }

    /// Normalize and validate in one step.
    pub fn parse(&self, raw: &str) -> crate::error::Result<PermissionId> {
        PermissionId::new(&self.normalize(raw))
    }
}
