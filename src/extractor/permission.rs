use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{ExtractError, Result};

// `andri?oid` keeps matching the misspelled constant shipped in
// android.companion.CompanionDeviceManager.
static PERMISSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^andri?oid\.(contacts\.)?(Manifest\.)?permissions?\.[_A-Z0-9]+$")
        .expect("permission pattern compiles")
});

/// Permission constants that live outside `Manifest.permission`.
const LEGACY_PERMISSIONS: &[&str] = &[
    "NetworkStack.PERMISSION_MAINLINE_NETWORK_STACK",
    "android.net.NetworkStack.PERMISSION_MAINLINE_NETWORK_STACK",
];

/// Check whether a dot-separated string names a permission constant.
pub fn is_permission_string(name: &str) -> bool {
    PERMISSION_PATTERN.is_match(name) || LEGACY_PERMISSIONS.contains(&name)
}

/// A validated, dot-separated permission constant such as
/// `android.Manifest.permission.CAMERA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PermissionId(String);

impl PermissionId {
    /// Build an identifier from a normalized token. The javadoc `#` member
    /// separator is folded into `.` before validation.
    pub fn new(raw: &str) -> Result<Self> {
        let name = raw.replace('#', ".");
        if is_permission_string(&name) {
            Ok(PermissionId(name))
        } else {
            Err(ExtractError::InvalidPermission(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PermissionId {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        PermissionId::new(s)
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A permission requirement attached to an API method.
///
/// `AnyOf` and `AllOf` keep their identifiers in source order for output,
/// but compare and hash as sets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "permissions", rename_all = "camelCase")]
pub enum Permission {
    Single(PermissionId),
    AnyOf(Vec<PermissionId>),
    AllOf(Vec<PermissionId>),
    /// The annotation was present but imposed no requirement, e.g. a lone
    /// `conditional = true`. Never stored on a record.
    Unconstrained,
}

impl Permission {
    pub fn single(raw: &str) -> Result<Self> {
        Ok(Permission::Single(PermissionId::new(raw)?))
    }

    pub fn any_of<S: AsRef<str>>(raws: &[S]) -> Result<Self> {
        Ok(Permission::AnyOf(Self::collect_ids(raws)?))
    }

    pub fn all_of<S: AsRef<str>>(raws: &[S]) -> Result<Self> {
        Ok(Permission::AllOf(Self::collect_ids(raws)?))
    }

    fn collect_ids<S: AsRef<str>>(raws: &[S]) -> Result<Vec<PermissionId>> {
        raws.iter().map(|raw| PermissionId::new(raw.as_ref())).collect()
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Permission::Unconstrained)
    }

    /// Identifiers in source order.
    pub fn ids(&self) -> &[PermissionId] {
        match self {
            Permission::Single(id) => std::slice::from_ref(id),
            Permission::AnyOf(ids) | Permission::AllOf(ids) => ids,
            Permission::Unconstrained => &[],
        }
    }

    fn sorted_ids(&self) -> Vec<&PermissionId> {
        let mut ids: Vec<&PermissionId> = self.ids().iter().collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn tag(&self) -> u8 {
        match self {
            Permission::Single(_) => 0,
            Permission::AnyOf(_) => 1,
            Permission::AllOf(_) => 2,
            Permission::Unconstrained => 3,
        }
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.sorted_ids() == other.sorted_ids()
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        self.sorted_ids().hash(state);
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || {
            self.ids()
                .iter()
                .map(PermissionId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Permission::Single(id) => write!(f, "{id}"),
            Permission::AnyOf(_) => write!(f, "{} :: anyOf", joined()),
            Permission::AllOf(_) => write!(f, "{} :: allOf", joined()),
            Permission::Unconstrained => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_grammar_accepts_known_forms() {
        for name in [
            "android.Manifest.permission.CAMERA",
            "android.permission.CAMERA",
            "android.Manifest.permissions.READ_CONTACTS",
            "android.contacts.Manifest.permission.WRITE_CONTACTS",
            "andrioid.Manifest.permission.REQUEST_COMPANION_RUN_IN_BACKGROUND",
            "android.Manifest.permission.ACCESS_5G_STATE",
            "NetworkStack.PERMISSION_MAINLINE_NETWORK_STACK",
            "android.net.NetworkStack.PERMISSION_MAINLINE_NETWORK_STACK",
        ] {
            assert!(is_permission_string(name), "{name} should be accepted");
        }
    }

    #[test]
    fn test_grammar_rejects_malformed() {
        for name in [
            "android.Manifest.permission.camera",
            "Manifest.permission.CAMERA",
            "android.Manifest.permission",
            "android.Manifest.permission.CAMERA extra",
            "androidx.Manifest.permission.CAMERA",
            // only the `andrioid` misspelling is tolerated
            "andriod.Manifest.permission.REQUEST_COMPANION_RUN_IN_BACKGROUND",
            "com.example.Permissions.FOO",
            "CAMERA",
        ] {
            assert!(!is_permission_string(name), "{name} should be rejected");
        }
    }

    #[test]
    fn test_identifier_folds_hash_separator() {
        let id = PermissionId::new("android.Manifest.permission#CAMERA").unwrap();
        assert_eq!(id.as_str(), "android.Manifest.permission.CAMERA");
        assert!(!id.to_string().contains('#'));
    }

    #[test]
    fn test_identifier_rejects_garbage() {
        let err = PermissionId::new("android.Manifest.permission#").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPermission(ref s) if s == "android.Manifest.permission#"));
    }

    #[test]
    fn test_render_single_and_sets() {
        let single = Permission::single("android.Manifest.permission#CAMERA").unwrap();
        assert_eq!(single.to_string(), "android.Manifest.permission.CAMERA");

        let any = Permission::any_of(&["android.Manifest.permission#A", "android.Manifest.permission#B"]).unwrap();
        assert_eq!(
            any.to_string(),
            "android.Manifest.permission.A, android.Manifest.permission.B :: anyOf"
        );

        let all = Permission::all_of(&["android.Manifest.permission#B", "android.Manifest.permission#A"]).unwrap();
        assert_eq!(
            all.to_string(),
            "android.Manifest.permission.B, android.Manifest.permission.A :: allOf"
        );
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let ab = Permission::any_of(&["android.permission.A", "android.permission.B"]).unwrap();
        let ba = Permission::any_of(&["android.permission.B", "android.permission.A"]).unwrap();
        assert_eq!(ab, ba);

        let all_ab = Permission::all_of(&["android.permission.A", "android.permission.B"]).unwrap();
        assert_ne!(ab, all_ab);

        let mut set = HashSet::new();
        set.insert(ab);
        set.insert(ba);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_single_equality_by_identifier() {
        let a = Permission::single("android.Manifest.permission#CAMERA").unwrap();
        let b = Permission::single("android.Manifest.permission.CAMERA").unwrap();
        let c = Permission::single("android.Manifest.permission.RECORD_AUDIO").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unconstrained_has_no_ids() {
        assert!(Permission::Unconstrained.is_unconstrained());
        assert!(Permission::Unconstrained.ids().is_empty());
        assert_eq!(Permission::Unconstrained.to_string(), "");
    }

    #[test]
    fn test_serialize_tagged() {
        let any = Permission::any_of(&["android.permission.A"]).unwrap();
        let json = serde_json::to_value(&any).unwrap();
        assert_eq!(json["kind"], "anyOf");
        assert_eq!(json["permissions"][0], "android.permission.A");
    }
}
