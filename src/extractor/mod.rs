use anyhow::Result;
use indexmap::IndexSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::formatter::OutputFormat;

pub mod javadoc;
pub mod manifest;
pub mod normalize;
pub mod permission;
pub mod signature;
pub mod sources;
pub mod visitor;

pub use manifest::ProtectionLevelExtractor;
pub use permission::Permission;
pub use signature::MethodSignature;
pub use sources::{MappingExtractor, ScanConfig};

/// Which signal a permission was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionSource {
    /// `@RequiresPermission`
    Annotation,
    /// `{@link}` targets in the javadoc
    Documentation,
}

impl PermissionSource {
    /// Separator between permissions on one text output line.
    pub fn separator(self) -> &'static str {
        match self {
            PermissionSource::Annotation => " ",
            PermissionSource::Documentation => ", ",
        }
    }

    /// Stem of the output file holding mappings from this source.
    pub fn file_stem(self) -> &'static str {
        match self {
            PermissionSource::Annotation => "annotations-Mappings",
            PermissionSource::Documentation => "docs-Mappings",
        }
    }
}

/// One API method together with the permissions it requires.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub class_name: String,
    pub name: String,
    pub return_type: String,
    pub params: Vec<String>,
    heuristic: bool,
    annotation_permissions: IndexSet<Permission>,
    doc_permissions: IndexSet<Permission>,
    signature: OnceLock<String>,
}

impl MethodRecord {
    pub fn new(signature: MethodSignature) -> Self {
        MethodRecord {
            class_name: signature.class_name,
            name: signature.name,
            return_type: signature.return_type,
            params: signature.params,
            heuristic: signature.heuristic,
            annotation_permissions: IndexSet::new(),
            doc_permissions: IndexSet::new(),
            signature: OnceLock::new(),
        }
    }

    /// Add a permission; [`Permission::Unconstrained`] is dropped.
    pub fn add_permission(&mut self, source: PermissionSource, permission: Permission) {
        if permission.is_unconstrained() {
            return;
        }
        match source {
            PermissionSource::Annotation => self.annotation_permissions.insert(permission),
            PermissionSource::Documentation => self.doc_permissions.insert(permission),
        };
    }

    pub fn permissions(&self, source: PermissionSource) -> &IndexSet<Permission> {
        match source {
            PermissionSource::Annotation => &self.annotation_permissions,
            PermissionSource::Documentation => &self.doc_permissions,
        }
    }

    /// Whether some type in the signature is an import/package guess.
    pub fn is_heuristic(&self) -> bool {
        self.heuristic
    }

    /// `<pkg.Foo: void open(int,java.lang.String)>`
    pub fn signature(&self) -> &str {
        self.signature.get_or_init(|| {
            format!(
                "<{}: {} {}({})>",
                self.class_name,
                self.return_type,
                self.name,
                self.params.join(",")
            )
        })
    }

    /// `<signature> :: <permissions>` for one source, or `None` when that
    /// source yielded nothing.
    pub fn mapping_line(&self, source: PermissionSource) -> Option<String> {
        let permissions = self.permissions(source);
        if permissions.is_empty() {
            return None;
        }
        let rendered: Vec<String> = permissions.iter().map(ToString::to_string).collect();
        Some(format!("{} :: {}", self.signature(), rendered.join(source.separator())))
    }
}

/// An extraction pass over one SDK source tree.
pub trait SdkExtractor: Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Extract from `tree` and write the results into `out_dir`.
    fn extract(&self, tree: &Path, sdk_version: u32, out_dir: &Path, format: OutputFormat) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(params: &[&str]) -> MethodRecord {
        MethodRecord::new(MethodSignature {
            class_name: "pkg.Foo".to_string(),
            name: "open".to_string(),
            return_type: "void".to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            heuristic: false,
        })
    }

    #[test]
    fn test_signature_is_memoized() {
        let rec = record(&["int", "java.lang.String"]);
        let first = rec.signature();
        assert_eq!(first, "<pkg.Foo: void open(int,java.lang.String)>");
        assert!(std::ptr::eq(first, rec.signature()));
    }

    #[test]
    fn test_unconstrained_is_never_stored() {
        let mut rec = record(&[]);
        rec.add_permission(PermissionSource::Annotation, Permission::Unconstrained);
        assert!(rec.permissions(PermissionSource::Annotation).is_empty());
        assert_eq!(rec.mapping_line(PermissionSource::Annotation), None);
    }

    #[test]
    fn test_permissions_deduplicate_by_value() {
        let mut rec = record(&[]);
        let a = "android.Manifest.permission.A";
        let b = "android.Manifest.permission.B";
        rec.add_permission(PermissionSource::Annotation, Permission::any_of(&[a, b]).unwrap());
        rec.add_permission(PermissionSource::Annotation, Permission::any_of(&[b, a]).unwrap());
        rec.add_permission(PermissionSource::Documentation, Permission::single(a).unwrap());
        rec.add_permission(PermissionSource::Documentation, Permission::single(a).unwrap());

        assert_eq!(rec.permissions(PermissionSource::Annotation).len(), 1);
        assert_eq!(rec.permissions(PermissionSource::Documentation).len(), 1);
    }

    #[test]
    fn test_mapping_lines_use_source_separator() {
        let mut rec = record(&[]);
        for name in ["CAMERA", "RECORD_AUDIO"] {
            let raw = format!("android.Manifest.permission.{name}");
            rec.add_permission(PermissionSource::Annotation, Permission::single(&raw).unwrap());
            rec.add_permission(PermissionSource::Documentation, Permission::single(&raw).unwrap());
        }

        assert_eq!(
            rec.mapping_line(PermissionSource::Annotation).unwrap(),
            "<pkg.Foo: void open()> :: android.Manifest.permission.CAMERA android.Manifest.permission.RECORD_AUDIO"
        );
        assert_eq!(
            rec.mapping_line(PermissionSource::Documentation).unwrap(),
            "<pkg.Foo: void open()> :: android.Manifest.permission.CAMERA, android.Manifest.permission.RECORD_AUDIO"
        );
    }
}
