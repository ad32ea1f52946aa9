use crate::error::{ExtractError, Result};
use crate::java::{
    Annotation, AnnotationArgs, CompilationUnit, ElementValue, ImportTable, MethodDecl, TypeDecl, TypeSolver,
};

use super::javadoc::{InlineTagKind, Javadoc, JavadocText};
use super::normalize::PermissionNormalizer;
use super::permission::Permission;
use super::signature::{DeclContext, SignatureResolver};
use super::{MethodRecord, PermissionSource};

const REQUIRES_PERMISSION: &str = "RequiresPermission";

/// Collects [`MethodRecord`]s from one compilation unit. A visitor is used for
/// a single file; the only state it carries is that file's import table.
pub struct SourceVisitor<'a> {
    normalizer: &'a PermissionNormalizer,
    resolver: SignatureResolver<'a>,
    imports: ImportTable,
    records: Vec<MethodRecord>,
}

impl<'a> SourceVisitor<'a> {
    pub fn new(normalizer: &'a PermissionNormalizer, solver: &'a dyn TypeSolver) -> Self {
        SourceVisitor {
            normalizer,
            resolver: SignatureResolver::new(solver),
            imports: ImportTable::new(),
            records: Vec::new(),
        }
    }

    /// Visit every method of `unit`. An annotation this tool cannot interpret
    /// aborts the whole file.
    pub fn visit(mut self, unit: &CompilationUnit) -> Result<Vec<MethodRecord>> {
        for import in &unit.imports {
            self.imports.record(import);
        }

        let package = unit.package_name();
        tracing::trace!(package, imports = self.imports.len(), "visiting compilation unit");
        let mut path = Vec::new();
        let mut type_params = Vec::new();
        for ty in &unit.types {
            self.visit_type(package, ty, &mut path, &mut type_params)?;
        }
        Ok(self.records)
    }

    fn visit_type(
        &mut self,
        package: &str,
        ty: &TypeDecl,
        path: &mut Vec<String>,
        type_params: &mut Vec<String>,
    ) -> Result<()> {
        path.push(ty.name.clone());
        tracing::trace!(name = %ty.name, kind = ?ty.kind, "visiting type");
        let outer_params = type_params.len();
        type_params.extend(ty.type_params.iter().cloned());

        for method in &ty.methods {
            let ctx = DeclContext { package, class_path: path, type_params };
            self.visit_method(method, &ctx)?;
        }
        for nested in &ty.nested {
            self.visit_type(package, nested, path, type_params)?;
        }

        type_params.truncate(outer_params);
        path.pop();
        Ok(())
    }

    fn visit_method(&mut self, method: &MethodDecl, ctx: &DeclContext<'_>) -> Result<()> {
        let qualified = format!("{}.{}", ctx.class_name(), method.name);
        let annotation_permissions = self.annotation_permissions(&qualified, &method.annotations)?;
        let doc_permissions = match &method.javadoc {
            Some(comment) => self.doc_permissions(&Javadoc::parse(comment)),
            None => Vec::new(),
        };

        // only methods with a real requirement get their signature resolved
        if annotation_permissions
            .iter()
            .chain(&doc_permissions)
            .all(Permission::is_unconstrained)
        {
            return Ok(());
        }

        let mut record = MethodRecord::new(self.resolver.resolve(method, ctx, &self.imports));
        for permission in annotation_permissions {
            record.add_permission(PermissionSource::Annotation, permission);
        }
        for permission in doc_permissions {
            record.add_permission(PermissionSource::Documentation, permission);
        }

        tracing::trace!(signature = record.signature(), line = method.line, "permission mapping");
        self.records.push(record);
        Ok(())
    }

    fn annotation_permissions(&self, method: &str, annotations: &[Annotation]) -> Result<Vec<Permission>> {
        let mut permissions = Vec::new();
        for annotation in annotations.iter().filter(|a| is_requires_permission(a)) {
            match &annotation.args {
                AnnotationArgs::Single(ElementValue::Expr(value)) => {
                    permissions.push(Permission::single(&self.normalizer.normalize(value))?);
                }
                AnnotationArgs::Single(value @ ElementValue::Array(_)) => {
                    return Err(ExtractError::UnsupportedAnnotationShape {
                        method: method.to_string(),
                        shape: format!("array value {value}"),
                    });
                }
                AnnotationArgs::Pairs(pairs) => {
                    for (key, value) in pairs {
                        permissions.push(self.keyed_permission(method, key, value)?);
                    }
                }
                AnnotationArgs::Marker => {
                    return Err(ExtractError::UnsupportedAnnotationShape {
                        method: method.to_string(),
                        shape: "marker annotation without a value".to_string(),
                    });
                }
            }
        }
        Ok(permissions)
    }

    fn keyed_permission(&self, method: &str, key: &str, value: &ElementValue) -> Result<Permission> {
        match key {
            "anyOf" => Permission::any_of(&self.normalize_list(method, value)?),
            "allOf" => Permission::all_of(&self.normalize_list(method, value)?),
            "value" => match value {
                ElementValue::Expr(expr) => Permission::single(&self.normalizer.normalize(expr)),
                ElementValue::Array(_) => Err(ExtractError::UnsupportedAnnotationShape {
                    method: method.to_string(),
                    shape: format!("value = {value}"),
                }),
            },
            "conditional" => Ok(Permission::Unconstrained),
            _ => Err(ExtractError::UnsupportedAnnotationKey {
                method: method.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn normalize_list(&self, method: &str, value: &ElementValue) -> Result<Vec<String>> {
        let values = match value {
            ElementValue::Array(values) => values.as_slice(),
            single @ ElementValue::Expr(_) => std::slice::from_ref(single),
        };
        values
            .iter()
            .map(|value| match value {
                ElementValue::Expr(expr) => Ok(self.normalizer.normalize(expr)),
                ElementValue::Array(_) => Err(ExtractError::UnsupportedAnnotationShape {
                    method: method.to_string(),
                    shape: format!("nested array {value}"),
                }),
            })
            .collect()
    }

    /// Permissions named by `{@link}` tags, from the description when it
    /// mentions `Manifest.permission` and likewise from each block tag.
    /// Tokens that do not normalize to a valid identifier are skipped.
    fn doc_permissions(&self, javadoc: &Javadoc) -> Vec<Permission> {
        let mut permissions = Vec::new();
        if javadoc.description.to_text().contains("Manifest.permission") {
            self.collect_links(&javadoc.description, &mut permissions);
        }
        for tag in &javadoc.block_tags {
            if tag.to_text().contains("Manifest.permission") {
                self.collect_links(&tag.content, &mut permissions);
            }
        }
        permissions
    }

    fn collect_links(&self, text: &JavadocText, out: &mut Vec<Permission>) {
        let links = text
            .inline_tags()
            .into_iter()
            .filter(|tag| tag.kind == InlineTagKind::Link && tag.content.contains("permission"));
        for link in links {
            for token in link.content.split_whitespace() {
                match self.normalizer.parse(token) {
                    Ok(id) => out.push(Permission::Single(id)),
                    Err(err) => tracing::trace!(token, %err, "skipping documentation token"),
                }
            }
        }
    }
}

fn is_requires_permission(annotation: &Annotation) -> bool {
    annotation.simple_name() == REQUIRES_PERMISSION
}

/// Extract every permission mapping from one parsed file.
pub fn visit_file(
    unit: &CompilationUnit,
    normalizer: &PermissionNormalizer,
    solver: &dyn TypeSolver,
) -> Result<Vec<MethodRecord>> {
    SourceVisitor::new(normalizer, solver).visit(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java::parser::parse_source;
    use crate::java::solver::Unresolved;
    use crate::java::{Scope, SourceTypeSolver, TypeIndex, TypeRef};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the visitor asks for a type description.
    struct CountingSolver {
        inner: SourceTypeSolver,
        calls: AtomicUsize,
    }

    impl TypeSolver for CountingSolver {
        fn describe(&self, ty: &TypeRef, scope: &Scope<'_>) -> std::result::Result<String, Unresolved> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.describe(ty, scope)
        }
    }

    fn extract(source: &str) -> Result<Vec<MethodRecord>> {
        let unit = parse_source(source, Path::new("Test.java")).unwrap();
        let mut index = TypeIndex::new();
        index.register(&unit);
        let solver = SourceTypeSolver::new(index);
        let normalizer = PermissionNormalizer::new().unwrap();
        visit_file(&unit, &normalizer, &solver)
    }

    fn annotation_lines(records: &[MethodRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.mapping_line(PermissionSource::Annotation))
            .collect()
    }

    fn doc_lines(records: &[MethodRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.mapping_line(PermissionSource::Documentation))
            .collect()
    }

    #[test]
    fn test_single_value_annotation() {
        let records = extract(
            r#"
package pkg;

import android.Manifest;

public class Foo {
    @RequiresPermission(Manifest.permission.CAMERA)
    public void open() {}

    public void close() {}
}
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.signature(), "<pkg.Foo: void open()>");
        assert_eq!(
            record.permissions(PermissionSource::Annotation).iter().collect::<Vec<_>>(),
            vec![&Permission::single("android.Manifest.permission.CAMERA").unwrap()]
        );
        assert!(record.permissions(PermissionSource::Documentation).is_empty());
    }

    #[test]
    fn test_any_of_and_all_of() {
        let records = extract(
            r#"
package pkg;

class Foo {
    @RequiresPermission(anyOf = {Manifest.permission.A, Manifest.permission.B})
    void either() {}

    @android.annotation.RequiresPermission(allOf = {
            android.Manifest.permission.C,
            permission.D })
    void both(int flags) {}

    @RequiresPermission(allOf = Manifest.permission.E)
    void one() {}
}
"#,
        )
        .unwrap();

        assert_eq!(
            annotation_lines(&records),
            vec![
                "<pkg.Foo: void either()> :: android.Manifest.permission.A, android.Manifest.permission.B :: anyOf",
                "<pkg.Foo: void both(int)> :: android.Manifest.permission.C, android.Manifest.permission.D :: allOf",
                "<pkg.Foo: void one()> :: android.Manifest.permission.E :: allOf",
            ]
        );
    }

    #[test]
    fn test_value_and_conditional_keys() {
        let records = extract(
            r#"
package pkg;

class Foo {
    @RequiresPermission(value = Manifest.permission.BLUETOOTH, conditional = true)
    void scan() {}

    @RequiresPermission(conditional = true)
    void maybe() {}
}
"#,
        )
        .unwrap();

        assert_eq!(
            annotation_lines(&records),
            vec!["<pkg.Foo: void scan()> :: android.Manifest.permission.BLUETOOTH"]
        );
    }

    #[test]
    fn test_unknown_key_aborts_file() {
        let err = extract(
            r#"
package pkg;

class Foo {
    @RequiresPermission(Manifest.permission.CAMERA)
    void fine() {}

    @RequiresPermission(foo = Manifest.permission.CAMERA)
    void broken() {}
}
"#,
        )
        .unwrap_err();

        match err {
            ExtractError::UnsupportedAnnotationKey { method, key } => {
                assert_eq!(method, "pkg.Foo.broken");
                assert_eq!(key, "foo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_marker_annotation_is_unsupported() {
        let err = extract("package pkg; class Foo { @RequiresPermission void f() {} }").unwrap_err();
        assert!(err.is_unsupported_annotation());
    }

    #[test]
    fn test_invalid_annotation_value_propagates() {
        let err = extract("package pkg; class Foo { @RequiresPermission(SOME_FIELD.value) void f() {} }")
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPermission(_)));
    }

    #[test]
    fn test_javadoc_description_links() {
        let records = extract(
            r#"
package pkg;

public class Foo {
    /**
     * Starts a scan. Requires {@link android.Manifest.permission#ACCESS_FINE_LOCATION
     * android.Manifest.permission#ACCESS_COARSE_LOCATION} and
     * {@link Manifest.permission#BLUETOOTH_SCAN}. See {@link #stop} and the
     * {@link android.Manifest.permission#CAMERA camera permission}.
     */
    public void start() {}

    /**
     * Mentions {@link permission#CAMERA} without the class name.
     */
    public void ignored() {}
}
"#,
        )
        .unwrap();

        assert_eq!(
            doc_lines(&records),
            vec![
                "<pkg.Foo: void start()> :: android.Manifest.permission.ACCESS_FINE_LOCATION, \
                 android.Manifest.permission.ACCESS_COARSE_LOCATION, \
                 android.Manifest.permission.BLUETOOTH_SCAN, \
                 android.Manifest.permission.CAMERA"
            ]
        );
        assert!(annotation_lines(&records).is_empty());
    }

    #[test]
    fn test_javadoc_block_tag_links() {
        let records = extract(
            r#"
package pkg;

public class Foo {
    /**
     * Reads the state.
     *
     * @throws SecurityException without {@link android.Manifest.permission#READ_PHONE_STATE}
     * @return the state
     */
    @RequiresPermission(Manifest.permission.READ_PHONE_STATE)
    public int state() { return 0; }
}
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            doc_lines(&records),
            vec!["<pkg.Foo: int state()> :: android.Manifest.permission.READ_PHONE_STATE"]
        );
        assert_eq!(
            annotation_lines(&records),
            vec!["<pkg.Foo: int state()> :: android.Manifest.permission.READ_PHONE_STATE"]
        );
    }

    #[test]
    fn test_nested_classes_and_imports() {
        let records = extract(
            r#"
package android.app;

import android.os.Handler;
import com.vendor.Widget;

public class Outer {
    public static class Builder {
        @RequiresPermission(Manifest.permission.VIBRATE)
        public Builder set(Handler handler, Widget... widgets) { return this; }
    }
}
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].signature(),
            "<android.app.Outer$Builder: android.app.Outer.Builder set(android.os.Handler,com.vendor.Widget...)>"
        );
        assert!(records[0].is_heuristic());
    }

    #[test]
    fn test_unrelated_annotations_are_ignored() {
        let records = extract(
            r#"
package pkg;

class Foo {
    @Override
    @SuppressWarnings("unused")
    public String toString() { return ""; }
}
"#,
        )
        .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_on_demand_imports_keep_java_lang_types() {
        let records = extract(
            r#"
package pkg;

import java.util.*;
import android.Manifest;

public class Foo {
    @RequiresPermission(Manifest.permission.CAMERA)
    public Object open(String name, List<Integer> ids) { return null; }
}
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].signature(),
            "<pkg.Foo: java.lang.Object open(java.lang.String,java.util.List<java.lang.Integer>)>"
        );
        assert!(!records[0].is_heuristic());
    }

    #[test]
    fn test_anonymous_local_and_enum_constant_methods() {
        let records = extract(
            r#"
package pkg;

import android.Manifest;

public class Foo {
    private final Runnable task = new Runnable() {
        @RequiresPermission(Manifest.permission.CAMERA)
        public void run() {}
    };

    public void start() {
        class Local {
            @RequiresPermission(Manifest.permission.VIBRATE)
            void buzz() {}
        }
    }

    enum Mode {
        FAST {
            @RequiresPermission(Manifest.permission.INTERNET)
            void go() {}
        };

        void go() {}
    }
}
"#,
        )
        .unwrap();

        assert_eq!(
            annotation_lines(&records),
            vec![
                "<pkg.Foo$1: void run()> :: android.Manifest.permission.CAMERA",
                "<pkg.Foo$1Local: void buzz()> :: android.Manifest.permission.VIBRATE",
                "<pkg.Foo$Mode$1: void go()> :: android.Manifest.permission.INTERNET",
            ]
        );
    }

    #[test]
    fn test_signatures_resolved_only_for_mapped_methods() {
        let unit = parse_source(
            r#"
package pkg;

public class Foo {
    public void close(String reason, int code) {}

    @RequiresPermission(conditional = true)
    public void flush(String reason) {}

    /** Plain documentation. */
    public void reset(String reason) {}
}
"#,
            Path::new("Foo.java"),
        )
        .unwrap();
        let solver = CountingSolver { inner: SourceTypeSolver::default(), calls: AtomicUsize::new(0) };
        let normalizer = PermissionNormalizer::new().unwrap();

        let records = visit_file(&unit, &normalizer, &solver).unwrap();
        assert!(records.is_empty());
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }
}
