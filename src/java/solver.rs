use std::collections::HashSet;
use thiserror::Error;

use super::ast::{CompilationUnit, TypeRef, WildcardBound};
use super::ImportTable;

/// A type name the solver could not map to a declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unresolved symbol: {name}")]
pub struct Unresolved {
    /// The name as written at the reference, without type arguments.
    pub name: String,
}

impl Unresolved {
    fn new(name: &str) -> Self {
        Unresolved { name: name.to_string() }
    }
}

/// Where a type reference appears.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub package: &'a str,
    pub imports: &'a ImportTable,
    /// Enclosing type names, outermost first.
    pub enclosing: &'a [String],
    /// Type variables visible at the reference.
    pub type_params: &'a [String],
}

pub trait TypeSolver: Sync {
    /// Fully qualified description of `ty`, e.g. `java.util.List<java.lang.String>`.
    fn describe(&self, ty: &TypeRef, scope: &Scope<'_>) -> Result<String, Unresolved>;
}

/// Types implicitly visible in every file.
const JAVA_LANG: &[&str] = &[
    "Appendable", "ArithmeticException", "ArrayIndexOutOfBoundsException", "ArrayStoreException",
    "AssertionError", "AutoCloseable", "Boolean", "Byte", "CharSequence", "Character", "Class",
    "ClassCastException", "ClassLoader", "ClassNotFoundException", "CloneNotSupportedException", "Cloneable",
    "Comparable", "Deprecated", "Double", "Enum", "Error", "Exception", "ExceptionInInitializerError", "Float",
    "FunctionalInterface", "IllegalAccessException", "IllegalArgumentException", "IllegalMonitorStateException",
    "IllegalStateException", "IndexOutOfBoundsException", "InheritableThreadLocal", "InstantiationException",
    "Integer", "InterruptedException", "Iterable", "LinkageError", "Long", "Math", "Module",
    "NegativeArraySizeException", "NoClassDefFoundError", "NoSuchFieldException", "NoSuchMethodException",
    "NullPointerException", "Number", "NumberFormatException", "Object", "OutOfMemoryError", "Override",
    "Package", "Process", "ProcessBuilder", "Readable", "Record", "ReflectiveOperationException", "Runnable",
    "Runtime", "RuntimeException", "SafeVarargs", "SecurityException", "SecurityManager", "Short",
    "StackOverflowError", "StackTraceElement", "StrictMath", "String", "StringBuffer", "StringBuilder",
    "StringIndexOutOfBoundsException", "SuppressWarnings", "System", "Thread", "ThreadGroup", "ThreadLocal",
    "Throwable", "TypeNotPresentException", "UnsatisfiedLinkError", "UnsupportedOperationException",
    "VirtualMachineError", "Void",
];

/// JDK types reachable through on-demand imports such as `java.util.*`.
const JDK_TYPES: &[&str] = &[
    "java.io.File", "java.io.FileDescriptor", "java.io.InputStream", "java.io.OutputStream",
    "java.io.PrintWriter", "java.io.Serializable", "java.io.IOException", "java.net.InetAddress",
    "java.net.Socket", "java.net.URI", "java.net.URL", "java.nio.ByteBuffer",
    "java.security.PublicKey", "java.security.cert.X509Certificate", "java.time.Duration",
    "java.time.Instant", "java.util.ArrayList", "java.util.Collection", "java.util.Date",
    "java.util.HashMap", "java.util.HashSet", "java.util.Iterator", "java.util.List",
    "java.util.Locale", "java.util.Map", "java.util.Objects", "java.util.Optional", "java.util.Set",
    "java.util.UUID", "java.util.concurrent.CompletableFuture", "java.util.concurrent.Executor",
    "java.util.concurrent.TimeUnit", "java.util.function.BiConsumer", "java.util.function.Consumer",
    "java.util.function.Function", "java.util.function.Predicate", "java.util.function.Supplier",
];

/// Every type declared in a parsed source root.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    types: HashSet<String>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, unit: &CompilationUnit) {
        for name in unit.declared_types() {
            self.insert(&name);
        }
    }

    pub fn insert(&mut self, qualified_name: &str) {
        self.types.insert(qualified_name.to_string());
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.types.contains(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

/// Resolves against the source root's [`TypeIndex`] plus a small model of the
/// JDK. Anything else is [`Unresolved`].
#[derive(Debug, Clone, Default)]
pub struct SourceTypeSolver {
    index: TypeIndex,
}

impl SourceTypeSolver {
    pub fn new(index: TypeIndex) -> Self {
        SourceTypeSolver { index }
    }

    pub fn index(&self) -> &TypeIndex {
        &self.index
    }

    fn is_known(&self, qualified_name: &str) -> bool {
        self.index.contains(qualified_name) || is_jdk_type(qualified_name)
    }

    fn resolve_class(&self, name: &str, scope: &Scope<'_>) -> Result<String, Unresolved> {
        if let Some((head, rest)) = name.split_once('.') {
            // `Outer.Inner` through a visible outer type, else a qualified name.
            if let Ok(outer) = self.resolve_simple(head, scope) {
                let candidate = format!("{outer}.{rest}");
                if self.is_known(&candidate) {
                    return Ok(candidate);
                }
            }
            if self.is_known(name) {
                return Ok(name.to_string());
            }
            return Err(Unresolved::new(name));
        }
        self.resolve_simple(name, scope)
    }

    fn resolve_simple(&self, name: &str, scope: &Scope<'_>) -> Result<String, Unresolved> {
        if scope.type_params.iter().any(|param| param == name) {
            return Ok(name.to_string());
        }

        let package_prefix = |path: &[String]| {
            let mut parts: Vec<&str> = Vec::with_capacity(path.len() + 2);
            if !scope.package.is_empty() {
                parts.push(scope.package);
            }
            parts.extend(path.iter().map(String::as_str));
            parts.push(name);
            parts.join(".")
        };

        // Member types of the enclosing classes, innermost first.
        for depth in (1..=scope.enclosing.len()).rev() {
            let candidate = package_prefix(&scope.enclosing[..depth]);
            if self.index.contains(&candidate) {
                return Ok(candidate);
            }
        }

        if let Some(imported) = scope.imports.find(name) {
            if self.is_known(imported) {
                return Ok(imported.to_string());
            }
        }

        let same_package = package_prefix(&[]);
        if self.index.contains(&same_package) {
            return Ok(same_package);
        }

        // Only types known to exist are taken from an on-demand import.
        for package in scope.imports.wildcards() {
            let candidate = format!("{package}.{name}");
            if self.index.contains(&candidate) || is_listed_jdk_type(&candidate) {
                return Ok(candidate);
            }
        }

        if JAVA_LANG.contains(&name) {
            return Ok(format!("java.lang.{name}"));
        }

        Err(Unresolved::new(name))
    }
}

impl TypeSolver for SourceTypeSolver {
    fn describe(&self, ty: &TypeRef, scope: &Scope<'_>) -> Result<String, Unresolved> {
        match ty {
            TypeRef::Primitive(name) => Ok(name.clone()),
            TypeRef::Array(element) => Ok(format!("{}[]", self.describe(element, scope)?)),
            TypeRef::Wildcard(None) => Ok("?".to_string()),
            TypeRef::Wildcard(Some((bound, inner))) => {
                let keyword = match bound {
                    WildcardBound::Extends => "extends",
                    WildcardBound::Super => "super",
                };
                Ok(format!("? {keyword} {}", self.describe(inner, scope)?))
            }
            TypeRef::Class { name, args } => {
                let base = self.resolve_class(name, scope)?;
                if args.is_empty() {
                    return Ok(base);
                }
                let args = args
                    .iter()
                    .map(|arg| self.describe(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{base}<{}>", args.join(", ")))
            }
        }
    }
}

fn is_listed_jdk_type(qualified_name: &str) -> bool {
    JDK_TYPES.contains(&qualified_name)
        || qualified_name
            .strip_prefix("java.lang.")
            .is_some_and(|name| JAVA_LANG.contains(&name))
}

/// A JDK type written out in full, by a single-type import or at the use
/// site, is taken at its word.
fn is_jdk_type(qualified_name: &str) -> bool {
    is_listed_jdk_type(qualified_name)
        || ((qualified_name.starts_with("java.") || qualified_name.starts_with("javax."))
            && qualified_name
                .rsplit('.')
                .next()
                .is_some_and(|last| last.starts_with(|c: char| c.is_ascii_uppercase())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java::ImportDecl;

    fn imports(names: &[&str]) -> ImportTable {
        let mut table = ImportTable::new();
        for name in names {
            let (name, is_wildcard) = match name.strip_suffix(".*") {
                Some(package) => (package, true),
                None => (*name, false),
            };
            table.record(&ImportDecl { name: name.to_string(), is_static: false, is_wildcard });
        }
        table
    }

    fn solver(types: &[&str]) -> SourceTypeSolver {
        let mut index = TypeIndex::new();
        for ty in types {
            index.insert(ty);
        }
        SourceTypeSolver::new(index)
    }

    #[test]
    fn test_primitives_and_java_lang() {
        let solver = solver(&[]);
        let table = imports(&[]);
        let scope = Scope { package: "android.app", imports: &table, enclosing: &[], type_params: &[] };

        assert_eq!(solver.describe(&TypeRef::Primitive("void".into()), &scope).unwrap(), "void");
        assert_eq!(solver.describe(&TypeRef::class("String"), &scope).unwrap(), "java.lang.String");
        assert_eq!(
            solver.describe(&TypeRef::Array(Box::new(TypeRef::Primitive("int".into()))), &scope).unwrap(),
            "int[]"
        );
    }

    #[test]
    fn test_lookup_order() {
        let solver = solver(&["android.app.Outer", "android.app.Outer.Handler", "android.app.Looper", "android.os.Looper"]);
        let table = imports(&["android.os.Looper", "java.util.*"]);
        let enclosing = vec!["Outer".to_string()];
        let type_params = vec!["T".to_string()];
        let scope = Scope { package: "android.app", imports: &table, enclosing: &enclosing, type_params: &type_params };

        assert_eq!(solver.describe(&TypeRef::class("T"), &scope).unwrap(), "T");
        assert_eq!(solver.describe(&TypeRef::class("Handler"), &scope).unwrap(), "android.app.Outer.Handler");
        // single-type import shadows the same-package type
        assert_eq!(solver.describe(&TypeRef::class("Looper"), &scope).unwrap(), "android.os.Looper");
        assert_eq!(
            solver
                .describe(&TypeRef::generic("List", vec![TypeRef::class("String")]), &scope)
                .unwrap(),
            "java.util.List<java.lang.String>"
        );
        assert_eq!(solver.describe(&TypeRef::class("Outer.Handler"), &scope).unwrap(), "android.app.Outer.Handler");
    }

    #[test]
    fn test_on_demand_imports_do_not_shadow_java_lang() {
        let solver = solver(&["android.os.Handler"]);
        let table = imports(&["java.util.*", "java.io.*", "android.os.*"]);
        let scope = Scope { package: "android.app", imports: &table, enclosing: &[], type_params: &[] };

        assert_eq!(solver.describe(&TypeRef::class("Object"), &scope).unwrap(), "java.lang.Object");
        assert_eq!(
            solver
                .describe(&TypeRef::generic("Map", vec![TypeRef::class("String"), TypeRef::class("Integer")]), &scope)
                .unwrap(),
            "java.util.Map<java.lang.String, java.lang.Integer>"
        );
        assert_eq!(solver.describe(&TypeRef::class("File"), &scope).unwrap(), "java.io.File");
        assert_eq!(solver.describe(&TypeRef::class("Handler"), &scope).unwrap(), "android.os.Handler");
        // not a known member of any imported package
        assert!(solver.describe(&TypeRef::class("Scanner"), &scope).is_err());
    }

    #[test]
    fn test_java_lang_runtime_types() {
        let solver = solver(&[]);
        let table = imports(&[]);
        let scope = Scope { package: "android.app", imports: &table, enclosing: &[], type_params: &[] };

        for name in ["Runtime", "Appendable", "StackTraceElement", "Package", "ThreadGroup"] {
            assert_eq!(solver.describe(&TypeRef::class(name), &scope).unwrap(), format!("java.lang.{name}"));
        }
        // explicitly written JDK names are accepted as is
        assert_eq!(
            solver.describe(&TypeRef::class("java.util.zip.ZipFile"), &scope).unwrap(),
            "java.util.zip.ZipFile"
        );
    }

    #[test]
    fn test_unresolved_carries_bare_name() {
        let solver = solver(&[]);
        let table = imports(&["com.vendor.Widget"]);
        let scope = Scope { package: "android.app", imports: &table, enclosing: &[], type_params: &[] };

        let err = solver.describe(&TypeRef::class("Widget"), &scope).unwrap_err();
        assert_eq!(err.name, "Widget");

        let generic = TypeRef::generic("List", vec![TypeRef::class("Gadget")]);
        let table = imports(&["java.util.List"]);
        let scope = Scope { imports: &table, ..scope };
        assert_eq!(solver.describe(&generic, &scope).unwrap_err().name, "Gadget");
    }

    #[test]
    fn test_wildcards() {
        let solver = solver(&["android.app.Job"]);
        let table = imports(&[]);
        let scope = Scope { package: "android.app", imports: &table, enclosing: &[], type_params: &[] };
        let ty = TypeRef::generic(
            "Class",
            vec![TypeRef::Wildcard(Some((WildcardBound::Extends, Box::new(TypeRef::class("Job")))))],
        );
        assert_eq!(solver.describe(&ty, &scope).unwrap(), "java.lang.Class<? extends android.app.Job>");
    }
}
