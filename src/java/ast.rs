//! Declaration-level model of a Java compilation unit. Only what the
//! extractor needs survives parsing: method bodies and fields are dropped,
//! apart from the anonymous and local classes declared in them.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    pub package: Option<String>,
    /// Import declarations, in source order. They precede every type.
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
}

impl CompilationUnit {
    pub fn package_name(&self) -> &str {
        self.package.as_deref().unwrap_or("")
    }

    /// Dotted qualified names of every declared type, nested ones included
    /// (`pkg.Outer.Inner`).
    pub fn declared_types(&self) -> Vec<String> {
        let mut names = Vec::new();
        let prefix = self.package.clone().unwrap_or_default();
        for ty in &self.types {
            ty.collect_names(&prefix, &mut names);
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Imported name without the trailing `.*`.
    pub name: String,
    pub is_static: bool,
    pub is_wildcard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
    /// `new Foo() { ... }` or an enum constant body.
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    pub type_params: Vec<String>,
    pub methods: Vec<MethodDecl>,
    pub nested: Vec<TypeDecl>,
}

impl TypeDecl {
    /// Anonymous and local classes carry javac's numbered names (`1`,
    /// `1Local`) and cannot be named from elsewhere.
    pub fn is_local(&self) -> bool {
        self.name.starts_with(|c: char| c.is_ascii_digit())
    }

    fn collect_names(&self, prefix: &str, out: &mut Vec<String>) {
        if self.is_local() {
            return;
        }
        let name = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}.{}", self.name)
        };
        for nested in &self.nested {
            nested.collect_names(&name, out);
        }
        out.push(name);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub return_type: TypeRef,
    pub params: Vec<Param>,
    pub annotations: Vec<Annotation>,
    /// Raw `/** ... */` comment directly preceding the declaration.
    pub javadoc: Option<String>,
    /// 1-based line of the declaration.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// For a vararg parameter, the element type.
    pub ty: TypeRef,
    pub varargs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardBound {
    Extends,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// `int`, `boolean`, ... and `void`.
    Primitive(String),
    /// A class or interface type as written, e.g. `Map.Entry` or
    /// `java.util.List`, with its type arguments.
    Class { name: String, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
    Wildcard(Option<(WildcardBound, Box<TypeRef>)>),
}

impl TypeRef {
    pub fn class(name: &str) -> Self {
        TypeRef::Class { name: name.to_string(), args: Vec::new() }
    }

    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Class { name: name.to_string(), args }
    }

    /// Whether the type carries explicit type arguments.
    pub fn is_generic(&self) -> bool {
        matches!(self, TypeRef::Class { args, .. } if !args.is_empty())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(name) => f.write_str(name),
            TypeRef::Class { name, args } if args.is_empty() => f.write_str(name),
            TypeRef::Class { name, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}<{}>", args.join(", "))
            }
            TypeRef::Array(element) => write!(f, "{element}[]"),
            TypeRef::Wildcard(None) => f.write_str("?"),
            TypeRef::Wildcard(Some((WildcardBound::Extends, bound))) => write!(f, "? extends {bound}"),
            TypeRef::Wildcard(Some((WildcardBound::Super, bound))) => write!(f, "? super {bound}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Annotation name as written, possibly qualified.
    pub name: String,
    pub args: AnnotationArgs,
}

impl Annotation {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationArgs {
    /// `@Foo`
    Marker,
    /// `@Foo(value)`
    Single(ElementValue),
    /// `@Foo(key = value, ...)`
    Pairs(Vec<(String, ElementValue)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Any expression, kept as source text.
    Expr(String),
    /// `{a, b, ...}`
    Array(Vec<ElementValue>),
}

impl fmt::Display for ElementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementValue::Expr(text) => f.write_str(text),
            ElementValue::Array(values) => {
                let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", values.join(", "))
            }
        }
    }
}
