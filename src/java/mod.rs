//! Java front end: a tree-sitter based parser producing the declaration
//! model, and a best-effort type solver over the parsed source root.

pub mod ast;
pub mod parser;
pub mod solver;

pub use ast::{
    Annotation, AnnotationArgs, CompilationUnit, ElementValue, ImportDecl, MethodDecl, TypeDecl, TypeRef,
};
pub use parser::parse_file;
pub use solver::{Scope, SourceTypeSolver, TypeIndex, TypeSolver};

/// Names imported by one file, in the order the import declarations appear.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    imports: Vec<ImportDecl>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, import: &ImportDecl) {
        if !self.imports.contains(import) {
            self.imports.push(import.clone());
        }
    }

    /// First imported name ending in `.<simple_name>`.
    pub fn find(&self, simple_name: &str) -> Option<&str> {
        let suffix = format!(".{simple_name}");
        self.imports
            .iter()
            .filter(|import| !import.is_wildcard)
            .map(|import| import.name.as_str())
            .find(|name| name.ends_with(&suffix))
    }

    /// Packages (or types) imported on demand with `.*`.
    pub fn wildcards(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter(|import| import.is_wildcard && !import.is_static)
            .map(|import| import.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }
}
