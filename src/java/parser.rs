use std::fs;
use std::path::Path;

use tree_sitter::{Node, Parser};

use super::ast::{
    Annotation, AnnotationArgs, CompilationUnit, ElementValue, ImportDecl, MethodDecl, Param, TypeDecl,
    TypeKind, TypeRef, WildcardBound,
};
use crate::error::{ExtractError, Result};

/// Read and parse one Java source file.
pub fn parse_file(path: &Path) -> Result<CompilationUnit> {
    let bytes = fs::read(path)?;
    let source = String::from_utf8(bytes).map_err(|e| ExtractError::MalformedSource {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {e}"),
    })?;
    parse_source(&source, path)
}

/// Parse Java source text. Local syntax errors are tolerated; whatever
/// declarations tree-sitter recovers are kept.
pub fn parse_source(source: &str, path: &Path) -> Result<CompilationUnit> {
    let malformed = |message: String| ExtractError::MalformedSource { path: path.to_path_buf(), message };

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| malformed(format!("failed to load Java grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| malformed("tree-sitter produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!(path = %path.display(), "syntax errors in source, continuing with recovered tree");
    }

    Ok(UnitBuilder { source: source.as_bytes() }.build(root))
}

struct UnitBuilder<'a> {
    source: &'a [u8],
}

impl<'a> UnitBuilder<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn build(&self, root: Node) -> CompilationUnit {
        let mut unit = CompilationUnit::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => unit.package = self.name_child(child),
                "import_declaration" => {
                    if let Some(import) = self.import(child) {
                        unit.imports.push(import);
                    }
                }
                _ => {
                    if let Some(ty) = self.type_decl(child) {
                        unit.types.push(ty);
                    }
                }
            }
        }
        unit
    }

    fn name_child(&self, node: Node) -> Option<String> {
        let mut cursor = node.walk();
        let name = node
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
            .map(|c| self.text(c).to_string());
        name
    }

    fn import(&self, node: Node) -> Option<ImportDecl> {
        let name = self.name_child(node)?;
        let mut is_static = false;
        let mut is_wildcard = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => is_wildcard = true,
                _ => {}
            }
        }
        Some(ImportDecl { name, is_static, is_wildcard })
    }

    fn type_decl(&self, node: Node) -> Option<TypeDecl> {
        let kind = match node.kind() {
            "class_declaration" => TypeKind::Class,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            "annotation_type_declaration" => TypeKind::Annotation,
            _ => return None,
        };
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|tp| self.type_params(tp))
            .unwrap_or_default();

        let mut decl = TypeDecl { name, kind, type_params, methods: Vec::new(), nested: Vec::new() };
        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, &mut decl, &mut LocalTypes::default());
        }
        Some(decl)
    }

    fn members(&self, body: Node, decl: &mut TypeDecl, locals: &mut LocalTypes) {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => {
                    let Some(method) = self.method(member) else {
                        continue;
                    };
                    if let Some(block) = member.child_by_field_name("body") {
                        self.local_types(block, &method.type_params, decl, locals);
                    }
                    decl.methods.push(method);
                }
                // members declared after the enum constants
                "enum_body_declarations" => self.members(member, decl, locals),
                "enum_constant" => {
                    if let Some(args) = member.child_by_field_name("arguments") {
                        self.local_types(args, &[], decl, locals);
                    }
                    if let Some(body) = member.child_by_field_name("body") {
                        let name = locals.next_anonymous();
                        decl.nested.push(self.anonymous_class(name, body, &[]));
                    }
                }
                _ => match self.type_decl(member) {
                    Some(nested) => decl.nested.push(nested),
                    // constructors, initializers and field initializers
                    None => self.local_types(member, &[], decl, locals),
                },
            }
        }
    }

    /// Anonymous and local classes declared under `node`, added to `decl`
    /// with javac's binary names (`1`, `2`, `1Local`). `type_params` are the
    /// type variables of the enclosing method.
    fn local_types(&self, node: Node, type_params: &[String], decl: &mut TypeDecl, locals: &mut LocalTypes) {
        match node.kind() {
            "object_creation_expression" => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                let body = children.iter().find(|c| c.kind() == "class_body").copied();
                let name = body.map(|_| locals.next_anonymous());
                for child in children.iter().filter(|c| c.kind() != "class_body") {
                    self.local_types(*child, type_params, decl, locals);
                }
                if let (Some(body), Some(name)) = (body, name) {
                    decl.nested.push(self.anonymous_class(name, body, type_params));
                }
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                if let Some(mut local) = self.type_decl(node) {
                    local.name = locals.local_name(&local.name);
                    let mut params = type_params.to_vec();
                    params.append(&mut local.type_params);
                    local.type_params = params;
                    decl.nested.push(local);
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.local_types(child, type_params, decl, locals);
                }
            }
        }
    }

    fn anonymous_class(&self, name: String, body: Node, type_params: &[String]) -> TypeDecl {
        let mut decl = TypeDecl {
            name,
            kind: TypeKind::Anonymous,
            type_params: type_params.to_vec(),
            methods: Vec::new(),
            nested: Vec::new(),
        };
        self.members(body, &mut decl, &mut LocalTypes::default());
        decl
    }

    fn type_params(&self, node: Node) -> Vec<String> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() == "type_parameter")
            .filter_map(|param| {
                let mut inner = param.walk();
                let name = param
                    .named_children(&mut inner)
                    .find(|c| matches!(c.kind(), "type_identifier" | "identifier"))
                    .map(|c| self.text(c).to_string());
                name
            })
            .collect()
    }

    fn method(&self, node: Node) -> Option<MethodDecl> {
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let mut return_type = self.type_ref(node.child_by_field_name("type")?);
        // `int foo()[]` style array returns
        if let Some(dims) = node.child_by_field_name("dimensions") {
            return_type = wrap_array(return_type, count_dimensions(dims));
        }

        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|tp| self.type_params(tp))
            .unwrap_or_default();
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.params(p))
            .unwrap_or_default();

        let mut annotations = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" {
                let mut inner = child.walk();
                for modifier in child.named_children(&mut inner) {
                    if let Some(annotation) = self.annotation(modifier) {
                        annotations.push(annotation);
                    }
                }
            }
        }

        Some(MethodDecl {
            name,
            type_params,
            return_type,
            params,
            annotations,
            javadoc: self.javadoc(node),
            line: node.start_position().row + 1,
        })
    }

    fn params(&self, node: Node) -> Vec<Param> {
        let mut params = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "formal_parameter" => {
                    let Some(ty_node) = child.child_by_field_name("type") else {
                        continue;
                    };
                    let mut ty = self.type_ref(ty_node);
                    // `String args[]`
                    if let Some(dims) = child.child_by_field_name("dimensions") {
                        ty = wrap_array(ty, count_dimensions(dims));
                    }
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    params.push(Param { name, ty, varargs: false });
                }
                "spread_parameter" => {
                    let mut inner = child.walk();
                    let mut ty = None;
                    let mut name = String::new();
                    for part in child.named_children(&mut inner) {
                        match part.kind() {
                            "modifiers" | "marker_annotation" | "annotation" => {}
                            "variable_declarator" => {
                                name = part
                                    .child_by_field_name("name")
                                    .map(|n| self.text(n).to_string())
                                    .unwrap_or_default();
                            }
                            _ if ty.is_none() => ty = Some(self.type_ref(part)),
                            _ => {}
                        }
                    }
                    if let Some(ty) = ty {
                        params.push(Param { name, ty, varargs: true });
                    }
                }
                // receiver parameters (`Foo this`) are not part of the signature
                _ => {}
            }
        }
        params
    }

    fn type_ref(&self, node: Node) -> TypeRef {
        match node.kind() {
            "void_type" | "integral_type" | "floating_point_type" | "boolean_type" => {
                TypeRef::Primitive(self.text(node).to_string())
            }
            "type_identifier" => TypeRef::class(self.text(node)),
            "scoped_type_identifier" => TypeRef::class(&self.scoped_name(node)),
            "generic_type" => {
                let mut name = String::new();
                let mut args = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "type_identifier" => name = self.text(child).to_string(),
                        "scoped_type_identifier" => name = self.scoped_name(child),
                        "type_arguments" => args = self.type_args(child),
                        _ => {}
                    }
                }
                TypeRef::generic(&name, args)
            }
            "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .map(|e| self.type_ref(e))
                    .unwrap_or_else(|| TypeRef::class(self.text(node).trim_end_matches("[]")));
                let dims = node
                    .child_by_field_name("dimensions")
                    .map(count_dimensions)
                    .unwrap_or(1);
                wrap_array(element, dims)
            }
            "annotated_type" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .filter(|c| !matches!(c.kind(), "marker_annotation" | "annotation"))
                    .last();
                match inner {
                    Some(inner) => self.type_ref(inner),
                    None => TypeRef::class(self.text(node)),
                }
            }
            "wildcard" => {
                let mut bound = None;
                let mut is_super = false;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "super" => is_super = true,
                        "extends" | "?" | "marker_annotation" | "annotation" => {}
                        _ if child.is_named() => bound = Some(self.type_ref(child)),
                        _ => {}
                    }
                }
                let kind = if is_super { WildcardBound::Super } else { WildcardBound::Extends };
                TypeRef::Wildcard(bound.map(|b| (kind, Box::new(b))))
            }
            _ => TypeRef::class(self.text(node)),
        }
    }

    /// Dotted name of a scoped type, dropping type arguments and annotations
    /// of outer segments.
    fn scoped_name(&self, node: Node) -> String {
        let mut segments = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "type_identifier" => segments.push(self.text(child).to_string()),
                "scoped_type_identifier" => segments.push(self.scoped_name(child)),
                "generic_type" => {
                    if let TypeRef::Class { name, .. } = self.type_ref(child) {
                        segments.push(name);
                    }
                }
                _ => {}
            }
        }
        segments.join(".")
    }

    fn type_args(&self, node: Node) -> Vec<TypeRef> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| !is_comment(*c))
            .map(|c| self.type_ref(c))
            .collect()
    }

    fn annotation(&self, node: Node) -> Option<Annotation> {
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let args = match node.kind() {
            "marker_annotation" => AnnotationArgs::Marker,
            "annotation" => match node.child_by_field_name("arguments") {
                Some(list) => self.annotation_args(list),
                None => AnnotationArgs::Marker,
            },
            _ => return None,
        };
        Some(Annotation { name, args })
    }

    fn annotation_args(&self, list: Node) -> AnnotationArgs {
        let mut cursor = list.walk();
        let children: Vec<Node> = list.named_children(&mut cursor).filter(|c| !is_comment(*c)).collect();

        if children.is_empty() {
            return AnnotationArgs::Pairs(Vec::new());
        }
        if children.iter().all(|c| c.kind() == "element_value_pair") {
            let pairs = children
                .iter()
                .filter_map(|pair| {
                    let key = self.text(pair.child_by_field_name("key")?).to_string();
                    let value = self.element_value(pair.child_by_field_name("value")?);
                    Some((key, value))
                })
                .collect();
            return AnnotationArgs::Pairs(pairs);
        }
        AnnotationArgs::Single(self.element_value(children[0]))
    }

    fn element_value(&self, node: Node) -> ElementValue {
        if node.kind() == "element_value_array_initializer" {
            let mut cursor = node.walk();
            let values = node
                .named_children(&mut cursor)
                .filter(|c| !is_comment(*c))
                .map(|c| self.element_value(c))
                .collect();
            ElementValue::Array(values)
        } else {
            ElementValue::Expr(collapse_whitespace(self.text(node)))
        }
    }

    /// The `/** */` comment right before a declaration, looking past line
    /// comments.
    fn javadoc(&self, node: Node) -> Option<String> {
        let mut prev = node.prev_sibling();
        while let Some(sibling) = prev {
            match sibling.kind() {
                "line_comment" => prev = sibling.prev_sibling(),
                "block_comment" => {
                    let text = self.text(sibling);
                    return text.starts_with("/**").then(|| text.to_string());
                }
                _ => return None,
            }
        }
        None
    }
}

/// Per-class counters behind the names of anonymous (`Outer$1`) and local
/// (`Outer$1Local`) classes.
#[derive(Debug, Default)]
struct LocalTypes {
    anonymous: usize,
    local: Vec<String>,
}

impl LocalTypes {
    fn next_anonymous(&mut self) -> String {
        self.anonymous += 1;
        self.anonymous.to_string()
    }

    fn local_name(&mut self, name: &str) -> String {
        let index = self.local.iter().filter(|seen| *seen == name).count() + 1;
        self.local.push(name.to_string());
        format!("{index}{name}")
    }
}

fn is_comment(node: Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

fn count_dimensions(dims: Node) -> usize {
    let mut cursor = dims.walk();
    let count = dims.children(&mut cursor).filter(|c| c.kind() == "[").count();
    count.max(1)
}

fn wrap_array(mut ty: TypeRef, dims: usize) -> TypeRef {
    for _ in 0..dims {
        ty = TypeRef::Array(Box::new(ty));
    }
    ty
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
