use crate::java::{ImportTable, MethodDecl, Scope, TypeRef, TypeSolver};

/// Separator between an outer type and its member type in class names.
pub const NESTED_SEPARATOR: char = '$';

/// Where a method is declared.
#[derive(Debug, Clone, Copy)]
pub struct DeclContext<'a> {
    pub package: &'a str,
    /// Enclosing type names, outermost first; the last one declares the method.
    pub class_path: &'a [String],
    /// Type variables of the enclosing types.
    pub type_params: &'a [String],
}

impl DeclContext<'_> {
    /// `pkg.Outer$Inner`
    pub fn class_name(&self) -> String {
        let nested = self.class_path.join(&NESTED_SEPARATOR.to_string());
        if self.package.is_empty() {
            nested
        } else {
            format!("{}.{nested}", self.package)
        }
    }
}

/// Owner, return and parameter types of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub class_name: String,
    pub name: String,
    pub return_type: String,
    pub params: Vec<String>,
    /// Some type came from the import-table/package fallback rather than
    /// from the solver.
    pub heuristic: bool,
}

/// Produces stable signatures, falling back to import-table guesses when the
/// solver cannot place a type.
pub struct SignatureResolver<'a> {
    solver: &'a dyn TypeSolver,
}

impl<'a> SignatureResolver<'a> {
    pub fn new(solver: &'a dyn TypeSolver) -> Self {
        SignatureResolver { solver }
    }

    pub fn resolve(&self, method: &MethodDecl, ctx: &DeclContext<'_>, imports: &ImportTable) -> MethodSignature {
        let mut type_params: Vec<String> = ctx.type_params.to_vec();
        type_params.extend(method.type_params.iter().cloned());
        let scope = Scope {
            package: ctx.package,
            imports,
            enclosing: ctx.class_path,
            type_params: &type_params,
        };
        let mut heuristic = false;

        let return_type = match self.solver.describe(&method.return_type, &scope) {
            Ok(described) => described,
            Err(unresolved) => {
                tracing::trace!(method = %method.name, symbol = %unresolved.name, "return type unresolved");
                heuristic = true;
                self.fallback(&method.return_type, &scope)
            }
        };

        let params = method
            .params
            .iter()
            .map(|param| {
                let described = self
                    .solver
                    .describe(&param.ty, &scope)
                    .map(|ty| nest_inner_class(&ty));
                let ty = match described {
                    Ok(ty) => ty,
                    Err(unresolved) => {
                        tracing::trace!(
                            method = %method.name,
                            param = %param.name,
                            symbol = %unresolved.name,
                            "parameter type unresolved"
                        );
                        heuristic = true;
                        self.fallback(&param.ty, &scope)
                    }
                };
                if param.varargs { format!("{ty}...") } else { ty }
            })
            .collect();

        MethodSignature {
            class_name: ctx.class_name(),
            name: method.name.clone(),
            return_type,
            params,
            heuristic,
        }
    }

    /// Best-effort name for a type the solver rejected.
    fn fallback(&self, ty: &TypeRef, scope: &Scope<'_>) -> String {
        match ty {
            TypeRef::Class { args, .. } if !args.is_empty() => self.fallback_generic(ty, scope),
            TypeRef::Class { name, .. } => guess_qualified(name, scope),
            TypeRef::Array(element) => format!("{}[]", self.fallback(element, scope)),
            other => other.to_string(),
        }
    }

    /// `Base<Arg, ...>` with the base taken from the imports and each argument
    /// resolved on its own.
    fn fallback_generic(&self, ty: &TypeRef, scope: &Scope<'_>) -> String {
        let TypeRef::Class { name, args } = ty else {
            return self.fallback(ty, scope);
        };
        let base = guess_qualified(name, scope);
        let args: Vec<String> = args
            .iter()
            .map(|arg| {
                if arg.is_generic() {
                    self.fallback_generic(arg, scope)
                } else {
                    self.solver
                        .describe(arg, scope)
                        .unwrap_or_else(|_| self.fallback(arg, scope))
                }
            })
            .collect();
        format!("{base}<{}>", args.join(","))
    }
}

/// The import whose name ends in `.<name>`, else `<package>.<name>`.
fn guess_qualified(name: &str, scope: &Scope<'_>) -> String {
    if let Some(imported) = scope.imports.find(name) {
        return imported.to_string();
    }
    if scope.package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", scope.package)
    }
}

/// `a.b.Outer.Inner` becomes `a.b.Outer$Inner` when the last two segments
/// both start with a capital letter.
fn nest_inner_class(described: &str) -> String {
    let Some((prefix, last)) = described.rsplit_once('.') else {
        return described.to_string();
    };
    let outer = prefix.rsplit('.').next().unwrap_or(prefix);
    let capitalized = |s: &str| s.chars().next().is_some_and(char::is_uppercase);
    if capitalized(outer) && capitalized(last) {
        format!("{prefix}{NESTED_SEPARATOR}{last}")
    } else {
        described.to_string()
    }
}
