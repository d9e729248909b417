use indexmap::IndexMap;

use super::ast::*;
use super::error::CompileError;
use super::lexer;
use super::parser;

/// One bound macro: the converted text and the expression it parses to.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroValue {
    pub text: String,
    pub expr: Expr,
}

/// Macro bindings for one VU, in declaration order. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroTable {
    bindings: IndexMap<String, MacroValue>,
}

/// Documentation markup allowed in macro values: `pname:` prefixes are
/// dropped and `->` dereferences become `.`.
pub fn convert_value(value: &str) -> String {
    value.replace("pname:", "").replace("->", ".")
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name1$value1$name2$value2...`. An empty declaration is an
    /// empty table.
    pub fn from_decl(decl: &str) -> Result<Self, CompileError> {
        let decl = decl.trim();
        if decl.is_empty() {
            return Ok(Self::new());
        }
        let parts: Vec<&str> = decl.split('$').collect();
        if parts.len() % 2 != 0 {
            return Err(CompileError::macro_error(
                format!("Macro declaration has an odd number of fields: {decl}"),
                Span::default(),
            ));
        }
        let mut table = Self::new();
        for pair in parts.chunks(2) {
            if let [name, value] = pair {
                table.bind(name, value)?;
            }
        }
        Ok(table)
    }

    /// Bind `name` to `value`, which must parse as a single expression.
    pub fn bind(&mut self, name: &str, value: &str) -> Result<(), CompileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CompileError::macro_error("Macro with an empty name", Span::default()));
        }
        let text = convert_value(value.trim());
        let expr = parse_value(&text).map_err(|e| {
            CompileError::macro_error(
                format!("Invalid value for macro {name}: {text} ({})", e.message),
                Span::default(),
            )
        })?;
        self.bindings.insert(name.to_string(), MacroValue { text, expr });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MacroValue> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MacroValue)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The API a VU is attached to may itself be a macro reference, `{name}`.
    pub fn resolve_api_name(&self, api: &str) -> Result<String, CompileError> {
        let api = api.trim();
        match api.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => self.get(name).map(|v| v.text.clone()).ok_or_else(|| {
                CompileError::macro_error(
                    format!("API name refers to undefined macro {name}"),
                    Span::default(),
                )
            }),
            None => Ok(api.to_string()),
        }
    }
}

fn parse_value(text: &str) -> Result<Expr, CompileError> {
    let tokens = lexer::lex(text).map_err(|mut errs| {
        errs.drain(..)
            .next()
            .unwrap_or_else(|| CompileError::lexer("Invalid macro value", Span::default()))
    })?;
    parser::parse_expression(tokens)
}

/// Replace every `macro(name)` with its bound value. `obj.macro(name)`
/// grafts the value's attribute chain onto `obj`. All unbound macros are
/// reported.
pub fn expand(module: &Module, table: &MacroTable) -> Result<Module, Vec<CompileError>> {
    let mut out = module.clone();
    let mut errors = Vec::new();
    for stmt in &mut out.body {
        expand_stmt(stmt, table, &mut errors);
    }
    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

fn expand_stmt(stmt: &mut Stmt, table: &MacroTable, errors: &mut Vec<CompileError>) {
    match &mut stmt.kind {
        StmtKind::Assign { targets, value } => {
            targets.iter_mut().for_each(|t| expand_expr(t, table, errors));
            expand_expr(value, table, errors);
        }
        StmtKind::If { test, body, orelse } => {
            expand_expr(test, table, errors);
            body.iter_mut().chain(orelse.iter_mut()).for_each(|s| expand_stmt(s, table, errors));
        }
        StmtKind::For { target, iter, body } => {
            expand_expr(target, table, errors);
            expand_expr(iter, table, errors);
            body.iter_mut().for_each(|s| expand_stmt(s, table, errors));
        }
        StmtKind::Expr(e) => expand_expr(e, table, errors),
        StmtKind::Pass | StmtKind::Comment(_) => {}
    }
}

fn expand_expr(expr: &mut Expr, table: &MacroTable, errors: &mut Vec<CompileError>) {
    match &mut expr.kind {
        ExprKind::Name(_) | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => {}
        ExprKind::BoolOp { values, .. } => values.iter_mut().for_each(|v| expand_expr(v, table, errors)),
        ExprKind::Compare { left, ops } => {
            expand_expr(left, table, errors);
            ops.iter_mut().for_each(|(_, e)| expand_expr(e, table, errors));
        }
        ExprKind::BinOp { left, right, .. } => {
            expand_expr(left, table, errors);
            expand_expr(right, table, errors);
        }
        ExprKind::UnaryOp { operand, .. } => expand_expr(operand, table, errors),
        ExprKind::Call { func, args } => {
            if let Some(replacement) = expand_call(func, args, expr.span, table, errors) {
                *expr = replacement;
                return;
            }
            expand_expr(func, table, errors);
            args.iter_mut().for_each(|a| expand_expr(a, table, errors));
        }
        ExprKind::Attribute { value, .. } => expand_expr(value, table, errors),
        ExprKind::Subscript { value, index } => {
            expand_expr(value, table, errors);
            expand_expr(index, table, errors);
        }
        ExprKind::IfExp { test, body, orelse } => {
            expand_expr(test, table, errors);
            expand_expr(body, table, errors);
            expand_expr(orelse, table, errors);
        }
    }
}

/// The replacement for a `macro(...)` call, or `None` if `func` is not
/// `macro`. Errors are recorded and leave a placeholder name in place.
fn expand_call(
    func: &mut Expr,
    args: &[Expr],
    span: Span,
    table: &MacroTable,
    errors: &mut Vec<CompileError>,
) -> Option<Expr> {
    let receiver = match &mut func.kind {
        ExprKind::Name(id) if *id == "macro" => None,
        ExprKind::Attribute { value, attr } if *attr == "macro" => Some(value),
        _ => return None,
    };

    let name = match args {
        [arg] => arg.as_name(),
        _ => None,
    };
    let Some(name) = name else {
        errors.push(CompileError::macro_error(
            "macro() takes exactly one macro name",
            span,
        ));
        return Some(Expr::name("macro", span));
    };
    let Some(bound) = table.get(name) else {
        errors.push(CompileError::macro_error(format!("Undefined macro {name}"), span));
        return Some(Expr::name(name, span));
    };

    let mut value = bound.expr.clone();
    value.respan(span);
    match receiver {
        None => Some(value),
        Some(receiver) => {
            let mut receiver = std::mem::replace(&mut **receiver, Expr::name("macro", span));
            expand_expr(&mut receiver, table, errors);
            match graft(value, receiver) {
                Ok(e) => Some(e),
                Err(value) => {
                    errors.push(CompileError::macro_error(
                        format!("Macro {name} cannot be used as an attribute: {}", bound.text),
                        value.span,
                    ));
                    Some(Expr::name(name, span))
                }
            }
        }
    }
}

/// Rebase an attribute chain `a.b.c` onto `receiver`, giving
/// `receiver.a.b.c`. Values that are not a plain chain are handed back.
fn graft(value: Expr, receiver: Expr) -> Result<Expr, Expr> {
    let span = value.span;
    match value.kind {
        ExprKind::Name(id) => Ok(Expr::new(
            ExprKind::Attribute { value: Box::new(receiver), attr: id },
            span,
        )),
        ExprKind::Attribute { value: inner, attr } => {
            let inner = graft(*inner, receiver).map_err(|inner| {
                Expr::new(ExprKind::Attribute { value: Box::new(inner), attr: attr.clone() }, span)
            })?;
            Ok(Expr::new(ExprKind::Attribute { value: Box::new(inner), attr }, span))
        }
        kind => Err(Expr::new(kind, span)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn module(src: &str) -> Module {
        parser::parse(lexer::lex(src).unwrap()).unwrap()
    }

    fn require_arg(m: &Module) -> &Expr {
        match &m.body[0].kind {
            StmtKind::Expr(e) => &e.call_args("require").unwrap()[0],
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decl_pairs_in_order() {
        let t = MacroTable::from_decl("dmode$depthResolveMode$smode$stencilResolveMode").unwrap();
        assert_eq!(t.len(), 2);
        let names: Vec<_> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["dmode", "smode"]);
        assert_eq!(t.get("smode").unwrap().text, "stencilResolveMode");
    }

    #[test]
    fn decl_odd_count_is_error() {
        let err = MacroTable::from_decl("a$b$c").unwrap_err();
        assert_eq!(err.kind, super::super::error::ErrorKind::Macro);
        assert!(MacroTable::from_decl("").unwrap().is_empty());
    }

    #[test]
    fn values_are_converted() {
        let t = MacroTable::from_decl("p$pname:pCreateInfo->flags").unwrap();
        assert_eq!(t.get("p").unwrap().text, "pCreateInfo.flags");
        assert!(matches!(t.get("p").unwrap().expr.kind, ExprKind::Attribute { .. }));
    }

    #[test]
    fn unparsable_value_is_error() {
        assert!(MacroTable::from_decl("a$ename:VK_TRUE").is_err());
        assert!(MacroTable::from_decl("a$b c").is_err());
        assert!(MacroTable::from_decl("a$VK_TRUE)").is_err());
    }

    #[test]
    fn expand_replaces_calls() {
        let t = MacroTable::from_decl("m$imageType").unwrap();
        let m = expand(&module("require(macro(m) == VK_IMAGE_TYPE_1D)"), &t).unwrap();
        match &require_arg(&m).kind {
            ExprKind::Compare { left, .. } => assert_eq!(left.as_name(), Some("imageType")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn expand_takes_span_of_call() {
        let t = MacroTable::from_decl("m$a.b").unwrap();
        let m = expand(&module("require(macro(m))"), &t).unwrap();
        let arg = require_arg(&m);
        assert_eq!(arg.span, Span::new(8, 16));
        match &arg.kind {
            ExprKind::Attribute { value, .. } => assert_eq!(value.span, arg.span),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn expand_attribute_form_grafts_chain() {
        let t = MacroTable::from_decl("off$dstOffset").unwrap();
        let m = expand(&module("require(region.macro(off).y == 0)"), &t).unwrap();
        let ExprKind::Compare { left, .. } = &require_arg(&m).kind else { panic!() };
        let ExprKind::Attribute { value, attr } = &left.kind else { panic!() };
        assert_eq!(attr, "y");
        let ExprKind::Attribute { value: base, attr } = &value.kind else { panic!() };
        assert_eq!(attr, "dstOffset");
        assert_eq!(base.as_name(), Some("region"));
    }

    #[test]
    fn expand_reports_every_unbound_macro() {
        let errs = expand(&module("if macro(a):\n  require(macro(b))"), &MacroTable::new()).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs[1].message.contains("Undefined macro b"));
    }

    #[test]
    fn api_name_macro() {
        let t = MacroTable::from_decl("refpage$vkCmdDraw").unwrap();
        assert_eq!(t.resolve_api_name("{refpage}").unwrap(), "vkCmdDraw");
        assert_eq!(t.resolve_api_name("VkImageCreateInfo").unwrap(), "VkImageCreateInfo");
        assert!(t.resolve_api_name("{missing}").is_err());
    }
}
