use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::error::CompileError;
use crate::schema::{Availability, Schema};

/// Features that older extensions exposed without a feature bit. When the
/// version that added the feature is not built, `is_feature_enabled(f)`
/// falls back to `is_ext_enabled(ext)`.
const PROMOTED_FEATURE_EXTENSIONS: &[(&str, &str)] = &[
    ("shaderDrawParameters", "VK_KHR_shader_draw_parameters"),
    ("drawIndirectCount", "VK_KHR_draw_indirect_count"),
    ("samplerMirrorClampToEdge", "VK_KHR_sampler_mirror_clamp_to_edge"),
    ("descriptorIndexing", "VK_EXT_descriptor_indexing"),
    ("samplerFilterMinmax", "VK_EXT_sampler_filter_minmax"),
    ("shaderOutputViewportIndex", "VK_EXT_shader_viewport_index_layer"),
    ("shaderOutputLayer", "VK_EXT_shader_viewport_index_layer"),
];

pub const REQUIRE_FALSE_WARNING: &str = "require() condition evaluates to False in this build.";
pub const REQUIRE_FALSE_ADVICE: &str = "This hurts VU readability, invert the VU logic instead.";

/// The versions and extensions a documentation build includes. Names are matched
/// case-insensitively, so everything is stored lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Build {
    versions: Vec<String>,
    extensions: Vec<String>,
}

impl Build {
    pub fn new<V, E>(versions: V, extensions: E) -> Self
    where
        V: IntoIterator,
        V::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            versions: versions
                .into_iter()
                .filter(|v| !v.as_ref().trim().is_empty())
                .map(|v| normalize_version(v.as_ref()))
                .collect(),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn has_version(&self, major: i64, minor: i64) -> bool {
        let name = format!("vk_version_{major}_{minor}");
        self.versions.contains(&name)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.extensions.contains(&name)
    }

    /// Whether a version or extension name is part of the build.
    pub fn is_enabled(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.versions.contains(&name) || self.extensions.contains(&name)
    }

    pub fn includes(&self, availability: &Availability) -> bool {
        availability.is_defined(|part| self.is_enabled(part))
    }
}

/// `1.2` → `vk_version_1_2`; full names are only lower-cased.
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    let is_number = !version.is_empty()
        && version.chars().all(|c| c.is_ascii_digit() || c == '.');
    if is_number {
        format!("vk_version_{}", version.replace('.', "_"))
    } else {
        version.to_ascii_lowercase()
    }
}

/// Result of [`eliminate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Elimination {
    /// `None` when nothing of the VU is left for this build.
    pub module: Option<Module>,
    /// Whether anything was removed or rewritten.
    pub eliminated: bool,
    pub warnings: Vec<String>,
}

/// Strip a validated, macro-expanded VU for `build`, then remove dead code
/// until nothing changes.
pub fn eliminate(module: &Module, schema: &Schema, build: &Build) -> Result<Elimination, CompileError> {
    let (stripped, warnings) = strip_for_build(module, schema, build)?;
    let stripped_any = stripped.as_ref() != Some(module);
    let (module, dead_any) = match &stripped {
        Some(m) => remove_dead_code(m),
        None => (None, false),
    };

    Ok(Elimination {
        module,
        eliminated: stripped_any || dead_any,
        warnings,
    })
}

/// Repeat [`eliminate_dead_code`] until a pass removes nothing.
pub fn remove_dead_code(module: &Module) -> (Option<Module>, bool) {
    let mut current = Some(module.clone());
    let mut any = false;
    while let Some(m) = &current {
        let (next, changed) = eliminate_dead_code(m);
        if !changed {
            break;
        }
        any = true;
        current = next;
    }
    (current, any)
}

// ── Pass 1: Build strip ──────────────────────────────────────────────

/// Replace build-dependent predicates with constants and propagate them.
/// Returns the stripped VU (`None` if nothing is left) and any warnings.
pub fn strip_for_build(
    module: &Module,
    schema: &Schema,
    build: &Build,
) -> Result<(Option<Module>, Vec<String>), CompileError> {
    let mut strip = BuildStrip {
        schema,
        build,
        constants: HashMap::new(),
        warnings: Vec::new(),
    };
    let body = strip.block(&module.body)?;
    Ok((body.map(|body| Module { body }), strip.warnings))
}

struct BuildStrip<'a> {
    schema: &'a Schema,
    build: &'a Build,
    /// Boolean variables whose value became constant; references are
    /// replaced by the value.
    constants: HashMap<String, bool>,
    warnings: Vec<String>,
}

impl BuildStrip<'_> {
    /// `None` if the block is empty or holds only comments.
    fn block(&mut self, stmts: &[Stmt]) -> Result<Option<Vec<Stmt>>, CompileError> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            out.extend(self.stmt(stmt)?);
        }
        if out.iter().all(Stmt::is_comment) {
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Zero, one, or (for a folded `if`) several statements.
    fn stmt(&mut self, stmt: &Stmt) -> Result<Vec<Stmt>, CompileError> {
        let span = stmt.span;
        let kind = match &stmt.kind {
            StmtKind::Expr(e) => {
                let e = self.expr(e)?;
                if let Some([arg]) = e.call_args("require") {
                    match arg.as_bool() {
                        Some(true) => return Ok(Vec::new()),
                        Some(false) => {
                            self.warnings.push(REQUIRE_FALSE_WARNING.to_string());
                            self.warnings.push(REQUIRE_FALSE_ADVICE.to_string());
                        }
                        None => {}
                    }
                }
                StmtKind::Expr(e)
            }
            StmtKind::Assign { targets, value } => {
                let value = self.expr(value)?;
                if let (Some(b), [target]) = (value.as_bool(), targets.as_slice()) {
                    if let Some(name) = target.as_name() {
                        self.constants.insert(name.to_string(), b);
                        return Ok(Vec::new());
                    }
                }
                StmtKind::Assign {
                    targets: targets.clone(),
                    value,
                }
            }
            StmtKind::If { test, body, orelse } => {
                let test = self.expr(test)?;
                if let Some(b) = test.as_bool() {
                    let taken = if b { body } else { orelse };
                    return Ok(self.block(taken)?.unwrap_or_default());
                }
                let body = self.block(body)?;
                let orelse = self.block(orelse)?;
                match (body, orelse) {
                    (None, None) => return Ok(Vec::new()),
                    (None, Some(orelse)) => StmtKind::If {
                        test: Expr::not(test),
                        body: orelse,
                        orelse: Vec::new(),
                    },
                    (Some(body), orelse) => StmtKind::If {
                        test,
                        body,
                        orelse: orelse.unwrap_or_default(),
                    },
                }
            }
            StmtKind::For { target, iter, body } => {
                let iter = self.expr(iter)?;
                let Some(body) = self.block(body)? else {
                    return Ok(Vec::new());
                };
                StmtKind::For {
                    target: target.clone(),
                    iter,
                    body,
                }
            }
            StmtKind::Pass | StmtKind::Comment(_) => stmt.kind.clone(),
        };
        Ok(vec![Stmt::new(kind, span)])
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<Expr>, CompileError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: &Expr) -> Result<Box<Expr>, CompileError> {
        Ok(Box::new(self.expr(expr)?))
    }

    fn expr(&mut self, expr: &Expr) -> Result<Expr, CompileError> {
        let span = expr.span;
        let kind = match &expr.kind {
            ExprKind::Name(id) => match self.constants.get(id) {
                Some(&b) => ExprKind::Bool(b),
                None => expr.kind.clone(),
            },
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => expr.kind.clone(),
            ExprKind::BoolOp { op, values } => return self.bool_op(*op, values, span),
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.expr(operand)?;
                match (op, operand.kind) {
                    (UnaryOp::Not, ExprKind::Bool(b)) => ExprKind::Bool(!b),
                    // `not (x or not y)` with x false leaves `not not y`
                    (
                        UnaryOp::Not,
                        ExprKind::UnaryOp {
                            op: UnaryOp::Not,
                            operand: inner,
                        },
                    ) => return Ok(*inner),
                    (op, kind) => ExprKind::UnaryOp {
                        op: *op,
                        operand: Box::new(Expr::new(kind, operand.span)),
                    },
                }
            }
            ExprKind::BinOp { op, left, right } => ExprKind::BinOp {
                op: *op,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            ExprKind::Compare { left, ops } => return self.compare(left, ops, span),
            ExprKind::Call { func, args } => return self.call(func, args, span),
            ExprKind::Attribute { value, attr } => ExprKind::Attribute {
                value: self.boxed(value)?,
                attr: attr.clone(),
            },
            ExprKind::Subscript { value, index } => ExprKind::Subscript {
                value: self.boxed(value)?,
                index: self.boxed(index)?,
            },
            ExprKind::IfExp { test, body, orelse } => {
                let test = self.expr(test)?;
                match test.as_bool() {
                    Some(true) => return self.expr(body),
                    Some(false) => return self.expr(orelse),
                    None => ExprKind::IfExp {
                        test: Box::new(test),
                        body: self.boxed(body)?,
                        orelse: self.boxed(orelse)?,
                    },
                }
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn bool_op(&mut self, op: BoolOp, values: &[Expr], span: Span) -> Result<Expr, CompileError> {
        let values = self.exprs(values)?;
        // `and` is decided by a False operand, `or` by a True one.
        let deciding = op == BoolOp::Or;
        if values.iter().any(|v| v.as_bool() == Some(deciding)) {
            return Ok(Expr::boolean(deciding, span));
        }

        let mut remaining: Vec<Expr> = values.into_iter().filter(|v| v.as_bool().is_none()).collect();
        match remaining.len() {
            0 => Ok(Expr::boolean(!deciding, span)),
            1 => Ok(remaining.remove(0)),
            _ => Ok(Expr::new(ExprKind::BoolOp { op, values: remaining }, span)),
        }
    }

    fn compare(&mut self, left: &Expr, ops: &[(CmpOp, Expr)], span: Span) -> Result<Expr, CompileError> {
        if let [(op @ (CmpOp::Eq | CmpOp::NotEq), right)] = ops {
            // Equal to a value that does not exist in this build is never true.
            if self.is_stripped_enum(left) || self.is_stripped_enum(right) {
                return Ok(Expr::boolean(*op == CmpOp::NotEq, span));
            }
        }

        let left = self.expr(left)?;
        let ops = ops
            .iter()
            .map(|(op, e)| Ok((*op, self.expr(e)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;

        if let (Some(l), [(op, right)]) = (left.as_bool(), ops.as_slice()) {
            if let Some(r) = right.as_bool() {
                match op {
                    CmpOp::Eq => return Ok(Expr::boolean(l == r, span)),
                    CmpOp::NotEq => return Ok(Expr::boolean(l != r, span)),
                    _ => {}
                }
            }
        }

        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
            span,
        ))
    }

    fn is_stripped_enum(&self, expr: &Expr) -> bool {
        let Some(name) = expr.as_name() else {
            return false;
        };
        if self.schema.category(name) != Some(crate::schema::Category::EnumValue) {
            return false;
        }
        self.schema
            .availability(name)
            .is_some_and(|a| !self.build.includes(a))
    }

    fn call(&mut self, func: &Expr, args: &[Expr], span: Span) -> Result<Expr, CompileError> {
        let args = self.exprs(args)?;

        match &func.kind {
            ExprKind::Name(id) => match id.as_str() {
                "is_version" => return self.is_version(&args, span),
                "is_ext_enabled" => return Ok(self.is_ext_enabled(func, args, span)),
                "is_feature_enabled" => return self.is_feature_enabled(func, args, span),
                "has_pnext" => return self.available_or_false(func.clone(), args, span, "struct"),
                _ => {}
            },
            ExprKind::Attribute { attr, .. } => match attr.as_str() {
                "has_pnext" => {
                    let func = self.expr(func)?;
                    return self.available_or_false(func, args, span, "struct");
                }
                "has_bit" => {
                    let func = self.expr(func)?;
                    return self.available_or_false(func, args, span, "enum value");
                }
                _ => {}
            },
            _ => {}
        }

        Ok(Expr::new(
            ExprKind::Call {
                func: self.boxed(func)?,
                args,
            },
            span,
        ))
    }

    fn is_version(&self, args: &[Expr], span: Span) -> Result<Expr, CompileError> {
        match args {
            [Expr { kind: ExprKind::Int(major), .. }, Expr { kind: ExprKind::Int(minor), .. }] => {
                Ok(Expr::boolean(self.build.has_version(*major, *minor), span))
            }
            _ => Err(CompileError::internal(
                "is_version() arguments are not integer constants",
                span,
            )),
        }
    }

    fn is_ext_enabled(&self, func: &Expr, args: Vec<Expr>, span: Span) -> Expr {
        match args.first().and_then(Expr::as_name) {
            Some(ext) if !self.build.has_extension(ext) => Expr::boolean(false, span),
            _ => Expr::new(
                ExprKind::Call {
                    func: Box::new(func.clone()),
                    args,
                },
                span,
            ),
        }
    }

    fn is_feature_enabled(&self, func: &Expr, args: Vec<Expr>, span: Span) -> Result<Expr, CompileError> {
        let Some(feature) = args.first().and_then(Expr::as_name) else {
            return Err(CompileError::internal(
                "is_feature_enabled() argument is not a feature name",
                span,
            ));
        };
        let Some(availability) = self.schema.feature_availability(feature) else {
            return Err(CompileError::internal(
                format!("No availability recorded for feature {feature}"),
                span,
            ));
        };
        if self.build.includes(availability) {
            return Ok(Expr::new(
                ExprKind::Call {
                    func: Box::new(func.clone()),
                    args,
                },
                span,
            ));
        }

        let promoted = PROMOTED_FEATURE_EXTENSIONS
            .iter()
            .find(|(name, _)| *name == feature)
            .map(|(_, ext)| *ext);
        match promoted {
            Some(ext) => {
                let ext_func = Expr::name("is_ext_enabled", func.span);
                Ok(self.is_ext_enabled(&ext_func, vec![Expr::name(ext, span)], span))
            }
            None => Ok(Expr::boolean(false, span)),
        }
    }

    /// `has_pnext(S)`, `x.has_pnext(S)` and `x.has_bit(E)` are false when
    /// their argument is not part of the build.
    fn available_or_false(
        &self,
        func: Expr,
        args: Vec<Expr>,
        span: Span,
        what: &str,
    ) -> Result<Expr, CompileError> {
        if let Some(name) = args.first().and_then(Expr::as_name) {
            let Some(availability) = self.schema.availability(name) else {
                return Err(CompileError::internal(
                    format!("No availability recorded for {what} {name}"),
                    span,
                ));
            };
            if !self.build.includes(availability) {
                return Ok(Expr::boolean(false, span));
            }
        }
        Ok(Expr::new(
            ExprKind::Call {
                func: Box::new(func),
                args,
            },
            span,
        ))
    }
}

// ── Pass 2: Dead code elimination ────────────────────────────────────

/// One pass of dead code removal. Returns the cleaned VU (`None` if empty)
/// and whether anything was removed. Removing a variable can leave another
/// one unreferenced, so [`eliminate`] repeats this until it reports no
/// change.
pub fn eliminate_dead_code(module: &Module) -> (Option<Module>, bool) {
    let mut dce = DeadCode {
        unreferenced: unreferenced_variables(module),
        changed: false,
    };
    let body = dce.block(&module.body);
    (body.map(|body| Module { body }), dce.changed)
}

/// Variables that are assigned but never read.
fn unreferenced_variables(module: &Module) -> HashSet<String> {
    let mut variables = Vec::new();
    let mut references: HashMap<String, usize> = HashMap::new();
    for stmt in &module.body {
        count_stmt(stmt, &mut variables, &mut references);
    }
    variables
        .into_iter()
        // The assignment target itself is one reference.
        .filter(|v| references.get(v).copied().unwrap_or(0) <= 1)
        .collect()
}

fn count_stmt(stmt: &Stmt, variables: &mut Vec<String>, references: &mut HashMap<String, usize>) {
    match &stmt.kind {
        StmtKind::Assign { targets, value } => {
            for target in targets {
                if let Some(name) = target.as_name() {
                    variables.push(name.to_string());
                }
                count_expr(target, references);
            }
            count_expr(value, references);
        }
        StmtKind::If { test, body, orelse } => {
            count_expr(test, references);
            for s in body.iter().chain(orelse) {
                count_stmt(s, variables, references);
            }
        }
        StmtKind::For { target, iter, body } => {
            count_expr(target, references);
            count_expr(iter, references);
            for s in body {
                count_stmt(s, variables, references);
            }
        }
        StmtKind::Expr(e) => count_expr(e, references),
        StmtKind::Pass | StmtKind::Comment(_) => {}
    }
}

fn count_expr(expr: &Expr, references: &mut HashMap<String, usize>) {
    match &expr.kind {
        ExprKind::Name(id) => *references.entry(id.clone()).or_default() += 1,
        ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => {}
        ExprKind::BoolOp { values, .. } => values.iter().for_each(|v| count_expr(v, references)),
        ExprKind::Compare { left, ops } => {
            count_expr(left, references);
            ops.iter().for_each(|(_, e)| count_expr(e, references));
        }
        ExprKind::BinOp { left, right, .. } => {
            count_expr(left, references);
            count_expr(right, references);
        }
        ExprKind::UnaryOp { operand, .. } => count_expr(operand, references),
        ExprKind::Call { func, args } => {
            count_expr(func, references);
            args.iter().for_each(|a| count_expr(a, references));
        }
        ExprKind::Attribute { value, .. } => count_expr(value, references),
        ExprKind::Subscript { value, index } => {
            count_expr(value, references);
            count_expr(index, references);
        }
        ExprKind::IfExp { test, body, orelse } => {
            count_expr(test, references);
            count_expr(body, references);
            count_expr(orelse, references);
        }
    }
}

struct DeadCode {
    unreferenced: HashSet<String>,
    changed: bool,
}

impl DeadCode {
    fn block(&mut self, stmts: &[Stmt]) -> Option<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.stmt(stmt) {
                Some(s) => out.push(s),
                None => self.changed = true,
            }
        }
        if !stmts.is_empty() && out.iter().all(Stmt::is_comment) {
            self.changed = true;
            return None;
        }
        (!out.is_empty()).then_some(out)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Option<Stmt> {
        let kind = match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                let unused = targets
                    .first()
                    .and_then(Expr::as_name)
                    .is_some_and(|name| self.unreferenced.contains(name));
                if unused {
                    return None;
                }
                stmt.kind.clone()
            }
            StmtKind::Pass => return None,
            StmtKind::If { test, body, orelse } => {
                let body = self.block(body);
                let orelse = self.block(orelse);
                match (body, orelse) {
                    (None, None) => return None,
                    (None, Some(orelse)) => StmtKind::If {
                        test: Expr::not(test.clone()),
                        body: orelse,
                        orelse: Vec::new(),
                    },
                    (Some(body), orelse) => StmtKind::If {
                        test: test.clone(),
                        body,
                        orelse: orelse.unwrap_or_default(),
                    },
                }
            }
            StmtKind::For { target, iter, body } => StmtKind::For {
                target: target.clone(),
                iter: iter.clone(),
                body: self.block(body)?,
            },
            StmtKind::Expr(_) | StmtKind::Comment(_) => stmt.kind.clone(),
        };
        Some(Stmt::new(kind, stmt.span))
    }
}
