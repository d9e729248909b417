//! Natural-language rendering of a VU as a nested AsciiDoc bullet list.
//!
//! ```text
//! * if the following is true:
//! ** pname:depthResolveMode is equal to ename:VK_RESOLVE_MODE_MAX_BIT
//! * then:
//! ** pname:stencilResolveMode must: be equal to ename:VK_RESOLVE_MODE_MAX_BIT
//! ```

use super::ast::*;
use super::builtins;
use super::format::{expr_source, float_text, link_macro};
use crate::schema::Schema;

pub fn render_prose(module: &Module, schema: &Schema) -> String {
    let mut prose = Prose {
        schema,
        lines: Vec::new(),
    };
    prose.block(&module.body, 1);
    prose.lines.join("\n")
}

/// Whether a clause states a fact or a requirement, and its polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mood {
    Is,
    IsNot,
    Must,
    MustNot,
}

impl Mood {
    fn negate(self) -> Mood {
        match self {
            Mood::Is => Mood::IsNot,
            Mood::IsNot => Mood::Is,
            Mood::Must => Mood::MustNot,
            Mood::MustNot => Mood::Must,
        }
    }

    fn is_negative(self) -> bool {
        matches!(self, Mood::IsNot | Mood::MustNot)
    }

    fn is_normative(self) -> bool {
        matches!(self, Mood::Must | Mood::MustNot)
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Be,
    Include,
    Have,
}

fn conjugate(verb: Verb, mood: Mood) -> &'static str {
    match (verb, mood) {
        (Verb::Be, Mood::Is) => "is",
        (Verb::Be, Mood::IsNot) => "is not",
        (Verb::Be, Mood::Must) => "must: be",
        (Verb::Be, Mood::MustNot) => "must: not be",
        (Verb::Include, Mood::Is) => "includes",
        (Verb::Include, Mood::IsNot) => "does not include",
        (Verb::Include, Mood::Must) => "must: include",
        (Verb::Include, Mood::MustNot) => "must: not include",
        (Verb::Have, Mood::Is) => "has",
        (Verb::Have, Mood::IsNot) => "does not have",
        (Verb::Have, Mood::Must) => "must: have",
        (Verb::Have, Mood::MustNot) => "must: not have",
    }
}

/// `(relation, negated)` for a comparison operator.
fn relation(op: CmpOp) -> (&'static str, bool) {
    match op {
        CmpOp::Eq | CmpOp::Is => ("equal to", false),
        CmpOp::NotEq | CmpOp::IsNot => ("equal to", true),
        CmpOp::Lt => ("less than", false),
        CmpOp::LtE => ("less than or equal to", false),
        CmpOp::Gt => ("greater than", false),
        CmpOp::GtE => ("greater than or equal to", false),
        CmpOp::In => ("one of", false),
        CmpOp::NotIn => ("one of", true),
    }
}

/// The line introducing the operands of `and`/`or`.
fn quantifier(op: BoolOp, mood: Mood) -> &'static str {
    // Negating a conjunction makes it "at least one is false" and vice versa.
    let all = (op == BoolOp::And) != mood.is_negative();
    match (all, mood.is_normative(), mood.is_negative()) {
        (true, false, false) => "all of the following are true:",
        (true, false, true) => "all of the following are false:",
        (true, true, false) => "all of the following must: be true:",
        (true, true, true) => "all of the following must: be false:",
        (false, false, false) => "at least one of the following is true:",
        (false, false, true) => "at least one of the following is false:",
        (false, true, false) => "at least one of the following must: be true:",
        (false, true, true) => "at least one of the following must: be false:",
    }
}

struct Prose<'a> {
    schema: &'a Schema,
    lines: Vec<String>,
}

impl Prose<'_> {
    fn push(&mut self, depth: usize, text: impl AsRef<str>) {
        self.lines.push(format!("{} {}", "*".repeat(depth), text.as_ref()));
    }

    fn block(&mut self, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(stmt, depth);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, depth: usize) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                let target = targets.first().map(|t| self.noun(t)).unwrap_or_default();
                if let ExprKind::BoolOp { op, values } = &value.kind {
                    let quantified = quantifier(*op, Mood::Is);
                    self.push(depth, format!("let {target} be true if {quantified}"));
                    for v in values {
                        self.condition(v, Mood::Is, depth + 1);
                    }
                } else if is_condition(value) {
                    let clause = self.clause(value, Mood::Is);
                    self.push(depth, format!("let {target} be {clause}"));
                } else {
                    let noun = self.noun(value);
                    self.push(depth, format!("let {target} be {noun}"));
                }
            }
            StmtKind::If { test, body, orelse } => self.if_chain("if", test, body, orelse, depth),
            StmtKind::For { target, iter, body } => {
                let target = self.noun(target);
                let iter = self.noun(iter);
                self.push(depth, format!("for each element {target} of {iter}:"));
                self.block(body, depth + 1);
            }
            StmtKind::Expr(e) => match e.call_args("require") {
                Some([arg]) => self.condition(arg, Mood::Must, depth),
                _ => self.condition(e, Mood::Is, depth),
            },
            StmtKind::Pass | StmtKind::Comment(_) => {}
        }
    }

    fn if_chain(&mut self, lead: &str, test: &Expr, body: &[Stmt], orelse: &[Stmt], depth: usize) {
        let (test, mood) = match &test.kind {
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => (operand.as_ref(), Mood::IsNot),
            _ => (test, Mood::Is),
        };

        match &test.kind {
            ExprKind::BoolOp { op, values } => {
                self.push(depth, format!("{lead} {}", quantifier(*op, mood)));
                for v in values {
                    self.condition(v, Mood::Is, depth + 1);
                }
            }
            _ => {
                let polarity = if mood.is_negative() { "false" } else { "true" };
                self.push(depth, format!("{lead} the following is {polarity}:"));
                self.condition(test, Mood::Is, depth + 1);
            }
        }
        self.push(depth, "then:");
        self.block(body, depth + 1);

        match orelse {
            [] => {}
            [Stmt {
                kind:
                    StmtKind::If {
                        test,
                        body,
                        orelse,
                    },
                ..
            }] => self.if_chain("otherwise, if", test, body, orelse, depth),
            _ => {
                self.push(depth, "otherwise:");
                self.block(orelse, depth + 1);
            }
        }
    }

    /// A condition as one bullet, or a quantifier bullet with one nested
    /// bullet per operand.
    fn condition(&mut self, expr: &Expr, mood: Mood, depth: usize) {
        match &expr.kind {
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => self.condition(operand, mood.negate(), depth),
            ExprKind::BoolOp { op, values } => {
                self.push(depth, quantifier(*op, mood));
                for v in values {
                    self.condition(v, Mood::Is, depth + 1);
                }
            }
            _ => {
                let clause = self.clause(expr, mood);
                self.push(depth, clause);
            }
        }
    }

    fn clause(&self, expr: &Expr, mood: Mood) -> String {
        match &expr.kind {
            ExprKind::Compare { left, ops } => {
                let Some((op, right)) = ops.first() else {
                    return self.noun(left);
                };
                let (relation, negated) = relation(*op);
                let mood = if negated { mood.negate() } else { mood };
                format!(
                    "{} {} {relation} {}",
                    self.noun(left),
                    conjugate(Verb::Be, mood),
                    self.noun(right)
                )
            }
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => self.clause(operand, mood.negate()),
            ExprKind::Call { func, args } => self.predicate(func, args, mood).unwrap_or_else(|| {
                format!("{} {} true", self.noun(expr), conjugate(Verb::Be, mood))
            }),
            ExprKind::BoolOp { op, .. } => {
                // Only reached through nouns; conditions expand these into bullets.
                format!("{} ({})", quantifier(*op, mood).trim_end_matches(':'), expr_source(expr))
            }
            _ => format!("{} {} true", self.noun(expr), conjugate(Verb::Be, mood)),
        }
    }

    /// The phrase for a builtin predicate call, if `func` is one.
    fn predicate(&self, func: &Expr, args: &[Expr], mood: Mood) -> Option<String> {
        let arg = args.first().map(|a| self.noun(a)).unwrap_or_default();
        let be = conjugate(Verb::Be, mood);
        match &func.kind {
            ExprKind::Name(name) => match name.as_str() {
                "has_pnext" => Some(format!(
                    "the pname:pNext chain {} a {arg} structure",
                    conjugate(Verb::Include, mood)
                )),
                "is_ext_enabled" => Some(format!("the {arg} extension {be} enabled")),
                "is_feature_enabled" => {
                    let feature = args.first().and_then(Expr::as_name).unwrap_or_default();
                    Some(format!("the <<features-{feature},{feature}>> feature {be} enabled"))
                }
                "is_version" => {
                    let parts: Vec<String> = args.iter().map(|a| self.noun(a)).collect();
                    Some(format!("the API version {be} at least {}", parts.join(".")))
                }
                "externally_synchronized" => Some(format!("{arg} {be} externally synchronized")),
                _ => None,
            },
            ExprKind::Attribute { value, attr } => {
                let subject = self.noun(value);
                match attr.as_str() {
                    "has_pnext" => Some(format!(
                        "the pname:pNext chain of {subject} {} a {arg} structure",
                        conjugate(Verb::Include, mood)
                    )),
                    "has_bit" => Some(format!("{subject} {} {arg}", conjugate(Verb::Include, mood))),
                    "any" => Some(format!(
                        "{subject} {} at least one bit set",
                        conjugate(Verb::Have, mood)
                    )),
                    "none" => Some(format!("{subject} {be} 0")),
                    "valid" => Some(format!("{subject} {be} a valid handle")),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn noun(&self, expr: &Expr) -> String {
        if is_member_chain(expr) {
            if let Some(name) = expr.as_name() {
                return self.name(name);
            }
            return format!("pname:{}", expr_source(expr));
        }

        match &expr.kind {
            ExprKind::Name(name) => self.name(name),
            ExprKind::Bool(v) => String::from(if *v { "true" } else { "false" }),
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(v) => float_text(*v),
            ExprKind::Attribute { value, attr } => format!("pname:{attr} of {}", self.noun(value)),
            ExprKind::Subscript { value, index } => {
                format!("element {} of {}", self.noun(index), self.noun(value))
            }
            ExprKind::Call { func, args } => self.call_noun(func, args, expr),
            ExprKind::BinOp { op, left, right } => {
                format!("{} {} {}", self.operand(left), op.as_str(), self.operand(right))
            }
            ExprKind::UnaryOp { op, operand } => match op {
                UnaryOp::Not => format!("not {}", self.operand(operand)),
                _ => format!("{}{}", op.as_str(), self.operand(operand)),
            },
            ExprKind::IfExp { test, body, orelse } => format!(
                "{} if {}, otherwise {}",
                self.noun(body),
                self.clause(test, Mood::Is),
                self.noun(orelse)
            ),
            ExprKind::Compare { .. } | ExprKind::BoolOp { .. } => {
                format!("whether {}", self.clause(expr, Mood::Is))
            }
        }
    }

    fn operand(&self, expr: &Expr) -> String {
        match expr.kind {
            ExprKind::BinOp { .. } => format!("({})", self.noun(expr)),
            _ => self.noun(expr),
        }
    }

    fn call_noun(&self, func: &Expr, args: &[Expr], call: &Expr) -> String {
        let arg = args.first().map(|a| self.noun(a)).unwrap_or_default();
        match &func.kind {
            ExprKind::Name(name) => match name.as_str() {
                "pnext" => format!("the {arg} structure in the pname:pNext chain"),
                "loop_index" | "array_index" => format!("the index of {arg}"),
                _ => format!("pname:{}", expr_source(call)),
            },
            ExprKind::Attribute { value, attr } => {
                let subject = self.noun(value);
                match attr.as_str() {
                    "pnext" => format!("the {arg} structure in the pname:pNext chain of {subject}"),
                    "create_info" | "graphics_create_info" | "compute_create_info"
                    | "raytracing_create_info" => {
                        format!("the creation parameters of {subject}")
                    }
                    _ => format!("pname:{}", expr_source(call)),
                }
            }
            _ => format!("pname:{}", expr_source(call)),
        }
    }

    fn name(&self, name: &str) -> String {
        match link_macro(self.schema, name) {
            Some(link) => format!("{link}:{name}"),
            None => format!("pname:{name}"),
        }
    }
}

/// `a`, `a.b.c`: variables and member accesses read as a single `pname:`.
fn is_member_chain(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Name(_) => true,
        ExprKind::Attribute { value, attr } => {
            builtins::lookup_attr(attr).is_none() && is_member_chain(value)
        }
        _ => false,
    }
}

/// Whether an assigned value reads as a statement of fact rather than a
/// noun.
fn is_condition(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Compare { .. }
        | ExprKind::UnaryOp {
            op: UnaryOp::Not, ..
        } => true,
        ExprKind::Call { func, .. } => match &func.kind {
            ExprKind::Name(name) => matches!(
                name.as_str(),
                "has_pnext" | "is_ext_enabled" | "is_feature_enabled" | "is_version" | "externally_synchronized"
            ),
            ExprKind::Attribute { attr, .. } => {
                matches!(attr.as_str(), "has_pnext" | "has_bit" | "any" | "none" | "valid")
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;
    use crate::schema::tests::fixture;

    fn prose(src: &str) -> String {
        render_prose(&parse(lex(src).unwrap()).unwrap(), &fixture())
    }

    #[test]
    fn conditional_requirement() {
        assert_eq!(
            prose("if depthResolveMode == VK_RESOLVE_MODE_MAX_BIT:\n  require(stencilResolveMode == VK_RESOLVE_MODE_MAX_BIT)"),
            [
                "* if the following is true:",
                "** pname:depthResolveMode is equal to ename:VK_RESOLVE_MODE_MAX_BIT",
                "* then:",
                "** pname:stencilResolveMode must: be equal to ename:VK_RESOLVE_MODE_MAX_BIT",
            ]
            .join("\n")
        );
    }

    #[test]
    fn negated_condition_and_assignment() {
        let src = "has_feature = is_feature_enabled(representativeFragmentTest)\nif not has_feature:\n  require(representativeFragmentTestEnable == VK_FALSE)";
        assert_eq!(
            prose(src),
            [
                "* let pname:has_feature be the <<features-representativeFragmentTest,representativeFragmentTest>> feature is enabled",
                "* if the following is false:",
                "** pname:has_feature is true",
                "* then:",
                "** pname:representativeFragmentTestEnable must: be equal to ename:VK_FALSE",
            ]
            .join("\n")
        );
    }

    #[test]
    fn bool_ops_nest_one_level_deeper() {
        let src = "if viewMask != 0 and flags.any():\n  require(subpassCount > 1 or not is_ext_enabled(VK_KHR_create_renderpass2))";
        assert_eq!(
            prose(src),
            [
                "* if all of the following are true:",
                "** pname:viewMask is not equal to 0",
                "** pname:flags has at least one bit set",
                "* then:",
                "** at least one of the following must: be true:",
                "*** pname:subpassCount is greater than 1",
                "*** the apiext:VK_KHR_create_renderpass2 extension is not enabled",
            ]
            .join("\n")
        );
    }

    #[test]
    fn negated_requirements() {
        assert_eq!(
            prose("require(not (a and b))"),
            "* at least one of the following must: be false:\n** pname:a is true\n** pname:b is true"
        );
        assert_eq!(
            prose("require(not usage.has_bit(VK_IMAGE_USAGE_STORAGE_BIT))"),
            "* pname:usage must: not include ename:VK_IMAGE_USAGE_STORAGE_BIT"
        );
    }

    #[test]
    fn else_and_elif() {
        let src = "if a:\n  require(b)\nelif c:\n  require(d)\nelse:\n  # note\n  require(e)";
        assert_eq!(
            prose(src),
            [
                "* if the following is true:",
                "** pname:a is true",
                "* then:",
                "** pname:b must: be true",
                "* otherwise, if the following is true:",
                "** pname:c is true",
                "* then:",
                "** pname:d must: be true",
                "* otherwise:",
                "** pname:e must: be true",
            ]
            .join("\n")
        );
    }

    #[test]
    fn loops_and_nouns() {
        let src = "for subpass in pSubpasses:\n  require(subpass.pColorAttachments[loop_index(subpass)].attachment < attachmentCount)";
        assert_eq!(
            prose(src),
            [
                "* for each element pname:subpass of pname:pSubpasses:",
                "** pname:attachment of element the index of pname:subpass of pname:subpass.pColorAttachments must: be less than pname:attachmentCount",
            ]
            .join("\n")
        );
    }

    #[test]
    fn builtin_predicates() {
        assert_eq!(
            prose("require(pNext.has_pnext(VkSubpassDescriptionDepthStencilResolve))"),
            "* the pname:pNext chain of pname:pNext must: include a slink:VkSubpassDescriptionDepthStencilResolve structure"
        );
        assert_eq!(
            prose("require(is_version(1, 2))"),
            "* the API version must: be at least 1.2"
        );
        assert_eq!(prose("require(renderPass.valid())"), "* pname:renderPass must: be a valid handle");
        assert_eq!(prose("require(flags.none())"), "* pname:flags must: be 0");
    }
}
