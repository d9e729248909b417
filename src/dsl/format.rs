//! Source and markup renderers.
//!
//! Both share one walker; the markup style only adds styling and links
//! around the same visible text, so line wrapping is identical in the two.

use super::ast::*;
use super::builtins;
use crate::schema::{Category, Schema};

/// First line of a VU in documentation source, so that VUs can be grepped.
pub const GREP_TAG: &str = "codified-vu";

/// Spaces added per block level.
const SCOPE_INDENT: usize = 2;
/// Extra indentation for lines continued inside a parenthesis. Four keeps
/// the operands of `if (a and\n    b):` aligned.
const PAREN_INDENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Source,
    Markup,
}

/// Render a VU as canonical source text.
///
/// With `max_width == 0` every boolean operation is broken one operand per
/// line; otherwise one that fits on the current line stays flat.
pub fn render_source(module: &Module, max_width: usize) -> String {
    let mut r = Renderer::new(Style::Source, None, max_width);
    r.body(&module.body);
    r.out
}

/// [`render_source`] preceded by the grep tag line.
pub fn render_vu_source(module: &Module, max_width: usize) -> String {
    format!("{GREP_TAG}\n{}", render_source(module, max_width))
}

/// Render a VU as AsciiDoc for the rendered documentation, with syntax
/// highlighting and links to the API entities it references.
pub fn render_markup(module: &Module, schema: &Schema, max_width: usize) -> String {
    let mut r = Renderer::new(Style::Markup, Some(schema), max_width);
    r.begin_style("vu", "#");
    r.body(&module.body);
    r.end_style("#");
    r.out
}

/// A single expression as flat source text.
pub fn expr_source(expr: &Expr) -> String {
    let mut r = Renderer::new(Style::Source, None, 0);
    r.flat = true;
    r.expr(expr);
    r.out
}

/// The AsciiDoc link macro for an API entity (`slink`, `ename`, ...).
pub fn link_macro(schema: &Schema, name: &str) -> Option<&'static str> {
    Some(match schema.category(name)? {
        Category::Struct | Category::Handle => "slink",
        Category::EnumValue | Category::Constant => "ename",
        Category::Enum => "elink",
        Category::Flags | Category::BaseType => "tlink",
        Category::Command => "flink",
        Category::Define => "dlink",
        Category::Extension => "apiext",
        Category::Version => return None,
    })
}

/// Python-style float text: `1.0`, not `1`.
pub(crate) fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

struct Renderer<'a> {
    style: Style,
    schema: Option<&'a Schema>,
    max_width: usize,
    out: String,
    indent: usize,
    /// Visible column on the current line; markup is not counted.
    column: usize,
    /// Set while rendering a boolean operation that fits on one line.
    flat: bool,
}

impl<'a> Renderer<'a> {
    fn new(style: Style, schema: Option<&'a Schema>, max_width: usize) -> Self {
        Self {
            style,
            schema,
            max_width,
            out: String::new(),
            indent: 0,
            column: 0,
            flat: false,
        }
    }

    // ── Output primitives ──

    fn add(&mut self, text: &str) {
        self.out.push_str(text);
        self.column += text.chars().count();
    }

    /// Text that only exists in markup and takes no visible width.
    fn markup(&mut self, text: &str) {
        if self.style == Style::Markup {
            self.out.push_str(text);
        }
    }

    /// Visible text with a different spelling in markup.
    fn add_escaped(&mut self, source: &str, markup: &str) {
        match self.style {
            Style::Source => self.out.push_str(source),
            Style::Markup => self.out.push_str(markup),
        }
        self.column += source.chars().count();
    }

    fn begin_style(&mut self, style: &str, delimiter: &str) {
        self.markup(&format!("[{style}]{delimiter}"));
    }

    fn end_style(&mut self, delimiter: &str) {
        self.markup(delimiter);
    }

    fn begin_line(&mut self) {
        let space = match self.style {
            Style::Source => " ",
            Style::Markup => "&nbsp;",
        };
        self.out.push_str(&space.repeat(self.indent));
        self.column = self.indent;
    }

    fn end_line(&mut self) {
        self.markup(" +");
        self.out.push('\n');
        self.column = 0;
    }

    fn begin_scope(&mut self) {
        self.add(":");
        self.end_line();
        self.indent += SCOPE_INDENT;
    }

    fn end_scope(&mut self) {
        self.indent -= SCOPE_INDENT;
    }

    fn begin_paren(&mut self) {
        self.add_escaped("(", "&lpar;");
        self.indent += PAREN_INDENT;
    }

    fn end_paren(&mut self) {
        self.add_escaped(")", "&rpar;");
        self.indent -= PAREN_INDENT;
    }

    fn operator(&mut self, op: &str, pre: &str, post: &str) {
        self.add(pre);
        self.begin_style("vu-operator", "##");
        self.add(op);
        self.end_style("##");
        self.add(post);
    }

    fn keyword(&mut self, keyword: &str, pre: &str, post: &str) {
        self.add(pre);
        self.begin_style("vu-keyword", "##");
        self.add(keyword);
        self.end_style("##");
        self.add(post);
    }

    fn number(&mut self, text: &str) {
        self.begin_style("vu-number", "##");
        self.add(text);
        self.end_style("##");
    }

    fn builtin(&mut self, name: &str) {
        self.begin_style("vu-predicate", "##");
        self.markup(&format!("<<vu-predicate-{name},"));
        self.add(name);
        self.markup(">>");
        self.end_style("##");
    }

    fn feature(&mut self, name: &str) {
        self.markup(&format!("<<features-{name},"));
        self.add(name);
        self.markup(">>");
    }

    fn api_token(&mut self, name: &str) {
        if let Some(link) = self.schema.and_then(|s| link_macro(s, name)) {
            self.markup(&format!("{link}:"));
        }
        self.add(name);
    }

    // ── Statements ──

    fn body(&mut self, stmts: &[Stmt]) {
        for (i, stmt) in stmts.iter().enumerate() {
            if i > 0 {
                self.end_line();
            }
            self.begin_line();
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.expr(target);
                    self.operator("=", " ", " ");
                }
                self.expr(value);
            }
            StmtKind::If { test, body, orelse } => {
                self.keyword("if", "", " ");
                self.if_rest(test, body, orelse);
            }
            StmtKind::For { target, iter, body } => {
                self.keyword("for", "", " ");
                self.expr(target);
                self.operator("in", " ", " ");
                self.expr(iter);
                self.scope(body);
            }
            StmtKind::Expr(e) => self.expr(e),
            StmtKind::Pass => self.keyword("pass", "", ""),
            StmtKind::Comment(text) => {
                let text = text.trim();
                self.begin_style("vu-comment", "##");
                self.add_escaped("#", "&#x23;");
                if !text.is_empty() {
                    self.add(" ");
                    self.add(text);
                }
                self.end_style("##");
            }
        }
    }

    /// Everything after `if `/`elif `, including any `elif`/`else` chain.
    fn if_rest(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        self.expr(test);
        self.scope(body);

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
            }] => {
                self.end_line();
                self.begin_line();
                self.keyword("elif", "", " ");
                self.if_rest(test, body, orelse);
            }
            _ => {
                self.end_line();
                self.begin_line();
                self.keyword("else", "", "");
                self.scope(orelse);
            }
        }
    }

    fn scope(&mut self, body: &[Stmt]) {
        self.begin_scope();
        self.body(body);
        self.end_scope();
    }

    // ── Expressions ──

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(id) => {
                if builtins::lookup_func(id).is_some() {
                    self.builtin(id);
                } else {
                    self.api_token(id);
                }
            }
            ExprKind::Bool(v) => self.number(if *v { "True" } else { "False" }),
            ExprKind::Int(v) => self.number(&v.to_string()),
            ExprKind::Float(v) => self.number(&float_text(*v)),
            ExprKind::BoolOp { op, values } => self.bool_op(*op, values),
            ExprKind::UnaryOp { op, operand } => {
                let post = if *op == UnaryOp::Not { " " } else { "" };
                self.operator(op.as_str(), "", post);
                self.parenthesized(operand);
            }
            ExprKind::BinOp { op, left, right } => {
                self.binary(left, Operator::Bin(*op), right);
            }
            ExprKind::Compare { left, ops } => {
                for (i, (op, right)) in ops.iter().enumerate() {
                    if i == 0 {
                        self.binary(left, Operator::Cmp(*op), right);
                    } else {
                        // chained; only reachable for VUs that fail validation
                        self.operator(op.as_str(), " ", " ");
                        self.parenthesized(right);
                    }
                }
            }
            ExprKind::Call { func, args } => self.call(func, args),
            ExprKind::Attribute { value, attr } => {
                self.expr(value);
                self.add(".");
                if builtins::lookup_attr(attr).is_some() {
                    self.builtin(attr);
                } else {
                    self.add(attr);
                }
            }
            ExprKind::Subscript { value, index } => {
                self.expr(value);
                self.add("[");
                self.expr(index);
                self.add("]");
            }
            ExprKind::IfExp { test, body, orelse } => {
                // Only the `else` branch can hold a bare ternary.
                self.maybe_parenthesized(body, matches!(body.kind, ExprKind::IfExp { .. }));
                self.keyword("if", " ", " ");
                self.maybe_parenthesized(test, matches!(test.kind, ExprKind::IfExp { .. }));
                self.keyword("else", " ", " ");
                self.expr(orelse);
            }
        }
    }

    /// `(a op\n    b op\n    c)`; boolean operations are always
    /// parenthesized.
    fn bool_op(&mut self, op: BoolOp, values: &[Expr]) {
        let was_flat = self.flat;
        if !self.flat && self.max_width > 0 {
            let flat = Expr::new(
                ExprKind::BoolOp {
                    op,
                    values: values.to_vec(),
                },
                Span::default(),
            );
            self.flat = self.column + expr_source(&flat).chars().count() <= self.max_width;
        }

        self.begin_paren();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                if self.flat {
                    self.operator(op.as_str(), " ", " ");
                } else {
                    self.operator(op.as_str(), " ", "");
                    self.end_line();
                    self.begin_line();
                }
            }
            // Only a ternary binds looser than `and`/`or`.
            let needs_parens = matches!(value.kind, ExprKind::IfExp { .. });
            self.maybe_parenthesized(value, needs_parens);
        }
        self.end_paren();

        self.flat = was_flat;
    }

    fn call(&mut self, func: &Expr, args: &[Expr]) {
        self.expr(func);

        // A lone boolean argument brings its own parentheses.
        let shares_parens = matches!(args, [Expr { kind: ExprKind::BoolOp { .. }, .. }]);
        if !shares_parens {
            self.begin_paren();
        }

        let feature_args = func.as_name() == Some("is_feature_enabled") && self.style == Style::Markup;
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.add(", ");
            }
            match arg.as_name() {
                Some(feature) if feature_args => self.feature(feature),
                _ => self.expr(arg),
            }
        }

        if !shares_parens {
            self.end_paren();
        }
    }

    fn maybe_parenthesized(&mut self, expr: &Expr, needs_parens: bool) {
        if needs_parens {
            self.begin_paren();
        }
        self.expr(expr);
        if needs_parens {
            self.end_paren();
        }
    }

    /// Parenthesize `expr` as an operand unless that is obviously
    /// unnecessary.
    fn parenthesized(&mut self, expr: &Expr) {
        let needs_parens = match &expr.kind {
            ExprKind::Call { .. }
            | ExprKind::Attribute { .. }
            | ExprKind::Subscript { .. }
            | ExprKind::Name(_)
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::BoolOp { .. } => false,
            ExprKind::UnaryOp { op, .. } => *op == UnaryOp::Not,
            _ => true,
        };
        self.maybe_parenthesized(expr, needs_parens);
    }

    /// `left op right`, leaving out parentheses only where the operators
    /// VUs actually combine make it safe.
    fn binary(&mut self, left: &Expr, op: Operator, right: &Expr) {
        let left_op = bin_op(left);
        let right_op = bin_op(right);

        let mut paren_left = true;
        let mut paren_right = true;
        match op {
            Operator::Bin(op) => {
                if op.is_additive() && left_op.is_some_and(BinOp::is_additive) {
                    paren_left = false;
                }
                let arithmetic = op.is_additive() || op.is_multiplicative();
                if arithmetic && left_op.is_some_and(BinOp::is_multiplicative) {
                    paren_left = false;
                }
                if op.is_additive() && right_op.is_some_and(BinOp::is_multiplicative) {
                    paren_right = false;
                }
            }
            Operator::Cmp(op) => {
                let ordering = matches!(
                    op,
                    CmpOp::Eq | CmpOp::NotEq | CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE
                );
                if ordering && left_op.is_some() {
                    paren_left = false;
                }
                if ordering && right_op.is_some() {
                    paren_right = false;
                }
            }
        }

        // `-a ** 2` is `-(a ** 2)`
        let unary_base = matches!(op, Operator::Bin(BinOp::Pow))
            && matches!(left.kind, ExprKind::UnaryOp { .. });
        if unary_base {
            self.maybe_parenthesized(left, true);
        } else if paren_left {
            self.parenthesized(left);
        } else {
            self.expr(left);
        }
        self.operator(op.as_str(), " ", " ");
        if paren_right {
            self.parenthesized(right);
        } else {
            self.expr(right);
        }
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Bin(BinOp),
    Cmp(CmpOp),
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Bin(op) => op.as_str(),
            Operator::Cmp(op) => op.as_str(),
        }
    }
}

fn bin_op(expr: &Expr) -> Option<BinOp> {
    match expr.kind {
        ExprKind::BinOp { op, .. } => Some(op),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;
    use crate::schema::tests::fixture;

    fn source(src: &str) -> String {
        render_source(&parse(lex(src).unwrap()).unwrap(), 0)
    }

    fn markup(src: &str) -> String {
        render_markup(&parse(lex(src).unwrap()).unwrap(), &fixture(), 0)
    }

    fn lines(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn unary_ops() {
        assert_eq!(source("-1"), "-1");
        assert_eq!(source("- 1"), "-1");
        assert_eq!(source("+1.0"), "+1.0");
        assert_eq!(source("~b"), "~b");
        assert_eq!(source("not  a"), "not a");
        assert_eq!(source("-(a+1)"), "-(a + 1)");
        assert_eq!(source("~(a|b)"), "~(a | b)");
        assert_eq!(source("not (a and b)"), lines(&["not (a and", "    b)"]));
    }

    #[test]
    fn nested_ternaries_and_unary_bases_keep_parentheses() {
        assert_eq!(source("x = (-a) ** 2"), "x = (-a) ** 2");
        assert_eq!(source("x = -a ** 2"), "x = -(a ** 2)");
        assert_eq!(source("x = (~a) ** 2"), "x = (~a) ** 2");
        assert_eq!(source("x = (a if b else c) if d else e"), "x = (a if b else c) if d else e");
        assert_eq!(source("x = a if (b if c else d) else e"), "x = a if (b if c else d) else e");
        assert_eq!(source("x = a if b else c if d else e"), "x = a if b else c if d else e");
    }

    #[test]
    fn formatting_is_a_fixed_point() {
        let corpus = [
            "x = (-a) ** 2",
            "x = -a ** 2",
            "x = a ** b ** c",
            "x = (a ** b) ** c",
            "x = -(-a)",
            "x = (a if b else c) if d else e",
            "x = a if (b if c else d) else e",
            "x = a if b else (c if d else e)",
            "x = (a if b else c) + 1",
            "require(a < b < c)",
            "require((a == b) == c)",
            "require(not (a == b))",
            "require(not (not a))",
            "require(not (x and y))",
            "require(a and (b or c) and not d)",
            "if a and (b or not c):\n  require(d.any())\nelif e:\n  require(f == 1 + 2 * 3)\nelse:\n  pass",
            "for x in pInfos:\n  require(x.count <= (a - b) * c)",
        ];
        for src in corpus {
            let once = source(src);
            assert_eq!(source(&once), once, "{src}");
        }
    }

    #[test]
    fn bool_ops_wrap_one_operand_per_line() {
        assert_eq!(source("a and b"), lines(&["(a and", "    b)"]));
        assert_eq!(source("a or b or c"), lines(&["(a or", "    b or", "    c)"]));
        assert_eq!(source("not a and b"), lines(&["(not a and", "    b)"]));
        assert_eq!(source("a == b and c != d"), lines(&["(a == b and", "    c != d)"]));
        assert_eq!(
            source("a <= b or c > d or (x and y)"),
            lines(&["(a <= b or", "    c > d or", "    (x and", "        y))"])
        );
        assert_eq!(source("(a if b else c) or d"), lines(&["((a if b else c) or", "    d)"]));
    }

    #[test]
    fn compare_ops() {
        assert_eq!(source("a != b + 1"), "a != b + 1");
        assert_eq!(source("a % 4 == b"), "a % 4 == b");
        assert_eq!(source("a-2 <= b*4"), "a - 2 <= b * 4");
        assert_eq!(source("(a != b) == (not c)"), "(a != b) == (not c)");
        assert_eq!(source("a == (b == c)"), "a == (b == c)");
        assert_eq!(source("(a == b) != (c == d)"), "(a == b) != (c == d)");
    }

    #[test]
    fn binary_ops() {
        assert_eq!(source("a + b + c + d"), "a + b + c + d");
        assert_eq!(source("a + b - c + d"), "a + b - c + d");
        assert_eq!(source("a - b - c"), "a - b - c");
        assert_eq!(source("a + b * c"), "a + b * c");
        assert_eq!(source("a - b / c % d + e"), "a - b / c % d + e");
        assert_eq!(source("a * b * c / d / e % f"), "a * b * c / d / e % f");
        assert_eq!(source("a - (b - c)"), "a - (b - c)");
        assert_eq!(source("a % 2**b == -1"), "a % (2 ** b) == -1");
        assert_eq!(source("a << 2 | b"), "(a << 2) | b");
    }

    #[test]
    fn assignments_calls_and_accessors() {
        assert_eq!(source("a=b+1"), "a = b + 1");
        assert_eq!(source("a = b == 2"), "a = b == 2");
        assert_eq!(source("f(x, -y, z + 1)"), "f(x, -y, z + 1)");
        assert_eq!(source("~f(x, y if a else z)"), "~f(x, y if a else z)");
        assert_eq!(source("a.f().b[array_index(i)]"), "a.f().b[array_index(i)]");
        assert_eq!(source("a[2].f(b[3], c)"), "a[2].f(b[3], c)");
        assert_eq!(source("flags.has_bit(VK_IMAGE_USAGE_STORAGE_BIT)"), "flags.has_bit(VK_IMAGE_USAGE_STORAGE_BIT)");
    }

    #[test]
    fn require_shares_parentheses_with_bool_op() {
        assert_eq!(source("require(a == b)"), "require(a == b)");
        assert_eq!(source("require(a <= b and c > d)"), lines(&["require(a <= b and", "    c > d)"]));
        assert_eq!(
            source("require(a <= b or c > d or (x and y))"),
            lines(&["require(a <= b or", "    c > d or", "    (x and", "        y))"])
        );
    }

    #[test]
    fn blocks_reindent() {
        assert_eq!(
            source("if a == b and c == d and e == f:\n    require(x)"),
            lines(&["if (a == b and", "    c == d and", "    e == f):", "  require(x)"])
        );
        let nested = lines(&[
            "if a != NULL:",
            "  if a.f(b) > 1:",
            "    require(a.f(b) % 4 == 0)",
            "  elif a.g(b) > 2:",
            "    require(a.g(b) % 4 == 0)",
            "    require(a.c > 0)",
            "  else:",
            "    require(a.g(b) == 0)",
        ]);
        assert_eq!(source(&nested), nested);
        assert_eq!(
            source("for info in pInfos:\n require(other[array_index(info)].layout == info.layout)"),
            "for info in pInfos:\n  require(other[array_index(info)].layout == info.layout)"
        );
    }

    #[test]
    fn comments_are_trimmed() {
        assert_eq!(
            source("for a in b:\n    #     A comment line   \n    c"),
            lines(&["for a in b:", "  # A comment line", "  c"])
        );
        assert_eq!(
            source("#   Comment on first line\nif a:\n    b"),
            lines(&["# Comment on first line", "if a:", "  b"])
        );
    }

    #[test]
    fn max_width_keeps_short_conditions_flat() {
        let module = parse(lex("if a == b and c:\n  require(x and y)").unwrap()).unwrap();
        assert_eq!(render_source(&module, 80), "if (a == b and c):\n  require(x and y)");
        assert_eq!(
            render_source(&module, 12),
            lines(&["if (a == b and", "    c):", "  require(x and", "      y)"])
        );
    }

    #[test]
    fn whole_vu_source_has_grep_tag() {
        let module = parse(lex("require(a)").unwrap()).unwrap();
        assert_eq!(render_vu_source(&module, 0), "codified-vu\nrequire(a)");
    }

    #[test]
    fn markup_links_entities_and_builtins() {
        let out = markup(lines(&[
            "if pNext.has_pnext(VkSubpassDescriptionDepthStencilResolve):",
            " for attachment in pAttachments:",
            "  if renderPass != VK_NULL_HANDLE:",
            "   require(renderPass.valid())",
        ])
        .as_str());
        assert_eq!(
            out,
            lines(&[
                "[vu]#[vu-keyword]##if## pNext.[vu-predicate]##<<vu-predicate-has_pnext,has_pnext>>##&lpar;slink:VkSubpassDescriptionDepthStencilResolve&rpar;: +",
                "&nbsp;&nbsp;[vu-keyword]##for## attachment [vu-operator]##in## pAttachments: +",
                "&nbsp;&nbsp;&nbsp;&nbsp;[vu-keyword]##if## renderPass [vu-operator]##!=## dlink:VK_NULL_HANDLE: +",
                "&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;[vu-predicate]##<<vu-predicate-require,require>>##&lpar;renderPass.[vu-predicate]##<<vu-predicate-valid,valid>>##&lpar;&rpar;&rpar;#",
            ])
        );
    }

    #[test]
    fn markup_comments_and_numbers() {
        let out = markup("# First\nrequire(viewMask == 1)\n# Last");
        assert_eq!(
            out,
            lines(&[
                "[vu]#[vu-comment]##&#x23; First## +",
                "[vu-predicate]##<<vu-predicate-require,require>>##&lpar;viewMask [vu-operator]##==## [vu-number]##1##&rpar; +",
                "[vu-comment]##&#x23; Last###",
            ])
        );
    }

    #[test]
    fn markup_feature_links() {
        let out = markup("if is_feature_enabled(imageCubeArray) or is_feature_enabled(drawIndirectCount):\n  require(is_ext_enabled(VK_KHR_draw_indirect_count))");
        assert_eq!(
            out,
            lines(&[
                "[vu]#[vu-keyword]##if## &lpar;[vu-predicate]##<<vu-predicate-is_feature_enabled,is_feature_enabled>>##&lpar;<<features-imageCubeArray,imageCubeArray>>&rpar; [vu-operator]##or## +",
                "&nbsp;&nbsp;&nbsp;&nbsp;[vu-predicate]##<<vu-predicate-is_feature_enabled,is_feature_enabled>>##&lpar;<<features-drawIndirectCount,drawIndirectCount>>&rpar;&rpar;: +",
                "&nbsp;&nbsp;[vu-predicate]##<<vu-predicate-require,require>>##&lpar;[vu-predicate]##<<vu-predicate-is_ext_enabled,is_ext_enabled>>##&lpar;apiext:VK_KHR_draw_indirect_count&rpar;&rpar;#",
            ])
        );
    }

    #[test]
    fn link_macros_by_category() {
        let schema = fixture();
        assert_eq!(link_macro(&schema, "VkImageCreateInfo"), Some("slink"));
        assert_eq!(link_macro(&schema, "VK_IMAGE_TYPE_2D"), Some("ename"));
        assert_eq!(link_macro(&schema, "VkImageType"), Some("elink"));
        assert_eq!(link_macro(&schema, "VkImageUsageFlags"), Some("tlink"));
        assert_eq!(link_macro(&schema, "vkCmdDraw"), Some("flink"));
        assert_eq!(link_macro(&schema, "pAttachments"), None);
    }

    #[test]
    fn expressions_render_flat() {
        let e = crate::dsl::parser::parse_expression(lex("a and (b or c)").unwrap()).unwrap();
        assert_eq!(expr_source(&e), "(a and (b or c))");
    }
}
