//! Helpers for VU paragraphs in documentation source: recognising codified
//! VUs, finding the parameter a VUID is tagged with, and reformatting.

use std::collections::HashSet;

use super::ast::*;
use super::error::CompileError;
use super::format::render_vu_source;

/// Whether a paragraph (possibly bulleted) is a codified VU rather than one
/// written in prose. Prose VUs are capitalized, so the first line decides.
pub fn is_codified<S: AsRef<str>>(lines: &[S]) -> bool {
    let Some(first) = lines.first() else {
        return false;
    };
    let first = first.as_ref().trim_start();
    let first = first.strip_prefix('*').map_or(first, str::trim_start);

    first.starts_with("if ")
        || first.starts_with("for ")
        || first.starts_with("require(")
        || first.starts_with(super::format::GREP_TAG)
        || is_assignment(first)
}

/// `a.b.c = ...`
fn is_assignment(line: &str) -> bool {
    let Some((lhs, rhs)) = line.split_once('=') else {
        return false;
    };
    let lhs = lhs.trim_end();
    !lhs.is_empty()
        && !rhs.starts_with('=')
        && lhs.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// The member or parameter the VU is about: the first reference to a symbol
/// the VU does not define itself. Macros yield `{name}`. Must be given the
/// AST before macro expansion.
pub fn param_tag(module: &Module) -> Option<String> {
    let mut finder = TagFinder {
        variables: HashSet::new(),
        tag: None,
    };
    finder.block(&module.body);
    finder.tag
}

struct TagFinder {
    variables: HashSet<String>,
    tag: Option<String>,
}

impl TagFinder {
    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if self.tag.is_some() {
                return;
            }
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    if let Some(name) = target.as_name() {
                        self.variables.insert(name.to_string());
                    }
                }
                self.expr(value);
            }
            StmtKind::If { test, body, orelse } => {
                self.expr(test);
                self.block(body);
                self.block(orelse);
            }
            StmtKind::For { target, iter, body } => {
                if let Some(name) = target.as_name() {
                    self.variables.insert(name.to_string());
                }
                self.expr(iter);
                self.block(body);
            }
            StmtKind::Expr(e) => self.expr(e),
            StmtKind::Pass | StmtKind::Comment(_) => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if self.tag.is_some() {
            return;
        }
        match &expr.kind {
            ExprKind::Name(id) => {
                // Constants, API types and variables are never the tag.
                let is_api = id.starts_with("VK_") || id.starts_with("Vk") || id.starts_with("vk");
                if !is_api && !self.variables.contains(id) {
                    self.tag = Some(id.clone());
                }
            }
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => {}
            ExprKind::BoolOp { values, .. } => values.iter().for_each(|v| self.expr(v)),
            ExprKind::Compare { left, ops } => {
                self.expr(left);
                ops.iter().for_each(|(_, e)| self.expr(e));
            }
            ExprKind::BinOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::UnaryOp { operand, .. } => self.expr(operand),
            // Builtin arguments are API names or variables, except for the
            // conditions given to these two.
            ExprKind::Call { func, args } => match &func.kind {
                ExprKind::Name(name) => match (name.as_str(), args.first()) {
                    ("macro", Some(arg)) => {
                        if let Some(macro_name) = arg.as_name() {
                            self.tag = Some(format!("{{{macro_name}}}"));
                        }
                    }
                    ("require" | "externally_synchronized", Some(arg)) => self.expr(arg),
                    _ => {}
                },
                ExprKind::Attribute { value, .. } => self.expr(value),
                _ => {}
            },
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                self.expr(value);
                self.expr(index);
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
        }
    }
}

/// Reformat a codified VU paragraph as it appears in documentation source.
///
/// A leading VUID line (one containing `vuid_prefix`) is kept as is;
/// otherwise the bullet is put back in front of the first line. The
/// paragraph keeps its indentation.
pub fn reformat_paragraph<S: AsRef<str>>(
    lines: &[S],
    vuid_prefix: &str,
) -> Result<Vec<String>, Vec<CompileError>> {
    let mut lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
    let vuid = match lines.first() {
        Some(first) if !vuid_prefix.is_empty() && first.contains(vuid_prefix) => {
            let vuid = (*first).to_string();
            lines.remove(0);
            Some(vuid)
        }
        _ => None,
    };

    let text = super::remove_bullet(&lines.join("\n"));
    let indent = text.len() - text.trim_start_matches(' ').len();
    let parsed = super::parse_vu(&text)?;

    let pad = " ".repeat(indent);
    let mut out: Vec<String> = render_vu_source(&parsed.module, 0)
        .lines()
        .map(|line| format!("{pad}{line}"))
        .collect();

    match vuid {
        Some(vuid) => out.insert(0, vuid),
        None => {
            if let Some(first) = out.first_mut() {
                let bullet_pad = " ".repeat(indent.saturating_sub(2));
                *first = format!("{bullet_pad}* {}", first.trim_start());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;

    fn tag(src: &str) -> Option<String> {
        param_tag(&parse(lex(src).unwrap()).unwrap())
    }

    #[test]
    fn codified_paragraphs() {
        assert!(is_codified(&["  * if a == b:", "    require(c)"]));
        assert!(is_codified(&["for x in pInfos:"]));
        assert!(is_codified(&["* require(a)"]));
        assert!(is_codified(&["  * info.count = 2"]));
        assert!(is_codified(&["  * codified-vu", "    require(a)"]));
        assert!(!is_codified(&["  * If pname:flags includes ename:VK_FOO"]));
        assert!(!is_codified(&["* a == b"]));
        assert!(!is_codified::<&str>(&[]));
    }

    #[test]
    fn first_undefined_symbol_is_the_tag() {
        assert_eq!(tag("require(flags == 0)").as_deref(), Some("flags"));
        assert_eq!(
            tag("count = subpassCount\nfor subpass in pSubpasses:\n  require(subpass.viewMask < count)").as_deref(),
            Some("subpassCount")
        );
        assert_eq!(tag("if has_pnext(VkFoo):\n  require(VK_TRUE == pCreateInfo.x)").as_deref(), Some("pCreateInfo"));
        assert_eq!(
            tag("for subpass in pSubpasses:\n  require(subpass.viewMask != 0)").as_deref(),
            Some("pSubpasses")
        );
    }

    #[test]
    fn builtin_arguments_are_skipped() {
        assert_eq!(
            tag("if is_feature_enabled(multiview) and is_version(1, 1):\n  require(viewMask == 0)").as_deref(),
            Some("viewMask")
        );
        assert_eq!(tag("require(image.valid())").as_deref(), Some("image"));
        assert_eq!(tag("require(externally_synchronized(device))").as_deref(), Some("device"));
    }

    #[test]
    fn macros_tag_by_name() {
        assert_eq!(tag("require(macro(dmode) == VK_RESOLVE_MODE_NONE)").as_deref(), Some("{dmode}"));
    }

    #[test]
    fn reformat_keeps_bullet_and_indent() {
        let out = reformat_paragraph(&["  * if a==b and c:", "      require(d)"], "VUID-").unwrap();
        assert_eq!(
            out,
            ["  * codified-vu", "    if (a == b and", "        c):", "      require(d)"]
        );
    }

    #[test]
    fn reformat_keeps_vuid_line() {
        let out = reformat_paragraph(
            &["  * [[VUID-vkFoo-bar-00001]]", "    codified-vu", "    require(bar!=0)"],
            "VUID-",
        )
        .unwrap();
        assert_eq!(out, ["  * [[VUID-vkFoo-bar-00001]]", "    codified-vu", "    require(bar != 0)"]);
    }

    #[test]
    fn reformat_reports_syntax_errors() {
        let errors = reformat_paragraph(&["  * require(a ==)"], "VUID-").unwrap_err();
        assert!(errors.iter().all(CompileError::is_syntax));
    }
}
