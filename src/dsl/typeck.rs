use std::collections::HashMap;

use super::ast::*;
use super::builtins::{self, BuiltinFn, Param, Returns};
use super::error::CompileError;
use crate::schema::{Category, Member, Schema};

/// Coarse type of a VU expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Void,
    Bool,
    Num,
    Bitmask,
    Enum,
    /// An instance of a struct.
    Struct,
    Handle,
    /// The name of a struct type, as passed to `pnext()`.
    StructName,
    ExtensionName,
}

/// C type of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VuType {
    pub class: TypeClass,
    /// The API type, e.g. `VkImageType`. Empty for literals and the results
    /// of arithmetic.
    pub name: String,
    pub pointer_level: u32,
    /// Set for arrays: the `len` expression, or the fixed size.
    pub array_len: Option<String>,
}

/// Length recorded for inner dimensions of nested arrays.
const UNSPECIFIED_LEN: &str = "UNSPECIFIED";

const NUM_TYPES: &[&str] = &[
    "char", "float", "double", "int8_t", "uint8_t", "int16_t", "uint16_t", "uint32_t", "uint64_t",
    "int32_t", "int64_t", "size_t", "int", "VkBool32", "VkDeviceSize", "VkDeviceAddress",
];

const BITMASK_TYPES: &[&str] = &["VkSampleMask", "VkFlags", "VkFlags64"];

const NULL: &str = "NULL";
const NULL_HANDLE: &str = "VK_NULL_HANDLE";

impl VuType {
    pub fn new(class: TypeClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            pointer_level: 0,
            array_len: None,
        }
    }

    pub fn void() -> Self {
        Self::new(TypeClass::Void, "void")
    }

    pub fn boolean() -> Self {
        Self::new(TypeClass::Bool, "bool")
    }

    pub fn num() -> Self {
        Self::new(TypeClass::Num, "")
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_level > 0
    }

    pub fn is_array(&self) -> bool {
        self.pointer_level > 0 && self.array_len.is_some()
    }

    /// Member access dereferences pointers implicitly.
    fn dereferenced(&self) -> VuType {
        VuType::new(self.class, self.name.clone())
    }

    /// Type of `self[i]`.
    fn indexed(&self) -> VuType {
        let pointer_level = self.pointer_level.saturating_sub(1);
        VuType {
            class: self.class,
            name: self.name.clone(),
            pointer_level,
            array_len: (pointer_level > 0).then(|| UNSPECIFIED_LEN.to_string()),
        }
    }
}

/// Type of a registry name used in a VU, either as a type of a member or as
/// a token on its own.
pub fn api_type(schema: &Schema, name: &str) -> Option<VuType> {
    if NUM_TYPES.contains(&name) {
        return Some(VuType::new(TypeClass::Num, name));
    }
    if BITMASK_TYPES.contains(&name) {
        return Some(VuType::new(TypeClass::Bitmask, name));
    }
    let entity = schema.entity(name)?;
    let ty = match entity.category {
        Category::Flags => VuType::new(TypeClass::Bitmask, name),
        Category::Enum => VuType::new(TypeClass::Enum, name),
        Category::EnumValue => {
            VuType::new(TypeClass::Enum, entity.parent.as_deref().unwrap_or(name))
        }
        Category::Constant => match entity.c_type.as_deref() {
            Some(c_type) if NUM_TYPES.contains(&c_type) => VuType::new(TypeClass::Num, c_type),
            _ => VuType::new(TypeClass::Enum, name),
        },
        Category::Handle | Category::BaseType => VuType::new(TypeClass::Handle, name),
        Category::Struct => VuType::new(TypeClass::StructName, name),
        Category::Extension => VuType::new(TypeClass::ExtensionName, name),
        Category::Define if name == NULL_HANDLE => VuType::new(TypeClass::Handle, name),
        Category::Define => VuType::new(TypeClass::Void, name),
        Category::Command | Category::Version => return None,
    };
    Some(ty)
}

fn type_of_member(schema: &Schema, member: &Member) -> VuType {
    let class = match api_type(schema, &member.type_name) {
        // A member is an instance, never a type name
        Some(t) if t.class == TypeClass::StructName => TypeClass::Struct,
        Some(t) => t.class,
        None => TypeClass::Void,
    };
    VuType {
        class,
        name: member.type_name.clone(),
        pointer_level: member.pointer_level,
        array_len: member.array_len.clone(),
    }
}

/// Type of `owner.field`, where owner is a struct or command.
pub fn member_type(schema: &Schema, owner: &str, field: &str) -> Option<VuType> {
    // Every Vk*PipelineCreateInfo has flags, so pipeline.create_info().flags
    // is allowed without naming the pipeline kind.
    let owner = if owner == "VkPipelineCreateInfo" && field == "flags" {
        "VkGraphicsPipelineCreateInfo"
    } else {
        owner
    };
    schema.member(owner, field).map(|m| type_of_member(schema, m))
}

/// Check a macro-expanded VU against the registry. `api` is the struct or
/// command the VU belongs to. All diagnostics are returned, not just the
/// first.
pub fn validate(module: &Module, schema: &Schema, api: &str) -> Result<(), Vec<CompileError>> {
    let mut ctx = Validator::new(schema, api);
    ctx.check(module);
    if ctx.errors.is_empty() {
        Ok(())
    } else {
        Err(ctx.errors)
    }
}

#[derive(Debug, Clone)]
struct Variable {
    ty: VuType,
    is_loop: bool,
}

/// Operator families, each with its own operand rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpFamily {
    Equality,
    Ordering,
    Arithmetic,
    Shift,
    Bitwise,
    Unsupported,
}

impl OpFamily {
    fn of_compare(op: CmpOp) -> Self {
        match op {
            CmpOp::Eq | CmpOp::NotEq => OpFamily::Equality,
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => OpFamily::Ordering,
            CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => OpFamily::Unsupported,
        }
    }

    fn of_binary(op: BinOp) -> Self {
        match op {
            BinOp::LShift | BinOp::RShift => OpFamily::Shift,
            BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd => OpFamily::Bitwise,
            _ => OpFamily::Arithmetic,
        }
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    api: &'a str,
    /// Block scopes, innermost last. Variables are immutable and may not
    /// shadow each other.
    scopes: Vec<HashMap<String, Variable>>,
    require_seen: bool,
    errors: Vec<CompileError>,
}

impl<'a> Validator<'a> {
    fn new(schema: &'a Schema, api: &'a str) -> Self {
        Self {
            schema,
            api,
            scopes: vec![HashMap::new()],
            require_seen: false,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(CompileError::validation(message, span));
    }

    fn check(&mut self, module: &Module) {
        if self.schema.entity(self.api).is_none() {
            self.fail(format!("Invalid API name {}", self.api), Span::default());
            return;
        }
        self.check_block(&module.body);
        if !self.require_seen {
            let span = match (module.body.first(), module.body.last()) {
                (Some(first), Some(last)) => first.span.merge(last.span),
                _ => Span::default(),
            };
            self.fail("VUs must contain at least one require()", span);
        }
    }

    fn check_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_scoped_block(&mut self, stmts: &[Stmt]) {
        self.scopes.push(HashMap::new());
        self.check_block(stmts);
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: &str, ty: VuType, is_loop: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Variable { ty, is_loop });
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => self.check_assign(targets, value),
            StmtKind::If { test, body, orelse } => {
                self.check_condition(test, "if");
                self.check_scoped_block(body);
                self.check_scoped_block(orelse);
            }
            StmtKind::For { target, iter, body } => self.check_for(target, iter, body),
            StmtKind::Expr(e) => {
                self.check_expr(e);
            }
            StmtKind::Pass | StmtKind::Comment(_) => {}
        }
    }

    fn check_assign(&mut self, targets: &[Expr], value: &Expr) {
        if let Some(second) = targets.get(1) {
            self.fail("Cascaded assignments are not allowed", second.span);
        }
        let Some(target) = targets.first() else {
            return;
        };
        let Some(name) = target.as_name() else {
            self.fail("Assignment target must be a single variable", target.span);
            return;
        };

        if self.schema.entity(name).is_some() {
            self.fail("Invalid assignment to API token", target.span);
        } else if self.symbol_type(name).is_some() {
            self.fail("Invalid assignment to VU parameter", target.span);
        } else if builtins::is_builtin(name) {
            self.fail("Invalid assignment to builtin", target.span);
        } else if self.lookup(name).is_some() {
            self.fail(
                format!("Variable {name} is already defined; variables are immutable"),
                target.span,
            );
        }

        let ty = self.check_expr(value);
        self.declare(name, ty, false);
    }

    fn check_for(&mut self, target: &Expr, iter: &Expr, body: &[Stmt]) {
        let Some(name) = target.as_name() else {
            self.fail("Loop target must be a single variable", target.span);
            return;
        };
        if builtins::is_builtin(name) {
            self.fail("Loop target cannot have the name of a builtin", target.span);
        } else if self.lookup(name).is_some() {
            self.fail(format!("Loop variable {name} shadows an existing variable"), target.span);
        }

        let iter_ty = self.check_expr(iter);
        if !iter_ty.is_array() {
            self.fail("Loop iterator must be an array", iter.span);
        }

        self.scopes.push(HashMap::new());
        self.declare(name, iter_ty.indexed(), true);
        self.check_block(body);
        self.scopes.pop();
    }

    fn check_condition(&mut self, test: &Expr, context: &str) -> VuType {
        let ty = self.check_expr(test);
        if ty.is_pointer() {
            self.fail(
                format!("Condition of {context} cannot be a pointer.  Use comparison with NULL"),
                test.span,
            );
        } else if ty.class != TypeClass::Bool {
            self.fail(format!("Condition of {context} must be boolean"), test.span);
        }
        ty
    }

    fn check_expr(&mut self, expr: &Expr) -> VuType {
        match &expr.kind {
            ExprKind::Bool(_) => VuType::boolean(),
            ExprKind::Int(_) | ExprKind::Float(_) => VuType::num(),
            ExprKind::Name(id) => self.check_name(id, expr.span),
            ExprKind::BoolOp { values, .. } => {
                for value in values {
                    let ty = self.check_expr(value);
                    if ty.class != TypeClass::Bool {
                        self.fail("Parameter of boolean operation must be boolean", value.span);
                    }
                    if ty.is_pointer() {
                        self.fail(
                            "Parameter of boolean operation cannot be a pointer.  Use comparison with NULL",
                            value.span,
                        );
                    }
                }
                VuType::boolean()
            }
            ExprKind::UnaryOp { op, operand } => self.check_unary(*op, operand),
            ExprKind::Compare { left, ops } => {
                if ops.len() != 1 {
                    self.fail("Only binary comparisons are allowed", expr.span);
                }
                match ops.first() {
                    Some((op, right)) => {
                        self.check_binary(left, OpFamily::of_compare(*op), right, expr.span)
                    }
                    None => VuType::boolean(),
                }
            }
            ExprKind::BinOp { op, left, right } => {
                self.check_binary(left, OpFamily::of_binary(*op), right, expr.span)
            }
            ExprKind::Call { func, args } => self.check_call(func, args, expr.span),
            ExprKind::Attribute { value, attr } => self.check_attribute(value, attr, expr.span),
            ExprKind::Subscript { value, index } => {
                let value_ty = self.check_expr(value);
                let index_ty = self.check_expr(index);
                if !value_ty.is_array() {
                    self.fail("Subscript only allowed on arrays", value.span);
                }
                if index_ty.class != TypeClass::Num || index_ty.is_pointer() {
                    self.fail("Array subscript must be a number", index.span);
                }
                value_ty.indexed()
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.check_condition(test, "ternary operator");
                let body_ty = self.check_expr(body);
                let orelse_ty = self.check_expr(orelse);
                if !self.types_match(&body_ty, &orelse_ty, true) {
                    self.fail(
                        "Expressions in ternary operator must have matching types",
                        body.span.merge(orelse.span),
                    );
                }
                // A bitmask branch wins so that `flags if c else VK_FOO_BIT`
                // stays a bitmask.
                if orelse_ty.class == TypeClass::Bitmask {
                    orelse_ty
                } else {
                    body_ty
                }
            }
        }
    }

    fn check_name(&mut self, id: &str, span: Span) -> VuType {
        if builtins::is_builtin(id) {
            self.fail("Invalid usage of builtin as variable", span);
            return VuType::void();
        }
        if let Some(var) = self.lookup(id) {
            return var.ty.clone();
        }
        if let Some(ty) = self.symbol_type(id) {
            return ty;
        }
        if self.schema.is_feature(id) {
            self.fail(
                format!("Feature {id} can only be used as the argument of is_feature_enabled()"),
                span,
            );
        } else {
            self.fail(
                format!(
                    "Unknown token {id} is neither an API token, or a member or argument of {}",
                    self.api
                ),
                span,
            );
        }
        VuType::void()
    }

    /// Type of a name that is not a variable: `NULL`, `VK_NULL_HANDLE`, a
    /// member or parameter of the API, or any registry token.
    fn symbol_type(&self, name: &str) -> Option<VuType> {
        if name == NULL {
            let mut ty = VuType::new(TypeClass::Void, "");
            ty.pointer_level = 1;
            return Some(ty);
        }
        if name == NULL_HANDLE {
            return Some(VuType::new(TypeClass::Handle, NULL_HANDLE));
        }
        member_type(self.schema, self.api, name).or_else(|| api_type(self.schema, name))
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr) -> VuType {
        let ty = self.check_expr(operand);
        if ty.is_pointer() {
            self.fail(
                "Operand of unary operation cannot be a pointer.  Use comparison with NULL",
                operand.span,
            );
        }
        match op {
            UnaryOp::Not => {
                if ty.class != TypeClass::Bool {
                    self.fail("Operand of `not` must be boolean", operand.span);
                }
                VuType::boolean()
            }
            UnaryOp::Invert => {
                if ty.class == TypeClass::Bitmask {
                    ty
                } else {
                    self.fail("Operand of `~` must be a bitmask", operand.span);
                    VuType::new(TypeClass::Bitmask, "")
                }
            }
            UnaryOp::Pos | UnaryOp::Neg => {
                if ty.class != TypeClass::Num {
                    self.fail("Operand of unary `+`/`-` must be a number", operand.span);
                }
                VuType::num()
            }
        }
    }

    fn check_binary(&mut self, left: &Expr, family: OpFamily, right: &Expr, span: Span) -> VuType {
        let left_ty = self.check_expr(left);
        let right_ty = self.check_expr(right);

        if family == OpFamily::Equality {
            if !self.types_match(&left_ty, &right_ty, true) {
                self.fail(
                    "Operands of `==` and `!=` must have matching types",
                    left.span.merge(right.span),
                );
            }
            return VuType::boolean();
        }

        for (operand, ty) in [(left, &left_ty), (right, &right_ty)] {
            if ty.is_pointer() {
                self.fail(
                    "Operand of binary operation cannot be a pointer.  Use comparison with NULL",
                    operand.span,
                );
            }
        }

        let numeric = |this: &mut Self, message: &str| {
            for (operand, ty) in [(left, &left_ty), (right, &right_ty)] {
                if ty.class != TypeClass::Num {
                    this.fail(message, operand.span);
                }
            }
        };

        match family {
            OpFamily::Arithmetic => {
                numeric(self, "Operands of arithmetic operations must be numbers");
                VuType::num()
            }
            OpFamily::Ordering => {
                numeric(self, "Operands of comparison operations must be numbers");
                VuType::boolean()
            }
            OpFamily::Shift => {
                numeric(self, "Operands of shift operations must be numbers");
                VuType::num()
            }
            OpFamily::Bitwise => {
                let left_is_mask = left_ty.class == TypeClass::Bitmask;
                let right_is_mask = right_ty.class == TypeClass::Bitmask;
                if !left_is_mask {
                    self.fail("Operands of bitwise operations must be bitmasks", left.span);
                }
                if !right_is_mask {
                    self.fail("Operands of bitwise operations must be bitmasks", right.span);
                }
                if left_is_mask && right_is_mask && !self.types_match(&left_ty, &right_ty, true) {
                    self.fail(
                        "Operands of bitwise operations must have matching types",
                        left.span.merge(right.span),
                    );
                }
                if left_is_mask {
                    left_ty
                } else if right_is_mask {
                    right_ty
                } else {
                    VuType::new(TypeClass::Bitmask, "")
                }
            }
            OpFamily::Unsupported => {
                self.fail("Unsupported binary operator is, is not, in, not in", span);
                VuType::boolean()
            }
            OpFamily::Equality => VuType::boolean(),
        }
    }

    fn check_call(&mut self, func: &Expr, args: &[Expr], span: Span) -> VuType {
        let (builtin, object): (&'static BuiltinFn, Option<VuType>) = match &func.kind {
            ExprKind::Name(id) => match builtins::lookup_func(id) {
                Some(b) => (b, None),
                None => return self.invalid_call(func),
            },
            ExprKind::Attribute { value, attr } => match builtins::lookup_attr(attr) {
                Some(b) => {
                    let object = self.check_receiver(value, b);
                    (b, Some(object))
                }
                None => return self.invalid_call(func),
            },
            _ => return self.invalid_call(func),
        };

        if builtin.name == "require" && object.is_none() {
            self.require_seen = true;
        }

        if args.len() != builtin.params.len() {
            self.fail(
                format!("Invalid number of arguments passed to builtin {}", builtin.name),
                func.span,
            );
            return self.return_type(builtin, object.as_ref(), &[]);
        }

        let mut arg_types = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(builtin.params) {
            let ty = match param {
                Param::Any => self.check_expr(arg),
                Param::Of(class) => {
                    let before = self.errors.len();
                    let ty = self.check_expr(arg);
                    let expected = VuType::new(*class, "");
                    // An argument that already failed is not reported twice.
                    if self.errors.len() == before && !self.types_match(&ty, &expected, false) {
                        self.fail(
                            format!("Mismatching type in argument to builtin {}", builtin.name),
                            arg.span,
                        );
                        return self.return_type(builtin, object.as_ref(), args);
                    }
                    ty
                }
                Param::LoopVar => {
                    let ty = self.check_expr(arg);
                    let is_loop = arg
                        .as_name()
                        .and_then(|n| self.lookup(n))
                        .is_some_and(|v| v.is_loop);
                    if !is_loop {
                        self.fail(
                            format!("{} argument is not a loop variable", builtin.name),
                            arg.span,
                        );
                    }
                    ty
                }
                Param::Feature => {
                    match arg.as_name() {
                        Some(name) if self.schema.is_feature(name) => {}
                        Some(name) => self.fail(format!("Unknown feature {name}"), arg.span),
                        None => self.fail(
                            format!("{} argument must be a feature name", builtin.name),
                            arg.span,
                        ),
                    }
                    VuType::boolean()
                }
                Param::IntConst => {
                    if !matches!(arg.kind, ExprKind::Int(_)) {
                        self.fail(
                            format!("{} arguments must be integer constants", builtin.name),
                            arg.span,
                        );
                    }
                    VuType::num()
                }
            };
            arg_types.push(ty);
        }

        if builtin.name == "has_bit" {
            if let (Some(object), Some(bit)) = (&object, arg_types.first()) {
                if object.class == TypeClass::Bitmask && !self.enum_types_match(object, bit) {
                    self.fail(
                        "has_bit argument is not an enum value of the object it is called on",
                        span,
                    );
                }
            }
        }

        self.return_type(builtin, object.as_ref(), args)
    }

    fn invalid_call(&mut self, func: &Expr) -> VuType {
        self.fail(
            "Invalid function call.  If a builtin was intended, it is misspelled",
            func.span,
        );
        VuType::void()
    }

    fn return_type(&self, builtin: &BuiltinFn, object: Option<&VuType>, args: &[Expr]) -> VuType {
        match builtin.ret {
            Returns::Void => VuType::void(),
            Returns::Bool => VuType::boolean(),
            Returns::Index => VuType::new(TypeClass::Num, "uint32_t"),
            Returns::StructNamedByArg => {
                let name = args.first().and_then(Expr::as_name).unwrap_or_default();
                VuType::new(TypeClass::Struct, name)
            }
            Returns::CreateInfo(infix) => {
                let handle = object.map(|o| o.name.as_str()).unwrap_or_default();
                VuType::new(TypeClass::Struct, builtins::create_info_name(handle, infix))
            }
        }
    }

    /// The object an attribute builtin is called on.
    fn check_receiver(&mut self, value: &Expr, builtin: &BuiltinFn) -> VuType {
        let ty = self.check_expr(value).dereferenced();
        if let Some(class) = builtin.receiver {
            if !self.types_match(&VuType::new(class, ""), &ty, false) {
                self.fail(
                    format!("Invalid object type for attribute builtin {}", builtin.name),
                    value.span,
                );
            }
        }
        ty
    }

    fn check_attribute(&mut self, value: &Expr, attr: &str, span: Span) -> VuType {
        if builtins::lookup_attr(attr).is_some() {
            self.check_expr(value);
            self.fail(format!("Builtin {attr} must be called"), span);
            return VuType::void();
        }

        let value_ty = self.check_expr(value).dereferenced();
        if value_ty.class != TypeClass::Struct {
            self.fail(
                "Invalid use of . on non-struct object.  If a builtin was intended, it is misspelled",
                value.span,
            );
            return value_ty;
        }
        match member_type(self.schema, &value_ty.name, attr) {
            Some(ty) => ty,
            None => {
                self.fail(format!("No such attribute {attr} in struct {}", value_ty.name), span);
                value_ty
            }
        }
    }

    /// Follow registry aliases so that `VkFooKHR` and `VkFoo` compare equal.
    fn canonical<'n>(&'n self, name: &'n str) -> &'n str {
        self.schema
            .entity(name)
            .and_then(|e| e.alias.as_deref())
            .unwrap_or(name)
    }

    /// Bitmask types are compared through their FlagBits type.
    fn bits_view(&self, ty: &VuType) -> VuType {
        if ty.class != TypeClass::Bitmask {
            return ty.clone();
        }
        match self.schema.bits_type_of(&ty.name) {
            Some(bits) => VuType {
                name: bits.to_string(),
                ..ty.clone()
            },
            None => ty.clone(),
        }
    }

    fn enum_types_match(&self, left: &VuType, right: &VuType) -> bool {
        if self.canonical(&left.name) == self.canonical(&right.name) {
            return true;
        }
        let left = self.bits_view(left);
        let right = self.bits_view(right);
        let (l, r) = (self.canonical(&left.name), self.canonical(&right.name));
        if left.class == TypeClass::Bitmask && right.class == TypeClass::Bitmask {
            return l == r;
        }
        if l == r {
            return true;
        }
        // A value with no recorded enum type is named after itself
        // (VK_FOO); accept it against any enum type (VkFoo).
        l.contains('_') != r.contains('_')
    }

    fn handle_types_match(&self, left: &VuType, right: &VuType) -> bool {
        self.canonical(&left.name) == self.canonical(&right.name)
            || left.name == NULL_HANDLE
            || right.name == NULL_HANDLE
    }

    fn base_types_match(&self, left: &VuType, right: &VuType, require_name: bool) -> bool {
        let enumlike = |c: TypeClass| matches!(c, TypeClass::Enum | TypeClass::Bitmask);
        if require_name && enumlike(left.class) && enumlike(right.class) {
            return self.enum_types_match(left, right);
        }
        if left.class != right.class {
            return false;
        }
        if require_name {
            match left.class {
                TypeClass::Struct => {
                    return self.canonical(&left.name) == self.canonical(&right.name)
                }
                TypeClass::Handle => return self.handle_types_match(left, right),
                _ => {}
            }
        }
        true
    }

    fn types_match(&self, left: &VuType, right: &VuType, require_name: bool) -> bool {
        if !left.is_pointer() && !right.is_pointer() {
            return self.base_types_match(left, right, require_name);
        }

        // void* (NULL) takes the pointer level of the other side
        let mut left_level = left.pointer_level;
        let mut right_level = right.pointer_level;
        if left.class == TypeClass::Void && right_level > 0 {
            left_level = right_level;
        } else if right.class == TypeClass::Void && left_level > 0 {
            right_level = left_level;
        }
        if left_level != right_level {
            return false;
        }

        left.class == TypeClass::Void
            || right.class == TypeClass::Void
            || self.base_types_match(left, right, require_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;
    use crate::schema::tests::fixture;

    fn check(api: &str, src: &str) -> Result<(), Vec<CompileError>> {
        let module = parse(lex(src).unwrap()).unwrap();
        validate(&module, &fixture(), api)
    }

    fn check_ok(api: &str, src: &str) {
        let messages: Vec<String> = check(api, src)
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert!(messages.is_empty(), "unexpected errors for {src:?}: {messages:?}");
    }

    /// Messages of the diagnostics for a VU that must fail.
    fn check_err(api: &str, src: &str) -> Vec<String> {
        check(api, src).unwrap_err().into_iter().map(|e| e.message).collect()
    }

    fn has(errors: &[String], needle: &str) -> bool {
        errors.iter().any(|e| e.contains(needle))
    }

    const RP: &str = "VkRenderPassCreateInfo2";
    const SUBPASS: &str = "VkSubpassDescription2";

    #[test]
    fn loop_over_struct_array() {
        check_ok(RP, "for subpass in pSubpasses:\n  require(subpass.viewMask == 0)");
        check_ok(RP, "require(pSubpasses[0].pInputAttachments[0].attachment != 0)");
    }

    #[test]
    fn alias_api_resolves_members() {
        check_ok(
            "VkSubpassDescriptionDepthStencilResolveKHR",
            "if depthResolveMode == VK_RESOLVE_MODE_MAX_BIT:\n    require(stencilResolveMode == VK_RESOLVE_MODE_MAX_BIT_KHR)",
        );
    }

    #[test]
    fn has_bit_on_enum_member_fails() {
        let errors = check_err(
            "VkSubpassDescriptionDepthStencilResolveKHR",
            "require(stencilResolveMode.has_bit(VK_RESOLVE_MODE_MAX_BIT))",
        );
        assert!(has(&errors, "Invalid object type for attribute builtin has_bit"));
    }

    #[test]
    fn has_bit_checks_flag_bits_type() {
        let api = "VkGraphicsPipelineCreateInfo";
        check_ok(api, "require(flags.has_bit(VK_PIPELINE_CREATE_DERIVATIVE_BIT))");
        let errors = check_err(api, "require(flags.has_bit(VK_IMAGE_USAGE_TRANSFER_SRC_BIT))");
        assert!(has(&errors, "has_bit argument is not an enum value"));
        assert!(has(&check_err(api, "require(flags.has_bit(0))"), "Mismatching type in argument"));
    }

    #[test]
    fn create_info_on_handles() {
        check_ok(
            "vkDestroyImage",
            "if image != VK_NULL_HANDLE:\n  require(image.create_info().imageType == VK_IMAGE_TYPE_2D)",
        );
        let api = "VkGraphicsPipelineCreateInfo";
        check_ok(api, "require(basePipelineHandle.create_info().flags.has_bit(VK_PIPELINE_CREATE_DERIVATIVE_BIT))");
        check_ok(api, "require(basePipelineHandle.graphics_create_info().stageCount > 0)");
        assert!(has(
            &check_err(RP, "require(flags.create_info().flags.none())"),
            "Invalid object type for attribute builtin create_info"
        ));
    }

    #[test]
    fn require_is_mandatory() {
        let errors = check_err(RP, "variable = flags.any()");
        assert!(has(&errors, "VUs must contain at least one require()"));
    }

    #[test]
    fn unknown_member_is_named() {
        let src = "require(pSubpasses[0].bogusMember == 0)";
        let errors = check(RP, src).unwrap_err();
        assert!(errors[0].message.contains("No such attribute bogusMember in struct VkSubpassDescription2"));
        assert_eq!(&src[errors[0].span.start..errors[0].span.end], "pSubpasses[0].bogusMember");
    }

    #[test]
    fn unknown_token_is_named() {
        let src = "require(bogus == 0)";
        let errors = check(RP, src).unwrap_err();
        assert!(errors[0].message.contains("Unknown token bogus"));
        assert_eq!(&src[errors[0].span.start..errors[0].span.end], "bogus");
    }

    #[test]
    fn all_diagnostics_are_collected() {
        let errors = check_err(RP, "require(bogus1 == 0 and bogus2 == 0)");
        assert!(has(&errors, "bogus1") && has(&errors, "bogus2"));
    }

    #[test]
    fn unknown_api_is_reported() {
        let errors = check_err("VkNotAStruct", "require(flags.any())");
        assert_eq!(errors, ["Invalid API name VkNotAStruct"]);
    }

    #[test]
    fn assignment_targets() {
        check_ok(RP, "variable = pSubpasses[0].pDepthStencilAttachment\nrequire(variable != NULL)");
        let cases = [
            ("VkImageType = pSubpasses\nrequire(pSubpasses != NULL)", "Invalid assignment to API token"),
            ("flags = pSubpasses\nrequire(flags != NULL)", "Invalid assignment to VU parameter"),
            ("has_bit = pSubpasses\nrequire(0 == 0)", "Invalid assignment to builtin"),
            ("a = b = pSubpasses\nrequire(a != NULL)", "Cascaded assignments are not allowed"),
            ("v = 0\nv = 1\nrequire(v == 1)", "variables are immutable"),
        ];
        for (src, message) in cases {
            assert!(has(&check_err(RP, src), message), "{src}");
        }
    }

    #[test]
    fn variable_scopes() {
        check_ok(RP, "variable = 0\nif flags.any():\n  require(variable == 0)");
        check_ok(RP, "if flags.any():\n  variable = 0\n  require(variable == 0)\nvariable = 1\nrequire(variable == 1)");
        check_ok(RP, "if flags.any():\n  v = 0\n  require(v == 0)\nelse:\n  v = 1\n  require(v == 1)");

        check_err(RP, "require(variable == 0)\nvariable = 1");
        check_err(RP, "if flags.any():\n  v = 0\n  require(v == 0)\nrequire(v == 0)");
        check_err(RP, "if flags.any():\n  v = 0\n  require(v == 0)\nelse:\n  require(v == 0)");
    }

    #[test]
    fn loop_rules() {
        check_ok("VkInstanceCreateInfo", "for name in ppEnabledExtensionNames:\n  require(name != NULL)");
        check_ok(RP, "require(reserved[0] == 0)");
        let cases = [
            ("for x in flags:\n  require(0 == 0)", "Loop iterator must be an array"),
            ("for a in pSubpasses[0].pDepthStencilAttachment:\n  require(0 == 0)", "Loop iterator must be an array"),
            ("for has_bit in pSubpasses:\n  require(0 == 0)", "Loop target cannot have the name of a builtin"),
            ("v = 0\nfor v in pSubpasses:\n  require(v.viewMask == 0)", "shadows an existing variable"),
            ("for v in pSubpasses:\n  v = pSubpasses[0]\n  require(v.viewMask == 0)", "variables are immutable"),
        ];
        for (src, message) in cases {
            assert!(has(&check_err(RP, src), message), "{src}");
        }
    }

    #[test]
    fn loop_index_needs_loop_variable() {
        check_ok(RP, "for s in pSubpasses:\n  require(loop_index(s) < subpassCount)");
        check_ok(RP, "for s in pSubpasses:\n  require(array_index(s) < subpassCount)");
        let errors = check_err(RP, "subpasses = pSubpasses\nrequire(array_index(subpasses) > 0)");
        assert!(has(&errors, "array_index argument is not a loop variable"));
    }

    #[test]
    fn conditions_must_be_boolean() {
        assert!(has(&check_err(RP, "if flags:\n  require(0 == 0)"), "Condition of if must be boolean"));
        assert!(has(&check_err(RP, "if pSubpasses:\n  require(0 == 0)"), "cannot be a pointer"));
        assert!(has(
            &check_err(SUBPASS, "require(viewMask == 0 if flags else viewMask == 1)"),
            "Unknown token flags"
        ));
    }

    #[test]
    fn operator_operands() {
        check_ok(RP, "require(-attachmentCount > +subpassCount)");
        check_ok(RP, "require(4 * attachmentCount % 5 != 0)");
        check_ok(RP, "require(1 << attachmentCount == 0x10)");
        check_ok(RP, "require((flags | ~flags).any())");
        check_ok(RP, "require(not flags.any())");
        check_ok(RP, "require((attachmentCount >= subpassCount) == flags.any())");

        let cases = [
            ("require(pSubpasses + 5 == 10)", "cannot be a pointer"),
            ("require(flags.any() * -1 == 0)", "Operands of arithmetic operations must be numbers"),
            ("require(flags >> 1 != 0)", "Operands of shift operations must be numbers"),
            ("require(10 <= flags.any())", "Operands of comparison operations must be numbers"),
            ("require(not flags)", "Operand of `not` must be boolean"),
            ("require(~attachmentCount == flags)", "Operand of `~` must be a bitmask"),
            ("require(-flags == 0)", "Operand of unary `+`/`-` must be a number"),
            ("require(flags & VK_IMAGE_TYPE_1D == flags)", "Operands of bitwise operations must be bitmasks"),
            ("require(attachmentCount == subpassCount == 1)", "Only binary comparisons are allowed"),
            ("require(flags is flags)", "Unsupported binary operator"),
        ];
        for (src, message) in cases {
            assert!(has(&check_err(RP, src), message), "{src}");
        }
    }

    #[test]
    fn equality_rules() {
        check_ok(SUBPASS, "require(pInputAttachments != pColorAttachments)");
        check_ok(SUBPASS, "require(NULL != pInputAttachments)");
        check_ok("vkDestroyImage", "require(VK_NULL_HANDLE != image)");
        check_ok("VkImageCreateInfo", "require(imageType != VK_IMAGE_TYPE_1D)");
        check_ok("VkImageCreateInfo", "require(usage.has_bit(VK_IMAGE_USAGE_TRANSFER_SRC_BIT))");

        let mismatch = "Operands of `==` and `!=` must have matching types";
        assert!(has(&check_err("VkImageCreateInfo", "require(VK_IMAGE_TILING_OPTIMAL != VK_IMAGE_TYPE_1D)"), mismatch));
        assert!(has(&check_err("VkImageCreateInfo", "require(tiling == VK_IMAGE_TYPE_1D)"), mismatch));
        assert!(has(&check_err("VkImageCreateInfo", "require(usage == VK_IMAGE_TYPE_1D)"), mismatch));
        assert!(has(&check_err(SUBPASS, "require(pInputAttachments == colorAttachmentCount)"), mismatch));
        assert!(has(&check_err(SUBPASS, "require(pInputAttachments[0] != 1)"), mismatch));
        assert!(has(&check_err("vkDestroyImage", "require(device == image)"), mismatch));
    }

    #[test]
    fn features_only_in_is_feature_enabled() {
        check_ok(RP, "require(is_feature_enabled(imageCubeArray))");
        check_ok(RP, "require(is_feature_enabled(drawIndirectCount))");
        assert!(has(&check_err(RP, "require(is_feature_enabled(imageCubeArra))"), "Unknown feature imageCubeArra"));
        assert!(has(
            &check_err(RP, "require(imageCubeArray == VK_TRUE)"),
            "Feature imageCubeArray can only be used"
        ));
    }

    #[test]
    fn version_and_extension_predicates() {
        check_ok(RP, "if is_version(1, 2):\n  require(flags.none())");
        check_ok(RP, "require(is_ext_enabled(VK_KHR_depth_stencil_resolve))");
        assert!(has(&check_err(RP, "require(is_version(attachmentCount, 1))"), "integer constants"));
        assert!(has(&check_err(RP, "require(is_ext_enabled(VkImageType))"), "Mismatching type"));
    }

    #[test]
    fn pnext_returns_named_struct() {
        check_ok(
            SUBPASS,
            "if has_pnext(VkSubpassDescriptionDepthStencilResolve):\n  require(pnext(VkSubpassDescriptionDepthStencilResolve).depthResolveMode != VK_RESOLVE_MODE_NONE)",
        );
        assert!(has(
            &check_err(SUBPASS, "require(pnext(VkSubpassDescriptionDepthStencilResolve).bogus == 0)"),
            "No such attribute bogus"
        ));
    }

    #[test]
    fn ternary_branches_must_match() {
        check_ok(SUBPASS, "require((pInputAttachments if viewMask != 0 else NULL) != NULL)");
        check_ok(SUBPASS, "require((NULL if viewMask != 0 else NULL) != pInputAttachments)");
        let mismatch = "Expressions in ternary operator must have matching types";
        assert!(has(&check_err(SUBPASS, "require((0 if viewMask != 0 else NULL) == 0)"), mismatch));
        assert!(has(&check_err(SUBPASS, "require((0 if viewMask != 0 else pInputAttachments) == 0)"), mismatch));
        assert!(has(
            &check_err(SUBPASS, "require(viewMask == 0 if pInputAttachments else viewMask == 1)"),
            "Condition of ternary operator cannot be a pointer"
        ));
    }

    #[test]
    fn subscripts() {
        assert!(has(&check_err(RP, "require(flags[0].none())"), "Subscript only allowed on arrays"));
        assert!(has(
            &check_err(SUBPASS, "require(pDepthStencilAttachment[0].attachment != 0)"),
            "Subscript only allowed on arrays"
        ));
        assert!(has(
            &check_err(SUBPASS, "require(pInputAttachments[pNext].attachment != 0)"),
            "Array subscript must be a number"
        ));
    }

    #[test]
    fn calls_and_attributes() {
        let cases = [
            ("require(some_function(flags))", "Invalid function call"),
            ("require(flags.some_function())", "Invalid function call"),
            ("require(flags.any(), flags.none())", "Invalid number of arguments passed to builtin require"),
            ("require()", "Invalid number of arguments"),
            ("require(pSubpasses.valid())", "Invalid object type for attribute builtin valid"),
            ("require(attachmentCount.bogus == 0)", "Invalid use of . on non-struct object"),
            ("require(array_index == 0)", "Invalid usage of builtin as variable"),
            ("require(flags.any)", "Builtin any must be called"),
        ];
        for (src, message) in cases {
            assert!(has(&check_err(RP, src), message), "{src}");
        }
    }

    #[test]
    fn api_types() {
        let schema = fixture();
        assert_eq!(api_type(&schema, "VK_IMAGE_TYPE_1D").unwrap(), VuType::new(TypeClass::Enum, "VkImageType"));
        assert_eq!(api_type(&schema, "VK_TRUE").unwrap().class, TypeClass::Num);
        assert_eq!(api_type(&schema, "VkImageUsageFlags").unwrap().class, TypeClass::Bitmask);
        assert_eq!(api_type(&schema, "VkImage").unwrap().class, TypeClass::Handle);
        assert_eq!(api_type(&schema, "VkExtent3D").unwrap().class, TypeClass::StructName);
        assert_eq!(api_type(&schema, "VK_NULL_HANDLE").unwrap().class, TypeClass::Handle);
        assert!(api_type(&schema, "vkCmdDraw").is_none());

        let ty = member_type(&schema, "VkInstanceCreateInfo", "ppEnabledExtensionNames").unwrap();
        assert_eq!((ty.class, ty.pointer_level), (TypeClass::Num, 2));
        assert_eq!(ty.indexed().array_len.as_deref(), Some(UNSPECIFIED_LEN));
        assert_eq!(member_type(&schema, "VkImageCreateInfo", "extent").unwrap().class, TypeClass::Struct);
    }
}
