use super::typeck::TypeClass;

/// What a builtin accepts in one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Any expression whose type class matches (pointers must match too).
    Of(TypeClass),
    /// Anything at all; the argument is not type checked.
    Any,
    /// A variable introduced by an enclosing `for`.
    LoopVar,
    /// A feature name, e.g. `imageCubeArray`.
    Feature,
    /// An integer literal (the major/minor of `is_version`).
    IntConst,
}

/// How the result type of a builtin is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Void,
    Bool,
    /// `uint32_t`
    Index,
    /// A struct named by the (struct name) argument, as in `pnext(VkFoo)`.
    StructNamedByArg,
    /// A struct named after the handle it is called on: `Vk` + infix + the
    /// rest of the handle name + `CreateInfo`.
    CreateInfo(&'static str),
}

/// Built-in predicate: single source of truth for name, signature and the
/// object it may be called on. The validator, renderers and build strip all
/// read from this.
#[derive(Debug, Clone)]
pub struct BuiltinFn {
    pub name: &'static str,
    /// `None` for free functions, the required object class for
    /// attribute-style builtins like `flags.has_bit(...)`.
    pub receiver: Option<TypeClass>,
    pub params: &'static [Param],
    pub ret: Returns,
}

/// Free-function builtins, e.g. `require(...)`.
pub static FUNC_BUILTINS: &[BuiltinFn] = &[
    BuiltinFn { name: "require", receiver: None, params: &[Param::Of(TypeClass::Bool)], ret: Returns::Void },
    BuiltinFn { name: "has_pnext", receiver: None, params: &[Param::Of(TypeClass::StructName)], ret: Returns::Bool },
    BuiltinFn { name: "pnext", receiver: None, params: &[Param::Of(TypeClass::StructName)], ret: Returns::StructNamedByArg },
    BuiltinFn { name: "loop_index", receiver: None, params: &[Param::LoopVar], ret: Returns::Index },
    BuiltinFn { name: "array_index", receiver: None, params: &[Param::LoopVar], ret: Returns::Index },
    BuiltinFn { name: "is_ext_enabled", receiver: None, params: &[Param::Of(TypeClass::ExtensionName)], ret: Returns::Bool },
    BuiltinFn { name: "externally_synchronized", receiver: None, params: &[Param::Of(TypeClass::Handle)], ret: Returns::Bool },
    BuiltinFn { name: "is_version", receiver: None, params: &[Param::IntConst, Param::IntConst], ret: Returns::Bool },
    BuiltinFn { name: "is_feature_enabled", receiver: None, params: &[Param::Feature], ret: Returns::Bool },
    // Expanded away before validation; never visible in any output.
    BuiltinFn { name: "macro", receiver: None, params: &[Param::Any], ret: Returns::Void },
];

/// Builtins used as if they were attributes, e.g. `flags.has_bit(...)`.
pub static ATTR_BUILTINS: &[BuiltinFn] = &[
    BuiltinFn { name: "has_pnext", receiver: Some(TypeClass::Struct), params: &[Param::Of(TypeClass::StructName)], ret: Returns::Bool },
    BuiltinFn { name: "pnext", receiver: Some(TypeClass::Struct), params: &[Param::Of(TypeClass::StructName)], ret: Returns::StructNamedByArg },
    BuiltinFn { name: "has_bit", receiver: Some(TypeClass::Bitmask), params: &[Param::Of(TypeClass::Enum)], ret: Returns::Bool },
    BuiltinFn { name: "any", receiver: Some(TypeClass::Bitmask), params: &[], ret: Returns::Bool },
    BuiltinFn { name: "none", receiver: Some(TypeClass::Bitmask), params: &[], ret: Returns::Bool },
    BuiltinFn { name: "valid", receiver: Some(TypeClass::Handle), params: &[], ret: Returns::Bool },
    BuiltinFn { name: "create_info", receiver: Some(TypeClass::Handle), params: &[], ret: Returns::CreateInfo("") },
    BuiltinFn { name: "graphics_create_info", receiver: Some(TypeClass::Handle), params: &[], ret: Returns::CreateInfo("Graphics") },
    BuiltinFn { name: "compute_create_info", receiver: Some(TypeClass::Handle), params: &[], ret: Returns::CreateInfo("Compute") },
    BuiltinFn { name: "raytracing_create_info", receiver: Some(TypeClass::Handle), params: &[], ret: Returns::CreateInfo("RayTracing") },
];

pub fn lookup_func(name: &str) -> Option<&'static BuiltinFn> {
    FUNC_BUILTINS.iter().find(|b| b.name == name)
}

pub fn lookup_attr(name: &str) -> Option<&'static BuiltinFn> {
    ATTR_BUILTINS.iter().find(|b| b.name == name)
}

/// Whether `name` is reserved by any builtin, in either form.
pub fn is_builtin(name: &str) -> bool {
    lookup_func(name).is_some() || lookup_attr(name).is_some()
}

/// `VkPipeline` + `Graphics` → `VkGraphicsPipelineCreateInfo`.
pub fn create_info_name(handle: &str, infix: &str) -> String {
    match handle.strip_prefix("Vk") {
        Some(rest) => format!("Vk{infix}{rest}CreateInfo"),
        None => format!("{infix}{handle}CreateInfo"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lookup_distinguishes_forms() {
        assert!(lookup_func("require").is_some());
        assert!(lookup_attr("require").is_none());
        assert!(lookup_func("has_bit").is_none());
        assert_eq!(lookup_attr("has_bit").unwrap().receiver, Some(TypeClass::Bitmask));
        // has_pnext and pnext exist in both forms
        assert!(lookup_func("pnext").is_some() && lookup_attr("pnext").is_some());
    }

    #[test]
    fn builtin_names_are_reserved() {
        for name in ["require", "valid", "none", "macro", "loop_index", "array_index"] {
            assert!(is_builtin(name), "{name}");
        }
        assert!(!is_builtin("flags"));
    }

    #[test]
    fn create_info_names() {
        assert_eq!(create_info_name("VkImage", ""), "VkImageCreateInfo");
        assert_eq!(create_info_name("VkPipeline", "Graphics"), "VkGraphicsPipelineCreateInfo");
        assert_eq!(create_info_name("VkPipeline", "RayTracing"), "VkRayTracingPipelineCreateInfo");
    }

    #[test]
    fn no_duplicate_entries() {
        for table in [FUNC_BUILTINS, ATTR_BUILTINS] {
            for (i, a) in table.iter().enumerate() {
                assert!(table[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
            }
        }
    }
}
