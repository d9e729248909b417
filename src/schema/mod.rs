//! Read-only view of the API registry that VUs are checked against.
//!
//! A `Schema` is built once (from registry XML, or with `SchemaBuilder` in
//! tests) and then shared between any number of compilations.

pub mod xml;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::AppError;

/// Which part of the registry an entity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Struct,
    Handle,
    BaseType,
    /// A bitmask typedef (`VkFooFlags`).
    Flags,
    /// An enumerated type (`VkFoo`, `VkFooFlagBits`).
    Enum,
    /// A value of an enumerated type (`VK_FOO_BAR`).
    EnumValue,
    /// An API constant such as `VK_FALSE`.
    Constant,
    /// A preprocessor define such as `VK_NULL_HANDLE`.
    Define,
    Command,
    Extension,
    Version,
}

/// A struct member or command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub type_name: String,
    /// Number of `*` in the declaration, plus one for fixed-size arrays.
    pub pointer_level: u32,
    /// The `len` of a dynamic array, or the size of a fixed one.
    pub array_len: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            pointer_level: 0,
            array_len: None,
        }
    }

    /// A pointer to `len` elements.
    pub fn array(mut self, len: impl Into<String>) -> Self {
        self.pointer_level += 1;
        self.array_len = Some(len.into());
        self
    }

    pub fn pointer(mut self) -> Self {
        self.pointer_level += 1;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub category: Category,
    pub alias: Option<String>,
    /// Struct members or command parameters, in declaration order.
    pub members: Vec<Member>,
    /// For enum values: the enumerated type they belong to.
    pub parent: Option<String>,
    /// For constants: the C type (`uint32_t`, `float`...).
    pub c_type: Option<String>,
    /// For flags: the `VkFooFlagBits` type holding the bits.
    pub bits: Option<String>,
    /// For structs: the structs whose `pNext` chain may contain this one.
    pub extends: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            alias: None,
            members: Vec::new(),
            parent: None,
            c_type: None,
            bits: None,
            extends: Vec::new(),
        }
    }

    pub fn alias_of(mut self, target: impl Into<String>) -> Self {
        self.alias = Some(target.into());
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn c_type(mut self, ty: impl Into<String>) -> Self {
        self.c_type = Some(ty.into());
        self
    }

    pub fn bits(mut self, bits: impl Into<String>) -> Self {
        self.bits = Some(bits.into());
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }
}

/// The versions and extensions that expose an entity. Each condition is a
/// `+`-joined list of names that must all be part of the build, e.g.
/// `VK_KHR_foo+VK_VERSION_1_1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    conditions: Vec<String>,
}

impl Availability {
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn add(&mut self, condition: impl Into<String>) {
        let condition = condition.into();
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
    }

    pub fn merge(&mut self, other: &Availability) {
        for c in &other.conditions {
            self.add(c.clone());
        }
    }

    /// Whether some condition has every one of its parts enabled.
    pub fn is_defined(&self, is_enabled: impl Fn(&str) -> bool) -> bool {
        self.conditions
            .iter()
            .any(|cond| cond.split('+').all(|part| is_enabled(part)))
    }
}

/// The registry facade. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<String, Entity>,
    availability: HashMap<String, Availability>,
    features: HashMap<String, Availability>,
}

/// Structs whose members are features.
const FEATURES_STRUCT: &str = "VkPhysicalDeviceFeatures";
const FEATURES_CHAIN_ROOT: &str = "VkPhysicalDeviceFeatures2";

/// Guards alias walks against cycles in malformed registries.
const MAX_ALIAS_DEPTH: usize = 8;

impl Schema {
    /// Load a registry XML file.
    pub fn load(path: &Path) -> Result<Schema, AppError> {
        let text = std::fs::read_to_string(path)?;
        xml::parse_registry(&text)
    }

    pub fn from_xml_str(text: &str) -> Result<Schema, AppError> {
        xml::parse_registry(text)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn category(&self, name: &str) -> Option<Category> {
        self.entities.get(name).map(|e| e.category)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up a member of a struct (or parameter of a command), following
    /// the alias chain if the entity itself declares no such member.
    pub fn member(&self, owner: &str, name: &str) -> Option<&Member> {
        let mut current = owner;
        for _ in 0..MAX_ALIAS_DEPTH {
            let entity = self.entities.get(current)?;
            if let Some(m) = entity.members.iter().find(|m| m.name == name) {
                return Some(m);
            }
            current = entity.alias.as_deref()?;
        }
        None
    }

    pub fn has_member(&self, owner: &str, name: &str) -> bool {
        self.member(owner, name).is_some()
    }

    pub fn member_type(&self, owner: &str, name: &str) -> Option<&str> {
        self.member(owner, name).map(|m| m.type_name.as_str())
    }

    /// Whether `owner` (or what it aliases) declares members at all.
    pub fn has_members(&self, owner: &str) -> bool {
        let mut current = owner;
        for _ in 0..MAX_ALIAS_DEPTH {
            let Some(entity) = self.entities.get(current) else {
                return false;
            };
            if !entity.members.is_empty() {
                return true;
            }
            match entity.alias.as_deref() {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    pub fn is_alias(&self, a: &str, b: &str) -> bool {
        let points_to = |from: &str, to: &str| {
            self.entities
                .get(from)
                .and_then(|e| e.alias.as_deref())
                .is_some_and(|alias| alias == to)
        };
        points_to(a, b) || points_to(b, a)
    }

    pub fn availability(&self, name: &str) -> Option<&Availability> {
        self.availability.get(name)
    }

    pub fn is_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn feature_availability(&self, name: &str) -> Option<&Availability> {
        self.features.get(name)
    }

    pub fn struct_extends(&self, name: &str) -> &[String] {
        self.entities.get(name).map_or(&[], |e| e.extends.as_slice())
    }

    /// `VkFooFlags` → `VkFooFlagBits`, if the registry records it.
    pub fn bits_type_of(&self, flags: &str) -> Option<&str> {
        let entity = self.entities.get(flags)?;
        if entity.category != Category::Flags {
            return None;
        }
        if let Some(bits) = entity.bits.as_deref() {
            return Some(bits);
        }
        let target = entity.alias.as_deref()?;
        self.entities.get(target)?.bits.as_deref()
    }
}

/// Collects entities and availability, then derives the alias-merged
/// availability and the feature table in `build`.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: HashMap<String, Entity>,
    availability: HashMap<String, Availability>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.add_entity(entity);
        self
    }

    pub fn available(mut self, name: &str, condition: &str) -> Self {
        self.add_availability(name, condition);
        self
    }

    /// Insert an entity. A later declaration of the same name only fills in
    /// what the earlier one left empty.
    pub fn add_entity(&mut self, entity: Entity) {
        match self.entities.get_mut(&entity.name) {
            Some(existing) => {
                if existing.parent.is_none() {
                    existing.parent = entity.parent;
                }
                if existing.alias.is_none() {
                    existing.alias = entity.alias;
                }
                if existing.members.is_empty() {
                    existing.members = entity.members;
                }
            }
            None => {
                self.entities.insert(entity.name.clone(), entity);
            }
        }
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn add_availability(&mut self, name: &str, condition: &str) {
        self.availability
            .entry(name.to_string())
            .or_default()
            .add(condition);
    }

    pub fn build(self) -> Schema {
        let SchemaBuilder {
            entities,
            mut availability,
        } = self;

        // Enum values declared with their type (rather than added by a
        // feature or extension) inherit the type's availability.
        let implicit: Vec<String> = entities
            .values()
            .filter(|e| e.category == Category::EnumValue && !availability.contains_key(&e.name))
            .map(|e| e.name.clone())
            .collect();

        // Aliases are available wherever their target is, and vice versa.
        let pairs: Vec<(String, String)> = entities
            .values()
            .filter_map(|e| e.alias.clone().map(|a| (e.name.clone(), a)))
            .collect();
        for (name, target) in &pairs {
            let mut merged = availability.get(name).cloned().unwrap_or_default();
            if let Some(other) = availability.get(target) {
                merged.merge(other);
            }
            if merged.conditions().is_empty() {
                continue;
            }
            availability.insert(name.clone(), merged.clone());
            availability.insert(target.clone(), merged);
        }

        for name in implicit {
            let parent_avail = entities
                .get(&name)
                .and_then(|e| e.parent.as_deref())
                .and_then(|parent| availability.get(parent))
                .cloned();
            if let Some(avail) = parent_avail {
                availability.insert(name, avail);
            }
        }

        let features = collect_features(&entities, &availability);

        Schema {
            entities,
            availability,
            features,
        }
    }
}

fn collect_features(
    entities: &HashMap<String, Entity>,
    availability: &HashMap<String, Availability>,
) -> HashMap<String, Availability> {
    let mut features: HashMap<String, Availability> = HashMap::new();
    let mut seen = HashSet::new();
    for entity in entities.values() {
        let declares_features = entity.name == FEATURES_STRUCT
            || entity.extends.iter().any(|p| p == FEATURES_CHAIN_ROOT);
        if entity.category != Category::Struct || !declares_features {
            continue;
        }
        seen.insert(entity.name.as_str());
        let struct_avail = availability.get(&entity.name).cloned().unwrap_or_default();
        for member in &entity.members {
            if member.name == "sType" || member.name == "pNext" {
                continue;
            }
            features
                .entry(member.name.clone())
                .or_default()
                .merge(&struct_avail);
        }
    }
    features
}
