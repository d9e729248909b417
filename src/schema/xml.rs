use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Category, Entity, Member, Schema, SchemaBuilder};
use crate::error::AppError;

/// Parse an API registry document (the `vk.xml` layout).
///
/// The registry is read as a single event stream:
///   <types>       entity declarations, struct members
///   <enums>       enum values and API constants
///   <commands>    commands and their parameters
///   <feature>     what each core version requires
///   <extensions>  what each extension requires (and adds)
pub fn parse_registry(text: &str) -> Result<Schema, AppError> {
    let mut xml = Reader::from_str(text);
    xml.config_mut().trim_text(true);

    let mut loader = Loader::default();
    loop {
        match xml.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) => {
                let name = element_name(e);
                loader.start(&name, &attributes(e));
            }
            Ok(Event::Empty(ref e)) => {
                // Self-closing: <type name="..." alias="..."/>
                let name = element_name(e);
                loader.start(&name, &attributes(e));
                loader.end(&name);
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                loader.end(&name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                loader.text(&text);
            }
            Err(e) => return Err(AppError::from(e)),
            _ => {}
        }
    }

    Ok(loader.builder.build())
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let val = String::from_utf8_lossy(&attr.value).to_string();
            (key, val)
        })
        .collect()
}

fn category_of(attr: Option<&String>) -> Option<Category> {
    match attr.map(String::as_str) {
        Some("struct" | "union") => Some(Category::Struct),
        Some("handle") => Some(Category::Handle),
        Some("basetype") => Some(Category::BaseType),
        Some("bitmask") => Some(Category::Flags),
        Some("enum") => Some(Category::Enum),
        Some("define") => Some(Category::Define),
        _ => None,
    }
}

/// Which child element a piece of declaration text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Text,
    Type,
    Name,
    Enum,
}

/// A `<member>`, `<param>` or `<proto>` being read, kept as the sequence of
/// text fragments that make up its C declaration.
#[derive(Debug, Default)]
struct Declaration {
    len: Option<String>,
    fragments: Vec<(Part, String)>,
}

impl Declaration {
    fn first(&self, part: Part) -> Option<&str> {
        self.fragments
            .iter()
            .find(|(p, _)| *p == part)
            .map(|(_, s)| s.as_str())
    }

    fn into_member(self) -> Option<Member> {
        let type_name = self.first(Part::Type)?.to_string();
        let name = self.first(Part::Name)?.to_string();
        let name_at = self.fragments.iter().position(|(p, _)| *p == Part::Name)?;
        let (before, after) = self.fragments.split_at(name_at);

        let mut member = Member::new(name, type_name);
        // `const char* const*` → two levels
        member.pointer_level = before
            .iter()
            .filter(|(p, _)| *p == Part::Text)
            .map(|(_, s)| s.matches('*').count())
            .sum::<usize>()
            .try_into()
            .unwrap_or(u32::MAX);

        if let Some(len) = self.len {
            let first = len.split(',').next().unwrap_or_default().to_string();
            member.array_len = Some(first);
        } else {
            // Fixed-size arrays: <name>x</name>[<enum>N</enum>] or [4]
            let tail = after.iter().skip(1).find(|(p, _)| *p == Part::Text);
            if let Some((_, text)) = tail.filter(|(_, s)| s.starts_with('[')) {
                let size = after
                    .iter()
                    .find(|(p, _)| *p == Part::Enum)
                    .map(|(_, s)| s.clone())
                    .unwrap_or_else(|| text.trim_matches(|c| c == '[' || c == ']').to_string());
                member = member.array(size);
            }
        }
        Some(member)
    }
}

#[derive(Debug)]
struct PendingType {
    category: Option<Category>,
    attrs: HashMap<String, String>,
    name: Option<String>,
    members: Vec<Member>,
}

#[derive(Debug, Default)]
struct PendingCommand {
    name: Option<String>,
    params: Vec<Member>,
}

#[derive(Debug, Default)]
struct Loader {
    builder: SchemaBuilder,
    /// Open elements, innermost last.
    stack: Vec<String>,
    ty: Option<PendingType>,
    decl: Option<Declaration>,
    command: Option<PendingCommand>,
    /// Name of the open `<enums>` block, and whether it holds API constants.
    enums: Option<(String, bool)>,
    /// Version or extension whose `<require>` blocks are being read.
    provider: Option<String>,
    /// Extra dependency of the open `<require>` block.
    require_depends: Option<String>,
}

impl Loader {
    fn parent(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    fn start(&mut self, name: &str, attrs: &HashMap<String, String>) {
        match (name, self.parent()) {
            ("type", Some("types")) => {
                self.ty = Some(PendingType {
                    category: category_of(attrs.get("category")),
                    attrs: attrs.clone(),
                    name: attrs.get("name").cloned(),
                    members: Vec::new(),
                });
            }
            ("member", Some("type")) if self.ty.is_some() => {
                self.decl = Some(Declaration {
                    len: attrs.get("len").cloned(),
                    fragments: Vec::new(),
                });
            }
            ("command", Some("commands")) => {
                if let (Some(alias), Some(cmd)) = (attrs.get("alias"), attrs.get("name")) {
                    self.builder
                        .add_entity(Entity::new(cmd, Category::Command).alias_of(alias));
                } else {
                    self.command = Some(PendingCommand::default());
                }
            }
            ("proto" | "param", Some("command")) if self.command.is_some() => {
                self.decl = Some(Declaration::default());
            }
            ("enums", _) => {
                let block = attrs.get("name").cloned().unwrap_or_default();
                let constants = attrs.get("type").is_some_and(|t| t == "constants");
                self.enums = Some((block, constants));
            }
            ("enum", Some("enums")) => self.enum_value(attrs),
            ("feature", _) => {
                if let Some(version) = attrs.get("name") {
                    self.builder.add_entity(Entity::new(version, Category::Version));
                    self.provider = Some(version.clone());
                }
            }
            ("extension", Some("extensions")) => {
                let disabled = attrs.get("supported").is_some_and(|s| s == "disabled");
                if let (Some(ext), false) = (attrs.get("name"), disabled) {
                    self.builder.add_entity(Entity::new(ext, Category::Extension));
                    self.provider = Some(ext.clone());
                }
            }
            ("require", _) => {
                self.require_depends = attrs
                    .get("depends")
                    .or_else(|| attrs.get("feature"))
                    .or_else(|| attrs.get("extension"))
                    .cloned();
            }
            ("type" | "enum" | "command", Some("require")) => self.required(name, attrs),
            _ => {}
        }
        self.stack.push(name.to_string());
    }

    fn end(&mut self, name: &str) {
        self.stack.pop();
        match (name, self.parent()) {
            ("member", _) => {
                if let (Some(decl), Some(ty)) = (self.decl.take(), self.ty.as_mut()) {
                    ty.members.extend(decl.into_member());
                }
            }
            ("proto", _) => {
                if let (Some(decl), Some(cmd)) = (self.decl.take(), self.command.as_mut()) {
                    cmd.name = decl.first(Part::Name).map(str::to_string);
                }
            }
            ("param", _) => {
                if let (Some(decl), Some(cmd)) = (self.decl.take(), self.command.as_mut()) {
                    cmd.params.extend(decl.into_member());
                }
            }
            ("type", Some("types")) => {
                if let Some(ty) = self.ty.take() {
                    self.finish_type(ty);
                }
            }
            ("command", Some("commands")) => {
                if let Some(PendingCommand {
                    name: Some(name),
                    params,
                }) = self.command.take()
                {
                    let mut entity = Entity::new(name, Category::Command);
                    entity.members = params;
                    self.builder.add_entity(entity);
                }
            }
            ("enums", _) => self.enums = None,
            ("feature" | "extension", _) => self.provider = None,
            ("require", _) => self.require_depends = None,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let part = match self.parent() {
            Some("type") => Part::Type,
            Some("name") => Part::Name,
            Some("enum") => Part::Enum,
            Some("member" | "param" | "proto") => Part::Text,
            _ => return,
        };
        if let Some(decl) = self.decl.as_mut() {
            decl.fragments.push((part, text.to_string()));
        } else if let (Part::Name, Some(ty)) = (part, self.ty.as_mut()) {
            // <type category="handle">...(<name>VkDevice</name>)</type>
            ty.name = Some(text.to_string());
        }
    }

    fn finish_type(&mut self, ty: PendingType) {
        let (Some(name), Some(category)) = (ty.name, ty.category) else {
            return;
        };
        let mut entity = Entity::new(name, category);
        entity.alias = ty.attrs.get("alias").cloned();
        entity.members = ty.members;
        if category == Category::Flags {
            entity.bits = ty
                .attrs
                .get("requires")
                .or_else(|| ty.attrs.get("bitvalues"))
                .cloned();
        }
        if let Some(extends) = ty.attrs.get("structextends") {
            entity.extends = extends.split(',').map(str::to_string).collect();
        }
        self.builder.add_entity(entity);
    }

    fn enum_value(&mut self, attrs: &HashMap<String, String>) {
        let (Some(name), Some((block, constants))) = (attrs.get("name"), self.enums.as_ref()) else {
            return;
        };
        let mut entity = if *constants {
            let mut e = Entity::new(name, Category::Constant);
            e.c_type = attrs.get("type").cloned();
            e
        } else {
            Entity::new(name, Category::EnumValue).parent(block.clone())
        };
        entity.alias = attrs.get("alias").cloned();
        self.builder.add_entity(entity);
    }

    /// A `<type>`, `<enum>` or `<command>` inside a `<require>` block.
    fn required(&mut self, kind: &str, attrs: &HashMap<String, String>) {
        let (Some(name), Some(provider)) = (attrs.get("name"), self.provider.as_ref()) else {
            return;
        };

        let condition = match self.require_depends.as_deref() {
            Some(dep) if is_simple_dependency(dep) => format!("{provider}+{dep}"),
            _ => provider.clone(),
        };

        if kind == "enum" {
            if let Some(parent) = attrs.get("extends") {
                let mut entity = Entity::new(name, Category::EnumValue).parent(parent.clone());
                entity.alias = attrs.get("alias").cloned();
                self.builder.add_entity(entity);
            } else if !self.builder.has_entity(name) {
                // <enum value="1" name="VK_KHR_FOO_SPEC_VERSION"/>
                let mut entity = Entity::new(name, Category::Constant);
                entity.c_type = attrs.get("type").cloned();
                entity.alias = attrs.get("alias").cloned();
                self.builder.add_entity(entity);
            }
        }

        self.builder.add_availability(name, &condition);
    }
}

/// `VK_VERSION_1_1` or `VK_KHR_a+VK_KHR_b`; not `(A,B)+C`.
fn is_simple_dependency(dep: &str) -> bool {
    !dep.is_empty() && !dep.contains([',', '(', ')'])
}
