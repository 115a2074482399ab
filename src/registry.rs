//! Schema registry: resolved type definitions, inheritance and per-type extensions.
//!
//! Schemas are declared with [`RegistryBuilder`] and validated once by
//! [`RegistryBuilder::build`]. Every problem the schema can have (unknown names, duplicate
//! attributes, bad expressions, inheritance cycles, bad defaults) is reported there, so a built
//! [`Registry`] is immutable and can be shared between threads processing independent files.

use crate::basic::{BasicKind, BasicValue};
use crate::context::Context;
use crate::error::{Result, SchemaError};
use crate::expression::Expression;
use crate::graph::{BlockId, Graph};
use crate::parsers::version::parse_version;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Type name standing for the enclosing compound's template parameter.
pub const TEMPLATE: &str = "TEMPLATE";

/// Normalises a schema name into an attribute identifier: `"Num Vertices"` becomes
/// `"num_vertices"`.
pub fn name_attribute(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Converts `"a.b.c.d"` into `(a << 24) | (b << 16) | (c << 8) | d`.
pub fn version_number(version: &str) -> std::result::Result<u32, SchemaError> {
    parse_version(version).map_err(|_| SchemaError::MalformedVersion(version.to_string()))
}

/// Handle of a type inside one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Concrete(TypeId),
    /// Resolved from the enclosing compound's template argument.
    Template,
}

/// Declaration of one attribute, as handed to the builder.
#[derive(Debug, Clone, Default)]
pub struct FieldDef {
    name: String,
    type_name: String,
    template: Option<String>,
    argument: Option<String>,
    length: Option<String>,
    width: Option<String>,
    condition: Option<String>,
    since: Option<String>,
    until: Option<String>,
    user_version: Option<u32>,
    default: Option<String>,
    is_abstract: bool,
}

impl FieldDef {
    pub fn new(name: &str, type_name: &str) -> Self {
        FieldDef {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ..FieldDef::default()
        }
    }

    pub fn template(mut self, type_name: &str) -> Self {
        self.template = Some(type_name.to_string());
        self
    }

    pub fn arg(mut self, expression: &str) -> Self {
        self.argument = Some(expression.to_string());
        self
    }

    pub fn length(mut self, expression: &str) -> Self {
        self.length = Some(expression.to_string());
        self
    }

    /// Second dimension. Evaluating to an array gives one length per row.
    pub fn width(mut self, expression: &str) -> Self {
        self.width = Some(expression.to_string());
        self
    }

    pub fn condition(mut self, expression: &str) -> Self {
        self.condition = Some(expression.to_string());
        self
    }

    pub fn since(mut self, version: &str) -> Self {
        self.since = Some(version.to_string());
        self
    }

    pub fn until(mut self, version: &str) -> Self {
        self.until = Some(version.to_string());
        self
    }

    pub fn user_version(mut self, user_version: u32) -> Self {
        self.user_version = Some(user_version);
        self
    }

    pub fn default_value(mut self, text: &str) -> Self {
        self.default = Some(text.to_string());
        self
    }

    /// Materialised in memory but never read or written.
    pub fn abstract_field(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// Resolved, immutable metadata of one attribute.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub template: Option<TypeRef>,
    pub argument: Option<Expression>,
    pub length1: Option<Expression>,
    pub length2: Option<Expression>,
    pub condition: Option<Expression>,
    pub version_min: Option<u32>,
    pub version_max: Option<u32>,
    pub user_version: Option<u32>,
    pub default: Option<String>,
    pub is_abstract: bool,
}

impl FieldDescriptor {
    pub fn applies_to(&self, version: u32, user_version: u32) -> bool {
        self.version_min.map_or(true, |min| version >= min)
            && self.version_max.map_or(true, |max| version <= max)
            && self.user_version.map_or(true, |u| u == user_version)
    }

    pub fn is_array(&self) -> bool {
        self.length1.is_some()
    }

    fn expressions(&self) -> impl Iterator<Item = &Expression> {
        vec![
            self.argument.as_ref(),
            self.length1.as_ref(),
            self.length2.as_ref(),
            self.condition.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Declaration of an enumeration over an integer storage type.
#[derive(Debug, Clone)]
pub struct EnumDef {
    name: String,
    storage: String,
    options: Vec<(String, i64)>,
    allow_raw: bool,
}

impl EnumDef {
    pub fn new(name: &str, storage: &str) -> Self {
        EnumDef {
            name: name.to_string(),
            storage: storage.to_string(),
            options: Vec::new(),
            allow_raw: false,
        }
    }

    pub fn option(mut self, name: &str, value: i64) -> Self {
        self.options.push((name.to_string(), value));
        self
    }

    /// Accept values that match no named option.
    pub fn allow_raw(mut self) -> Self {
        self.allow_raw = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub storage: BasicKind,
    pub options: Vec<(String, i64)>,
    pub allow_raw: bool,
}

impl EnumType {
    pub fn option_value(&self, name: &[u8]) -> Option<i64> {
        self.options
            .iter()
            .find(|(n, _)| n.as_bytes() == name)
            .map(|(_, v)| *v)
    }

    pub fn option_name(&self, value: i128) -> Option<&str> {
        self.options
            .iter()
            .find(|(_, v)| i128::from(*v) == value)
            .map(|(n, _)| n.as_str())
    }
}

/// Declaration of a compound or block type.
#[derive(Debug, Clone)]
pub struct CompoundDef {
    name: String,
    base: Option<String>,
    fields: Vec<FieldDef>,
    is_template: bool,
    is_block: bool,
    is_abstract: bool,
}

impl CompoundDef {
    pub fn new(name: &str) -> Self {
        CompoundDef {
            name: name.to_string(),
            base: None,
            fields: Vec::new(),
            is_template: false,
            is_block: false,
            is_abstract: false,
        }
    }

    /// A compound that can live in a file's block graph.
    pub fn block(name: &str) -> Self {
        CompoundDef {
            is_block: true,
            ..CompoundDef::new(name)
        }
    }

    pub fn inherit(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn template(mut self) -> Self {
        self.is_template = true;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompoundType {
    pub base: Option<TypeId>,
    /// Effective attribute list: inherited fields first, in wire order.
    pub fields: Vec<FieldDescriptor>,
    own_start: usize,
    pub is_template: bool,
    pub is_block: bool,
    pub is_abstract: bool,
    /// Contains a `Ref` or `Ptr` somewhere below.
    pub has_links: bool,
    /// Contains a `Ref` somewhere below.
    pub has_refs: bool,
    /// Contains a string-table index somewhere below.
    pub has_strings: bool,
}

impl CompoundType {
    pub fn own_fields(&self) -> &[FieldDescriptor] {
        &self.fields[self.own_start..]
    }

    pub fn inherited_fields(&self) -> &[FieldDescriptor] {
        &self.fields[..self.own_start]
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Basic(BasicKind),
    Enum(Arc<EnumType>),
    Compound(CompoundType),
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: Arc<str>,
    pub kind: TypeKind,
}

/// Per-type business logic attached to generic blocks.
pub type CustomFn = fn(&mut Graph, BlockId, &Context<'_>) -> Result<()>;

#[derive(Clone, Default)]
struct Extensions {
    functions: HashMap<String, CustomFn>,
    children_first: bool,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("children_first", &self.children_first)
            .finish()
    }
}

/// Built-in basic type names.
pub fn builtin_basics() -> Vec<(&'static str, BasicKind)> {
    vec![
        ("int8", BasicKind::Int8),
        ("uint8", BasicKind::UInt8),
        ("int16", BasicKind::Int16),
        ("uint16", BasicKind::UInt16),
        ("int32", BasicKind::Int32),
        ("uint32", BasicKind::UInt32),
        ("int64", BasicKind::Int64),
        ("uint64", BasicKind::UInt64),
        ("float", BasicKind::Float32),
        ("bool8", BasicKind::Bool8),
        ("bool32", BasicKind::Bool32),
        ("zstring", BasicKind::ZString),
        ("sizedstring", BasicKind::SizedString),
        ("string", BasicKind::StringIndex),
        ("undecoded", BasicKind::Undecoded),
        ("Ref", BasicKind::Ref),
        ("Ptr", BasicKind::Ptr),
    ]
}

#[derive(Default)]
pub struct RegistryBuilder {
    basics: Vec<(String, BasicKind)>,
    enums: Vec<EnumDef>,
    compounds: Vec<CompoundDef>,
    functions: Vec<(String, String, CustomFn)>,
    children_first: Vec<String>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("basics", &self.basics)
            .field("enums", &self.enums)
            .field("compounds", &self.compounds)
            .field("children_first", &self.children_first)
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    pub fn with_builtin_basics(mut self) -> Self {
        for (name, kind) in builtin_basics() {
            self.basics.push((name.to_string(), kind));
        }
        self
    }

    pub fn basic(mut self, name: &str, kind: BasicKind) -> Self {
        self.basics.push((name.to_string(), kind));
        self
    }

    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    pub fn compound(mut self, def: CompoundDef) -> Self {
        self.compounds.push(def);
        self
    }

    /// Registers `function` under `name` for `type_name` and its subtypes.
    pub fn custom_function(mut self, type_name: &str, name: &str, function: CustomFn) -> Self {
        self.functions
            .push((type_name.to_string(), name.to_string(), function));
        self
    }

    /// Blocks of this type (and subtypes) are written before the block referencing them.
    pub fn children_first(mut self, type_name: &str) -> Self {
        self.children_first.push(type_name.to_string());
        self
    }

    pub fn build(self) -> std::result::Result<Registry, SchemaError> {
        let mut by_name = HashMap::new();
        let declared = self
            .basics
            .iter()
            .map(|(name, _)| name)
            .chain(self.enums.iter().map(|e| &e.name))
            .chain(self.compounds.iter().map(|c| &c.name));
        for (i, name) in declared.enumerate() {
            if by_name.insert(name.clone(), TypeId(i)).is_some() {
                return Err(SchemaError::DuplicateType(name.clone()));
            }
        }

        let mut types: Vec<TypeDef> = self
            .basics
            .iter()
            .map(|(name, kind)| TypeDef {
                name: name.as_str().into(),
                kind: TypeKind::Basic(*kind),
            })
            .collect();
        for def in &self.enums {
            types.push(TypeDef {
                name: def.name.as_str().into(),
                kind: TypeKind::Enum(Arc::new(resolve_enum(def, &by_name, &types)?)),
            });
        }

        let first_compound = types.len();
        let compound_of = |name: &str| {
            by_name
                .get(name)
                .and_then(|id| id.0.checked_sub(first_compound))
        };

        let mut bases = Vec::with_capacity(self.compounds.len());
        for def in &self.compounds {
            bases.push(match &def.base {
                None => None,
                Some(base) => {
                    if !by_name.contains_key(base) {
                        return Err(SchemaError::UnresolvedBase {
                            type_name: def.name.clone(),
                            base: base.clone(),
                        });
                    }
                    Some(compound_of(base).ok_or_else(|| SchemaError::NotACompound(base.clone()))?)
                }
            });
        }
        for (i, def) in self.compounds.iter().enumerate() {
            let mut current = bases[i];
            let mut steps = 0;
            while let Some(base) = current {
                steps += 1;
                if steps > self.compounds.len() {
                    return Err(SchemaError::InheritanceCycle(def.name.clone()));
                }
                current = bases[base];
            }
        }

        let mut own = Vec::with_capacity(self.compounds.len());
        for def in &self.compounds {
            let mut seen = HashSet::new();
            let mut fields = Vec::with_capacity(def.fields.len());
            for field in &def.fields {
                let resolved = resolve_field(field, def, &by_name)?;
                if !seen.insert(resolved.name.clone()) {
                    return Err(SchemaError::DuplicateAttribute {
                        type_name: def.name.clone(),
                        attribute: resolved.name,
                    });
                }
                fields.push(resolved);
            }
            own.push(fields);
        }

        let mut effective = Vec::with_capacity(self.compounds.len());
        for i in 0..self.compounds.len() {
            let mut chain = vec![i];
            let mut current = bases[i];
            while let Some(base) = current {
                chain.push(base);
                current = bases[base];
            }
            let mut fields: Vec<FieldDescriptor> = Vec::new();
            let mut own_start = 0;
            for &c in chain.iter().rev() {
                own_start = fields.len();
                fields.extend(own[c].iter().cloned());
            }
            effective.push((fields, own_start));
        }

        let check = Checker {
            defs: &self.compounds,
            effective: &effective,
            types: &types,
            first_compound,
        };
        for i in 0..self.compounds.len() {
            check.fields(i)?;
        }

        let mut flags = FlagPass {
            check: &check,
            memo: vec![None; self.compounds.len()],
            visiting: vec![false; self.compounds.len()],
        };
        let mut computed = Vec::with_capacity(self.compounds.len());
        for i in 0..self.compounds.len() {
            computed.push(flags.of(i)?);
        }

        for (i, (def, (fields, own_start))) in
            self.compounds.iter().zip(effective).enumerate()
        {
            let f = computed[i];
            types.push(TypeDef {
                name: def.name.as_str().into(),
                kind: TypeKind::Compound(CompoundType {
                    base: bases[i].map(|b| TypeId(b + first_compound)),
                    fields,
                    own_start,
                    is_template: def.is_template,
                    is_block: def.is_block,
                    is_abstract: def.is_abstract,
                    has_links: f.links,
                    has_refs: f.refs,
                    has_strings: f.strings,
                }),
            });
        }

        let mut extensions: HashMap<TypeId, Extensions> = HashMap::new();
        for (type_name, name, function) in self.functions {
            let id = *by_name
                .get(&type_name)
                .ok_or_else(|| SchemaError::UnknownType(type_name.clone()))?;
            extensions
                .entry(id)
                .or_default()
                .functions
                .insert(name, function);
        }
        for type_name in self.children_first {
            let id = *by_name
                .get(&type_name)
                .ok_or_else(|| SchemaError::UnknownType(type_name.clone()))?;
            extensions.entry(id).or_default().children_first = true;
        }

        Ok(Registry {
            types,
            by_name,
            extensions,
        })
    }
}

fn resolve_enum(
    def: &EnumDef,
    by_name: &HashMap<String, TypeId>,
    types: &[TypeDef],
) -> std::result::Result<EnumType, SchemaError> {
    let invalid = || SchemaError::InvalidEnumStorage {
        name: def.name.clone(),
        storage: def.storage.clone(),
    };
    let storage = match by_name.get(&def.storage).and_then(|id| types.get(id.0)) {
        Some(TypeDef {
            kind: TypeKind::Basic(kind),
            ..
        }) if kind.is_integer() => *kind,
        _ => return Err(invalid()),
    };
    if let Some((min, max)) = storage.bounds() {
        for (option, value) in &def.options {
            let value = i128::from(*value);
            if value < min || value > max {
                return Err(SchemaError::InvalidDefault {
                    attribute: format!("{}.{}", def.name, option),
                    default: value.to_string(),
                });
            }
        }
    }
    Ok(EnumType {
        name: def.name.clone(),
        storage,
        options: def.options.clone(),
        allow_raw: def.allow_raw,
    })
}

fn resolve_field(
    field: &FieldDef,
    def: &CompoundDef,
    by_name: &HashMap<String, TypeId>,
) -> std::result::Result<FieldDescriptor, SchemaError> {
    let name = name_attribute(&field.name);
    let resolve_type = |type_name: &str| {
        if type_name == TEMPLATE {
            if def.is_template {
                Ok(TypeRef::Template)
            } else {
                Err(SchemaError::UnresolvedTemplate {
                    type_name: def.name.clone(),
                    attribute: name.clone(),
                })
            }
        } else {
            by_name
                .get(type_name)
                .copied()
                .map(TypeRef::Concrete)
                .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))
        }
    };
    let parse = |source: &Option<String>| source.as_deref().map(Expression::parse).transpose();
    let version = |v: &Option<String>| v.as_deref().map(version_number).transpose();

    let resolved = FieldDescriptor {
        ty: resolve_type(&field.type_name)?,
        template: field.template.as_deref().map(resolve_type).transpose()?,
        argument: parse(&field.argument)?,
        length1: parse(&field.length)?,
        length2: parse(&field.width)?,
        condition: parse(&field.condition)?,
        version_min: version(&field.since)?,
        version_max: version(&field.until)?,
        user_version: field.user_version,
        default: field.default.clone(),
        is_abstract: field.is_abstract,
        name,
    };
    if let (Some(width), None) = (&resolved.length2, &resolved.length1) {
        return Err(SchemaError::MalformedExpression {
            expression: width.source().to_string(),
            reason: "second array dimension without a first".to_string(),
        });
    }
    Ok(resolved)
}

const SPECIAL_IDENTIFIERS: [&str; 3] = ["arg", "version", "user_version"];

/// Cross-type validation once every compound's effective field list is known.
struct Checker<'a> {
    defs: &'a [CompoundDef],
    effective: &'a [(Vec<FieldDescriptor>, usize)],
    types: &'a [TypeDef],
    first_compound: usize,
}

impl Checker<'_> {
    fn compound_index(&self, ty: TypeRef) -> Option<usize> {
        match ty {
            TypeRef::Concrete(id) => id.0.checked_sub(self.first_compound),
            TypeRef::Template => None,
        }
    }

    fn fields(&self, i: usize) -> std::result::Result<(), SchemaError> {
        let def = &self.defs[i];
        let (fields, own_start) = &self.effective[i];
        for field in &fields[*own_start..] {
            for expression in field.expressions() {
                for path in expression.identifiers() {
                    self.path(i, path, expression)?;
                }
            }

            if let Some(c) = self.compound_index(field.ty) {
                let target = &self.defs[c];
                if target.is_abstract {
                    return Err(SchemaError::AbstractType(target.name.clone()));
                }
                if target.is_template && field.template.is_none() {
                    return Err(SchemaError::UnresolvedTemplate {
                        type_name: def.name.clone(),
                        attribute: field.name.clone(),
                    });
                }
            }

            if let Some(default) = &field.default {
                self.default(field, default)?;
            }
        }
        Ok(())
    }

    /// Checks that a dotted identifier names a field, following nested compounds from type `i`.
    fn path(
        &self,
        i: usize,
        path: &[String],
        expression: &Expression,
    ) -> std::result::Result<(), SchemaError> {
        let unknown = || SchemaError::UnknownIdentifier(path.join("."));
        let mut current = i;
        for (depth, head) in path.iter().enumerate() {
            let last = depth + 1 == path.len();
            let (fields, _) = &self.effective[current];
            let field = match fields.iter().find(|f| &f.name == head) {
                Some(field) => field,
                None if last && SPECIAL_IDENTIFIERS.contains(&head.as_str()) => {
                    return Ok(())
                }
                None => return Err(unknown()),
            };
            if last {
                return Ok(());
            }
            if field.is_array() {
                return Err(SchemaError::TypeMismatch(format!(
                    "'{}' in '{}' is an array",
                    head,
                    expression.source()
                )));
            }
            current = match (field.ty, self.compound_index(field.ty)) {
                (TypeRef::Template, _) => return Ok(()),
                (_, Some(c)) => c,
                _ => {
                    return Err(SchemaError::TypeMismatch(format!(
                        "'{}' in '{}' is not a compound",
                        head,
                        expression.source()
                    )))
                }
            };
        }
        Err(unknown())
    }

    fn default(
        &self,
        field: &FieldDescriptor,
        text: &str,
    ) -> std::result::Result<(), SchemaError> {
        let id = match field.ty {
            TypeRef::Concrete(id) => id,
            TypeRef::Template => return Ok(()),
        };
        let mut value = match self.types.get(id.0).map(|t| &t.kind) {
            Some(TypeKind::Basic(kind)) => BasicValue::new(*kind),
            Some(TypeKind::Enum(def)) => BasicValue::enumeration(def.clone()),
            _ => {
                return Err(SchemaError::InvalidDefault {
                    attribute: field.name.clone(),
                    default: text.to_string(),
                })
            }
        };
        value.apply_default(&field.name, text)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    links: bool,
    refs: bool,
    strings: bool,
}

impl Flags {
    const ALL: Flags = Flags {
        links: true,
        refs: true,
        strings: true,
    };

    fn union(self, other: Flags) -> Flags {
        Flags {
            links: self.links || other.links,
            refs: self.refs || other.refs,
            strings: self.strings || other.strings,
        }
    }
}

/// Computes type flags and rejects compounds that contain themselves.
struct FlagPass<'a, 'c> {
    check: &'c Checker<'a>,
    memo: Vec<Option<Flags>>,
    visiting: Vec<bool>,
}

impl FlagPass<'_, '_> {
    fn of(&mut self, i: usize) -> std::result::Result<Flags, SchemaError> {
        if let Some(flags) = self.memo[i] {
            return Ok(flags);
        }
        if self.visiting[i] {
            return Err(SchemaError::RecursiveCompound(
                self.check.defs[i].name.clone(),
            ));
        }
        self.visiting[i] = true;
        let mut flags = Flags::default();
        let check = self.check;
        for field in &check.effective[i].0 {
            flags = flags.union(self.type_flags(field.ty)?);
            // a link's template names its target, which is not contained
            let is_link = match field.ty {
                TypeRef::Concrete(id) => matches!(
                    check.types.get(id.0).map(|t| &t.kind),
                    Some(TypeKind::Basic(kind)) if kind.is_link()
                ),
                TypeRef::Template => false,
            };
            if let (Some(template), false) = (field.template, is_link) {
                flags = flags.union(self.type_flags(template)?);
            }
        }
        self.visiting[i] = false;
        self.memo[i] = Some(flags);
        Ok(flags)
    }

    fn type_flags(&mut self, ty: TypeRef) -> std::result::Result<Flags, SchemaError> {
        let id = match ty {
            TypeRef::Template => return Ok(Flags::ALL),
            TypeRef::Concrete(id) => id,
        };
        if let Some(c) = self.check.compound_index(ty) {
            return self.of(c);
        }
        Ok(match self.check.types.get(id.0).map(|t| &t.kind) {
            Some(TypeKind::Basic(BasicKind::Ref)) => Flags {
                links: true,
                refs: true,
                strings: false,
            },
            Some(TypeKind::Basic(BasicKind::Ptr)) => Flags {
                links: true,
                ..Flags::default()
            },
            Some(TypeKind::Basic(BasicKind::StringIndex)) => Flags {
                strings: true,
                ..Flags::default()
            },
            _ => Flags::default(),
        })
    }
}

/// Immutable set of resolved types.
#[derive(Debug)]
pub struct Registry {
    types: Vec<TypeDef>,
    by_name: HashMap<String, TypeId>,
    extensions: HashMap<TypeId, Extensions>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn type_id(&self, name: &str) -> std::result::Result<TypeId, SchemaError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Definition of a type. `id` must come from this registry.
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0]
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        &self.type_def(id).name
    }

    pub fn compound(&self, id: TypeId) -> std::result::Result<&CompoundType, SchemaError> {
        match &self.type_def(id).kind {
            TypeKind::Compound(c) => Ok(c),
            _ => Err(SchemaError::NotACompound(self.type_name(id).to_string())),
        }
    }

    pub fn enum_type(&self, name: &str) -> std::result::Result<Arc<EnumType>, SchemaError> {
        match &self.type_def(self.type_id(name)?).kind {
            TypeKind::Enum(def) => Ok(def.clone()),
            _ => Err(SchemaError::TypeMismatch(format!(
                "'{}' is not an enumeration",
                name
            ))),
        }
    }

    /// `ty` followed by its bases, nearest first.
    pub fn ancestors(&self, ty: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::successors(Some(ty), move |id| match &self.type_def(*id).kind {
            TypeKind::Compound(c) => c.base,
            _ => None,
        })
    }

    pub fn is_subtype(&self, ty: TypeId, ancestor: TypeId) -> bool {
        self.ancestors(ty).any(|id| id == ancestor)
    }

    /// Inherited names first, then the type's own, without repeats.
    pub fn attribute_names(&self, ty: TypeId) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        if let TypeKind::Compound(c) = &self.type_def(ty).kind {
            for field in &c.fields {
                if !names.contains(&field.name.as_str()) {
                    names.push(&field.name);
                }
            }
        }
        names
    }

    pub fn block_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(&t.kind, TypeKind::Compound(c) if c.is_block))
            .map(|(i, _)| TypeId(i))
    }

    /// Looks `name` up on `ty` and then along its bases.
    pub fn custom_function(&self, ty: TypeId, name: &str) -> Option<CustomFn> {
        self.ancestors(ty).find_map(|id| {
            self.extensions
                .get(&id)
                .and_then(|ext| ext.functions.get(name).copied())
        })
    }

    pub fn children_first(&self, ty: TypeId) -> bool {
        self.ancestors(ty).any(|id| {
            self.extensions
                .get(&id)
                .map_or(false, |ext| ext.children_first)
        })
    }
}
