//! Compounds: ordered records of attributes instantiated from a type's field descriptors.
//!
//! The attribute map is kept in wire order. Which fields are present depends on the file version,
//! the user version and the field conditions, so the filtered field list is recomputed on every
//! read, write and size computation instead of being cached.

use crate::array::{Array, Element, ElementType, Shape};
use crate::basic::{BasicValue, Value};
use crate::context::Context;
use crate::error::{DataError, Result, SchemaError};
use crate::expression::{ExprValue, Scope};
use crate::graph::Link;
use crate::registry::{name_attribute, FieldDescriptor, Registry, TypeId, TypeKind, TypeRef};
use linked_hash_map::LinkedHashMap;
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::trace;

/// One materialised attribute of a compound.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Basic(BasicValue),
    Compound(Box<Compound>),
    Array(Array),
}

impl From<Element> for Attribute {
    fn from(element: Element) -> Self {
        match element {
            Element::Basic(v) => Attribute::Basic(v),
            Element::Compound(c) => Attribute::Compound(Box::new(c)),
        }
    }
}

/// Which kinds of values a compound type can contain, copied from the registry so traversals
/// can skip whole subtrees.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contents {
    links: bool,
    refs: bool,
    strings: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Need {
    Links,
    Refs,
    Strings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    ty: TypeId,
    type_name: Arc<str>,
    template: Option<TypeId>,
    argument: Option<i64>,
    contents: Contents,
    attributes: LinkedHashMap<String, Attribute>,
}

struct AttributeScope<'a, 'r> {
    compound: &'a Compound,
    ctx: &'a Context<'r>,
    argument: Option<i64>,
}

impl Scope for AttributeScope<'_, '_> {
    fn lookup(&self, path: &[String]) -> Result<ExprValue> {
        self.compound.lookup(path, self.ctx, self.argument)
    }
}

fn no_such(type_name: &str, attribute: &str) -> crate::Error {
    DataError::NoSuchAttribute {
        type_name: type_name.to_string(),
        attribute: attribute.to_string(),
    }
    .into()
}

fn wrong_kind(attribute: &str, expected: &str) -> crate::Error {
    DataError::WrongAttributeKind {
        attribute: attribute.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

/// Gives kept compounds the argument their field now evaluates to.
fn rebind(attribute: &mut Attribute, argument: Option<i64>) {
    match attribute {
        Attribute::Compound(c) => c.argument = argument,
        Attribute::Array(a) => {
            for element in a.elements_mut() {
                if let Element::Compound(c) = element {
                    c.argument = argument;
                }
            }
        }
        Attribute::Basic(_) => {}
    }
}

fn to_len(name: &str, n: i64) -> Result<usize> {
    usize::try_from(n).map_err(|_| {
        DataError::NegativeLength {
            name: name.to_string(),
            len: n,
        }
        .into()
    })
}

impl Compound {
    /// Constructs a compound with every active attribute set to its default.
    pub fn new(
        ctx: &Context<'_>,
        ty: TypeId,
        template: Option<TypeId>,
        argument: Option<i64>,
    ) -> Result<Self> {
        let mut compound = Compound::blank(ctx, ty, template, argument)?;
        compound.materialise(ctx, false)?;
        Ok(compound)
    }

    pub fn by_name(ctx: &Context<'_>, type_name: &str) -> Result<Self> {
        let ty = ctx.registry.type_id(type_name)?;
        Compound::new(ctx, ty, None, None)
    }

    /// A compound without attributes, ready to be read.
    pub(crate) fn blank(
        ctx: &Context<'_>,
        ty: TypeId,
        template: Option<TypeId>,
        argument: Option<i64>,
    ) -> Result<Self> {
        let def = ctx.registry.compound(ty)?;
        let type_name = ctx.registry.type_def(ty).name.clone();
        if def.is_abstract {
            return Err(SchemaError::AbstractType(type_name.to_string()).into());
        }
        Ok(Compound {
            ty,
            type_name,
            template,
            argument,
            contents: Contents {
                links: def.has_links,
                refs: def.has_refs,
                strings: def.has_strings,
            },
            attributes: LinkedHashMap::new(),
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn template(&self) -> Option<TypeId> {
        self.template
    }

    pub fn argument(&self) -> Option<i64> {
        self.argument
    }

    /// Every attribute name of the type, inherited ones first, whether present or not.
    pub fn attribute_names<'r>(&self, registry: &'r Registry) -> Vec<&'r str> {
        registry.attribute_names(self.ty)
    }

    /// The attributes that are currently materialised, in wire order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .get(name)
            .or_else(|| self.attributes.get(&name_attribute(name)))
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        let key = if self.attributes.contains_key(name) {
            name.to_string()
        } else {
            name_attribute(name)
        };
        self.attributes.get_mut(&key)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn basic(&self, name: &str) -> Result<&BasicValue> {
        match self.attribute(name) {
            Some(Attribute::Basic(v)) => Ok(v),
            Some(_) => Err(wrong_kind(name, "basic value")),
            None => Err(no_such(&self.type_name, name)),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.basic(name)?.get_value()
    }

    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<()> {
        let type_name = self.type_name.clone();
        match self.attribute_mut(name) {
            Some(Attribute::Basic(v)) => v.set_value(value),
            Some(_) => Err(wrong_kind(name, "basic value")),
            None => Err(no_such(&type_name, name)),
        }
    }

    pub fn compound(&self, name: &str) -> Result<&Compound> {
        match self.attribute(name) {
            Some(Attribute::Compound(c)) => Ok(c),
            Some(_) => Err(wrong_kind(name, "compound")),
            None => Err(no_such(&self.type_name, name)),
        }
    }

    pub fn compound_mut(&mut self, name: &str) -> Result<&mut Compound> {
        let type_name = self.type_name.clone();
        match self.attribute_mut(name) {
            Some(Attribute::Compound(c)) => Ok(c),
            Some(_) => Err(wrong_kind(name, "compound")),
            None => Err(no_such(&type_name, name)),
        }
    }

    pub fn array(&self, name: &str) -> Result<&Array> {
        match self.attribute(name) {
            Some(Attribute::Array(a)) => Ok(a),
            Some(_) => Err(wrong_kind(name, "array")),
            None => Err(no_such(&self.type_name, name)),
        }
    }

    pub fn array_mut(&mut self, name: &str) -> Result<&mut Array> {
        let type_name = self.type_name.clone();
        match self.attribute_mut(name) {
            Some(Attribute::Array(a)) => Ok(a),
            Some(_) => Err(wrong_kind(name, "array")),
            None => Err(no_such(&type_name, name)),
        }
    }

    fn scope<'a, 'r>(&'a self, ctx: &'a Context<'r>, argument: Option<i64>) -> AttributeScope<'a, 'r> {
        AttributeScope {
            compound: self,
            ctx,
            argument,
        }
    }

    /// Resolves an identifier of an expression evaluated against this compound.
    fn lookup(&self, path: &[String], ctx: &Context<'_>, argument: Option<i64>) -> Result<ExprValue> {
        let unknown = || -> crate::Error { SchemaError::UnknownIdentifier(path.join(".")).into() };
        let mismatch = || -> crate::Error {
            SchemaError::TypeMismatch(format!("'{}' cannot be used in an expression", path.join(".")))
                .into()
        };
        let (head, rest) = path.split_first().ok_or_else(unknown)?;

        match (self.attributes.get(head), rest.is_empty()) {
            (Some(Attribute::Basic(v)), true) => v.expr_value().ok_or_else(mismatch),
            (Some(Attribute::Array(a)), true) => a.expr_value().ok_or_else(mismatch),
            (Some(Attribute::Compound(c)), false) => c.lookup(rest, ctx, c.argument),
            (Some(_), _) => Err(mismatch()),
            (None, _) => {
                if head == "arg" && rest.is_empty() {
                    return Ok(ExprValue::Int(argument.unwrap_or(0)));
                }
                let def = ctx.registry.compound(self.ty)?;
                if let Some(field) = def.fields.iter().find(|f| &f.name == head) {
                    // absent in this version or skipped by a condition
                    if field.is_array() {
                        return Ok(ExprValue::Seq(Vec::new()));
                    }
                    return match self.default_basic(ctx, field)? {
                        Some(value) if rest.is_empty() => value.expr_value().ok_or_else(mismatch),
                        Some(_) => Err(mismatch()),
                        None => Ok(ExprValue::Int(0)),
                    };
                }
                match (head.as_str(), rest.is_empty()) {
                    ("version", true) => Ok(ExprValue::Int(i64::from(ctx.version))),
                    ("user_version", true) => Ok(ExprValue::Int(i64::from(ctx.user_version))),
                    _ => Err(unknown()),
                }
            }
        }
    }

    /// The value a basic field would take on construction, without materialising it.
    fn default_basic(&self, ctx: &Context<'_>, field: &FieldDescriptor) -> Result<Option<BasicValue>> {
        let ty = match field.ty {
            TypeRef::Concrete(id) => id,
            TypeRef::Template => match self.template {
                Some(id) => id,
                None => return Ok(None),
            },
        };
        let mut value = match &ctx.registry.type_def(ty).kind {
            TypeKind::Basic(kind) if !kind.is_link() => BasicValue::new(*kind),
            TypeKind::Enum(def) => BasicValue::enumeration(def.clone()),
            _ => return Ok(None),
        };
        if let Some(default) = &field.default {
            value.apply_default(&field.name, default)?;
        }
        Ok(Some(value))
    }

    fn is_active(&self, field: &FieldDescriptor, ctx: &Context<'_>, argument: Option<i64>) -> Result<bool> {
        if !field.applies_to(ctx.version, ctx.user_version) {
            return Ok(false);
        }
        match &field.condition {
            Some(condition) => condition.eval_bool(&self.scope(ctx, argument)),
            None => Ok(true),
        }
    }

    /// Fields present for the current version and attribute values, first declaration of a name
    /// winning.
    fn active_fields<'r>(
        &self,
        ctx: &Context<'r>,
        argument: Option<i64>,
    ) -> Result<Vec<&'r FieldDescriptor>> {
        let registry: &'r Registry = ctx.registry;
        let def = registry.compound(self.ty)?;
        let mut seen = HashSet::new();
        let mut active = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            if seen.contains(field.name.as_str()) || !self.is_active(field, ctx, argument)? {
                continue;
            }
            seen.insert(field.name.as_str());
            active.push(field);
        }
        Ok(active)
    }

    fn element_type(
        &self,
        ctx: &Context<'_>,
        field: &FieldDescriptor,
        argument: Option<i64>,
    ) -> Result<ElementType> {
        let ty = match field.ty {
            TypeRef::Concrete(id) => id,
            TypeRef::Template => self.template.ok_or_else(|| SchemaError::UnresolvedTemplate {
                type_name: self.type_name.to_string(),
                attribute: field.name.clone(),
            })?,
        };
        let template = match field.template {
            None => None,
            Some(TypeRef::Concrete(id)) => Some(id),
            Some(TypeRef::Template) => self.template,
        };
        Ok(ElementType {
            ty,
            template,
            argument: self.element_argument(ctx, field, argument)?,
        })
    }

    fn element_argument(
        &self,
        ctx: &Context<'_>,
        field: &FieldDescriptor,
        argument: Option<i64>,
    ) -> Result<Option<i64>> {
        field
            .argument
            .as_ref()
            .map(|e| e.eval_int(&self.scope(ctx, argument)))
            .transpose()
    }

    /// Evaluates the declared lengths of an array field.
    fn shape(&self, ctx: &Context<'_>, field: &FieldDescriptor, argument: Option<i64>) -> Result<Shape> {
        let length = field
            .length1
            .as_ref()
            .ok_or_else(|| wrong_kind(&field.name, "array"))?;
        let scope = self.scope(ctx, argument);
        let rows = to_len(&field.name, length.eval_int(&scope)?)?;
        if rows > ctx.limits.max_array_len {
            return Err(DataError::ArrayTooLong {
                name: field.name.clone(),
                len: rows,
                max: ctx.limits.max_array_len,
            }
            .into());
        }

        let width = match &field.length2 {
            None => return Ok(Shape::Flat(rows)),
            Some(width) => width.eval(&scope)?,
        };
        let widths = match width {
            ExprValue::Seq(per_row) => (0..rows)
                .map(|row| {
                    let n = per_row.get(row).copied().ok_or_else(|| {
                        crate::Error::from(DataError::MissingRowLength {
                            name: field.name.clone(),
                            row,
                        })
                    })?;
                    to_len(&field.name, n)
                })
                .collect::<Result<Vec<_>>>()?,
            ExprValue::Int(n) => vec![to_len(&field.name, n)?; rows],
            ExprValue::Bool(b) => vec![usize::from(b); rows],
        };
        Ok(Shape::Jagged(widths))
    }

    /// Builds the default attribute for `field`.
    fn instantiate(&self, ctx: &Context<'_>, field: &FieldDescriptor) -> Result<Attribute> {
        let element = self.element_type(ctx, field, self.argument)?;
        if field.is_array() {
            let shape = self.shape(ctx, field, self.argument)?;
            return Ok(Attribute::Array(Array::new(ctx, &field.name, element, &shape)?));
        }
        let mut attribute = Attribute::from(Element::new(ctx, &element)?);
        if let (Some(default), Attribute::Basic(v)) = (&field.default, &mut attribute) {
            v.apply_default(&field.name, default)?;
        }
        Ok(attribute)
    }

    /// Whether an existing attribute can stand for `field` after a refresh.
    fn fits(&self, ctx: &Context<'_>, field: &FieldDescriptor, attribute: &Attribute) -> Result<bool> {
        let element = self.element_type(ctx, field, self.argument)?;
        Ok(match attribute {
            Attribute::Array(a) => {
                field.is_array()
                    && a.element_type().ty == element.ty
                    && a.is_jagged() == field.length2.is_some()
            }
            Attribute::Compound(c) => !field.is_array() && c.ty == element.ty,
            Attribute::Basic(v) => {
                !field.is_array()
                    && match &ctx.registry.type_def(element.ty).kind {
                        TypeKind::Basic(kind) => v.kind() == *kind && v.enum_type().is_none(),
                        TypeKind::Enum(def) => v.enum_type().map_or(false, |e| e.name == def.name),
                        TypeKind::Compound(_) => false,
                    }
            }
        })
    }

    fn materialise(&mut self, ctx: &Context<'_>, keep_existing: bool) -> Result<()> {
        let registry: &Registry = ctx.registry;
        let def = registry.compound(self.ty)?;
        let mut previous = std::mem::replace(&mut self.attributes, LinkedHashMap::new());
        let mut seen = HashSet::new();
        for field in &def.fields {
            if seen.contains(field.name.as_str()) || !self.is_active(field, ctx, self.argument)? {
                continue;
            }
            seen.insert(field.name.as_str());
            let attribute = match previous.remove(&field.name) {
                Some(mut existing) if keep_existing && self.fits(ctx, field, &existing)? => {
                    let argument = self.element_argument(ctx, field, self.argument)?;
                    rebind(&mut existing, argument);
                    existing
                }
                _ => self.instantiate(ctx, field)?,
            };
            self.attributes.insert(field.name.clone(), attribute);
        }
        Ok(())
    }

    /// Resizes the array `name` to match its length expressions.
    ///
    /// Must be called after changing a value an array length depends on. Truncation drops
    /// elements without touching links that point at them.
    pub fn update_size(&mut self, ctx: &Context<'_>, name: &str) -> Result<()> {
        let key = if self.attributes.contains_key(name) {
            name.to_string()
        } else {
            name_attribute(name)
        };
        let field = self
            .active_fields(ctx, self.argument)?
            .into_iter()
            .find(|f| f.name == key)
            .ok_or_else(|| no_such(&self.type_name, name))?;
        let shape = self.shape(ctx, field, self.argument)?;
        match self.attributes.get_mut(&key) {
            Some(Attribute::Array(a)) => a.resize(ctx, &shape),
            Some(_) => Err(wrong_kind(&key, "array")),
            None => Err(DataError::MissingAttribute(key).into()),
        }
    }

    /// Resizes every array of this compound, in declaration order.
    pub fn update_sizes(&mut self, ctx: &Context<'_>) -> Result<()> {
        for field in self.active_fields(ctx, self.argument)? {
            if !field.is_array() {
                continue;
            }
            let shape = self.shape(ctx, field, self.argument)?;
            if let Some(Attribute::Array(a)) = self.attributes.get_mut(&field.name) {
                a.resize(ctx, &shape)?;
            }
        }
        Ok(())
    }

    /// Re-materialises the attribute set after the version or a condition changed.
    ///
    /// Attributes that are still present keep their values, new ones get defaults, and every
    /// array is resized. Nested compounds are refreshed too.
    pub fn refresh(&mut self, ctx: &Context<'_>) -> Result<()> {
        self.materialise(ctx, true)?;
        for attribute in self.attributes.iter_mut().map(|(_, v)| v) {
            match attribute {
                Attribute::Compound(c) => c.refresh(ctx)?,
                Attribute::Array(a) => {
                    for element in a.elements_mut() {
                        if let Element::Compound(c) = element {
                            c.refresh(ctx)?;
                        }
                    }
                }
                Attribute::Basic(_) => {}
            }
        }
        self.update_sizes(ctx)
    }

    /// Replaces every attribute with values read from `stream`, in wire order.
    pub fn read<R: Read>(&mut self, stream: &mut R, ctx: &Context<'_>) -> Result<()> {
        let registry: &Registry = ctx.registry;
        let def = registry.compound(self.ty)?;
        self.attributes = LinkedHashMap::new();
        let mut seen = HashSet::new();
        for field in &def.fields {
            if seen.contains(field.name.as_str()) || !self.is_active(field, ctx, self.argument)? {
                continue;
            }
            seen.insert(field.name.as_str());
            let attribute = if field.is_abstract {
                self.instantiate(ctx, field)?
            } else {
                self.read_field(stream, ctx, field)?
            };
            self.attributes.insert(field.name.clone(), attribute);
        }
        Ok(())
    }

    fn read_field<R: Read>(
        &self,
        stream: &mut R,
        ctx: &Context<'_>,
        field: &FieldDescriptor,
    ) -> Result<Attribute> {
        let element = self.element_type(ctx, field, self.argument)?;
        if field.is_array() {
            let shape = self.shape(ctx, field, self.argument)?;
            let mut array = Array::empty(&field.name, element, &shape);
            array.read(stream, ctx, &shape)?;
            return Ok(Attribute::Array(array));
        }
        let mut item = Element::blank(ctx, &element)?;
        item.read(stream, ctx)?;
        trace!(type_name = %self.type_name, attribute = %field.name, "read attribute");
        Ok(item.into())
    }

    pub fn write<W: Write>(&self, stream: &mut W, ctx: &Context<'_>) -> Result<()> {
        self.write_with(stream, ctx, self.argument)
    }

    pub(crate) fn write_with<W: Write>(
        &self,
        stream: &mut W,
        ctx: &Context<'_>,
        argument: Option<i64>,
    ) -> Result<()> {
        for field in self.active_fields(ctx, argument)? {
            if field.is_abstract {
                continue;
            }
            let attribute = self
                .attributes
                .get(&field.name)
                .ok_or_else(|| DataError::MissingAttribute(field.name.clone()))?;
            let element_argument = self.element_argument(ctx, field, argument)?;
            match (attribute, field.is_array()) {
                (Attribute::Basic(v), false) => v.write(stream, ctx)?,
                (Attribute::Compound(c), false) => {
                    c.write_with(stream, ctx, element_argument.or(c.argument))?
                }
                (Attribute::Array(a), true) => {
                    let shape = self.shape(ctx, field, argument)?;
                    a.write(stream, ctx, &shape, element_argument)?
                }
                (_, true) => return Err(wrong_kind(&field.name, "array")),
                (_, false) => return Err(wrong_kind(&field.name, "single value")),
            }
        }
        Ok(())
    }

    /// Bytes `write` would produce.
    pub fn get_size(&self, ctx: &Context<'_>) -> Result<usize> {
        self.size_with(ctx, self.argument)
    }

    pub(crate) fn size_with(&self, ctx: &Context<'_>, argument: Option<i64>) -> Result<usize> {
        let mut size = 0;
        for field in self.active_fields(ctx, argument)? {
            if field.is_abstract {
                continue;
            }
            let element_argument = self.element_argument(ctx, field, argument)?;
            size += match self.attributes.get(&field.name) {
                Some(Attribute::Basic(v)) => v.get_size(),
                Some(Attribute::Compound(c)) => {
                    c.size_with(ctx, element_argument.or(c.argument))?
                }
                Some(Attribute::Array(a)) => a.get_size(ctx, element_argument)?,
                None => return Err(DataError::MissingAttribute(field.name.clone()).into()),
            };
        }
        Ok(size)
    }

    fn wants(&self, need: Need) -> bool {
        match need {
            Need::Links => self.contents.links,
            Need::Refs => self.contents.refs,
            Need::Strings => self.contents.strings,
        }
    }

    /// Calls `f` on every basic value below this compound, skipping subtrees whose type cannot
    /// contain what is needed.
    pub(crate) fn walk<F: FnMut(&BasicValue)>(&self, need: Need, f: &mut F) {
        if !self.wants(need) {
            return;
        }
        for attribute in self.attributes.values() {
            match attribute {
                Attribute::Basic(v) => f(v),
                Attribute::Compound(c) => c.walk(need, f),
                Attribute::Array(a) => {
                    for element in a.elements() {
                        match element {
                            Element::Basic(v) => f(v),
                            Element::Compound(c) => c.walk(need, f),
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn walk_mut<F>(&mut self, need: Need, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut BasicValue) -> Result<()>,
    {
        if !self.wants(need) {
            return Ok(());
        }
        for attribute in self.attributes.iter_mut().map(|(_, v)| v) {
            match attribute {
                Attribute::Basic(v) => f(v)?,
                Attribute::Compound(c) => c.walk_mut(need, f)?,
                Attribute::Array(a) => {
                    for element in a.elements_mut() {
                        match element {
                            Element::Basic(v) => f(v)?,
                            Element::Compound(c) => c.walk_mut(need, f)?,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every `Ref` and `Ptr` below this compound, in wire order.
    pub fn get_links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        self.walk(Need::Links, &mut |v| {
            if let Some(link) = v.link_state() {
                links.push(link);
            }
        });
        links
    }

    /// Every `Ref` below this compound, in wire order.
    pub fn get_refs(&self) -> Vec<Link> {
        let mut refs = Vec::new();
        self.walk(Need::Refs, &mut |v| {
            if v.kind() == crate::basic::BasicKind::Ref {
                if let Some(link) = v.link_state() {
                    refs.push(link);
                }
            }
        });
        refs
    }

    /// Every string-table string below this compound, in wire order, repeats included.
    pub fn get_strings(&self) -> Vec<Vec<u8>> {
        let mut strings = Vec::new();
        self.walk(Need::Strings, &mut |v| {
            if let Some(s) = v.table_string() {
                strings.push(s.to_vec());
            }
        });
        strings
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<{}>", self.type_name)?;
        for (name, attribute) in &self.attributes {
            let text = match attribute {
                Attribute::Basic(v) => v.to_string(),
                Attribute::Compound(c) => c.to_string(),
                Attribute::Array(a) => a.to_string(),
            };
            if text.contains('\n') {
                writeln!(f, "* {} :", name)?;
                for line in text.lines() {
                    writeln!(f, "    {}", line)?;
                }
            } else {
                writeln!(f, "* {} : {}", name, text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing;
    use std::io::Cursor;

    fn round_trip(compound: &Compound, ctx: &Context<'_>) -> (Vec<u8>, Compound) {
        let mut out = Vec::new();
        compound.write(&mut out, ctx).unwrap();
        assert_eq!(compound.get_size(ctx).unwrap(), out.len());

        let mut back = Compound::blank(ctx, compound.type_id(), compound.template(), compound.argument())
            .unwrap();
        back.read(&mut Cursor::new(out.clone()), ctx).unwrap();
        (out, back)
    }

    #[test]
    fn count_governs_data() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut counted = Compound::by_name(&ctx, "Counted").unwrap();
        assert_eq!(counted.array("data").unwrap().len(), 0);

        counted.set("count", 5_u32).unwrap();
        counted.update_size(&ctx, "data").unwrap();
        let data = counted.array_mut("data").unwrap();
        assert_eq!(data.values().unwrap(), vec![Value::Int(0); 5]);
        data.set_values(vec![10_i16, 11, 12, 13, 14]).unwrap();

        counted.set("count", 3_u32).unwrap();
        counted.update_size(&ctx, "Data").unwrap();
        assert_eq!(
            counted.array("data").unwrap().values().unwrap(),
            vec![Value::Int(10), Value::Int(11), Value::Int(12)]
        );

        counted.array_mut("data").unwrap().push(&ctx).unwrap();
        let err = counted.write(&mut Vec::new(), &ctx).unwrap_err();
        assert!(matches!(
            err,
            Error::Data(DataError::SizeMismatch {
                expected: 3,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn wire_format_follows_field_order() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut counted = Compound::by_name(&ctx, "Counted").unwrap();
        counted.set("count", 2_u32).unwrap();
        counted.update_sizes(&ctx).unwrap();
        counted.array_mut("data").unwrap().set_values(vec![-1_i16, 2]).unwrap();

        let (bytes, back) = round_trip(&counted, &ctx);
        assert_eq!(bytes, vec![2, 0, 0, 0, 0xff, 0xff, 2, 0]);
        assert_eq!(back, counted);
    }

    #[test]
    fn jagged_rows_follow_their_own_length() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut jagged = Compound::by_name(&ctx, "Jagged").unwrap();
        jagged.set("num_rows", 3_u16).unwrap();
        jagged.update_size(&ctx, "row_lengths").unwrap();
        jagged
            .array_mut("row_lengths")
            .unwrap()
            .set_values(vec![1_u16, 2, 3])
            .unwrap();
        jagged.update_size(&ctx, "rows").unwrap();
        jagged.array_mut("rows").unwrap().set_value2(0, 0, 5_i16).unwrap();

        jagged.array_mut("row_lengths").unwrap().set_value(1, 4_u16).unwrap();
        jagged.update_size(&ctx, "rows").unwrap();
        let rows = jagged.array("rows").unwrap();
        assert_eq!(rows.shape(), Shape::Jagged(vec![1, 4, 3]));
        assert_eq!(rows.value2(0, 0).unwrap(), Value::Int(5));

        let (bytes, back) = round_trip(&jagged, &ctx);
        assert_eq!(bytes.len(), 2 + 3 * 2 + 8 * 2);
        assert_eq!(back, jagged);
    }

    #[test]
    fn uniform_second_dimension() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut grid = Compound::by_name(&ctx, "Grid").unwrap();
        grid.set("height", 2_u8).unwrap();
        grid.set("width", 3_u8).unwrap();
        grid.update_sizes(&ctx).unwrap();
        assert_eq!(grid.array("cells").unwrap().shape(), Shape::Jagged(vec![3, 3]));
        assert_eq!(grid.get_size(&ctx).unwrap(), 2 + 6);
    }

    #[test]
    fn missing_row_length() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut jagged = Compound::by_name(&ctx, "Jagged").unwrap();
        jagged.set("num_rows", 2_u16).unwrap();
        let err = jagged.update_size(&ctx, "rows").unwrap_err();
        assert!(matches!(
            err,
            Error::Data(DataError::MissingRowLength { row: 0, .. })
        ));
    }

    #[test]
    fn version_gating() {
        let registry = testing::registry();
        let new = testing::context(&registry);
        let old = Context::new(&registry, 0x0400_0002, 0);

        let gated = Compound::by_name(&new, "Gated").unwrap();
        assert!(gated.has_attribute("new"));
        assert!(!gated.has_attribute("old"));
        assert_eq!(gated.get_size(&new).unwrap(), 8);

        let mut gated = Compound::by_name(&old, "Gated").unwrap();
        assert!(gated.has_attribute("old"));
        assert!(!gated.has_attribute("new"));
        gated.set("old", 9_u32).unwrap();

        // same instance written for a newer file after a refresh
        gated.refresh(&new).unwrap();
        assert!(!gated.has_attribute("old"));
        assert_eq!(gated.get("new").unwrap(), Value::UInt(0));
        let (bytes, _) = round_trip(&gated, &new);
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn user_version_and_conditions() {
        let registry = testing::registry();
        let tagged = Context::new(&registry, testing::VERSION, 11);
        let mut gated = Compound::by_name(&tagged, "Gated").unwrap();
        assert!(gated.has_attribute("tagged"));
        assert!(!gated.has_attribute("extra"));

        gated.set("a", 2_u32).unwrap();
        // the condition is re-evaluated on write, so refresh before writing
        assert!(matches!(
            gated.write(&mut Vec::new(), &tagged).unwrap_err(),
            Error::Data(DataError::MissingAttribute(ref name)) if name == "extra"
        ));
        gated.refresh(&tagged).unwrap();
        gated.set("extra", 0.5_f32).unwrap();
        let (bytes, back) = round_trip(&gated, &tagged);
        assert_eq!(bytes.len(), 4 + 4 + 4 + 1);
        assert_eq!(back.get("extra").unwrap(), Value::Float(0.5));
    }

    #[test]
    fn abstract_fields_are_never_on_disk() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut gated = Compound::by_name(&ctx, "Gated").unwrap();
        gated.set("cache", 77_u32).unwrap();
        let (bytes, back) = round_trip(&gated, &ctx);
        assert_eq!(bytes.len(), 8);
        assert_eq!(back.get("cache").unwrap(), Value::UInt(0));
    }

    #[test]
    fn templates_resolve_through_nesting() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut animation = Compound::by_name(&ctx, "Animation").unwrap();

        let positions = animation.compound_mut("positions").unwrap();
        positions.set("num_keys", 2_u32).unwrap();
        positions.update_size(&ctx, "keys").unwrap();
        let key = positions.array_mut("keys").unwrap().compound_mut(1).unwrap();
        key.compound_mut("value").unwrap().set("z", 3.0_f32).unwrap();

        let rotations = animation.compound_mut("rotations").unwrap();
        rotations.set("num_keys", 1_u32).unwrap();
        rotations.update_size(&ctx, "keys").unwrap();
        let key = rotations.array_mut("keys").unwrap().compound_mut(0).unwrap();
        key.set("value", 0.25_f32).unwrap();

        // 4 + 1 * (4 + 4) + 4 + 2 * (4 + 12)
        assert_eq!(animation.get_size(&ctx).unwrap(), 48);
        let (_, back) = round_trip(&animation, &ctx);
        assert_eq!(back, animation);
    }

    #[test]
    fn template_compound_needs_a_template() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let err = Compound::by_name(&ctx, "Key").unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnresolvedTemplate { .. })
        ));
    }

    #[test]
    fn arguments_select_fields() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut chunk = Compound::by_name(&ctx, "Chunk").unwrap();
        assert!(!chunk.compound("payload").unwrap().has_attribute("small"));

        chunk.set("kind", 2_u8).unwrap();
        chunk.refresh(&ctx).unwrap();
        let payload = chunk.compound("payload").unwrap();
        assert!(payload.has_attribute("large"));
        assert!(!payload.has_attribute("small"));

        let mut out = Vec::new();
        chunk.write(&mut out, &ctx).unwrap();
        assert_eq!(out, vec![2, 0, 0, 0, 0]);

        let mut bytes = vec![2_u8];
        bytes.extend_from_slice(&7_u32.to_le_bytes());
        let mut back = Compound::by_name(&ctx, "Chunk").unwrap();
        back.read(&mut Cursor::new(bytes), &ctx).unwrap();
        let payload = back.compound("payload").unwrap();
        assert_eq!(payload.argument(), Some(2));
        assert_eq!(payload.get("large").unwrap(), Value::UInt(7));
    }

    #[test]
    fn defaults_and_enums() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let node = Compound::by_name(&ctx, "Node").unwrap();
        assert_eq!(node.get("scale").unwrap(), Value::Float(1.0));
        assert_eq!(node.basic("flags").unwrap().enum_option(), Some("HIDDEN"));
        assert_eq!(node.get("name").unwrap(), Value::None);
    }

    #[test]
    fn retired_fields_keep_their_defaults_in_conditions() {
        use crate::registry::{CompoundDef, FieldDef};
        let registry = Registry::builder()
            .with_builtin_basics()
            .compound(
                CompoundDef::new("Mesh")
                    .field(FieldDef::new("Has Normals", "bool8").default_value("true").until("4.0.0.0"))
                    .field(FieldDef::new("Flags", "uint16").default_value("0x10").until("4.0.0.0"))
                    .field(FieldDef::new("Normal", "float").condition("Has Normals"))
                    .field(FieldDef::new("Mask", "uint8").condition("Flags == 16")),
            )
            .build()
            .unwrap();

        for version in &[0x0300_0000, testing::VERSION] {
            let ctx = Context::new(&registry, *version, 0);
            let mesh = Compound::by_name(&ctx, "Mesh").unwrap();
            assert_eq!(mesh.has_attribute("has_normals"), *version == 0x0300_0000);
            assert!(mesh.has_attribute("normal"));
            assert!(mesh.has_attribute("mask"));
        }
    }

    #[test]
    fn attribute_access_errors() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut node = Compound::by_name(&ctx, "Node").unwrap();
        assert!(matches!(
            node.get("missing").unwrap_err(),
            Error::Data(DataError::NoSuchAttribute { .. })
        ));
        assert!(matches!(
            node.get("children").unwrap_err(),
            Error::Data(DataError::WrongAttributeKind { .. })
        ));
        assert!(node.set("Num Children", 1_u32).is_ok());
        assert!(node.array("translation").is_err());
        assert!(Compound::by_name(&ctx, "Object").is_err());
        assert!(Compound::by_name(&ctx, "uint8").is_err());
    }

    #[test]
    fn names_include_inherited_ones() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let leaf = Compound::by_name(&ctx, "Leaf").unwrap();
        assert_eq!(leaf.attribute_names(&registry), vec!["name", "value", "alpha"]);
        let present: Vec<&str> = leaf.attributes().map(|(n, _)| n).collect();
        assert_eq!(present, vec!["name", "value", "alpha"]);
    }

    #[test]
    fn strings_are_collected() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut leaf = Compound::by_name(&ctx, "Leaf").unwrap();
        assert!(leaf.get_strings().is_empty());
        leaf.set("name", "leaf").unwrap();
        assert_eq!(leaf.get_strings(), vec![b"leaf".to_vec()]);

        let mut ctx = testing::context(&registry);
        ctx.set_strings(vec![b"other".to_vec(), b"leaf".to_vec()]);
        let mut out = Vec::new();
        leaf.write(&mut out, &ctx).unwrap();
        assert_eq!(&out[..4], &1_i32.to_le_bytes());
    }

    #[test]
    fn negative_length_is_rejected() {
        let registry = Registry::builder()
            .with_builtin_basics()
            .compound(
                crate::registry::CompoundDef::new("Signed")
                    .field(crate::registry::FieldDef::new("n", "int8"))
                    .field(crate::registry::FieldDef::new("xs", "uint8").length("n")),
            )
            .build()
            .unwrap();
        let ctx = testing::context(&registry);
        let mut c = Compound::by_name(&ctx, "Signed").unwrap();
        c.set("n", -1_i8).unwrap();
        assert!(matches!(
            c.update_size(&ctx, "xs").unwrap_err(),
            Error::Data(DataError::NegativeLength { len: -1, .. })
        ));
    }

    #[test]
    fn display_lists_attributes() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut leaf = Compound::by_name(&ctx, "Leaf").unwrap();
        leaf.set("value", 7).unwrap();
        let text = leaf.to_string();
        assert!(text.starts_with("<Leaf>\n"));
        assert!(text.contains("* value : 7\n"));
        assert!(text.contains("* alpha : NONE\n"));

        let node = Compound::by_name(&ctx, "Node").unwrap();
        assert!(node.to_string().contains("* translation :\n    <Vector3>\n"));
    }
}
