//! Arrays whose lengths are expressions over the owning compound.
//!
//! An [`Array`] never stores its declared length. The owning compound evaluates the length
//! expressions into a [`Shape`] whenever it constructs, reads, writes or resizes the array, and the
//! array checks or adopts that shape.

use crate::basic::{BasicValue, Value};
use crate::compound::Compound;
use crate::context::Context;
use crate::error::{DataError, Result};
use crate::expression::ExprValue;
use crate::registry::{TypeId, TypeKind};
use std::fmt;
use std::io::{Read, Write};
use tracing::trace;

/// Number of elements shown by `Display` before the rest is elided.
const DISPLAY_LIMIT: usize = 16;

/// What each element of an array is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementType {
    pub ty: TypeId,
    pub template: Option<TypeId>,
    pub argument: Option<i64>,
}

/// Evaluated lengths of an array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Flat(usize),
    /// One length per row.
    Jagged(Vec<usize>),
}

/// One array element: a basic value or a whole compound.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Basic(BasicValue),
    Compound(Compound),
}

/// Read access to an element. Basic values are unwrapped, compounds are handed out as is.
#[derive(Debug)]
pub enum Item<'a> {
    Value(Value),
    Compound(&'a Compound),
}

impl<'a> Item<'a> {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Item::Value(v) => Some(v),
            Item::Compound(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&'a Compound> {
        match self {
            Item::Compound(c) => Some(c),
            Item::Value(_) => None,
        }
    }
}

impl Element {
    /// A default constructed element.
    pub(crate) fn new(ctx: &Context<'_>, element: &ElementType) -> Result<Self> {
        Ok(match &ctx.registry.type_def(element.ty).kind {
            TypeKind::Basic(kind) if kind.is_link() => {
                Element::Basic(BasicValue::link(*kind, element.template))
            }
            TypeKind::Basic(kind) => Element::Basic(BasicValue::new(*kind)),
            TypeKind::Enum(def) => Element::Basic(BasicValue::enumeration(def.clone())),
            TypeKind::Compound(_) => Element::Compound(Compound::new(
                ctx,
                element.ty,
                element.template,
                element.argument,
            )?),
        })
    }

    /// An element about to be read. Compounds start without attributes.
    pub(crate) fn blank(ctx: &Context<'_>, element: &ElementType) -> Result<Self> {
        match &ctx.registry.type_def(element.ty).kind {
            TypeKind::Compound(_) => Ok(Element::Compound(Compound::blank(
                ctx,
                element.ty,
                element.template,
                element.argument,
            )?)),
            _ => Element::new(ctx, element),
        }
    }

    pub(crate) fn read<R: Read>(&mut self, stream: &mut R, ctx: &Context<'_>) -> Result<()> {
        match self {
            Element::Basic(v) => v.read(stream, ctx),
            Element::Compound(c) => c.read(stream, ctx),
        }
    }

    pub(crate) fn write<W: Write>(
        &self,
        stream: &mut W,
        ctx: &Context<'_>,
        argument: Option<i64>,
    ) -> Result<()> {
        match self {
            Element::Basic(v) => v.write(stream, ctx),
            Element::Compound(c) => c.write_with(stream, ctx, argument.or(c.argument())),
        }
    }

    pub(crate) fn get_size(&self, ctx: &Context<'_>, argument: Option<i64>) -> Result<usize> {
        match self {
            Element::Basic(v) => Ok(v.get_size()),
            Element::Compound(c) => c.size_with(ctx, argument.or(c.argument())),
        }
    }

    pub fn item(&self) -> Result<Item<'_>> {
        match self {
            Element::Basic(v) => v.get_value().map(Item::Value),
            Element::Compound(c) => Ok(Item::Compound(c)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Rows {
    Flat(Vec<Element>),
    Jagged(Vec<Vec<Element>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    name: String,
    element: ElementType,
    rows: Rows,
}

fn check_len(name: &str, len: usize, ctx: &Context<'_>) -> Result<()> {
    if len > ctx.limits.max_array_len {
        return Err(DataError::ArrayTooLong {
            name: name.to_string(),
            len,
            max: ctx.limits.max_array_len,
        }
        .into());
    }
    Ok(())
}

fn kind_error(name: &str, expected: &str) -> crate::Error {
    DataError::WrongAttributeKind {
        attribute: name.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

fn check_count(name: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(DataError::SizeMismatch {
            name: name.to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn resize_row(
    items: &mut Vec<Element>,
    len: usize,
    ctx: &Context<'_>,
    element: &ElementType,
) -> Result<()> {
    items.truncate(len);
    while items.len() < len {
        items.push(Element::new(ctx, element)?);
    }
    Ok(())
}

fn read_row<R: Read>(
    stream: &mut R,
    ctx: &Context<'_>,
    element: &ElementType,
    len: usize,
) -> Result<Vec<Element>> {
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        let mut item = Element::blank(ctx, element)?;
        item.read(stream, ctx)?;
        items.push(item);
    }
    Ok(items)
}

impl Array {
    pub(crate) fn new(
        ctx: &Context<'_>,
        name: &str,
        element: ElementType,
        shape: &Shape,
    ) -> Result<Self> {
        let mut array = Array::empty(name, element, shape);
        array.resize(ctx, shape)?;
        Ok(array)
    }

    pub(crate) fn empty(name: &str, element: ElementType, shape: &Shape) -> Self {
        let rows = match shape {
            Shape::Flat(_) => Rows::Flat(Vec::new()),
            Shape::Jagged(_) => Rows::Jagged(Vec::new()),
        };
        Array {
            name: name.to_string(),
            element,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element
    }

    pub fn is_jagged(&self) -> bool {
        matches!(self.rows, Rows::Jagged(_))
    }

    /// Number of elements, or number of rows for a jagged array.
    pub fn len(&self) -> usize {
        match &self.rows {
            Rows::Flat(items) => items.len(),
            Rows::Jagged(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row_len(&self, row: usize) -> Option<usize> {
        match &self.rows {
            Rows::Flat(_) => None,
            Rows::Jagged(rows) => rows.get(row).map(Vec::len),
        }
    }

    /// Current shape, as opposed to the declared one.
    pub fn shape(&self) -> Shape {
        match &self.rows {
            Rows::Flat(items) => Shape::Flat(items.len()),
            Rows::Jagged(rows) => Shape::Jagged(rows.iter().map(Vec::len).collect()),
        }
    }

    /// All elements, row by row.
    pub fn elements(&self) -> Box<dyn Iterator<Item = &Element> + '_> {
        match &self.rows {
            Rows::Flat(items) => Box::new(items.iter()),
            Rows::Jagged(rows) => Box::new(rows.iter().flatten()),
        }
    }

    pub(crate) fn elements_mut(&mut self) -> Box<dyn Iterator<Item = &mut Element> + '_> {
        match &mut self.rows {
            Rows::Flat(items) => Box::new(items.iter_mut()),
            Rows::Jagged(rows) => Box::new(rows.iter_mut().flatten()),
        }
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> crate::Error {
        DataError::IndexOutOfBounds {
            name: self.name.clone(),
            index,
            len,
        }
        .into()
    }

    fn wrong_kind(&self, expected: &str) -> crate::Error {
        kind_error(&self.name, expected)
    }

    pub fn element(&self, index: usize) -> Result<&Element> {
        match &self.rows {
            Rows::Flat(items) => items
                .get(index)
                .ok_or_else(|| self.out_of_bounds(index, items.len())),
            Rows::Jagged(_) => Err(self.wrong_kind("flat array")),
        }
    }

    pub fn element_mut(&mut self, index: usize) -> Result<&mut Element> {
        let len = self.len();
        let error = match &self.rows {
            Rows::Flat(_) => self.out_of_bounds(index, len),
            Rows::Jagged(_) => self.wrong_kind("flat array"),
        };
        match &mut self.rows {
            Rows::Flat(items) => items.get_mut(index).ok_or(error),
            Rows::Jagged(_) => Err(error),
        }
    }

    pub fn element2(&self, row: usize, column: usize) -> Result<&Element> {
        match &self.rows {
            Rows::Jagged(rows) => {
                let items = rows
                    .get(row)
                    .ok_or_else(|| self.out_of_bounds(row, rows.len()))?;
                items
                    .get(column)
                    .ok_or_else(|| self.out_of_bounds(column, items.len()))
            }
            Rows::Flat(_) => Err(self.wrong_kind("jagged array")),
        }
    }

    pub fn element2_mut(&mut self, row: usize, column: usize) -> Result<&mut Element> {
        let (rows_len, row_len) = (self.len(), self.row_len(row));
        let error = match row_len {
            _ if !self.is_jagged() => self.wrong_kind("jagged array"),
            None => self.out_of_bounds(row, rows_len),
            Some(len) => self.out_of_bounds(column, len),
        };
        match &mut self.rows {
            Rows::Jagged(rows) => rows
                .get_mut(row)
                .and_then(|items| items.get_mut(column))
                .ok_or(error),
            Rows::Flat(_) => Err(error),
        }
    }

    pub fn get(&self, index: usize) -> Result<Item<'_>> {
        self.element(index)?.item()
    }

    pub fn get2(&self, row: usize, column: usize) -> Result<Item<'_>> {
        self.element2(row, column)?.item()
    }

    pub fn value(&self, index: usize) -> Result<Value> {
        match self.element(index)? {
            Element::Basic(v) => v.get_value(),
            Element::Compound(_) => Err(self.wrong_kind("array of basic values")),
        }
    }

    pub fn set_value<V: Into<Value>>(&mut self, index: usize, value: V) -> Result<()> {
        let error = self.wrong_kind("array of basic values");
        match self.element_mut(index)? {
            Element::Basic(v) => v.set_value(value),
            Element::Compound(_) => Err(error),
        }
    }

    pub fn value2(&self, row: usize, column: usize) -> Result<Value> {
        match self.element2(row, column)? {
            Element::Basic(v) => v.get_value(),
            Element::Compound(_) => Err(self.wrong_kind("array of basic values")),
        }
    }

    pub fn set_value2<V: Into<Value>>(&mut self, row: usize, column: usize, value: V) -> Result<()> {
        let error = self.wrong_kind("array of basic values");
        match self.element2_mut(row, column)? {
            Element::Basic(v) => v.set_value(value),
            Element::Compound(_) => Err(error),
        }
    }

    pub fn compound(&self, index: usize) -> Result<&Compound> {
        match self.element(index)? {
            Element::Compound(c) => Ok(c),
            Element::Basic(_) => Err(self.wrong_kind("array of compounds")),
        }
    }

    pub fn compound_mut(&mut self, index: usize) -> Result<&mut Compound> {
        let error = self.wrong_kind("array of compounds");
        match self.element_mut(index)? {
            Element::Compound(c) => Ok(c),
            Element::Basic(_) => Err(error),
        }
    }

    /// Every basic value, row by row.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.elements()
            .map(|e| match e {
                Element::Basic(v) => v.get_value(),
                Element::Compound(_) => Err(self.wrong_kind("array of basic values")),
            })
            .collect()
    }

    /// Assigns `values` to the leading elements of a flat array.
    pub fn set_values<V: Into<Value>, I: IntoIterator<Item = V>>(&mut self, values: I) -> Result<()> {
        for (i, value) in values.into_iter().enumerate() {
            self.set_value(i, value)?;
        }
        Ok(())
    }

    /// Appends a default element to a flat array without touching the governing count.
    pub fn push(&mut self, ctx: &Context<'_>) -> Result<&mut Element> {
        let element = Element::new(ctx, &self.element)?;
        let error = self.wrong_kind("flat array");
        match &mut self.rows {
            Rows::Flat(items) => {
                items.push(element);
                items.last_mut().ok_or(error)
            }
            Rows::Jagged(_) => Err(error),
        }
    }

    /// Grows or truncates to `shape`, keeping the elements at retained positions.
    pub(crate) fn resize(&mut self, ctx: &Context<'_>, shape: &Shape) -> Result<()> {
        match (&mut self.rows, shape) {
            (Rows::Flat(items), Shape::Flat(len)) => {
                check_len(&self.name, *len, ctx)?;
                resize_row(items, *len, ctx, &self.element)
            }
            (Rows::Jagged(rows), Shape::Jagged(widths)) => {
                check_len(&self.name, widths.len(), ctx)?;
                rows.truncate(widths.len());
                rows.resize_with(widths.len(), Vec::new);
                for (items, width) in rows.iter_mut().zip(widths) {
                    check_len(&self.name, *width, ctx)?;
                    resize_row(items, *width, ctx, &self.element)?;
                }
                Ok(())
            }
            (Rows::Flat(_), Shape::Jagged(_)) => Err(kind_error(&self.name, "flat array")),
            (Rows::Jagged(_), Shape::Flat(_)) => Err(kind_error(&self.name, "jagged array")),
        }
    }

    /// Replaces the contents with `shape` elements read from `stream`.
    pub(crate) fn read<R: Read>(
        &mut self,
        stream: &mut R,
        ctx: &Context<'_>,
        shape: &Shape,
    ) -> Result<()> {
        match shape {
            Shape::Flat(len) => check_len(&self.name, *len, ctx)?,
            Shape::Jagged(widths) => {
                check_len(&self.name, widths.len(), ctx)?;
                for width in widths {
                    check_len(&self.name, *width, ctx)?;
                }
            }
        }
        trace!(array = %self.name, ?shape, "reading array");

        self.rows = match shape {
            Shape::Flat(len) => Rows::Flat(read_row(stream, ctx, &self.element, *len)?),
            Shape::Jagged(widths) => {
                let mut rows = Vec::with_capacity(widths.len());
                for width in widths {
                    rows.push(read_row(stream, ctx, &self.element, *width)?);
                }
                Rows::Jagged(rows)
            }
        };
        Ok(())
    }

    /// Fails unless the current contents match `shape` exactly.
    pub(crate) fn check_shape(&self, ctx: &Context<'_>, shape: &Shape) -> Result<()> {
        match (&self.rows, shape) {
            (Rows::Flat(items), Shape::Flat(len)) => {
                check_len(&self.name, *len, ctx)?;
                check_count(&self.name, *len, items.len())
            }
            (Rows::Jagged(rows), Shape::Jagged(widths)) => {
                check_len(&self.name, widths.len(), ctx)?;
                check_count(&self.name, widths.len(), rows.len())?;
                for (i, (items, width)) in rows.iter().zip(widths).enumerate() {
                    check_len(&self.name, *width, ctx)?;
                    check_count(&format!("{}[{}]", self.name, i), *width, items.len())?;
                }
                Ok(())
            }
            (Rows::Flat(_), Shape::Jagged(_)) => Err(self.wrong_kind("flat array")),
            (Rows::Jagged(_), Shape::Flat(_)) => Err(self.wrong_kind("jagged array")),
        }
    }

    pub(crate) fn write<W: Write>(
        &self,
        stream: &mut W,
        ctx: &Context<'_>,
        shape: &Shape,
        argument: Option<i64>,
    ) -> Result<()> {
        self.check_shape(ctx, shape)?;
        for element in self.elements() {
            element.write(stream, ctx, argument)?;
        }
        Ok(())
    }

    pub(crate) fn get_size(&self, ctx: &Context<'_>, argument: Option<i64>) -> Result<usize> {
        self.elements()
            .map(|e| e.get_size(ctx, argument))
            .sum()
    }

    /// Integer contents as an expression value, for per-row lengths.
    pub(crate) fn expr_value(&self) -> Option<ExprValue> {
        let mut out = Vec::with_capacity(self.len());
        for element in self.elements() {
            match element {
                Element::Basic(v) => match v.expr_value()? {
                    ExprValue::Int(n) => out.push(n),
                    ExprValue::Bool(b) => out.push(i64::from(b)),
                    ExprValue::Seq(_) => return None,
                },
                Element::Compound(_) => return None,
            }
        }
        Some(ExprValue::Seq(out))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Basic(v) => write!(f, "{}", v),
            Element::Compound(c) => write!(f, "{}", c),
        }
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, label: &str, element: &Element) -> fmt::Result {
    let text = element.to_string();
    if text.contains('\n') {
        writeln!(f, "{}:", label)?;
        for line in text.lines() {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    } else {
        writeln!(f, "{}: {}", label, text)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = 0;
        match &self.rows {
            Rows::Flat(items) => {
                for (i, element) in items.iter().enumerate() {
                    if shown == DISPLAY_LIMIT {
                        return writeln!(f, "etc...");
                    }
                    write_entry(f, &i.to_string(), element)?;
                    shown += 1;
                }
            }
            Rows::Jagged(rows) => {
                for (i, items) in rows.iter().enumerate() {
                    for (j, element) in items.iter().enumerate() {
                        if shown == DISPLAY_LIMIT {
                            return writeln!(f, "etc...");
                        }
                        write_entry(f, &format!("{}, {}", i, j), element)?;
                        shown += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::BasicKind;
    use crate::error::Error;
    use crate::testing;
    use std::io::Cursor;

    fn int16(ctx: &Context<'_>) -> ElementType {
        ElementType {
            ty: ctx.registry.type_id("int16").unwrap(),
            template: None,
            argument: None,
        }
    }

    #[test]
    fn resize_keeps_retained_elements() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut array = Array::new(&ctx, "data", int16(&ctx), &Shape::Flat(3)).unwrap();
        array.set_values(vec![1_i16, 2, 3]).unwrap();

        array.resize(&ctx, &Shape::Flat(5)).unwrap();
        assert_eq!(
            array.values().unwrap(),
            vec![1_i16, 2, 3, 0, 0].into_iter().map(Value::from).collect::<Vec<_>>()
        );
        array.resize(&ctx, &Shape::Flat(2)).unwrap();
        assert_eq!(array.values().unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn jagged_rows_resize_independently() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut array =
            Array::new(&ctx, "rows", int16(&ctx), &Shape::Jagged(vec![2, 1])).unwrap();
        array.set_value2(0, 1, 7_i16).unwrap();
        array.set_value2(1, 0, 9_i16).unwrap();

        array.resize(&ctx, &Shape::Jagged(vec![2, 4])).unwrap();
        assert_eq!(array.row_len(0), Some(2));
        assert_eq!(array.row_len(1), Some(4));
        assert_eq!(array.value2(0, 1).unwrap(), Value::Int(7));
        assert_eq!(array.value2(1, 0).unwrap(), Value::Int(9));
    }

    #[test]
    fn rejects_huge_lengths_before_allocating() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut array = Array::empty("data", int16(&ctx), &Shape::Flat(0));
        let err = array
            .read(&mut Cursor::new(Vec::new()), &ctx, &Shape::Flat(1_000_001))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Data(DataError::ArrayTooLong { len: 1_000_001, .. })
        ));
    }

    #[test]
    fn write_checks_the_declared_shape() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut array = Array::new(&ctx, "data", int16(&ctx), &Shape::Flat(2)).unwrap();
        array.push(&ctx).unwrap();

        let err = array
            .write(&mut Vec::new(), &ctx, &Shape::Flat(2), None)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Data(DataError::SizeMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));

        let mut out = Vec::new();
        array.write(&mut out, &ctx, &Shape::Flat(3), None).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(array.get_size(&ctx, None).unwrap(), 6);
    }

    #[test]
    fn jagged_write_names_the_row() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let array = Array::new(&ctx, "rows", int16(&ctx), &Shape::Jagged(vec![1, 2])).unwrap();
        let err = array
            .write(&mut Vec::new(), &ctx, &Shape::Jagged(vec![1, 3]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Data(DataError::SizeMismatch { ref name, .. }) if name == "rows[1]"
        ));
    }

    #[test]
    fn accessors_dispatch_on_element_kind() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let vector = ElementType {
            ty: registry.type_id("Vector3").unwrap(),
            template: None,
            argument: None,
        };
        let mut points = Array::new(&ctx, "points", vector, &Shape::Flat(2)).unwrap();
        points.compound_mut(1).unwrap().set("y", 2.5_f32).unwrap();

        match points.get(1).unwrap() {
            Item::Compound(c) => assert_eq!(c.get("y").unwrap(), Value::Float(2.5)),
            Item::Value(_) => panic!("expected a compound"),
        }
        assert!(points.value(0).is_err());

        let numbers = Array::new(&ctx, "numbers", int16(&ctx), &Shape::Flat(1)).unwrap();
        assert_eq!(numbers.get(0).unwrap().into_value(), Some(Value::Int(0)));
        assert!(numbers.compound(0).is_err());
        assert!(matches!(
            numbers.value(4).unwrap_err(),
            Error::Data(DataError::IndexOutOfBounds { index: 4, len: 1, .. })
        ));
    }

    #[test]
    fn reads_links_raw() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let refs = ElementType {
            ty: registry.type_id("Ref").unwrap(),
            template: Some(registry.type_id("Node").unwrap()),
            argument: None,
        };
        let mut array = Array::empty("children", refs, &Shape::Flat(0));
        let data: Vec<u8> = [4_i32, -1].iter().flat_map(|v| v.to_le_bytes().to_vec()).collect();
        array
            .read(&mut Cursor::new(data), &ctx, &Shape::Flat(2))
            .unwrap();
        match array.element(0).unwrap() {
            Element::Basic(v) => {
                assert_eq!(v.kind(), BasicKind::Ref);
                assert_eq!(v.link_state(), Some(crate::graph::Link::Raw(4)));
            }
            Element::Compound(_) => panic!("expected a link"),
        }
    }

    #[test]
    fn display_truncates() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let array = Array::new(&ctx, "data", int16(&ctx), &Shape::Flat(20)).unwrap();
        let text = array.to_string();
        assert_eq!(text.lines().count(), DISPLAY_LIMIT + 1);
        assert!(text.ends_with("etc...\n"));
    }
}
