//! # Blockform - A schema driven engine for versioned block structured binary files
//!
//! ## Example
//!
//! ```ignore
//! use blockform::{BlockFile, CompoundDef, FieldDef, FileFormat, Registry};
//!
//! /// Prints the value of every leaf below the roots
//! fn main() -> blockform::Result<()> {
//!     let registry = Registry::builder()
//!         .with_builtin_basics()
//!         .compound(
//!             CompoundDef::block("Leaf")
//!                 .field(FieldDef::new("Num Values", "uint32"))
//!                 .field(FieldDef::new("Values", "float").length("Num Values")),
//!         )
//!         .build()?;
//!     let format = FileFormat::new("Leaves", b"LEAVES\n").with_versions(vec![0x0100_0000]);
//!
//!     let mut file = BlockFile::new(&registry, &format, 0x0100_0000, 0)?;
//!     file.read(&mut std::fs::File::open("file.lvs")?)?;
//!
//!     for root in file.roots() {
//!         let leaf = file.graph.get(*root)?;
//!         println!("{:?}", leaf.array("values")?.values()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Block structured files
//!
//! Many binary formats share one shape: a header with a version number, a table of typed blocks,
//! and block payloads that are records of primitives, arrays and nested records. Blocks point at
//! each other by index. Which fields exist depends on the file version and on earlier field
//! values, and array lengths are given by other fields of the same record. A simplified block in
//! Rust-like syntax:
//!
//! ```ignore
//! struct Node {
//!     name: StringIndex = "Scene Root",
//!     num_children: u32 = 2,
//!     children: [Ref<Object>; num_children] = [#3, #7],
//!     parent: Ptr<Node> = null,
//!     // only in files older than 10.0.0.0
//!     old_flags: u16 = 0,
//! }
//! ```
//!
//! ## This crate
//!
//! Instead of hand writing a reader and a writer per block type, the types are declared once in a
//! [`Registry`] and the engine interprets them at runtime:
//!
//! * [`Compound`] holds the attributes of one record, in wire order, and reads, writes and sizes
//!   itself from its type's field list.
//! * [`Array`] holds one and two dimensional arrays whose lengths come from expressions over the
//!   enclosing compound. Rows of a jagged array have independent lengths.
//! * [`BasicValue`] is a range checked scalar, string or link.
//! * [`Graph`] owns every block of a file. `Ref` links own their target, `Ptr` links do not;
//!   traversals follow `Ref` only and reject ownership cycles.
//! * [`BlockFile`] reads and writes complete files of a [`FileFormat`].
//!
//! Version numbers are written `a.b.c.d` and compared as `(a << 24) | (b << 16) | (c << 8) | d`,
//! see [`version_number`].
//!
//! ### Usage tips
//!
//! After changing a field that an array length depends on, call [`Compound::update_size`] (or
//! `update_sizes`). Writing an array whose element count disagrees with its length expression is
//! an error, never a silent truncation. After switching a file to another version, call
//! [`Compound::refresh`] or [`BlockFile::set_version`] so the attribute set matches it.
//!
//! The `Display` implementation of compounds prints one `* name : value` line per attribute and
//! truncates arrays after 16 elements.
//!
//! ### Warnings
//!
//! Lengths read from a file are checked against [`Limits`] before anything is allocated, and no
//! function panics on malformed input. Blocks are still fully materialised in memory, so very large
//! files need correspondingly large amounts of memory.
//!
//! ### Limitations
//!
//! Compressed payloads and lazy loading of blocks are not supported. The crate does not parse
//! schema description files: types are declared through the builder API.

pub mod array;
pub mod basic;
pub mod compound;
pub mod context;
pub mod driver;
pub mod error;
pub mod expression;
pub mod graph;
pub mod parsers;
pub mod registry;

#[cfg(test)]
mod testing;

pub use array::{Array, Element, ElementType, Item, Shape};
pub use basic::{BasicKind, BasicValue, Value};
pub use compound::{Attribute, Compound};
pub use context::{Context, Limits};
pub use driver::{BlockFile, FileFormat};
pub use error::{DataError, Error, Result, SchemaError};
pub use expression::{ExprValue, Expression};
pub use graph::{BlockId, Graph, Link};
pub use parsers::Endianness;
pub use registry::{
    name_attribute, version_number, CompoundDef, EnumDef, FieldDef, Registry, RegistryBuilder,
    TypeId,
};
