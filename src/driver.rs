//! Reading and writing whole files: header, block table, string table, blocks and roots.

use crate::basic::{BasicKind, BasicValue};
use crate::compound::Compound;
use crate::context::{Context, Limits};
use crate::error::{DataError, Error, Result};
use crate::graph::{BlockId, Graph};
use crate::parsers::primitive::{read_primitive, write_primitive};
use crate::parsers::version::format_version;
use crate::parsers::Endianness;
use crate::registry::{Registry, TypeId};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};
use walkdir::WalkDir;

/// One concrete container format built on the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFormat {
    name: String,
    magic: Vec<u8>,
    versions: Vec<u32>,
    endianness: Endianness,
    limits: Limits,
    extensions: Vec<String>,
}

impl FileFormat {
    pub fn new(name: &str, magic: &[u8]) -> Self {
        FileFormat {
            name: name.to_string(),
            magic: magic.to_vec(),
            versions: Vec::new(),
            endianness: Endianness::default(),
            limits: Limits::default(),
            extensions: Vec::new(),
        }
    }

    pub fn with_versions<I: IntoIterator<Item = u32>>(mut self, versions: I) -> Self {
        self.versions.extend(versions);
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// File name extensions, without the dot, matched case-insensitively by [`FileFormat::walk`].
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions
            .extend(extensions.iter().map(|e| e.to_ascii_lowercase()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn magic(&self) -> &[u8] {
        &self.magic
    }

    pub fn versions(&self) -> &[u32] {
        &self.versions
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn supports(&self, version: u32) -> bool {
        self.versions.contains(&version)
    }

    fn read_header<S: Read>(&self, stream: &mut S) -> Result<(u32, u32)> {
        let mut magic = vec![0; self.magic.len()];
        let not_this_format = || Error::NotThisFormat {
            format: self.name.clone(),
        };
        match stream.read_exact(&mut magic) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(not_this_format())
            }
            Err(e) => return Err(e.into()),
        }
        if magic != self.magic {
            return Err(not_this_format());
        }
        let version = read_primitive::<u32, _>(stream, self.endianness)?;
        let user_version = read_primitive::<u32, _>(stream, self.endianness)?;
        if !self.supports(version) {
            return Err(Error::UnsupportedVersion { version });
        }
        Ok((version, user_version))
    }

    /// Reads the magic and version numbers, then puts the stream back where it was.
    pub fn inspect<S: Read + Seek>(&self, stream: &mut S) -> Result<(u32, u32)> {
        let start = stream.seek(SeekFrom::Current(0))?;
        let header = self.read_header(stream);
        stream.seek(SeekFrom::Start(start))?;
        header
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| self.extensions.contains(&e.to_ascii_lowercase()))
    }

    /// Files below `top` whose extension belongs to this format, in directory walk order.
    pub fn walk<P: AsRef<Path>>(&self, top: P) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        WalkDir::new(top)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() && self.matches_extension(entry.path()) => {
                    Some(Ok(entry.into_path()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::Io(e.into()))),
            })
    }
}

fn read_u32<S: Read>(stream: &mut S, ctx: &Context<'_>) -> Result<u32> {
    Ok(read_primitive::<u32, _>(stream, ctx.endianness)?)
}

fn write_u32<S: Write>(stream: &mut S, ctx: &Context<'_>, value: usize) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| DataError::OutOfRange {
        kind: "uint32".to_string(),
        value: value.to_string(),
    })?;
    Ok(write_primitive(stream, value, ctx.endianness)?)
}

fn read_string<S: Read>(stream: &mut S, ctx: &Context<'_>) -> Result<Vec<u8>> {
    let mut s = BasicValue::new(BasicKind::SizedString);
    s.read(stream, ctx)?;
    Ok(s.get_value()?.into_bytes().unwrap_or_default())
}

fn write_string<S: Write>(stream: &mut S, ctx: &Context<'_>, bytes: &[u8]) -> Result<()> {
    let mut s = BasicValue::new(BasicKind::SizedString);
    s.set_value(bytes)?;
    s.write(stream, ctx)
}

fn check_count(name: &str, len: u32, max: usize) -> Result<usize> {
    let len = len as usize;
    if len > max {
        return Err(DataError::ArrayTooLong {
            name: name.to_string(),
            len,
            max,
        }
        .into());
    }
    Ok(len)
}

fn position<S: Seek>(stream: &mut S) -> Result<u64> {
    Ok(stream.seek(SeekFrom::Current(0))?)
}

/// A file of some [`FileFormat`]: its version numbers and its block graph.
#[derive(Debug, Clone)]
pub struct BlockFile<'r> {
    registry: &'r Registry,
    format: &'r FileFormat,
    version: u32,
    user_version: u32,
    pub graph: Graph,
}

impl<'r> BlockFile<'r> {
    /// An empty file for `version`.
    pub fn new(
        registry: &'r Registry,
        format: &'r FileFormat,
        version: u32,
        user_version: u32,
    ) -> Result<Self> {
        if !format.supports(version) {
            return Err(Error::UnsupportedVersion { version });
        }
        Ok(BlockFile {
            registry,
            format,
            version,
            user_version,
            graph: Graph::new(),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn user_version(&self) -> u32 {
        self.user_version
    }

    pub fn format(&self) -> &FileFormat {
        self.format
    }

    /// Switches the file to another version and re-materialises every block for it.
    pub fn set_version(&mut self, version: u32, user_version: u32) -> Result<()> {
        if !self.format.supports(version) {
            return Err(Error::UnsupportedVersion { version });
        }
        self.version = version;
        self.user_version = user_version;
        let ctx = self.context();
        self.graph.refresh(&ctx)
    }

    /// Ambient facts for operating on blocks of this file.
    pub fn context(&self) -> Context<'r> {
        self.context_at(self.version, self.user_version)
    }

    fn context_at(&self, version: u32, user_version: u32) -> Context<'r> {
        Context::new(self.registry, version, user_version)
            .with_endianness(self.format.endianness)
            .with_limits(self.format.limits)
    }

    pub fn create_block(&mut self, type_name: &str) -> Result<BlockId> {
        let ctx = self.context();
        self.graph.create(&ctx, type_name)
    }

    pub fn blocks(&self) -> Vec<BlockId> {
        self.graph.ids()
    }

    pub fn roots(&self) -> &[BlockId] {
        self.graph.roots()
    }

    /// Replaces the file's contents with those read from `stream`.
    pub fn read<S: Read + Seek>(&mut self, stream: &mut S) -> Result<()> {
        let (version, user_version) = self.format.read_header(stream)?;
        let mut ctx = self.context_at(version, user_version);
        let limits = ctx.limits;

        let num_blocks = read_u32(stream, &ctx)?;
        if num_blocks as usize > limits.max_blocks {
            return Err(DataError::TooManyBlocks {
                count: num_blocks as usize,
                max: limits.max_blocks,
            }
            .into());
        }
        let num_blocks = num_blocks as usize;

        let num_types = check_count("block types", read_u32(stream, &ctx)?, limits.max_array_len)?;
        let mut types = Vec::with_capacity(num_types);
        for _ in 0..num_types {
            let name = String::from_utf8_lossy(&read_string(stream, &ctx)?).into_owned();
            types.push(self.block_type(&name)?);
        }

        let mut type_indices = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let index = read_primitive::<u16, _>(stream, ctx.endianness)?;
            let ty = types
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| DataError::UnknownBlockType(format!("#{}", index)))?;
            type_indices.push(ty);
        }
        let mut sizes = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            sizes.push(u64::from(read_u32(stream, &ctx)?));
        }

        let num_strings = check_count("strings", read_u32(stream, &ctx)?, limits.max_array_len)?;
        let max_string_len = read_u32(stream, &ctx)?;
        let mut strings = Vec::with_capacity(num_strings);
        for _ in 0..num_strings {
            let s = read_string(stream, &ctx)?;
            if s.len() > max_string_len as usize {
                warn!(len = s.len(), max_string_len, "string longer than the declared maximum");
            }
            strings.push(s);
        }
        ctx.set_strings(strings);

        let mut graph = Graph::new();
        let mut table = Vec::with_capacity(num_blocks);
        for (i, (ty, size)) in type_indices.into_iter().zip(sizes).enumerate() {
            let type_name = self.registry.type_name(ty);
            let start = position(stream)?;
            let mut block = Compound::blank(&ctx, ty, None, None)?;
            block.read(stream, &ctx)?;
            let consumed = position(stream)? - start;
            if consumed != size {
                error!(
                    block = i,
                    type_name,
                    expected = size,
                    actual = consumed,
                    "block size mismatch"
                );
                stream.seek(SeekFrom::Start(start + size))?;
            }
            trace!(block = i, type_name, size, "read block");
            table.push(graph.add(block));
        }

        let num_roots = check_count("roots", read_u32(stream, &ctx)?, num_blocks)?;
        let mut roots = Vec::with_capacity(num_roots);
        for _ in 0..num_roots {
            let index = read_primitive::<i32, _>(stream, ctx.endianness)?;
            if index == -1 {
                continue;
            }
            let root = usize::try_from(index)
                .ok()
                .and_then(|i| table.get(i))
                .copied()
                .ok_or(DataError::LinkOutOfRange {
                    index,
                    count: table.len(),
                })?;
            roots.push(root);
        }

        let mut rest = [0_u8; 1];
        if stream.read(&mut rest)? != 0 {
            return Err(DataError::TrailingData.into());
        }

        graph.fix_links(self.registry, &table)?;
        graph.set_roots(roots);
        self.graph = graph;
        self.version = version;
        self.user_version = user_version;
        debug!(
            format = %self.format.name,
            version = %format_version(version),
            user_version,
            blocks = num_blocks,
            "read file"
        );
        Ok(())
    }

    fn block_type(&self, name: &str) -> Result<TypeId> {
        let unknown = || DataError::UnknownBlockType(name.to_string());
        let ty = self.registry.type_id(name).map_err(|_| unknown())?;
        match self.registry.compound(ty) {
            Ok(def) if def.is_block && !def.is_abstract => Ok(ty),
            _ => Err(unknown().into()),
        }
    }

    /// Writes the blocks owned by the roots, with block sizes back-patched once known.
    pub fn write<S: Write + Seek>(&self, stream: &mut S) -> Result<()> {
        let mut ctx = self.context();
        let order = self.graph.write_order(self.registry)?;
        ctx.set_link_order(&order);

        let mut strings = Vec::new();
        let mut seen = HashSet::new();
        let mut types: Vec<TypeId> = Vec::new();
        let mut type_indices = Vec::with_capacity(order.len());
        for id in &order {
            let block = self.graph.get(*id)?;
            for s in block.get_strings() {
                if seen.insert(s.clone()) {
                    strings.push(s);
                }
            }
            let index = match types.iter().position(|t| *t == block.type_id()) {
                Some(index) => index,
                None => {
                    types.push(block.type_id());
                    types.len() - 1
                }
            };
            let index = u16::try_from(index).map_err(|_| DataError::OutOfRange {
                kind: "uint16".to_string(),
                value: index.to_string(),
            })?;
            type_indices.push(index);
        }
        ctx.set_strings(strings.clone());

        stream.write_all(&self.format.magic)?;
        write_primitive(stream, self.version, ctx.endianness)?;
        write_primitive(stream, self.user_version, ctx.endianness)?;
        write_u32(stream, &ctx, order.len())?;
        write_u32(stream, &ctx, types.len())?;
        for ty in &types {
            write_string(stream, &ctx, self.registry.type_name(*ty).as_bytes())?;
        }
        for index in &type_indices {
            write_primitive(stream, *index, ctx.endianness)?;
        }
        let sizes_at = position(stream)?;
        for _ in &order {
            write_primitive(stream, 0_u32, ctx.endianness)?;
        }

        write_u32(stream, &ctx, strings.len())?;
        write_u32(stream, &ctx, strings.iter().map(Vec::len).max().unwrap_or(0))?;
        for s in &strings {
            write_string(stream, &ctx, s)?;
        }

        let mut sizes = Vec::with_capacity(order.len());
        for (i, id) in order.iter().enumerate() {
            let block = self.graph.get(*id)?;
            let start = position(stream)?;
            block.write(stream, &ctx)?;
            let size = position(stream)? - start;
            trace!(block = i, type_name = block.type_name(), size, "wrote block");
            sizes.push(size as usize);
        }

        write_u32(stream, &ctx, self.graph.roots().len())?;
        for root in self.graph.roots() {
            write_primitive(stream, ctx.link_index(*root)?, ctx.endianness)?;
        }

        let end = position(stream)?;
        stream.seek(SeekFrom::Start(sizes_at))?;
        for size in sizes {
            write_u32(stream, &ctx, size)?;
        }
        stream.seek(SeekFrom::Start(end))?;
        debug!(
            format = %self.format.name,
            version = %format_version(self.version),
            blocks = order.len(),
            bytes = end,
            "wrote file"
        );
        Ok(())
    }
}
