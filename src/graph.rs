//! The block graph of one file.
//!
//! Blocks live in an arena and refer to each other by [`BlockId`]. A `Ref` owns its target and is
//! followed by every traversal; a `Ptr` is a plain back reference that traversals skip.

use crate::compound::{Compound, Need};
use crate::context::Context;
use crate::error::{DataError, Result, SchemaError};
use crate::registry::{Registry, TypeId};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use tracing::debug;

/// Handle of a block inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block #{}", self.0)
    }
}

/// State of a `Ref` or `Ptr`.
///
/// Links are `Raw` between reading a block and the fix-up pass of the whole file, and `Resolved`
/// from then on. A resolved link may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Raw(i32),
    Resolved(Option<BlockId>),
}

impl Link {
    /// The block a resolved link points at.
    pub fn target(self) -> Option<BlockId> {
        match self {
            Link::Resolved(target) => target,
            Link::Raw(_) => None,
        }
    }
}

fn targets(links: Vec<Link>) -> Result<Vec<BlockId>> {
    let mut out = Vec::with_capacity(links.len());
    for link in links {
        match link {
            Link::Resolved(Some(id)) => out.push(id),
            Link::Resolved(None) => {}
            Link::Raw(_) => return Err(DataError::UnresolvedLink.into()),
        }
    }
    Ok(out)
}

/// Depth first walk over strong links.
struct Walk<'g, 'r> {
    graph: &'g Graph,
    registry: Option<&'r Registry>,
    path: HashSet<BlockId>,
    visited: HashSet<BlockId>,
    order: Vec<BlockId>,
}

impl<'g, 'r> Walk<'g, 'r> {
    fn new(graph: &'g Graph, registry: Option<&'r Registry>) -> Self {
        Walk {
            graph,
            registry,
            path: HashSet::new(),
            visited: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Enters `id`. Returns its pending frame, or `None` when it was visited before.
    fn enter(&mut self, id: BlockId) -> Result<Option<Frame>> {
        if self.path.contains(&id) {
            return Err(DataError::CyclicReference(id).into());
        }
        if !self.visited.insert(id) {
            return Ok(None);
        }
        let block = self.graph.get(id)?;
        let children_first = self
            .registry
            .map_or(false, |r| r.children_first(block.type_id()));
        if !children_first {
            self.order.push(id);
        }
        self.path.insert(id);
        Ok(Some(Frame {
            id,
            children: targets(block.get_refs())?,
            next: 0,
            children_first,
        }))
    }

    fn visit(&mut self, id: BlockId) -> Result<()> {
        let mut stack: Vec<Frame> = self.enter(id)?.into_iter().collect();
        while let Some(frame) = stack.last_mut() {
            if let Some(&child) = frame.children.get(frame.next) {
                frame.next += 1;
                if let Some(frame) = self.enter(child)? {
                    stack.push(frame);
                }
                continue;
            }
            let done = match stack.pop() {
                Some(frame) => frame,
                None => break,
            };
            self.path.remove(&done.id);
            if done.children_first {
                self.order.push(done.id);
            }
        }
        Ok(())
    }
}

/// A block on the current path with the index of its next child.
struct Frame {
    id: BlockId,
    children: Vec<BlockId>,
    next: usize,
    children_first: bool,
}

/// Arena owning every block of a file, plus the file's root list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    blocks: Vec<Option<Compound>>,
    roots: Vec<BlockId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Moves `block` into the arena.
    pub fn add(&mut self, block: Compound) -> BlockId {
        self.blocks.push(Some(block));
        BlockId(self.blocks.len() - 1)
    }

    /// Adds a default constructed block of type `type_name`.
    pub fn create(&mut self, ctx: &Context<'_>, type_name: &str) -> Result<BlockId> {
        let ty = ctx.registry.type_id(type_name)?;
        if !ctx.registry.compound(ty)?.is_block {
            return Err(SchemaError::NotABlock(type_name.to_string()).into());
        }
        let block = Compound::new(ctx, ty, None, None)?;
        Ok(self.add(block))
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: BlockId) -> Result<&Compound> {
        self.blocks
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| DataError::DanglingLink(id).into())
    }

    pub fn get_mut(&mut self, id: BlockId) -> Result<&mut Compound> {
        self.blocks
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| DataError::DanglingLink(id).into())
    }

    /// Takes a block out of the arena. Links to it are left dangling; see [`Graph::replace_links`].
    pub fn remove(&mut self, id: BlockId) -> Result<Compound> {
        let block = self
            .blocks
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(DataError::DanglingLink(id))?;
        self.roots.retain(|root| *root != id);
        Ok(block)
    }

    /// Live block ids, in insertion order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Compound)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (BlockId(i), b)))
    }

    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    pub fn add_root(&mut self, id: BlockId) {
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    pub fn set_roots(&mut self, roots: Vec<BlockId>) {
        self.roots = roots;
    }

    fn type_of(&self, id: BlockId) -> Option<TypeId> {
        self.get(id).ok().map(Compound::type_id)
    }

    /// Resolves every raw link, where raw index `i` names `table[i]` and `-1` is null.
    ///
    /// Returns the number of non-null links resolved. A link whose declared target type does not
    /// accept the block found at its index is an error.
    pub fn fix_links(&mut self, registry: &Registry, table: &[BlockId]) -> Result<usize> {
        let types: Vec<Option<TypeId>> = (0..self.blocks.len())
            .map(|i| self.type_of(BlockId(i)))
            .collect();
        let mut fixed = 0;
        for block in self.blocks.iter_mut().flatten() {
            block.walk_mut(Need::Links, &mut |value| {
                let expected = value.template();
                let link = match value.link_mut() {
                    Some(link) => link,
                    None => return Ok(()),
                };
                let index = match *link {
                    Link::Raw(-1) => {
                        *link = Link::Resolved(None);
                        return Ok(());
                    }
                    Link::Raw(index) => index,
                    Link::Resolved(_) => return Ok(()),
                };
                let target = usize::try_from(index)
                    .ok()
                    .and_then(|i| table.get(i))
                    .copied()
                    .ok_or(DataError::LinkOutOfRange {
                        index,
                        count: table.len(),
                    })?;
                let ty = types
                    .get(target.0)
                    .copied()
                    .flatten()
                    .ok_or(DataError::DanglingLink(target))?;
                if let Some(expected) = expected {
                    if !registry.is_subtype(ty, expected) {
                        return Err(DataError::IncompatibleLink {
                            expected: registry.type_name(expected).to_string(),
                            target: registry.type_name(ty).to_string(),
                        }
                        .into());
                    }
                }
                *link = Link::Resolved(Some(target));
                fixed += 1;
                Ok(())
            })?;
        }
        debug!(fixed, blocks = table.len(), "fixed links");
        Ok(fixed)
    }

    /// Targets of the strong links of `id`, in wire order.
    pub fn get_refs(&self, id: BlockId) -> Result<Vec<BlockId>> {
        targets(self.get(id)?.get_refs())
    }

    /// Targets of all links of `id`, in wire order.
    pub fn get_links(&self, id: BlockId) -> Result<Vec<BlockId>> {
        targets(self.get(id)?.get_links())
    }

    /// `root` and every block it owns, depth first, parents before children.
    ///
    /// Blocks reachable along several paths are listed once; a block reachable from itself is a
    /// `CyclicReference` error.
    pub fn tree(&self, root: BlockId) -> Result<Vec<BlockId>> {
        let mut walk = Walk::new(self, None);
        walk.visit(root)?;
        Ok(walk.order)
    }

    /// First block of the tree below `root` (inclusive) accepted by `predicate`.
    pub fn find<P>(&self, root: BlockId, mut predicate: P) -> Result<Option<BlockId>>
    where
        P: FnMut(BlockId, &Compound) -> bool,
    {
        for id in self.tree(root)? {
            if predicate(id, self.get(id)?) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Fails if strong links form a cycle anywhere in the graph.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut walk = Walk::new(self, None);
        for id in self.ids() {
            walk.visit(id)?;
        }
        Ok(())
    }

    /// Block order used for writing: depth first from the roots over strong links, children
    /// before their parent for types flagged children-first.
    pub fn write_order(&self, registry: &Registry) -> Result<Vec<BlockId>> {
        let mut walk = Walk::new(self, Some(registry));
        for root in &self.roots {
            walk.visit(*root)?;
        }
        Ok(walk.order)
    }

    /// Points every link to `old` at `new` instead, roots included. Returns how many links
    /// changed.
    pub fn replace_links(&mut self, old: BlockId, new: Option<BlockId>) -> Result<usize> {
        let mut replaced = 0;
        for block in self.blocks.iter_mut().flatten() {
            block.walk_mut(Need::Links, &mut |value| {
                if let Some(link) = value.link_mut() {
                    if *link == Link::Resolved(Some(old)) {
                        *link = Link::Resolved(new);
                        replaced += 1;
                    }
                }
                Ok(())
            })?;
        }
        match new {
            Some(new) => {
                for root in self.roots.iter_mut().filter(|r| **r == old) {
                    *root = new;
                }
            }
            None => self.roots.retain(|r| *r != old),
        }
        Ok(replaced)
    }

    /// Removes every block not owned by a root and nulls the weak links that pointed at them.
    pub fn prune(&mut self) -> Result<Vec<BlockId>> {
        let mut reachable = HashSet::new();
        let mut stack = self.roots.clone();
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                stack.extend(self.get_refs(id)?);
            }
        }
        let removed: Vec<BlockId> = self
            .ids()
            .into_iter()
            .filter(|id| !reachable.contains(id))
            .collect();
        for id in &removed {
            self.remove(*id)?;
        }
        for id in &removed {
            self.replace_links(*id, None)?;
        }
        debug!(removed = removed.len(), kept = reachable.len(), "pruned graph");
        Ok(removed)
    }

    /// Re-materialises every block for the context's version.
    pub fn refresh(&mut self, ctx: &Context<'_>) -> Result<()> {
        for block in self.blocks.iter_mut().flatten() {
            block.refresh(ctx)?;
        }
        Ok(())
    }

    /// Runs the custom function `name` registered for the type of `id` or one of its bases.
    pub fn call(&mut self, ctx: &Context<'_>, id: BlockId, name: &str) -> Result<()> {
        let ty = self.get(id)?.type_id();
        let function = ctx
            .registry
            .custom_function(ty, name)
            .ok_or_else(|| DataError::NoSuchFunction {
                type_name: ctx.registry.type_name(ty).to_string(),
                function: name.to_string(),
            })?;
        function(self, id, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::Value;
    use crate::error::Error;
    use crate::testing;
    use std::io::Cursor;

    fn adopt(graph: &mut Graph, ctx: &Context<'_>, parent: BlockId, child: BlockId) {
        let block = graph.get_mut(parent).unwrap();
        let (count, list) = if block.has_attribute("children") {
            ("num_children", "children")
        } else {
            ("num_items", "items")
        };
        let n = block.array(list).unwrap().len();
        block.set(count, (n + 1) as u32).unwrap();
        block.update_size(ctx, list).unwrap();
        block.array_mut(list).unwrap().set_value(n, child).unwrap();
    }

    #[test]
    fn tree_is_depth_first() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let a = graph.create(&ctx, "Node").unwrap();
        let b = graph.create(&ctx, "Node").unwrap();
        let c = graph.create(&ctx, "Leaf").unwrap();
        let d = graph.create(&ctx, "Leaf").unwrap();
        adopt(&mut graph, &ctx, a, b);
        adopt(&mut graph, &ctx, a, c);
        adopt(&mut graph, &ctx, b, d);

        assert_eq!(graph.tree(a).unwrap(), vec![a, b, d, c]);
        assert_eq!(graph.get_refs(a).unwrap(), vec![b, c]);
        let found = graph
            .find(a, |_, block| block.get("value").is_ok())
            .unwrap();
        assert_eq!(found, Some(d));
    }

    #[test]
    fn strong_cycles_are_rejected() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let a = graph.create(&ctx, "Node").unwrap();
        let b = graph.create(&ctx, "Node").unwrap();
        adopt(&mut graph, &ctx, a, b);
        adopt(&mut graph, &ctx, b, a);

        assert!(matches!(
            graph.tree(a).unwrap_err(),
            Error::Data(DataError::CyclicReference(id)) if id == a
        ));
        assert!(graph.check_acyclic().is_err());
    }

    #[test]
    fn weak_back_edges_are_not_followed() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let a = graph.create(&ctx, "Node").unwrap();
        let b = graph.create(&ctx, "Node").unwrap();
        adopt(&mut graph, &ctx, a, b);
        graph.get_mut(b).unwrap().set("parent", a).unwrap();

        assert_eq!(graph.tree(a).unwrap(), vec![a, b]);
        assert_eq!(graph.get_links(b).unwrap(), vec![a]);
        graph.check_acyclic().unwrap();
    }

    #[test]
    fn shared_children_are_visited_once() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let a = graph.create(&ctx, "Node").unwrap();
        let b = graph.create(&ctx, "Node").unwrap();
        let c = graph.create(&ctx, "Node").unwrap();
        let d = graph.create(&ctx, "Leaf").unwrap();
        adopt(&mut graph, &ctx, a, b);
        adopt(&mut graph, &ctx, a, c);
        adopt(&mut graph, &ctx, b, d);
        adopt(&mut graph, &ctx, c, d);
        assert_eq!(graph.tree(a).unwrap(), vec![a, b, d, c]);
    }

    fn read_holder(ctx: &Context<'_>, index: i32) -> Compound {
        let ty = ctx.registry.type_id("Holder").unwrap();
        let mut holder = Compound::blank(ctx, ty, None, None).unwrap();
        holder
            .read(&mut Cursor::new(index.to_le_bytes().to_vec()), ctx)
            .unwrap();
        holder
    }

    #[test]
    fn fix_links_resolves_forward_and_backward() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let forward = graph.add(read_holder(&ctx, 2));
        let null = graph.add(read_holder(&ctx, -1));
        let node = graph.create(&ctx, "Node").unwrap();
        let backward = graph.add(read_holder(&ctx, 2));
        assert!(graph.get(forward).unwrap().get("target").is_err());

        let table = vec![forward, null, node, backward];
        assert_eq!(graph.fix_links(&registry, &table).unwrap(), 2);
        assert_eq!(graph.get(forward).unwrap().get("target").unwrap(), Value::Block(node));
        assert_eq!(graph.get(null).unwrap().get("target").unwrap(), Value::None);
        assert_eq!(graph.get(backward).unwrap().get("target").unwrap(), Value::Block(node));
    }

    #[test]
    fn fix_links_checks_index_and_type() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);

        let mut graph = Graph::new();
        let holder = graph.add(read_holder(&ctx, 7));
        assert!(matches!(
            graph.fix_links(&registry, &[holder]).unwrap_err(),
            Error::Data(DataError::LinkOutOfRange { index: 7, count: 1 })
        ));

        let mut graph = Graph::new();
        let holder = graph.add(read_holder(&ctx, 1));
        let leaf = graph.create(&ctx, "Leaf").unwrap();
        assert!(matches!(
            graph.fix_links(&registry, &[holder, leaf]).unwrap_err(),
            Error::Data(DataError::IncompatibleLink { .. })
        ));
    }

    #[test]
    fn prune_drops_unowned_blocks() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let root = graph.create(&ctx, "Node").unwrap();
        let child = graph.create(&ctx, "Node").unwrap();
        let orphan = graph.create(&ctx, "Node").unwrap();
        adopt(&mut graph, &ctx, root, child);
        graph.get_mut(child).unwrap().set("parent", orphan).unwrap();
        graph.add_root(root);

        assert_eq!(graph.prune().unwrap(), vec![orphan]);
        assert_eq!(graph.len(), 2);
        assert!(!graph.contains(orphan));
        assert_eq!(graph.get(child).unwrap().get("parent").unwrap(), Value::None);
    }

    #[test]
    fn replace_links_rewires_parents() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let root = graph.create(&ctx, "Node").unwrap();
        let old = graph.create(&ctx, "Leaf").unwrap();
        let new = graph.create(&ctx, "Leaf").unwrap();
        adopt(&mut graph, &ctx, root, old);
        graph.add_root(old);

        assert_eq!(graph.replace_links(old, Some(new)).unwrap(), 1);
        assert_eq!(graph.get_refs(root).unwrap(), vec![new]);
        assert_eq!(graph.roots(), &[new]);
        graph.remove(old).unwrap();
        assert!(matches!(
            graph.get(old).unwrap_err(),
            Error::Data(DataError::DanglingLink(_))
        ));
    }

    #[test]
    fn write_order_honours_children_first() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let root = graph.create(&ctx, "Node").unwrap();
        let group = graph.create(&ctx, "Group").unwrap();
        let leaf = graph.create(&ctx, "Leaf").unwrap();
        let stray = graph.create(&ctx, "Leaf").unwrap();
        adopt(&mut graph, &ctx, root, group);
        adopt(&mut graph, &ctx, group, leaf);
        graph.add_root(root);

        let order = graph.write_order(&registry).unwrap();
        assert_eq!(order, vec![root, leaf, group]);
        assert!(!order.contains(&stray));
    }

    #[test]
    fn create_rejects_non_blocks() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        assert!(matches!(
            graph.create(&ctx, "Vector3").unwrap_err(),
            Error::Schema(SchemaError::NotABlock(_))
        ));
        assert!(matches!(
            graph.create(&ctx, "Object").unwrap_err(),
            Error::Schema(SchemaError::AbstractType(_))
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn custom_functions() {
        let registry = testing::registry();
        let ctx = testing::context(&registry);
        let mut graph = Graph::new();
        let root = graph.create(&ctx, "Node").unwrap();
        let child = graph.create(&ctx, "Node").unwrap();
        let leaf = graph.create(&ctx, "Leaf").unwrap();
        adopt(&mut graph, &ctx, root, child);
        adopt(&mut graph, &ctx, child, leaf);

        graph.call(&ctx, root, "scale").unwrap();
        assert_eq!(graph.get(root).unwrap().get("scale").unwrap(), Value::Float(2.0));
        assert_eq!(graph.get(child).unwrap().get("scale").unwrap(), Value::Float(2.0));

        graph.call(&ctx, leaf, "describe").unwrap();
        assert_eq!(
            graph.get(leaf).unwrap().get("name").unwrap(),
            Value::Bytes(b"described".to_vec())
        );
        assert!(matches!(
            graph.call(&ctx, leaf, "scale").unwrap_err(),
            Error::Data(DataError::NoSuchFunction { .. })
        ));
    }
}
