//! Sample schema shared by the unit tests.

use crate::context::Context;
use crate::error::Result;
use crate::graph::{BlockId, Graph};
use crate::registry::{CompoundDef, EnumDef, FieldDef, Registry};

/// 20.0.0.5
pub(crate) const VERSION: u32 = 0x1400_0005;

fn describe(graph: &mut Graph, id: BlockId, _ctx: &Context<'_>) -> Result<()> {
    let block = graph.get_mut(id)?;
    block.set("name", "described")?;
    Ok(())
}

/// Multiplies the scale of a node and of every node below it.
fn scale(graph: &mut Graph, id: BlockId, ctx: &Context<'_>) -> Result<()> {
    let node_type = ctx.registry.type_id("Node")?;
    for child in graph.tree(id)? {
        let block = graph.get_mut(child)?;
        if ctx.registry.is_subtype(block.type_id(), node_type) {
            let current = block.get("scale")?.as_f32().unwrap_or(1.0);
            block.set("scale", current * 2.0)?;
        }
    }
    Ok(())
}

pub(crate) fn registry() -> Registry {
    Registry::builder()
        .with_builtin_basics()
        .enumeration(
            EnumDef::new("AlphaMode", "uint8")
                .option("NONE", 0)
                .option("BLEND", 1)
                .option("TEST", 2),
        )
        .enumeration(
            EnumDef::new("Flags", "uint16")
                .option("HIDDEN", 1)
                .option("SELECTED", 2)
                .allow_raw(),
        )
        .compound(
            CompoundDef::new("Vector3")
                .field(FieldDef::new("X", "float"))
                .field(FieldDef::new("Y", "float"))
                .field(FieldDef::new("Z", "float")),
        )
        .compound(
            CompoundDef::new("Counted")
                .field(FieldDef::new("Count", "uint32"))
                .field(FieldDef::new("Data", "int16").length("Count")),
        )
        .compound(
            CompoundDef::new("Jagged")
                .field(FieldDef::new("Num Rows", "uint16"))
                .field(FieldDef::new("Row Lengths", "uint16").length("Num Rows"))
                .field(
                    FieldDef::new("Rows", "int16")
                        .length("Num Rows")
                        .width("Row Lengths"),
                ),
        )
        .compound(
            CompoundDef::new("Grid")
                .field(FieldDef::new("Height", "uint8"))
                .field(FieldDef::new("Width", "uint8"))
                .field(
                    FieldDef::new("Cells", "uint8")
                        .length("Height")
                        .width("Width"),
                ),
        )
        .compound(
            CompoundDef::new("Key")
                .template()
                .field(FieldDef::new("Time", "float"))
                .field(FieldDef::new("Value", "TEMPLATE")),
        )
        .compound(
            CompoundDef::new("KeyGroup")
                .template()
                .field(FieldDef::new("Num Keys", "uint32"))
                .field(
                    FieldDef::new("Keys", "Key")
                        .template("TEMPLATE")
                        .length("Num Keys"),
                ),
        )
        .compound(
            CompoundDef::new("Animation")
                .field(FieldDef::new("Rotations", "KeyGroup").template("float"))
                .field(FieldDef::new("Positions", "KeyGroup").template("Vector3")),
        )
        .compound(
            CompoundDef::new("Gated")
                .field(FieldDef::new("A", "uint32"))
                .field(FieldDef::new("Old", "uint32").until("10.0.0.0"))
                .field(FieldDef::new("New", "uint32").since("10.0.0.1"))
                .field(FieldDef::new("Extra", "float").condition("A > 1"))
                .field(FieldDef::new("Tagged", "uint8").user_version(11))
                .field(FieldDef::new("Cache", "uint32").abstract_field()),
        )
        .compound(
            CompoundDef::new("Payload")
                .field(FieldDef::new("Small", "uint8").condition("arg == 1"))
                .field(FieldDef::new("Large", "uint32").condition("arg == 2")),
        )
        .compound(
            CompoundDef::new("Chunk")
                .field(FieldDef::new("Kind", "uint8"))
                .field(FieldDef::new("Payload", "Payload").arg("Kind")),
        )
        .compound(CompoundDef::new("Holder").field(FieldDef::new("Target", "Ptr").template("Node")))
        .compound(
            CompoundDef::block("Object")
                .abstract_type()
                .field(FieldDef::new("Name", "string")),
        )
        .compound(
            CompoundDef::block("Node")
                .inherit("Object")
                .field(FieldDef::new("Flags", "Flags"))
                .field(FieldDef::new("Scale", "float").default_value("1.0"))
                .field(FieldDef::new("Num Children", "uint32"))
                .field(
                    FieldDef::new("Children", "Ref")
                        .template("Object")
                        .length("Num Children"),
                )
                .field(FieldDef::new("Parent", "Ptr").template("Node"))
                .field(FieldDef::new("Translation", "Vector3")),
        )
        .compound(
            CompoundDef::block("Leaf")
                .inherit("Object")
                .field(FieldDef::new("Value", "int32"))
                .field(FieldDef::new("Alpha", "AlphaMode")),
        )
        .compound(
            CompoundDef::block("Texture")
                .inherit("Object")
                .field(FieldDef::new("File Name", "sizedstring")),
        )
        .compound(
            CompoundDef::block("Group")
                .inherit("Object")
                .field(FieldDef::new("Num Items", "uint32"))
                .field(
                    FieldDef::new("Items", "Ref")
                        .template("Object")
                        .length("Num Items"),
                ),
        )
        .custom_function("Object", "describe", describe)
        .custom_function("Node", "scale", scale)
        .children_first("Group")
        .build()
        .expect("sample schema is valid")
}

pub(crate) fn context(registry: &Registry) -> Context<'_> {
    Context::new(registry, VERSION, 0)
}
