#![allow(dead_code)]

use blockform::{
    BlockFile, BlockId, CompoundDef, EnumDef, FieldDef, FileFormat, Registry, Result,
};

/// 20.0.0.5
pub const V20: u32 = 0x1400_0005;
/// 4.0.0.1
pub const V4: u32 = 0x0400_0001;

pub fn registry() -> Registry {
    Registry::builder()
        .with_builtin_basics()
        .enumeration(
            EnumDef::new("Shading", "uint32")
                .option("FLAT", 0)
                .option("SMOOTH", 1),
        )
        .compound(
            CompoundDef::new("Color")
                .field(FieldDef::new("r", "float"))
                .field(FieldDef::new("g", "float"))
                .field(FieldDef::new("b", "float"))
                .field(FieldDef::new("a", "float").default_value("1.0")),
        )
        .compound(
            CompoundDef::new("Triangle")
                .field(FieldDef::new("v1", "uint16"))
                .field(FieldDef::new("v2", "uint16"))
                .field(FieldDef::new("v3", "uint16")),
        )
        .compound(
            CompoundDef::block("AVObject")
                .abstract_type()
                .field(FieldDef::new("Name", "string"))
                .field(FieldDef::new("Num Properties", "uint32"))
                .field(
                    FieldDef::new("Properties", "Ref")
                        .template("Property")
                        .length("Num Properties"),
                ),
        )
        .compound(
            CompoundDef::block("Property")
                .abstract_type()
                .field(FieldDef::new("Name", "string")),
        )
        .compound(
            CompoundDef::block("Material")
                .inherit("Property")
                .field(FieldDef::new("Diffuse", "Color"))
                .field(FieldDef::new("Shading", "Shading"))
                .field(FieldDef::new("Glossiness", "float").default_value("10.0")),
        )
        .compound(
            CompoundDef::block("SceneNode")
                .inherit("AVObject")
                .field(FieldDef::new("Old Flags", "uint32").until("4.0.0.1"))
                .field(FieldDef::new("Flags", "uint16").since("4.0.0.2"))
                .field(FieldDef::new("Num Children", "uint32"))
                .field(
                    FieldDef::new("Children", "Ref")
                        .template("AVObject")
                        .length("Num Children"),
                ),
        )
        .compound(
            CompoundDef::block("TriMesh")
                .inherit("AVObject")
                .field(FieldDef::new("Num Vertices", "uint16"))
                .field(
                    FieldDef::new("Vertices", "float")
                        .length("Num Vertices")
                        .width("3"),
                )
                .field(FieldDef::new("Has Normals", "bool8"))
                .field(
                    FieldDef::new("Normals", "float")
                        .length("Num Vertices")
                        .width("3")
                        .condition("Has Normals"),
                )
                .field(FieldDef::new("Num Strips", "uint16"))
                .field(FieldDef::new("Strip Lengths", "uint16").length("Num Strips"))
                .field(
                    FieldDef::new("Strips", "uint16")
                        .length("Num Strips")
                        .width("Strip Lengths"),
                )
                .field(FieldDef::new("Num Triangles", "uint16"))
                .field(FieldDef::new("Triangles", "Triangle").length("Num Triangles"))
                .field(FieldDef::new("Skin", "Ptr").template("SceneNode")),
        )
        .build()
        .expect("scene schema is valid")
}

pub fn format() -> FileFormat {
    FileFormat::new("Scene", b"SCENE FILE\n")
        .with_versions(vec![V4, V20])
        .with_extensions(&["scn"])
}

/// Appends `child` to a link list of `parent` and bumps its count.
pub fn append(
    file: &mut BlockFile<'_>,
    parent: BlockId,
    count: &str,
    list: &str,
    child: BlockId,
) -> Result<()> {
    let ctx = file.context();
    let block = file.graph.get_mut(parent)?;
    let n = block.array(list)?.len();
    block.set(count, (n + 1) as u32)?;
    block.update_size(&ctx, list)?;
    block.array_mut(list)?.set_value(n, child)
}

pub fn adopt(file: &mut BlockFile<'_>, parent: BlockId, child: BlockId) -> Result<()> {
    append(file, parent, "Num Children", "Children", child)
}

pub struct Scene {
    pub root: BlockId,
    pub group: BlockId,
    pub mesh: BlockId,
    pub material: BlockId,
}

/// root -> (group, mesh -> material); mesh.skin points back at root.
pub fn scene(file: &mut BlockFile<'_>) -> Result<Scene> {
    let ctx = file.context();
    let root = file.create_block("SceneNode")?;
    let group = file.create_block("SceneNode")?;
    let mesh = file.create_block("TriMesh")?;
    let material = file.create_block("Material")?;

    file.graph.get_mut(root)?.set("Name", "Scene Root")?;
    file.graph.get_mut(group)?.set("Name", "Lights")?;

    let block = file.graph.get_mut(mesh)?;
    block.set("Name", "Cube")?;
    block.set("Num Vertices", 3_u16)?;
    block.set("Has Normals", true)?;
    block.refresh(&ctx)?;
    let vertices = block.array_mut("Vertices")?;
    for row in 0..3 {
        vertices.set_value2(row, row, 1.0_f32)?;
    }
    block.array_mut("Normals")?.set_value2(2, 2, -1.0_f32)?;
    block.set("Num Strips", 2_u16)?;
    block.update_size(&ctx, "Strip Lengths")?;
    block.array_mut("Strip Lengths")?.set_values(vec![3_u16, 4])?;
    block.update_size(&ctx, "Strips")?;
    block.array_mut("Strips")?.set_value2(1, 3, 9_u16)?;
    block.set("Num Triangles", 1_u16)?;
    block.update_size(&ctx, "Triangles")?;
    let triangle = block.array_mut("Triangles")?.compound_mut(0)?;
    triangle.set("v2", 1_u16)?;
    triangle.set("v3", 2_u16)?;
    block.set("Skin", root)?;

    let block = file.graph.get_mut(material)?;
    block.set("Name", "Cube")?;
    block.set("Shading", "SMOOTH")?;
    block.compound_mut("Diffuse")?.set("r", 0.5_f32)?;

    adopt(file, root, group)?;
    adopt(file, root, mesh)?;
    append(file, mesh, "Num Properties", "Properties", material)?;
    file.graph.add_root(root);

    Ok(Scene {
        root,
        group,
        mesh,
        material,
    })
}
