mod common;

use blockform::{
    Compound, CompoundDef, Context, DataError, Error, FieldDef, Registry, Shape, Value,
};
use common::V20;

fn counted() -> Registry {
    Registry::builder()
        .with_builtin_basics()
        .compound(
            CompoundDef::new("Counted")
                .field(FieldDef::new("count", "uint32"))
                .field(FieldDef::new("data", "int16").length("count")),
        )
        .build()
        .unwrap()
}

#[test]
fn count_and_data_stay_in_step() {
    let registry = counted();
    let ctx = Context::new(&registry, V20, 0);
    let mut c = Compound::by_name(&ctx, "Counted").unwrap();

    c.set("count", 5_u32).unwrap();
    c.update_size(&ctx, "data").unwrap();
    assert_eq!(c.array("data").unwrap().values().unwrap(), vec![Value::Int(0); 5]);
    c.array_mut("data").unwrap().set_values(vec![1_i16, 2, 3, 4, 5]).unwrap();

    c.set("count", 3_u32).unwrap();
    c.update_size(&ctx, "data").unwrap();
    assert_eq!(
        c.array("data").unwrap().values().unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );

    c.array_mut("data").unwrap().push(&ctx).unwrap();
    let err = c.write(&mut Vec::new(), &ctx).unwrap_err();
    assert!(matches!(err, Error::Data(DataError::SizeMismatch { .. })));
}

#[test]
fn range_checks_at_the_boundaries() {
    let registry = common::registry();
    let ctx = Context::new(&registry, V20, 0);
    let mut triangle = Compound::by_name(&ctx, "Triangle").unwrap();
    assert!(triangle.set("v1", 0_u16).is_ok());
    assert!(triangle.set("v1", 65535_u32).is_ok());
    assert!(triangle.set("v1", 65536_u32).is_err());
    assert!(triangle.set("v1", -1).is_err());
    assert_eq!(triangle.get("v1").unwrap(), Value::UInt(65535));
}

#[test]
fn jagged_rows_are_independent() {
    let registry = common::registry();
    let ctx = Context::new(&registry, V20, 0);
    let mut mesh = Compound::by_name(&ctx, "TriMesh").unwrap();
    mesh.set("num_strips", 3_u16).unwrap();
    mesh.update_size(&ctx, "strip_lengths").unwrap();
    mesh.array_mut("strip_lengths")
        .unwrap()
        .set_values(vec![2_u16, 2, 2])
        .unwrap();
    mesh.update_size(&ctx, "strips").unwrap();

    for row in 0..3 {
        mesh.array_mut("strip_lengths").unwrap().set_value(row, 5_u16).unwrap();
        mesh.update_size(&ctx, "strips").unwrap();
        let strips = mesh.array("strips").unwrap();
        for other in (0..3).filter(|r| *r != row) {
            let expected = if other < row { 5 } else { 2 };
            assert_eq!(strips.row_len(other), Some(expected));
        }
    }
    assert_eq!(mesh.array("strips").unwrap().shape(), Shape::Jagged(vec![5, 5, 5]));
}

#[test]
fn conditions_follow_earlier_fields() {
    let registry = common::registry();
    let ctx = Context::new(&registry, V20, 0);
    let mut mesh = Compound::by_name(&ctx, "TriMesh").unwrap();
    let without = mesh.get_size(&ctx).unwrap();
    assert!(!mesh.has_attribute("normals"));

    mesh.set("num_vertices", 2_u16).unwrap();
    mesh.set("has_normals", true).unwrap();
    mesh.refresh(&ctx).unwrap();
    assert_eq!(mesh.array("normals").unwrap().shape(), Shape::Jagged(vec![3, 3]));
    assert_eq!(mesh.get_size(&ctx).unwrap(), without + 2 * 2 * 3 * 4);

    let mut out = Vec::new();
    mesh.write(&mut out, &ctx).unwrap();
    assert_eq!(out.len(), mesh.get_size(&ctx).unwrap());
}

#[test]
fn attribute_names_list_bases_first() {
    let registry = common::registry();
    let ctx = Context::new(&registry, V20, 0);
    let node = Compound::by_name(&ctx, "SceneNode").unwrap();
    assert_eq!(
        node.attribute_names(&registry),
        vec![
            "name",
            "num_properties",
            "properties",
            "old_flags",
            "flags",
            "num_children",
            "children"
        ]
    );
}

#[test]
fn dump_is_readable() {
    let registry = common::registry();
    let ctx = Context::new(&registry, V20, 0);
    let mut material = Compound::by_name(&ctx, "Material").unwrap();
    material.set("shading", "SMOOTH").unwrap();
    let text = material.to_string();
    assert!(text.starts_with("<Material>\n"));
    assert!(text.contains("* shading : SMOOTH\n"));
    assert!(text.contains("* diffuse :\n    <Color>\n"));
}
