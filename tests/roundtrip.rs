use std::fs;

use bevy::math::{
    Vec2,
    Vec3,
    Vec4,
};
use bevy_persist::prelude::*;

const EPSILON: f32 = 1e-5;

#[derive(Reflected, Default, Debug)]
#[reflected(guid = "test-everything")]
struct Everything {
    #[reflected(origin)]
    origin: Option<Origin>,
    #[reflected(id)]
    id: Option<String>,
    flag: bool,
    i_int: i32,
    i_long: i64,
    u_int: u32,
    u_long: u64,
    ratio: f32,
    label: String,
    uv: Vec2,
    offset: Vec3,
    tint: Vec4,
    ints: Vec<i32>,
    floats: Vec<f32>,
    names: Vec<String>,
    points: Vec<Vec3>,
    mesh: MeshGeometry,
}

impl Everything {
    fn sample() -> Self {
        Self {
            flag: true,
            i_int: -42,
            i_long: -9_000_000_000,
            u_int: 4_000_000_000,
            u_long: 1 << 40,
            ratio: 0.1,
            label: "quoted \"text\"\nacross lines".into(),
            uv: Vec2::new(1.5, -2.25),
            offset: Vec3::new(0.1, 0.2, 0.3),
            tint: Vec4::new(1.0, 0.5, 0.25, 0.75),
            ints: vec![1, -2, 3],
            floats: vec![0.5, -0.125],
            names: vec!["alpha".into(), "beta".into()],
            points: vec![Vec3::X, Vec3::new(1.0, 2.0, 3.0)],
            mesh: triangle(),
            ..Default::default()
        }
    }

    fn with_int(i_int: i32) -> Self {
        Self {
            i_int,
            ..Default::default()
        }
    }
}

#[derive(Reflected, Default, Debug)]
#[reflected(guid = "test-special")]
struct Special {
    #[reflected(base)]
    base: Everything,
    extra: String,
    weights: Vec<Vec2>,
}

fn triangle() -> MeshGeometry {
    MeshGeometry::new(
        vec![
            Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO),
            Vertex::new(Vec3::X, Vec3::Z, Vec2::X),
            Vertex::new(Vec3::Y, Vec3::Z, Vec2::Y),
        ],
        vec![0, 1, 2],
    )
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();

    registry
        .register(
            TypeDescriptor::of::<Everything>("Everything")
                .field("flag", |t| t.flag, |t, v| t.flag = v)
                .field("iInt", |t| t.i_int, |t, v| t.i_int = v)
                .field("iLong", |t| t.i_long, |t, v| t.i_long = v)
                .field("uInt", |t| t.u_int, |t, v| t.u_int = v)
                .field("uLong", |t| t.u_long, |t, v| t.u_long = v)
                .field("ratio", |t| t.ratio, |t, v| t.ratio = v)
                .field("label", |t| t.label.clone(), |t, v| t.label = v)
                .field("uv", |t| t.uv, |t, v| t.uv = v)
                .field("offset", |t| t.offset, |t, v| t.offset = v)
                .field("tint", |t| t.tint, |t, v| t.tint = v)
                .field("ints", |t| t.ints.clone(), |t, v| t.ints = v)
                .field("floats", |t| t.floats.clone(), |t, v| t.floats = v)
                .field("names", |t| t.names.clone(), |t, v| t.names = v)
                .field("points", |t| t.points.clone(), |t, v| t.points = v)
                .field("mesh", |t| t.mesh.clone(), |t, v| t.mesh = v),
        )
        .unwrap();

    registry
        .register(
            TypeDescriptor::of::<Special>("Special")
                .parent::<Everything>()
                .field("extra", |t| t.extra.clone(), |t, v| t.extra = v)
                .field("weights", |t| t.weights.clone(), |t, v| t.weights = v),
        )
        .unwrap();

    registry
}

fn assert_same(expected: &Everything, actual: &Everything) {
    assert_eq!(expected.flag, actual.flag);
    assert_eq!(expected.i_int, actual.i_int);
    assert_eq!(expected.i_long, actual.i_long);
    assert_eq!(expected.u_int, actual.u_int);
    assert_eq!(expected.u_long, actual.u_long);
    assert!((expected.ratio - actual.ratio).abs() < EPSILON);
    assert_eq!(expected.label, actual.label);
    assert!(expected.uv.abs_diff_eq(actual.uv, EPSILON));
    assert!(expected.offset.abs_diff_eq(actual.offset, EPSILON));
    assert!(expected.tint.abs_diff_eq(actual.tint, EPSILON));
    assert_eq!(expected.ints, actual.ints);
    assert_eq!(expected.floats.len(), actual.floats.len());
    for (e, a) in expected.floats.iter().zip(&actual.floats) {
        assert!((e - a).abs() < EPSILON);
    }
    assert_eq!(expected.names, actual.names);
    assert_eq!(expected.points.len(), actual.points.len());
    for (e, a) in expected.points.iter().zip(&actual.points) {
        assert!(e.abs_diff_eq(*a, EPSILON));
    }
    assert_eq!(expected.mesh.indices, actual.mesh.indices);
    assert_eq!(expected.mesh.vertices, actual.mesh.vertices);
}

#[test]
fn test_every_kind_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("everything.toml");
    let registry = registry();

    let mut original = Everything::sample();
    original.id = Some("the-one".into());

    bevy_persist::serialize(&registry, &original, &path)?;

    let loaded = bevy_persist::deserialize::<Everything>(&registry, &path)?
        .downcast::<Everything>()
        .unwrap();

    assert_same(&original, &loaded);
    assert_eq!(loaded.id.as_deref(), Some("the-one"));

    let origin = loaded.origin.as_ref().unwrap();
    assert_eq!(origin.path, path.canonicalize()?);
    assert_eq!(origin.section, "0.test-everything");

    let text = fs::read_to_string(&path)?;
    assert!(text.contains("iInt = -42"));
    assert!(!text.contains("positions"));
    assert!(dir.path().join("everything_geometry/0.mesh.geom").is_file());

    Ok(())
}

#[test]
fn test_fields_are_written_most_derived_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("special.toml");

    let special = Special {
        extra: "x".into(),
        ..Default::default()
    };

    bevy_persist::serialize(&registry(), &special, &path)?;

    let text = fs::read_to_string(&path)?;
    assert!(text.find("extra").unwrap() < text.find("flag").unwrap());
    assert!(text.find("weights").unwrap() < text.find("iInt").unwrap());

    Ok(())
}

#[test]
fn test_subtype_round_trips_through_base_api() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("special.toml");
    let registry = registry();

    let original = Special {
        base: Everything::sample(),
        extra: "derived".into(),
        weights: vec![Vec2::new(0.25, 0.75)],
    };

    bevy_persist::serialize(&registry, &original, &path)?;

    let loaded = bevy_persist::deserialize::<Everything>(&registry, &path)?;

    assert_eq!(loaded.type_guid(), "test-special");
    assert!(loaded.is::<Special>());
    assert_same(&original.base, loaded.part_of::<Everything>().unwrap());

    let special = loaded.downcast::<Special>().unwrap();
    assert_eq!(special.extra, "derived");
    assert_eq!(special.weights, vec![Vec2::new(0.25, 0.75)]);

    Ok(())
}

#[test]
fn test_base_is_not_a_subtype() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("base.toml");
    let registry = registry();

    bevy_persist::serialize(&registry, &Everything::sample(), &path)?;

    let err = bevy_persist::deserialize::<Special>(&registry, &path).unwrap_err();

    assert!(matches!(
        err.kind(),
        ErrorKind::TypeMismatch { expected, found } if expected == "test-special" && found == "test-everything"
    ));

    Ok(())
}

#[test]
fn test_multiple_objects_in_one_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pair.toml");
    let registry = registry();

    let first = Everything::with_int(100);
    let second = Everything::with_int(200);

    bevy_persist::serialize_all(&registry, &[&first, &second], &path)?;

    let loaded = bevy_persist::deserialize_all(&registry, &path)?;
    let ints = loaded
        .iter()
        .map(|o| o.downcast_ref::<Everything>().unwrap().i_int)
        .collect::<Vec<_>>();

    assert_eq!(ints, vec![100, 200]);
    assert_eq!(loaded[1].origin().unwrap().section, "1.test-everything");

    Ok(())
}

#[test]
fn test_text_only_copy_is_self_contained() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("everything.toml");
    let registry = registry();

    let persister = Persister::new(&registry).with_settings(Settings::default().with_text_only_copy(true));
    let original = Everything::sample();

    persister.serialize(&original, &path)?;

    let copy = dir.path().join("everything.text.toml");
    let text = fs::read_to_string(&copy)?;
    assert!(text.contains("positions"));
    assert!(text.contains("indices"));

    fs::remove_dir_all(dir.path().join("everything_geometry"))?;

    let loaded = persister
        .deserialize::<Everything>(&copy)?
        .downcast::<Everything>()
        .unwrap();

    assert_same(&original, &loaded);

    Ok(())
}

#[test]
#[cfg(feature = "json")]
fn test_json_documents() -> anyhow::Result<()> {
    use bevy_persist::JsonFormat;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("everything.json");
    let registry = registry();

    let persister = Persister::new(&registry).with_format::<JsonFormat>();
    let original = Everything::sample();

    persister.serialize(&original, &path)?;

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    assert_eq!(raw[".version"], "1.0.0");
    assert_eq!(raw["0.test-everything"]["iInt"], -42);

    let loaded = persister
        .deserialize::<Everything>(&path)?
        .downcast::<Everything>()
        .unwrap();

    assert_same(&original, &loaded);

    Ok(())
}

#[test]
fn test_u64_beyond_document_integers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("huge.toml");

    let huge = Everything {
        u_long: u64::MAX,
        ..Default::default()
    };

    let err = bevy_persist::serialize(&registry(), &huge, &path).unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::LimitExceeded { .. }));
    assert!(!path.exists());

    Ok(())
}

#[test]
fn test_unregistered_type() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("unknown.toml");

    let err = bevy_persist::serialize(&TypeRegistry::new(), &Everything::default(), &path).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownType { .. }));

    fs::write(&path, "[\"0.not-registered\"]\nx = 1\n")?;

    let err = bevy_persist::deserialize_tree(&registry(), &path).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownType { guid } if guid == "not-registered"));

    let rendered = err.to_string();
    assert!(rendered.contains("while loading section `0.not-registered`"));
    assert!(rendered.contains("while deserializing"));

    Ok(())
}
