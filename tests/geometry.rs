use std::fs;

use bevy::math::{
    Vec2,
    Vec3,
};
use bevy_persist::prelude::*;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    register_scene_types(&mut registry).unwrap();
    registry
}

fn triangle() -> MeshGeometry {
    MeshGeometry::new(
        vec![
            Vertex::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        ],
        vec![0, 1, 2],
    )
}

#[test]
fn test_side_file_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let registry = registry();

    bevy_persist::serialize(&registry, &MeshNode::new("rock", triangle()), &path)?;

    let side = dir.path().join("rock_geometry/0.mesh.geom");
    assert_eq!(fs::metadata(&side)?.len(), 4 + 3 * 2 + 4 + 3 * 12 + 3 * 12 + 3 * 8);
    assert!(!fs::read_to_string(&path)?.contains("mesh"));

    let loaded = bevy_persist::deserialize::<MeshNode>(&registry, &path)?
        .downcast::<MeshNode>()
        .unwrap();

    assert_eq!(loaded.mesh.indices, vec![0, 1, 2]);
    assert_eq!(loaded.mesh, triangle());

    Ok(())
}

#[test]
fn test_custom_side_file_naming() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let registry = registry();

    let settings = Settings::from_toml_str(
        r#"
        geometry_dir_suffix = ".blobs"
        binary_extension = "bin"
        "#,
    )?;
    let persister = Persister::new(&registry).with_settings(settings);

    persister.serialize(&MeshNode::new("rock", triangle()), &path)?;

    assert!(dir.path().join("rock.blobs/0.mesh.bin").is_file());
    assert!(persister.deserialize::<Node>(&path).is_ok());

    Ok(())
}

#[test]
fn test_stale_side_files_are_removed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let geometry = dir.path().join("rock_geometry");

    fs::create_dir(&geometry)?;
    fs::write(geometry.join("7.mesh.geom"), b"stale")?;

    bevy_persist::serialize(&registry(), &MeshNode::new("rock", triangle()), &path)?;

    assert!(!geometry.join("7.mesh.geom").exists());
    assert!(geometry.join("0.mesh.geom").is_file());

    bevy_persist::serialize(&registry(), &Node::new("no geometry"), &path)?;

    assert!(!geometry.exists());

    Ok(())
}

#[test]
fn test_missing_side_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let registry = registry();

    bevy_persist::serialize(&registry, &MeshNode::new("rock", triangle()), &path)?;
    fs::remove_file(dir.path().join("rock_geometry/0.mesh.geom"))?;

    let err = bevy_persist::deserialize::<MeshNode>(&registry, &path).unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::Io { .. }));

    Ok(())
}

#[test]
fn test_truncated_side_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let side = dir.path().join("rock_geometry/0.mesh.geom");
    let registry = registry();

    bevy_persist::serialize(&registry, &MeshNode::new("rock", triangle()), &path)?;

    let mut bytes = fs::read(&side)?;
    bytes.pop();
    fs::write(&side, &bytes)?;

    let err = bevy_persist::deserialize::<MeshNode>(&registry, &path).unwrap_err();

    assert!(matches!(
        err.kind(),
        ErrorKind::UnexpectedEndOfFile { .. } | ErrorKind::SizeMismatch { .. }
    ));

    Ok(())
}

#[test]
fn test_out_of_range_indices_fail_post_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rock.toml");
    let registry = registry();

    let mut broken = triangle();
    broken.indices = vec![0, 1, 3];

    bevy_persist::serialize(&registry, &MeshNode::new("rock", broken), &path)?;

    let err = bevy_persist::deserialize::<MeshNode>(&registry, &path).unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::InvalidValue { .. }));
    assert!(err.to_string().contains("while running post-load"));

    Ok(())
}

#[test]
fn test_geometry_is_never_back_referenced() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.toml");
    let b = dir.path().join("b.toml");
    let registry = registry();

    bevy_persist::serialize(&registry, &MeshNode::new("rock", triangle()), &a)?;
    let loaded = bevy_persist::deserialize::<MeshNode>(&registry, &a)?;
    bevy_persist::serialize(&registry, loaded.as_ref(), &b)?;

    assert!(dir.path().join("b_geometry/0.mesh.geom").is_file());
    assert!(fs::read_to_string(&b)?.contains(".path_to_original"));

    fs::remove_dir_all(dir.path().join("a_geometry"))?;

    let reloaded = bevy_persist::deserialize::<MeshNode>(&registry, &b)?
        .downcast::<MeshNode>()
        .unwrap();

    assert_eq!(reloaded.mesh, triangle());
    assert_eq!(reloaded.node.name, "rock");

    Ok(())
}
