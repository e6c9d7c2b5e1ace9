//! Reading and writing object graphs as documents.

mod de;
mod resolve;
mod ser;

use std::path::{
    Path,
    PathBuf,
};

pub use self::{
    de::Deserializer,
    ser::Serializer,
};
use crate::settings::Settings;

fn file_stem(document: &Path) -> String {
    document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory holding the binary geometry side files of `document`.
pub fn geometry_dir(document: &Path, settings: &Settings) -> PathBuf {
    let name = format!("{}{}", file_stem(document), settings.geometry_dir_suffix);
    document.with_file_name(name)
}

/// Side file holding blob field `field` of section `index` of `document`.
pub fn blob_path(document: &Path, index: u32, field: &str, settings: &Settings) -> PathBuf {
    geometry_dir(document, settings).join(format!("{index}.{field}.{}", settings.binary_extension))
}

/// Path of the self-contained text-only copy of `document`.
pub fn text_copy_path(document: &Path, extension: &str) -> PathBuf {
    document.with_file_name(format!("{}.text.{extension}", file_stem(document)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_file_naming() {
        let settings = Settings::default();
        let doc = Path::new("/levels/castle.toml");

        assert_eq!(geometry_dir(doc, &settings), Path::new("/levels/castle_geometry"));
        assert_eq!(
            blob_path(doc, 3, "mesh", &settings),
            Path::new("/levels/castle_geometry/3.mesh.geom")
        );
        assert_eq!(text_copy_path(doc, "toml"), Path::new("/levels/castle.text.toml"));
    }
}
