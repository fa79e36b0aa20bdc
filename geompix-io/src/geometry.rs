//! Loading geometry files from disk.

use std::path::Path;

use geompix_core::Geometry;
use geompix_crystfel::{GeometryParser, ParserConfig};

use crate::{Error, Result};

/// Reads and parses a geometry file with the default parser configuration.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Geometry`]
/// if its contents do not parse.
pub fn load_geometry<P: AsRef<Path>>(path: P) -> Result<Geometry> {
    load_geometry_with(path, &ParserConfig::default())
}

/// Reads and parses a geometry file with the given parser configuration.
///
/// # Errors
/// See [`load_geometry`].
pub fn load_geometry_with<P: AsRef<Path>>(path: P, config: &ParserConfig) -> Result<Geometry> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let geometry = GeometryParser::with_config(config.clone())
        .parse(&source)
        .map_err(|source| Error::Geometry {
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!(
        "loaded {} panels from {}",
        geometry.panels().len(),
        path.display()
    );
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PANEL: &str = "\
p/min_fs = 0
p/max_fs = 3
p/min_ss = 0
p/max_ss = 1
p/corner_x = 0
p/corner_y = 0
p/res = 5000
p/fs = x
p/ss = y
";

    #[test]
    fn test_load_geometry() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PANEL.as_bytes()).unwrap();

        let geometry = load_geometry(file.path()).unwrap();
        assert_eq!(geometry.raw_shape(), (2, 4));
    }

    #[test]
    fn test_load_geometry_parse_error_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{PANEL}p/extra = 1").unwrap();

        let strict = ParserConfig::new().with_strict(true);
        let err = load_geometry_with(file.path(), &strict).unwrap_err();
        assert!(matches!(err, Error::Geometry { .. }));
        assert!(err
            .to_string()
            .contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_geometry_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_geometry(dir.path().join("absent.geom")),
            Err(Error::Io(_))
        ));
    }
}
