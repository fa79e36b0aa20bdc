//! File writers for assembled frames.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::ArrayView2;

use crate::reader::RawElement;
use crate::Result;

/// Output encoding of a written frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One comma-separated line per row.
    #[default]
    Csv,
    /// Little-endian elements in row-major order.
    Binary,
}

impl OutputFormat {
    /// Picks the format from a path's extension: `.csv` is CSV, anything
    /// else binary.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Binary,
        }
    }
}

/// Writer for assembled frames and masks.
pub struct FrameWriter {
    writer: BufWriter<File>,
    format: OutputFormat,
}

impl FrameWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer, format })
    }

    /// Output format of this writer.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Writes a frame.
    ///
    /// # Errors
    /// Propagates write errors.
    pub fn write_frame<T: RawElement + Display>(&mut self, frame: ArrayView2<'_, T>) -> Result<()> {
        match self.format {
            OutputFormat::Csv => self.write_csv(frame, |w, v| write!(w, "{v}")),
            OutputFormat::Binary => {
                for value in frame {
                    value.write_le(&mut self.writer)?;
                }
                self.writer.flush()?;
                Ok(())
            }
        }
    }

    /// Writes a mask as 0/1 values, one byte per cell in binary format.
    ///
    /// # Errors
    /// Propagates write errors.
    pub fn write_mask(&mut self, mask: ArrayView2<'_, bool>) -> Result<()> {
        match self.format {
            OutputFormat::Csv => self.write_csv(mask, |w, &v| write!(w, "{}", u8::from(v))),
            OutputFormat::Binary => {
                let bytes: Vec<u8> = mask.iter().map(|&v| u8::from(v)).collect();
                self.writer.write_all(&bytes)?;
                self.writer.flush()?;
                Ok(())
            }
        }
    }

    fn write_csv<T, F>(&mut self, values: ArrayView2<'_, T>, mut write_value: F) -> Result<()>
    where
        F: FnMut(&mut BufWriter<File>, &T) -> std::io::Result<()>,
    {
        for row in values.rows() {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    self.writer.write_all(b",")?;
                }
                write_value(&mut self.writer, value)?;
            }
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Propagates flush errors.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("OUT.CSV")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("out.bin")), OutputFormat::Binary);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Binary);
    }

    #[test]
    fn test_write_frame_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = FrameWriter::create(file.path(), OutputFormat::Csv).unwrap();

        writer.write_frame(array![[1.5f32, -2.0], [0.0, 10.25]].view()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "1.5,-2\n0,10.25\n");
    }

    #[test]
    fn test_write_mask_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = FrameWriter::create(file.path(), OutputFormat::Csv).unwrap();

        writer.write_mask(array![[true, false, true]].view()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "1,0,1\n");
    }

    #[test]
    fn test_write_frame_binary() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = FrameWriter::create(file.path(), OutputFormat::Binary).unwrap();

        writer.write_frame(array![[1u16, 258]].view()).unwrap();
        writer.write_mask(array![[true, false]].view()).unwrap();

        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data, vec![1, 0, 2, 1, 1, 0]);
    }
}
