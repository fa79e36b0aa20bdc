//! Memory-mapped raw frame readers.
//!
//! Raw files are headerless: consecutive frames of `rows * cols`
//! little-endian elements.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use memmap2::Mmap;
use ndarray::Array2;
use rayon::prelude::*;

use crate::{Error, Result};

/// Element type of a raw frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    U16,
    U32,
    I16,
    I32,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Lower-case name as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(Self::U8),
            "u16" => Ok(Self::U16),
            "u32" => Ok(Self::U32),
            "i16" => Ok(Self::I16),
            "i32" => Ok(Self::I32),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            other => Err(Error::InvalidFormat(format!(
                "unknown element type {other:?}"
            ))),
        }
    }
}

/// A numeric type stored little-endian in raw frame files.
pub trait RawElement: Copy + Send + Sync + 'static {
    /// Element type tag of this type.
    const TYPE: ElementType;

    /// Decodes one element from exactly [`ElementType::size`] bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Writes the little-endian encoding of the element.
    ///
    /// # Errors
    /// Propagates errors from the writer.
    fn write_le<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
}

macro_rules! impl_raw_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl RawElement for $ty {
                const TYPE: ElementType = ElementType::$tag;

                #[inline]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                #[inline]
                fn write_le<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
                    writer.write_all(&self.to_le_bytes())
                }
            }
        )*
    };
}

impl_raw_element!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i16 => I16,
    i32 => I32,
    f32 => F32,
    f64 => F64,
);

/// A memory-mapped file of fixed-shape raw frames.
pub struct RawFrameReader {
    mmap: Mmap,
    path: PathBuf,
    element: ElementType,
    shape: (usize, usize),
    frame_count: usize,
}

impl RawFrameReader {
    /// Opens a raw frame file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be opened or mapped and
    /// [`Error::InvalidFormat`] for an empty frame shape or a file that
    /// ends in a partial frame.
    pub fn open<P: AsRef<Path>>(
        path: P,
        element: ElementType,
        shape: (usize, usize),
    ) -> Result<Self> {
        let path = path.as_ref();
        let frame_bytes = shape.0 * shape.1 * element.size();
        if frame_bytes == 0 {
            return Err(Error::InvalidFormat(format!(
                "frame shape {shape:?} holds no elements"
            )));
        }

        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        if !mmap.len().is_multiple_of(frame_bytes) {
            return Err(Error::InvalidFormat(format!(
                "{}: {} bytes is not a whole number of {} byte {element} frames",
                path.display(),
                mmap.len(),
                frame_bytes
            )));
        }
        let frame_count = mmap.len() / frame_bytes;
        log::debug!(
            "mapped {}: {frame_count} frames of {}x{} {element}",
            path.display(),
            shape.0,
            shape.1
        );

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            element,
            shape,
            frame_count,
        })
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Element type of the file.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element
    }

    /// Shape `(rows, cols)` of each frame.
    #[must_use]
    pub fn frame_shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of whole frames in the file.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn frame_bytes(&self) -> usize {
        self.shape.0 * self.shape.1 * self.element.size()
    }

    /// Decodes one frame.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if `T` does not match the file's
    /// element type or `index` is out of range.
    pub fn frame<T: RawElement>(&self, index: usize) -> Result<Array2<T>> {
        if T::TYPE != self.element {
            return Err(Error::InvalidFormat(format!(
                "requested {} elements from a {} file",
                T::TYPE,
                self.element
            )));
        }
        if index >= self.frame_count {
            return Err(Error::InvalidFormat(format!(
                "frame {index} out of range ({} frames)",
                self.frame_count
            )));
        }

        let start = index * self.frame_bytes();
        let bytes = &self.mmap[start..start + self.frame_bytes()];
        let values: Vec<T> = bytes
            .chunks_exact(self.element.size())
            .map(T::from_le_slice)
            .collect();
        Array2::from_shape_vec(self.shape, values)
            .map_err(|e| Error::InvalidFormat(e.to_string()))
    }

    /// Decodes every frame in parallel, in file order.
    ///
    /// # Errors
    /// See [`RawFrameReader::frame`].
    pub fn frames<T: RawElement>(&self) -> Result<Vec<Array2<T>>> {
        (0..self.frame_count)
            .into_par_iter()
            .map(|index| self.frame(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use ndarray::array;
    use tempfile::NamedTempFile;

    fn write_elements<T: RawElement>(values: &[T]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for value in values {
            value.write_le(&mut file).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_element_type_names() {
        for element in [
            ElementType::U8,
            ElementType::U16,
            ElementType::U32,
            ElementType::I16,
            ElementType::I32,
            ElementType::F32,
            ElementType::F64,
        ] {
            assert_eq!(element.name().parse::<ElementType>().unwrap(), element);
        }
        assert_eq!("F32".parse::<ElementType>().unwrap(), ElementType::F32);
        assert!("u64".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_read_u16_frames() {
        let file = write_elements(&[1u16, 2, 3, 4, 5, 6, 7, 8]);
        let reader = RawFrameReader::open(file.path(), ElementType::U16, (2, 2)).unwrap();
        assert_eq!(reader.frame_count(), 2);
        assert_eq!(reader.frame::<u16>(1).unwrap(), array![[5u16, 6], [7, 8]]);

        let frames = reader.frames::<u16>().unwrap();
        assert_eq!(frames[0], array![[1u16, 2], [3, 4]]);
    }

    #[test]
    fn test_read_signed_and_float_frames() {
        let file = write_elements(&[-1i32, 0, 70_000]);
        let reader = RawFrameReader::open(file.path(), ElementType::I32, (1, 3)).unwrap();
        assert_eq!(reader.frame::<i32>(0).unwrap(), array![[-1, 0, 70_000]]);

        let file = write_elements(&[0.5f64, -2.25]);
        let reader = RawFrameReader::open(file.path(), ElementType::F64, (2, 1)).unwrap();
        assert_eq!(reader.frame::<f64>(0).unwrap(), array![[0.5], [-2.25]]);
    }

    #[test]
    fn test_partial_frame_rejected() {
        let file = write_elements(&[1.0f32, 2.0, 3.0, 4.0, 5.0]);
        assert!(matches!(
            RawFrameReader::open(file.path(), ElementType::F32, (2, 2)),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_type_and_index_checks() {
        let file = write_elements(&[1u8, 2, 3, 4]);
        let reader = RawFrameReader::open(file.path(), ElementType::U8, (2, 2)).unwrap();
        assert!(matches!(reader.frame::<u16>(0), Err(Error::InvalidFormat(_))));
        assert!(matches!(reader.frame::<u8>(1), Err(Error::InvalidFormat(_))));
        assert!(matches!(
            RawFrameReader::open(file.path(), ElementType::U8, (0, 4)),
            Err(Error::InvalidFormat(_))
        ));
    }
}
