//! Whitespace-separated text images.
//!
//! One line per row, integer tokens per pixel. The reader derives the
//! shape from the file contents; rows must be rectangular and every value
//! must fit in a byte.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::DenoiseError;

/// A whole image as read by the coordinator, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<i8>,
}

impl Image {
    /// The chunk of row `r` spanning columns `c0 .. c0 + len`.
    pub fn row_chunk(&self, r: usize, c0: usize, len: usize) -> &[i8] {
        let start = r * self.cols + c0;
        &self.pixels[start..start + len]
    }
}

/// Read a text image, inferring `rows x cols` from the contents.
pub fn read_image(path: &Path) -> Result<Image, DenoiseError> {
    let reader = BufReader::new(File::open(path)?);
    let mut pixels = Vec::new();
    let mut cols = 0usize;
    let mut rows = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        let mut count = 0usize;
        for token in line.split_whitespace() {
            let value: i64 = token.parse().map_err(|_| DenoiseError::PixelParse {
                line: lineno,
                token: token.to_string(),
            })?;
            let value = i8::try_from(value)
                .map_err(|_| DenoiseError::PixelRange { line: lineno, value })?;
            pixels.push(value);
            count += 1;
        }
        if count == 0 {
            continue; // blank line
        }
        if rows == 0 {
            cols = count;
        } else if count != cols {
            return Err(DenoiseError::RaggedRow {
                line: lineno,
                expected: cols,
                found: count,
            });
        }
        rows += 1;
    }
    if rows == 0 {
        return Err(DenoiseError::EmptyImage);
    }
    Ok(Image { rows, cols, pixels })
}

/// Write a text image: space-separated values, one line per row.
pub fn write_image(path: &Path, image: &Image) -> Result<(), DenoiseError> {
    let mut out = BufWriter::new(File::create(path)?);
    for r in 0..image.rows {
        for c in 0..image.cols {
            write!(out, "{} ", image.pixels[r * image.cols + c])?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ising-denoise-textio-{name}"))
    }

    #[test]
    fn round_trip_preserves_shape_and_values() {
        let img = Image {
            rows: 2,
            cols: 3,
            pixels: vec![1, -1, 1, -1, 1, -1],
        };
        let path = tmp("roundtrip");
        write_image(&path, &img).unwrap();
        let back = read_image(&path).unwrap();
        assert_eq!(back, img);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let path = tmp("ragged");
        std::fs::write(&path, "1 -1 1\n1 -1\n").unwrap();
        assert!(matches!(
            read_image(&path),
            Err(DenoiseError::RaggedRow {
                line: 2,
                expected: 3,
                found: 2
            })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bad_tokens_and_wide_values_are_rejected() {
        let path = tmp("badtoken");
        std::fs::write(&path, "1 x 1\n").unwrap();
        assert!(matches!(
            read_image(&path),
            Err(DenoiseError::PixelParse { line: 1, .. })
        ));
        std::fs::write(&path, "1 300 1\n").unwrap();
        assert!(matches!(
            read_image(&path),
            Err(DenoiseError::PixelRange {
                line: 1,
                value: 300
            })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn blank_lines_are_skipped_and_empty_input_rejected() {
        let path = tmp("blank");
        std::fs::write(&path, "\n1 -1\n\n-1 1\n").unwrap();
        let img = read_image(&path).unwrap();
        assert_eq!((img.rows, img.cols), (2, 2));
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(read_image(&path), Err(DenoiseError::EmptyImage)));
        std::fs::remove_file(&path).unwrap();
    }
}
