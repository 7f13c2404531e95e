//! Descriptor files
//!
//! One `.data` file per video, one descriptor per line:
//! frame value value ...
//!
//! Example:
//! 0 0.12 -1.5 3.0
//! 0 0.40 -0.2 2.5
//! 3 0.05 0.7 1.0

use crate::core::{HarnessError, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Extension of descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "data";

/// A descriptor extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorRecord {
    pub frame: usize,
    pub values: Vec<f64>,
}

impl DescriptorRecord {
    pub fn new(frame: usize, values: Vec<f64>) -> Self {
        Self { frame, values }
    }
}

/// Every descriptor of a video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorFile {
    records: Vec<DescriptorRecord>,
}

impl DescriptorFile {
    /// Build from records that share one dimension
    pub fn new(records: Vec<DescriptorRecord>) -> Result<Self> {
        if let Some(first) = records.first() {
            let dim = first.values.len();
            if let Some(bad) = records.iter().find(|r| r.values.len() != dim) {
                return Err(HarnessError::DimensionMismatch {
                    expected: dim,
                    actual: bad.values.len(),
                });
            }
        }
        Ok(Self { records })
    }

    /// Load a descriptor file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(HarnessError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load descriptors from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut records: Vec<DescriptorRecord> = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(HarnessError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record = Self::parse_line(line).map_err(|e| {
                HarnessError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;

            if let Some(first) = records.first() {
                if first.values.len() != record.values.len() {
                    return Err(HarnessError::ParseError(format!(
                        "Error parsing line {}: expected {} values, got {}",
                        line_num + 1,
                        first.values.len(),
                        record.values.len()
                    )));
                }
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    fn parse_line(line: &str) -> Result<DescriptorRecord> {
        let mut parts = line.split_whitespace();

        let frame = parts
            .next()
            .ok_or_else(|| HarnessError::ParseError("Empty line".to_string()))?;
        let frame = frame
            .parse::<usize>()
            .map_err(|_| HarnessError::ParseError(format!("Invalid frame index: {frame}")))?;

        let values = parts
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| HarnessError::ParseError(format!("Invalid value: {v}")))
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.is_empty() {
            return Err(HarnessError::ParseError(format!(
                "Descriptor of frame {frame} has no values"
            )));
        }

        Ok(DescriptorRecord { frame, values })
    }

    /// Write the descriptors in the on-disk format
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(HarnessError::IoError)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(HarnessError::IoError)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for record in &self.records {
            write!(writer, "{}", record.frame)?;
            for value in &record.values {
                write!(writer, " {value}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn records(&self) -> &[DescriptorRecord] {
        &self.records
    }

    /// Descriptor dimension, `None` when the file holds no records
    pub fn dim(&self) -> Option<usize> {
        self.records.first().map(|r| r.values.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A descriptor file and the name the ground truth knows it by
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
}

impl Sample {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn load(&self) -> Result<DescriptorFile> {
        DescriptorFile::from_file(&self.path)
    }
}

/// Every descriptor file of a directory, sorted by name
pub fn list_samples<P: AsRef<Path>>(dir: P) -> Result<Vec<Sample>> {
    let dir = dir.as_ref();
    let mut samples = Vec::new();

    for entry in fs::read_dir(dir).map_err(HarnessError::IoError)? {
        let path = entry.map_err(HarnessError::IoError)?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION)
        {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                HarnessError::InvalidDataset(format!("Invalid file name: {}", path.display()))
            })?
            .to_string();
        samples.push(Sample { name, path });
    }

    samples.sort();
    log::debug!("Found {} descriptor files in {}", samples.len(), dir.display());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_parse_descriptors() {
        let data = "# header\n0 1.0 2.0\n\n0 1.5 -2.0\n4 0.0 3.25\n";
        let file = DescriptorFile::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(file.len(), 3);
        assert_eq!(file.dim(), Some(2));
        assert_eq!(file.records()[2], DescriptorRecord::new(4, vec![0.0, 3.25]));
    }

    #[test]
    fn test_parse_empty_file() {
        let file = DescriptorFile::from_reader(Cursor::new("")).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.dim(), None);
    }

    #[test]
    fn test_parse_invalid_lines() {
        assert!(DescriptorFile::from_reader(Cursor::new("x 1.0\n")).is_err());
        assert!(DescriptorFile::from_reader(Cursor::new("0 abc\n")).is_err());
        assert!(DescriptorFile::from_reader(Cursor::new("3\n")).is_err());
        assert!(DescriptorFile::from_reader(Cursor::new("-1 1.0\n")).is_err());
    }

    #[test]
    fn test_parse_dimension_mismatch() {
        let result = DescriptorFile::from_reader(Cursor::new("0 1.0 2.0\n1 1.0\n"));
        match result {
            Err(HarnessError::ParseError(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(DescriptorFile::new(vec![
            DescriptorRecord::new(0, vec![1.0]),
            DescriptorRecord::new(1, vec![1.0, 2.0]),
        ])
        .is_err());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video.data");
        let file = DescriptorFile::new(vec![
            DescriptorRecord::new(0, vec![0.5, -1.0]),
            DescriptorRecord::new(2, vec![3.0, 4.0]),
        ])
        .unwrap();

        file.write_to_file(&path).unwrap();
        assert_eq!(DescriptorFile::from_file(&path).unwrap(), file);
    }

    #[test]
    fn test_list_samples_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.data", "a.data", "notes.txt", "c.data"] {
            std::fs::write(dir.path().join(name), "0 1.0\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.data")).unwrap();

        let samples = list_samples(dir.path()).unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(samples[0].load().is_ok());
    }

    #[test]
    fn test_list_samples_missing_dir() {
        assert!(matches!(
            list_samples("/nonexistent/descriptors"),
            Err(HarnessError::IoError(_))
        ));
    }
}
