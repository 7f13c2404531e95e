//! Ground truth files
//!
//! One entry per video:
//! name label                      (video classification, label 1 or -1)
//! name n_frames start end         (frame classification, frames in [start, end) are anomalous)

use crate::core::{HarnessError, Label, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Upper bound on the frame count of an annotated video
pub const MAX_FRAMES: usize = 1 << 24;

/// Annotation of a single video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTruthEntry {
    /// Whole-video label
    Video(Label),
    /// Anomalous frame interval `[start, end)`
    Frames {
        n_frames: usize,
        start: usize,
        end: usize,
    },
}

impl GroundTruthEntry {
    /// True for a normal video or a video with an empty anomalous interval
    pub fn is_normal(&self) -> bool {
        match *self {
            GroundTruthEntry::Video(label) => label == Label::Normal,
            GroundTruthEntry::Frames { start, end, .. } => start == end,
        }
    }

    /// Label of a frame, `None` for whole-video entries
    pub fn frame_label(&self, frame: usize) -> Option<Label> {
        match *self {
            GroundTruthEntry::Video(_) => None,
            GroundTruthEntry::Frames { start, end, .. } => {
                if (start..end).contains(&frame) {
                    Some(Label::Anomalous)
                } else {
                    Some(Label::Normal)
                }
            }
        }
    }
}

/// Annotations keyed by video name
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    entries: HashMap<String, GroundTruthEntry>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(HarnessError::IoError)?;
        let gt = Self::from_reader(BufReader::new(file))?;
        log::debug!("Loaded {} ground truth entries from {}", gt.len(), path.display());
        Ok(gt)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut gt = Self::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(HarnessError::IoError)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, entry) = Self::parse_line(line).map_err(|e| {
                HarnessError::InvalidGroundTruth(format!("line {}: {}", line_num + 1, e))
            })?;
            if gt.entries.contains_key(&name) {
                return Err(HarnessError::InvalidGroundTruth(format!(
                    "line {}: duplicate entry for {name}",
                    line_num + 1
                )));
            }
            gt.entries.insert(name, entry);
        }

        Ok(gt)
    }

    fn parse_line(line: &str) -> std::result::Result<(String, GroundTruthEntry), String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let parse = |s: &str| {
            s.parse::<i64>()
                .map_err(|_| format!("invalid number: {s}"))
        };

        match parts.as_slice() {
            &[name, label] => {
                let value = parse(label)?;
                let label =
                    Label::from_value(value).ok_or_else(|| format!("invalid label: {value}"))?;
                Ok((name.to_string(), GroundTruthEntry::Video(label)))
            }
            &[name, n_frames, start, end] => {
                let [n_frames, start, end] = [parse(n_frames)?, parse(start)?, parse(end)?];
                if n_frames > MAX_FRAMES as i64 {
                    return Err(format!("{n_frames} frames exceeds the limit of {MAX_FRAMES}"));
                }
                if n_frames < 0 || start < 0 || start > end || end > n_frames {
                    return Err(format!(
                        "invalid interval [{start}, {end}) for {n_frames} frames"
                    ));
                }
                Ok((
                    name.to_string(),
                    GroundTruthEntry::Frames {
                        n_frames: n_frames as usize,
                        start: start as usize,
                        end: end as usize,
                    },
                ))
            }
            _ => Err(format!("expected 2 or 4 fields, got {}", parts.len())),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: GroundTruthEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Entry of a video
    pub fn get(&self, name: &str) -> Result<&GroundTruthEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| HarnessError::MissingGroundTruth(name.to_string()))
    }

    /// Whole-video label
    pub fn video_label(&self, name: &str) -> Result<Label> {
        match self.get(name)? {
            GroundTruthEntry::Video(label) => Ok(*label),
            GroundTruthEntry::Frames { .. } => Err(HarnessError::InvalidGroundTruth(format!(
                "{name} has a frame interval, expected a video label"
            ))),
        }
    }

    /// Frame count and anomalous interval `(n_frames, start, end)`
    pub fn frame_interval(&self, name: &str) -> Result<(usize, usize, usize)> {
        match *self.get(name)? {
            GroundTruthEntry::Frames { n_frames, .. } if n_frames > MAX_FRAMES => {
                Err(HarnessError::InvalidGroundTruth(format!(
                    "{name}: {n_frames} frames exceeds the limit of {MAX_FRAMES}"
                )))
            }
            GroundTruthEntry::Frames {
                n_frames,
                start,
                end,
            } => Ok((n_frames, start, end)),
            GroundTruthEntry::Video(_) => Err(HarnessError::InvalidGroundTruth(format!(
                "{name} has a video label, expected a frame interval"
            ))),
        }
    }

    pub fn is_normal(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_normal())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_both_entry_kinds() {
        let data = "fight_01 -1\nwalk_02 1\n# frames\nscene1 100 40 60\nscene2 50 0 0\n";
        let gt = GroundTruth::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(gt.len(), 4);
        assert_eq!(gt.video_label("fight_01").unwrap(), Label::Anomalous);
        assert_eq!(gt.video_label("walk_02").unwrap(), Label::Normal);
        assert_eq!(gt.frame_interval("scene1").unwrap(), (100, 40, 60));
        assert!(!gt.is_normal("scene1").unwrap());
        assert!(gt.is_normal("scene2").unwrap());
        assert!(!gt.is_normal("fight_01").unwrap());
    }

    #[test]
    fn test_frame_labels() {
        let entry = GroundTruthEntry::Frames {
            n_frames: 10,
            start: 3,
            end: 5,
        };
        assert_eq!(entry.frame_label(2), Some(Label::Normal));
        assert_eq!(entry.frame_label(3), Some(Label::Anomalous));
        assert_eq!(entry.frame_label(4), Some(Label::Anomalous));
        assert_eq!(entry.frame_label(5), Some(Label::Normal));
        assert_eq!(GroundTruthEntry::Video(Label::Normal).frame_label(0), None);
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        let gt = GroundTruth::from_reader(Cursor::new("a 1\nb 10 2 4\n")).unwrap();
        assert!(matches!(
            gt.video_label("zzz"),
            Err(HarnessError::MissingGroundTruth(_))
        ));
        assert!(matches!(
            gt.video_label("b"),
            Err(HarnessError::InvalidGroundTruth(_))
        ));
        assert!(matches!(
            gt.frame_interval("a"),
            Err(HarnessError::InvalidGroundTruth(_))
        ));
    }

    #[test]
    fn test_frame_count_limit() {
        let data = format!("ok {MAX_FRAMES} 0 0\n");
        assert!(GroundTruth::from_reader(Cursor::new(data)).is_ok());

        let mut gt = GroundTruth::new();
        gt.insert(
            "huge",
            GroundTruthEntry::Frames {
                n_frames: 100_000_000_000,
                start: 0,
                end: 0,
            },
        );
        assert!(matches!(
            gt.frame_interval("huge"),
            Err(HarnessError::InvalidGroundTruth(_))
        ));
    }

    #[test]
    fn test_invalid_lines() {
        for data in [
            "a 0\n",
            "a 2 x\n",
            "a 10 6 4\n",
            "a 10 2 12\n",
            "a 1 2\n",
            "a 1\na -1\n",
            "a 100000000000 0 0\n",
        ] {
            assert!(
                matches!(
                    GroundTruth::from_reader(Cursor::new(data)),
                    Err(HarnessError::InvalidGroundTruth(_))
                ),
                "{data:?} should be rejected"
            );
        }
    }
}
