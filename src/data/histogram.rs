//! Histogram vectors
//!
//! Every descriptor dimension is binned into `n_bins` equal-width buckets over
//! the range seen in the training descriptors. Each per-dimension histogram is
//! L2-normalized and the histograms are concatenated in dimension order.

use crate::core::{ClassificationMode, HarnessError, HistogramSet, Result};
use crate::data::descriptors::{DescriptorRecord, Sample};
use crate::data::ground_truth::GroundTruth;
use std::collections::BTreeMap;

/// Per-dimension value range of the training descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRanges {
    pub max: Vec<f64>,
    pub min: Vec<f64>,
}

impl FeatureRanges {
    pub fn dim(&self) -> usize {
        self.max.len()
    }

    /// Bin range of a dimension; a degenerate range is widened to unit length
    pub fn bounds(&self, dim: usize) -> (f64, f64) {
        let (lo, hi) = (self.min[dim], self.max[dim]);
        if lo == hi {
            (lo - 0.5, hi + 0.5)
        } else {
            (lo, hi)
        }
    }

    fn update(&mut self, values: &[f64]) {
        for (i, &v) in values.iter().enumerate() {
            self.max[i] = self.max[i].max(v);
            self.min[i] = self.min[i].min(v);
        }
    }
}

/// Scan every training descriptor once and return the per-dimension ranges
pub fn compute_ranges(training: &[Sample]) -> Result<FeatureRanges> {
    let mut ranges: Option<FeatureRanges> = None;

    for sample in training {
        let file = sample.load()?;
        let Some(dim) = file.dim() else {
            continue;
        };

        let ranges = ranges.get_or_insert_with(|| FeatureRanges {
            max: vec![f64::NEG_INFINITY; dim],
            min: vec![f64::INFINITY; dim],
        });
        if ranges.dim() != dim {
            return Err(HarnessError::DimensionMismatch {
                expected: ranges.dim(),
                actual: dim,
            });
        }
        for record in file.records() {
            ranges.update(&record.values);
        }
    }

    let ranges = ranges.ok_or(HarnessError::EmptyDataset)?;
    log::debug!(
        "Computed ranges of {} dimensions over {} training samples",
        ranges.dim(),
        training.len()
    );
    Ok(ranges)
}

/// Builds histogram vectors against fixed ranges
#[derive(Debug, Clone)]
pub struct HistogramBuilder<'a> {
    ranges: &'a FeatureRanges,
    n_bins: usize,
    kept: Vec<usize>,
}

impl<'a> HistogramBuilder<'a> {
    /// Dimensions listed in `excluded` are skipped; indices past the last dimension are ignored
    pub fn new(ranges: &'a FeatureRanges, n_bins: usize, excluded: &[usize]) -> Result<Self> {
        if n_bins == 0 {
            return Err(HarnessError::InvalidParameter(
                "Number of bins must be positive".to_string(),
            ));
        }
        let kept = (0..ranges.dim()).filter(|d| !excluded.contains(d)).collect();
        Ok(Self {
            ranges,
            n_bins,
            kept,
        })
    }

    /// Length of every histogram vector
    pub fn output_dim(&self) -> usize {
        self.kept.len() * self.n_bins
    }

    /// Histogram vector of a group of descriptors
    pub fn build<'r, I>(&self, records: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'r DescriptorRecord>,
    {
        let n_bins = self.n_bins;
        let mut hist = vec![0.0; self.output_dim()];

        for record in records {
            for (slot, &dim) in self.kept.iter().enumerate() {
                let (lo, hi) = self.ranges.bounds(dim);
                let v = record.values[dim];
                if !(v >= lo && v <= hi) {
                    continue;
                }
                let bin = (((v - lo) / (hi - lo)) * n_bins as f64) as usize;
                hist[slot * n_bins + bin.min(n_bins - 1)] += 1.0;
            }
        }

        for chunk in hist.chunks_mut(n_bins) {
            normalize_l2(chunk);
        }
        hist
    }
}

/// Scale to unit L2 norm, leaving a zero vector untouched
pub fn normalize_l2(values: &mut [f64]) {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Histogram vectors and labels of a list of samples
///
/// Video mode yields one vector per sample, frame mode one per frame. With
/// `drop_empty` the all-zero vectors are left out.
pub fn prepare_histograms(
    samples: &[Sample],
    ground_truth: &GroundTruth,
    ranges: &FeatureRanges,
    mode: ClassificationMode,
    n_bins: usize,
    excluded: &[usize],
    drop_empty: bool,
) -> Result<HistogramSet> {
    let builder = HistogramBuilder::new(ranges, n_bins, excluded)?;
    let mut set = HistogramSet::new();

    for sample in samples {
        let file = sample.load()?;
        if let Some(dim) = file.dim() {
            if dim != ranges.dim() {
                return Err(HarnessError::DimensionMismatch {
                    expected: ranges.dim(),
                    actual: dim,
                });
            }
        }

        match mode {
            ClassificationMode::Video => {
                let label = ground_truth.video_label(&sample.name)?;
                set.push(builder.build(file.records()), label);
            }
            ClassificationMode::Frame => {
                let entry = ground_truth.get(&sample.name)?;
                let (n_frames, _, _) = ground_truth.frame_interval(&sample.name)?;

                let mut frames: BTreeMap<usize, Vec<&DescriptorRecord>> = BTreeMap::new();
                for record in file.records().iter().filter(|r| r.frame < n_frames) {
                    frames.entry(record.frame).or_default().push(record);
                }

                for index in 0..n_frames {
                    let records = frames.remove(&index).unwrap_or_default();
                    // frame_interval above guarantees a frame entry
                    if let Some(label) = entry.frame_label(index) {
                        set.push(builder.build(records), label);
                    }
                }
            }
        }
    }

    let total = set.len();
    if drop_empty {
        set.retain_non_empty();
    }
    log::trace!(
        "Prepared {} histograms ({} dropped) with {} bins",
        set.len(),
        total - set.len(),
        n_bins
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Label;
    use crate::data::descriptors::DescriptorFile;
    use crate::data::ground_truth::GroundTruthEntry;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn write_sample(dir: &TempDir, name: &str, records: Vec<DescriptorRecord>) -> Sample {
        let path = dir.path().join(format!("{name}.data"));
        DescriptorFile::new(records)
            .unwrap()
            .write_to_file(&path)
            .unwrap();
        Sample::new(name, path)
    }

    fn ranges() -> FeatureRanges {
        FeatureRanges {
            max: vec![4.0, 1.0],
            min: vec![0.0, 1.0],
        }
    }

    #[test]
    fn test_compute_ranges() {
        let dir = TempDir::new().unwrap();
        let a = write_sample(
            &dir,
            "a",
            vec![
                DescriptorRecord::new(0, vec![1.0, -2.0]),
                DescriptorRecord::new(1, vec![3.0, 0.5]),
            ],
        );
        let empty = write_sample(&dir, "empty", vec![]);
        let b = write_sample(&dir, "b", vec![DescriptorRecord::new(0, vec![-1.0, 0.0])]);

        let ranges = compute_ranges(&[a, empty, b]).unwrap();
        assert_eq!(ranges.max, vec![3.0, 0.5]);
        assert_eq!(ranges.min, vec![-1.0, -2.0]);
    }

    #[test]
    fn test_compute_ranges_errors() {
        let dir = TempDir::new().unwrap();
        let empty = write_sample(&dir, "empty", vec![]);
        assert!(matches!(
            compute_ranges(&[empty]),
            Err(HarnessError::EmptyDataset)
        ));

        let a = write_sample(&dir, "a", vec![DescriptorRecord::new(0, vec![1.0])]);
        let b = write_sample(&dir, "b", vec![DescriptorRecord::new(0, vec![1.0, 2.0])]);
        assert!(matches!(
            compute_ranges(&[a, b]),
            Err(HarnessError::DimensionMismatch { .. })
        ));

        let missing = Sample::new("missing", dir.path().join("missing.data"));
        assert!(matches!(
            compute_ranges(&[missing]),
            Err(HarnessError::IoError(_))
        ));
    }

    #[test]
    fn test_degenerate_range_is_widened() {
        assert_eq!(ranges().bounds(1), (0.5, 1.5));
        assert_eq!(ranges().bounds(0), (0.0, 4.0));
    }

    #[test]
    fn test_histogram_binning() {
        let ranges = ranges();
        let builder = HistogramBuilder::new(&ranges, 4, &[]).unwrap();
        assert_eq!(builder.output_dim(), 8);

        let records = vec![
            DescriptorRecord::new(0, vec![0.0, 1.0]),
            DescriptorRecord::new(0, vec![0.5, 1.0]),
            // right edge falls in the last bin
            DescriptorRecord::new(0, vec![4.0, 1.0]),
            // outside the range, not counted
            DescriptorRecord::new(0, vec![7.0, 9.0]),
        ];
        let hist = builder.build(&records);

        let norm = (2.0f64 * 2.0 + 1.0).sqrt();
        assert_relative_eq!(hist[0], 2.0 / norm);
        assert_relative_eq!(hist[3], 1.0 / norm);
        assert_eq!(hist[1], 0.0);
        // dimension 1: three values in the middle bin of [0.5, 1.5]
        assert_relative_eq!(hist[4 + 2], 1.0);
    }

    #[test]
    fn test_histogram_norm_is_zero_or_one() {
        let ranges = FeatureRanges {
            max: vec![1.0, 10.0, 3.0],
            min: vec![0.0, -10.0, 2.0],
        };
        let builder = HistogramBuilder::new(&ranges, 8, &[]).unwrap();
        let records: Vec<DescriptorRecord> = (0..25)
            .map(|i| {
                let t = i as f64 / 24.0;
                DescriptorRecord::new(0, vec![t, 20.0 * t - 10.0, 100.0])
            })
            .collect();
        let hist = builder.build(&records);

        let norms: Vec<f64> = hist
            .chunks(8)
            .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
            .collect();
        assert_relative_eq!(norms[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(norms[1], 1.0, epsilon = 1e-12);
        // third dimension is always out of range
        assert_eq!(norms[2], 0.0);

        assert!(builder.build(&[]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_excluded_dimensions() {
        let ranges = ranges();
        let builder = HistogramBuilder::new(&ranges, 2, &[0, 17]).unwrap();
        assert_eq!(builder.output_dim(), 2);
        let hist = builder.build(&[DescriptorRecord::new(0, vec![0.0, 1.0])]);
        assert_eq!(hist, vec![0.0, 1.0]);
    }

    #[test]
    fn test_zero_bins_is_error() {
        assert!(HistogramBuilder::new(&ranges(), 0, &[]).is_err());
    }

    #[test]
    fn test_prepare_histograms_video_mode() {
        let dir = TempDir::new().unwrap();
        let a = write_sample(&dir, "a", vec![DescriptorRecord::new(0, vec![1.0, 1.0])]);
        let b = write_sample(&dir, "b", vec![]);
        let mut gt = GroundTruth::new();
        gt.insert("a", GroundTruthEntry::Video(Label::Normal));
        gt.insert("b", GroundTruthEntry::Video(Label::Anomalous));

        let samples = vec![a, b];
        let set = prepare_histograms(
            &samples,
            &gt,
            &ranges(),
            ClassificationMode::Video,
            4,
            &[],
            false,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.dim(), 8);
        assert_eq!(set.labels, vec![Label::Normal, Label::Anomalous]);

        let set = prepare_histograms(
            &samples,
            &gt,
            &ranges(),
            ClassificationMode::Video,
            4,
            &[],
            true,
        )
        .unwrap();
        assert_eq!(set.labels, vec![Label::Normal]);
    }

    #[test]
    fn test_prepare_histograms_frame_mode() {
        let dir = TempDir::new().unwrap();
        let scene = write_sample(
            &dir,
            "scene",
            vec![
                DescriptorRecord::new(0, vec![0.5, 1.0]),
                DescriptorRecord::new(2, vec![3.5, 1.0]),
                DescriptorRecord::new(2, vec![3.9, 1.0]),
                // past the last frame
                DescriptorRecord::new(9, vec![1.0, 1.0]),
            ],
        );
        let mut gt = GroundTruth::new();
        gt.insert(
            "scene",
            GroundTruthEntry::Frames {
                n_frames: 4,
                start: 2,
                end: 4,
            },
        );

        let samples = vec![scene];
        let set = prepare_histograms(
            &samples,
            &gt,
            &ranges(),
            ClassificationMode::Frame,
            2,
            &[],
            false,
        )
        .unwrap();

        assert_eq!(set.len(), 4);
        assert_eq!(
            set.labels,
            vec![Label::Normal, Label::Normal, Label::Anomalous, Label::Anomalous]
        );
        assert_eq!(set.features[0], vec![1.0, 0.0, 0.0, 1.0]);
        assert!(set.features[1].iter().all(|&v| v == 0.0));
        assert_eq!(set.features[2], vec![0.0, 1.0, 0.0, 1.0]);

        let set = prepare_histograms(
            &samples,
            &gt,
            &ranges(),
            ClassificationMode::Frame,
            2,
            &[],
            true,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_prepare_histograms_missing_ground_truth() {
        let dir = TempDir::new().unwrap();
        let a = write_sample(&dir, "a", vec![DescriptorRecord::new(0, vec![1.0, 1.0])]);
        let result = prepare_histograms(
            &[a],
            &GroundTruth::new(),
            &ranges(),
            ClassificationMode::Video,
            4,
            &[],
            false,
        );
        assert!(matches!(result, Err(HarnessError::MissingGroundTruth(_))));
    }

    #[test]
    fn test_oversized_frame_count_is_error() {
        let dir = TempDir::new().unwrap();
        let clip = write_sample(&dir, "clip", vec![DescriptorRecord::new(0, vec![1.0, 1.0])]);
        let mut gt = GroundTruth::new();
        gt.insert(
            "clip",
            GroundTruthEntry::Frames {
                n_frames: 100_000_000_000,
                start: 0,
                end: 0,
            },
        );

        let result = prepare_histograms(
            &[clip],
            &gt,
            &ranges(),
            ClassificationMode::Frame,
            2,
            &[],
            false,
        );
        assert!(matches!(result, Err(HarnessError::InvalidGroundTruth(_))));
    }
}
