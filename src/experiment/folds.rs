//! Cross-validation fold construction
//!
//! Binary experiments shuffle the samples once and test on consecutive slices.
//! One-class experiments never train on anomalies: in video mode the normal
//! videos are reshuffled for every fold and split 75/25, in frame mode the
//! videos without an anomalous interval form a fixed training set.

use crate::core::{ClassificationMode, HarnessError, Result};
use crate::data::{GroundTruth, Sample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Fraction of normal videos used for one-class training
const ONE_CLASS_TRAINING_FRACTION: f64 = 0.75;

/// A training/test partition
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub training: Vec<Sample>,
    pub test: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq)]
enum Partition {
    Binary {
        names: Vec<Sample>,
        fold_size: usize,
    },
    OneClassVideo {
        normals: Vec<Sample>,
        anomalies: Vec<Sample>,
    },
    OneClassFrame {
        training: Vec<Sample>,
        test: Vec<Sample>,
    },
}

/// How the samples are split across folds
#[derive(Debug, Clone, PartialEq)]
pub struct FoldPlan {
    partition: Partition,
    n_folds: usize,
}

impl FoldPlan {
    /// Build the plan; binary plans shuffle the samples here
    pub fn new(
        samples: Vec<Sample>,
        ground_truth: &GroundTruth,
        mode: ClassificationMode,
        one_class: bool,
        n_folds: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if n_folds == 0 {
            return Err(HarnessError::InvalidParameter(
                "Number of folds must be positive".to_string(),
            ));
        }

        let partition = if one_class {
            let mut normals = Vec::new();
            let mut others = Vec::new();
            for sample in samples {
                if ground_truth.is_normal(&sample.name)? {
                    normals.push(sample);
                } else {
                    others.push(sample);
                }
            }
            if normals.is_empty() {
                return Err(HarnessError::InvalidDataset(
                    "One-class training needs at least one normal sample".to_string(),
                ));
            }

            match mode {
                ClassificationMode::Video => Partition::OneClassVideo {
                    normals,
                    anomalies: others,
                },
                ClassificationMode::Frame => Partition::OneClassFrame {
                    training: normals,
                    test: others,
                },
            }
        } else {
            let mut names = samples;
            names.shuffle(rng);
            let fold_size = names.len() / n_folds;
            if fold_size == 0 {
                return Err(HarnessError::InvalidParameter(format!(
                    "{} samples cannot be split into {n_folds} folds",
                    names.len()
                )));
            }
            Partition::Binary { names, fold_size }
        };

        Ok(Self { partition, n_folds })
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Partition of fold `index`
    pub fn fold(&mut self, index: usize, rng: &mut StdRng) -> Result<Fold> {
        if index >= self.n_folds {
            return Err(HarnessError::InvalidParameter(format!(
                "Fold {index} out of range for {} folds",
                self.n_folds
            )));
        }

        Ok(match &mut self.partition {
            Partition::Binary { names, fold_size } => {
                let (start, end) = (index * *fold_size, (index + 1) * *fold_size);
                let test = names[start..end].to_vec();
                let training = names[..start]
                    .iter()
                    .chain(&names[end..])
                    .cloned()
                    .collect();
                Fold { training, test }
            }
            Partition::OneClassVideo { normals, anomalies } => {
                normals.shuffle(rng);
                let n_train = ((normals.len() as f64 * ONE_CLASS_TRAINING_FRACTION) as usize + 1)
                    .min(normals.len());
                let training = normals[..n_train].to_vec();
                let test = anomalies
                    .iter()
                    .chain(&normals[n_train..])
                    .cloned()
                    .collect();
                Fold { training, test }
            }
            Partition::OneClassFrame { training, test } => Fold {
                training: training.clone(),
                test: test.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Label;
    use crate::data::GroundTruthEntry;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn video_samples(n_normal: usize, n_anomalous: usize) -> (Vec<Sample>, GroundTruth) {
        let mut gt = GroundTruth::new();
        let mut samples = Vec::new();
        for i in 0..n_normal + n_anomalous {
            let name = format!("video{i:02}");
            let label = if i < n_normal {
                Label::Normal
            } else {
                Label::Anomalous
            };
            gt.insert(name.clone(), GroundTruthEntry::Video(label));
            samples.push(Sample::new(name.clone(), format!("{name}.data")));
        }
        (samples, gt)
    }

    fn names(samples: &[Sample]) -> HashSet<String> {
        samples.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_binary_folds_partition_samples() {
        let (samples, gt) = video_samples(7, 4);
        let all = names(&samples);
        let mut rng = StdRng::seed_from_u64(5);
        let mut plan =
            FoldPlan::new(samples, &gt, ClassificationMode::Video, false, 5, &mut rng).unwrap();

        let mut tested = HashSet::new();
        for i in 0..plan.n_folds() {
            let fold = plan.fold(i, &mut rng).unwrap();
            assert_eq!(fold.test.len(), 11 / 5);
            let (training, test) = (names(&fold.training), names(&fold.test));
            assert!(training.is_disjoint(&test));
            assert_eq!(&training | &test, all);
            assert!(tested.is_disjoint(&test));
            tested.extend(test);
        }
        assert!(plan.fold(5, &mut rng).is_err());
    }

    #[test]
    fn test_binary_folds_reproducible_with_seed() {
        let run = |seed| {
            let (samples, gt) = video_samples(6, 6);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut plan =
                FoldPlan::new(samples, &gt, ClassificationMode::Video, false, 3, &mut rng)
                    .unwrap();
            (0..3)
                .map(|i| plan.fold(i, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_invalid_fold_counts() {
        let (samples, gt) = video_samples(2, 1);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(FoldPlan::new(
            samples.clone(),
            &gt,
            ClassificationMode::Video,
            false,
            0,
            &mut rng
        )
        .is_err());
        assert!(FoldPlan::new(samples, &gt, ClassificationMode::Video, false, 4, &mut rng).is_err());
    }

    #[test]
    fn test_one_class_video_folds() {
        let (samples, gt) = video_samples(8, 3);
        let all = names(&samples);
        let anomalies: HashSet<String> = (8..11).map(|i| format!("video{i:02}")).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let mut plan =
            FoldPlan::new(samples, &gt, ClassificationMode::Video, true, 3, &mut rng).unwrap();

        for i in 0..3 {
            let fold = plan.fold(i, &mut rng).unwrap();
            // floor(8 * 0.75) + 1
            assert_eq!(fold.training.len(), 7);
            let (training, test) = (names(&fold.training), names(&fold.test));
            assert!(training.is_disjoint(&anomalies));
            assert!(anomalies.is_subset(&test));
            assert!(training.is_disjoint(&test));
            assert_eq!(&training | &test, all);
        }
    }

    #[test]
    fn test_one_class_frame_folds_are_fixed() {
        let mut gt = GroundTruth::new();
        let mut samples = Vec::new();
        for (name, start, end) in [("a", 0, 0), ("b", 10, 20), ("c", 5, 5), ("d", 1, 2)] {
            gt.insert(
                name,
                GroundTruthEntry::Frames {
                    n_frames: 30,
                    start,
                    end,
                },
            );
            samples.push(Sample::new(name, format!("{name}.data")));
        }
        let mut rng = StdRng::seed_from_u64(5);
        let mut plan =
            FoldPlan::new(samples, &gt, ClassificationMode::Frame, true, 2, &mut rng).unwrap();

        let first = plan.fold(0, &mut rng).unwrap();
        let second = plan.fold(1, &mut rng).unwrap();
        assert_eq!(first, second);
        assert_eq!(names(&first.training), names(&[Sample::new("a", ""), Sample::new("c", "")]));
        assert_eq!(names(&first.test), names(&[Sample::new("b", ""), Sample::new("d", "")]));
    }

    #[test]
    fn test_one_class_without_normals_is_error() {
        let (samples, gt) = video_samples(0, 3);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            FoldPlan::new(samples, &gt, ClassificationMode::Video, true, 1, &mut rng),
            Err(HarnessError::InvalidDataset(_))
        ));
    }
}
