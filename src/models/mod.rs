//! Classifier trainers
//!
//! Thin trainers for the three classifier families the experiments use. Every
//! fitted model implements [`Classifier`]; [`FittedModel`] wraps whichever one a
//! grid point produced so the driver can treat them uniformly.

pub mod mlp;
pub mod one_class;
pub mod svc;

pub use self::mlp::*;
pub use self::one_class::*;
pub use self::svc::*;

use crate::core::{Classifier, HarnessError, HistogramSet, Label, Prediction, Result};
use crate::kernel::{Gamma, KernelType};
use crate::persistence::SavedModel;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Any fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedModel {
    Svc(TrainedSvc),
    OneClass(TrainedOneClassSvm),
    Mlp(TrainedMlp),
}

impl FittedModel {
    pub fn model_type(&self) -> &'static str {
        match self {
            FittedModel::Svc(_) => "svc",
            FittedModel::OneClass(_) => "one_class",
            FittedModel::Mlp(_) => "mlp",
        }
    }
}

impl Classifier for FittedModel {
    fn predict(&self, features: &[f64]) -> Prediction {
        match self {
            FittedModel::Svc(m) => m.predict(features),
            FittedModel::OneClass(m) => m.predict(features),
            FittedModel::Mlp(m) => m.predict(features),
        }
    }
}

/// One point of a classifier hyperparameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classifier", rename_all = "snake_case")]
pub enum ClassifierParams {
    Svc { c: f64 },
    OneClass { nu: f64, kernel: KernelType, gamma: Gamma },
    Mlp(MlpParams),
}

impl ClassifierParams {
    /// Whether training ignores the labels
    pub fn is_one_class(&self) -> bool {
        matches!(self, ClassifierParams::OneClass { .. })
    }

    /// Fit the classifier this point describes
    pub fn train(
        &self,
        set: &HistogramSet,
        rng: &mut StdRng,
        out_file: Option<&Path>,
    ) -> Result<FittedModel> {
        Ok(match self {
            ClassifierParams::Svc { c } => {
                FittedModel::Svc(train_svc(&set.features, &set.labels, *c, out_file)?)
            }
            ClassifierParams::OneClass { nu, kernel, gamma } => FittedModel::OneClass(
                train_oc_svm(&set.features, *nu, *kernel, *gamma, out_file)?,
            ),
            ClassifierParams::Mlp(params) => FittedModel::Mlp(train_network(
                &set.features,
                &set.labels,
                params,
                rng,
                out_file,
            )?),
        })
    }
}

impl fmt::Display for ClassifierParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierParams::Svc { c } => write!(f, "C: {c}"),
            ClassifierParams::OneClass { nu, kernel, gamma } => {
                write!(f, "nu: {nu}, kernel: {kernel}, gamma: {gamma}")
            }
            ClassifierParams::Mlp(params) => write!(f, "{params}"),
        }
    }
}

/// Validate the shape of a labelled training set
pub(crate) fn check_training_set(samples: &[Vec<f64>], labels: &[Label]) -> Result<()> {
    if samples.is_empty() {
        return Err(HarnessError::EmptyDataset);
    }
    if samples.len() != labels.len() {
        return Err(HarnessError::InvalidDataset(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        )));
    }
    let dim = samples[0].len();
    if let Some(bad) = samples.iter().find(|s| s.len() != dim) {
        return Err(HarnessError::DimensionMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Persist a freshly trained model with its metadata
pub(crate) fn save_fitted(model: &FittedModel, description: &str, path: &Path) -> Result<()> {
    SavedModel::new(model.clone(), description).save_to_file(path)?;
    log::debug!("Saved {} model to {}", model.model_type(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_check_training_set() {
        assert!(matches!(
            check_training_set(&[], &[]),
            Err(HarnessError::EmptyDataset)
        ));
        assert!(matches!(
            check_training_set(&[vec![1.0]], &[]),
            Err(HarnessError::InvalidDataset(_))
        ));
        assert!(matches!(
            check_training_set(
                &[vec![1.0, 2.0], vec![1.0]],
                &[Label::Normal, Label::Anomalous]
            ),
            Err(HarnessError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(check_training_set(&[vec![1.0]], &[Label::Normal]).is_ok());
    }

    #[test]
    fn test_classifier_params_display() {
        assert_eq!(ClassifierParams::Svc { c: 8.0 }.to_string(), "C: 8");
        let oc = ClassifierParams::OneClass {
            nu: 0.1,
            kernel: KernelType::Rbf,
            gamma: Gamma::Auto,
        };
        assert_eq!(oc.to_string(), "nu: 0.1, kernel: rbf, gamma: auto");
        assert!(oc.is_one_class());
    }

    #[test]
    fn test_classifier_params_tagged_json() {
        let params: ClassifierParams =
            serde_json::from_str(r#"{"classifier": "svc", "c": 16.0}"#).unwrap();
        assert_eq!(params, ClassifierParams::Svc { c: 16.0 });

        let params: ClassifierParams = serde_json::from_str(
            r#"{"classifier": "one_class", "nu": 0.2, "kernel": "sigmoid", "gamma": "scale"}"#,
        )
        .unwrap();
        assert!(params.is_one_class());
    }

    #[test]
    fn test_train_dispatch_one_class_ignores_labels() {
        let mut set = HistogramSet::new();
        for i in 0..10 {
            set.push(vec![1.0, i as f64 * 0.01], Label::Normal);
        }
        let params = ClassifierParams::OneClass {
            nu: 0.5,
            kernel: KernelType::Rbf,
            gamma: Gamma::Scale,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let model = params.train(&set, &mut rng, None).unwrap();
        assert_eq!(model.model_type(), "one_class");
    }
}
