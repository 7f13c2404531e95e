//! Dataset entry points
//!
//! Each entry point knows where its dataset lives under the data root, fills
//! the dataset's blocks from the configuration file and runs the
//! cross-validation.

use crate::config::{ClassifierGrid, ConfigFile, ExperimentConfig};
use crate::core::{ClassificationMode, Result};
use crate::data::list_samples;
use crate::experiment::runner::{try_dataset, DatasetSpec, ExperimentOutcome};
use crate::reduction::EncoderPolicy;
use std::path::{Path, PathBuf};

const UMN_DESCRIPTORS: &str = "Descriptors/UMN";
const UMN_GROUND_TRUTH: &str = "Datasets/UMN/ground_truth.txt";
const UMN_OC_GROUND_TRUTH: &str = "Datasets/UMN/One-Class/ground_truth.txt";
const CVD_DESCRIPTORS: &str = "Descriptors/CVD";
const CVD_GROUND_TRUTH: &str = "Datasets/Crowd Violence Detection/ground_truth.txt";
const CVD_FOLDS: usize = 5;

/// Data root plus the optional configuration file
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub root: PathBuf,
    pub config_file: Option<ConfigFile>,
    /// Overrides the policy of the encoder block
    pub encoder_policy: Option<EncoderPolicy>,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_config_file(mut self, file: ConfigFile) -> Self {
        self.config_file = Some(file);
        self
    }

    pub fn with_encoder_policy(mut self, policy: EncoderPolicy) -> Self {
        self.encoder_policy = Some(policy);
        self
    }

    pub fn path<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.root.join(relative)
    }

    /// Fill unset blocks from the configuration file
    fn configure(
        &self,
        mut config: ExperimentConfig,
        extraction_block: &str,
        encoder_block: &str,
    ) -> Result<ExperimentConfig> {
        if let Some(file) = &self.config_file {
            if config.extraction.is_none() {
                config.extraction = Some(file.extraction(extraction_block)?);
            }
            if config.encoder.is_none() {
                config.encoder = Some(file.encoder(encoder_block)?);
            }
        }

        if let Some(encoder) = config.encoder.as_mut() {
            if encoder.dir.is_relative() {
                encoder.dir = self.root.join(&encoder.dir);
            }
            if let Some(policy) = self.encoder_policy {
                encoder.policy = policy;
            }
        }
        Ok(config)
    }

    fn run(&self, spec: DatasetSpec, config: &ExperimentConfig) -> Result<ExperimentOutcome> {
        let outcome = try_dataset(&spec, config)?;
        log::info!(
            "{} result: {} - ACC: {:.3} AUC: {:.3}",
            outcome.dataset,
            outcome.point,
            outcome.accuracy,
            outcome.auc
        );
        Ok(outcome)
    }
}

/// Binary frame classification on a UMN scene, one fold per video
pub fn try_umn(ws: &Workspace, scene: u32, config: ExperimentConfig) -> Result<ExperimentOutcome> {
    let config = ws.configure(config, &format!("UMN{scene}_des"), "UMN_encoder")?;
    let descriptors_dir = ws.path(UMN_DESCRIPTORS).join(format!("Escena {scene}"));
    let n_folds = list_samples(&descriptors_dir)?.len();

    let spec = DatasetSpec {
        name: format!("UMN scene {scene}"),
        descriptors_dir,
        ground_truth: ws.path(UMN_GROUND_TRUTH),
        mode: ClassificationMode::Frame,
        n_folds,
    };
    ws.run(spec, &config)
}

/// Binary video classification on the Crowd Violence dataset
pub fn try_cvd(ws: &Workspace, config: ExperimentConfig) -> Result<ExperimentOutcome> {
    let config = ws.configure(config, "CVD_des", "CVD_encoder")?;
    let spec = DatasetSpec {
        name: "CVD".to_string(),
        descriptors_dir: ws.path(CVD_DESCRIPTORS),
        ground_truth: ws.path(CVD_GROUND_TRUTH),
        mode: ClassificationMode::Video,
        n_folds: CVD_FOLDS,
    };
    ws.run(spec, &config)
}

/// One-class frame classification on a UMN scene
pub fn try_umn_oc(
    ws: &Workspace,
    scene: u32,
    config: ExperimentConfig,
) -> Result<ExperimentOutcome> {
    let mut config = ws.configure(config, &format!("UMN{scene}_des"), "UMN_encoder")?;
    config.classifier = ClassifierGrid::one_class_default();

    let spec = DatasetSpec {
        name: format!("UMN one-class scene {scene}"),
        descriptors_dir: ws
            .path(UMN_DESCRIPTORS)
            .join("OC")
            .join(format!("Escena {scene}")),
        ground_truth: ws.path(UMN_OC_GROUND_TRUTH),
        mode: ClassificationMode::Frame,
        n_folds: 1,
    };
    ws.run(spec, &config)
}
