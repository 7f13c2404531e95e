//! Multi-layer perceptron classifier
//!
//! Fully connected hidden layers, a single logistic output giving P(normal),
//! binary log-loss with an L2 penalty, trained with Adam on shuffled
//! mini-batches. Training stops after [`MAX_ITERATIONS`] epochs or once the
//! loss has not improved by `tol` for `n_iter_no_change` consecutive epochs.

use crate::core::{Classifier, HarnessError, Label, Prediction, Result};
use crate::models::{check_training_set, save_fitted, FittedModel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Epoch cap applied to every network
pub const MAX_ITERATIONS: usize = 2000;

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const TOLERANCE: f64 = 1e-4;
const N_ITER_NO_CHANGE: usize = 10;
const DEFAULT_BATCH_SIZE: usize = 200;

/// Hidden layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Identity,
    Logistic,
    Tanh,
    #[default]
    Relu,
}

impl Activation {
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Identity => z,
            Activation::Logistic => logistic(z),
            Activation::Tanh => z.tanh(),
            Activation::Relu => z.max(0.0),
        }
    }

    /// Derivative expressed through the activation output
    fn derivative(self, a: f64) -> f64 {
        match self {
            Activation::Identity => 1.0,
            Activation::Logistic => a * (1.0 - a),
            Activation::Tanh => 1.0 - a * a,
            Activation::Relu => {
                if a > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Identity => "identity",
            Activation::Logistic => "logistic",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
        };
        f.write_str(name)
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Network hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_layer_sizes: Vec<usize>,
    #[serde(default)]
    pub activation: Activation,
    /// L2 penalty
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate_init: f64,
    /// Mini-batch size, `min(200, n)` when unset
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_alpha() -> f64 {
    0.0001
}

fn default_learning_rate() -> f64 {
    0.001
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            alpha: default_alpha(),
            learning_rate_init: default_learning_rate(),
            batch_size: None,
        }
    }
}

impl fmt::Display for MlpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hidden_layer_sizes: {:?}, activation: {}, alpha: {}, learning_rate_init: {}",
            self.hidden_layer_sizes, self.activation, self.alpha, self.learning_rate_init
        )
    }
}

/// One fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// out × in
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl DenseLayer {
    fn init(fan_in: usize, fan_out: usize, factor: f64, rng: &mut StdRng) -> Self {
        let bound = (factor / (fan_in + fan_out) as f64).sqrt();
        let weights = (0..fan_out)
            .map(|_| (0..fan_in).map(|_| rng.random_range(-bound..bound)).collect())
            .collect();
        let bias = (0..fan_out).map(|_| rng.random_range(-bound..bound)).collect();
        Self { weights, bias }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weights: self.weights.iter().map(|row| vec![0.0; row.len()]).collect(),
            bias: vec![0.0; self.bias.len()],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    fn squared_weights(&self) -> f64 {
        self.weights.iter().flatten().map(|w| w * w).sum()
    }
}

/// Adam moment estimates for every parameter
struct AdamState {
    first: Vec<DenseLayer>,
    second: Vec<DenseLayer>,
    step: i32,
}

impl AdamState {
    fn new(layers: &[DenseLayer]) -> Self {
        Self {
            first: layers.iter().map(DenseLayer::zeros_like).collect(),
            second: layers.iter().map(DenseLayer::zeros_like).collect(),
            step: 0,
        }
    }

    fn update(&mut self, layers: &mut [DenseLayer], grads: &[DenseLayer], learning_rate: f64) {
        self.step += 1;
        let rate = learning_rate * (1.0 - BETA_2.powi(self.step)).sqrt()
            / (1.0 - BETA_1.powi(self.step));

        let step = |param: &mut f64, grad: f64, m: &mut f64, v: &mut f64| {
            *m = BETA_1 * *m + (1.0 - BETA_1) * grad;
            *v = BETA_2 * *v + (1.0 - BETA_2) * grad * grad;
            *param -= rate * *m / (v.sqrt() + ADAM_EPSILON);
        };

        for (l, layer) in layers.iter_mut().enumerate() {
            for (o, row) in layer.weights.iter_mut().enumerate() {
                for (i, w) in row.iter_mut().enumerate() {
                    step(
                        w,
                        grads[l].weights[o][i],
                        &mut self.first[l].weights[o][i],
                        &mut self.second[l].weights[o][i],
                    );
                }
            }
            for (o, b) in layer.bias.iter_mut().enumerate() {
                step(
                    b,
                    grads[l].bias[o],
                    &mut self.first[l].bias[o],
                    &mut self.second[l].bias[o],
                );
            }
        }
    }
}

/// A fitted perceptron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedMlp {
    params: MlpParams,
    layers: Vec<DenseLayer>,
    epochs: usize,
    loss: f64,
}

impl TrainedMlp {
    /// Probability of the normal class
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        let activations = forward(&self.layers, self.params.activation, features);
        activations.last().map_or(0.5, |out| out[0])
    }

    /// Number of epochs actually run
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Training loss after the last epoch
    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn params(&self) -> &MlpParams {
        &self.params
    }
}

impl Classifier for TrainedMlp {
    fn predict(&self, features: &[f64]) -> Prediction {
        let proba = self.predict_proba(features);
        Prediction::new(Label::from_decision(proba - 0.5), proba)
    }
}

/// Outputs of every layer, input first
fn forward(layers: &[DenseLayer], activation: Activation, input: &[f64]) -> Vec<Vec<f64>> {
    let mut activations = Vec::with_capacity(layers.len() + 1);
    activations.push(input.to_vec());
    for (l, layer) in layers.iter().enumerate() {
        let z = layer.forward(&activations[l]);
        let a = if l + 1 == layers.len() {
            z.into_iter().map(logistic).collect()
        } else {
            z.into_iter().map(|v| activation.apply(v)).collect()
        };
        activations.push(a);
    }
    activations
}

/// Trainer for [`TrainedMlp`]
#[derive(Debug, Clone)]
pub struct MlpTrainer {
    params: MlpParams,
    max_iterations: usize,
}

impl MlpTrainer {
    pub fn new(params: MlpParams) -> Self {
        Self {
            params,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        if p.hidden_layer_sizes.contains(&0) {
            return Err(HarnessError::InvalidParameter(
                "Hidden layer sizes must be positive".to_string(),
            ));
        }
        if !(p.alpha >= 0.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "alpha must be non-negative, got: {}",
                p.alpha
            )));
        }
        if !(p.learning_rate_init > 0.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "learning_rate_init must be positive, got: {}",
                p.learning_rate_init
            )));
        }
        if p.batch_size == Some(0) {
            return Err(HarnessError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit the network
    pub fn train(
        &self,
        samples: &[Vec<f64>],
        labels: &[Label],
        rng: &mut StdRng,
    ) -> Result<TrainedMlp> {
        self.validate()?;
        check_training_set(samples, labels)?;
        if labels.iter().all(|&l| l == labels[0]) {
            return Err(HarnessError::SingleClass(format!(
                "all {} samples are {:?}",
                labels.len(),
                labels[0]
            )));
        }

        let n = samples.len();
        let targets: Vec<f64> = labels
            .iter()
            .map(|&l| if l == Label::Normal { 1.0 } else { 0.0 })
            .collect();

        let mut sizes = vec![samples[0].len()];
        sizes.extend(&self.params.hidden_layer_sizes);
        sizes.push(1);

        let mut layers: Vec<DenseLayer> = sizes
            .windows(2)
            .enumerate()
            .map(|(l, pair)| {
                // Glorot uniform, with the logistic output's smaller range
                let factor = if l + 2 == sizes.len() { 2.0 } else { 6.0 };
                DenseLayer::init(pair[0], pair[1], factor, rng)
            })
            .collect();

        let batch_size = self
            .params
            .batch_size
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .clamp(1, n);
        let mut adam = AdamState::new(&layers);
        let mut indices: Vec<usize> = (0..n).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut loss = f64::INFINITY;
        let mut epochs = 0;

        while epochs < self.max_iterations {
            epochs += 1;
            indices.shuffle(rng);

            let mut accumulated = 0.0;
            for batch in indices.chunks(batch_size) {
                let (grads, batch_loss) = self.backward(&layers, samples, &targets, batch);
                adam.update(&mut layers, &grads, self.params.learning_rate_init);
                accumulated += batch_loss * batch.len() as f64;
            }
            loss = accumulated / n as f64;

            if loss > best_loss - TOLERANCE {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);

            if no_improvement > N_ITER_NO_CHANGE {
                log::trace!("MLP converged after {epochs} epochs (loss {loss:.6})");
                break;
            }
        }

        if epochs >= self.max_iterations {
            log::debug!(
                "MLP reached the epoch limit ({}) without converging",
                self.max_iterations
            );
        }

        Ok(TrainedMlp {
            params: self.params.clone(),
            layers,
            epochs,
            loss,
        })
    }

    /// Gradients and penalized loss of one mini-batch
    fn backward(
        &self,
        layers: &[DenseLayer],
        samples: &[Vec<f64>],
        targets: &[f64],
        batch: &[usize],
    ) -> (Vec<DenseLayer>, f64) {
        let m = batch.len() as f64;
        let activation = self.params.activation;
        let mut grads: Vec<DenseLayer> = layers.iter().map(DenseLayer::zeros_like).collect();
        let mut loss = 0.0;

        for &idx in batch {
            let activations = forward(layers, activation, &samples[idx]);
            let output = activations[layers.len()][0].clamp(1e-10, 1.0 - 1e-10);
            let target = targets[idx];
            loss -= target * output.ln() + (1.0 - target) * (1.0 - output).ln();

            // Logistic output with log-loss: delta = p - y
            let mut delta = vec![activations[layers.len()][0] - target];
            for l in (0..layers.len()).rev() {
                let input = &activations[l];
                for (o, &d) in delta.iter().enumerate() {
                    for (i, &x) in input.iter().enumerate() {
                        grads[l].weights[o][i] += d * x;
                    }
                    grads[l].bias[o] += d;
                }

                if l > 0 {
                    delta = (0..input.len())
                        .map(|i| {
                            let back: f64 = delta
                                .iter()
                                .enumerate()
                                .map(|(o, &d)| layers[l].weights[o][i] * d)
                                .sum();
                            back * activation.derivative(input[i])
                        })
                        .collect();
                }
            }
        }

        let alpha = self.params.alpha;
        for (grad, layer) in grads.iter_mut().zip(layers) {
            for (g_row, w_row) in grad.weights.iter_mut().zip(&layer.weights) {
                for (g, w) in g_row.iter_mut().zip(w_row) {
                    *g = (*g + alpha * w) / m;
                }
            }
            grad.bias.iter_mut().for_each(|g| *g /= m);
        }

        let penalty: f64 = layers.iter().map(DenseLayer::squared_weights).sum();
        let loss = loss / m + 0.5 * alpha * penalty / m;
        (grads, loss)
    }
}

/// Train a perceptron, optionally saving it
pub fn train_network(
    samples: &[Vec<f64>],
    labels: &[Label],
    params: &MlpParams,
    rng: &mut StdRng,
    out_file: Option<&Path>,
) -> Result<TrainedMlp> {
    let model = MlpTrainer::new(params.clone()).train(samples, labels, rng)?;
    if let Some(path) = out_file {
        save_fitted(&FittedModel::Mlp(model.clone()), &format!("mlp {params}"), path)?;
    }
    Ok(model)
}
