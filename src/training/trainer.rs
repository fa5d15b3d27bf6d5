//! Skip-gram trainer.
//!
//! The model is an embedding table `E (V × D)` looked up by centre token,
//! followed by a linear layer `W (V × D), b (V)` producing logits over the
//! vocabulary. Each `(centre, context)` pair is one step of softmax
//! cross-entropy against the context token. Only `E` is kept afterwards.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Instant;

use super::error::{TrainingError, TrainingResult};
use super::vocab::{Vocabulary, prepare};
use crate::config::{OptimizerKind, TrainingConfig};

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-8;

/// Hyperparameters for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    pub dimension: usize,
    pub window_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub optimizer: OptimizerKind,
    pub seed: Option<u64>,
}

impl TrainingParams {
    pub fn new(dimension: usize, config: &TrainingConfig) -> Self {
        Self {
            dimension,
            window_size: config.window_size,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            optimizer: config.optimizer,
            seed: config.seed,
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.dimension == 0 {
            return Err(TrainingError::InvalidConfig(
                "dimension must be at least 1".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.epochs == 0 {
            return Err(TrainingError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig(format!(
                "learning_rate ({}) must be a positive finite number",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Loss history of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub pairs: usize,
    /// Mean cross-entropy per epoch
    pub epoch_losses: Vec<f32>,
}

impl TrainingReport {
    pub fn epochs(&self) -> usize {
        self.epoch_losses.len()
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().copied()
    }
}

/// Output of [`train`]: the vocabulary and its embedding table.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub vocabulary: Vocabulary,
    /// Row-major `vocabulary.len() × dimension`
    pub embeddings: Vec<f32>,
    pub dimension: usize,
    pub report: TrainingReport,
}

impl TrainedModel {
    pub fn row(&self, index: usize) -> &[f32] {
        &self.embeddings[index * self.dimension..(index + 1) * self.dimension]
    }
}

/// Train skip-gram embeddings over `corpus`, one string per chunk.
pub fn train<S: AsRef<str>>(corpus: &[S], params: &TrainingParams) -> TrainingResult<TrainedModel> {
    params.validate()?;
    let (vocabulary, mut pairs) = prepare(corpus, params.window_size)?;

    let seed = params.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = SkipGram::new(vocabulary.len(), params.dimension, &mut rng);
    let mut optimizer = Optimizer::new(params.optimizer, vocabulary.len(), params.dimension);

    tracing::info!(
        target: "training",
        "training {} pairs over {} tokens: dim={} window={} epochs={} lr={} optimizer={:?}",
        pairs.len(),
        vocabulary.len(),
        params.dimension,
        params.window_size,
        params.epochs,
        params.learning_rate,
        params.optimizer
    );

    let started = Instant::now();
    let mut epoch_losses = Vec::with_capacity(params.epochs);
    for epoch in 0..params.epochs {
        pairs.shuffle(&mut rng);

        let mut total = 0.0f64;
        for &(centre, context) in &pairs {
            total += f64::from(model.step(centre, context, params.learning_rate, &mut optimizer));
        }
        let mean = (total / pairs.len() as f64) as f32;
        epoch_losses.push(mean);

        tracing::info!(
            target: "training",
            "epoch {}/{}: mean loss {:.4}",
            epoch + 1,
            params.epochs,
            mean
        );
    }

    tracing::debug!(
        target: "training",
        "training finished in {:.2?}",
        started.elapsed()
    );

    Ok(TrainedModel {
        vocabulary,
        embeddings: model.embeddings,
        dimension: params.dimension,
        report: TrainingReport {
            pairs: pairs.len(),
            epoch_losses,
        },
    })
}

struct SkipGram {
    vocab_size: usize,
    dimension: usize,
    embeddings: Vec<f32>,
    weights: Vec<f32>,
    bias: Vec<f32>,
    // Per-step scratch
    probs: Vec<f32>,
    hidden_grad: Vec<f32>,
}

impl SkipGram {
    fn new(vocab_size: usize, dimension: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (dimension as f32).sqrt();
        let embeddings = (0..vocab_size * dimension)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let weights = (0..vocab_size * dimension)
            .map(|_| rng.random_range(-bound..bound))
            .collect();
        Self {
            vocab_size,
            dimension,
            embeddings,
            weights,
            bias: vec![0.0; vocab_size],
            probs: vec![0.0; vocab_size],
            hidden_grad: vec![0.0; dimension],
        }
    }

    /// Forward, backward and update for one pair. Returns the loss.
    fn step(&mut self, centre: usize, context: usize, lr: f32, optimizer: &mut Optimizer) -> f32 {
        let d = self.dimension;
        let hidden = self.embeddings[centre * d..(centre + 1) * d].to_vec();

        // logits = W·h + b, softmax in place
        let mut max_logit = f32::NEG_INFINITY;
        for v in 0..self.vocab_size {
            let row = &self.weights[v * d..(v + 1) * d];
            let logit = row.iter().zip(&hidden).map(|(w, h)| w * h).sum::<f32>() + self.bias[v];
            self.probs[v] = logit;
            max_logit = max_logit.max(logit);
        }
        let mut sum = 0.0f32;
        for p in &mut self.probs {
            *p = (*p - max_logit).exp();
            sum += *p;
        }
        for p in &mut self.probs {
            *p /= sum;
        }
        let loss = -self.probs[context].max(f32::MIN_POSITIVE).ln();

        // dlogits = p - onehot(context), reused in place
        self.probs[context] -= 1.0;

        // dh = Wᵀ·dlogits, taken before W moves
        self.hidden_grad.fill(0.0);
        for v in 0..self.vocab_size {
            let g = self.probs[v];
            let row = &self.weights[v * d..(v + 1) * d];
            for (acc, w) in self.hidden_grad.iter_mut().zip(row) {
                *acc += g * w;
            }
        }

        optimizer.update_output(&mut self.weights, &mut self.bias, &self.probs, &hidden, lr);
        optimizer.update_embedding(
            &mut self.embeddings[centre * d..(centre + 1) * d],
            centre,
            &self.hidden_grad,
            lr,
        );

        loss
    }
}

enum Optimizer {
    Sgd,
    Adam(Box<AdamState>),
}

/// Adam moments: dense for the output layer, row-wise for the embedding
/// table since only the centre row receives a gradient on each step.
struct AdamState {
    step: i32,
    weights_m: Vec<f32>,
    weights_v: Vec<f32>,
    bias_m: Vec<f32>,
    bias_v: Vec<f32>,
    embeddings_m: Vec<f32>,
    embeddings_v: Vec<f32>,
    row_steps: Vec<i32>,
    dimension: usize,
}

impl Optimizer {
    fn new(kind: OptimizerKind, vocab_size: usize, dimension: usize) -> Self {
        match kind {
            OptimizerKind::Sgd => Optimizer::Sgd,
            OptimizerKind::Adam => Optimizer::Adam(Box::new(AdamState {
                step: 0,
                weights_m: vec![0.0; vocab_size * dimension],
                weights_v: vec![0.0; vocab_size * dimension],
                bias_m: vec![0.0; vocab_size],
                bias_v: vec![0.0; vocab_size],
                embeddings_m: vec![0.0; vocab_size * dimension],
                embeddings_v: vec![0.0; vocab_size * dimension],
                row_steps: vec![0; vocab_size],
                dimension,
            })),
        }
    }

    /// dW[v] = g[v]·h, db[v] = g[v]
    fn update_output(
        &mut self,
        weights: &mut [f32],
        bias: &mut [f32],
        logit_grads: &[f32],
        hidden: &[f32],
        lr: f32,
    ) {
        let d = hidden.len();
        match self {
            Optimizer::Sgd => {
                for (v, &g) in logit_grads.iter().enumerate() {
                    for (w, h) in weights[v * d..(v + 1) * d].iter_mut().zip(hidden) {
                        *w -= lr * g * h;
                    }
                    bias[v] -= lr * g;
                }
            }
            Optimizer::Adam(state) => {
                state.step += 1;
                let t = state.step;
                for (v, &g) in logit_grads.iter().enumerate() {
                    for j in 0..d {
                        let i = v * d + j;
                        adam_update(
                            &mut weights[i],
                            g * hidden[j],
                            &mut state.weights_m[i],
                            &mut state.weights_v[i],
                            lr,
                            t,
                        );
                    }
                    adam_update(
                        &mut bias[v],
                        g,
                        &mut state.bias_m[v],
                        &mut state.bias_v[v],
                        lr,
                        t,
                    );
                }
            }
        }
    }

    fn update_embedding(&mut self, row: &mut [f32], index: usize, grad: &[f32], lr: f32) {
        match self {
            Optimizer::Sgd => {
                for (e, g) in row.iter_mut().zip(grad) {
                    *e -= lr * g;
                }
            }
            Optimizer::Adam(state) => {
                state.row_steps[index] += 1;
                let t = state.row_steps[index];
                let offset = index * state.dimension;
                for (j, (e, &g)) in row.iter_mut().zip(grad).enumerate() {
                    adam_update(
                        e,
                        g,
                        &mut state.embeddings_m[offset + j],
                        &mut state.embeddings_v[offset + j],
                        lr,
                        t,
                    );
                }
            }
        }
    }
}

fn adam_update(param: &mut f32, grad: f32, m: &mut f32, v: &mut f32, lr: f32, t: i32) {
    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * grad;
    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * grad * grad;
    let m_hat = *m / (1.0 - ADAM_BETA1.powi(t));
    let v_hat = *v / (1.0 - ADAM_BETA2.powi(t));
    *param -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
}
