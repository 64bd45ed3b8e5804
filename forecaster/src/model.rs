//! Short-horizon sequence regression model
//!
//! A small recurrent regressor mapping a fixed-length window of normalized
//! values to the next-step value: one tanh recurrent layer followed by a
//! dense projection to a single output, trained with mean-squared-error by
//! backpropagation through the window. The epoch count per fit is bounded so
//! repeated retraining cycles stay cheap.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};

/// Gradient-norm ceiling applied per minibatch
const GRAD_CLIP_NORM: f64 = 5.0;

/// Summary of one completed fit cycle
#[derive(Debug, Clone, Copy)]
pub struct FitReport {
    /// Mean training loss over the final epoch
    pub train_loss: f64,

    /// Loss on the held-out trailing fraction, if one was carved out
    pub validation_loss: Option<f64>,

    /// Epochs run in this cycle
    pub epochs: usize,
}

/// Recurrent regressor over one metric series.
///
/// The network is created lazily on the first fit and re-fit in place on
/// later cycles, so weights carry across retraining while object identity
/// stays stable.
#[derive(Debug)]
pub struct SequenceModel {
    config: ModelConfig,
    net: Option<RecurrentNet>,
}

impl SequenceModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config, net: None }
    }

    /// Whether at least one fit has completed
    pub fn is_initialized(&self) -> bool {
        self.net.is_some()
    }

    /// Input window length expected by `predict_one`
    pub fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    /// Train (or continue training) on supervised window/target pairs.
    ///
    /// The trailing `validation_fraction` of the pairs is held out, the
    /// remainder is shuffled each epoch and consumed in minibatches with
    /// averaged, norm-clipped gradients.
    pub fn fit(&mut self, windows: &[Vec<f64>], targets: &[f64]) -> ModelResult<FitReport> {
        if windows.is_empty() {
            return Err(ModelError::EmptyWindow);
        }
        debug_assert_eq!(windows.len(), targets.len());

        let expected = self.config.sequence_length;
        if let Some(bad) = windows.iter().find(|w| w.len() != expected) {
            return Err(ModelError::WindowLength { got: bad.len(), expected });
        }

        let hidden_size = self.config.hidden_size;
        let net = self.net.get_or_insert_with(|| RecurrentNet::new(hidden_size));

        let val_len = ((windows.len() as f64) * self.config.validation_fraction) as usize;
        let train_len = (windows.len() - val_len).max(1);

        let mut indices: Vec<usize> = (0..train_len).collect();
        let mut rng = rand::thread_rng();
        let mut epoch_loss = 0.0;

        for _ in 0..self.config.epochs {
            indices.shuffle(&mut rng);
            let mut loss_sum = 0.0;

            for batch in indices.chunks(self.config.batch_size) {
                let mut grads = Gradients::zeros(net.hidden);

                for &idx in batch {
                    loss_sum += net.accumulate(&windows[idx], targets[idx], &mut grads);
                }

                grads.scale(1.0 / batch.len() as f64);
                grads.clip(GRAD_CLIP_NORM);
                net.apply(&grads, self.config.learning_rate);
            }

            epoch_loss = loss_sum / train_len as f64;
            if !epoch_loss.is_finite() {
                return Err(ModelError::Diverged);
            }
        }

        let validation_loss = if val_len > 0 && train_len < windows.len() {
            let mut val_sum = 0.0;
            for idx in train_len..windows.len() {
                let (_, y) = net.forward(&windows[idx]);
                let err = y - targets[idx];
                val_sum += 0.5 * err * err;
            }
            Some(val_sum / val_len as f64)
        } else {
            None
        };

        Ok(FitReport {
            train_loss: epoch_loss,
            validation_loss,
            epochs: self.config.epochs,
        })
    }

    /// Single-step inference in the normalized domain.
    ///
    /// The output is not clamped here; the forecaster clamps after
    /// denormalization.
    pub fn predict_one(&self, window: &[f64]) -> ModelResult<f64> {
        let net = self.net.as_ref().ok_or(ModelError::NotTrained {
            data_points: 0,
            required: self.config.train_threshold(),
        })?;

        if window.len() != self.config.sequence_length {
            return Err(ModelError::WindowLength {
                got: window.len(),
                expected: self.config.sequence_length,
            });
        }

        let (_, y) = net.forward(window);
        Ok(y)
    }
}

/// The network parameters: scalar-input recurrent layer plus dense output
#[derive(Debug)]
struct RecurrentNet {
    hidden: usize,
    w_in: Vec<f64>,
    w_rec: Vec<Vec<f64>>,
    b: Vec<f64>,
    w_out: Vec<f64>,
    b_out: f64,
}

impl RecurrentNet {
    fn new(hidden: usize) -> Self {
        let mut rng = rand::thread_rng();
        let scale = 1.0 / (hidden as f64).sqrt();
        let mut sample = move || rng.gen_range(-scale..scale);

        Self {
            hidden,
            w_in: (0..hidden).map(|_| sample()).collect(),
            w_rec: (0..hidden)
                .map(|_| (0..hidden).map(|_| sample()).collect())
                .collect(),
            b: vec![0.0; hidden],
            w_out: (0..hidden).map(|_| sample()).collect(),
            b_out: 0.0,
        }
    }

    /// Run the window through the network, returning every hidden state
    /// (index 0 is the zero initial state) and the scalar output.
    fn forward(&self, window: &[f64]) -> (Vec<Vec<f64>>, f64) {
        let mut states = Vec::with_capacity(window.len() + 1);
        states.push(vec![0.0; self.hidden]);

        for &x in window {
            let prev = &states[states.len() - 1];
            let mut h = vec![0.0; self.hidden];
            for i in 0..self.hidden {
                let mut a = self.w_in[i] * x + self.b[i];
                for j in 0..self.hidden {
                    a += self.w_rec[i][j] * prev[j];
                }
                h[i] = a.tanh();
            }
            states.push(h);
        }

        let last = &states[states.len() - 1];
        let y = self.b_out
            + last
                .iter()
                .zip(self.w_out.iter())
                .map(|(h, w)| h * w)
                .sum::<f64>();
        (states, y)
    }

    /// Backpropagate one example through the window, adding parameter
    /// gradients into `grads`; returns the example loss.
    fn accumulate(&self, window: &[f64], target: f64, grads: &mut Gradients) -> f64 {
        let (states, y) = self.forward(window);
        let dy = y - target;

        let last = &states[states.len() - 1];
        for i in 0..self.hidden {
            grads.w_out[i] += dy * last[i];
        }
        grads.b_out += dy;

        let mut dh: Vec<f64> = self.w_out.iter().map(|w| dy * w).collect();

        for t in (1..states.len()).rev() {
            let h_t = &states[t];
            let h_prev = &states[t - 1];
            let x_t = window[t - 1];

            let mut dh_prev = vec![0.0; self.hidden];
            for i in 0..self.hidden {
                let da = dh[i] * (1.0 - h_t[i] * h_t[i]);
                grads.w_in[i] += da * x_t;
                grads.b[i] += da;
                for j in 0..self.hidden {
                    grads.w_rec[i][j] += da * h_prev[j];
                    dh_prev[j] += da * self.w_rec[i][j];
                }
            }
            dh = dh_prev;
        }

        0.5 * dy * dy
    }

    /// Apply one SGD step
    fn apply(&mut self, grads: &Gradients, lr: f64) {
        for i in 0..self.hidden {
            self.w_in[i] -= lr * grads.w_in[i];
            self.b[i] -= lr * grads.b[i];
            self.w_out[i] -= lr * grads.w_out[i];
            for j in 0..self.hidden {
                self.w_rec[i][j] -= lr * grads.w_rec[i][j];
            }
        }
        self.b_out -= lr * grads.b_out;
    }
}

/// Parameter gradients accumulated over a minibatch
struct Gradients {
    w_in: Vec<f64>,
    w_rec: Vec<Vec<f64>>,
    b: Vec<f64>,
    w_out: Vec<f64>,
    b_out: f64,
}

impl Gradients {
    fn zeros(hidden: usize) -> Self {
        Self {
            w_in: vec![0.0; hidden],
            w_rec: vec![vec![0.0; hidden]; hidden],
            b: vec![0.0; hidden],
            w_out: vec![0.0; hidden],
            b_out: 0.0,
        }
    }

    fn scale(&mut self, factor: f64) {
        for v in self
            .w_in
            .iter_mut()
            .chain(self.b.iter_mut())
            .chain(self.w_out.iter_mut())
            .chain(self.w_rec.iter_mut().flatten())
        {
            *v *= factor;
        }
        self.b_out *= factor;
    }

    fn norm(&self) -> f64 {
        let sum: f64 = self
            .w_in
            .iter()
            .chain(self.b.iter())
            .chain(self.w_out.iter())
            .chain(self.w_rec.iter().flatten())
            .chain(std::iter::once(&self.b_out))
            .map(|v| v * v)
            .sum();
        sum.sqrt()
    }

    fn clip(&mut self, max_norm: f64) {
        let norm = self.norm();
        if norm > max_norm {
            self.scale(max_norm / norm);
        }
    }
}
