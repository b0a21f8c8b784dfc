// ============================================================
// Domain — Sample
// ============================================================
// One row of training data, before it becomes a tensor.
//
//   classification:  x = features, y = [class index]
//   regression:      x = features, y = target vector

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

impl Sample {
    pub fn new(x: Vec<f32>, y: Vec<f32>) -> Self {
        Self { x, y }
    }

    /// Classification sample with a single class label.
    pub fn labelled(x: Vec<f32>, label: usize) -> Self {
        Self {
            x,
            y: vec![label as f32],
        }
    }

    /// The class index stored in `y[0]`. Regression samples return
    /// whatever their first target rounds to.
    pub fn label(&self) -> usize {
        self.y.first().map(|&v| v.max(0.0).round() as usize).unwrap_or(0)
    }

    /// `y[0]` when it is a valid class index: finite, non-negative and
    /// integral. Unlike `label`, nothing is rounded or clamped.
    pub fn class_index(&self) -> Option<usize> {
        match self.y.first() {
            Some(&v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Some(v as usize),
            _ => None,
        }
    }
}
