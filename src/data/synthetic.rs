// ============================================================
// Data — Synthetic Blobs
// ============================================================
// Gaussian clusters, one per class. Each class centre is drawn
// uniformly from [-center_box, center_box]^features and samples
// are scattered around it with standard deviation `spread`.
//
// Fully determined by `seed`, so a config file names a dataset
// as precisely as a path would.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::domain::Sample;
use crate::error::{ExecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct BlobOptions {
    pub classes: usize,
    pub features: usize,
    pub samples_per_class: usize,
    pub spread: f32,
    pub center_box: f32,
    pub seed: u64,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            classes: 3,
            features: 4,
            samples_per_class: 100,
            spread: 0.5,
            center_box: 5.0,
            seed: 42,
        }
    }
}

pub fn make_blobs(options: &BlobOptions) -> Result<Vec<Sample>> {
    if options.classes == 0 || options.features == 0 {
        return Err(ExecError::invalid(
            "classes/features",
            "blobs need at least one class and one feature",
        ));
    }
    let noise = Normal::new(0.0f32, options.spread)
        .map_err(|e| ExecError::invalid("spread", e))?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let centers: Vec<Vec<f32>> = (0..options.classes)
        .map(|_| {
            (0..options.features)
                .map(|_| rng.gen_range(-options.center_box..=options.center_box))
                .collect()
        })
        .collect();

    let mut samples = Vec::with_capacity(options.classes * options.samples_per_class);
    for (class, center) in centers.iter().enumerate() {
        for _ in 0..options.samples_per_class {
            let x = center.iter().map(|&c| c + noise.sample(&mut rng)).collect();
            samples.push(Sample::labelled(x, class));
        }
    }
    Ok(samples)
}
