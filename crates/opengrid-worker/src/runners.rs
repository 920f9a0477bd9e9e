//! Workload kernels.
//!
//! Every runner is synchronous, CPU-bound (or deliberately sleeping), and
//! returns the elapsed seconds of the compute phase itself -- operand setup
//! is excluded, matching how latency and elapsed are allowed to differ only
//! by instrumentation cost at the lifecycle layer.
//!
//! The kernels are toys: they generate load with a realistic shape (dense
//! products, stencil passes, training-step rhythm), not meaningful math.
//! A memory budget guards allocations because job records arriving over the
//! wire may carry sizes the submission surface never validated.

use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;

use opengrid_core::Workload;

/// Upper bound on transient f32 buffer allocation per job.
const MEMORY_BUDGET_BYTES: u64 = 1 << 30;

/// How long the no-op fallback sleeps.
const FALLBACK_SLEEP: Duration = Duration::from_millis(50);

/// Hidden-layer widths for the training-loop kernels.
const CNN_IN: usize = 256;
const CNN_HIDDEN: usize = 128;
const CNN_OUT: usize = 10;
const DDP_WIDTH: usize = 512;
const LEARNING_RATE: f32 = 0.01;

/// A workload runner failure. The lifecycle turns this into a terminal
/// status with an error field; it never kills the worker loop.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The requested problem size needs more scratch memory than allowed.
    #[error("workload needs {bytes} bytes of scratch, budget is {budget}")]
    MemoryBudget { bytes: u64, budget: u64 },
}

/// Dispatch a workload to its kernel and return the measured elapsed
/// seconds.
///
/// Unknown tags resolve to the no-op sleep runner; they are not an error.
pub fn run(workload: &Workload, size: u32, iterations: u32) -> Result<f64, RunnerError> {
    match workload {
        Workload::Sleep => Ok(sleep_ms(u64::from(size))),
        Workload::Matmul => matmul(size as usize, iterations),
        Workload::Conv => conv(size as usize, iterations),
        Workload::Cnn => train_dense(size as usize, iterations, CNN_IN, CNN_HIDDEN, None),
        Workload::DdpMock => train_dense(
            size as usize,
            iterations,
            DDP_WIDTH,
            DDP_WIDTH,
            // Per-step pause mimicking gradient-sync cost.
            Some(Duration::from_millis(2)),
        ),
        Workload::Other(tag) => {
            tracing::debug!(tag = %tag, "unknown workload tag, running no-op");
            let started = Instant::now();
            std::thread::sleep(FALLBACK_SLEEP);
            Ok(started.elapsed().as_secs_f64())
        }
    }
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

fn sleep_ms(millis: u64) -> f64 {
    let started = Instant::now();
    std::thread::sleep(Duration::from_millis(millis));
    started.elapsed().as_secs_f64()
}

/// Dense `n x n` f32 product, repeated `iterations` times.
fn matmul(n: usize, iterations: u32) -> Result<f64, RunnerError> {
    check_budget(3 * (n as u64) * (n as u64))?;

    let a = random_buffer(n * n);
    let b = random_buffer(n * n);
    let mut c = vec![0.0f32; n * n];

    let started = Instant::now();
    for _ in 0..iterations {
        for i in 0..n {
            for k in 0..n {
                let aik = a[i * n + k];
                for j in 0..n {
                    c[i * n + j] += aik * b[k * n + j];
                }
            }
        }
        std::hint::black_box(&mut c);
    }
    Ok(started.elapsed().as_secs_f64())
}

/// 3x3 stencil passes over an `n x n` image.
fn conv(n: usize, iterations: u32) -> Result<f64, RunnerError> {
    check_budget(2 * (n as u64) * (n as u64))?;

    let mut image = random_buffer(n * n);
    let kernel = random_buffer(9);

    let started = Instant::now();
    for _ in 0..iterations {
        let mut out = vec![0.0f32; n * n];
        for i in 1..n.saturating_sub(1) {
            for j in 1..n - 1 {
                let mut acc = 0.0f32;
                for di in 0..3 {
                    for dj in 0..3 {
                        acc += image[(i + di - 1) * n + (j + dj - 1)] * kernel[di * 3 + dj];
                    }
                }
                out[i * n + j] = acc;
            }
        }
        image = out;
        std::hint::black_box(&mut image);
    }
    Ok(started.elapsed().as_secs_f64())
}

/// Toy training loop: forward through two dense layers, then a mock
/// gradient pass over the weights. `batch` rows per step, `steps` steps.
fn train_dense(
    batch: usize,
    steps: u32,
    input: usize,
    hidden: usize,
    step_pause: Option<Duration>,
) -> Result<f64, RunnerError> {
    let scratch = (batch * input + input * hidden + hidden * CNN_OUT + batch * hidden
        + batch * CNN_OUT) as u64;
    check_budget(scratch)?;

    let mut w1 = random_buffer(input * hidden);
    let mut w2 = random_buffer(hidden * CNN_OUT);

    let started = Instant::now();
    for _ in 0..steps {
        let x = random_buffer(batch * input);

        // Forward: relu(x @ w1) @ w2.
        let mut h = vec![0.0f32; batch * hidden];
        for row in 0..batch {
            for col in 0..hidden {
                let mut acc = 0.0f32;
                for k in 0..input {
                    acc += x[row * input + k] * w1[k * hidden + col];
                }
                h[row * hidden + col] = acc.max(0.0);
            }
        }
        let mut logits = vec![0.0f32; batch * CNN_OUT];
        for row in 0..batch {
            for col in 0..CNN_OUT {
                let mut acc = 0.0f32;
                for k in 0..hidden {
                    acc += h[row * hidden + k] * w2[k * CNN_OUT + col];
                }
                logits[row * CNN_OUT + col] = acc;
            }
        }

        // Mock backward: nudge all weights against the mean activation.
        let mean = logits.iter().sum::<f32>() / logits.len() as f32;
        let delta = LEARNING_RATE * mean * 1e-3;
        for w in &mut w1 {
            *w -= delta;
        }
        for w in &mut w2 {
            *w -= delta;
        }
        std::hint::black_box((&mut w1, &mut w2));

        if let Some(pause) = step_pause {
            std::thread::sleep(pause);
        }
    }
    Ok(started.elapsed().as_secs_f64())
}

fn check_budget(elements: u64) -> Result<(), RunnerError> {
    let bytes = elements.saturating_mul(4);
    if bytes > MEMORY_BUDGET_BYTES {
        return Err(RunnerError::MemoryBudget {
            bytes,
            budget: MEMORY_BUDGET_BYTES,
        });
    }
    Ok(())
}

fn random_buffer(len: usize) -> Vec<f32> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random::<f32>()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
