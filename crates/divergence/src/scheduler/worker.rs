use crate::{AssetStore, FlickerGenerator, JobQueues, RenderBackend, Result, Value};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-job rendering parameters shared by every job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobSettings {
    pub total_frames: usize,
    pub framerate: u32,
    /// When set, job `v` draws from `StdRng::seed_from_u64(seed + v)`
    /// instead of the thread RNG.
    pub seed: Option<u64>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            total_frames: 60,
            framerate: 60,
            seed: None,
        }
    }
}

/// Main execution loop of the render worker.
///
/// Pops fresh work before refresh work and runs one job at a time. Each job
/// is offloaded to the blocking pool so this task stays responsive; the loop
/// only waits for that one job. A failed job is logged and dropped. When both
/// queues are empty the loop sleeps until a push or cancellation.
///
/// Intended to be spawned as a Tokio task; it exits once `shutdown_token` is
/// cancelled and no job is running.
pub async fn worker_loop<B, S>(
    queues: Arc<JobQueues>,
    backend: B,
    store: Arc<S>,
    generator: FlickerGenerator,
    settings: JobSettings,
    shutdown_token: CancellationToken,
) where
    B: RenderBackend,
    S: AssetStore + ?Sized,
{
    tracing::debug!("Render worker started");
    let backend = Arc::new(Mutex::new(backend));
    let generator = Arc::new(generator);

    loop {
        if shutdown_token.is_cancelled() {
            break;
        }

        let Some((priority, value)) = queues.pop() else {
            tokio::select! {
                () = shutdown_token.cancelled() => break,
                () = queues.notified() => {}
            }
            continue;
        };

        queues.begin(value);
        let start = Instant::now();
        let job = {
            let backend = Arc::clone(&backend);
            let store = Arc::clone(&store);
            let generator = Arc::clone(&generator);
            tokio::task::spawn_blocking(move || {
                run_job(&mut *backend.lock(), &*store, &generator, &settings, value)
            })
        };

        match job.await {
            Ok(Ok(bytes)) => {
                queues.finish(true);
                tracing::info!(
                    %value,
                    %priority,
                    bytes,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Rendered value"
                );
            }
            Ok(Err(e)) => {
                queues.finish(false);
                tracing::error!(%value, %priority, error = %e, "Render job failed");
            }
            Err(e) => {
                queues.finish(false);
                tracing::error!(%value, %priority, error = %e, "Render job panicked");
            }
        }
    }

    tracing::debug!("Render worker stopped");
}

/// Generates, renders, encodes and stages one value. Returns the size of the
/// staged asset.
///
/// Nothing is staged unless every step succeeds.
pub fn run_job<B, S>(
    backend: &mut B,
    store: &S,
    generator: &FlickerGenerator,
    settings: &JobSettings,
    value: Value,
) -> Result<usize>
where
    B: RenderBackend + ?Sized,
    S: AssetStore + ?Sized,
{
    let digits = value.digits(generator.digits())?;
    let sequence = match settings.seed {
        Some(seed) => generator.generate(
            &mut StdRng::seed_from_u64(seed.wrapping_add(value.get())),
            settings.total_frames,
        ),
        None => generator.generate(&mut rand::rng(), settings.total_frames),
    };

    let mut frames = Vec::with_capacity(sequence.len());
    for (i, state) in sequence.iter().enumerate() {
        tracing::trace!(%value, frame = i, pattern = %state.pattern());
        frames.push(backend.render_frame(&digits, &state.materials())?);
    }

    let bytes = backend.encode_sequence(&frames, settings.framerate)?;
    store.write(value, &bytes)?;
    Ok(bytes.len())
}
