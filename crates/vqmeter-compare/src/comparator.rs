use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use vqmeter_types::{Frame, Metric, Parallelism, Source};

use crate::error::CompareError;
use crate::pool::{BufferPool, Pooled};

/// Per-metric arrays of per-frame scores, indexed by frame index.
pub type FinalScores = HashMap<String, Vec<f64>>;

/// Invoked from the aggregator with `(done, total)` each time a frame pair
/// finishes. `done` increases by one per call; results complete out of
/// order, so the finished pair is not necessarily the lowest pending index.
pub type ProgressCallback = Box<dyn FnMut(usize, usize) + Send>;

/// Matched frames from the two inputs at the same index. Dropping a pair
/// returns both frames to their pools.
struct FramePair {
    index: usize,
    reference: Pooled<Frame>,
    distortion: Pooled<Frame>,
}

/// Merged scores for one frame pair.
struct PairScores {
    index: usize,
    scores: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Reference,
    Distortion,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Reference => "reference",
            Side::Distortion => "distortion",
        }
    }
}

/// Orchestrates the concurrent comparison of two sources with a set of
/// metrics.
///
/// `run` spawns two reader stages, a pair assembler, `frame_threads` metric
/// workers, and an aggregator under one cancellation scope, wired with
/// bounded channels. Frame buffers cycle through two fixed pools sized so no
/// stage can starve another; backpressure flows from the slowest stage to
/// the readers.
pub struct Comparator {
    reference: Box<dyn Source>,
    distortion: Box<dyn Source>,
    metrics: Vec<Arc<dyn Metric>>,
    frame_threads: usize,
    num_frames: usize,
    pool_reference: BufferPool<Frame>,
    pool_distortion: BufferPool<Frame>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("frame_threads", &self.frame_threads)
            .field("num_frames", &self.num_frames)
            .finish_non_exhaustive()
    }
}

impl Comparator {
    /// Validates the configuration and pre-allocates every frame buffer the
    /// pipeline will ever use, each side sized from its own plane layout.
    ///
    /// `num_frames` must not exceed either source's frame count. If any
    /// metric declares [`Parallelism::Sequential`], `frame_threads` must
    /// be 1.
    pub fn new(
        reference: Box<dyn Source>,
        distortion: Box<dyn Source>,
        metrics: Vec<Arc<dyn Metric>>,
        frame_threads: usize,
        num_frames: usize,
    ) -> Result<Self, CompareError> {
        if metrics.is_empty() {
            return Err(CompareError::NoMetrics);
        }
        if frame_threads < 1 {
            return Err(CompareError::NoFrameThreads);
        }
        if num_frames < 1 {
            return Err(CompareError::NoFrames);
        }
        for (side, source) in [
            (Side::Reference, reference.as_ref()),
            (Side::Distortion, distortion.as_ref()),
        ] {
            if source.num_frames() < num_frames {
                return Err(CompareError::NotEnoughFrames {
                    side: side.as_str(),
                    available: source.num_frames(),
                    requested: num_frames,
                });
            }
        }
        if frame_threads > 1 {
            if let Some(metric) = metrics
                .iter()
                .find(|metric| metric.parallelism() == Parallelism::Sequential)
            {
                return Err(CompareError::SequentialMetric {
                    name: metric.name().to_string(),
                });
            }
        }

        let capacity = frame_buffer_count(frame_threads);
        let pool_reference = seeded_pool(&reference.plane_layout(), capacity);
        let pool_distortion = seeded_pool(&distortion.plane_layout(), capacity);

        Ok(Self {
            reference,
            distortion,
            metrics,
            frame_threads,
            num_frames,
            pool_reference,
            pool_distortion,
            progress: None,
        })
    }

    /// Registers an optional progress callback. Must be called before `run`.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Runs the pipeline to completion or first failure.
    ///
    /// Cancelling `cancel` aborts the run; internal failures cancel a child
    /// scope, so the caller's token is never tripped from inside. The first
    /// root-cause error wins: stages that merely observed the cancellation
    /// report [`CompareError::Cancelled`], which never shadows a real error.
    pub async fn run(self, cancel: &CancellationToken) -> Result<FinalScores, CompareError> {
        let Comparator {
            reference,
            distortion,
            metrics,
            frame_threads,
            num_frames,
            pool_reference,
            pool_distortion,
            progress,
        } = self;

        let cancel = cancel.child_token();
        let metrics: Arc<[Arc<dyn Metric>]> = metrics.into();

        let (reference_tx, reference_rx) = mpsc::channel(1);
        let (distortion_tx, distortion_rx) = mpsc::channel(1);
        let (pair_tx, pair_rx) = mpsc::channel((frame_threads / 2).max(1));
        let (score_tx, score_rx) = mpsc::channel(frame_threads);
        let (result_tx, result_rx) = oneshot::channel();

        let mut stages: JoinSet<Result<(), CompareError>> = JoinSet::new();

        {
            let cancel = cancel.clone();
            stages.spawn_blocking(move || {
                read_frames(
                    Side::Reference,
                    reference,
                    pool_reference,
                    reference_tx,
                    num_frames,
                    cancel,
                )
            });
        }
        {
            let cancel = cancel.clone();
            stages.spawn_blocking(move || {
                read_frames(
                    Side::Distortion,
                    distortion,
                    pool_distortion,
                    distortion_tx,
                    num_frames,
                    cancel,
                )
            });
        }
        {
            let cancel = cancel.clone();
            stages.spawn(pair_frames(
                reference_rx,
                distortion_rx,
                pair_tx,
                num_frames,
                cancel,
            ));
        }

        let pair_rx = Arc::new(tokio::sync::Mutex::new(pair_rx));
        for _ in 0..frame_threads {
            let cancel = cancel.clone();
            stages.spawn(score_pairs(
                Arc::clone(&pair_rx),
                score_tx.clone(),
                Arc::clone(&metrics),
                cancel,
            ));
        }
        // The workers hold the only remaining score senders; the channel
        // closes when the last worker exits.
        drop(score_tx);

        {
            let cancel = cancel.clone();
            stages.spawn(async move {
                let scores = aggregate_scores(score_rx, num_frames, progress, cancel).await?;
                let _ = result_tx.send(scores);
                Ok(())
            });
        }

        let mut first_error: Option<CompareError> = None;
        while let Some(joined) = stages.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => Err(CompareError::StagePanic(join_error.to_string())),
            };
            if let Err(error) = outcome {
                cancel.cancel();
                record_error(&mut first_error, error);
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        result_rx.await.map_err(|_| CompareError::Cancelled)
    }
}

/// Per-side frame buffer budget: one slot in the side channel, the pair
/// channel's buffered pairs plus the one the assembler holds, and one pair
/// per worker.
fn frame_buffer_count(frame_threads: usize) -> usize {
    1 + (frame_threads / 2 + 1) + frame_threads
}

fn seeded_pool(layout: &vqmeter_types::PlaneLayout, capacity: usize) -> BufferPool<Frame> {
    let pool = BufferPool::new(capacity);
    for _ in 0..capacity {
        pool.release(Frame::with_layout(layout));
    }
    pool
}

/// Keeps the first root cause; a bare cancellation only stands in until a
/// real error is observed.
fn record_error(slot: &mut Option<CompareError>, error: CompareError) {
    match slot {
        None => *slot = Some(error),
        Some(existing) if existing.is_cancelled() && !error.is_cancelled() => {
            *slot = Some(error);
        }
        Some(_) => {}
    }
}

/// Reader stage: pulls `num_frames` frames from one source in index order.
/// Runs on a blocking thread because sources decode synchronously.
fn read_frames(
    side: Side,
    mut source: Box<dyn Source>,
    pool: BufferPool<Frame>,
    tx: mpsc::Sender<Pooled<Frame>>,
    num_frames: usize,
    cancel: CancellationToken,
) -> Result<(), CompareError> {
    for index in 0..num_frames {
        if cancel.is_cancelled() {
            return Err(CompareError::Cancelled);
        }
        let mut frame = pool.acquire();
        if cancel.is_cancelled() {
            return Err(CompareError::Cancelled);
        }
        if let Err(source_error) = source.read_into(&mut frame) {
            return Err(CompareError::SourceRead {
                side: side.as_str(),
                index,
                source: source_error,
            });
        }
        if tx.blocking_send(frame).is_err() {
            // Downstream is gone; the rejected frame flows back to the pool
            // through its guard.
            return Ok(());
        }
    }
    Ok(())
}

/// Pair assembler: matches one frame from each side per index. A closed
/// side channel means the reader stopped early, which is reported by the
/// reader itself, so this stage just ends.
async fn pair_frames(
    mut reference_rx: mpsc::Receiver<Pooled<Frame>>,
    mut distortion_rx: mpsc::Receiver<Pooled<Frame>>,
    pair_tx: mpsc::Sender<FramePair>,
    num_frames: usize,
    cancel: CancellationToken,
) -> Result<(), CompareError> {
    for index in 0..num_frames {
        let reference = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompareError::Cancelled),
            frame = reference_rx.recv() => match frame {
                Some(frame) => frame,
                None => return Ok(()),
            },
        };
        let distortion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompareError::Cancelled),
            frame = distortion_rx.recv() => match frame {
                Some(frame) => frame,
                None => return Ok(()),
            },
        };
        let pair = FramePair {
            index,
            reference,
            distortion,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompareError::Cancelled),
            sent = pair_tx.send(pair) => if sent.is_err() {
                return Ok(());
            },
        }
    }
    Ok(())
}

/// Metric worker: takes pairs from the shared channel and scores them. The
/// receiver is shared through a mutex so any idle worker can pick up the
/// next pair.
async fn score_pairs(
    pair_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<FramePair>>>,
    score_tx: mpsc::Sender<PairScores>,
    metrics: Arc<[Arc<dyn Metric>]>,
    cancel: CancellationToken,
) -> Result<(), CompareError> {
    loop {
        let pair = {
            let mut rx = pair_rx.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CompareError::Cancelled),
                pair = rx.recv() => match pair {
                    Some(pair) => pair,
                    None => return Ok(()),
                },
            }
        };
        let index = pair.index;
        let metrics = Arc::clone(&metrics);
        let scores = tokio::task::spawn_blocking(move || compute_pair_scores(pair, &metrics))
            .await
            .map_err(|join_error| CompareError::StagePanic(join_error.to_string()))??;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompareError::Cancelled),
            sent = score_tx.send(PairScores { index, scores }) => if sent.is_err() {
                return Ok(());
            },
        }
    }
}

/// Runs every metric over one pair concurrently, merging into a single map.
/// Both frames return to their pools before this function reports, on every
/// path.
fn compute_pair_scores(
    pair: FramePair,
    metrics: &[Arc<dyn Metric>],
) -> Result<HashMap<String, f64>, CompareError> {
    let merged = Mutex::new(HashMap::with_capacity(metrics.len() * 3));
    let failure: Mutex<Option<CompareError>> = Mutex::new(None);

    rayon::scope(|scope| {
        for metric in metrics {
            let merged = &merged;
            let failure = &failure;
            let reference: &Frame = &pair.reference;
            let distortion: &Frame = &pair.distortion;
            scope.spawn(move |_| match metric.compute(reference, distortion) {
                Ok(scores) => {
                    let mut merged = merged.lock();
                    for (key, value) in scores {
                        if merged.contains_key(&key) {
                            record_failure(
                                failure,
                                CompareError::DuplicateScoreKey {
                                    key,
                                    metric: metric.name().to_string(),
                                },
                            );
                            return;
                        }
                        merged.insert(key, value);
                    }
                }
                Err(metric_error) => record_failure(
                    failure,
                    CompareError::Metric {
                        name: metric.name().to_string(),
                        source: metric_error,
                    },
                ),
            });
        }
    });
    drop(pair);

    match failure.into_inner() {
        Some(error) => Err(error),
        None => Ok(merged.into_inner()),
    }
}

fn record_failure(slot: &Mutex<Option<CompareError>>, error: CompareError) {
    let mut slot = slot.lock();
    if slot.is_none() {
        *slot = Some(error);
    }
}

/// Aggregator: places every score at its frame index and reports progress.
/// Owns the result table exclusively for the duration of the run.
async fn aggregate_scores(
    mut score_rx: mpsc::Receiver<PairScores>,
    num_frames: usize,
    mut progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<FinalScores, CompareError> {
    let mut final_scores: FinalScores = HashMap::new();
    let mut completed = 0usize;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompareError::Cancelled),
            result = score_rx.recv() => match result {
                Some(result) => result,
                None => break,
            },
        };
        if result.index >= num_frames {
            return Err(CompareError::ScoreIndexOutOfRange {
                index: result.index,
                total: num_frames,
            });
        }
        for (key, value) in result.scores {
            let slots = final_scores
                .entry(key)
                .or_insert_with(|| vec![0.0; num_frames]);
            slots[result.index] = value;
        }
        completed += 1;
        if let Some(callback) = progress.as_mut() {
            callback(completed, num_frames);
        }
    }
    Ok(final_scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_budget_covers_every_stage() {
        // side channel slot + buffered pairs + assembler hold + workers
        assert_eq!(frame_buffer_count(1), 3);
        assert_eq!(frame_buffer_count(2), 5);
        assert_eq!(frame_buffer_count(3), 6);
        assert_eq!(frame_buffer_count(8), 14);
    }

    #[test]
    fn cancellation_never_shadows_a_root_cause() {
        let mut slot = None;
        record_error(&mut slot, CompareError::Cancelled);
        record_error(
            &mut slot,
            CompareError::ScoreIndexOutOfRange { index: 9, total: 3 },
        );
        assert!(matches!(
            slot,
            Some(CompareError::ScoreIndexOutOfRange { index: 9, total: 3 })
        ));

        // But the first real error is kept over later ones.
        record_error(&mut slot, CompareError::NoMetrics);
        assert!(matches!(
            slot,
            Some(CompareError::ScoreIndexOutOfRange { .. })
        ));
    }
}
