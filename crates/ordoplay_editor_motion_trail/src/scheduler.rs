// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sparse, budgeted frame sampling.
//!
//! Evaluating every frame of a long range in one tick would stall the
//! editor, so the scheduler hands out one small batch of indices per tick.
//! Each sub-range is split into `num_buckets` interleaved buckets; a tick
//! emits bucket `b`, i.e. indices `start + b + k * num_buckets`. After
//! `num_buckets` ticks every index of the sub-range has been visited, while
//! every tick costs at most `indices_per_bucket` samples plus the must-have
//! indices.
//!
//! The current frame is always the last index of a batch, so hosts with
//! last-write-wins state end up showing the frame the user is looking at.

use crate::options::DEFAULT_INDICES_PER_BUCKET;

/// One tick's worth of work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationBatch {
    /// Indices to evaluate this tick, current frame last
    pub indices_to_calculate: Vec<usize>,
    /// Must-have indices known to the scheduler, current frame last
    pub must_have_indices: Vec<usize>,
    /// Bucket this batch came from; `None` for must-have-only batches
    pub bucket: Option<usize>,
    /// No more work after this batch
    pub done: bool,
}

/// Scheduler progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Nothing to do
    #[default]
    Idle,
    /// Reset; the next batch starts the first sub-range
    Priming,
    /// Walking the buckets of one sub-range
    Bucketing {
        /// Sub-range being walked
        range: usize,
        /// Next bucket to emit
        bucket: usize,
    },
    /// Every sub-range has been walked
    Draining,
}

/// Hands out frame indices to evaluate, one batch per tick
#[derive(Debug, Clone)]
pub struct FrameSampleScheduler {
    indices_per_bucket: usize,
    state: SchedulerState,
    /// Inclusive index ranges, walked in order
    ranges: Vec<(usize, usize)>,
    /// Deduplicated must-have indices, current frame last
    must_have: Vec<usize>,
}

impl Default for FrameSampleScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INDICES_PER_BUCKET)
    }
}

impl FrameSampleScheduler {
    /// Create an idle scheduler
    pub fn new(indices_per_bucket: usize) -> Self {
        Self {
            indices_per_bucket: indices_per_bucket.max(1),
            state: SchedulerState::Idle,
            ranges: Vec::new(),
            must_have: Vec::new(),
        }
    }

    /// Indices per bucket
    pub fn indices_per_bucket(&self) -> usize {
        self.indices_per_bucket
    }

    /// Change the per-bucket budget; restarts an in-flight scan
    pub fn set_indices_per_bucket(&mut self, indices_per_bucket: usize) {
        let indices_per_bucket = indices_per_bucket.max(1);
        if indices_per_bucket != self.indices_per_bucket {
            self.indices_per_bucket = indices_per_bucket;
            if self.keep_calculating() {
                self.state = SchedulerState::Priming;
            }
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Whether batches with new work remain
    pub fn keep_calculating(&self) -> bool {
        matches!(self.state, SchedulerState::Priming | SchedulerState::Bucketing { .. })
    }

    /// Number of buckets a sub-range of `size` indices is split into
    pub fn num_buckets(&self, size: usize) -> usize {
        size.div_ceil(self.indices_per_bucket) + 1
    }

    /// Start a new scan, discarding any in-flight progress.
    ///
    /// `ranges` are inclusive index ranges walked in order; empty ones are
    /// dropped. `current` is appended to the must-have set last.
    pub fn reset(&mut self, ranges: Vec<(usize, usize)>, must_have: &[usize], current: usize) {
        self.ranges = ranges.into_iter().filter(|(first, last)| first <= last).collect();
        self.set_must_have(must_have, current);
        self.state = SchedulerState::Priming;
        tracing::debug!(
            ranges = self.ranges.len(),
            must_have = self.must_have.len(),
            "Frame scheduler reset"
        );
    }

    /// Replace the must-have set without restarting the scan
    pub fn set_must_have(&mut self, must_have: &[usize], current: usize) {
        self.must_have.clear();
        for &index in must_have {
            if index != current && !self.must_have.contains(&index) {
                self.must_have.push(index);
            }
        }
        self.must_have.push(current);
    }

    /// Stop scanning
    pub fn cancel(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Produce the next batch.
    ///
    /// While `interactive` (a mouse button is held) only must-have indices are
    /// emitted and bucket progress is left untouched.
    pub fn next_batch(&mut self, interactive: bool) -> EvaluationBatch {
        let must_have_indices = self.must_have.clone();

        match self.state {
            SchedulerState::Idle => {
                return EvaluationBatch {
                    must_have_indices,
                    done: true,
                    ..EvaluationBatch::default()
                };
            }
            SchedulerState::Draining => {
                self.state = SchedulerState::Idle;
                return EvaluationBatch {
                    must_have_indices,
                    done: true,
                    ..EvaluationBatch::default()
                };
            }
            SchedulerState::Priming | SchedulerState::Bucketing { .. } if interactive => {
                return EvaluationBatch {
                    indices_to_calculate: must_have_indices.clone(),
                    must_have_indices,
                    bucket: None,
                    done: false,
                };
            }
            SchedulerState::Priming | SchedulerState::Bucketing { .. } => {}
        }

        let (range, bucket, appended) = match self.state {
            SchedulerState::Bucketing { range, bucket } => {
                (range, bucket, &self.must_have[self.must_have.len() - 1..])
            }
            // The first batch of a scan also carries every must-have index
            _ => (0, 0, &self.must_have[..]),
        };

        let mut indices = Vec::with_capacity(self.indices_per_bucket + appended.len());
        if let Some(&(first, last)) = self.ranges.get(range) {
            let size = last - first + 1;
            let num_buckets = self.num_buckets(size);
            for k in 0..self.indices_per_bucket {
                let index = first + bucket + k * num_buckets;
                if index > last {
                    break;
                }
                if !appended.contains(&index) {
                    indices.push(index);
                }
            }
        }
        indices.extend_from_slice(appended);

        self.state = self.advance(range, bucket + 1);
        tracing::trace!(range, bucket, count = indices.len(), "Frame scheduler batch");

        EvaluationBatch {
            indices_to_calculate: indices,
            must_have_indices,
            bucket: Some(bucket),
            done: !self.keep_calculating(),
        }
    }

    /// State after emitting a bucket of `range`, with `next_bucket` up next
    fn advance(&self, range: usize, next_bucket: usize) -> SchedulerState {
        let Some(&(first, last)) = self.ranges.get(range) else {
            return SchedulerState::Draining;
        };
        if next_bucket < self.num_buckets(last - first + 1) {
            return SchedulerState::Bucketing {
                range,
                bucket: next_bucket,
            };
        }
        if range + 1 < self.ranges.len() {
            SchedulerState::Bucketing {
                range: range + 1,
                bucket: 0,
            }
        } else {
            SchedulerState::Draining
        }
    }
}
