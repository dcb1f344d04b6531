//! Range enumeration and request routing

use crate::error::GenError;
use crate::paths::PathPlanner;
use crate::pool::Submitter;
use crate::template::Template;
use crate::worker::GenerationRequest;
use serde::Serialize;
use tracing::{debug, info};

/// Half-open range of zero-based indices to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    pub fn new(start: u64, end: u64) -> Result<Self, GenError> {
        if start > end {
            return Err(GenError::ConfigError(format!(
                "start ({start}) must not be greater than end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of requests the range produces.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Builds one request per index and hands it to the pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    range: RangeSpec,
    template: Template,
    planner: PathPlanner,
}

impl Dispatcher {
    pub fn new(range: RangeSpec, template: Template, planner: PathPlanner) -> Self {
        Self {
            range,
            template,
            planner,
        }
    }

    /// Request for zero-based `index`. The payload carries the 1-based
    /// sequence number.
    pub fn request_for(&self, index: u64) -> GenerationRequest {
        GenerationRequest {
            index,
            text: self.template.render(index + 1),
            output_path: self.planner.path_for(index),
        }
    }

    /// Submit every index of the range, in order. Returns the number of
    /// requests submitted.
    pub async fn dispatch(&self, submitter: &Submitter) -> Result<u64, GenError> {
        if self.range.is_empty() {
            info!(start = self.range.start, "Empty range, nothing to dispatch");
            return Ok(0);
        }

        info!(
            start = self.range.start,
            end = self.range.end,
            workers = submitter.worker_count(),
            "Dispatching requests"
        );

        let mut submitted = 0;
        for index in self.range.start..self.range.end {
            submitter.submit(index, self.request_for(index)).await?;
            submitted += 1;
        }

        debug!(submitted, "Dispatch finished");
        Ok(submitted)
    }
}
