use crate::prelude::{Sample, SensorError, SensorResult};

/// Pool of capture buffers so back-to-back acquisitions reuse one allocation.
pub struct BufferPool {
    buffers: Vec<Vec<Sample>>,
    max_capacity: usize,
}

impl BufferPool {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            max_capacity,
        }
    }

    /// Hands out a zeroed buffer of `length` samples, reusing a pooled one when
    /// available. Allocation failure is reported instead of aborting.
    pub fn checkout(&mut self, length: usize) -> SensorResult<Vec<Sample>> {
        let mut buffer = self.buffers.pop().unwrap_or_default();
        buffer.clear();
        buffer.try_reserve_exact(length).map_err(|err| {
            SensorError::ResourceExhausted(format!(
                "failed to allocate {} sample buffer: {}",
                length, err
            ))
        })?;
        buffer.resize(length, 0);
        Ok(buffer)
    }

    /// Returns a buffer back to the pool for reuse.
    pub fn release(&mut self, mut buffer: Vec<Sample>) {
        buffer.clear();
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.buffers.len()
    }
}

/// Allocates an empty scratch vector able to hold `length` samples.
pub fn scratch(length: usize) -> SensorResult<Vec<Sample>> {
    let mut scratch = Vec::new();
    scratch.try_reserve_exact(length).map_err(|err| {
        SensorError::ResourceExhausted(format!(
            "failed to allocate {} sample window: {}",
            length, err
        ))
    })?;
    Ok(scratch)
}
