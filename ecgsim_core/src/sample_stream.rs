//! Fixed-capacity sample buffers, one per lead.

use crate::lead_projection::{Lead, LeadVector, LEAD_COUNT};
use std::collections::VecDeque;

/// Ring buffer of the most recent samples of one lead. Oldest samples are
/// evicted once capacity is reached.
#[derive(Debug, Clone)]
pub struct SampleStream {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl SampleStream {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Copy of the buffer, oldest to newest.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The twelve lead streams, fed one frame per step.
#[derive(Debug, Clone)]
pub struct LeadStreams {
    streams: Vec<SampleStream>,
}

impl LeadStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            streams: (0..LEAD_COUNT).map(|_| SampleStream::new(capacity)).collect(),
        }
    }

    pub fn push_frame(&mut self, frame: &LeadVector) {
        for (stream, value) in self.streams.iter_mut().zip(frame.0.iter()) {
            stream.push(*value);
        }
    }

    pub fn stream(&self, lead: Lead) -> &SampleStream {
        &self.streams[lead.index()]
    }

    /// Number of frames currently buffered.
    pub fn len(&self) -> usize {
        self.streams.first().map_or(0, SampleStream::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_evicts_oldest() {
        let mut stream = SampleStream::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            stream.push(v);
        }
        assert_eq!(stream.snapshot(), vec![2.0, 3.0, 4.0]);
        assert_eq!(stream.latest(), Some(4.0));
        assert_eq!(stream.len(), stream.capacity());
    }

    #[test]
    fn test_frames_route_to_leads() {
        let mut streams = LeadStreams::new(10);
        let mut frame = LeadVector::zeros();
        frame.0[Lead::V2.index()] = 1.5;

        streams.push_frame(&frame);
        streams.push_frame(&LeadVector::zeros());

        assert_eq!(streams.len(), 2);
        assert_eq!(streams.stream(Lead::V2).snapshot(), vec![1.5, 0.0]);
        assert_eq!(streams.stream(Lead::I).snapshot(), vec![0.0, 0.0]);
    }
}
