use crate::error::PlanError;

/// One contiguous byte range of a remote file together with the buffer that
/// receives its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    /// First byte offset, inclusive.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
    pub buffer: Vec<u8>,
}

impl Segment {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        let len = (end - start + 1) as usize;
        Self {
            index,
            start,
            end,
            buffer: vec![0; len],
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Splits `total_size` bytes into `segment_count` contiguous ranges.
///
/// Every range but the last is `total_size / segment_count` bytes long; the
/// last one absorbs the remainder. When there are fewer bytes than requested
/// segments, the count is reduced so that no range is empty.
pub fn plan(total_size: u64, segment_count: usize) -> Result<Vec<Segment>, PlanError> {
    if total_size == 0 {
        return Err(PlanError::EmptyResource);
    }
    if segment_count == 0 {
        return Err(PlanError::NoSegments);
    }

    let count = (segment_count as u64).min(total_size);
    let segment_size = total_size / count;

    let segments = (0..count)
        .map(|i| {
            let start = i * segment_size;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                (i + 1) * segment_size - 1
            };
            Segment::new(i as usize, start, end)
        })
        .collect();

    Ok(segments)
}
