// Splitting a file into part byte ranges.

/// One part to transfer: a contiguous byte range of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartJob {
    /// 0-based position in the session's target list.
    pub index: usize,
    pub offset: u64,
    pub len: u64,
}

impl PartJob {
    /// 1-based number reported to the control plane.
    pub fn part_number(&self) -> usize {
        self.index + 1
    }
}

/// Number of parts needed to cover `file_size` bytes.
pub fn part_count(file_size: u64, part_size: u64) -> usize {
    if part_size == 0 {
        return 0;
    }
    file_size.div_ceil(part_size) as usize
}

/// Byte range of part `index`; the last part is clamped to the end of file.
pub fn part_job(index: usize, part_size: u64, file_size: u64) -> PartJob {
    let offset = index as u64 * part_size;
    let len = part_size.min(file_size.saturating_sub(offset));
    PartJob { index, offset, len }
}

pub fn plan_parts(file_size: u64, part_size: u64) -> Vec<PartJob> {
    (0..part_count(file_size, part_size))
        .map(|i| part_job(i, part_size, file_size))
        .collect()
}
