use crate::structs::header::{HEADER_LEN, SYNCWORD};

/// Offset of the first syncword at or after `from`, or `None` once the
/// buffer is exhausted.
#[inline]
pub fn find_next_sync(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .iter()
        .position(|&byte| byte == SYNCWORD)
        .map(|i| from + i)
}

/// Like [`find_next_sync`], but only accepts positions with a complete
/// header behind them.
pub fn find_frame_start(buffer: &[u8], from: usize) -> Option<usize> {
    find_next_sync(buffer, from).filter(|&offset| buffer.len() - offset >= HEADER_LEN)
}

/// Iterates every syncword position in a buffer, in increasing order.
///
/// ```rust
/// use sbc::process::scan::SyncScanner;
///
/// let offsets = SyncScanner::new(&[0x00, 0x9C, 0x12, 0x9C]).collect::<Vec<_>>();
/// assert_eq!(offsets, [1, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct SyncScanner<'a> {
    buffer: &'a [u8],
    next: usize,
}

impl<'a> SyncScanner<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::starting_at(buffer, 0)
    }

    pub fn starting_at(buffer: &'a [u8], from: usize) -> Self {
        Self { buffer, next: from }
    }
}

impl Iterator for SyncScanner<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let Some(offset) = find_next_sync(self.buffer, self.next) else {
            self.next = self.buffer.len();
            return None;
        };

        self.next = offset + 1;
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_syncword_from_offset() {
        let buffer = [0x01, SYNCWORD, 0x02, SYNCWORD, 0x03];

        assert_eq!(find_next_sync(&buffer, 0), Some(1));
        assert_eq!(find_next_sync(&buffer, 1), Some(1));
        assert_eq!(find_next_sync(&buffer, 2), Some(3));
        assert_eq!(find_next_sync(&buffer, 4), None);
        assert_eq!(find_next_sync(&buffer, 5), None);
        assert_eq!(find_next_sync(&buffer, 99), None);
        assert_eq!(find_next_sync(&[], 0), None);
    }

    #[test]
    fn frame_start_needs_full_header() {
        let buffer = [0x00, SYNCWORD, 0xBD, 0x20];
        assert_eq!(find_frame_start(&buffer, 0), None);

        let buffer = [SYNCWORD, 0xBD, 0x20, 0x00];
        assert_eq!(find_frame_start(&buffer, 0), Some(0));
    }

    #[test]
    fn scanner_only_yields_syncwords_and_never_regresses() {
        let buffer = (0..4096usize)
            .map(|i| ((i * 37 + 123) % 256) as u8)
            .collect::<Vec<_>>();

        let offsets = SyncScanner::new(&buffer).collect::<Vec<_>>();
        assert!(!offsets.is_empty());
        assert!(offsets.iter().all(|&o| buffer[o] == SYNCWORD));
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            offsets.len(),
            buffer.iter().filter(|&&b| b == SYNCWORD).count()
        );
    }
}
