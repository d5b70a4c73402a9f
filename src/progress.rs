//! Pass-through reader that reports how many bytes have gone by.

use std::io::{self, Read};

/// Callback receiving the cumulative byte count.
pub type Progress<'a> = &'a mut dyn FnMut(u64);

/// Forwards reads from `inner` unchanged, reporting the running total.
pub struct ProgressReader<'a, R> {
    inner: R,
    seen: u64,
    on_progress: Option<Progress<'a>>,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new(inner: R, on_progress: Option<Progress<'a>>) -> Self {
        Self {
            inner,
            seen: 0,
            on_progress,
        }
    }

    /// Bytes read so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.seen += n as u64;
            if let Some(report) = self.on_progress.as_mut() {
                report(self.seen);
            }
        }
        Ok(n)
    }
}
