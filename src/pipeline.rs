//! Drives bytes from a source through a cipher stage into a sink.

use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use crate::crypto::{CHUNK_SIZE, CryptStage};
use crate::error::Result;

/// Pumps `source` through `stage` into `sink` one chunk at a time.
///
/// A chunk is fully written downstream before the next one is read, so no
/// more than one chunk (plus a cipher block) is ever in flight.
/// Returns the number of bytes written to `sink`.
pub fn run<R, W>(mut source: R, stage: &mut dyn CryptStage, mut sink: W) -> Result<u64>
where
    R: Read,
    W: Write,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut out = Vec::with_capacity(CHUNK_SIZE + 64);
    let mut written = 0u64;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        stage.update(&buf[..n], &mut out)?;
        sink.write_all(&out)?;
        written += out.len() as u64;
        trace!(read = n, emitted = out.len(), "chunk");
        out.clear();
    }

    stage.finish(&mut out)?;
    sink.write_all(&out)?;
    written += out.len() as u64;
    sink.flush()?;

    Ok(written)
}
