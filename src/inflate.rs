#![forbid(unsafe_code)]

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::Result;

////////////////////////////////////////////////////////////////////////////////

const SCRATCH_SIZE: usize = 32 * 1024;

/// Push-style raw DEFLATE decoder.
pub struct Inflater {
    engine: Decompress,
    scratch: Vec<u8>,
    finished: bool,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            engine: Decompress::new(false),
            scratch: vec![0; SCRATCH_SIZE],
            finished: false,
        }
    }

    pub fn reset(&mut self) {
        self.engine.reset(false);
        self.finished = false;
    }

    /// Whether the final block has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn total_out(&self) -> u64 {
        self.engine.total_out()
    }

    /// Feeds compressed bytes, handing every piece of inflated output to
    /// `on_output`. Returns how many bytes of `input` were consumed, which is
    /// all of them unless the stream ended inside `input`.
    pub fn feed<F>(&mut self, mut input: &[u8], mut on_output: F) -> Result<usize>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut consumed = 0;
        while !self.finished {
            let before_in = self.engine.total_in();
            let before_out = self.engine.total_out();

            let status = self
                .engine
                .decompress(input, &mut self.scratch, FlushDecompress::None)?;

            let step_in = (self.engine.total_in() - before_in) as usize;
            let step_out = (self.engine.total_out() - before_out) as usize;

            if step_out > 0 {
                on_output(&self.scratch[..step_out])?;
            }
            input = &input[step_in..];
            consumed += step_in;

            match status {
                Status::StreamEnd => self.finished = true,
                _ if step_in == 0 && step_out == 0 => break,
                _ if input.is_empty() && step_out < self.scratch.len() => break,
                _ => {}
            }
        }
        Ok(consumed)
    }
}

////////////////////////////////////////////////////////////////////////////////
