//! Handle-owned destination storage and the overflow retry loop.
//!
//! The codec primitive converts only as much as fits in a fixed destination
//! span per step, so whole-input conversion is driven from here: keep a
//! cursor into the source and one into the destination, step the codec, and
//! on overflow grow the destination (preserving what was already written)
//! and retry from the same source cursor. Capacity only grows over a
//! buffer's lifetime; content is overwritten on every conversion.

use crate::codec::{Codec, StepStatus};
use crate::{Error, Result};

/// Smallest allocation made for the destination storage.
const MIN_BUF_SIZE: usize = 256;

pub(crate) struct OutputBuffer {
    storage: Vec<u8>,
    /// Bytes written by the most recent successful conversion.
    len: usize,
    /// Hard ceiling on storage growth.
    max: usize,
}

impl OutputBuffer {
    pub(crate) fn new(max: usize) -> OutputBuffer {
        OutputBuffer {
            storage: Vec::new(),
            len: 0,
            max,
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Convert all of `src` through `codec`, growing the destination storage
    /// as needed, and return the converted bytes as a view into it.
    ///
    /// On any failure no partial result is exposed; the storage contents are
    /// unspecified until the next successful conversion.
    pub(crate) fn convert(&mut self, codec: &mut dyn Codec, src: &[u8]) -> Result<&[u8]> {
        codec.reset();
        self.len = 0;
        self.reserve_for(src.len());
        let mut consumed = 0;
        let mut written = 0;
        loop {
            let (read, wrote, status) = codec.step(&src[consumed..], &mut self.storage[written..]);
            consumed += read;
            written += wrote;
            match status {
                StepStatus::Done => {
                    self.len = written;
                    return Ok(&self.storage[..written]);
                }
                StepStatus::OutputFull => self.grow()?,
                StepStatus::InvalidSequence => return Err(Error::InvalidSequence),
                StepStatus::IncompleteSequence => return Err(Error::IncompleteSequence),
                StepStatus::Other(message) => return Err(Error::Primitive(message)),
            }
        }
    }

    /// Pre-size the storage for an input of `input_len` bytes: twice the
    /// input, at least the minimum allocation, rounded up by doubling and
    /// clamped to the ceiling. Most conversions finish without a mid-flight
    /// grow this way.
    fn reserve_for(&mut self, input_len: usize) {
        let want = input_len
            .saturating_mul(2)
            .max(MIN_BUF_SIZE)
            .min(self.max);
        if self.storage.len() >= want {
            return;
        }
        let mut size = if self.storage.is_empty() {
            MIN_BUF_SIZE
        } else {
            self.storage.len().saturating_mul(2)
        };
        while size < want {
            size = size.saturating_mul(2);
        }
        self.storage.resize(size.min(self.max), 0);
    }

    /// Double the storage, keeping already-written bytes intact. Fails once
    /// the ceiling is reached.
    fn grow(&mut self) -> Result<()> {
        if self.storage.len() >= self.max {
            return Err(Error::ConversionTooLarge { limit: self.max });
        }
        let size = self
            .storage
            .len()
            .saturating_mul(2)
            .max(MIN_BUF_SIZE)
            .min(self.max);
        self.storage.resize(size, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes each source byte to the destination `factor` times.
    struct Expanding {
        factor: usize,
    }

    impl Codec for Expanding {
        fn step(&mut self, src: &[u8], dst: &mut [u8]) -> (usize, usize, StepStatus) {
            let mut consumed = 0;
            let mut written = 0;
            for &byte in src {
                if written + self.factor > dst.len() {
                    return (consumed, written, StepStatus::OutputFull);
                }
                for _ in 0..self.factor {
                    dst[written] = byte;
                    written += 1;
                }
                consumed += 1;
            }
            (consumed, written, StepStatus::Done)
        }

        fn reset(&mut self) {}
    }

    /// Fails with the given status after writing a few bytes.
    struct Failing {
        status: StepStatus,
    }

    impl Codec for Failing {
        fn step(&mut self, _src: &[u8], dst: &mut [u8]) -> (usize, usize, StepStatus) {
            let written = dst.len().min(3);
            dst[..written].fill(0xEE);
            (0, written, self.status.clone())
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn grows_through_overflow_without_losing_data() {
        let mut buf = OutputBuffer::new(usize::MAX);
        let mut codec = Expanding { factor: 3 };
        let src: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let out = buf.convert(&mut codec, &src).unwrap().to_vec();
        assert_eq!(out.len(), 3000);
        for (i, chunk) in out.chunks(3).enumerate() {
            assert_eq!(chunk, [src[i], src[i], src[i]]);
        }
        // 2 * 1000 rounds up to 2048, one grow reaches 4096.
        assert_eq!(buf.capacity(), 4096);
    }

    #[test]
    fn ceiling_stops_unbounded_growth() {
        let mut buf = OutputBuffer::new(512);
        let mut codec = Expanding { factor: 3 };
        let src = vec![0xAAu8; 300];
        let err = buf.convert(&mut codec, &src).unwrap_err();
        assert_eq!(err, Error::ConversionTooLarge { limit: 512 });
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut buf = OutputBuffer::new(usize::MAX);
        let mut codec = Expanding { factor: 3 };
        buf.convert(&mut codec, &vec![1u8; 1000]).unwrap();
        let grown = buf.capacity();
        let out = buf.convert(&mut codec, &[7u8]).unwrap();
        assert_eq!(out, [7, 7, 7]);
        assert_eq!(buf.capacity(), grown);
    }

    #[test]
    fn content_is_overwritten_not_appended() {
        let mut buf = OutputBuffer::new(usize::MAX);
        let mut codec = Expanding { factor: 2 };
        buf.convert(&mut codec, &[1, 2, 3]).unwrap();
        let out = buf.convert(&mut codec, &[9]).unwrap();
        assert_eq!(out, [9, 9]);
    }

    #[test]
    fn hard_errors_surface_without_partial_output() {
        let mut buf = OutputBuffer::new(usize::MAX);
        let mut codec = Failing {
            status: StepStatus::InvalidSequence,
        };
        assert_eq!(
            buf.convert(&mut codec, &[1, 2, 3]).unwrap_err(),
            Error::InvalidSequence
        );
        let mut codec = Failing {
            status: StepStatus::IncompleteSequence,
        };
        assert_eq!(
            buf.convert(&mut codec, &[1, 2, 3]).unwrap_err(),
            Error::IncompleteSequence
        );
        let mut codec = Failing {
            status: StepStatus::Other("boom".to_string()),
        };
        assert_eq!(
            buf.convert(&mut codec, &[1, 2, 3]).unwrap_err(),
            Error::Primitive("boom".to_string())
        );
    }
}
