//! Codec primitive: the bounded transcoding capability driven by a conversion
//! handle.
//!
//! A [`Codec`] converts as much of a source span as fits into a fixed
//! destination span per [`Codec::step`] call and reports how far it got. The
//! grow/retry loop that turns bounded steps into whole-input conversions
//! lives in the buffer manager, not here.
//!
//! [`Transcoder`] is the built-in implementation, backed by `encoding_rs`. It
//! pipes a decoder (source encoding to UTF-8) through an encoder (UTF-8 to
//! destination encoding) via an internal scratch buffer, so any pair of
//! supported encodings can be converted directly.

use std::fmt;

use encoding_rs::{Decoder, DecoderResult, Encoder, EncoderResult, Encoding};

use crate::{Error, Result};

/// Scratch capacity for decoded UTF-8 awaiting re-encoding.
const SCRATCH_SIZE: usize = 4096;

/// Outcome of a single bounded conversion step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The provided source was fully consumed and all trailing state flushed.
    Done,
    /// The destination span is too small for the next unit of output. The
    /// caller should retry with more destination space; source and codec
    /// state pick up where this step left off.
    OutputFull,
    /// The source contains bytes that are not valid in the source encoding,
    /// or a character the destination encoding cannot represent.
    InvalidSequence,
    /// The source ends in the middle of a multibyte sequence.
    IncompleteSequence,
    /// Any other primitive-specific failure, carrying its diagnostic text.
    Other(String),
}

/// A stateful single-pair transcoding primitive.
///
/// Implementations are driven by the handle's buffer manager: `step` is
/// always invoked with the unconsumed tail of one complete input, so an
/// implementation must flush any trailing state (shift sequences, held
/// bytes) before reporting [`StepStatus::Done`].
pub trait Codec {
    /// Convert as much of `src` into `dst` as fits.
    ///
    /// Returns the number of source bytes consumed, the number of
    /// destination bytes written, and the step outcome.
    fn step(&mut self, src: &[u8], dst: &mut [u8]) -> (usize, usize, StepStatus);

    /// Discard all streaming state ahead of a new conversion.
    fn reset(&mut self);
}

/// Tolerance towards untranscodable input, selected by a `//` modifier on
/// the destination identifier (iconv convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tolerance {
    /// Fail on the first invalid or unmappable unit.
    Strict,
    /// Substitute `?` for characters the destination cannot represent.
    Translit,
    /// Skip invalid input sequences and drop unmappable characters.
    Ignore,
}

/// The built-in `encoding_rs`-backed codec primitive.
pub struct Transcoder {
    src_encoding: &'static Encoding,
    dst_encoding: &'static Encoding,
    tolerance: Tolerance,
    decoder: Decoder,
    encoder: Encoder,
    /// Decoded UTF-8 not yet pushed through the encoder.
    scratch: Box<[u8]>,
    pending_start: usize,
    pending_end: usize,
    /// A `?` owed to the destination after an unmappable character was
    /// consumed while the destination span was already full.
    pending_substitute: bool,
    decoder_done: bool,
    encoder_flushed: bool,
}

impl Transcoder {
    /// Open a transcoder converting `from_code` bytes into `to_code` bytes.
    ///
    /// `to_code` may carry a `//TRANSLIT` or `//IGNORE` suffix
    /// (case-insensitive); a suffix on `from_code` is accepted and ignored.
    /// Any other `//` suffix, an empty name, or a name unknown to the label
    /// registry fails with [`Error::OpenFailed`].
    pub fn open(to_code: &str, from_code: &str) -> Result<Transcoder> {
        let (to_base, to_modifier) = split_modifier(to_code);
        let (from_base, _) = split_modifier(from_code);
        let open_failed = |reason: String| Error::OpenFailed {
            to: to_code.to_string(),
            from: from_code.to_string(),
            reason,
        };
        if to_base.is_empty() || from_base.is_empty() {
            return Err(open_failed("empty encoding name".to_string()));
        }
        let tolerance = match to_modifier {
            None => Tolerance::Strict,
            Some(m) if m.eq_ignore_ascii_case("//TRANSLIT") => Tolerance::Translit,
            Some(m) if m.eq_ignore_ascii_case("//IGNORE") => Tolerance::Ignore,
            Some(m) => return Err(open_failed(format!("unknown modifier {:?}", m))),
        };
        let src_encoding = resolve(from_base)
            .ok_or_else(|| open_failed(format!("unknown source encoding {:?}", from_base)))?;
        let dst_encoding = resolve(to_base)
            .ok_or_else(|| open_failed(format!("unknown destination encoding {:?}", to_base)))?;
        // UTF-16 is decode-only in the WHATWG model; an encoder for it would
        // silently emit UTF-8 instead.
        if dst_encoding.output_encoding() != dst_encoding {
            return Err(open_failed(format!(
                "{} is not supported as a destination encoding",
                dst_encoding.name()
            )));
        }
        Ok(Transcoder {
            src_encoding,
            dst_encoding,
            tolerance,
            decoder: src_encoding.new_decoder_without_bom_handling(),
            encoder: dst_encoding.new_encoder(),
            scratch: vec![0u8; SCRATCH_SIZE].into_boxed_slice(),
            pending_start: 0,
            pending_end: 0,
            pending_substitute: false,
            decoder_done: false,
            encoder_flushed: false,
        })
    }
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("from", &self.src_encoding.name())
            .field("to", &self.dst_encoding.name())
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl Codec for Transcoder {
    fn step(&mut self, src: &[u8], dst: &mut [u8]) -> (usize, usize, StepStatus) {
        let mut consumed = 0;
        let mut written = 0;
        loop {
            if self.pending_substitute {
                if written == dst.len() {
                    return (consumed, written, StepStatus::OutputFull);
                }
                dst[written] = b'?';
                written += 1;
                self.pending_substitute = false;
            }
            // Drain decoded UTF-8 through the encoder before decoding more.
            while self.pending_start < self.pending_end {
                if written == dst.len() {
                    return (consumed, written, StepStatus::OutputFull);
                }
                let last = self.decoder_done;
                // SAFETY: the decoder writes only valid UTF-8 into the
                // scratch and the encoder consumes whole characters, so the
                // pending range always lies on character boundaries.
                let chunk = unsafe {
                    std::str::from_utf8_unchecked(&self.scratch[self.pending_start..self.pending_end])
                };
                let (result, read, wrote) = self
                    .encoder
                    .encode_from_utf8_without_replacement(chunk, &mut dst[written..], last);
                self.pending_start += read;
                written += wrote;
                match result {
                    EncoderResult::InputEmpty => {
                        if last {
                            self.encoder_flushed = true;
                        }
                    }
                    EncoderResult::OutputFull => {
                        return (consumed, written, StepStatus::OutputFull);
                    }
                    EncoderResult::Unmappable(_) => match self.tolerance {
                        Tolerance::Strict => {
                            return (consumed, written, StepStatus::InvalidSequence);
                        }
                        Tolerance::Translit => {
                            if written == dst.len() {
                                self.pending_substitute = true;
                                return (consumed, written, StepStatus::OutputFull);
                            }
                            dst[written] = b'?';
                            written += 1;
                        }
                        Tolerance::Ignore => {}
                    },
                }
            }
            self.pending_start = 0;
            self.pending_end = 0;
            if self.decoder_done {
                if !self.encoder_flushed {
                    // The decoder finished with nothing pending, so the
                    // encoder never saw a final call; flush it now.
                    let (result, _, wrote) = self
                        .encoder
                        .encode_from_utf8_without_replacement("", &mut dst[written..], true);
                    written += wrote;
                    match result {
                        EncoderResult::InputEmpty => self.encoder_flushed = true,
                        EncoderResult::OutputFull => {
                            return (consumed, written, StepStatus::OutputFull);
                        }
                        EncoderResult::Unmappable(c) => {
                            return (
                                consumed,
                                written,
                                StepStatus::Other(format!(
                                    "unexpected unmappable {:?} while flushing",
                                    c
                                )),
                            );
                        }
                    }
                }
                return (consumed, written, StepStatus::Done);
            }
            if consumed < src.len() {
                // Decode the next chunk of source into the scratch.
                let (result, read, wrote) = self.decoder.decode_to_utf8_without_replacement(
                    &src[consumed..],
                    &mut self.scratch[self.pending_end..],
                    false,
                );
                consumed += read;
                self.pending_end += wrote;
                match result {
                    // All source consumed; trailing state flushes next round.
                    DecoderResult::InputEmpty => {}
                    // Scratch full; drained at the top of the loop.
                    DecoderResult::OutputFull => {}
                    DecoderResult::Malformed(_, _) => match self.tolerance {
                        Tolerance::Ignore => {}
                        _ => return (consumed, written, StepStatus::InvalidSequence),
                    },
                }
            } else {
                // Source exhausted; flush trailing decoder state. A malformed
                // report here means the input ended mid-sequence.
                let (result, _, wrote) = self.decoder.decode_to_utf8_without_replacement(
                    &[],
                    &mut self.scratch[self.pending_end..],
                    true,
                );
                self.pending_end += wrote;
                match result {
                    DecoderResult::InputEmpty => self.decoder_done = true,
                    DecoderResult::OutputFull => {}
                    DecoderResult::Malformed(_, _) => {
                        if self.tolerance != Tolerance::Ignore {
                            return (consumed, written, StepStatus::IncompleteSequence);
                        }
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.decoder = self.src_encoding.new_decoder_without_bom_handling();
        self.encoder = self.dst_encoding.new_encoder();
        self.pending_start = 0;
        self.pending_end = 0;
        self.pending_substitute = false;
        self.decoder_done = false;
        self.encoder_flushed = false;
    }
}

/// Split an encoding identifier into its base name and optional `//` suffix.
fn split_modifier(code: &str) -> (&str, Option<&str>) {
    match code.find("//") {
        Some(at) => (&code[..at], Some(&code[at..])),
        None => (code, None),
    }
}

/// Resolve an encoding identifier against the WHATWG label registry, with a
/// few iconv-style code page names the registry spells differently.
fn resolve(label: &str) -> Option<&'static Encoding> {
    if let Some(encoding) = Encoding::for_label_no_replacement(label.as_bytes()) {
        return Some(encoding);
    }
    let folded = label.trim().to_ascii_lowercase();
    let alias = match folded.as_str() {
        "cp932" | "windows-932" => "shift_jis",
        "cp936" | "windows-936" => "gbk",
        "cp949" => "euc-kr",
        "cp950" | "windows-950" => "big5",
        "cp874" => "windows-874",
        "cp1250" => "windows-1250",
        "cp1251" => "windows-1251",
        "cp1252" => "windows-1252",
        "cp1253" => "windows-1253",
        "cp1254" => "windows-1254",
        "cp1255" => "windows-1255",
        "cp1256" => "windows-1256",
        "cp1257" => "windows-1257",
        "cp1258" => "windows-1258",
        _ => return None,
    };
    Encoding::for_label_no_replacement(alias.as_bytes())
}

/// Canonical name of the encoding an identifier refers to, or `None` when it
/// is unknown. A `//` modifier suffix is ignored for the lookup.
pub fn canonical_name(label: &str) -> Option<&'static str> {
    resolve(split_modifier(label).0).map(|encoding| encoding.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_modifier_suffix() {
        assert_eq!(split_modifier("UTF-8"), ("UTF-8", None));
        assert_eq!(split_modifier("UTF-8//IGNORE"), ("UTF-8", Some("//IGNORE")));
        assert_eq!(split_modifier("//TRANSLIT"), ("", Some("//TRANSLIT")));
    }

    #[test]
    fn resolves_iconv_aliases() {
        assert_eq!(canonical_name("CP932"), Some("Shift_JIS"));
        assert_eq!(canonical_name("cp1251"), Some("windows-1251"));
        assert_eq!(canonical_name("CP874"), Some("windows-874"));
        assert_eq!(canonical_name("utf8"), Some("UTF-8"));
        assert_eq!(canonical_name("CP932//IGNORE"), Some("Shift_JIS"));
        assert_eq!(canonical_name("no-such-charset"), None);
    }

    #[test]
    fn rejects_unknown_modifier() {
        let err = Transcoder::open("UTF-8//BOGUS", "UTF-8").unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
    }

    #[test]
    fn modifier_on_source_is_ignored() {
        assert!(Transcoder::open("UTF-8", "CP932//IGNORE").is_ok());
    }

    #[test]
    fn decode_only_destinations_are_rejected() {
        let err = Transcoder::open("UTF-16LE", "UTF-8").unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
        let err = Transcoder::open("UTF-16BE", "UTF-8").unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
        // Decode-only encodings stay usable on the source side.
        assert!(Transcoder::open("UTF-8", "UTF-16LE").is_ok());
    }

    #[test]
    fn step_reports_output_full_and_resumes() {
        let mut codec = Transcoder::open("UTF-8", "CP932").unwrap();
        codec.reset();
        let src = [0x82, 0xA0]; // "あ" in CP932, three bytes in UTF-8
        let mut small = [0u8; 1];
        let (consumed, written, status) = codec.step(&src, &mut small);
        assert_eq!(status, StepStatus::OutputFull);
        assert_eq!(written, 0);
        let mut rest = [0u8; 8];
        let (consumed2, written2, status) = codec.step(&src[consumed..], &mut rest);
        assert_eq!(status, StepStatus::Done);
        assert_eq!(consumed + consumed2, src.len());
        assert_eq!(&rest[..written2], "あ".as_bytes());
    }
}
