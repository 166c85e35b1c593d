use super::crc::{format_crc, Crc16};
use super::structs::{ChecksumError, DecodeResult, MeasurementPoint, Telegram, TransportError};
use crate::obis_utils;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Longest line we accept, real meters stay far below this
pub const MAX_LINE_LEN: u64 = 1024;
/// A frame growing past this size never saw its `!` and is dropped
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const FRAME_START: u8 = b'/';
const FRAME_END: u8 = b'!';
const CRC_DIGITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FrameState {
    SeekStart,
    Body,
}

/// Turns the byte stream of one bridge connection into telegrams.
///
/// The decoder keeps no state between frames that would need a reset: after a
/// telegram or a checksum error the next call simply continues on the same stream.
/// Transport errors are handed out as they are, retrying is up to the caller.
pub struct Decoder<R> {
    reader: BufReader<R>,
    state: FrameState,
    identity: String,
    measurements: Vec<MeasurementPoint>,
    /* exact bytes from '/' up to the '!' for the error report */
    frame: Vec<u8>,
    crc: Crc16,
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    pub fn new(stream: R) -> Self {
        return Decoder {
            reader: BufReader::new(stream),
            state: FrameState::SeekStart,
            identity: String::new(),
            measurements: Vec::new(),
            frame: Vec::new(),
            crc: Crc16::new(),
        };
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Reads until one frame is complete or the stream fails
    pub async fn read_telegram(&mut self) -> DecodeResult {
        let mut line: Vec<u8> = Vec::with_capacity(128);
        loop {
            line.clear();
            let read = (&mut self.reader)
                .take(MAX_LINE_LEN)
                .read_until(b'\n', &mut line)
                .await;

            match read {
                Ok(0) => return DecodeResult::TransportError(TransportError::Closed),
                Ok(_) => {}
                Err(e) => return DecodeResult::TransportError(TransportError::Io(e)),
            }

            if !line.ends_with(b"\n") {
                if line.len() as u64 >= MAX_LINE_LEN {
                    warn!("Dropping line longer than {MAX_LINE_LEN} bytes, waiting for the next telegram");
                    self.reset();
                    continue;
                }
                /* Stream ended in the middle of a line */
                return DecodeResult::TransportError(TransportError::Closed);
            }

            if let Some(result) = self.feed_line(&line) {
                return result;
            }
        }
    }

    fn feed_line(&mut self, line: &[u8]) -> Option<DecodeResult> {
        match self.state {
            FrameState::SeekStart => {
                if line.first() == Some(&FRAME_START) {
                    self.start_frame(line);
                } else {
                    debug!("Skipping {} bytes outside of a telegram", line.len());
                }
                None
            }
            FrameState::Body => {
                if line.first() == Some(&FRAME_END) {
                    /* only the marker itself is part of the checksum */
                    self.append(&line[..1]);
                    let transmitted: String = String::from_utf8_lossy(&line[1..])
                        .chars()
                        .take(CRC_DIGITS)
                        .collect();
                    return Some(self.validate(transmitted.trim_end()));
                }

                self.append(line);
                if self.frame.len() > MAX_FRAME_LEN {
                    warn!("Telegram from {} exceeds {MAX_FRAME_LEN} bytes without end marker, dropping it", self.identity);
                    self.reset();
                    return None;
                }

                self.parse_body_line(line);
                None
            }
        }
    }

    fn start_frame(&mut self, line: &[u8]) {
        let identity = strip_terminator(&line[1..]);
        if identity.is_empty() {
            debug!("Frame start without identity, ignoring it");
            return;
        }

        self.reset();
        self.identity = identity;
        self.append(line);
        self.state = FrameState::Body;
    }

    fn parse_body_line(&mut self, line: &[u8]) {
        let text = strip_terminator(line);
        if text.is_empty() {
            return;
        }

        let Some((code, payload)) = obis_utils::parse_data_line(&text) else {
            debug!("Ignoring line '{text}' in telegram from {}", self.identity);
            return;
        };

        /* timestamps and status words have no unit and are fine to skip */
        if let Some((value, unit)) = obis_utils::parse_value_with_unit(payload) {
            self.measurements.push(MeasurementPoint {
                obis_code: code.to_string(),
                value,
                unit,
            });
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.frame.extend_from_slice(bytes);
        self.crc.update(bytes);
    }

    fn validate(&mut self, transmitted: &str) -> DecodeResult {
        let computed_crc = format_crc(self.crc.value());
        let frame = std::mem::take(&mut self.frame);
        let identity = std::mem::take(&mut self.identity);
        let measurements = std::mem::take(&mut self.measurements);
        self.reset();

        if !computed_crc.eq_ignore_ascii_case(transmitted) {
            return DecodeResult::ChecksumError(ChecksumError {
                raw_message_text: String::from_utf8_lossy(&frame).into_owned(),
                computed_crc,
                transmitted_crc: transmitted.to_string(),
            });
        }

        DecodeResult::Telegram(Telegram { identity, measurements })
    }

    fn reset(&mut self) {
        self.state = FrameState::SeekStart;
        self.identity.clear();
        self.measurements.clear();
        self.frame.clear();
        self.crc = Crc16::new();
    }
}

fn strip_terminator(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
