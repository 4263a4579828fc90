use crate::error::ChartError;
use crate::model::chart::*;
use crate::model::mappings::lane_for_pitch;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

const HEADER_TAG: [u8; 4] = *b"MThd";
const TRACK_TAG: [u8; 4] = *b"MTrk";
const MIN_HEADER_LEN: u32 = 6;
const MAX_VLQ_BYTES: usize = 4;
const BEATS_PER_MEASURE: i64 = 4;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

const META_END_OF_TRACK: u8 = 0x2F;
const META_TEMPO: u8 = 0x51;

/// Bounds-checked big-endian cursor over the raw chart bytes.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            end: bytes.len(),
        }
    }

    /// A reader over the next `len` bytes, failing if the buffer is shorter.
    fn sub_reader(&self, len: usize, context: &'static str) -> Result<ByteReader<'a>, ChartError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.end)
            .ok_or(ChartError::Truncated {
                offset: self.end,
                context,
            })?;

        Ok(ByteReader {
            bytes: self.bytes,
            pos: self.pos,
            end,
        })
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], ChartError> {
        if self.end - self.pos < len {
            return Err(ChartError::Truncated {
                offset: self.end,
                context,
            });
        }

        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, ChartError> {
        Ok(self.take(1, context)?[0])
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, ChartError> {
        let b = self.take(2, context)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, ChartError> {
        let b = self.take(4, context)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn tag(&mut self, expected: [u8; 4]) -> Result<(), ChartError> {
        let offset = self.pos;
        let b = self.take(4, "chunk tag")?;
        let found = [b[0], b[1], b[2], b[3]];

        if found != expected {
            return Err(ChartError::BadMagic {
                offset,
                expected,
                found,
            });
        }

        Ok(())
    }

    fn vlq(&mut self) -> Result<u32, ChartError> {
        let start = self.pos;
        let (value, len) = decode_vlq(&self.bytes[self.pos..self.end]).map_err(|e| match e {
            ChartError::VlqOverflow { offset } => ChartError::VlqOverflow {
                offset: start + offset,
            },
            ChartError::Truncated { context, .. } => ChartError::Truncated {
                offset: self.end,
                context,
            },
            other => other,
        })?;

        self.pos += len;
        Ok(value)
    }

    fn skip(&mut self, len: usize, context: &'static str) -> Result<(), ChartError> {
        self.take(len, context).map(|_| ())
    }
}

/// Decode a variable-length quantity from the start of `bytes`.
///
/// Returns the value and how many bytes it occupied. Each byte contributes its
/// low 7 bits, most significant group first; a set high bit means more follow.
pub fn decode_vlq(bytes: &[u8]) -> Result<(u32, usize), ChartError> {
    let mut value: u32 = 0;

    for (i, byte) in bytes.iter().enumerate() {
        if i >= MAX_VLQ_BYTES {
            return Err(ChartError::VlqOverflow { offset: 0 });
        }

        value = (value << 7) | (byte & 0x7F) as u32;

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if bytes.len() >= MAX_VLQ_BYTES {
        return Err(ChartError::VlqOverflow { offset: 0 });
    }

    Err(ChartError::Truncated {
        offset: bytes.len(),
        context: "variable-length quantity",
    })
}

/// Encode `value` as a variable-length quantity. Values above 28 bits are masked.
pub fn encode_vlq(value: u32) -> Vec<u8> {
    let value = value & 0x0FFF_FFFF;
    let mut groups = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;

    while rest > 0 {
        groups.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }

    groups.reverse();
    groups
}

#[derive(Debug, Clone, Copy)]
struct Header {
    format: u16,
    track_count: u16,
    division: u16,
}

/// Per-lane interval bookkeeping while streaming one track.
struct Intervals {
    open: [Option<f64>; 5],
    notes: [Vec<Note>; 5],
    min_hold_ms: f64,
}

impl Intervals {
    fn new(min_hold_ms: f64) -> Self {
        Self {
            open: [None; 5],
            notes: Default::default(),
            min_hold_ms,
        }
    }

    fn open(&mut self, lane: LaneId, ts: f64) {
        if let Some(previous) = self.open[lane.index()].replace(ts) {
            debug!(
                "Re-opened {} at {:.3}ms while already open since {:.3}ms..!",
                lane, ts, previous
            );
        }
    }

    fn close(&mut self, lane: LaneId, ts: f64) {
        let Some(start) = self.open[lane.index()].take() else {
            debug!("Orphaned note-off for {} at {:.3}ms..!", lane, ts);
            return;
        };

        let note = if ts - start <= self.min_hold_ms {
            Note::tap(start as i64)
        } else {
            Note::hold(start as i64, ts as i64)
        };

        self.notes[lane.index()].push(note);
    }

    fn close_all(&mut self, ts: f64) {
        for lane in LaneId::ALL {
            if let Some(start) = self.open[lane.index()] {
                warn!(
                    "Unclosed note-on for {} at {:.3}ms, auto-closing at {:.3}ms..!",
                    lane, start, ts
                );
                self.close(lane, ts);
            }
        }
    }
}

struct TrackSummary {
    final_ts: f64,
    file_bpm: Option<f64>,
}

pub fn import_chart_file<P: AsRef<Path>>(path: P, bpm: f64, difficulty: Difficulty) -> Result<Chart> {
    let bytes = fs::read(path.as_ref())
        .with_context(|| format!("Failed to read chart file {}", path.as_ref().display()))?;

    let chart = parse_chart(&bytes, bpm, difficulty)
        .with_context(|| format!("Failed to parse chart file {}", path.as_ref().display()))?;

    info!(
        "Imported {} chart from '{}' with {} notes..!",
        difficulty,
        path.as_ref().display(),
        chart.total_notes
    );

    Ok(chart)
}

/// Decode a standard MIDI file into a chart for one difficulty.
///
/// Timing comes from the declared `bpm`, not from tempo events in the file.
pub fn parse_chart(bytes: &[u8], bpm: f64, difficulty: Difficulty) -> Result<Chart, ChartError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ChartError::InvalidTiming(format!("bpm must be positive, got {}", bpm)));
    }

    let mut reader = ByteReader::new(bytes);
    let header = read_header(&mut reader)?;

    debug!(
        "Chart header: format {}, {} track(s), {} ticks per quarter note",
        header.format, header.track_count, header.division
    );

    let mut metadata = SongMetadata {
        bpm,
        division: header.division,
        length_ms: 0,
        file_bpm: None,
    };

    let mut intervals = Intervals::new(metadata.min_hold_duration_ms());
    let mut final_ts: f64 = 0.0;

    for track_idx in 0..header.track_count {
        reader.tag(TRACK_TAG)?;
        let len = reader.u32("track length")? as usize;
        let mut track = reader.sub_reader(len, "track body")?;
        reader.skip(len, "track body")?;

        let summary = read_track(&mut track, &metadata, difficulty, &mut intervals)?;
        debug!("Track {} ends at {:.3}ms", track_idx, summary.final_ts);

        final_ts = final_ts.max(summary.final_ts);
        if metadata.file_bpm.is_none() {
            metadata.file_bpm = summary.file_bpm;
        }
    }

    metadata.length_ms = final_ts as i64;

    let mut total_notes = 0;
    let lanes = LaneId::ALL
        .iter()
        .zip(intervals.notes)
        .map(|(&id, mut notes)| {
            notes.sort_by_key(|note| note.target);
            total_notes += notes.len();
            Lane { id, notes }
        })
        .collect::<Vec<_>>();

    let guides = build_guides(&metadata);

    Ok(Chart {
        metadata,
        difficulty,
        total_notes,
        lanes,
        guides,
    })
}

fn read_header(reader: &mut ByteReader) -> Result<Header, ChartError> {
    reader.tag(HEADER_TAG)?;

    let len = reader.u32("header length")?;
    if len < MIN_HEADER_LEN {
        return Err(ChartError::Truncated {
            offset: reader.pos,
            context: "header record",
        });
    }

    let header = Header {
        format: reader.u16("header format")?,
        track_count: reader.u16("header track count")?,
        division: reader.u16("header division")?,
    };
    reader.skip((len - MIN_HEADER_LEN) as usize, "header record")?;

    if header.division == 0 {
        return Err(ChartError::InvalidTiming("division is zero".into()));
    }
    if header.division & 0x8000 != 0 {
        return Err(ChartError::InvalidTiming(
            "SMPTE timecode division is not supported".into(),
        ));
    }

    Ok(header)
}

fn read_track(
    track: &mut ByteReader,
    metadata: &SongMetadata,
    difficulty: Difficulty,
    intervals: &mut Intervals,
) -> Result<TrackSummary, ChartError> {
    let mut abs_tick: u64 = 0;
    let mut ts: f64 = 0.0;
    let mut running_status: Option<u8> = None;
    let mut file_bpm = None;

    while !track.is_empty() {
        let delta = track.vlq()?;
        abs_tick = abs_tick.saturating_add(delta as u64);
        ts = metadata.tick_to_ms(abs_tick);

        let offset = track.pos;
        let byte = track.u8("event status")?;

        let (status, first_data) = if byte & 0x80 == 0 {
            let Some(status) = running_status else {
                return Err(ChartError::MissingRunningStatus { offset, byte });
            };
            (status, Some(byte))
        } else {
            (byte, None)
        };

        match status {
            0xFF => {
                let kind = track.u8("meta type")?;
                let len = track.vlq()? as usize;
                let data = track.take(len, "meta payload")?;

                match kind {
                    META_END_OF_TRACK => break,
                    META_TEMPO if data.len() == 3 => {
                        let mpqn = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                        if mpqn > 0 && file_bpm.is_none() {
                            file_bpm = Some(MICROSECONDS_PER_MINUTE / mpqn as f64);
                        }
                    }
                    _ => {}
                }
            }
            0xF0 | 0xF7 => {
                let len = track.vlq()? as usize;
                track.skip(len, "sysex payload")?;
            }
            0xF1..=0xFE => {
                return Err(ChartError::UnsupportedEvent { offset, status });
            }
            _ => {
                running_status = Some(status);

                let p1 = match first_data {
                    Some(b) => b,
                    None => track.u8("event data")?,
                };

                match status >> 4 {
                    0x8 | 0x9 => {
                        let velocity = track.u8("note velocity")?;
                        let Some(lane) = lane_for_pitch(difficulty, p1 & 0x7F) else {
                            continue;
                        };

                        if status >> 4 == 0x9 && velocity > 0 {
                            intervals.open(lane, ts);
                        } else {
                            intervals.close(lane, ts);
                        }
                    }
                    0xA | 0xB | 0xE => {
                        track.skip(1, "event data")?;
                    }
                    _ => {}
                }
            }
        }
    }

    intervals.close_all(ts);

    Ok(TrackSummary {
        final_ts: ts,
        file_bpm,
    })
}

fn build_guides(metadata: &SongMetadata) -> Vec<Note> {
    let mut guides = Vec::new();
    let mut beat: i64 = 0;

    loop {
        let target = metadata.tick_to_ms(beat as u64 * metadata.division as u64) as i64;
        if target > metadata.length_ms {
            break;
        }

        let kind = if beat % BEATS_PER_MEASURE == 0 {
            MarkerKind::Measure
        } else {
            MarkerKind::Beat
        };

        guides.push(Note::marker(target, kind));
        beat += 1;
    }

    guides
}
