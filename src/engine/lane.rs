use crate::engine::judge::{HitWindows, judge};
use crate::model::chart::{Lane, LaneId, Note};
use crate::model::config::PlayConfig;
use crate::model::score::Rating;
use log::debug;
use serde::Serialize;

/// Outcome of judging one note.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Judgement {
    pub lane: LaneId,
    pub note_index: usize,
    pub rating: Rating,
    /// Signed press error (positive is late); `None` for auto-misses.
    pub delta_ms: Option<f64>,
}

/// Read-only view of one note currently inside the visible window.
#[derive(Debug, Clone, Copy)]
pub struct VisibleNote<'a> {
    pub index: usize,
    pub note: &'a Note,
}

fn progress(target: f64, now: f64, travel_ms: f64) -> f32 {
    (1.0 - (target - now) / travel_ms).clamp(0.0, 1.0) as f32
}

/// Indices of admitted notes, plus the admission cursor into the full list.
#[derive(Debug, Clone, Default)]
struct VisibleWindow {
    visible: Vec<usize>,
    next: usize,
}

impl VisibleWindow {
    /// Admit, in index order, every note whose approach has started.
    fn admit(&mut self, notes: &[Note], now: f64, travel_ms: f64) {
        while let Some(note) = notes.get(self.next) {
            if note.target as f64 - travel_ms > now {
                break;
            }

            self.visible.push(self.next);
            self.next += 1;
        }
    }

    fn reset(&mut self) {
        self.visible.clear();
        self.next = 0;
    }
}

/// Per-lane judgement state machine, advanced once per simulation tick.
#[derive(Debug, Clone)]
pub struct LaneEngine {
    id: LaneId,
    notes: Vec<Note>,
    window: VisibleWindow,
    travel_ms: f64,
    input_offset_ms: f64,
    hit_windows: HitWindows,
    active_start: Option<f64>,
    active_end: Option<f64>,
    held: Option<usize>,
}

impl LaneEngine {
    pub fn new(lane: &Lane, config: &PlayConfig) -> Self {
        let mut notes = lane.notes.clone();
        notes.iter_mut().for_each(Note::reset);

        Self {
            id: lane.id,
            notes,
            window: VisibleWindow::default(),
            travel_ms: config.travel_ms(),
            input_offset_ms: config.input_offset_ms,
            hit_windows: config.hit_windows,
            active_start: None,
            active_end: None,
            held: None,
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    pub fn has_press_in_flight(&self) -> bool {
        self.active_start.is_some()
    }

    /// True once every note has been admitted and resolved.
    pub fn is_done(&self) -> bool {
        self.window.next == self.notes.len() && self.window.visible.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = VisibleNote<'_>> + '_ {
        self.window.visible.iter().map(|&index| VisibleNote {
            index,
            note: &self.notes[index],
        })
    }

    /// Record a press. Ignored while an earlier press is still unresolved.
    pub fn start_hit(&mut self, now: f64) {
        if self.active_start.is_none() {
            self.active_start = Some(now + self.input_offset_ms);
        }
    }

    /// Record a release; it ends any unresolved press and is offered to a held note.
    pub fn end_hit(&mut self, now: f64) {
        self.active_start = None;
        self.active_end = Some(now + self.input_offset_ms);
    }

    pub fn update(&mut self, now: f64) -> Vec<Judgement> {
        self.window.admit(&self.notes, now, self.travel_ms);

        let bad_ms = self.hit_windows.bad_ms;
        let mut judgements = Vec::new();
        let mut retained = Vec::with_capacity(self.window.visible.len());

        for index in std::mem::take(&mut self.window.visible) {
            let note = &mut self.notes[index];
            let target = note.target as f64;
            note.progress = progress(target, now, self.travel_ms);

            if self.held == Some(index) {
                let release_passed = note
                    .target_release
                    .is_some_and(|release| (release as f64) < now - bad_ms);

                let released_at = match self.active_end {
                    Some(end) => end,
                    None if release_passed => now,
                    None => {
                        retained.push(index);
                        continue;
                    }
                };

                note.release_time = Some(released_at as i64);
                self.held = None;
                debug!(
                    "{} released hold #{} at {:.3}ms (release target {:?})",
                    self.id, index, released_at, note.target_release
                );
                continue;
            }

            // Taps that were hit and holds that were released are done.
            if note.is_hit() {
                continue;
            }

            if target < now - bad_ms {
                debug!("{} missed #{} (target {}ms, now {:.3}ms)", self.id, index, note.target, now);
                judgements.push(Judgement {
                    lane: self.id,
                    note_index: index,
                    rating: Rating::Miss,
                    delta_ms: None,
                });
                continue;
            }

            if target > now + bad_ms {
                retained.push(index);
                continue;
            }

            let Some(start) = self.active_start.take() else {
                retained.push(index);
                continue;
            };

            let delta_ms = start - target;
            let rating = judge(delta_ms, &self.hit_windows);
            note.hit_time = Some(now as i64);

            debug!(
                "{} judged #{} as {:?} ({:+.3}ms)",
                self.id, index, rating, delta_ms
            );
            judgements.push(Judgement {
                lane: self.id,
                note_index: index,
                rating,
                delta_ms: Some(delta_ms),
            });

            if note.is_hold() {
                self.held = Some(index);
                retained.push(index);
            }
        }

        self.window.visible = retained;
        self.active_end = None;
        judgements
    }

    /// Back to the pre-attempt state, so the same timeline replays identically.
    pub fn reset(&mut self) {
        self.window.reset();
        self.active_start = None;
        self.active_end = None;
        self.held = None;
        self.notes.iter_mut().for_each(Note::reset);
    }
}

/// Beat and measure lines scrolling alongside the lanes. Never judged.
#[derive(Debug, Clone)]
pub struct GuideTrack {
    markers: Vec<Note>,
    window: VisibleWindow,
    travel_ms: f64,
    linger_ms: f64,
}

impl GuideTrack {
    pub fn new(markers: &[Note], config: &PlayConfig) -> Self {
        Self {
            markers: markers.to_vec(),
            window: VisibleWindow::default(),
            travel_ms: config.travel_ms(),
            linger_ms: config.hit_windows.bad_ms,
        }
    }

    pub fn update(&mut self, now: f64) {
        self.window.admit(&self.markers, now, self.travel_ms);

        let markers = &mut self.markers;
        let (travel_ms, linger_ms) = (self.travel_ms, self.linger_ms);

        self.window.visible.retain(|&index| {
            let marker = &mut markers[index];
            marker.progress = progress(marker.target as f64, now, travel_ms);
            marker.target as f64 >= now - linger_ms
        });
    }

    pub fn visible(&self) -> impl Iterator<Item = VisibleNote<'_>> + '_ {
        self.window.visible.iter().map(|&index| VisibleNote {
            index,
            note: &self.markers[index],
        })
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.markers.iter_mut().for_each(Note::reset);
    }
}
