use crate::engine::AudioClock;
use crate::engine::clock::{ClockSample, Phase, PlayClock, WallClock};
use crate::engine::lane::{GuideTrack, Judgement, LaneEngine};
use crate::error::ConfigError;
use crate::model::chart::{Chart, LaneId};
use crate::model::config::PlayConfig;
use crate::model::score::Score;
use anyhow::bail;
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const MAX_TICK_RATE: u32 = 10_000;
const TAP_RELEASE_MS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Press,
    Release,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample: ClockSample,
    pub judgements: Vec<Judgement>,
}

/// One play attempt: the lanes of a chart, the clock driving them and the score.
#[derive(Debug)]
pub struct Session {
    chart: Arc<Chart>,
    config: PlayConfig,
    clock: PlayClock,
    lanes: Vec<LaneEngine>,
    guides: GuideTrack,
    score: Score,
    pending: Vec<(LaneId, InputKind)>,
    elapsed_ms: f64,
}

impl Session {
    pub fn new(chart: Arc<Chart>, config: PlayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let lanes = chart
            .lanes
            .iter()
            .map(|lane| LaneEngine::new(lane, &config))
            .collect();

        Ok(Self {
            clock: PlayClock::new(&config),
            guides: GuideTrack::new(&chart.guides, &config),
            score: Score::new(chart.total_notes),
            elapsed_ms: -config.grace_period_ms,
            pending: Vec::new(),
            lanes,
            config,
            chart,
        })
    }

    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    pub fn config(&self) -> &PlayConfig {
        &self.config
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn lanes(&self) -> &[LaneEngine] {
        &self.lanes
    }

    pub fn lane(&self, id: LaneId) -> Option<&LaneEngine> {
        self.lanes.iter().find(|lane| lane.id() == id)
    }

    pub fn guides(&self) -> &GuideTrack {
        &self.guides
    }

    /// Elapsed time sampled on the last tick.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn is_synced(&self) -> bool {
        self.clock.is_synced()
    }

    /// Queue a press for the next tick.
    pub fn press(&mut self, lane: LaneId) {
        self.pending.push((lane, InputKind::Press));
    }

    /// Queue a release for the next tick.
    pub fn release(&mut self, lane: LaneId) {
        self.pending.push((lane, InputKind::Release));
    }

    pub fn tick(&mut self, wall_ms: f64, audio: &impl AudioClock) -> TickReport {
        let sample = self.clock.sample(wall_ms, audio);
        self.elapsed_ms = sample.elapsed_ms;

        if sample.phase == Phase::PreRoll {
            if !self.pending.is_empty() {
                debug!("Dropping {} input(s) received during pre-roll", self.pending.len());
                self.pending.clear();
            }

            return TickReport {
                sample,
                judgements: Vec::new(),
            };
        }

        let now = sample.elapsed_ms;
        for (id, kind) in self.pending.drain(..) {
            let Some(lane) = self.lanes.iter_mut().find(|lane| lane.id() == id) else {
                continue;
            };

            match kind {
                InputKind::Press => lane.start_hit(now),
                InputKind::Release => lane.end_hit(now),
            }
        }

        let mut judgements = Vec::new();
        for lane in self.lanes.iter_mut() {
            judgements.extend(lane.update(now));
        }
        self.guides.update(now);

        for judgement in judgements.iter() {
            self.score.add_hit(judgement.rating);
        }

        TickReport { sample, judgements }
    }

    /// Every note resolved and the song's length reached.
    pub fn finished(&self) -> bool {
        self.clock.is_synced()
            && self.elapsed_ms >= self.chart.metadata.length_ms as f64
            && self.lanes.iter().all(LaneEngine::is_done)
    }

    /// Restore the state right after construction, for a deterministic restart.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.lanes.iter_mut().for_each(LaneEngine::reset);
        self.guides.reset();
        self.score = Score::new(self.chart.total_notes);
        self.pending.clear();
        self.elapsed_ms = -self.config.grace_period_ms;
    }
}

/// Audio stand-in that starts playing once the pre-roll has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedAudio {
    start_ms: f64,
    wall_ms: f64,
}

impl SimulatedAudio {
    pub fn new(start_ms: f64) -> Self {
        Self {
            start_ms,
            wall_ms: 0.0,
        }
    }

    pub fn advance(&mut self, wall_ms: f64) {
        self.wall_ms = wall_ms;
    }
}

impl AudioClock for SimulatedAudio {
    fn is_playing(&self) -> bool {
        self.wall_ms >= self.start_ms
    }

    fn position_ms(&self) -> f64 {
        (self.wall_ms - self.start_ms).max(0.0)
    }
}

/// Presses every note right on time and holds sustains to their end.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    timeline: Vec<(f64, LaneId, InputKind)>,
    cursor: usize,
}

impl AutoPlayer {
    pub fn new(chart: &Chart) -> Self {
        let mut timeline = Vec::new();

        for lane in chart.lanes.iter() {
            for (i, note) in lane.notes.iter().enumerate() {
                let press = note.target as f64;
                let release = match note.target_release {
                    Some(release) => release as f64,
                    None => {
                        let gap = lane
                            .notes
                            .get(i + 1)
                            .map(|next| (next.target as f64 - press) / 2.0)
                            .unwrap_or(TAP_RELEASE_MS);
                        press + gap.min(TAP_RELEASE_MS)
                    }
                };

                timeline.push((press, lane.id, InputKind::Press));
                timeline.push((release, lane.id, InputKind::Release));
            }
        }

        // Releases sort ahead of presses at the same instant.
        timeline.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| (a.2 == InputKind::Press).cmp(&(b.2 == InputKind::Press)))
        });

        Self {
            timeline,
            cursor: 0,
        }
    }

    /// Queue every input scheduled at or before `due_ms`. A release never shares
    /// a tick with the press it ends; it and anything later on that lane wait
    /// for the next call while other lanes keep going.
    pub fn queue_due(&mut self, session: &mut Session, due_ms: f64) {
        let mut pressed: Vec<LaneId> = Vec::new();
        let mut deferred: Vec<(f64, LaneId, InputKind)> = Vec::new();
        let mut blocked: Vec<LaneId> = Vec::new();

        while let Some(&(time, lane, kind)) = self.timeline.get(self.cursor) {
            if time > due_ms {
                break;
            }
            self.cursor += 1;

            if blocked.contains(&lane) || (kind == InputKind::Release && pressed.contains(&lane)) {
                if !blocked.contains(&lane) {
                    blocked.push(lane);
                }
                deferred.push((time, lane, kind));
                continue;
            }

            match kind {
                InputKind::Press => {
                    session.press(lane);
                    pressed.push(lane);
                }
                InputKind::Release => session.release(lane),
            }
        }

        // Deferred inputs go back in front of the cursor, still in time order.
        let end = self.cursor;
        let resume = end - deferred.len();
        for (slot, input) in self.timeline[resume..end].iter_mut().zip(deferred) {
            *slot = input;
        }
        self.cursor = resume;
    }
}

/// Drive `session` with the autoplayer until the chart finishes or `stop` is set.
///
/// With `realtime` the loop is paced against the wall clock, otherwise ticks run
/// back to back on a simulated clock.
pub fn run_autoplay(
    session: &mut Session,
    tick_rate: u32,
    realtime: bool,
    stop: &AtomicBool,
) -> anyhow::Result<Score> {
    if tick_rate == 0 || tick_rate > MAX_TICK_RATE {
        bail!(ConfigError::TickRate(tick_rate));
    }

    let tick_ms = 1000.0 / tick_rate as f64;
    let mut audio = SimulatedAudio::new(session.config().grace_period_ms);
    let mut bot = AutoPlayer::new(session.chart());
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let wall = WallClock::start();

    info!(
        "Starting autoplay at {} ticks per second{}..!",
        tick_rate,
        if realtime { "" } else { " (simulated time)" }
    );

    let mut tick: u64 = 0;
    while !session.finished() {
        if stop.load(Ordering::Relaxed) {
            warn!(
                "Autoplay stopped after {:.3}ms of song time..!",
                session.elapsed_ms().max(0.0)
            );
            break;
        }

        let scheduled_ms = tick as f64 * tick_ms;
        let wall_ms = if realtime {
            let behind = scheduled_ms - wall.elapsed_ms();
            if behind > 0.0 {
                sleeper.sleep(Duration::from_secs_f64(behind / 1000.0));
            }
            wall.elapsed_ms()
        } else {
            scheduled_ms
        };

        audio.advance(wall_ms);
        if session.is_synced() {
            let due_ms = session.elapsed_ms() + tick_ms;
            bot.queue_due(session, due_ms);
        }

        let report = session.tick(wall_ms, &audio);
        for judgement in report.judgements.iter() {
            debug!(
                "{:>6} #{:<4} {:?} at {:.3}ms",
                judgement.lane.name(),
                judgement.note_index,
                judgement.rating,
                report.sample.elapsed_ms
            );
        }

        tick += 1;
    }

    let score = session.score().clone();
    info!(
        "Autoplay finished: {} points, grade {}, max combo {}..!",
        score.score(),
        score.grade(),
        score.max_combo
    );

    Ok(score)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::chart::{Difficulty, Lane, MarkerKind, Note, SongMetadata};
    use crate::model::score::{Grade, Rating};

    fn chart() -> Arc<Chart> {
        let mut lanes = LaneId::ALL
            .iter()
            .map(|&id| Lane { id, notes: Vec::new() })
            .collect::<Vec<_>>();

        lanes[0].notes = vec![Note::tap(1000), Note::tap(1500), Note::hold(2000, 3000)];
        lanes[2].notes = vec![Note::tap(1005), Note::tap(4000)];

        Arc::new(Chart {
            metadata: SongMetadata {
                bpm: 120.0,
                division: 480,
                length_ms: 4000,
                file_bpm: None,
            },
            difficulty: Difficulty::Expert,
            total_notes: 5,
            lanes,
            guides: vec![
                Note::marker(0, MarkerKind::Measure),
                Note::marker(500, MarkerKind::Beat),
            ],
        })
    }

    fn config() -> PlayConfig {
        PlayConfig {
            base_travel_ms: 1000.0,
            grace_period_ms: 500.0,
            ..PlayConfig::default()
        }
    }

    /// Fixed 10ms ticks; presses and releases keyed by song time.
    fn play_script(session: &mut Session, script: &[(i64, LaneId, InputKind)]) -> Vec<Judgement> {
        let mut audio = SimulatedAudio::new(500.0);
        let mut out = Vec::new();

        for wall in (0..5000).step_by(10) {
            let song_ms = wall as i64 - 500;
            for &(_, lane, kind) in script.iter().filter(|(at, _, _)| *at == song_ms) {
                match kind {
                    InputKind::Press => session.press(lane),
                    InputKind::Release => session.release(lane),
                }
            }

            audio.advance(wall as f64);
            out.extend(session.tick(wall as f64, &audio).judgements);
        }

        out
    }

    #[test]
    fn scripted_attempt() {
        env_logger::try_init().unwrap_or(());

        use InputKind::*;
        let mut session = Session::new(chart(), config()).unwrap();
        let script = [
            (1000, LaneId::Green, Press),
            (1000, LaneId::Yellow, Press),
            (1030, LaneId::Green, Release),
            (1030, LaneId::Yellow, Release),
            (1540, LaneId::Green, Press),
            (1550, LaneId::Green, Release),
            (2000, LaneId::Green, Press),
            (2900, LaneId::Green, Release),
        ];

        let judgements = play_script(&mut session, &script);
        let ratings = judgements.iter().map(|j| (j.lane, j.rating)).collect::<Vec<_>>();

        assert_eq!(
            ratings,
            vec![
                (LaneId::Green, Rating::Perfect),
                (LaneId::Yellow, Rating::Perfect),
                (LaneId::Green, Rating::Good),
                (LaneId::Green, Rating::Perfect),
                (LaneId::Yellow, Rating::Miss),
            ]
        );

        let score = session.score();
        assert_eq!((score.perfect, score.good, score.bad, score.miss), (3, 1, 0, 1));
        assert_eq!(score.combo, 0);
        assert_eq!(score.max_combo, 4);
        assert_eq!(score.grade(), Grade::S);
        assert_eq!(
            session.lane(LaneId::Green).unwrap().notes()[2].release_time,
            Some(2900)
        );
        assert!(session.finished());
    }

    #[test]
    fn pre_roll_never_judges() {
        let mut session = Session::new(chart(), config()).unwrap();
        let audio = SimulatedAudio::new(f64::INFINITY);

        session.press(LaneId::Green);
        for wall in (0..10_000).step_by(10) {
            let report = session.tick(wall as f64, &audio);
            assert_eq!(report.sample.phase, Phase::PreRoll);
            assert!(report.judgements.is_empty());
        }

        assert_eq!(session.score().judged(), 0);
        assert!(session.lanes().iter().all(|lane| lane.visible().count() == 0));
        assert!(!session.finished());
    }

    #[test]
    fn reset_replays_identically() {
        use InputKind::*;
        let script = [
            (990, LaneId::Green, Press),
            (1010, LaneId::Green, Release),
            (1500, LaneId::Green, Press),
            (1520, LaneId::Green, Release),
            (1960, LaneId::Green, Press),
            (3200, LaneId::Green, Release),
        ];

        let mut session = Session::new(chart(), config()).unwrap();
        let first = play_script(&mut session, &script);
        let first_score = session.score().clone();

        session.reset();
        assert_eq!(session.score().judged(), 0);
        assert!(!session.is_synced());

        let second = play_script(&mut session, &script);
        assert_eq!(first, second);
        assert_eq!(&first_score, session.score());
    }

    #[test]
    fn guides_advance_with_lanes() {
        let mut session = Session::new(chart(), config()).unwrap();
        let mut audio = SimulatedAudio::new(500.0);

        audio.advance(500.0);
        session.tick(500.0, &audio);
        assert_eq!(session.guides().visible().count(), 2);

        audio.advance(1000.0);
        session.tick(1000.0, &audio);
        assert_eq!(session.guides().visible().map(|g| g.index).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn autoplay_full_combo() {
        env_logger::try_init().unwrap_or(());

        let mut session = Session::new(chart(), config()).unwrap();
        let stop = AtomicBool::new(false);

        let score = run_autoplay(&mut session, 250, false, &stop).unwrap();
        assert_eq!(score.perfect, 5);
        assert_eq!(score.max_combo, 5);
        assert_eq!(score.grade(), Grade::Sss);
        assert!(session.finished());
    }

    #[test]
    fn autoplay_honours_stop_flag() {
        let mut session = Session::new(chart(), config()).unwrap();
        let stop = AtomicBool::new(true);

        let score = run_autoplay(&mut session, 250, false, &stop).unwrap();
        assert_eq!(score.judged(), 0);
        assert!(!session.finished());
    }

    #[test]
    fn autoplay_rejects_tick_rate() {
        let mut session = Session::new(chart(), config()).unwrap();
        let stop = AtomicBool::new(false);

        assert!(run_autoplay(&mut session, 0, false, &stop).is_err());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let config = PlayConfig {
            speed: -1.0,
            ..config()
        };

        assert_eq!(Session::new(chart(), config).unwrap_err(), ConfigError::Speed(-1.0));
    }

    #[test]
    fn autoplayer_spaces_close_taps() {
        let mut lanes = chart().lanes.clone();
        lanes[1].notes = vec![Note::tap(100), Note::tap(120)];
        let chart = Chart {
            lanes,
            ..(*chart()).clone()
        };

        let bot = AutoPlayer::new(&chart);
        let red = bot
            .timeline
            .iter()
            .filter(|(_, lane, _)| *lane == LaneId::Red)
            .map(|(time, _, kind)| (*time, *kind))
            .collect::<Vec<_>>();

        assert_eq!(
            red,
            vec![
                (100.0, InputKind::Press),
                (110.0, InputKind::Release),
                (120.0, InputKind::Press),
                (150.0, InputKind::Release),
            ]
        );
    }

    #[test]
    fn release_waits_for_its_press_to_land() {
        let mut session = Session::new(chart(), config()).unwrap();
        let mut bot = AutoPlayer::new(session.chart());

        bot.queue_due(&mut session, 1100.0);
        assert_eq!(
            session.pending,
            vec![(LaneId::Green, InputKind::Press), (LaneId::Yellow, InputKind::Press)]
        );

        session.pending.clear();
        bot.queue_due(&mut session, 1100.0);
        assert_eq!(
            session.pending,
            vec![(LaneId::Green, InputKind::Release), (LaneId::Yellow, InputKind::Release)]
        );
    }

    #[test]
    fn deferred_release_does_not_hold_back_other_lanes() {
        let mut lanes = chart().lanes.clone();
        lanes[0].notes = vec![Note::tap(1000)];
        lanes[1].notes = vec![Note::tap(1050)];
        lanes[2].notes = Vec::new();
        let chart = Arc::new(Chart {
            lanes,
            total_notes: 2,
            ..(*chart()).clone()
        });

        let mut session = Session::new(Arc::clone(&chart), config()).unwrap();
        let mut bot = AutoPlayer::new(&chart);

        bot.queue_due(&mut session, 1100.0);
        assert_eq!(
            session.pending,
            vec![(LaneId::Green, InputKind::Press), (LaneId::Red, InputKind::Press)]
        );

        session.pending.clear();
        bot.queue_due(&mut session, 1100.0);
        assert_eq!(
            session.pending,
            vec![(LaneId::Green, InputKind::Release), (LaneId::Red, InputKind::Release)]
        );

        session.pending.clear();
        bot.queue_due(&mut session, 5000.0);
        assert!(session.pending.is_empty());
    }
}
