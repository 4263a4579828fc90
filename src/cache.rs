use crate::chart_importer::parse_chart;
use crate::error::ChartError;
use crate::model::chart::{Chart, Difficulty};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Parsed charts keyed by song and difficulty, so each is decoded once per selection.
#[derive(Debug, Default)]
pub struct ChartCache {
    charts: HashMap<(String, Difficulty), Arc<Chart>>,
}

impl ChartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached chart, parsing `bytes` on a miss. Failures are not cached.
    pub fn get_or_parse(
        &mut self,
        song: &str,
        difficulty: Difficulty,
        bpm: f64,
        bytes: &[u8],
    ) -> Result<Arc<Chart>, ChartError> {
        let key = (song.to_owned(), difficulty);

        if let Some(chart) = self.charts.get(&key) {
            debug!("Chart cache hit for '{}' ({})", song, difficulty);
            return Ok(Arc::clone(chart));
        }

        let chart = Arc::new(parse_chart(bytes, bpm, difficulty)?);
        debug!("Cached {} chart for '{}'", difficulty, song);
        self.charts.insert(key, Arc::clone(&chart));

        Ok(chart)
    }

    pub fn get(&self, song: &str, difficulty: Difficulty) -> Option<Arc<Chart>> {
        self.charts.get(&(song.to_owned(), difficulty)).cloned()
    }

    /// Drop every difficulty cached for `song`.
    pub fn invalidate(&mut self, song: &str) {
        self.charts.retain(|(key, _), _| key != song);
    }

    pub fn clear(&mut self) {
        self.charts.clear();
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}
