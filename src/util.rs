use crate::model::chart::Chart;
use log::info;

const MIN_SPEED: f64 = 0.25;
const MAX_SPEED: f64 = 5.0;

pub fn parse_speed(input: &str) -> f64 {
    match input.trim().to_lowercase().as_str() {
        "s" | "slow" => 0.75,
        "n" | "normal" => 1.0,
        "f" | "fast" => 1.5,
        "b" | "blazing" => 2.0,
        other => match other.parse::<f64>() {
            Ok(custom) if custom.is_finite() => custom.clamp(MIN_SPEED, MAX_SPEED),
            _ => {
                info!("Unknown speed '{}', defaulting to `normal`..!", other);
                1.0
            }
        },
    }
}

/// One line per lane plus a header, for dry runs and song select.
pub fn chart_summary(chart: &Chart) -> String {
    let mut out = format!(
        "{} chart | {:.1} bpm | {} ticks/qn | {:.3}s | {} notes ({} holds) | {} guides",
        chart.difficulty,
        chart.metadata.bpm,
        chart.metadata.division,
        chart.metadata.length_ms as f64 / 1000.0,
        chart.total_notes,
        chart.hold_count(),
        chart.guides.len()
    );

    for lane in chart.lanes.iter() {
        let first = lane
            .notes
            .first()
            .map(|note| format!("{}ms", note.target))
            .unwrap_or_else(|| "-".into());

        out.push_str(&format!(
            "\n  {:>6}: {:>5} notes, first at {}",
            lane.id.name(),
            lane.notes.len(),
            first
        ));
    }

    out
}
