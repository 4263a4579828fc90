mod cache;
mod chart_importer;
mod engine;
mod error;
mod model;
mod player;
mod util;

pub use cache::*;
pub use chart_importer::*;
pub use engine::AudioClock;
pub use engine::clock::*;
pub use engine::judge::*;
pub use engine::lane::*;
pub use error::*;
pub use model::chart::*;
pub use model::config::*;
pub use model::mappings::*;
pub use model::score::*;
pub use player::*;
pub use util::*;
