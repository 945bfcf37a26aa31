//! Chapter streaming and pagination engine.
//!
//! The engine fetches chapters of a novel on demand, keeps an ordered view
//! of delivered content consistent across single-chapter and continuous
//! reading, windows the chapter index, and emits a session heartbeat. The
//! entry point is [`session::ReadingSessionController::spawn`].

pub mod cancellation;
pub mod chapter;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod guard;
pub mod proximity;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod toc;

use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Write TypeScript declarations for every view type into `out_dir`,
/// replacing any `.ts` files already there.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<chapter::ChapterKey>(out_dir)?;
    export_single_type::<chapter::Chapter>(out_dir)?;
    export_single_type::<chapter::ReadingMode>(out_dir)?;
    export_single_type::<chapter::Direction>(out_dir)?;
    export_single_type::<chapter::TocEntry>(out_dir)?;
    export_single_type::<toc::TocPage>(out_dir)?;
    export_single_type::<session::LoadStatus>(out_dir)?;
    export_single_type::<session::SessionSnapshot>(out_dir)?;
    Ok(())
}
