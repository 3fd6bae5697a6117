//! Track list read/write.
//!
//! A track file is a JSON array of `domain::Track` values. Directions are
//! re-normalized on read; a zero direction is rejected.

use std::fs::File;
use std::path::Path;

use crate::domain::Track;
use crate::error::AppError;

pub fn read_tracks_json(path: &Path) -> Result<Vec<Track>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open track file '{}': {e}", path.display())))?;
    let tracks: Vec<Track> = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid track JSON '{}': {e}", path.display())))?;
    normalize_tracks(tracks)
}

pub fn write_tracks_json(path: &Path, tracks: &[Track]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create track file '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, tracks)
        .map_err(|e| AppError::input(format!("Failed to write track JSON: {e}")))?;
    Ok(())
}

fn normalize_tracks(mut tracks: Vec<Track>) -> Result<Vec<Track>, AppError> {
    for (index, track) in tracks.iter_mut().enumerate() {
        track.direction = track
            .direction
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| AppError::input(format!("Track {index}: direction must be non-zero.")))?;
        if !track.weight.is_finite() || track.weight <= 0.0 {
            return Err(AppError::input(format!("Track {index}: weight must be positive.")));
        }
    }
    Ok(tracks)
}
