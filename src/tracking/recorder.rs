//! Persisting received marker sets as tracker rows

use super::source::REQUIRED_COLUMNS;
use crate::types::MarkerSet;
use crate::{MocapError, Result};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Frame numbers remembered for duplicate suppression.
const RECENT_FRAMES: usize = 256;

#[derive(Debug)]
struct RecorderState {
    writer: BufWriter<File>,
    /// Most recently written frame numbers, oldest first
    recent: VecDeque<u32>,
}

/// Appends one marker set's positions to a CSV file that
/// [`CsvFrameSource`](super::CsvFrameSource) can read back.
///
/// Rows are `frame_number,pos_x,pos_y,pos_z` in metres, one per marker.
/// Sets with any other label are ignored, as are repeats of any of the
/// last 256 frame numbers (UDP may deliver a frame twice).
/// Older frame numbers are recorded again, so a playback reset to frame 0
/// keeps recording.
#[derive(Debug)]
pub struct CsvMarkerRecorder {
    path: PathBuf,
    label: String,
    state: Mutex<RecorderState>,
}

impl CsvMarkerRecorder {
    /// Open `path` for appending, writing the header if the file is new or empty.
    pub fn create(path: impl AsRef<Path>, label: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MocapError::file_error(path.to_path_buf(), e))?;
        let is_empty = file
            .metadata()
            .map_err(|e| MocapError::file_error(path.to_path_buf(), e))?
            .len()
            == 0;

        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{}", REQUIRED_COLUMNS.join(","))
                .and_then(|_| writer.flush())
                .map_err(|e| MocapError::file_error(path.to_path_buf(), e))?;
        }

        let label = label.into();
        debug!("Recording marker set '{}' to {}", label, path.display());
        Ok(Self {
            path: path.to_path_buf(),
            label,
            state: Mutex::new(RecorderState {
                writer,
                recent: VecDeque::with_capacity(RECENT_FRAMES),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append `set` if its label matches and its frame is new. Returns the
    /// number of rows written.
    pub fn record(&self, set: &MarkerSet) -> Result<usize> {
        if set.label != self.label {
            return Ok(0);
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.recent.contains(&set.frame_number) {
            trace!("Frame {} already recorded, skipping", set.frame_number);
            return Ok(0);
        }

        let write = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
            for marker in &set.markers {
                writeln!(
                    writer,
                    "{},{},{},{}",
                    set.frame_number, marker.pos_x, marker.pos_y, marker.pos_z
                )?;
            }
            writer.flush()
        };
        write(&mut state.writer).map_err(|e| MocapError::file_error(self.path.clone(), e))?;

        if state.recent.len() == RECENT_FRAMES {
            state.recent.pop_front();
        }
        state.recent.push_back(set.frame_number);
        Ok(set.len())
    }

    /// Marker-set callback that records into this recorder, logging failures.
    pub fn listener(self: &Arc<Self>) -> impl Fn(&MarkerSet) + Send + Sync + 'static {
        let recorder = Arc::clone(self);
        move |set: &MarkerSet| {
            if let Err(e) = recorder.record(set) {
                warn!("Failed to record frame {}: {}", set.frame_number, e);
            }
        }
    }
}
