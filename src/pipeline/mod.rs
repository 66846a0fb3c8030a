//! Asynchronous track processing pipeline.
//!
//! Upload handlers persist a `pending` track and nudge the scheduler:
//! 1. `ProcessingScheduler` picks the oldest pending track, one at a time
//! 2. `TrackProcessor` validates the source, transcodes to MP3, renders
//!    waveform peaks and reads tags/cover art
//! 3. The outcome lands as `ready` (one write with all derived fields)
//!    or `failed` (with an operator-readable message)
//! 4. `GroupingManager` wraps ungrouped ready tracks in a `single`
//!    collection so every track is reachable through a collection

mod grouping;
mod layout;
mod processor;
mod scheduler;

pub use grouping::{GroupingError, GroupingManager};
pub use layout::MediaLayout;
pub(crate) use layout::remove_file_if_exists;
pub use processor::{PipelineRunner, TrackProcessor};
pub use scheduler::{ProcessingScheduler, SchedulerConfig, SchedulerHandle};
