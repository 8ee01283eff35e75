//! Three independently runnable slices of the same pipeline core, mirroring
//! `cmd/streamSubscribe.go`, `cmd/syncAndPublish.go`, and
//! `cmd/syncPublishScreenAndServe.go` as three entry points over one
//! implementation.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// SC only: decode and log, nothing persisted.
    SyncOnly,
    /// SC -> CAP -> IDX, no downstream subscribers.
    SyncAndPublish,
    /// The full pipeline: SC -> CAP -> IDX, fanned out through SRV, plus
    /// GAP if `backfill.on` is set.
    Full,
}

impl Mode {
    pub fn publishes(self) -> bool {
        !matches!(self, Mode::SyncOnly)
    }

    pub fn serves(self) -> bool {
        matches!(self, Mode::Full)
    }
}
