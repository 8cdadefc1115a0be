//! Batch poll orchestrator: the top-level periodic job driving
//! fetch → normalize → classify → score → persist, then the alert pass.

mod cycle;

pub use cycle::{CycleError, CycleReport, Poller};
