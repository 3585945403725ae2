mod loopback;
mod snapshot;

pub use loopback::LoopbackSink;
pub use snapshot::SnapshotSink;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;

use crate::error::Result;

/// Destination for composited frames.
///
/// Updates are delivered in the order `send` is called.
pub trait OutputSink {
    /// Push one display update: the overlay frame plus its text block.
    fn send(&mut self, frame: &RgbImage, text: &[String]) -> Result<()>;

    /// Non-blocking poll: has the consumer asked the pipeline to stop?
    fn check_exit(&mut self) -> bool;

    /// Flush and shut the transport. A second call is a no-op.
    fn close(&mut self) -> Result<()>;
}

impl<O: OutputSink + ?Sized> OutputSink for Box<O> {
    fn send(&mut self, frame: &RgbImage, text: &[String]) -> Result<()> {
        (**self).send(frame, text)
    }

    fn check_exit(&mut self) -> bool {
        (**self).check_exit()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Shared stop request, raised from outside the pipeline thread (Ctrl+C).
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Raise this signal on Ctrl+C.
    pub fn install_ctrlc_handler(&self) -> std::result::Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Ctrl+C received, stopping after the current frame");
            signal.request();
        })
    }
}
