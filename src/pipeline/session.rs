use crate::error::Result;
use crate::output::OutputSink;
use crate::source::FrameSource;

/// An open frame source paired with an open output sink.
///
/// Both are released together: explicitly through [`PipelineSession::release`],
/// or on drop when the run loop unwinds early.
pub struct PipelineSession<S: FrameSource, O: OutputSink> {
    pub(crate) source: S,
    pub(crate) sink: O,
    released: bool,
}

impl<S: FrameSource, O: OutputSink> PipelineSession<S, O> {
    /// Acquire the source, then the sink. If the sink fails the source is closed again.
    pub fn open<FS, FO>(open_source: FS, open_sink: FO) -> Result<Self>
    where
        FS: FnOnce() -> Result<S>,
        FO: FnOnce() -> Result<O>,
    {
        let mut source = open_source()?;
        let sink = match open_sink() {
            Ok(sink) => sink,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };
        Ok(Self {
            source,
            sink,
            released: false,
        })
    }

    /// Close both halves, reporting a sink shutdown failure.
    pub fn release(mut self) -> Result<()> {
        self.close_all()
    }

    fn close_all(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.source.close();
        self.sink.close()
    }
}

impl<S: FrameSource, O: OutputSink> Drop for PipelineSession<S, O> {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            tracing::warn!("Output sink did not shut down cleanly: {}", e);
        }
    }
}
