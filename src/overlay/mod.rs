mod legend;
mod mask;

pub use legend::{build_legend, status_text};
pub use mask::{blend, build_mask};
