pub mod improc;
pub mod iter;
pub mod log;
pub mod pos;

pub use improc::{flatten_alpha, normalize_percentile, percentile, reflect_pad, render_labels};
pub use iter::PosIter;
pub use log::AccTimer;
pub use pos::Pos;
