//! Cytomine ROI上的StarDist细胞核检测。

pub mod cytomine;
pub mod error;
pub mod geom;
pub mod pipeline;
pub mod prelude;
pub mod prep;
pub mod stardist;

pub use error::{Error, Result};
