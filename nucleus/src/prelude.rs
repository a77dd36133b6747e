pub use super::cytomine::{
    AnnotationQuery, AnnotationService, Credentials, CytomineClient, JobStatus, NewAnnotation,
    RoiAnnotation,
};
pub use super::error::{Error, Result};
pub use super::geom::{bounds, parse_wkt, remap_contour, ring_polygon, to_wkt, Origin};
pub use super::pipeline::{DetectionParams, ImageSelection, Pipeline, Summary};
pub use super::prep::{AccTimer, Pos, PosIter};
pub use super::stardist::{Instance, InstanceSegmenter, Prediction, StarDist2D};
