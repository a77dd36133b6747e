//! 服务器坐标系中的几何类型、WKT读写以及局部坐标重映射。

pub mod polygon;
pub mod remap;
pub mod wkt;

pub use polygon::{bounds, ring_polygon};
pub use remap::{remap_contour, Origin};
pub use self::wkt::{parse_wkt, to_wkt};
