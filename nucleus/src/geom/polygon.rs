use crate::error::{Error, Result};
use geo::{Area, BoundingRect, Coord, Geometry, LineString, Polygon, Rect};

/// 由顶点序列构造只有外环的多边形。
///
/// 去掉与首点重复的末点以及相邻的重复顶点；剩余不同顶点少于3个或面积为0（共线）时报错。
pub fn ring_polygon(mut exterior: Vec<Coord<f64>>) -> Result<Polygon<f64>> {
    exterior.dedup();
    while exterior.len() > 1 && exterior.first() == exterior.last() {
        exterior.pop();
    }
    if exterior.len() < 3 {
        return Err(Error::Geometry(format!(
            "多边形至少需要3个不同的顶点，实际为{}",
            exterior.len()
        )));
    }
    let polygon = Polygon::new(LineString::from(exterior), vec![]);
    if polygon.unsigned_area() <= 0.0 {
        return Err(Error::Geometry("多边形面积为0".to_owned()));
    }
    Ok(polygon)
}

/// 几何对象的包围盒；空几何返回`None`。
pub fn bounds(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}
