//! WKT读写：读取服务器返回的ROI几何，写出检测得到的多边形。

use crate::error::{Error, Result};
use geo::{Geometry, Polygon};
use ::wkt::{ToWkt, TryFromWkt};

/// 解析WKT文本。
pub fn parse_wkt(s: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(s.trim()).map_err(|e| Error::Wkt(format!("`{s}`: {e}")))
}

/// 将多边形写为WKT，外环闭合。
pub fn to_wkt(polygon: &Polygon<f64>) -> String {
    polygon.wkt_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{bounds, ring_polygon};
    use geo::{coord, Coord};

    #[test]
    fn test_parse_polygon_bounds() {
        let g = parse_wkt("POLYGON ((100 200, 300 200, 300 450, 100 450, 100 200))").unwrap();
        let b = bounds(&g).unwrap();
        assert_eq!((b.min().x, b.min().y, b.max().x, b.max().y), (100.0, 200.0, 300.0, 450.0));
    }

    #[test]
    fn test_parse_multipolygon() {
        let s = "MULTIPOLYGON (((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 3 2, 3 3, 2 2)), \
                 ((20 -5, 30 -5, 30 5, 20 -5)))";
        let b = bounds(&parse_wkt(s).unwrap()).unwrap();
        assert_eq!((b.min().x, b.min().y, b.max().x, b.max().y), (0.0, -5.0, 30.0, 10.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_wkt("").is_err());
        assert!(parse_wkt("CIRCLE (0 0)").is_err());
        assert!(parse_wkt("POLYGON ((0 0, 1 x, 0 0))").is_err());
        assert!(parse_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0)").is_err());
    }

    #[test]
    fn test_to_wkt_reparse_closed() {
        let p = ring_polygon(vec![
            coord! { x: 10.0, y: 20.0 },
            coord! { x: 12.5, y: 20.0 },
            coord! { x: 12.5, y: 18.0 },
        ])
        .unwrap();
        let s = to_wkt(&p);
        assert!(s.starts_with("POLYGON"));
        match parse_wkt(&s).unwrap() {
            Geometry::Polygon(q) => {
                let ring: Vec<Coord<f64>> = q.exterior().0.clone();
                assert_eq!(ring.len(), 4);
                assert_eq!(ring[1], coord! { x: 12.5, y: 20.0 });
                assert_eq!(ring.first(), ring.last());
                assert_eq!(q, p);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
