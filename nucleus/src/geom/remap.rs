//! 局部栅格坐标到服务器坐标的映射。
//!
//! 服务器使用笛卡尔坐标系，(0, 0)位于整张切片的左下角；ROI裁剪出的栅格图像原点在左上角，
//! 行号向下增长。因此局部点`(row, col)`映射为`(minx + col, maxy - row)`，
//! 其中`minx`、`maxy`为ROI包围盒的左边界与上边界。

use geo::{coord, Coord, Rect};

/// ROI栅格左上角在服务器坐标系中的位置。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Origin {
    pub minx: f64,
    /// 包围盒的最大y值（栅格的第0行）。
    pub maxy: f64,
}

impl Origin {
    #[inline]
    pub fn new(minx: f64, maxy: f64) -> Self {
        Self { minx, maxy }
    }

    /// 映射单个局部点。
    #[inline]
    pub fn map(&self, row: f64, col: f64) -> Coord<f64> {
        coord! { x: self.minx + col, y: self.maxy - row }
    }
}

impl From<Rect<f64>> for Origin {
    #[inline]
    fn from(b: Rect<f64>) -> Self {
        Origin::new(b.min().x, b.max().y)
    }
}

/// 将一条局部轮廓（`(row, col)`序列）映射到服务器坐标。点数与顺序保持不变。
pub fn remap_contour(origin: Origin, contour: &[(f64, f64)]) -> Vec<Coord<f64>> {
    contour
        .iter()
        .map(|&(row, col)| origin.map(row, col))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_flip_and_offset() {
        let o = Origin::new(1000.0, 5000.0);
        let p = o.map(10.0, 25.5);
        assert_abs_diff_eq!(p.x, 1025.5);
        assert_abs_diff_eq!(p.y, 4990.0);
    }

    #[test]
    fn test_formula_over_grid() {
        let origins = [
            Origin::new(0.0, 0.0),
            Origin::new(-12.5, 300.0),
            Origin::new(41234.0, 18777.25),
        ];
        for o in origins {
            for row in [0.0, 0.5, 17.0, 511.0] {
                for col in [0.0, 3.25, 255.0] {
                    let p = o.map(row, col);
                    assert_abs_diff_eq!(p.x, o.minx + col);
                    assert_abs_diff_eq!(p.y, o.maxy - row);
                }
            }
        }
    }

    #[test]
    fn test_preserves_count_and_order() {
        let o = Origin::new(100.0, 200.0);
        let contour = vec![(0.0, 0.0), (0.0, 4.0), (3.0, 4.0), (3.0, 0.0), (0.0, 0.0)];
        let mapped = remap_contour(o, &contour);
        assert_eq!(mapped.len(), contour.len());
        for (&(row, col), p) in contour.iter().zip(mapped.iter()) {
            assert_eq!(*p, coord! { x: 100.0 + col, y: 200.0 - row });
        }
        // 闭合环映射后仍然闭合
        assert_eq!(mapped.first(), mapped.last());
    }

    #[test]
    fn test_empty_contour() {
        assert!(remap_contour(Origin::new(1.0, 2.0), &[]).is_empty());
    }

    #[test]
    fn test_origin_from_bounds_uses_top_edge() {
        let b = Rect::new(coord! { x: 30.0, y: 20.0 }, coord! { x: 10.0, y: 40.0 });
        assert_eq!(Origin::from(b), Origin::new(10.0, 40.0));
    }
}
