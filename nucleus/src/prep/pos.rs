/// 代表一个像素坐标(height, width)索引，不负责边界检查。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub h: usize,
    pub w: usize,
}

impl Pos {
    #[inline]
    pub fn new(h: usize, w: usize) -> Self {
        Self { h, w }
    }

    #[inline]
    pub fn to_tuple(self) -> (usize, usize) {
        (self.h, self.w)
    }

    /// 像素中心在局部栅格坐标系中的(行, 列)浮点坐标。
    #[inline]
    pub fn to_f64(self) -> (f64, f64) {
        (self.h as f64, self.w as f64)
    }

    /// 将网格坐标按`grid`步长放大到原图坐标。
    #[inline]
    pub fn scaled(self, grid: (usize, usize)) -> Self {
        Self::new(self.h * grid.0, self.w * grid.1)
    }
}

#[cfg(test)]
mod tests {
    use super::Pos;

    #[test]
    fn test_scaled() {
        assert_eq!(Pos::new(3, 5).scaled((2, 2)), Pos::new(6, 10));
        assert_eq!(Pos::new(3, 5).scaled((1, 4)), Pos::new(3, 20));
    }
}
