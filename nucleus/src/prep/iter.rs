use super::pos::Pos;

/// 按行优先顺序遍历`[h_lb, h_ub) x [w_lb, w_ub)`窗口内的所有像素坐标。
pub struct PosIter {
    cur_h: usize,
    cur_w: usize,
    h_lb: usize,
    h_ub: usize,
    w_lb: usize,
    w_ub: usize,
}

impl PosIter {
    #[inline]
    pub fn new(h_len: usize, w_len: usize) -> Self {
        Self::window((0, h_len), (0, w_len))
    }

    /// 只遍历给定的半开窗口。空窗口不产生任何坐标。
    #[inline]
    pub fn window(h: (usize, usize), w: (usize, usize)) -> Self {
        let empty = h.0 >= h.1 || w.0 >= w.1;
        Self {
            cur_h: if empty { h.1 } else { h.0 },
            cur_w: w.0,
            h_lb: h.0,
            h_ub: h.1,
            w_lb: w.0,
            w_ub: w.1,
        }
    }
}

impl Iterator for PosIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_h >= self.h_ub {
            return None;
        }
        let ret_pos = Pos::new(self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w_ub {
            self.cur_w = self.w_lb;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }
}
