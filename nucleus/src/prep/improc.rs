//! 模型输入前后的栅格处理：透明通道压平、百分位归一化、反射填充以及标签图绘制。

use super::{Pos, PosIter};
use geo::{coord, BoundingRect, Intersects, LineString, Polygon, Rect};
use image::{Rgb, RgbImage, RgbaImage};
use ndarray::{Array2, Array3, ArrayView3, Axis};

/// 像素常量。
pub mod consts {
    /// 压平透明通道时使用的背景（白色）。
    pub const WHITE: u8 = 255;

    /// 标签图中背景的取值。
    pub const LABEL_BACKGROUND: i32 = 0;

    /// 防止除零的极小量，与csbdeep保持一致。
    pub const NORM_EPS: f32 = 1e-20;
}

use consts::*;

/// 将RGBA图像以alpha为蒙版贴到白色背景上，得到不带透明通道的RGB图像。
pub fn flatten_alpha(img: &RgbaImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + WHITE as u32 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// RGB图像转为`[H, W, 3]`的浮点数组（像素值不缩放）。
pub fn rgb_to_array(img: &RgbImage) -> Array3<f32> {
    let (w, h) = img.dimensions();
    Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        img.get_pixel(x as u32, y as u32)[c] as f32
    })
}

/// 以numpy默认的线性插值方式计算百分位数。`values`会被排序；为空时返回0。
pub fn percentile(values: &mut [f32], p: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// 按通道独立地做百分位归一化：`(x - p_low) / (p_high - p_low + eps)`，不截断。
pub fn normalize_percentile(img: ArrayView3<f32>, p_low: f64, p_high: f64) -> Array3<f32> {
    let mut out = img.to_owned();
    for mut channel in out.axis_iter_mut(Axis(2)) {
        let mut values: Vec<f32> = channel.iter().copied().collect();
        let mi = percentile(&mut values, p_low);
        let ma = percentile(&mut values, p_high);
        let scale = ma - mi + NORM_EPS;
        channel.mapv_inplace(|v| (v - mi) / scale);
    }
    out
}

/// numpy `reflect`模式下的下标（不重复边缘像素）。
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// 在下侧与右侧做反射填充，使高和宽分别是`div_by`的整数倍。返回填充后的图像及填充量。
pub fn reflect_pad(img: ArrayView3<f32>, div_by: (usize, usize)) -> (Array3<f32>, (usize, usize)) {
    let (h, w, c) = img.dim();
    let pad_h = (div_by.0 - h % div_by.0) % div_by.0;
    let pad_w = (div_by.1 - w % div_by.1) % div_by.1;
    if pad_h == 0 && pad_w == 0 {
        return (img.to_owned(), (0, 0));
    }
    let padded = Array3::from_shape_fn((h + pad_h, w + pad_w, c), |(y, x, ch)| {
        img[[
            reflect_index(y as isize, h),
            reflect_index(x as isize, w),
            ch,
        ]]
    });
    (padded, (pad_h, pad_w))
}

/// 将局部坐标`(row, col)`的多边形绘制为`[h, w]`标签图。
///
/// 第`k`个多边形的标签为`k + 1`；重叠处由靠前的多边形覆盖（调用方应按得分从高到低排列）。
/// 像素中心落在多边形内部或边界上即被填充。
pub fn render_labels(h: usize, w: usize, polygons: &[Vec<(f64, f64)>]) -> Array2<i32> {
    let mut labels = Array2::<i32>::from_elem((h, w), LABEL_BACKGROUND);
    for (k, ring) in polygons.iter().enumerate().rev() {
        if ring.len() < 3 {
            continue;
        }
        let ring: Vec<_> = ring.iter().map(|&(r, c)| coord! { x: c, y: r }).collect();
        let polygon = Polygon::new(LineString::from(ring), vec![]);
        let Some(window) = polygon.bounding_rect().and_then(|b| clip_window(b, h, w)) else {
            continue;
        };
        for Pos { h: r, w: c } in PosIter::window(window.0, window.1) {
            if polygon.intersects(&coord! { x: c as f64, y: r as f64 }) {
                labels[[r, c]] = k as i32 + 1;
            }
        }
    }
    labels
}

/// 包围盒（`x`为列、`y`为行）与图像范围的交集，半开区间；不相交时返回`None`。
fn clip_window(b: Rect<f64>, h: usize, w: usize) -> Option<((usize, usize), (usize, usize))> {
    let clamp_lb = |v: f64| v.ceil().max(0.0) as usize;
    let clamp_ub = |v: f64, len: usize| ((v.floor() + 1.0).max(0.0) as usize).min(len);
    let hw = (clamp_lb(b.min().y), clamp_ub(b.max().y, h));
    let ww = (clamp_lb(b.min().x), clamp_ub(b.max().x, w));
    (hw.0 < hw.1 && ww.0 < ww.1).then_some((hw, ww))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgba;
    use ndarray::Array3;

    #[test]
    fn test_flatten_alpha() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 128]));
        let out = flatten_alpha(&img);
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_abs_diff_eq!(percentile(&mut v, 0.0), 1.0);
        assert_abs_diff_eq!(percentile(&mut v, 50.0), 3.0);
        assert_abs_diff_eq!(percentile(&mut v, 100.0), 5.0);
        // numpy.percentile([1,2,3,4,5], 10) == 1.4
        assert_abs_diff_eq!(percentile(&mut v, 10.0), 1.4, epsilon = 1e-6);
        assert_abs_diff_eq!(percentile(&mut [], 50.0), 0.0);
    }

    #[test]
    fn test_normalize_channels_independently() {
        let mut img = Array3::<f32>::zeros((2, 2, 2));
        for (i, v) in [0.0, 10.0, 20.0, 30.0].iter().enumerate() {
            img[[i / 2, i % 2, 0]] = *v;
            img[[i / 2, i % 2, 1]] = *v * 10.0 + 5.0;
        }
        let out = normalize_percentile(img.view(), 0.0, 100.0);
        for ch in 0..2 {
            assert_abs_diff_eq!(out[[0, 0, ch]], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(out[[1, 1, ch]], 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(out[[0, 1, ch]], 1.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_normalize_does_not_clip() {
        let img = Array3::from_shape_vec((1, 5, 1), vec![0.0, 1.0, 2.0, 3.0, 100.0]).unwrap();
        let out = normalize_percentile(img.view(), 0.0, 75.0);
        assert!(out[[0, 4, 0]] > 1.0);
    }

    #[test]
    fn test_reflect_pad() {
        let img = Array3::from_shape_vec((1, 3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let (p, pad) = reflect_pad(img.view(), (1, 4));
        assert_eq!(pad, (0, 1));
        assert_eq!(p.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 2.0]);
        let (p, pad) = reflect_pad(img.view(), (1, 3));
        assert_eq!(pad, (0, 0));
        assert_eq!(p.dim(), (1, 3, 1));
    }

    #[test]
    fn test_reflect_index_long_pad() {
        let idx: Vec<usize> = (0..8).map(|i| reflect_index(i, 3)).collect();
        assert_eq!(idx, vec![0, 1, 2, 1, 0, 1, 2, 1]);
        assert_eq!(reflect_index(5, 1), 0);
    }

    #[test]
    fn test_render_labels_priority() {
        let big = vec![(0.0, 0.0), (0.0, 5.5), (5.5, 5.5), (5.5, 0.0)];
        let small = vec![(1.5, 1.5), (1.5, 3.5), (3.5, 3.5), (3.5, 1.5)];
        let labels = render_labels(8, 8, &[small.clone(), big.clone()]);
        assert_eq!(labels[[2, 2]], 1);
        assert_eq!(labels[[0, 0]], 2);
        assert_eq!(labels[[5, 5]], 2);
        assert_eq!(labels[[6, 6]], 0);

        let labels = render_labels(8, 8, &[big, small]);
        assert_eq!(labels[[2, 2]], 1);
        assert!(labels.iter().all(|&v| v != 2));
    }

    #[test]
    fn test_render_labels_clips_outside() {
        let ring = vec![(-3.0, -3.0), (-3.0, 2.0), (2.0, 2.0), (2.0, -3.0)];
        let labels = render_labels(4, 4, &[ring, vec![(10.0, 10.0), (10.0, 12.0), (12.0, 12.0)]]);
        assert_eq!(labels[[0, 0]], 1);
        assert_eq!(labels[[1, 1]], 1);
        assert_eq!(labels[[3, 3]], 0);
    }
}
