use super::Instance;
use crate::prep::{Pos, PosIter};
use geo::{coord, Area, BooleanOps, BoundingRect, Intersects, LineString, Polygon, Rect};
use ndarray::{ArrayView2, ArrayView3};
use std::f64::consts::PI;

/// 一个概率超过阈值的网格点及其射线距离。
#[derive(Clone, Debug)]
pub struct Candidate {
    pub center: Pos,
    pub prob: f32,
    pub contour: Vec<(f64, f64)>,
    /// `x`为列、`y`为行的同一多边形。
    polygon: Polygon<f64>,
    area: f64,
    bbox: Option<Rect<f64>>,
}

impl Candidate {
    pub fn new(center: Pos, prob: f32, dist: &[f32]) -> Self {
        let contour = star_polygon(center, dist);
        let ring: Vec<_> = contour.iter().map(|&(r, c)| coord! { x: c, y: r }).collect();
        let polygon = Polygon::new(LineString::from(ring), vec![]);
        Self {
            center,
            prob,
            contour,
            area: polygon.unsigned_area(),
            bbox: polygon.bounding_rect(),
            polygon,
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 两个多边形交集的精确面积。
    pub fn intersection(&self, other: &Candidate) -> f64 {
        match (self.bbox, other.bbox) {
            (Some(a), Some(b)) if a.intersects(&b) => {
                self.polygon.intersection(&other.polygon).unsigned_area()
            }
            _ => 0.0,
        }
    }

    pub fn into_instance(self) -> Instance {
        Instance {
            contour: self.contour,
            center: self.center.to_tuple(),
            prob: self.prob,
        }
    }
}

/// 以`center`为中心、沿`2πk/n`方向延伸`dist[k]`构成星凸多边形，顶点为`(row, col)`。
pub fn star_polygon(center: Pos, dist: &[f32]) -> Vec<(f64, f64)> {
    let n = dist.len() as f64;
    let (r, c) = center.to_f64();
    dist.iter()
        .enumerate()
        .map(|(k, &d)| {
            let phi = 2.0 * PI * k as f64 / n;
            let d = d.max(0.0) as f64;
            (r + d * phi.sin(), c + d * phi.cos())
        })
        .collect()
}

/// 从概率图与距离图中挑出候选点。
///
/// `prob`为`[h', w']`网格，`dist`为`[h', w', n_rays]`；网格坐标按`grid`放大，
/// 放大后落在`valid`（原图未填充的高、宽）之外的点被丢弃。
pub fn candidates_from_maps(
    prob: ArrayView2<f32>,
    dist: ArrayView3<f32>,
    grid: (usize, usize),
    valid: (usize, usize),
    prob_thresh: f32,
) -> Vec<Candidate> {
    PosIter::new(prob.nrows(), prob.ncols())
        .filter(|p| prob[[p.h, p.w]] > prob_thresh)
        .map(|p| (p, p.scaled(grid)))
        .filter(|(_, c)| c.h < valid.0 && c.w < valid.1)
        .map(|(p, c)| {
            let rays: Vec<f32> = dist.slice(ndarray::s![p.h, p.w, ..]).to_vec();
            Candidate::new(c, prob[[p.h, p.w]], &rays)
        })
        .collect()
}

/// 贪心非极大值抑制。候选按概率从高到低处理，
/// 与任一已保留多边形的`交集 / min(面积)`超过`nms_thresh`的候选被抑制。
/// 面积为0的候选（射线全部为0）直接丢弃。
pub fn non_maximum_suppression(mut candidates: Vec<Candidate>, nms_thresh: f32) -> Vec<Candidate> {
    candidates.retain(|c| c.area > 0.0);
    candidates.sort_by(|a, b| b.prob.total_cmp(&a.prob));
    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let suppressed = kept.iter().any(|k| {
            let min_area = cand.area.min(k.area);
            cand.intersection(k) / min_area > nms_thresh as f64
        });
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}
