//! 星凸多边形实例分割（StarDist）。
//!
//! 流水线只依赖[`InstanceSegmenter`]；[`StarDist2D`]是基于ONNX Runtime的实现。

mod config;
mod model;
mod postprocess;

pub use config::{ModelConfig, Thresholds};
pub use model::StarDist2D;
pub use postprocess::{non_maximum_suppression, star_polygon, Candidate};

use crate::error::Result;
use ndarray::{Array2, ArrayView3};

/// 检测出的一个实例，坐标位于局部栅格坐标系。
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    /// 轮廓顶点`(row, col)`，按射线角度顺序排列，首尾不重复。
    pub contour: Vec<(f64, f64)>,
    /// 多边形中心（网格点放大到原图后的坐标）。
    pub center: (usize, usize),
    /// 目标概率。
    pub prob: f32,
}

impl Instance {
    /// 与StarDist的`details['coord']`相同的布局：第0行为行坐标，第1行为列坐标。
    pub fn coord_rows(&self) -> [Vec<f64>; 2] {
        [
            self.contour.iter().map(|p| p.0).collect(),
            self.contour.iter().map(|p| p.1).collect(),
        ]
    }
}

/// 一次预测的结果。
#[derive(Clone, Debug)]
pub struct Prediction {
    /// `[H, W]`标签图，0为背景，实例`k`的标签为`k + 1`。
    pub labels: Array2<i32>,
    /// 按概率从高到低排列的实例。
    pub instances: Vec<Instance>,
}

impl Prediction {
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// 实例分割模型的抽象。输入为归一化后的`[H, W, C]`图像。
pub trait InstanceSegmenter {
    fn predict_instances(
        &mut self,
        img: ArrayView3<f32>,
        prob_thresh: f32,
        nms_thresh: f32,
    ) -> Result<Prediction>;
}
