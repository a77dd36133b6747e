use super::config::{ModelConfig, Thresholds};
use super::postprocess::{candidates_from_maps, non_maximum_suppression};
use super::{Instance, InstanceSegmenter, Prediction};
use crate::error::{Error, Result};
use crate::prep::{reflect_pad, render_labels};
use log::{debug, info};
use ndarray::{Array2, Array3, ArrayView3, Axis};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};

/// 导出为ONNX的StarDist 2D模型。
///
/// 模型目录`{basedir}/{name}/`中需要有`model.onnx`与`config.json`，`thresholds.json`可选。
/// 网络输入为`[1, H, W, C]`，输出为概率`[1, H/g, W/g, 1]`与距离`[1, H/g, W/g, n_rays]`两个张量，
/// 或者二者在通道维拼接后的单个张量。
pub struct StarDist2D {
    name: String,
    config: ModelConfig,
    thresholds: Thresholds,
    session: Session,
}

impl StarDist2D {
    pub fn new<P: AsRef<Path>>(basedir: P, name: &str) -> Result<Self> {
        let mut dir = PathBuf::from(basedir.as_ref());
        dir.push(name);

        dir.push("config.json");
        let config = ModelConfig::load(dir.as_path())?;
        dir.pop();

        dir.push("thresholds.json");
        let thresholds = Thresholds::load_or_default(dir.clone())?;
        dir.pop();

        dir.push("model.onnx");
        info!("加载模型`{}`: {}", name, dir.display());
        let session = Session::builder()?.commit_from_file(dir.as_path())?;

        debug!("模型配置: {config:?}, 默认阈值: {thresholds:?}");
        Ok(Self {
            name: name.to_owned(),
            config,
            thresholds,
            session,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// 训练时优化得到的阈值。
    #[inline]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// 运行网络，返回概率图`[h', w']`与距离图`[h', w', n_rays]`。
    fn run_network(&mut self, padded: &Array3<f32>) -> Result<(Array2<f32>, Array3<f32>)> {
        let (h, w, c) = padded.dim();
        let data: Vec<f32> = padded.iter().copied().collect();
        let input = TensorRef::from_array_view(([1usize, h, w, c], data.as_slice()))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let (shape, values) = outputs[i].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            tensors.push((dims, values.to_vec()));
        }
        split_outputs(tensors, self.config.n_rays)
    }
}

/// 把网络输出拆为概率图`[h', w']`与距离图`[h', w', n_rays]`。
///
/// 接受两种布局：两个张量`[1, h', w', 1]`与`[1, h', w', n_rays]`；
/// 或者通道维拼接后的单个张量`[1, h', w', 1 + n_rays]`，第0通道为概率。
fn split_outputs(
    tensors: Vec<(Vec<usize>, Vec<f32>)>,
    n_rays: usize,
) -> Result<(Array2<f32>, Array3<f32>)> {
    let n = tensors.len();
    let mut it = tensors.into_iter();
    match (it.next(), it.next(), n) {
        (Some((ps, pv)), Some((ds, dv)), 2) => {
            let prob = to_grid(&ps, pv, 1)?.index_axis_move(Axis(2), 0);
            let dist = to_grid(&ds, dv, n_rays)?;
            if prob.dim() != (dist.dim().0, dist.dim().1) {
                return Err(Error::ModelOutput(format!(
                    "概率图{:?}与距离图{:?}的网格大小不一致",
                    prob.dim(),
                    dist.dim()
                )));
            }
            Ok((prob, dist))
        }
        (Some((s, v)), None, 1) => {
            let both = to_grid(&s, v, n_rays + 1)?;
            let prob = both.index_axis(Axis(2), 0).to_owned();
            let dist = both.slice(ndarray::s![.., .., 1..]).to_owned();
            Ok((prob, dist))
        }
        _ => Err(Error::ModelOutput(format!("期望1或2个输出张量，实际为{n}"))),
    }
}

/// 把`[1, h', w', channels]`的扁平输出整理为`[h', w', channels]`。
fn to_grid(dims: &[usize], values: Vec<f32>, channels: usize) -> Result<Array3<f32>> {
    match dims {
        [1, h, w, ch] if *ch == channels => Ok(Array3::from_shape_vec((*h, *w, *ch), values)?),
        _ => Err(Error::ModelOutput(format!(
            "输出形状{dims:?}与期望的[1, h, w, {channels}]不符"
        ))),
    }
}

impl InstanceSegmenter for StarDist2D {
    fn predict_instances(
        &mut self,
        img: ArrayView3<f32>,
        prob_thresh: f32,
        nms_thresh: f32,
    ) -> Result<Prediction> {
        let (h, w, c) = img.dim();
        if c != self.config.n_channel_in {
            return Err(Error::ModelOutput(format!(
                "模型需要{}个输入通道，图像有{c}个",
                self.config.n_channel_in
            )));
        }
        let (padded, pad) = reflect_pad(img, self.config.div_by());
        debug!("输入{h}x{w}，填充({}, {})", pad.0, pad.1);

        let (prob, dist) = self.run_network(&padded)?;
        let candidates =
            candidates_from_maps(prob.view(), dist.view(), self.config.grid, (h, w), prob_thresh);
        debug!("候选点个数: {}", candidates.len());

        let instances: Vec<Instance> = non_maximum_suppression(candidates, nms_thresh)
            .into_iter()
            .map(|c| c.into_instance())
            .collect();
        let contours: Vec<Vec<(f64, f64)>> =
            instances.iter().map(|i| i.contour.clone()).collect();
        let labels = render_labels(h, w, &contours);
        Ok(Prediction { labels, instances })
    }
}
