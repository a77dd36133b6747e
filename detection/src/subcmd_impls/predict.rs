use super::utils::{origin_pair, percentile_legal_range, threshold_legal_range};
use anyhow::{ensure, Context};
use clap::Args;
use json::JsonValue;
use log::{info, warn};
use nucleus::geom::{remap_contour, ring_polygon, to_wkt, Origin};
use nucleus::prep::improc::rgb_to_array;
use nucleus::prep::{flatten_alpha, normalize_percentile};
use nucleus::stardist::{Instance, InstanceSegmenter, StarDist2D};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Predict {
    /// 输入图像（PNG或TIFF，透明区域视为白色）。
    #[arg(long = "input", short)]
    input: PathBuf,
    /// 输出目录。
    #[arg(long = "output-dir", short)]
    out_dir: PathBuf,
    /// 模型根目录。
    #[arg(long = "model-dir", default_value = "/models")]
    model_dir: PathBuf,
    /// 模型名（模型根目录下的子目录）。
    #[arg(long = "model-name", default_value = "2D_versatile_HE")]
    model_name: String,
    /// 归一化的下百分位。
    #[arg(long = "norm-perc-low", default_value_t = 1.0, value_parser = percentile_legal_range)]
    norm_perc_low: f64,
    /// 归一化的上百分位。
    #[arg(long = "norm-perc-high", default_value_t = 99.8, value_parser = percentile_legal_range)]
    norm_perc_high: f64,
    /// 目标概率阈值（默认取模型的thresholds.json）。
    #[arg(long = "prob-t", value_parser = threshold_legal_range)]
    prob_t: Option<f32>,
    /// 非极大值抑制阈值（默认取模型的thresholds.json）。
    #[arg(long = "nms-t", value_parser = threshold_legal_range)]
    nms_t: Option<f32>,
    /// 图像左上角在服务器坐标系中的位置`minx,maxy`；给出时额外输出WKT。
    #[arg(long, value_parser = origin_pair)]
    origin: Option<Origin>,
}

impl Predict {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input image] -> [output-dir/{stem}_labels.npy, output-dir/{stem}.json]
        ensure!(self.input.is_file(), "`{}`不是文件", self.input.display());
        ensure!(
            self.norm_perc_low < self.norm_perc_high,
            "下百分位({})必须小于上百分位({})",
            self.norm_perc_low,
            self.norm_perc_high
        );
        fs::create_dir_all(self.out_dir.as_path())?;

        let mut model = StarDist2D::new(self.model_dir.as_path(), &self.model_name)
            .context("无法加载模型")?;
        info!("模型`{}`: {:?}", model.name(), model.config());
        let defaults = model.thresholds();
        let prob_t = self.prob_t.unwrap_or(defaults.prob);
        let nms_t = self.nms_t.unwrap_or(defaults.nms);
        info!("阈值: prob={prob_t}, nms={nms_t}");

        let rgba = image::open(self.input.as_path())
            .with_context(|| format!("无法读取`{}`", self.input.display()))?
            .to_rgba8();
        let raster = rgb_to_array(&flatten_alpha(&rgba));
        let img = normalize_percentile(raster.view(), self.norm_perc_low, self.norm_perc_high);
        let prediction = model.predict_instances(img.view(), prob_t, nms_t)?;
        info!("检测到{}个多边形", prediction.len());

        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_owned());

        self.out_dir.push(format!("{stem}_labels.npy"));
        ndarray_npy::write_npy(self.out_dir.as_path(), &prediction.labels)?;
        self.out_dir.pop();

        let instances: Vec<JsonValue> = prediction
            .instances
            .iter()
            .map(|inst| instance_json(inst, self.origin))
            .collect();
        let mut doc = JsonValue::new_object();
        doc["image"] = self.input.display().to_string().into();
        doc["prob_thresh"] = prob_t.into();
        doc["nms_thresh"] = nms_t.into();
        doc["count"] = instances.len().into();
        doc["instances"] = instances.into();
        self.out_dir.push(format!("{stem}.json"));
        fs::write(self.out_dir.as_path(), doc.pretty(2))?;
        info!("结果已写入{}", self.out_dir.display());
        self.out_dir.pop();
        Ok(())
    }
}

fn instance_json(inst: &Instance, origin: Option<Origin>) -> JsonValue {
    let [rows, cols] = inst.coord_rows();
    let mut v = JsonValue::new_object();
    v["prob"] = inst.prob.into();
    v["center"] = json::array![inst.center.0, inst.center.1];
    v["coord"] = json::array![rows, cols];
    if let Some(origin) = origin {
        match ring_polygon(remap_contour(origin, &inst.contour)) {
            Ok(poly) => v["wkt"] = to_wkt(&poly).into(),
            Err(e) => warn!("中心位于{:?}的实例无法构成多边形: {e}", inst.center),
        }
    }
    v
}
