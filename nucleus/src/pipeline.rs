//! 检测流水线：逐图像、逐ROI地下载、预处理、推理、重映射并提交标注。
//!
//! 全程单线程顺序执行；任一步骤失败立即终止并向上返回错误。

use crate::cytomine::{AnnotationQuery, AnnotationService, JobStatus, NewAnnotation, RoiAnnotation};
use crate::error::{Error, Result};
use crate::geom::{bounds, parse_wkt, remap_contour, ring_polygon, to_wkt, Origin};
use crate::prep::{flatten_alpha, normalize_percentile, AccTimer};
use crate::prep::improc::rgb_to_array;
use crate::stardist::InstanceSegmenter;
use log::{debug, info, warn};
use ndarray::Array3;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// 待处理的图像集合。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSelection {
    /// 项目中的全部图像。
    All,
    /// 显式给出的图像id（保持顺序，已去重）。
    Ids(Vec<u64>),
}

impl FromStr for ImageSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let mut ids = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let id: u64 = part
                .parse()
                .map_err(|_| format!("`{part}`不是合法的图像id"))?;
            if id == 0 {
                return Err("图像id必须为正整数".to_owned());
            }
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(Self::Ids(ids))
    }
}

/// 一次检测任务的参数。
#[derive(Clone, Debug)]
pub struct DetectionParams {
    pub project: u64,
    pub roi_term: u64,
    pub cell_term: u64,
    pub images: ImageSelection,
    pub norm_perc_low: f64,
    pub norm_perc_high: f64,
    pub prob_thresh: f32,
    pub nms_thresh: f32,
    /// 服务器端任务id；给出时向服务器汇报进度。
    pub job: Option<u64>,
    /// 只检测不提交。
    pub dry_run: bool,
    /// 把每个ROI的标签图保存为npy。
    pub save_labels: bool,
}

/// 运行结果统计。
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub images: usize,
    pub rois: usize,
    pub detections: usize,
    pub submitted: usize,
}

pub struct Pipeline<'a, S, M> {
    service: &'a mut S,
    model: &'a mut M,
    params: &'a DetectionParams,
    working_dir: PathBuf,
    summary: Summary,
    download_timer: AccTimer,
    predict_timer: AccTimer,
    upload_timer: AccTimer,
}

impl<'a, S: AnnotationService, M: InstanceSegmenter> Pipeline<'a, S, M> {
    pub fn new(
        service: &'a mut S,
        model: &'a mut M,
        params: &'a DetectionParams,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            service,
            model,
            params,
            working_dir,
            summary: Summary::default(),
            download_timer: AccTimer::new(),
            predict_timer: AccTimer::new(),
            upload_timer: AccTimer::new(),
        }
    }

    /// 运行整个任务。失败时（若配置了任务id）把任务标记为失败后返回原错误。
    pub fn run(mut self) -> Result<Summary> {
        match self.run_inner() {
            Ok(()) => {
                self.report(JobStatus::Success, 100, "检测完成")?;
                info!(
                    "完成: {}张图像, {}个ROI, 检测到{}个细胞, 提交{}个标注",
                    self.summary.images,
                    self.summary.rois,
                    self.summary.detections,
                    self.summary.submitted
                );
                info!(
                    "耗时: 下载{}ms, 推理{}ms, 上传{}ms",
                    self.download_timer.get_total_ms(),
                    self.predict_timer.get_total_ms(),
                    self.upload_timer.get_total_ms()
                );
                Ok(self.summary)
            }
            Err(e) => {
                if let Err(report_err) = self.report(JobStatus::Failed, 0, &e.to_string()) {
                    warn!("无法将任务标记为失败: {report_err}");
                }
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> Result<()> {
        self.report(JobStatus::Running, 0, "Initialization of the StarDist detection")?;
        let images = self.resolve_images()?;
        info!("待处理图像: {images:?}");
        let total = images.len();
        for (idx, image) in images.into_iter().enumerate() {
            let progress = (idx * 100 / total.max(1)) as u8;
            self.report(
                JobStatus::Running,
                progress,
                &format!("处理图像{image}（{}/{total}）", idx + 1),
            )?;
            self.process_image(image)?;
            self.summary.images += 1;
        }
        Ok(())
    }

    /// 解析待处理的图像id集合。
    pub fn resolve_images(&mut self) -> Result<Vec<u64>> {
        match &self.params.images {
            ImageSelection::Ids(ids) => Ok(ids.clone()),
            ImageSelection::All => {
                let images = self.service.project_images(self.params.project)?;
                for img in images.iter() {
                    debug!(
                        "图像{}: {} ({}x{})",
                        img.id,
                        img.instance_filename.as_deref().unwrap_or("?"),
                        img.width.unwrap_or(0),
                        img.height.unwrap_or(0)
                    );
                }
                Ok(images.into_iter().map(|img| img.id).collect())
            }
        }
    }

    fn process_image(&mut self, image: u64) -> Result<()> {
        let query = AnnotationQuery {
            project: self.params.project,
            term: self.params.roi_term,
            image,
        };
        let rois = self.service.roi_annotations(&query)?;
        info!("图像{image}: {}个ROI", rois.len());
        for roi in rois.iter() {
            self.process_roi(roi)?;
            self.summary.rois += 1;
        }
        Ok(())
    }

    fn roi_dir(&self, roi: &RoiAnnotation) -> PathBuf {
        let mut dir = self.working_dir.clone();
        dir.extend([
            roi.project.to_string(),
            roi.image.to_string(),
            roi.id.to_string(),
        ]);
        dir
    }

    fn process_roi(&mut self, roi: &RoiAnnotation) -> Result<()> {
        let rect = bounds(&parse_wkt(&roi.location)?)
            .ok_or_else(|| Error::Wkt(format!("ROI {}的几何为空", roi.id)))?;
        info!("ROI {}: 包围盒{:?} - {:?}", roi.id, rect.min(), rect.max());
        let origin = Origin::from(rect);

        let mut dir = self.roi_dir(roi);
        fs::create_dir_all(dir.as_path())?;
        dir.push(format!("{}.png", roi.id));
        let png_path = self
            .download_timer
            .measure(|| self.service.dump_roi(roi, dir.as_path()))?;
        dir.pop();

        // 模型不接受透明通道：以alpha为蒙版贴到白色背景上，另存为TIFF
        let flattened = flatten_alpha(&image::open(png_path.as_path())?.to_rgba8());
        dir.push(format!("{}.tif", roi.id));
        flattened.save(dir.as_path())?;
        dir.pop();

        for (tif, raster) in load_rasters(dir.as_path())? {
            debug!("处理栅格{}", tif.display());
            let img = normalize_percentile(
                raster.view(),
                self.params.norm_perc_low,
                self.params.norm_perc_high,
            );
            let model = &mut *self.model;
            let (prob, nms) = (self.params.prob_thresh, self.params.nms_thresh);
            let prediction = self
                .predict_timer
                .measure(|| model.predict_instances(img.view(), prob, nms))?;
            info!("ROI {}: 检测到{}个多边形", roi.id, prediction.len());
            self.summary.detections += prediction.len();

            if self.params.save_labels {
                let stem = tif.file_stem().map(|s| s.to_string_lossy().into_owned());
                dir.push(format!("{}_labels.npy", stem.unwrap_or_else(|| roi.id.to_string())));
                ndarray_npy::write_npy(dir.as_path(), &prediction.labels)?;
                dir.pop();
            }

            let annotations = self.to_annotations(roi, origin, &prediction.instances);
            self.submit(roi, &annotations)?;
        }
        Ok(())
    }

    /// 将局部实例映射为服务器坐标中的新标注。退化多边形会被跳过。
    fn to_annotations(
        &self,
        roi: &RoiAnnotation,
        origin: Origin,
        instances: &[crate::stardist::Instance],
    ) -> Vec<NewAnnotation> {
        instances
            .iter()
            .filter_map(|inst| match ring_polygon(remap_contour(origin, &inst.contour)) {
                Ok(poly) => Some(NewAnnotation {
                    location: to_wkt(&poly),
                    image: roi.image,
                    project: self.params.project,
                    terms: vec![self.params.cell_term],
                }),
                Err(e) => {
                    warn!("ROI {}: 跳过中心位于{:?}的实例: {e}", roi.id, inst.center);
                    None
                }
            })
            .collect()
    }

    fn submit(&mut self, roi: &RoiAnnotation, annotations: &[NewAnnotation]) -> Result<()> {
        if annotations.is_empty() {
            debug!("ROI {}: 没有需要提交的标注", roi.id);
            return Ok(());
        }
        if self.params.dry_run {
            info!("ROI {}: dry-run，跳过提交{}个标注", roi.id, annotations.len());
            return Ok(());
        }
        let service = &mut *self.service;
        let n = self
            .upload_timer
            .measure(|| service.save_annotations(annotations))?;
        info!("ROI {}: 已提交{n}个标注", roi.id);
        self.summary.submitted += n;
        Ok(())
    }

    fn report(&mut self, status: JobStatus, progress: u8, comment: &str) -> Result<()> {
        debug!("[{status:?} {progress}%] {comment}");
        match self.params.job {
            Some(job) => self.service.update_job(job, status, progress, comment),
            None => Ok(()),
        }
    }
}

/// 读取目录下所有TIFF图像（按文件名排序），转为`[H, W, 3]`浮点数组。
pub fn load_rasters(dir: &Path) -> Result<Vec<(PathBuf, Array3<f32>)>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|s| s.eq_ignore_ascii_case("tif") || s.eq_ignore_ascii_case("tiff"))
                .unwrap_or(false)
        })
        .collect();
    if paths.is_empty() {
        return Err(Error::NoRaster(dir.to_path_buf()));
    }
    paths.sort();
    paths
        .into_iter()
        .map(|p| {
            let rgb = image::open(p.as_path())?.to_rgb8();
            Ok((p, rgb_to_array(&rgb)))
        })
        .collect()
}
