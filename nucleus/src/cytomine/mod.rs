//! Cytomine标注服务器的访问。
//!
//! 流水线只依赖[`AnnotationService`]；[`CytomineClient`]是基于签名HTTP请求的实现。

mod auth;
mod client;
mod models;

pub use auth::{sign, Credentials};
pub use client::CytomineClient;
pub use models::{AnnotationQuery, ImageInstance, JobStatus, NewAnnotation, RoiAnnotation};

use crate::error::Result;
use std::path::{Path, PathBuf};

/// 远程标注服务的抽象。
pub trait AnnotationService {
    /// 项目中的所有图像实例。
    fn project_images(&mut self, project: u64) -> Result<Vec<ImageInstance>>;

    /// 按项目、术语、图像过滤的标注（带WKT几何）。
    fn roi_annotations(&mut self, query: &AnnotationQuery) -> Result<Vec<RoiAnnotation>>;

    /// 下载带透明蒙版的ROI裁剪图（PNG）到`dest`，返回写入的路径。
    fn dump_roi(&mut self, roi: &RoiAnnotation, dest: &Path) -> Result<PathBuf>;

    /// 以一次请求批量提交标注，返回提交的个数。
    fn save_annotations(&mut self, annotations: &[NewAnnotation]) -> Result<usize>;

    /// 更新任务状态与进度（0..=100）。
    fn update_job(&mut self, job: u64, status: JobStatus, progress: u8, comment: &str)
        -> Result<()>;
}
