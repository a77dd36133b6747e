use super::utils::{default_working_dir, percentile_legal_range, threshold_legal_range};
use anyhow::{ensure, Context};
use clap::Args;
use log::info;
use nucleus::cytomine::{Credentials, CytomineClient};
use nucleus::pipeline::{DetectionParams, ImageSelection, Pipeline};
use nucleus::stardist::StarDist2D;
use std::fs;
use std::mem;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Detect {
    /// Cytomine服务器地址。
    #[arg(long = "cytomine-host", env = "CYTOMINE_HOST")]
    host: String,
    /// API公钥。
    #[arg(long = "cytomine-public-key", env = "CYTOMINE_PUBLIC_KEY")]
    public_key: String,
    /// API私钥。
    #[arg(long = "cytomine-private-key", env = "CYTOMINE_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,
    /// 项目id。
    #[arg(long = "cytomine-id-project")]
    project: u64,
    /// ROI标注所用的术语id。
    #[arg(long = "cytomine-id-roi-term")]
    roi_term: u64,
    /// 待处理的图像：`all`或以逗号分隔的图像id。
    #[arg(long = "cytomine-id-images")]
    images: ImageSelection,
    /// 赋给检测出的细胞标注的术语id。
    #[arg(long = "cytomine-id-cell-term")]
    cell_term: u64,
    /// 服务器端任务id；给出时向服务器汇报进度。
    #[arg(long = "cytomine-id-job")]
    job: Option<u64>,
    /// 归一化的下百分位。
    #[arg(long = "stardist-norm-perc-low", default_value_t = 1.0, value_parser = percentile_legal_range)]
    norm_perc_low: f64,
    /// 归一化的上百分位。
    #[arg(long = "stardist-norm-perc-high", default_value_t = 99.8, value_parser = percentile_legal_range)]
    norm_perc_high: f64,
    /// 目标概率阈值。
    #[arg(long = "stardist-prob-t", default_value_t = 0.5, value_parser = threshold_legal_range)]
    prob_t: f32,
    /// 非极大值抑制的重叠阈值。
    #[arg(long = "stardist-nms-t", default_value_t = 0.5, value_parser = threshold_legal_range)]
    nms_t: f32,
    /// 模型根目录。
    #[arg(long = "model-dir", default_value = "/models")]
    model_dir: PathBuf,
    /// 模型名（模型根目录下的子目录）。
    #[arg(long = "model-name", default_value = "2D_versatile_HE")]
    model_name: String,
    /// 工作目录，ROI图像与中间结果保存在其下。
    #[arg(long = "working-dir", short = 'D', default_value_os_t = default_working_dir())]
    working_dir: PathBuf,
    /// 只检测，不提交标注。
    #[arg(long)]
    dry_run: bool,
    /// 将每个ROI的标签图保存为npy文件。
    #[arg(long)]
    save_labels: bool,
}

impl Detect {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [server ROIs] -> [working-dir/{job}/{project}/{image}/{roi}/*] -> [server annotations]
        ensure!(
            self.norm_perc_low < self.norm_perc_high,
            "下百分位({})必须小于上百分位({})",
            self.norm_perc_low,
            self.norm_perc_high
        );

        let credentials = Credentials {
            public_key: mem::take(&mut self.public_key),
            private_key: mem::take(&mut self.private_key),
        };
        let mut client = CytomineClient::connect(&self.host, credentials)
            .with_context(|| format!("无法连接服务器`{}`", self.host))?;

        let mut model = StarDist2D::new(self.model_dir.as_path(), &self.model_name)
            .with_context(|| {
                format!(
                    "无法加载模型`{}`",
                    self.model_dir.join(&self.model_name).display()
                )
            })?;
        info!("使用模型`{}`", model.name());

        match self.job {
            Some(job) => self.working_dir.push(job.to_string()),
            None => self.working_dir.push("local"),
        }
        fs::create_dir_all(self.working_dir.as_path())
            .with_context(|| format!("无法创建工作目录`{}`", self.working_dir.display()))?;
        info!("工作目录: {}", self.working_dir.display());

        let params = DetectionParams {
            project: self.project,
            roi_term: self.roi_term,
            cell_term: self.cell_term,
            images: self.images.clone(),
            norm_perc_low: self.norm_perc_low,
            norm_perc_high: self.norm_perc_high,
            prob_thresh: self.prob_t,
            nms_thresh: self.nms_t,
            job: self.job,
            dry_run: self.dry_run,
            save_labels: self.save_labels,
        };
        let summary = Pipeline::new(
            &mut client,
            &mut model,
            &params,
            mem::take(&mut self.working_dir),
        )
        .run()
        .context("检测任务失败")?;

        info!(
            "共处理{}张图像、{}个ROI，提交{}个标注",
            summary.images, summary.rois, summary.submitted
        );
        Ok(())
    }
}
