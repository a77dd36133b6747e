use crate::error::{Error, Result};
use json::JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

/// 模型目录中`config.json`里推理需要的部分。
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub n_rays: usize,
    /// 输出网格相对输入的下采样步长`(y, x)`。
    pub grid: (usize, usize),
    pub n_channel_in: usize,
    pub unet_n_depth: u32,
    /// U-Net每层池化的大小`(y, x)`。
    pub unet_pool: (usize, usize),
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_rays: 32,
            grid: (1, 1),
            n_channel_in: 1,
            unet_n_depth: 2,
            unet_pool: (2, 2),
        }
    }
}

impl ModelConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map_err(|reason| Error::ModelConfig {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// 解析配置文本。缺失的键取默认值，取值非法时报错。
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let v = json::parse(text).map_err(|e| e.to_string())?;
        let d = Self::default();
        let n_rays = usize_or(&v["n_rays"], d.n_rays, "n_rays")?;
        if n_rays < 3 {
            return Err(format!("n_rays至少为3，实际为{n_rays}"));
        }
        let cfg = Self {
            n_rays,
            grid: pair_or(&v["grid"], d.grid, "grid")?,
            n_channel_in: usize_or(&v["n_channel_in"], d.n_channel_in, "n_channel_in")?,
            unet_n_depth: usize_or(&v["unet_n_depth"], d.unet_n_depth as usize, "unet_n_depth")?
                as u32,
            unet_pool: pair_or(&v["unet_pool"], d.unet_pool, "unet_pool")?,
        };
        if cfg.grid.0 == 0 || cfg.grid.1 == 0 || cfg.unet_pool.0 == 0 || cfg.unet_pool.1 == 0 {
            return Err("grid与unet_pool必须为正".to_owned());
        }
        Ok(cfg)
    }

    /// 输入图像高、宽必须整除的倍数：`pool^depth * grid`。
    pub fn div_by(&self) -> (usize, usize) {
        (
            self.unet_pool.0.pow(self.unet_n_depth) * self.grid.0,
            self.unet_pool.1.pow(self.unet_n_depth) * self.grid.1,
        )
    }
}

/// `thresholds.json`中训练时优化得到的默认阈值。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Thresholds {
    pub prob: f32,
    pub nms: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { prob: 0.5, nms: 0.4 }
    }
}

impl Thresholds {
    /// 读取阈值文件；文件不存在时使用默认值。
    pub fn load_or_default(path: PathBuf) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path.as_path())?;
        let v = json::parse(&text).map_err(|e| Error::ModelConfig {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let d = Self::default();
        Ok(Self {
            prob: v["prob"].as_f32().unwrap_or(d.prob),
            nms: v["nms"].as_f32().unwrap_or(d.nms),
        })
    }
}

fn usize_or(v: &JsonValue, default: usize, key: &str) -> std::result::Result<usize, String> {
    if v.is_null() {
        return Ok(default);
    }
    v.as_usize().ok_or_else(|| format!("`{key}`应为非负整数"))
}

fn pair_or(
    v: &JsonValue,
    default: (usize, usize),
    key: &str,
) -> std::result::Result<(usize, usize), String> {
    if v.is_null() {
        return Ok(default);
    }
    let items: Vec<_> = v.members().filter_map(|m| m.as_usize()).collect();
    match items.as_slice() {
        [a, b] if v.len() == 2 => Ok((*a, *b)),
        _ => Err(format!("`{key}`应为两个非负整数")),
    }
}
