//! 库内统一错误类型。

use std::path::PathBuf;

/// 检测流程中可能出现的错误。任何一步失败都直接向上传递，不做重试。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("图像编解码错误: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP传输错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("服务器返回`{status}`: {method} {url}")]
    Status {
        method: String,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("请求签名失败: {0}")]
    Signature(String),

    #[error("请求头非法: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("JSON解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WKT格式错误: {0}")]
    Wkt(String),

    #[error("几何图形无效: {0}")]
    Geometry(String),

    #[error("模型配置`{path}`错误: {reason}")]
    ModelConfig { path: PathBuf, reason: String },

    #[error("模型输出不符合预期: {0}")]
    ModelOutput(String),

    #[error("ONNX Runtime错误: {0}")]
    Ort(#[from] ort::Error),

    #[error("npy写入错误: {0}")]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("目录`{0}`中没有可处理的TIFF图像")]
    NoRaster(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
