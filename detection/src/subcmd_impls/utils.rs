use nucleus::geom::Origin;
use std::path::PathBuf;

/// 百分位必须落在`[0, 100]`内。
pub fn percentile_legal_range(s: &str) -> Result<f64, String> {
    let p: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal percentile"))?;
    if !(0.0..=100.0).contains(&p) {
        return Err(format!("percentile should be in range [0, 100], but got `{p}`"));
    }
    Ok(p)
}

/// 概率与NMS阈值必须落在`[0, 1]`内。
pub fn threshold_legal_range(s: &str) -> Result<f32, String> {
    let t: f32 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal threshold"))?;
    if !(0.0..=1.0).contains(&t) {
        return Err(format!("threshold should be in range [0, 1], but got `{t}`"));
    }
    Ok(t)
}

/// 解析`minx,maxy`形式的ROI左上角服务器坐标。
pub fn origin_pair(s: &str) -> Result<Origin, String> {
    const ERR: &str = "原点格式应为`minx,maxy`";
    let mut it = s.split(',').map(|v| v.trim().parse::<f64>());
    match (it.next(), it.next(), it.next()) {
        (Some(Ok(minx)), Some(Ok(maxy)), None) if minx.is_finite() && maxy.is_finite() => {
            Ok(Origin::new(minx, maxy))
        }
        _ => Err(ERR.to_owned()),
    }
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const HOME_VAR: &str = "USERPROFILE";
    } else {
        const HOME_VAR: &str = "HOME";
    }
}

/// 工作目录的默认值：用户主目录。
pub fn default_working_dir() -> PathBuf {
    std::env::var_os(HOME_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}
