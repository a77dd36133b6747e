use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "detection")]
#[command(about = "在Cytomine的ROI上用StarDist检测细胞核并回传标注的工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> anyhow::Result<()> {
        match self.command {
            Commands::Detect(ref mut v) => v.run(),
            Commands::Predict(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 对服务器上指定图像的所有ROI做检测，并把细胞轮廓作为标注提交。
    Detect(crate::subcmd_impls::detect::Detect),
    /// 离线地对本地图像做检测，输出标签图与多边形。
    Predict(crate::subcmd_impls::predict::Predict),
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_detect_args() {
        let cli = Cli::try_parse_from([
            "detection",
            "detect",
            "--cytomine-host",
            "localhost",
            "--cytomine-public-key",
            "pub",
            "--cytomine-private-key",
            "priv",
            "--cytomine-id-project",
            "1",
            "--cytomine-id-roi-term",
            "2",
            "--cytomine-id-images",
            "3,4",
            "--cytomine-id-cell-term",
            "5",
        ]);
        assert!(cli.is_ok(), "{cli:?}");
    }

    #[test]
    fn test_detect_rejects_bad_thresholds() {
        let base = [
            "detection",
            "detect",
            "--cytomine-host",
            "localhost",
            "--cytomine-public-key",
            "pub",
            "--cytomine-private-key",
            "priv",
            "--cytomine-id-project",
            "1",
            "--cytomine-id-roi-term",
            "2",
            "--cytomine-id-images",
            "all",
            "--cytomine-id-cell-term",
            "5",
        ];
        let with = |extra: &[&str]| {
            let mut v: Vec<&str> = base.to_vec();
            v.extend_from_slice(extra);
            Cli::try_parse_from(v)
        };
        assert!(with(&["--stardist-prob-t", "1.5"]).is_err());
        assert!(with(&["--stardist-nms-t", "-0.1"]).is_err());
        assert!(with(&["--stardist-norm-perc-high", "101"]).is_err());
        assert!(with(&["--stardist-prob-t", "0.6", "--dry-run"]).is_ok());
    }
}
