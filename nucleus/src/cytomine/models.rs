use serde::{Deserialize, Serialize};

/// 项目中的一张图像。
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInstance {
    pub id: u64,
    #[serde(default)]
    pub project: Option<u64>,
    #[serde(default)]
    pub instance_filename: Option<String>,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
}

/// 服务器上已有的ROI标注。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RoiAnnotation {
    pub id: u64,
    pub image: u64,
    pub project: u64,
    /// 服务器坐标系中的WKT几何。
    pub location: String,
}

/// 待提交的新标注。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewAnnotation {
    pub location: String,
    pub image: u64,
    pub project: u64,
    #[serde(rename = "term", skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<u64>,
}

/// 标注列表的过滤条件。
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AnnotationQuery {
    pub project: u64,
    pub term: u64,
    pub image: u64,
}

impl AnnotationQuery {
    /// 作为URL查询参数。总是要求返回WKT。
    pub fn to_query_string(&self) -> String {
        format!(
            "project={}&term={}&image={}&showWKT=true&showTerm=true",
            self.project, self.term, self.image
        )
    }
}

/// 任务状态码。
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    NotLaunch = 0,
    InQueue = 1,
    Running = 2,
    Success = 3,
    Failed = 4,
    Indeterminate = 5,
    Wait = 6,
    Previewed = 7,
    Killed = 8,
}

impl JobStatus {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// 服务器返回的列表：新版本包在`collection`字段中，旧版本直接是数组。
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Collection<T> {
    Wrapped { collection: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Collection<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Collection::Wrapped { collection } => collection,
            Collection::Bare(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_both_forms() {
        let wrapped = r#"{"collection": [{"id": 7, "image": 1, "project": 2,
            "location": "POINT (1 2)", "term": [5]}], "size": 1}"#;
        let bare = r#"[{"id": 7, "image": 1, "project": 2, "location": "POINT (1 2)"}]"#;
        let a: Vec<RoiAnnotation> = serde_json::from_str::<Collection<_>>(wrapped)
            .unwrap()
            .into_vec();
        let b: Vec<RoiAnnotation> = serde_json::from_str::<Collection<_>>(bare)
            .unwrap()
            .into_vec();
        assert_eq!(a, b);
        assert_eq!(a[0].id, 7);
    }

    #[test]
    fn test_image_instance_camel_case() {
        let s = r#"{"id": 3, "project": 9, "instanceFilename": "slide.svs",
            "width": 1000, "height": 800, "magnification": 40}"#;
        let img: ImageInstance = serde_json::from_str(s).unwrap();
        assert_eq!(img.instance_filename.as_deref(), Some("slide.svs"));
        assert_eq!(img.width, Some(1000));
    }

    #[test]
    fn test_new_annotation_json() {
        let a = NewAnnotation {
            location: "POLYGON ((0 0, 1 0, 1 1, 0 0))".to_owned(),
            image: 11,
            project: 22,
            terms: vec![33],
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["term"], serde_json::json!([33]));
        assert_eq!(v["image"], 11);
        let a = NewAnnotation { terms: vec![], ..a };
        assert!(serde_json::to_value(&a).unwrap().get("term").is_none());
    }

    #[test]
    fn test_query_string() {
        let q = AnnotationQuery {
            project: 1,
            term: 2,
            image: 3,
        };
        assert_eq!(
            q.to_query_string(),
            "project=1&term=2&image=3&showWKT=true&showTerm=true"
        );
    }

    #[test]
    fn test_job_status_codes() {
        assert_eq!(JobStatus::Running.code(), 2);
        assert_eq!(JobStatus::Success.code(), 3);
        assert_eq!(JobStatus::Failed.code(), 4);
    }
}
