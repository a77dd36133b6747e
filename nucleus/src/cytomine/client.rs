use super::auth::Credentials;
use super::models::{
    AnnotationQuery, Collection, ImageInstance, JobStatus, NewAnnotation, RoiAnnotation,
};
use super::AnnotationService;
use crate::error::{Error, Result};
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const JSON: &str = "application/json";

/// 带签名的阻塞式HTTP客户端。
pub struct CytomineClient {
    base_url: String,
    credentials: Credentials,
    http: Client,
}

impl CytomineClient {
    /// `host`可以带或不带协议前缀，不带时默认使用https。
    pub fn connect(host: &str, credentials: Credentials) -> Result<Self> {
        let host = host.trim().trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        let http = Client::builder()
            .user_agent(concat!("nucleus/", env!("CARGO_PKG_VERSION")))
            .build()?;
        info!("连接Cytomine服务器: {base_url}");
        Ok(Self {
            base_url,
            credentials,
            http,
        })
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn headers(&self, method: &Method, content_type: &str, path: &str) -> Result<HeaderMap> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let auth = self
            .credentials
            .authorization(method.as_str(), content_type, &date, path)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        headers.insert(DATE, header_value(&date)?);
        headers.insert("datefull", header_value(&date)?);
        headers.insert(AUTHORIZATION, header_value(&auth)?);
        if !content_type.is_empty() {
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }
        Ok(headers)
    }

    /// 发送签名请求；非2xx状态视为错误。`path`以`/api/`开头并可带查询串。
    fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Response> {
        let content_type = if body.is_some() { JSON } else { "" };
        let headers = self.headers(&method, content_type, path)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");
        let mut req = self.http.request(method.clone(), url.as_str()).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }
        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(Error::Status {
                method: method.to_string(),
                url,
                status: resp.status(),
            });
        }
        Ok(resp)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.send(Method::GET, path, None)?.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[inline]
fn header_value(s: &str) -> Result<HeaderValue> {
    Ok(HeaderValue::from_str(s)?)
}

impl AnnotationService for CytomineClient {
    fn project_images(&mut self, project: u64) -> Result<Vec<ImageInstance>> {
        let path = format!("/api/project/{project}/imageinstance.json");
        Ok(self.get_json::<Collection<ImageInstance>>(&path)?.into_vec())
    }

    fn roi_annotations(&mut self, query: &AnnotationQuery) -> Result<Vec<RoiAnnotation>> {
        let path = format!("/api/annotation.json?{}", query.to_query_string());
        Ok(self.get_json::<Collection<RoiAnnotation>>(&path)?.into_vec())
    }

    fn dump_roi(&mut self, roi: &RoiAnnotation, dest: &Path) -> Result<PathBuf> {
        let path = format!("/api/annotation/{}/crop.png?mask=true&alphaMask=true", roi.id);
        let bytes = self.send(Method::GET, &path, None)?.bytes()?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &bytes)?;
        debug!("ROI {} 裁剪图已写入{}（{}字节）", roi.id, dest.display(), bytes.len());
        Ok(dest.to_path_buf())
    }

    fn save_annotations(&mut self, annotations: &[NewAnnotation]) -> Result<usize> {
        if annotations.is_empty() {
            return Ok(0);
        }
        let body = serde_json::to_vec(annotations)?;
        self.send(Method::POST, "/api/annotation.json", Some(body))?;
        Ok(annotations.len())
    }

    fn update_job(
        &mut self,
        job: u64,
        status: JobStatus,
        progress: u8,
        comment: &str,
    ) -> Result<()> {
        let body = serde_json::to_vec(&serde_json::json!({
            "id": job,
            "status": status.code(),
            "progress": progress.min(100),
            "statusComment": comment,
        }))?;
        self.send(Method::PUT, &format!("/api/job/{job}.json"), Some(body))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            public_key: "pub".to_owned(),
            private_key: "priv".to_owned(),
        }
    }

    #[test]
    fn test_connect_normalizes_host() {
        let c = CytomineClient::connect("research.cytomine.be/", creds()).unwrap();
        assert_eq!(c.base_url(), "https://research.cytomine.be");
        let c = CytomineClient::connect(" http://localhost:8080 ", creds()).unwrap();
        assert_eq!(c.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_headers_signed() {
        let c = CytomineClient::connect("localhost", creds()).unwrap();
        let h = c
            .headers(&Method::POST, JSON, "/api/annotation.json")
            .unwrap();
        let auth = h.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(auth.starts_with("CYTOMINE pub:"));
        assert_eq!(h.get(CONTENT_TYPE).unwrap(), JSON);
        assert!(h.get(DATE).unwrap().to_str().unwrap().ends_with("GMT"));
        let h = c.headers(&Method::GET, "", "/api/annotation.json").unwrap();
        assert!(h.get(CONTENT_TYPE).is_none());
    }
}
