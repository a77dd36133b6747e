use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crate::error::{Error, Result};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// 服务器API密钥对。
#[derive(Clone)]
pub struct Credentials {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .finish()
    }
}

impl Credentials {
    /// 生成`Authorization`请求头的值。
    pub fn authorization(
        &self,
        method: &str,
        content_type: &str,
        date: &str,
        path: &str,
    ) -> Result<String> {
        let signature = sign(&self.private_key, method, content_type, date, path)?;
        Ok(format!("CYTOMINE {}:{}", self.public_key, signature))
    }
}

/// 对`METHOD\nCONTENT-MD5\nCONTENT-TYPE\nDATE\nPATH`做HMAC-SHA1并以Base64编码。
/// CONTENT-MD5始终为空。
pub fn sign(
    private_key: &str,
    method: &str,
    content_type: &str,
    date: &str,
    path: &str,
) -> Result<String> {
    let message = format!("{method}\n\n{content_type}\n{date}\n{path}");
    let mut mac = <Hmac<Sha1> as KeyInit>::new_from_slice(private_key.as_bytes())
        .map_err(|e| Error::Signature(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
