//! vcd_gateway_ssl_certificate: 网关 SSL 证书
//!
//! - state: present / absent
//! - operation: list_certificates
//!
//! 证书按 `certificate_name` 识别：上传时写入证书描述，查找时匹配证书名称或描述。

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::ModuleContext;
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateOperation {
    ListCertificates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateParams {
    pub gateway: String,

    pub vdc: String,

    pub certificate_name: String,

    /// PEM 内容
    #[serde(default)]
    pub certificate: Option<String>,

    /// PEM 文件路径
    #[serde(default)]
    pub certificate_file: Option<String>,

    #[serde(default)]
    pub private_key: Option<String>,

    #[serde(default)]
    pub private_key_file: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<CertificateOperation>,
}

pub struct CertificateOps<'a> {
    client: &'a VcdClient,
    gateway_href: String,
}

#[async_trait]
impl<'a> ResourceOps for CertificateOps<'a> {
    type Descriptor = CertificateParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Certificate"
    }

    fn key(&self, params: &CertificateParams) -> String {
        params.certificate_name.clone()
    }

    async fn lookup(&self, params: &CertificateParams) -> Result<Lookup<String>> {
        let certificates = self.client.gateway().certificates(&self.gateway_href).await?;
        Ok(certificates
            .iter()
            .find(|c| is_named(c, &params.certificate_name))
            .and_then(|c| c["objectId"].as_str().map(str::to_string))
            .into())
    }

    async fn create(&self, params: &CertificateParams) -> Result<Submitted> {
        let pem = read_pem(&params.certificate, &params.certificate_file, "certificate")
            .await?
            .ok_or_else(|| ExecutorError::MissingParam("certificate 或 certificate_file".to_string()))?;
        let private_key = read_pem(&params.private_key, &params.private_key_file, "private_key").await?;

        let mut body = json!({
            "pemEncoding": pem,
            "description": params.certificate_name,
        });
        if let Some(key) = private_key {
            body["privateKey"] = json!(key);
        }
        Ok(self.client.gateway().add_certificate(&self.gateway_href, body).await?.into())
    }

    async fn delete(&self, object_id: &String, _params: &CertificateParams) -> Result<Submitted> {
        Ok(self.client.gateway().delete_certificate(object_id).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: CertificateParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let gateway_href = ctx.gateway_href(&vdc_href, &params.gateway).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = CertificateOps { client: ctx.client, gateway_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(CertificateOperation::ListCertificates) => {
            let certificates = ctx.client.gateway().certificates(&gateway_href).await?;
            let listing: Vec<serde_json::Value> = certificates
                .iter()
                .map(|c| {
                    json!({
                        "id": c["objectId"],
                        "name": c["name"],
                        "description": c["description"],
                        "expiry": c["x509Certificate"]["notAfter"],
                    })
                })
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

fn is_named(certificate: &serde_json::Value, name: &str) -> bool {
    certificate["name"].as_str() == Some(name) || certificate["description"].as_str() == Some(name)
}

/// 内联内容优先，其次读取文件
async fn read_pem(inline: &Option<String>, file: &Option<String>, what: &str) -> Result<Option<String>> {
    if let Some(content) = inline.as_ref().filter(|c| !c.is_empty()) {
        return Ok(Some(content.clone()));
    }
    match file {
        Some(path) => {
            let content = tokio::fs::read_to_string(Path::new(path)).await.map_err(|e| {
                ExecutorError::InvalidParams(format!("读取 {} 文件 {} 失败: {}", what, path, e))
            })?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_named() {
        let cert = json!({ "objectId": "certificate-1", "name": "*.example.com", "description": "web-cert" });
        assert!(is_named(&cert, "web-cert"));
        assert!(is_named(&cert, "*.example.com"));
        assert!(!is_named(&cert, "other"));
    }

    #[tokio::test]
    async fn test_read_pem_prefers_inline() {
        let pem = read_pem(&Some("-----BEGIN CERTIFICATE-----".into()), &Some("/nonexistent".into()), "certificate")
            .await
            .unwrap();
        assert_eq!(pem.as_deref(), Some("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn test_read_pem_missing_file() {
        let err = read_pem(&None, &Some("/nonexistent/cert.pem".into()), "certificate")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidParams(_)));
        assert!(read_pem(&None, &None, "certificate").await.unwrap().is_none());
    }
}
