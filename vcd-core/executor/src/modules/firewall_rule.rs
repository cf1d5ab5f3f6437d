//! vcd_gateway_firewall_rule: 网关防火墙规则
//!
//! - state: present / update / absent，一次可处理多条规则
//! - operation: list_rules
//!
//! 规则按名称识别。创建失败时删除可能已写入的规则。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{merge, VcdClient};

use crate::modules::{compact, ModuleContext};
use crate::params::{self, lenient_bool, lenient_string, Action};
use crate::reconciler::{Lookup, ResourceOps, RollbackPolicy, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallOperation {
    ListRules,
}

/// 防火墙服务（协议 + 端口）
#[derive(Debug, Clone, Deserialize)]
pub struct FirewallService {
    pub protocol: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub port: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub source_port: Option<String>,
}

/// 单条防火墙规则
#[derive(Debug, Clone, Deserialize)]
pub struct FirewallRule {
    pub name: String,

    /// accept / deny
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub logging_enabled: Option<bool>,

    #[serde(default)]
    pub source: Option<Vec<String>>,

    #[serde(default)]
    pub destination: Option<Vec<String>>,

    #[serde(default)]
    pub service: Option<Vec<FirewallService>>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallParams {
    pub gateway: String,

    pub vdc: String,

    #[serde(default, alias = "fw_rules")]
    pub rules: Vec<FirewallRule>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<FirewallOperation>,
}

pub struct FirewallRuleOps<'a> {
    client: &'a VcdClient,
    gateway_href: String,
}

#[async_trait]
impl<'a> ResourceOps for FirewallRuleOps<'a> {
    type Descriptor = FirewallRule;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Firewall rule(s)"
    }

    fn key(&self, rule: &FirewallRule) -> String {
        rule.name.clone()
    }

    async fn lookup(&self, rule: &FirewallRule) -> Result<Lookup<serde_json::Value>> {
        let rules = self.client.gateway().firewall_rules(&self.gateway_href).await?;
        Ok(rules
            .into_iter()
            .find(|r| r["name"].as_str() == Some(rule.name.as_str()))
            .into())
    }

    async fn create(&self, rule: &FirewallRule) -> Result<Submitted> {
        let body = rule_body(rule)?;
        Ok(self.client.gateway().add_firewall_rule(&self.gateway_href, body).await?.into())
    }

    async fn update(&self, existing: &serde_json::Value, rule: &FirewallRule) -> Result<Submitted> {
        let id = rule_id(existing)?;
        let mut updated = existing.clone();
        merge(&mut updated, rule_body(rule)?);
        Ok(self.client.gateway()
            .update_firewall_rule(&self.gateway_href, &id, updated)
            .await?
            .into())
    }

    async fn delete(&self, existing: &serde_json::Value, _rule: &FirewallRule) -> Result<Submitted> {
        let id = rule_id(existing)?;
        Ok(self.client.gateway().delete_firewall_rule(&self.gateway_href, &id).await?.into())
    }

    fn rollback_policy(&self) -> RollbackPolicy {
        RollbackPolicy::DeleteOnFailure
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: FirewallParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let gateway_href = ctx.gateway_href(&vdc_href, &params.gateway).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = FirewallRuleOps { client: ctx.client, gateway_href };
            ctx.reconciler().apply_all(&ops, &params.rules, state).await
        }
        Action::Operation(FirewallOperation::ListRules) => {
            let rules = ctx.client.gateway().firewall_rules(&gateway_href).await?;
            let listing: Vec<serde_json::Value> = rules
                .iter()
                .map(|r| {
                    json!({
                        "id": r["ruleId"],
                        "name": r["name"],
                        "action": r["action"],
                        "enabled": r["enabled"],
                    })
                })
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

/// 规则 ID（边缘服务返回数字或字符串）
pub(crate) fn rule_id(rule: &serde_json::Value) -> Result<String> {
    match &rule["ruleId"] {
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) => Ok(s.clone()),
        _ => Err(ExecutorError::InvalidParams(format!(
            "规则 {} 缺少 ruleId",
            rule["name"]
        ))),
    }
}

fn rule_body(rule: &FirewallRule) -> Result<serde_json::Value> {
    if let Some(action) = &rule.action {
        if !matches!(action.as_str(), "accept" | "deny") {
            return Err(ExecutorError::InvalidParams(format!(
                "防火墙规则 {} 的 action 只能是 accept 或 deny: {}",
                rule.name, action
            )));
        }
    }

    let services = rule.service.as_ref().map(|services| {
        services
            .iter()
            .map(|s| {
                compact(json!({
                    "protocol": s.protocol.to_ascii_lowercase(),
                    "port": s.port.as_ref().map(|p| vec![p]),
                    "sourcePort": s.source_port.as_ref().map(|p| vec![p]),
                }))
            })
            .collect::<Vec<_>>()
    });

    Ok(compact(json!({
        "name": rule.name,
        "ruleType": "user",
        "action": rule.action,
        "enabled": rule.enabled,
        "loggingEnabled": rule.logging_enabled,
        "description": rule.description,
        "source": rule.source.as_ref().map(|ips| json!({ "ipAddress": ips })),
        "destination": rule.destination.as_ref().map(|ips| json!({ "ipAddress": ips })),
        "application": services.map(|s| json!({ "service": s })),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(value: serde_json::Value) -> FirewallRule {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rule_body() {
        let body = rule_body(&rule(json!({
            "name": "fw1",
            "action": "accept",
            "source": ["10.0.0.0/24"],
            "service": [ { "protocol": "TCP", "port": "443" } ]
        })))
        .unwrap();

        assert_eq!(body["name"], "fw1");
        assert_eq!(body["source"]["ipAddress"][0], "10.0.0.0/24");
        assert_eq!(body["application"]["service"][0]["protocol"], "tcp");
        assert_eq!(body["application"]["service"][0]["port"][0], "443");
        assert!(body.get("destination").is_none());
        assert!(body.get("enabled").is_none());
    }

    #[test]
    fn test_invalid_action() {
        let err = rule_body(&rule(json!({ "name": "fw1", "action": "allow" }))).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidParams(_)));
    }

    #[test]
    fn test_rule_id() {
        assert_eq!(rule_id(&json!({ "ruleId": 131074 })).unwrap(), "131074");
        assert_eq!(rule_id(&json!({ "ruleId": "131075" })).unwrap(), "131075");
        assert!(rule_id(&json!({ "name": "fw1" })).is_err());
    }

    #[test]
    fn test_fw_rules_alias() {
        let params: FirewallParams = params::parse(&json!({
            "gateway": "edge1",
            "vdc": "vdc1",
            "fw_rules": [ { "name": "fw1" }, { "name": "fw2" } ],
            "state": "absent"
        }))
        .unwrap();
        assert_eq!(params.rules.len(), 2);
    }
}
