//! vcd_gateway_nat_rule: 网关 NAT 规则
//!
//! - state: present / update / absent，一次可处理多条规则
//! - operation: list_rules
//!
//! 给出 `rule_id` 时按 ID 识别，否则按 (action, original_address, translated_address) 识别。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{merge, VcdClient};

use crate::modules::firewall_rule::rule_id;
use crate::modules::{compact, ModuleContext};
use crate::params::{self, lenient_bool, lenient_string, Action};
use crate::reconciler::{Lookup, ResourceOps, RollbackPolicy, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NatOperation {
    ListRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatRule {
    #[serde(default, deserialize_with = "lenient_string")]
    pub rule_id: Option<String>,

    /// snat / dnat
    pub action: String,

    pub original_address: String,

    pub translated_address: String,

    #[serde(default)]
    pub vnic: Option<u32>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub original_port: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub translated_port: Option<String>,

    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub icmp_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub logging_enabled: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub description: Option<String>,
}

impl NatRule {
    /// 服务端以小写回显 action，地址原样回显
    fn matches(&self, existing: &serde_json::Value) -> bool {
        match &self.rule_id {
            Some(id) => rule_id(existing).ok().as_deref() == Some(id.trim()),
            None => {
                same_text(&existing["action"], &self.action)
                    && same_text(&existing["originalAddress"], &self.original_address)
                    && same_text(&existing["translatedAddress"], &self.translated_address)
            }
        }
    }
}

fn same_text(echoed: &serde_json::Value, wanted: &str) -> bool {
    echoed
        .as_str()
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted.trim()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatParams {
    pub gateway: String,

    pub vdc: String,

    #[serde(default)]
    pub nat_rules: Vec<NatRule>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<NatOperation>,
}

pub struct NatRuleOps<'a> {
    client: &'a VcdClient,
    gateway_href: String,
}

#[async_trait]
impl<'a> ResourceOps for NatRuleOps<'a> {
    type Descriptor = NatRule;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Nat rule(s)"
    }

    fn key(&self, rule: &NatRule) -> String {
        match &rule.rule_id {
            Some(id) => id.clone(),
            None => format!("{}:{}->{}", rule.action, rule.original_address, rule.translated_address),
        }
    }

    async fn lookup(&self, rule: &NatRule) -> Result<Lookup<serde_json::Value>> {
        let rules = self.client.gateway().nat_rules(&self.gateway_href).await?;
        Ok(rules.into_iter().find(|r| rule.matches(r)).into())
    }

    async fn create(&self, rule: &NatRule) -> Result<Submitted> {
        let body = rule_body(rule)?;
        Ok(self.client.gateway().add_nat_rule(&self.gateway_href, body).await?.into())
    }

    async fn update(&self, existing: &serde_json::Value, rule: &NatRule) -> Result<Submitted> {
        let id = rule_id(existing)?;
        let mut updated = existing.clone();
        merge(&mut updated, rule_body(rule)?);
        Ok(self.client.gateway()
            .update_nat_rule(&self.gateway_href, &id, updated)
            .await?
            .into())
    }

    async fn delete(&self, existing: &serde_json::Value, _rule: &NatRule) -> Result<Submitted> {
        let id = rule_id(existing)?;
        Ok(self.client.gateway().delete_nat_rule(&self.gateway_href, &id).await?.into())
    }

    fn rollback_policy(&self) -> RollbackPolicy {
        RollbackPolicy::DeleteOnFailure
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: NatParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let gateway_href = ctx.gateway_href(&vdc_href, &params.gateway).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = NatRuleOps { client: ctx.client, gateway_href };
            ctx.reconciler().apply_all(&ops, &params.nat_rules, state).await
        }
        Action::Operation(NatOperation::ListRules) => {
            let rules = ctx.client.gateway().nat_rules(&gateway_href).await?;
            let listing: Vec<serde_json::Value> = rules
                .iter()
                .map(|r| {
                    json!({
                        "id": r["ruleId"],
                        "action": r["action"],
                        "original_address": r["originalAddress"],
                        "translated_address": r["translatedAddress"],
                        "enabled": r["enabled"],
                    })
                })
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

fn rule_body(rule: &NatRule) -> Result<serde_json::Value> {
    let action = rule.action.to_ascii_lowercase();
    if !matches!(action.as_str(), "snat" | "dnat") {
        return Err(ExecutorError::InvalidParams(format!(
            "NAT 规则的 action 只能是 snat 或 dnat: {}",
            rule.action
        )));
    }

    Ok(compact(json!({
        "action": action,
        "vnic": rule.vnic,
        "originalAddress": rule.original_address,
        "translatedAddress": rule.translated_address,
        "originalPort": rule.original_port,
        "translatedPort": rule.translated_port,
        "protocol": rule.protocol.as_deref().map(str::to_ascii_lowercase),
        "icmpType": rule.icmp_type,
        "loggingEnabled": rule.logging_enabled,
        "enabled": rule.enabled,
        "description": rule.description,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(value: serde_json::Value) -> NatRule {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_match_by_addresses() {
        let wanted = rule(json!({
            "action": "dnat",
            "original_address": "203.0.113.10",
            "translated_address": "10.0.0.10"
        }));
        let existing = json!({
            "ruleId": 196609,
            "action": "dnat",
            "originalAddress": "203.0.113.10",
            "translatedAddress": "10.0.0.10"
        });
        assert!(wanted.matches(&existing));
        assert!(!wanted.matches(&json!({ "action": "snat", "originalAddress": "203.0.113.10" })));
    }

    #[test]
    fn test_match_by_id() {
        let wanted = rule(json!({
            "rule_id": "196609",
            "action": "dnat",
            "original_address": "x",
            "translated_address": "y"
        }));
        assert!(wanted.matches(&json!({ "ruleId": 196609 })));
        assert!(!wanted.matches(&json!({ "ruleId": 196610 })));
    }

    #[test]
    fn test_created_rule_is_found_again() {
        let wanted = rule(json!({
            "action": "SNAT",
            "original_address": "10.0.0.0/24",
            "translated_address": "203.0.113.5"
        }));
        let stored = rule_body(&wanted).unwrap();
        assert_eq!(stored["action"], "snat");
        assert!(wanted.matches(&stored));

        let other = rule(json!({
            "action": "Dnat",
            "original_address": "10.0.0.0/24",
            "translated_address": "203.0.113.5"
        }));
        assert!(!other.matches(&stored));
    }

    #[test]
    fn test_integer_rule_id() {
        let params: NatParams = params::parse(&json!({
            "gateway": "edge1",
            "vdc": "vdc1",
            "nat_rules": [{
                "rule_id": 196609,
                "action": "dnat",
                "original_address": "203.0.113.10",
                "translated_address": "10.0.0.10",
                "original_port": 80,
                "translated_port": "8080"
            }],
            "state": "absent"
        }))
        .unwrap();

        let wanted = &params.nat_rules[0];
        assert_eq!(wanted.rule_id.as_deref(), Some("196609"));
        assert_eq!(wanted.original_port.as_deref(), Some("80"));
        assert!(wanted.matches(&json!({ "ruleId": 196609 })));
    }

    #[test]
    fn test_rule_body() {
        let body = rule_body(&rule(json!({
            "action": "DNAT",
            "original_address": "203.0.113.10",
            "translated_address": "10.0.0.10",
            "protocol": "TCP",
            "original_port": "80",
            "translated_port": "8080"
        })))
        .unwrap();
        assert_eq!(body["action"], "dnat");
        assert_eq!(body["protocol"], "tcp");
        assert!(body.get("vnic").is_none());

        assert!(rule_body(&rule(json!({
            "action": "masquerade",
            "original_address": "a",
            "translated_address": "b"
        })))
        .is_err());
    }
}
