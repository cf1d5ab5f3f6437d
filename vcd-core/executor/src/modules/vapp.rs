//! vcd_vapp: vApp
//!
//! - state: present / absent
//! - operation: poweron / poweroff / reboot / deploy / undeploy / list_vms / list_networks

use async_trait::async_trait;
use serde::Deserialize;

use vcd_platform::{record_names, PowerAction, VappNetworkSpec, VcdClient, VcdError};

use crate::modules::{href_of, required_record, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VappOperation {
    Poweron,
    Poweroff,
    Reboot,
    Deploy,
    Undeploy,
    ListVms,
    ListNetworks,
}

impl VappOperation {
    /// 电源类操作对应的动作
    pub fn power_action(&self) -> Option<PowerAction> {
        match self {
            VappOperation::Poweron => Some(PowerAction::PowerOn),
            VappOperation::Poweroff => Some(PowerAction::PowerOff),
            VappOperation::Reboot => Some(PowerAction::Reboot),
            VappOperation::Deploy => Some(PowerAction::Deploy),
            VappOperation::Undeploy => Some(PowerAction::Undeploy),
            VappOperation::ListVms | VappOperation::ListNetworks => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VappParams {
    pub vapp_name: String,

    pub vdc: String,

    #[serde(default)]
    pub description: Option<String>,

    /// 从目录模板实例化时的模板名称
    #[serde(default)]
    pub template_name: Option<String>,

    #[serde(default)]
    pub catalog_name: Option<String>,

    /// 上游 VDC 网络
    #[serde(default)]
    pub network: Option<String>,

    /// bridged / natRouted / isolated
    #[serde(default)]
    pub fence_mode: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub deploy: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub power_on: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub force: Option<bool>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VappOperation>,
}

pub struct VappOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
}

#[async_trait]
impl<'a> ResourceOps for VappOps<'a> {
    type Descriptor = VappParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Vapp"
    }

    fn key(&self, params: &VappParams) -> String {
        params.vapp_name.clone()
    }

    async fn lookup(&self, params: &VappParams) -> Result<Lookup<String>> {
        let record = self.client.vapp().find(&self.vdc_href, &params.vapp_name).await?;
        Ok(record.map(|r| href_of(&r, "vApp")).transpose()?.into())
    }

    async fn create(&self, params: &VappParams) -> Result<Submitted> {
        let network = match &params.network {
            Some(name) => Some(VappNetworkSpec {
                network: name.clone(),
                network_href: self.client.network().vdc_network_href(&self.vdc_href, name).await?,
                fence_mode: params.fence_mode.clone().unwrap_or_else(|| "bridged".to_string()),
            }),
            None => None,
        };

        let task = match (&params.catalog_name, &params.template_name) {
            (Some(catalog), Some(template)) => {
                let template_href = self.client.catalog()
                    .find_template(catalog, template)
                    .await?
                    .ok_or_else(|| VcdError::NotFound(format!("模板 {}/{}", catalog, template)))?;

                self.client.vapp()
                    .instantiate(
                        &self.vdc_href,
                        &params.vapp_name,
                        &template_href,
                        network.as_ref(),
                        params.deploy.unwrap_or(true),
                        params.power_on.unwrap_or(true),
                    )
                    .await?
            }
            _ => {
                self.client.vapp()
                    .compose(
                        &self.vdc_href,
                        &params.vapp_name,
                        params.description.as_deref().unwrap_or_default(),
                        network.as_ref(),
                    )
                    .await?
            }
        };
        Ok(task.into())
    }

    async fn delete(&self, href: &String, params: &VappParams) -> Result<Submitted> {
        Ok(self.client.vapp().delete(href, params.force.unwrap_or(true)).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: VappParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;

    let operation = match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = VappOps { client: ctx.client, vdc_href };
            return ctx.reconciler().apply(&ops, &params, state).await;
        }
        Action::Operation(operation) => operation,
    };

    let record = ctx.client.vapp().find(&vdc_href, &params.vapp_name).await?;
    let href = required_record(record, "vApp", &params.vapp_name)?;

    if let Some(action) = operation.power_action() {
        let submitted: Submitted = ctx.client.vapp().power(&href, action).await?.into();
        ctx.waiter.complete(submitted).await?;
        return Ok(ModuleResult::message(
            true,
            format!("Vapp {} {} completed", params.vapp_name, power_word(action)),
        ));
    }

    match operation {
        VappOperation::ListVms => {
            let vms = ctx.client.vapp().list_vms(&href).await?;
            Ok(ModuleResult::data(record_names(&vms)))
        }
        _ => Ok(ModuleResult::data(ctx.client.vapp().list_networks(&href).await?)),
    }
}

/// 电源操作的结果用词
pub(crate) fn power_word(action: PowerAction) -> &'static str {
    match action {
        PowerAction::PowerOn => "power on",
        PowerAction::PowerOff => "power off",
        PowerAction::Reboot => "reboot",
        PowerAction::Deploy => "deploy",
        PowerAction::Undeploy => "undeploy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_power_operations() {
        assert_eq!(VappOperation::Poweron.power_action(), Some(PowerAction::PowerOn));
        assert_eq!(VappOperation::Undeploy.power_action(), Some(PowerAction::Undeploy));
        assert!(VappOperation::ListVms.power_action().is_none());
        assert_eq!(power_word(PowerAction::PowerOff), "power off");
    }

    #[test]
    fn test_parse_params() {
        let params: VappParams = params::parse(&json!({
            "vapp_name": "web",
            "vdc": "vdc1",
            "operation": "list_networks"
        }))
        .unwrap();
        assert_eq!(params.operation, Some(VappOperation::ListNetworks));
        assert!(params.template_name.is_none());
    }
}
