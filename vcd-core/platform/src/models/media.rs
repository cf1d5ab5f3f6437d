//! vCD 请求体媒体类型
//!
//! 旧版 `/api` 接口按资源区分 Content-Type，版本号由客户端在 Accept 中声明。

pub const ADMIN_ORG: &str = "application/vnd.vmware.admin.organization+json";
pub const ADMIN_VDC: &str = "application/vnd.vmware.admin.vdc+json";
pub const CREATE_VDC_PARAMS: &str = "application/vnd.vmware.admin.createVdcParams+json";
pub const ADMIN_CATALOG: &str = "application/vnd.vmware.admin.catalog+json";
pub const PUBLISH_CATALOG_PARAMS: &str = "application/vnd.vmware.admin.publishCatalogParams+json";
pub const DISK_CREATE_PARAMS: &str = "application/vnd.vmware.vcloud.diskCreateParams+json";
pub const DISK: &str = "application/vnd.vmware.vcloud.disk+json";
pub const COMPOSE_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.composeVAppParams+json";
pub const INSTANTIATE_VAPP_TEMPLATE_PARAMS: &str =
    "application/vnd.vmware.vcloud.instantiateVAppTemplateParams+json";
pub const RECOMPOSE_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.recomposeVAppParams+json";
pub const DEPLOY_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.deployVAppParams+json";
pub const UNDEPLOY_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.undeployVAppParams+json";
pub const NETWORK_CONFIG_SECTION: &str = "application/vnd.vmware.vcloud.networkConfigSection+json";
pub const NETWORK_CONNECTION_SECTION: &str =
    "application/vnd.vmware.vcloud.networkConnectionSection+json";
pub const VM: &str = "application/vnd.vmware.vcloud.vm+json";
pub const RASD_ITEMS_LIST: &str = "application/vnd.vmware.vcloud.rasdItemsList+json";
pub const ADMIN_EDGE_GATEWAY: &str = "application/vnd.vmware.admin.edgeGateway+json";
pub const ADMIN_ROLE: &str = "application/vnd.vmware.admin.role+json";
pub const ADMIN_USER: &str = "application/vnd.vmware.admin.user+json";
pub const NSXT_MANAGER: &str = "application/vnd.vmware.admin.nsxTmanager+json";
pub const JSON: &str = "application/json";
