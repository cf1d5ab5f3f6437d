//! vCD API 模块
//!
//! 按资源类型封装 vCD REST 接口：
//! - 查询服务 (QueryApi)
//! - 任务 (TaskApi)
//! - 组织 / 虚拟数据中心 (OrgApi / VdcApi)
//! - 目录 / 独立磁盘 (CatalogApi / DiskApi)
//! - vApp / 虚拟机 (VappApi / VmApi)
//! - 网络 / 边缘网关 (NetworkApi / GatewayApi)
//! - 角色 / 用户 (RoleApi / UserApi)
//! - NSX-T 管理器 (NsxtApi)

pub mod query;
pub mod task;
pub mod org;
pub mod vdc;
pub mod catalog;
pub mod disk;
pub mod vapp;
pub mod vm;
pub mod network;
pub mod gateway;
pub mod role;
pub mod user;
pub mod nsxt;

pub use query::QueryApi;
pub use task::TaskApi;
pub use org::OrgApi;
pub use vdc::VdcApi;
pub use catalog::CatalogApi;
pub use disk::DiskApi;
pub use vapp::VappApi;
pub use vm::VmApi;
pub use network::NetworkApi;
pub use gateway::GatewayApi;
pub use role::RoleApi;
pub use user::UserApi;
pub use nsxt::NsxtApi;
