//! vCloud Director 客户端
//!
//! 提供与 vCD REST API（旧版 `/api`、CloudAPI、NSX 边缘服务）交互的客户端实现。
//!
//! # 功能
//!
//! - **会话** (`VcdClient`): 用户名密码或 API Token 登录、注销
//! - **查询服务** (`QueryApi`): 按名称查找任意资源
//! - **任务** (`TaskApi`): 异步任务状态跟踪
//! - **组织 / VDC** (`OrgApi` / `VdcApi`)
//! - **目录 / 独立磁盘** (`CatalogApi` / `DiskApi`)
//! - **vApp / 虚拟机** (`VappApi` / `VmApi`): 含网卡、硬盘、电源操作
//! - **网络** (`NetworkApi`): VDC 网络、外部网络
//! - **边缘网关** (`GatewayApi`): 防火墙、NAT、静态路由、证书
//! - **角色 / 用户** (`RoleApi` / `UserApi`)
//! - **NSX-T 管理器** (`NsxtApi`)
//!
//! # 示例
//!
//! ```ignore
//! use vcd_platform::{Credentials, VcdClient, VcdConfig};
//!
//! let mut client = VcdClient::new("vcd.example.com", VcdConfig::default())?;
//! client.login(&Credentials::Password {
//!     user: "admin".into(),
//!     password: "secret".into(),
//!     org: "System".into(),
//! }).await?;
//!
//! // 查找组织
//! let org = client.org().find("acme").await?;
//!
//! // 删除并等待任务
//! if let Some(task) = client.org().delete(&href, true, true).await? {
//!     let task = client.task().get(&task.href).await?;
//! }
//! ```

pub mod client;
pub mod api;
pub mod models;
pub mod error;

pub use client::{VcdClient, VcdConfig};
pub use error::{VcdError, Result};

// 导出 API 模块
pub use api::{
    query::QueryApi,
    task::TaskApi,
    org::OrgApi,
    vdc::VdcApi,
    catalog::CatalogApi,
    disk::DiskApi,
    vapp::{PowerAction, VappApi, VappNetworkSpec},
    vm::{AddVmSpec, VmApi},
    network::NetworkApi,
    gateway::GatewayApi,
    role::RoleApi,
    user::UserApi,
    nsxt::NsxtApi,
};

// 导出数据模型
pub use models::{
    Credentials, Task, TaskStatus,
    id_from_href, merge, record_names, to_admin_href, urn_from_href,
};
