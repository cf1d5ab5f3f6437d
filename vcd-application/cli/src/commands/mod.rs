//! CLI 命令处理模块

pub mod common; // 公共工具函数
pub mod config;
pub mod module;
pub mod modules;
pub mod output;
pub mod run;
