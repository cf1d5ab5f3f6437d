//! 模块执行结果

use serde::{Deserialize, Serialize};

/// 模块执行结果
///
/// 序列化后即为模块输出：`{"changed": bool, "msg": ..., "warnings": [...]}`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// 是否产生了变更
    pub changed: bool,

    /// 结果消息：变更为一句话，查询操作为结构化数据
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<serde_json::Value>,

    /// 警告：未产生变更的说明（已存在、不存在）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ModuleResult {
    /// 带消息的结果
    pub fn message(changed: bool, msg: impl Into<String>) -> Self {
        Self {
            changed,
            msg: Some(serde_json::Value::String(msg.into())),
            warnings: Vec::new(),
        }
    }

    /// 未产生变更，说明放入警告
    pub fn unchanged(warning: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: None,
            warnings: vec![warning.into()],
        }
    }

    /// 只读查询结果
    pub fn data(value: impl Serialize) -> Self {
        Self {
            changed: false,
            msg: serde_json::to_value(value).ok(),
            warnings: Vec::new(),
        }
    }

    /// 追加警告
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// 消息文本（查询结果返回 `None`）
    pub fn msg_str(&self) -> Option<&str> {
        self.msg.as_ref().and_then(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_message() {
        let result = ModuleResult::message(true, "Org acme has been created");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "changed": true, "msg": "Org acme has been created" })
        );
    }

    #[test]
    fn test_serialize_unchanged() {
        let result = ModuleResult::unchanged("Org acme is already present");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "changed": false, "warnings": ["Org acme is already present"] })
        );
    }

    #[test]
    fn test_data_and_warnings() {
        let result = ModuleResult::data(vec!["vdc1", "vdc2"]).with_warning("partial");
        assert!(!result.changed);
        assert_eq!(result.msg, Some(json!(["vdc1", "vdc2"])));
        assert!(result.msg_str().is_none());
        assert_eq!(result.warnings, vec!["partial"]);
    }
}
