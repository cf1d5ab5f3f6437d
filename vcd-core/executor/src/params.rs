//! 模块参数
//!
//! 每个模块的调用要么携带 `state`（收敛到期望状态），要么携带 `operation`
//! （只读查询或电源等命令），二者互斥。

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::{ExecutorError, Result};

/// 期望状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// 不存在则创建
    Present,
    /// 存在则修改
    Update,
    /// 存在则删除
    Absent,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Present => "present",
            State::Update => "update",
            State::Absent => "absent",
        }
    }
}

impl FromStr for State {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(State::Present),
            "update" => Ok(State::Update),
            "absent" => Ok(State::Absent),
            other => Err(ExecutorError::InvalidMode(other.to_string())),
        }
    }
}

/// 一次模块调用要做的事
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<O> {
    State(State),
    Operation(O),
}

/// 根据 `state` / `operation` 决定本次调用的动作
pub fn dispatch<O>(state: Option<&str>, operation: Option<O>) -> Result<Action<O>> {
    match (state, operation) {
        (Some(state), None) => Ok(Action::State(state.parse()?)),
        (None, Some(operation)) => Ok(Action::Operation(operation)),
        (Some(_), Some(_)) => Err(ExecutorError::InvalidParams(
            "state 与 operation 不能同时指定".to_string(),
        )),
        (None, None) => Err(ExecutorError::MissingParam("state 或 operation".to_string())),
    }
}

/// 把模块参数反序列化为具体的参数结构
///
/// 连接参数（user、password 等）由运行器消费，这里忽略未知字段。
pub fn parse<T: DeserializeOwned>(args: &serde_json::Value) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(|e| ExecutorError::InvalidParams(e.to_string()))
}

/// 必填参数
pub fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ExecutorError::MissingParam(name.to_string()))
}

/// 解析布尔参数，兼容 `yes` / `no` / `on` / `off` / `1` / `0` 等写法
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" => Some(true),
        "false" | "no" | "off" | "0" | "n" => Some(false),
        _ => None,
    }
}

/// `deserialize_with` 用：接受 JSON 布尔值或布尔字符串
pub fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Text(s)) => parse_bool(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("无效的布尔值: {}", s))),
    }
}

/// 字符串或数字，数字按原样转为文本
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

/// `deserialize_with` 用：接受字符串或数字（如 YAML 中的 `disk_id: 2001`）
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

/// 可选参数版本的 [`string_or_number`]
pub fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_from_str() {
        assert_eq!("present".parse::<State>().unwrap(), State::Present);
        assert_eq!("update".parse::<State>().unwrap(), State::Update);
        assert_eq!("absent".parse::<State>().unwrap(), State::Absent);
        assert!(matches!(
            "gone".parse::<State>(),
            Err(ExecutorError::InvalidMode(s)) if s == "gone"
        ));
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(
            dispatch::<String>(Some("absent"), None).unwrap(),
            Action::State(State::Absent)
        );
        assert_eq!(
            dispatch(None, Some("list_vdcs")).unwrap(),
            Action::Operation("list_vdcs")
        );
        assert!(matches!(
            dispatch(Some("present"), Some("read")),
            Err(ExecutorError::InvalidParams(_))
        ));
        assert!(matches!(
            dispatch::<String>(None, None),
            Err(ExecutorError::MissingParam(_))
        ));
    }

    #[test]
    fn test_lenient_bool() {
        #[derive(Deserialize)]
        struct Flags {
            #[serde(default, deserialize_with = "lenient_bool")]
            flag: Option<bool>,
        }

        let parse_flag = |v: serde_json::Value| serde_json::from_value::<Flags>(v).map(|f| f.flag);
        assert_eq!(parse_flag(json!({ "flag": true })).unwrap(), Some(true));
        assert_eq!(parse_flag(json!({ "flag": "no" })).unwrap(), Some(false));
        assert_eq!(parse_flag(json!({})).unwrap(), None);
        assert!(parse_flag(json!({ "flag": "maybe" })).is_err());
    }

    #[test]
    fn test_numeric_strings() {
        #[derive(Deserialize)]
        struct Keys {
            #[serde(deserialize_with = "string_or_number")]
            id: String,
            #[serde(default, deserialize_with = "lenient_string")]
            version: Option<String>,
        }

        let keys: Keys = serde_json::from_value(json!({ "id": 2001, "version": 30.0 })).unwrap();
        assert_eq!(keys.id, "2001");
        assert_eq!(keys.version.as_deref(), Some("30.0"));

        let keys: Keys = serde_json::from_value(json!({ "id": "disk-a" })).unwrap();
        assert_eq!(keys.id, "disk-a");
        assert_eq!(keys.version, None);

        assert!(serde_json::from_value::<Keys>(json!({ "id": true })).is_err());
    }

    #[test]
    fn test_required() {
        assert_eq!(required(&Some("x".into()), "name").unwrap(), "x");
        assert!(matches!(
            required(&Some(String::new()), "name"),
            Err(ExecutorError::MissingParam(p)) if p == "name"
        ));
        assert!(required(&None, "name").is_err());
    }
}
