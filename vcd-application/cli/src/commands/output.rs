//! CLI 通用输出格式化模块
//!
//! 模块结果输出为 json/yaml，模块列表输出为表格

use anyhow::{bail, Result};
use serde::Serialize;

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

/// 表格格式输出
pub fn print_table<T: TableRow>(items: &[T]) {
    let headers = T::headers();

    // 打印表头
    let header_line: String = headers
        .iter()
        .map(|h| format!("{:<32}", h))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", header_line.trim_end());
    println!("{}", "-".repeat(header_line.trim_end().len()));

    // 打印数据行
    for item in items {
        let row_line: String = item
            .row()
            .iter()
            .map(|c| format!("{:<32}", c))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", row_line.trim_end());
    }
}

/// 按格式渲染
pub fn render<T: Serialize>(value: &T, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(value)?),
        "yaml" => Ok(serde_yaml::to_string(value)?),
        other => bail!("不支持的输出格式: {}（可选 json/yaml）", other),
    }
}

/// 模块失败时的输出
pub fn failure(msg: &str) -> serde_json::Value {
    serde_json::json!({ "failed": true, "msg": msg })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_formats() {
        let value = json!({ "changed": true, "msg": "Org acme has been created" });
        assert!(render(&value, "json").unwrap().contains("\"changed\": true"));
        assert!(render(&value, "yaml").unwrap().contains("changed: true"));
        assert!(render(&value, "table").is_err());
    }

    #[test]
    fn test_failure() {
        assert_eq!(failure("boom"), json!({ "failed": true, "msg": "boom" }));
    }
}
