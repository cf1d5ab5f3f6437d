//! 模块列表

use anyhow::Result;

use vcd_executor::{ModuleInfo, MODULES};

use super::output::{print_table, TableRow};

impl TableRow for ModuleInfo {
    fn headers() -> Vec<&'static str> {
        vec!["模块", "说明"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.to_string(), self.description.to_string()]
    }
}

pub fn handle() -> Result<()> {
    print_table(MODULES);
    Ok(())
}
