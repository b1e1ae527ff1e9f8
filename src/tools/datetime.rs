use serde_json::json;

use crate::llm::types::ToolDef;

pub fn tool_def() -> ToolDef {
    ToolDef::function(
        "get_datetime",
        "Return the current date and time.",
        json!({"type": "object", "properties": {}}),
    )
}

pub fn run() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_local_time() {
        let out = run();
        assert!(chrono::NaiveDateTime::parse_from_str(&out, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
