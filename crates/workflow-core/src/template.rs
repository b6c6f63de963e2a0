//! 动作参数占位符替换
//!
//! 支持 `{{dotted.path}}` 语法，把事件负载中的值替换进动作参数。
//!
//! 替换规则：
//! - 参数字符串整体是一个占位符时，替换为负载中的原始 JSON 值（保留类型），
//!   如 `"{{current_stock}}"` → `5`；
//! - 占位符内嵌在更长的字符串中时做文本插值，标量按字面渲染；
//! - 路径未解析时保留原文并记录 warn，动作照常分发，由 Sink 决定如何处理。

use crate::models::EventContext;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// 参数渲染器
pub struct ParameterRenderer {
    placeholder: Regex,
}

impl Default for ParameterRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterRenderer {
    pub fn new() -> Self {
        Self {
            // 占位符路径允许字母、数字、下划线和点号
            placeholder: Regex::new(r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
                .expect("占位符正则为常量"),
        }
    }

    /// 渲染参数值，递归处理对象与数组
    pub fn render(&self, parameters: &Value, context: &EventContext) -> Value {
        match parameters {
            Value::String(s) => self.render_string(s, context),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render(v, context)))
                    .collect(),
            ),
            Value::Array(arr) => {
                Value::Array(arr.iter().map(|v| self.render(v, context)).collect())
            }
            other => other.clone(),
        }
    }

    fn render_string(&self, s: &str, context: &EventContext) -> Value {
        // 整串即单个占位符：替换为类型化的负载值
        if let Some(caps) = self.placeholder.captures(s) {
            if caps.get(0).map(|m| m.as_str()) == Some(s) {
                let path = &caps[1];
                return match context.get_field(path) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(path = %path, "参数占位符未在事件负载中解析");
                        Value::String(s.to_string())
                    }
                };
            }
        }

        // 文本插值
        let rendered = self.placeholder.replace_all(s, |caps: &regex::Captures<'_>| {
            let path = &caps[1];
            match context.get_field(path) {
                Some(value) => Self::render_scalar(value),
                None => {
                    warn!(path = %path, "参数占位符未在事件负载中解析");
                    caps[0].to_string()
                }
            }
        });

        Value::String(rendered.into_owned())
    }

    /// 标量的文本形式：字符串不带引号，其余走 JSON 字面量
    fn render_scalar(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EventContext {
        EventContext::new(json!({
            "product_title": "Espresso Beans",
            "current_stock": 5,
            "location": {"name": "warehouse-a"}
        }))
    }

    #[test]
    fn test_whole_string_placeholder_keeps_type() {
        let renderer = ParameterRenderer::new();
        let params = json!({"quantity": "{{current_stock}}"});

        let rendered = renderer.render(&params, &ctx());
        assert_eq!(rendered["quantity"], json!(5));
    }

    #[test]
    fn test_interpolation_in_text() {
        let renderer = ParameterRenderer::new();
        let params = json!({
            "message": "{{product_title}} 在 {{location.name}} 仅剩 {{current_stock}} 件"
        });

        let rendered = renderer.render(&params, &ctx());
        assert_eq!(
            rendered["message"],
            json!("Espresso Beans 在 warehouse-a 仅剩 5 件")
        );
    }

    #[test]
    fn test_unresolved_placeholder_left_intact() {
        let renderer = ParameterRenderer::new();
        let params = json!({"message": "sku: {{variant.sku}}"});

        let rendered = renderer.render(&params, &ctx());
        assert_eq!(rendered["message"], json!("sku: {{variant.sku}}"));
    }

    #[test]
    fn test_nested_structures_rendered() {
        let renderer = ParameterRenderer::new();
        let params = json!({
            "alert": {
                "title": "{{product_title}}",
                "tags": ["stock", "{{location.name}}"]
            },
            "threshold": 10
        });

        let rendered = renderer.render(&params, &ctx());
        assert_eq!(rendered["alert"]["title"], json!("Espresso Beans"));
        assert_eq!(rendered["alert"]["tags"][1], json!("warehouse-a"));
        assert_eq!(rendered["threshold"], json!(10));
    }

    #[test]
    fn test_plain_values_untouched() {
        let renderer = ParameterRenderer::new();
        let params = json!({"to": "ops@example.com", "retries": 3, "urgent": true});

        assert_eq!(renderer.render(&params, &ctx()), params);
    }
}
