use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Result of a `tools/call`, in the shape MCP clients expect.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn error<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self {
            is_error: true,
            ..format(payload)
        }
    }

    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => text,
            None => "",
        }
    }
}

/// Wrap any serializable payload as a single indented text block.
pub fn format<T: Serialize + ?Sized>(payload: &T) -> ToolOutput {
    ToolOutput {
        content: vec![ContentBlock::Text {
            text: to_pretty_json(payload),
        }],
        is_error: false,
    }
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
