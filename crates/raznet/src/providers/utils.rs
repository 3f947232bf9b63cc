use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use super::base::{Delta, Usage};
use crate::models::content::Content;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to ollama's chat message specification
///   ollama takes a single string per message and carries images as a separate base64 list
pub fn messages_to_ollama_spec(system: Option<&str>, messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    if let Some(system) = system.filter(|s| !s.is_empty()) {
        messages_spec.push(json!({
            "role": "system",
            "content": system,
        }));
    }

    for message in messages {
        let mut converted = json!({
            "role": message.role,
            "content": message.text(),
        });

        let images: Vec<&str> = message
            .content
            .iter()
            .filter_map(Content::as_image)
            .map(|(data, _)| data)
            .collect();
        if !images.is_empty() {
            converted["images"] = json!(images);
        }

        messages_spec.push(converted);
    }

    messages_spec
}

/// Convert internal Tool format to the function specification ollama shares with openai
pub fn tools_to_ollama_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Parse one line of ollama's newline delimited response body
pub fn parse_ollama_line(line: &str) -> Result<Delta> {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|e| anyhow!("Invalid response line from ollama: {}", e))?;
    ollama_chunk_to_delta(&value)
}

/// Convert one chunk of ollama's streamed chat response into a Delta
pub fn ollama_chunk_to_delta(chunk: &Value) -> Result<Delta> {
    if let Some(error) = chunk.get("error") {
        let error = error.as_str().map(String::from).unwrap_or(error.to_string());
        return Err(anyhow!("Ollama error: {}", error));
    }

    let message = &chunk["message"];
    let mut delta = Delta::default();

    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            delta.text = Some(text.to_string());
        }
    }

    if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let function = &tool_call["function"];
            let name = function["name"].as_str().unwrap_or_default();
            if name.is_empty() {
                continue;
            }

            // Ollama sends an object, openai compatible servers send encoded json
            let arguments = match &function["arguments"] {
                Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
                other => other.clone(),
            };
            delta.tool_calls.push(ToolCall::from_json(name, &arguments));
        }
    }

    if chunk.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        delta.usage = Some(get_usage(chunk));
    }

    Ok(delta)
}

fn get_usage(data: &Value) -> Usage {
    let input_tokens = data
        .get("prompt_eval_count")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = data
        .get("eval_count")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    Usage::new(input_tokens, output_tokens, total_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_to_ollama_spec_text() {
        let messages = vec![Message::user().with_text("Hello")];
        let spec = messages_to_ollama_spec(Some("Be brief."), &messages);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "system");
        assert_eq!(spec[0]["content"], "Be brief.");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[1]["content"], "Hello");
        assert!(spec[1].get("images").is_none());
    }

    #[test]
    fn test_messages_to_ollama_spec_image() {
        let messages = vec![Message::user()
            .with_text("Describe this image.")
            .with_image("aGVsbG8=", "image/png")];
        let spec = messages_to_ollama_spec(None, &messages);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["content"], "Describe this image.");
        assert_eq!(spec[0]["images"], json!(["aGVsbG8="]));
    }

    #[test]
    fn test_tools_to_ollama_spec_duplicate() {
        let tool = Tool::new("browse_web", "Fetch a page", json!({"type": "object"}));
        let result = tools_to_ollama_spec(&[tool.clone(), tool]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_chunk_with_text() -> Result<()> {
        let chunk = json!({
            "model": "llama3.1:latest",
            "message": {"role": "assistant", "content": "Hel"},
            "done": false
        });
        let delta = ollama_chunk_to_delta(&chunk)?;
        assert_eq!(delta.text.as_deref(), Some("Hel"));
        assert!(delta.tool_calls.is_empty());
        assert!(delta.usage.is_none());
        Ok(())
    }

    #[test]
    fn test_chunk_with_tool_call() -> Result<()> {
        let chunk = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "browse_web", "arguments": {"url": "https://rust-lang.org"}}},
                    {"function": {"name": "duckduckgo_search", "arguments": "{\"query\": \"rust\"}"}}
                ]
            },
            "done": false
        });
        let delta = ollama_chunk_to_delta(&chunk)?;
        assert_eq!(delta.text, None);
        assert_eq!(delta.tool_calls.len(), 2);
        assert_eq!(delta.tool_calls[0].name, "browse_web");
        assert_eq!(
            delta.tool_calls[0].argument("url"),
            Some("https://rust-lang.org")
        );
        assert_eq!(delta.tool_calls[1].argument("query"), Some("rust"));
        Ok(())
    }

    #[test]
    fn test_final_chunk_has_usage() -> Result<()> {
        let chunk = json!({
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 15
        });
        let delta = ollama_chunk_to_delta(&chunk)?;
        assert_eq!(delta.usage, Some(Usage::new(Some(12), Some(15), Some(27))));
        Ok(())
    }

    #[test]
    fn test_parse_invalid_line() {
        let err = parse_ollama_line("{not json").unwrap_err();
        assert!(err.to_string().contains("Invalid response line"));
    }

    #[test]
    fn test_error_chunk() {
        let chunk = json!({"error": "model 'missing' not found"});
        let err = ollama_chunk_to_delta(&chunk).unwrap_err();
        assert!(err.to_string().contains("model 'missing' not found"));
    }
}
