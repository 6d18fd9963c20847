//! Turn Processing
//!
//! Folds one model response into the transcript: pulls out reasoning and
//! message text, resolves and runs every requested tool call in order, and
//! produces the [`TurnRecord`] the consumer sees.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::AgentError;
use crate::message::{Message, ToolCallRequest, Transcript};
use crate::provider::Completion;
use crate::schema::{NameMap, ToolRef};
use crate::tool::{Arguments, ToolCatalog, ToolOutput};

/// Longest tool output, in characters, fed back to the model
pub const MAX_TOOL_OUTPUT_CHARS: usize = 3000;

/// Appended to a cut tool output so it still ends like a JSON string field
pub const TRUNCATION_MARKER: &str = "...\"}";

const REASONING_MARKER: &str = "[reasoning]";
const MESSAGE_MARKER: &str = "[message]";

/// One tool call as seen by the consumer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub provider: String,
    pub tool: String,
    pub arguments: Value,
    pub output: ToolOutput,
}

/// One loop iteration as seen by the consumer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number
    pub turn: usize,
    pub reasoning: String,
    pub message: String,
    pub tool_calls: Vec<ToolCallRecord>,

    /// Set only on the record that ends a run because the model call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnRecord {
    /// Final answer: no tool calls
    pub const fn answer(turn: usize, reasoning: String, message: String) -> Self {
        Self {
            turn,
            reasoning,
            message,
            tool_calls: Vec::new(),
            error: None,
        }
    }

    /// Model call failed; the run stops here
    pub fn failure(turn: usize, error: &AgentError) -> Self {
        Self {
            turn,
            reasoning: format!("API call failed: {error}"),
            message: format!("Error calling model: {error}"),
            tool_calls: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// True for the record that ends a run, successfully or not
    pub fn is_terminal(&self) -> bool {
        self.tool_calls.is_empty()
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Split content on `[REASONING]` / `[MESSAGE]` markers (case-insensitive).
///
/// Each section runs to the next marker or the end of the text. Without
/// any marker the whole content is the message. A missing section stays
/// empty.
pub fn parse_sections(content: &str) -> (String, String) {
    // ASCII lowering keeps byte offsets aligned with `content`.
    let lower = content.to_ascii_lowercase();
    let reasoning_at = lower.find(REASONING_MARKER);
    let message_at = lower.find(MESSAGE_MARKER);

    if reasoning_at.is_none() && message_at.is_none() {
        return (String::new(), content.trim().to_string());
    }

    let section = |at: Option<usize>, marker: &str| {
        at.map_or_else(String::new, |at| {
            let start = at + marker.len();
            let end = next_marker(&lower, start).unwrap_or(content.len());
            content[start..end].trim().to_string()
        })
    };

    (
        section(reasoning_at, REASONING_MARKER),
        section(message_at, MESSAGE_MARKER),
    )
}

fn next_marker(lower: &str, from: usize) -> Option<usize> {
    let rest = &lower[from..];
    [REASONING_MARKER, MESSAGE_MARKER]
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min()
        .map(|i| from + i)
}

/// Reasoning and message for a completion. Native reasoning wins and
/// leaves the content untouched; otherwise the content is parsed for markers.
pub fn extract_sections(completion: &Completion) -> (String, String) {
    match completion.native_reasoning() {
        Some(reasoning) => (reasoning.to_string(), completion.content_str().to_string()),
        None => parse_sections(completion.content_str()),
    }
}

/// Decode the model's JSON-encoded arguments. Anything that is not a
/// string holding a JSON object becomes an empty object.
pub fn parse_arguments(raw: &Value) -> Arguments {
    let Value::String(encoded) = raw else {
        if !raw.is_null() {
            tracing::warn!(kind = ?raw, "Tool arguments were not a JSON string; using {{}}");
        }
        return Arguments::new();
    };

    if encoded.trim().is_empty() {
        return Arguments::new();
    }

    match serde_json::from_str::<Value>(encoded) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(value = %other, "Tool arguments were not an object; using {{}}");
            Arguments::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed tool arguments; using {{}}");
            Arguments::new()
        }
    }
}

/// Cap an encoded tool output at [`MAX_TOOL_OUTPUT_CHARS`] characters plus
/// [`TRUNCATION_MARKER`]. The result may no longer be valid JSON.
pub fn truncate_output(encoded: String) -> String {
    match encoded.char_indices().nth(MAX_TOOL_OUTPUT_CHARS) {
        Some((cut, _)) => {
            let mut truncated = encoded[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => encoded,
    }
}

fn encode_output(output: &ToolOutput) -> String {
    serde_json::to_string(output).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not encode tool output");
        format!(r#"{{"success": false, "error": "unencodable tool output: {e}"}}"#)
    })
}

fn fill_call_ids(calls: &mut [ToolCallRequest]) {
    for call in calls.iter_mut().filter(|c| c.id.is_empty()) {
        call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
    }
}

/// Runs the tool calls of one turn against the catalog
pub struct TurnProcessor<'a> {
    catalog: &'a dyn ToolCatalog,
    names: &'a NameMap,
    tool_timeout: Option<Duration>,
}

impl<'a> TurnProcessor<'a> {
    pub fn new(catalog: &'a dyn ToolCatalog, names: &'a NameMap) -> Self {
        Self {
            catalog,
            names,
            tool_timeout: None,
        }
    }

    /// Bound each tool invocation; an elapsed budget fails that call only
    pub const fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Process a completion that requested at least one tool call.
    ///
    /// Appends the assistant tool-call message, then one tool message per
    /// call in the order the model listed them. Tool failures are recorded
    /// on their own call and never abort the turn.
    pub async fn process(
        &self,
        turn: usize,
        completion: Completion,
        transcript: &mut Transcript,
    ) -> TurnRecord {
        let (mut reasoning, mut message) = extract_sections(&completion);

        let mut calls = completion.tool_calls;
        fill_call_ids(&mut calls);

        transcript.push(Message::assistant_tool_calls(
            completion.content.as_deref(),
            calls.clone(),
        ));

        let mut records = Vec::with_capacity(calls.len());
        for call in &calls {
            let (target, resolution) = self.names.resolve(call.flat_name());
            let arguments = parse_arguments(&call.function.arguments);

            tracing::debug!(
                turn,
                flat_name = call.flat_name(),
                provider = %target.provider,
                tool = %target.tool,
                ?resolution,
                "Invoking tool"
            );
            let output = self.invoke(&target, &arguments).await;

            transcript.push(Message::tool(
                truncate_output(encode_output(&output)),
                call.id.clone(),
            ));

            records.push(ToolCallRecord {
                provider: target.provider,
                tool: target.tool,
                arguments: Value::Object(arguments),
                output,
            });
        }

        if !records.is_empty() {
            let used = records
                .iter()
                .map(|r| format!("`{}.{}`", r.provider, r.tool))
                .collect::<Vec<_>>()
                .join(", ");
            if reasoning.is_empty() {
                reasoning = format!("I need to use {used} to answer the user's question.");
            }
            if message.is_empty() {
                message = format!("Let me look that up using {used}.");
            }
        }

        TurnRecord {
            turn,
            reasoning,
            message,
            tool_calls: records,
            error: None,
        }
    }

    async fn invoke(&self, target: &ToolRef, arguments: &Arguments) -> ToolOutput {
        let call = self.catalog.execute(&target.provider, &target.tool, arguments);
        let result = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(AgentError::ToolTimeout(target.to_string(), limit.as_secs()))),
            None => call.await,
        };

        if let Err(e) = &result {
            tracing::warn!(provider = %target.provider, tool = %target.tool, error = %e, "Tool execution failed");
        }
        ToolOutput::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::message::Role;
    use crate::schema::FunctionSet;
    use crate::tool::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Catalog double: `calc.add` sums, `calc.fail` errors, `slow.wait` hangs,
    /// `big.dump` returns a large payload. Records every invocation.
    #[derive(Default)]
    struct ScriptedCatalog {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolCatalog for ScriptedCatalog {
        fn list_tools(&self) -> Vec<ToolDescriptor> {
            ["calc.add", "calc.fail", "slow.wait", "big.dump"]
                .iter()
                .map(|full| {
                    let (provider, name) = full.split_once('.').unwrap();
                    ToolDescriptor {
                        provider: provider.into(),
                        name: name.into(),
                        description: String::new(),
                        input_schema: json!({"type": "object"}),
                    }
                })
                .collect()
        }

        async fn execute(&self, provider: &str, tool: &str, arguments: &Arguments) -> Result<Value> {
            self.calls.lock().unwrap().push(format!("{provider}.{tool}"));
            match (provider, tool) {
                ("calc", "add") => {
                    let a = arguments.get("a").and_then(Value::as_i64).unwrap_or(0);
                    let b = arguments.get("b").and_then(Value::as_i64).unwrap_or(0);
                    Ok(json!({ "result": a + b }))
                }
                ("calc", "fail") => Err(AgentError::ToolExecution("upstream 502".into())),
                ("slow", "wait") => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!({}))
                }
                ("big", "dump") => Ok(json!({ "text": "x".repeat(5_000) })),
                ("calc" | "slow" | "big", _) => Err(AgentError::UnknownTool {
                    provider: provider.into(),
                    tool: tool.into(),
                }),
                _ => Err(AgentError::UnknownProvider(provider.into())),
            }
        }
    }

    fn names(catalog: &ScriptedCatalog) -> NameMap {
        FunctionSet::build(&catalog.list_tools()).unwrap().names
    }

    #[test]
    fn test_parse_sections_without_markers() {
        assert_eq!(parse_sections("hello world"), (String::new(), "hello world".into()));
    }

    #[test]
    fn test_parse_sections_both_markers() {
        assert_eq!(
            parse_sections("[REASONING]\nfoo\n[MESSAGE]\nbar"),
            ("foo".into(), "bar".into())
        );
    }

    #[test]
    fn test_parse_sections_single_marker() {
        assert_eq!(parse_sections("[MESSAGE]\nonly"), (String::new(), "only".into()));
        assert_eq!(parse_sections("[reasoning] thinking"), ("thinking".into(), String::new()));
    }

    #[test]
    fn test_parse_sections_case_and_order() {
        assert_eq!(
            parse_sections("[Message] answer first\n[Reasoning] then why"),
            ("then why".into(), "answer first".into())
        );
    }

    #[test]
    fn test_parse_sections_non_ascii_content() {
        assert_eq!(
            parse_sections("[REASONING] café ☕ [MESSAGE] naïve"),
            ("café ☕".into(), "naïve".into())
        );
    }

    #[test]
    fn test_native_reasoning_wins() {
        let completion = Completion {
            reasoning: Some("native thoughts".into()),
            ..Completion::text("[REASONING] ignored [MESSAGE] kept verbatim")
        };
        let (reasoning, message) = extract_sections(&completion);
        assert_eq!(reasoning, "native thoughts");
        assert_eq!(message, "[REASONING] ignored [MESSAGE] kept verbatim");
    }

    #[test]
    fn test_parse_arguments_recovery() {
        assert_eq!(parse_arguments(&json!(r#"{"a": 1}"#))["a"], 1);
        assert!(parse_arguments(&json!("{not json")).is_empty());
        assert!(parse_arguments(&Value::Null).is_empty());
        assert!(parse_arguments(&json!({"a": 1})).is_empty());
        assert!(parse_arguments(&json!("[1, 2]")).is_empty());
        assert!(parse_arguments(&json!("")).is_empty());
    }

    #[test]
    fn test_truncation_boundary() {
        let exact = "a".repeat(MAX_TOOL_OUTPUT_CHARS);
        assert_eq!(truncate_output(exact.clone()), exact);

        let long = "b".repeat(MAX_TOOL_OUTPUT_CHARS + 1);
        let cut = truncate_output(long);
        assert_eq!(cut.chars().count(), MAX_TOOL_OUTPUT_CHARS + TRUNCATION_MARKER.len());
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert!(cut.starts_with(&"b".repeat(MAX_TOOL_OUTPUT_CHARS)));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = "é".repeat(MAX_TOOL_OUTPUT_CHARS + 10);
        let cut = truncate_output(long);
        assert_eq!(cut.trim_end_matches(TRUNCATION_MARKER).chars().count(), MAX_TOOL_OUTPUT_CHARS);
    }

    #[tokio::test]
    async fn test_process_appends_in_call_order() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "what is 2+2");

        let completion = Completion::tool_calls(vec![
            ToolCallRequest::new("call_1", "calc__add", r#"{"a":2,"b":2}"#),
            ToolCallRequest::new("call_2", "calc__fail", "{}"),
        ]);
        let record = processor.process(1, completion, &mut transcript).await;

        let messages = transcript.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].tool_calls.len(), 2);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].text(), r#"{"success":true,"result":{"result":4}}"#);
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_2"));

        assert_eq!(record.tool_calls.len(), 2);
        assert_eq!(record.tool_calls[0].output, ToolOutput::success(json!({"result": 4})));
        assert_eq!(record.tool_calls[0].arguments, json!({"a": 2, "b": 2}));
        assert!(!record.tool_calls[1].output.success);
        assert_eq!(
            record.tool_calls[1].output.error.as_deref(),
            Some("Tool execution error: upstream 502")
        );
    }

    #[tokio::test]
    async fn test_failing_call_does_not_stop_later_calls() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "go");

        let completion = Completion::tool_calls(vec![
            ToolCallRequest::new("a", "calc__fail", "{}"),
            ToolCallRequest::new("b", "nowhere", "{}"),
            ToolCallRequest::new("c", "add", r#"{"a":1,"b":1}"#),
        ]);
        let record = processor.process(1, completion, &mut transcript).await;

        let calls = catalog.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["calc.fail", ".nowhere", "calc.add"]);
        assert_eq!(record.tool_calls[1].provider, "");
        assert_eq!(record.tool_calls[1].output.error.as_deref(), Some("Unknown provider: "));
        assert!(record.tool_calls[2].output.success);
    }

    #[tokio::test]
    async fn test_autofill_names_invoked_tools() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "go");

        let record = processor
            .process(
                1,
                Completion::tool_calls(vec![ToolCallRequest::new("a", "calc__add", "{}")]),
                &mut transcript,
            )
            .await;
        assert_eq!(record.reasoning, "I need to use `calc.add` to answer the user's question.");
        assert_eq!(record.message, "Let me look that up using `calc.add`.");
        assert!(transcript.messages()[2].content.is_none());
    }

    #[tokio::test]
    async fn test_partial_sections_are_autofilled() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "go");

        let completion = Completion {
            content: Some("[REASONING] need math".into()),
            ..Completion::tool_calls(vec![ToolCallRequest::new("a", "calc__add", "{}")])
        };
        let record = processor.process(1, completion, &mut transcript).await;
        assert_eq!(record.reasoning, "need math");
        assert_eq!(record.message, "Let me look that up using `calc.add`.");
        assert_eq!(transcript.messages()[2].text(), "[REASONING] need math");
    }

    #[tokio::test]
    async fn test_large_output_is_truncated_in_transcript_only() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "go");

        let record = processor
            .process(
                1,
                Completion::tool_calls(vec![ToolCallRequest::new("a", "big__dump", "{}")]),
                &mut transcript,
            )
            .await;

        let fed_back = transcript.last().unwrap().text();
        assert_eq!(fed_back.chars().count(), MAX_TOOL_OUTPUT_CHARS + TRUNCATION_MARKER.len());
        let full = record.tool_calls[0].output.result.as_ref().unwrap();
        assert_eq!(full["text"].as_str().unwrap().len(), 5_000);
    }

    #[tokio::test]
    async fn test_tool_timeout_becomes_failed_output() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names)
            .with_tool_timeout(Some(Duration::from_millis(20)));
        let mut transcript = Transcript::start("system", "go");

        let record = processor
            .process(
                1,
                Completion::tool_calls(vec![ToolCallRequest::new("a", "slow__wait", "{}")]),
                &mut transcript,
            )
            .await;
        let output = &record.tool_calls[0].output;
        assert!(!output.success);
        assert!(output.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_call_ids_are_generated() {
        let catalog = ScriptedCatalog::default();
        let names = names(&catalog);
        let processor = TurnProcessor::new(&catalog, &names);
        let mut transcript = Transcript::start("system", "go");

        processor
            .process(
                1,
                Completion::tool_calls(vec![ToolCallRequest::new("", "calc__add", "{}")]),
                &mut transcript,
            )
            .await;

        let messages = transcript.messages();
        let id = &messages[2].tool_calls[0].id;
        assert!(id.starts_with("call_"));
        assert_eq!(messages[3].tool_call_id.as_ref(), Some(id));
    }
}
