//! Integration tests for the agent loop
//!
//! Models are scripted; tools run for real through the host backend with `sh`.

mod common;

use std::collections::BTreeMap;

use agentvisor::agent::{AgentEvent, AgentSession, FinishReason};
use agentvisor::events::EventSink;
use agentvisor::llm::{ChatError, ConversationTurn, ModelReply, Provider, Role};
use agentvisor::tools::ToolInvocation;

use common::{drain, host_loop, shell_call, ScriptedModel};

fn terminal_count(events: &[AgentEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

fn tool_calls(events: &[AgentEvent]) -> Vec<&BTreeMap<String, String>> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCall { arguments, .. } => Some(arguments),
            _ => None,
        })
        .collect()
}

fn tool_outputs(events: &[AgentEvent]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolResult { output, is_error, .. } => Some((output.clone(), *is_error)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_two_plus_two_end_to_end() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 5);
    let model = ScriptedModel::new(
        "scripted",
        vec![
            "<tool_call>\n<tool_name>execute_code</tool_name>\n<parameters>\n<language>shell</language>\n<code>echo $((2 + 2))</code>\n</parameters>\n</tool_call>",
            "<done>2 + 2 = 4</done>",
        ],
    );

    let mut session = AgentSession::new("calc", model.clone(), Vec::new(), 5).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "What is 2 + 2?", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::Done);
    assert_eq!(outcome.summary, "2 + 2 = 4");
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tool_calls, 1);

    // One thinking event per model call, including the one that answers done
    let kinds: Vec<&str> = events.iter().map(AgentEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["start", "thinking", "tool_call", "tool_result", "thinking", "done"]
    );
    assert!(matches!(events.first(), Some(AgentEvent::Start { agent, .. }) if agent == "calc"));
    assert_eq!(tool_outputs(&events), vec![("4".to_string(), false)]);
    assert!(matches!(events.last(), Some(AgentEvent::Done { summary }) if summary == "2 + 2 = 4"));
    assert_eq!(terminal_count(&events), 1);

    // Second call sees the tool result as a user turn
    let requests = model.requests();
    let last_turn = requests[1].last().unwrap();
    assert_eq!(last_turn.role, Role::User);
    assert!(last_turn.content.contains("status=\"ok\""));
    assert!(last_turn.content.contains('4'));
}

#[tokio::test]
async fn test_iteration_ceiling() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::repeating("looper", &shell_call("echo again"));

    let mut session = AgentSession::new("looper", model.clone(), Vec::new(), 3).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "never finish", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::CeilingReached);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.tool_calls, 3);
    assert_eq!(model.calls(), 3);
    assert_eq!(terminal_count(&events), 1);
    match events.last() {
        Some(AgentEvent::Done { summary }) => {
            assert!(summary.starts_with("Iteration ceiling reached after 3"))
        }
        other => panic!("expected done, got {other:?}"),
    }
}

#[tokio::test]
async fn test_only_first_tool_call_runs() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let reply = format!("{}\n{}", shell_call("echo first"), shell_call("echo second"));
    let model = ScriptedModel::new("scripted", vec![reply.as_str(), "<done>ok</done>"]);

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "run two things", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.tool_calls, 1);
    let calls = tool_calls(&events);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["command"], "echo first");
    assert_eq!(tool_outputs(&events), vec![("first".to_string(), false)]);
}

#[tokio::test]
async fn test_done_takes_precedence_over_tool_call() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let reply = format!("{}\n<done>all finished</done>", shell_call("touch should-not-exist"));
    let model = ScriptedModel::new("scripted", vec![reply.as_str()]);

    let mut session = AgentSession::new("agent", model.clone(), Vec::new(), 10).unwrap();
    let workdir = session.workdir().unwrap().to_path_buf();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "wrap up", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::Done);
    assert_eq!(outcome.summary, "all finished");
    assert_eq!(outcome.tool_calls, 0);
    assert!(tool_calls(&events).is_empty());
    assert!(!workdir.join("should-not-exist").exists());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_empty_done_gets_default_summary() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new("scripted", vec!["<done></done>"]);

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let outcome = agents.run(&mut session, "nothing to do", &EventSink::discard()).await;
    assert_eq!(outcome.reason, FinishReason::Done);
    assert_eq!(outcome.summary, "Task complete.");
}

#[tokio::test]
async fn test_plain_answer_finishes_run() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new("scripted", vec!["The answer is 4."]);

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "What is 2 + 2?", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::NoAction);
    assert_eq!(outcome.summary, "The answer is 4.");
    assert!(matches!(events.last(), Some(AgentEvent::Done { summary }) if summary == "The answer is 4."));
}

#[tokio::test]
async fn test_native_tool_call_is_rendered_into_history() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let mut arguments = BTreeMap::new();
    arguments.insert("command".to_string(), "echo native".to_string());
    let model = ScriptedModel::with_replies(
        "native",
        vec![
            Ok(ModelReply {
                text: String::new(),
                native_call: Some(ToolInvocation::new("run_shell", arguments)),
            }),
            Ok(ModelReply::text("<done>used a native call</done>")),
        ],
    );

    let mut session = AgentSession::new("agent", model.clone(), Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "say native", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::Done);
    assert_eq!(tool_outputs(&events), vec![("native".to_string(), false)]);

    let second = &model.requests()[1];
    let assistant = second
        .iter()
        .find(|t| t.role == Role::Assistant)
        .expect("assistant turn recorded");
    assert!(assistant.content.contains("<tool_name>run_shell</tool_name>"));
    assert!(assistant.content.contains("<command>echo native</command>"));
}

#[tokio::test]
async fn test_model_error_ends_run_with_error() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::with_replies(
        "broken",
        vec![Err(ChatError::Api {
            provider: Provider::Ollama,
            status: 500,
            body: "model not loaded".to_string(),
        })],
    );

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "anything", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::Failed);
    assert_eq!(terminal_count(&events), 1);
    match events.last() {
        Some(AgentEvent::Error { message }) => assert!(message.contains("model not loaded")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tool_failure_is_fed_back_not_fatal() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new(
        "scripted",
        vec![
            "<tool_call>\n<tool_name>read_file</tool_name>\n<parameters>\n<path>../../etc/passwd</path>\n</parameters>\n</tool_call>",
            "<tool_call>\n<tool_name>no_such_tool</tool_name>\n</tool_call>",
            "<done>gave up</done>",
        ],
    );

    let mut session = AgentSession::new("agent", model.clone(), Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    let outcome = agents.run(&mut session, "read outside", &sink).await;
    drop(sink);
    let events = drain(rx);

    assert_eq!(outcome.reason, FinishReason::Done);
    let outputs = tool_outputs(&events);
    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(|(_, is_error)| *is_error));
    assert!(outputs[1].0.contains("no_such_tool"));

    let third = &model.requests()[2];
    assert!(third.last().unwrap().content.contains("status=\"error\""));
}

#[tokio::test]
async fn test_files_persist_across_iterations() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new(
        "scripted",
        vec![
            "<tool_call>\n<tool_name>write_file</tool_name>\n<parameters>\n<path>notes/plan.txt</path>\n<content>step one</content>\n</parameters>\n</tool_call>",
            "<tool_call>\n<tool_name>read_file</tool_name>\n<parameters>\n<path>notes/plan.txt</path>\n</parameters>\n</tool_call>",
            "<done>read it back</done>",
        ],
    );

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(256);
    agents.run(&mut session, "take notes", &sink).await;
    drop(sink);
    let outputs = tool_outputs(&drain(rx));

    assert_eq!(outputs.len(), 2);
    assert!(!outputs[0].1);
    assert_eq!(outputs[1], ("step one".to_string(), false));
}

#[tokio::test]
async fn test_prior_conversation_is_sent_first() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new("scripted", vec!["<done>continued</done>"]);
    let history = vec![
        ConversationTurn::user("my name is Sam"),
        ConversationTurn::assistant("Nice to meet you."),
    ];

    let mut session = AgentSession::new("agent", model.clone(), history.clone(), 10).unwrap();
    agents.run(&mut session, "what is my name?", &EventSink::discard()).await;

    let first = &model.requests()[0];
    assert_eq!(&first[..2], &history[..]);
    assert_eq!(first[2], ConversationTurn::user("what is my name?"));
    assert!(model.system_prompts()[0].contains("<tool_call>"));
}

#[tokio::test]
async fn test_workdir_removed_after_run() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::new("scripted", vec![shell_call("echo data > out.txt").as_str(), "<done>wrote</done>"]);

    let mut session = AgentSession::new("agent", model, Vec::new(), 10).unwrap();
    let workdir = session.workdir().unwrap().to_path_buf();
    assert!(workdir.is_dir());

    agents.run(&mut session, "write a file", &EventSink::discard()).await;
    assert!(session.workdir().is_none());
    assert!(!workdir.exists());
}

#[tokio::test]
async fn test_disconnected_consumer_cancels_before_model_call() {
    let persistent = tempfile::tempdir().unwrap();
    let agents = host_loop(persistent.path(), 10);
    let model = ScriptedModel::repeating("scripted", "<done>unused</done>");

    let mut session = AgentSession::new("agent", model.clone(), Vec::new(), 10).unwrap();
    let (sink, rx) = EventSink::channel(8);
    drop(rx);
    let outcome = agents.run(&mut session, "anything", &sink).await;

    assert_eq!(outcome.reason, FinishReason::Cancelled);
    assert_eq!(model.calls(), 0);
}
