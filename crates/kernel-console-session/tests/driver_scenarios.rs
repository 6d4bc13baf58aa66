//! REPL driver behaviour against the stub kernel.

mod common;

use kernel_console_core::{EditorError, KernelRequest};
use kernel_console_session::testing::{PromptRecord, ScriptedEditor};
use kernel_console_session::{Session, SessionError, SessionOptions, Step};

use common::{Fixture, fixture, silent_fixture};

fn options(auto_indent: bool) -> SessionOptions {
    SessionOptions {
        display_name: "python3".into(),
        language_hint: Some("python".into()),
        auto_indent,
    }
}

async fn session(
    fx: Fixture,
    editor: &ScriptedEditor,
    auto_indent: bool,
) -> Session<kernel_console_transport::memory::MemoryClient, ScriptedEditor> {
    Session::connect(fx.engine, editor.clone(), options(auto_indent))
        .await
        .unwrap()
}

fn is_complete_queries(requests: &common::RequestLog) -> usize {
    requests.count(|r| matches!(r, KernelRequest::IsComplete { .. }))
}

#[tokio::test]
async fn test_incomplete_block_executes_once_concatenated() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let editor = ScriptedEditor::with_lines(["def f(x):", "    return x"]);
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();

    assert_eq!(requests.executed(), vec!["def f(x):\n    return x"]);
    assert!(session.buffer().is_empty());
}

#[tokio::test]
async fn test_continuation_prompt_gets_indent_hint() {
    let fx = fixture();
    let editor = ScriptedEditor::with_lines(["for i in range(3):", "    pass"]);
    let mut session = session(fx, &editor, true).await;

    session.run().await.unwrap();

    let prompts = editor.prompts();
    assert_eq!(
        prompts[0],
        PromptRecord::Code {
            continuation: false,
            indent: String::new(),
        }
    );
    assert_eq!(
        prompts[1],
        PromptRecord::Code {
            continuation: true,
            indent: "    ".into(),
        }
    );
}

#[tokio::test]
async fn test_indent_hint_ignored_without_auto_indent() {
    let fx = fixture();
    let editor = ScriptedEditor::with_lines(["if x:"]);
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();

    assert_eq!(
        editor.prompts()[1],
        PromptRecord::Code {
            continuation: true,
            indent: String::new(),
        }
    );
}

#[tokio::test]
async fn test_blank_line_without_buffer_sends_nothing() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let editor = ScriptedEditor::default();
    let mut session = session(fx, &editor, false).await;

    assert_eq!(session.step("   ").await, Step::Continue);
    assert_eq!(is_complete_queries(&requests), 0);
    assert!(requests.executed().is_empty());
}

#[tokio::test]
async fn test_blank_line_inside_block_is_kept() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let editor = ScriptedEditor::default();
    let mut session = session(fx, &editor, false).await;

    session.step("class A:").await;
    assert_eq!(session.buffer(), ["class A:"]);

    session.step("").await;
    session.step("    x = 1").await;

    assert_eq!(requests.executed(), vec!["class A:\n\n    x = 1"]);
}

#[tokio::test]
async fn test_complete_line_executes_and_prints() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let output = fx.output.clone();
    let editor = ScriptedEditor::with_lines(["1+1"]);
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();

    assert_eq!(requests.executed(), vec!["1+1"]);
    assert_eq!(output.stdout(), "2\n");
}

#[tokio::test]
async fn test_exit_keyword_stops_loop() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let output = fx.output.clone();
    let editor = ScriptedEditor::with_lines(["exit", "1+1"]);
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();
    session.shutdown().await;

    assert!(requests.executed().is_empty());
    assert!(output.notices().contains(&"Shutting down kernel...".to_string()));
    assert!(
        requests
            .wait_for(|r| matches!(r, KernelRequest::Shutdown { .. }))
            .await
    );
}

#[tokio::test]
async fn test_exit_keyword_inside_block_is_code() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let output = fx.output.clone();
    let editor = ScriptedEditor::with_lines(["while running:", "    quit", "1+1"]);
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();

    assert_eq!(requests.executed(), vec!["while running:\n    quit", "1+1"]);
    assert!(!output.notices().contains(&"Shutting down kernel...".to_string()));
}

#[tokio::test]
async fn test_interrupt_at_prompt_clears_buffer() {
    let fx = fixture();
    let requests = fx.requests.clone();
    let output = fx.output.clone();
    let editor = ScriptedEditor::default();
    editor.push_line(Ok("def f(x):".into()));
    editor.push_line(Err(EditorError::Interrupted));
    editor.push_line(Ok("1+1".into()));
    let mut session = session(fx, &editor, false).await;

    session.run().await.unwrap();

    assert_eq!(requests.executed(), vec!["1+1"]);
    assert!(output.notices().contains(&"KeyboardInterrupt".to_string()));
    assert_eq!(
        editor.prompts()[2],
        PromptRecord::Code {
            continuation: false,
            indent: String::new(),
        }
    );
}

#[tokio::test]
async fn test_banner_uses_kernel_identity() {
    let fx = fixture();
    let output = fx.output.clone();
    let editor = ScriptedEditor::default();
    let mut session = session(fx, &editor, false).await;

    assert_eq!(session.kernel_info().implementation, "stub");
    session.run().await.unwrap();

    assert_eq!(output.notices()[0], "Kernel stub (python) initialized");
}

#[tokio::test]
async fn test_editor_failure_ends_run() {
    let fx = fixture();
    let editor = ScriptedEditor::default();
    editor.push_line(Err(EditorError::Failed("terminal gone".into())));
    let mut session = session(fx, &editor, false).await;

    let result = session.run().await;
    assert!(matches!(result, Err(SessionError::Editor(_))));
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_without_handshake() {
    let (fx, _kernel) = silent_fixture();
    let result = Session::connect(fx.engine, ScriptedEditor::default(), options(false)).await;
    assert!(matches!(result, Err(SessionError::HandshakeTimeout(_))));
}
