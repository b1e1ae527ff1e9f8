use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Command, ReplCommand, print_help};
use crate::config::AppConfig;
use crate::llm::{
    LoopError, LoopEvent, LoopOutcome, LoopStatus, OpenAIClient, RequestMode, ToolCall,
    ToolCallLoop, ToolRegistry, Transcript,
};
use crate::tools::{FsStore, MemoryStore, Store, vfs_registry};

/// One conversation: client, tools and transcript.
pub struct Session {
    client: OpenAIClient,
    registry: ToolRegistry,
    transcript: Transcript,
    config: AppConfig,
}

impl Session {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = OpenAIClient::new(config.base_url.clone(), config.api_key.clone())?
            .with_llm_config(config.llm.clone());
        let store: Arc<dyn Store> = match &config.store_root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("create store root {}", root.display()))?;
                Arc::new(FsStore::new(root))
            }
            None => Arc::new(MemoryStore::new()),
        };
        let registry = vfs_registry(store)?;
        let transcript = Transcript::new(config.effective_system_prompt());
        Ok(Self {
            client,
            registry,
            transcript,
            config,
        })
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn reset(&mut self) {
        self.transcript.reset(None);
    }

    pub fn undo(&mut self) -> bool {
        self.transcript.truncate_last_pair()
    }

    pub async fn send(
        &mut self,
        prompt: &str,
        events: Option<Sender<LoopEvent>>,
        cancel: CancellationToken,
    ) -> Result<LoopOutcome, LoopError> {
        self.transcript.add_user(prompt);
        let mode = if self.config.stream {
            RequestMode::Streaming
        } else {
            RequestMode::Batch
        };
        let mut agent = ToolCallLoop::new(&self.client, &self.registry, self.config.model.clone())
            .with_options(self.config.chat_options())
            .with_mode(mode)
            .with_max_rounds(self.config.max_rounds);
        if let Some(tx) = events {
            agent = agent.with_events(tx);
        }
        agent.run(&mut self.transcript, Some(cancel)).await
    }
}

fn require_model(cfg: &AppConfig) -> Result<()> {
    if cfg.model.is_empty() {
        bail!("no model configured; pass --model or set SUSI_MODEL");
    }
    Ok(())
}

/// Routes Ctrl-C for the whole process: it cancels the request in flight,
/// or fires `quit` when nothing is running.
#[derive(Clone, Default)]
struct Interrupts {
    active: Arc<Mutex<Option<CancellationToken>>>,
    quit: CancellationToken,
}

impl Interrupts {
    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token for the next request; Ctrl-C cancels it until `end` is called.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    fn end(&self) {
        *self.slot() = None;
    }

    /// Returns true when a running request was cancelled.
    fn interrupt(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => {
                self.quit.cancel();
                false
            }
        }
    }

    fn listen(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if this.interrupt() {
                    info!("ctrl-c received, cancelling request");
                } else {
                    info!("ctrl-c received while idle, quitting");
                    break;
                }
            }
        })
    }
}

/// A token that fires on Ctrl-C until the returned handle is aborted.
fn cancel_on_ctrl_c() -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let interrupts = Interrupts::default();
    let token = interrupts.begin();
    (token, interrupts.listen())
}

// Blocking stdin reads live on their own thread so the REPL can stop
// waiting for input without stalling runtime shutdown.
fn spawn_line_reader() -> UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Tool call as shown to the user; bulky text fields are left out.
pub(crate) fn describe_call(call: &ToolCall) -> String {
    let args = match serde_json::from_str::<Value>(call.arguments_json()) {
        Ok(Value::Object(mut obj)) => {
            obj.remove("content");
            obj.remove("diff");
            Value::Object(obj).to_string()
        }
        _ => call.arguments_json().to_string(),
    };
    format!("[tool] {}({})", call.name(), args)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

// Runs on its own thread so tokens show while the loop is awaiting the
// server. Returns whether any token was printed.
fn spawn_printer(rx: Receiver<LoopEvent>) -> std::thread::JoinHandle<bool> {
    std::thread::spawn(move || {
        let mut streamed = false;
        let mut stdout = io::stdout();
        for event in rx {
            match event {
                LoopEvent::Token(token) => {
                    streamed = true;
                    print!("{token}");
                    let _ = stdout.flush();
                }
                LoopEvent::ToolCall(call) => {
                    if streamed {
                        println!();
                    }
                    eprintln!("{}", describe_call(&call));
                }
                LoopEvent::ToolResult { name, content, .. } => {
                    eprintln!("[tool] {name} -> {}", first_line(&content));
                }
            }
        }
        streamed
    })
}

async fn ask_and_print(
    session: &mut Session,
    prompt: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = spawn_printer(rx);
    let result = session.send(prompt, Some(tx), cancel).await;
    let streamed = printer.join().unwrap_or(false);
    if streamed {
        println!();
    }

    match result {
        Ok(outcome) => {
            if !streamed {
                println!("{}", outcome.answer);
            }
            if outcome.status == LoopStatus::LoopGuardExceeded {
                warn!(rounds = outcome.rounds, "stopped at round limit");
                eprintln!("(stopped after {} rounds)", outcome.rounds);
            }
            Ok(())
        }
        Err(e) => {
            if !streamed && !e.partial_answer.is_empty() {
                println!("{}", e.partial_answer);
            }
            Err(e.into())
        }
    }
}

async fn run_chat(cfg: AppConfig) -> Result<()> {
    require_model(&cfg)?;
    let mut session = Session::new(cfg)?;
    println!("susi - type /help for commands");
    let interrupts = Interrupts::default();
    let listener = interrupts.listen();
    let mut lines = spawn_line_reader();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let line = tokio::select! {
            _ = interrupts.quit.cancelled() => {
                println!();
                break;
            }
            line = lines.recv() => line,
        };
        let Some(line) = line.transpose()? else {
            break;
        };
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Help => print_help(),
            ReplCommand::Tools => {
                for def in session.registry().definitions() {
                    println!("{:<18} {}", def.name(), def.function.description);
                }
            }
            ReplCommand::Undo => {
                if session.undo() {
                    println!("(dropped last exchange)");
                } else {
                    println!("(nothing to undo)");
                }
            }
            ReplCommand::Reset => {
                session.reset();
                println!("(conversation reset)");
            }
            ReplCommand::Quit => break,
            ReplCommand::Unknown(cmd) => eprintln!("unknown command: {cmd} (try /help)"),
            ReplCommand::Prompt(text) => {
                let cancel = interrupts.begin();
                let result = ask_and_print(&mut session, &text, cancel).await;
                interrupts.end();
                if let Err(e) = result {
                    eprintln!("error: {e:#}");
                }
            }
        }
    }
    listener.abort();
    Ok(())
}

async fn run_ask(cfg: AppConfig, prompt: &str) -> Result<()> {
    require_model(&cfg)?;
    let mut session = Session::new(cfg)?;
    let (cancel, ctrl_c) = cancel_on_ctrl_c();
    let result = ask_and_print(&mut session, prompt, cancel).await;
    ctrl_c.abort();
    result
}

fn client_for(cfg: &AppConfig) -> Result<OpenAIClient> {
    Ok(OpenAIClient::new(cfg.base_url.clone(), cfg.api_key.clone())?
        .with_llm_config(cfg.llm.clone()))
}

fn print_json(value: &Value) -> Result<()> {
    if value.is_null() {
        println!("OK");
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

pub async fn execute(command: Command, cfg: AppConfig) -> Result<()> {
    match command {
        Command::Chat => run_chat(cfg).await,
        Command::Ask { prompt } => run_ask(cfg, &prompt.join(" ")).await,
        Command::Models => {
            let client = client_for(&cfg)?;
            let models = client.list_models(None).await.context("list models")?;
            for m in models {
                let created = m.created().map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                println!("{}\t{}\t{}", m.display_name(), m.owner(), created);
            }
            Ok(())
        }
        Command::Load { name } => {
            let value = client_for(&cfg)?.load_model(&name, None).await?;
            print_json(&value)
        }
        Command::Pull { name } => {
            let (cancel, ctrl_c) = cancel_on_ctrl_c();
            let value = client_for(&cfg)?.pull_model(&name, Some(cancel)).await;
            ctrl_c.abort();
            print_json(&value?)
        }
        Command::Delete { name } => {
            let value = client_for(&cfg)?.delete_model(&name, None).await?;
            print_json(&value)
        }
        Command::Warmup => {
            require_model(&cfg)?;
            let w = client_for(&cfg)?
                .warmup(&cfg.model, &cfg.effective_system_prompt(), None)
                .await
                .context("warmup")?;
            println!("{}", w.answer);
            println!(
                "prompt_tokens={} completion_tokens={} total_tokens={}",
                w.prompt_tokens, w.completion_tokens, w.total_tokens
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;
    use tempfile::tempdir;

    fn config_for(server: &Server, store_root: Option<std::path::PathBuf>) -> AppConfig {
        AppConfig::from_layer(FileConfig {
            base_url: Some(server.url_str("")),
            model: Some("llama3".into()),
            store_root,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn session_writes_through_file_store() {
        let server = Server::run();
        let write_args = json!({"path": "/notes/todo.txt", "content": "buy milk"}).to_string();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .times(2)
                .respond_with(cycle![
                    json_encoded(json!({"choices": [{"message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{"id": "w1", "type": "function",
                            "function": {"name": "vfs_write_file", "arguments": write_args}}]
                    }}]})),
                    json_encoded(json!({"choices": [{"message": {"role": "assistant", "content": "Saved."}}]})),
                ]),
        );
        let dir = tempdir().unwrap();
        let mut session = Session::new(config_for(&server, Some(dir.path().to_path_buf()))).unwrap();

        let outcome = session
            .send("remember milk", None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Saved.");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/todo.txt")).unwrap(),
            "buy milk"
        );
        assert_eq!(session.transcript().len(), 5);

        assert!(session.undo());
        assert_eq!(session.transcript().len(), 3);
        session.reset();
        assert_eq!(session.transcript().len(), 1);
        assert!(session.transcript().system_prompt().contains("vfs_apply_diff"));
    }

    #[test]
    fn describe_call_hides_bulky_fields() {
        let call = ToolCall::new(
            "1",
            "vfs_write_file",
            r#"{"path":"/a.txt","content":"lots of text"}"#,
        );
        assert_eq!(describe_call(&call), r#"[tool] vfs_write_file({"path":"/a.txt"})"#);
        let call = ToolCall::new("2", "vfs_read_file", "not json");
        assert_eq!(describe_call(&call), "[tool] vfs_read_file(not json)");
    }

    #[test]
    fn interrupt_cancels_running_request() {
        let interrupts = Interrupts::default();
        let token = interrupts.begin();
        assert!(interrupts.interrupt());
        assert!(token.is_cancelled());
        assert!(!interrupts.quit.is_cancelled());
    }

    #[test]
    fn interrupt_when_idle_quits() {
        let interrupts = Interrupts::default();
        let token = interrupts.begin();
        interrupts.end();
        assert!(!interrupts.interrupt());
        assert!(interrupts.quit.is_cancelled());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn chat_requires_a_model() {
        assert!(require_model(&AppConfig::default()).is_err());
    }
}
