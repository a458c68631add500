//! Drives the IPC adapter against an in-process host that plays the desktop
//! shell's part.

use std::sync::Arc;
use std::time::Duration;

use quill_transport::prelude::*;
use quill_transport::{HostError, IpcHost, LocalIpcHost};

fn fake_shell() -> LocalIpcHost {
    let host = LocalIpcHost::new();
    let emitter = host.clone();
    host.register_command("dq_send_chat_stream", move |args| {
        let emitter = emitter.clone();
        async move {
            let id = args["streamId"]
                .as_str()
                .ok_or_else(|| HostError::from("missing streamId"))?
                .to_string();
            let prompt = args["prompt"].as_str().unwrap_or_default().to_string();
            tokio::spawn(async move {
                emitter.emit_stream("dq:meta", &id, serde_json::json!({ "chat_id": 1 }));
                for word in prompt.split_whitespace() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    emitter.emit_stream("dq:chunk", &id, serde_json::json!(format!("{word} ")));
                }
                emitter.emit_stream("dq:end", &id, serde_json::json!({ "chat_id": 1 }));
            });
            Ok::<_, HostError>(serde_json::Value::Null)
        }
    });
    host.register_command("dq_cancel_stream", |_| async {
        Ok(serde_json::Value::Null)
    });
    host
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("QUILL_LOG_LEVEL")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), TransportError> {
    init_tracing();
    let host: Arc<dyn IpcHost> = Arc::new(fake_shell());
    let api = ChatApi::new(select_transport(Some(host), BackendConfig::default())?);

    let reply = api
        .send_and_collect(StreamSpec::new("echo these words back"))
        .await?;
    let chat_id = reply.chat_id;
    println!("chat {chat_id:?}: {}", reply.into_text()?);
    Ok(())
}
