use quill_transport::prelude::*;

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
    let transport = select_transport(None, BackendConfig::from_env()?)?;
    let api = ChatApi::new(transport);

    let providers = api.providers().await?;
    let provider_id = providers.default_provider().map(|p| p.id);

    let mut spec = StreamSpec::new("Stream a greeting.");
    if let Some(id) = provider_id {
        spec = spec.provider_id(id);
    }
    let mut handle = api.send_stream(spec)?;

    while let Some(event) = handle.next_event().await {
        match event {
            StreamEvent::Meta { chat_id } => eprintln!("chat {chat_id}"),
            StreamEvent::Chunk { text } => print!("{text}"),
            StreamEvent::Log { level, message } => eprintln!("[{level:?}] {message}"),
            StreamEvent::Error { message } => eprintln!("stream error: {message}"),
        }
    }
    println!();
    Ok(())
}
