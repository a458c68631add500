use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_transport::{
    ChatApi, EventHandler, HostError, IpcConfig, IpcHost, IpcTransport, ListenerId, LocalIpcHost,
    Method, RequestSpec, StreamEvent, StreamSpec, Transport, TransportError,
};
use serde_json::json;
use tokio::sync::{Semaphore, mpsc};

/// Host whose start command reports each new stream id on the returned
/// channel instead of producing events itself.
fn shell() -> (LocalIpcHost, mpsc::UnboundedReceiver<String>) {
    let host = LocalIpcHost::new();
    let (tx, rx) = mpsc::unbounded_channel();
    host.register_command("dq_send_chat_stream", move |args| {
        let tx = tx.clone();
        async move {
            let id = args["streamId"].as_str().unwrap_or_default().to_string();
            let _ = tx.send(id);
            Ok(serde_json::Value::Null)
        }
    });
    (host, rx)
}

fn transport(host: &LocalIpcHost) -> IpcTransport {
    IpcTransport::new(Arc::new(host.clone()), IpcConfig::default())
}

async fn next_id(ids: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), ids.recv())
        .await
        .expect("stream started")
        .expect("start command invoked")
}

#[tokio::test]
async fn stream_delivers_events_for_its_id_then_releases_listeners() {
    let (host, mut ids) = shell();
    let handle = transport(&host).stream(StreamSpec::new("hi"));
    let id = next_id(&mut ids).await;
    assert_eq!(host.listener_count(None), 5);

    host.emit_stream("dq:meta", &id, json!({"chat_id": 7}));
    host.emit_stream("dq:chunk", &id, json!("He"));
    host.emit_stream("dq:chunk", &id, json!("llo"));
    host.emit_stream("dq:end", &id, json!({"chat_id": 7}));
    host.emit_stream("dq:chunk", &id, json!("after end"));

    let events = handle.collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::meta(7),
            StreamEvent::chunk("He"),
            StreamEvent::chunk("llo"),
        ]
    );
    assert_eq!(host.listener_count(None), 0);
}

#[tokio::test]
async fn concurrent_streams_only_see_their_own_events() {
    let (host, mut ids) = shell();
    let transport = transport(&host);
    let first = transport.stream(StreamSpec::new("one"));
    let a = next_id(&mut ids).await;
    let second = transport.stream(StreamSpec::new("two"));
    let b = next_id(&mut ids).await;
    assert_ne!(a, b);

    host.emit_stream("dq:chunk", &a, json!("a1"));
    host.emit_stream("dq:chunk", &b, json!("b1"));
    host.emit_stream("dq:log", &b, json!("b log"));
    host.emit_stream("dq:chunk", &a, json!("a2"));
    host.emit_stream("dq:chunk", "someone-else", json!("stray"));
    host.emit("dq:chunk", json!("no envelope"));
    host.emit_stream("dq:end", &a, json!(null));
    host.emit_stream("dq:error", &b, json!("b failed"));
    host.emit_stream("dq:end", &b, json!(null));

    assert_eq!(
        first.collect().await,
        vec![StreamEvent::chunk("a1"), StreamEvent::chunk("a2")]
    );
    let second = second.collect().await;
    assert_eq!(second.len(), 3);
    assert_eq!(second[0], StreamEvent::chunk("b1"));
    assert_eq!(second[2], StreamEvent::error("b failed"));
    assert_eq!(host.listener_count(None), 0);
}

#[tokio::test]
async fn cancel_notifies_the_host_exactly_once() {
    let (host, mut ids) = shell();
    let cancelled = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let cancelled = cancelled.clone();
        let calls = calls.clone();
        host.register_command("dq_cancel_stream", move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancelled.lock().expect("lock").push(args);
            async { Ok(serde_json::Value::Null) }
        });
    }

    let handle = transport(&host).stream(StreamSpec::new("hi"));
    let id = next_id(&mut ids).await;
    host.emit_stream("dq:chunk", &id, json!("partial"));

    handle.cancel();
    handle.cancel();
    host.emit_stream("dq:chunk", &id, json!("after cancel"));

    let events = handle.collect().await;
    assert_eq!(events, vec![StreamEvent::chunk("partial")]);

    tokio::time::timeout(Duration::from_secs(2), async {
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cancel command sent");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        cancelled.lock().expect("lock").as_slice(),
        &[json!({"streamId": id})]
    );
    assert_eq!(host.listener_count(None), 0);
}

#[tokio::test]
async fn failed_start_is_reported_in_band() {
    let host = LocalIpcHost::new();
    host.register_command("dq_send_chat_stream", |_| async {
        Err(HostError::from("no provider configured"))
    });

    let events = transport(&host).stream(StreamSpec::new("hi")).collect().await;
    assert_eq!(
        events,
        vec![StreamEvent::error(
            "dq_send_chat_stream failed: no provider configured"
        )]
    );
    assert_eq!(host.listener_count(None), 0);
}

#[tokio::test]
async fn requests_are_routed_to_commands() {
    let host = LocalIpcHost::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        host.register_command("dq_list_chats", move |args| {
            seen.lock().expect("lock").push(args);
            async { Ok(json!([{"id": 1, "title": "First", "provider_id": 2}])) }
        });
    }
    host.register_command("dq_delete_chat", |_| async {
        Err(HostError::from("chat not found"))
    });

    let api = ChatApi::new(Arc::new(transport(&host)));
    let chats = api.list_chats(Some(2)).await.expect("chats");
    assert_eq!(chats[0].id, 1);
    assert_eq!(
        seen.lock().expect("lock").as_slice(),
        &[json!({"providerId": 2})]
    );

    let err = api.delete_chat(4).await.expect_err("missing chat");
    assert_eq!(
        err,
        TransportError::Command {
            command: "dq_delete_chat".into(),
            message: "chat not found".into(),
        }
    );
}

#[tokio::test]
async fn unmapped_route_names_method_and_path() {
    let host = LocalIpcHost::new();
    let err = transport(&host)
        .request_value(RequestSpec::new(Method::Post, "/chats"))
        .await
        .expect_err("unmapped");
    let text = err.to_string();
    assert!(text.contains("POST"));
    assert!(text.contains("/chats"));
}

/// Holds every `listen` call until the test releases a permit.
struct SlowSubscribe {
    inner: LocalIpcHost,
    gate: Arc<Semaphore>,
    subscribed: AtomicUsize,
}

#[async_trait::async_trait]
impl IpcHost for SlowSubscribe {
    async fn invoke(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, HostError> {
        self.inner.invoke(command, args).await
    }

    async fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId, HostError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| HostError(e.to_string()))?
            .forget();
        let id = self.inner.listen(channel, handler).await?;
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) {
        self.inner.unlisten(id);
    }
}

fn counting(host: &LocalIpcHost, command: &'static str) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    host.register_command(command, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(serde_json::Value::Null) }
    });
    calls
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn cancel_while_subscribing_never_starts_the_remote_stream() {
    let local = LocalIpcHost::new();
    let begins = counting(&local, "dq_send_chat_stream");
    let cancels = counting(&local, "dq_cancel_stream");
    let host = Arc::new(SlowSubscribe {
        inner: local.clone(),
        gate: Arc::new(Semaphore::new(0)),
        subscribed: AtomicUsize::new(0),
    });

    let handle = IpcTransport::new(host.clone(), IpcConfig::default()).stream(StreamSpec::new("hi"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    let events = tokio::time::timeout(Duration::from_secs(1), handle.collect())
        .await
        .expect("cancelled stream terminates before setup finishes");
    assert!(events.is_empty());

    host.gate.add_permits(5);
    wait_until("all subscriptions", || {
        host.subscribed.load(Ordering::SeqCst) == 5
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(begins.load(Ordering::SeqCst), 0);
    assert_eq!(cancels.load(Ordering::SeqCst), 0);
    assert_eq!(local.listener_count(None), 0);
}

#[tokio::test]
async fn cancel_while_starting_sends_one_remote_cancel_once_started() {
    let host = LocalIpcHost::new();
    let release = Arc::new(Semaphore::new(0));
    let (started_tx, mut started) = mpsc::unbounded_channel();
    {
        let release = release.clone();
        host.register_command("dq_send_chat_stream", move |args| {
            let release = release.clone();
            let started_tx = started_tx.clone();
            async move {
                let _ = started_tx.send(args["streamId"].as_str().unwrap_or_default().to_string());
                release
                    .acquire()
                    .await
                    .map_err(|e| HostError(e.to_string()))?
                    .forget();
                Ok::<_, HostError>(serde_json::Value::Null)
            }
        });
    }
    let cancelled = Arc::new(Mutex::new(Vec::new()));
    {
        let cancelled = cancelled.clone();
        host.register_command("dq_cancel_stream", move |args| {
            cancelled.lock().expect("lock").push(args);
            async { Ok(serde_json::Value::Null) }
        });
    }

    let handle = transport(&host).stream(StreamSpec::new("hi"));
    let id = next_id(&mut started).await;
    handle.cancel();
    handle.cancel();
    assert!(handle.collect().await.is_empty());
    assert!(
        cancelled.lock().expect("lock").is_empty(),
        "no remote cancel before the start command returns"
    );

    release.add_permits(1);
    wait_until("remote cancel", || !cancelled.lock().expect("lock").is_empty()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        cancelled.lock().expect("lock").as_slice(),
        &[json!({"streamId": id})]
    );
    assert_eq!(host.listener_count(None), 0);
}
