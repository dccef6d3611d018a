//! End-to-end tests: real skeletons on loopback, untyped stubs.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use futures::FutureExt;
use rand::Rng;
use rmi::ContractError;
use rmi::Error;
use rmi::FailureKind;
use rmi::Fault;
use rmi::MethodSignature;
use rmi::REMOTE_FAILURE;
use rmi::RemoteAddress;
use rmi::RemoteObject;
use rmi::ServiceContract;
use rmi::ServiceError;
use rmi::Skeleton;
use rmi::SkeletonConfig;
use rmi::SkeletonListener;
use rmi::SkeletonState;
use rmi::Stub;
use rmi::StubConfig;
use rmi::TcpTransport;
use rmi::Transport;
use rmi::Value;
use rmi::ValueType;
use rmiwire::CallFrame;
use rmiwire::FaultKind;
use rmiwire::Frame;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn text() -> ValueType {
    ValueType::option(ValueType::String)
}

fn echo_contract() -> ServiceContract {
    ServiceContract::interface("demo.Echo")
        .method(MethodSignature::new("echo").param(text()).returns(text()).throws(REMOTE_FAILURE))
        .method(
            MethodSignature::new("slow_echo")
                .param(ValueType::U64)
                .param(ValueType::String)
                .returns(ValueType::String)
                .throws(REMOTE_FAILURE),
        )
        .method(
            MethodSignature::new("fail")
                .returns(ValueType::Unit)
                .throws(REMOTE_FAILURE)
                .throws("demo.Oops"),
        )
        .method(MethodSignature::new("fail_undeclared").throws(REMOTE_FAILURE))
        .method(MethodSignature::new("explode").throws(REMOTE_FAILURE))
}

/// Echoes, sleeps, fails and panics on request. Tracks concurrent calls.
#[derive(Default)]
struct EchoService {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[rmi::async_trait]
impl RemoteObject for EchoService {
    async fn dispatch(&self, method: &MethodSignature, mut args: Vec<Value>) -> Result<Value, Fault> {
        match method.name() {
            "echo" => Ok(args.remove(0)),
            "slow_echo" => {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                let millis = match args[0] {
                    Value::U64(ms) => ms,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(millis)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(args.remove(1))
            }
            "fail" => Err(Fault::application("demo.Oops", "asked to fail")),
            "fail_undeclared" => Err(Fault::application("demo.Secret", "not for you")),
            "explode" => panic!("kaboom"),
            other => Err(Fault::no_such_method(other)),
        }
    }
}

async fn started(skeleton: Skeleton) -> anyhow::Result<(Skeleton, Stub)> {
    skeleton.start().await?;
    let stub = Stub::from_skeleton(&skeleton).await?;
    Ok((skeleton, stub))
}

async fn echo_skeleton() -> anyhow::Result<(Skeleton, Stub)> {
    init_tracing();
    started(Skeleton::new(echo_contract(), EchoService::default())?).await
}

fn some(s: &str) -> Value {
    Value::some(Value::from(s))
}

/// Counts hook invocations.
#[derive(Default, Clone)]
struct Recorder {
    service_errors: Arc<Mutex<Vec<String>>>,
    stops: Arc<AtomicUsize>,
}

impl SkeletonListener for Recorder {
    fn service_error(&self, error: &ServiceError) {
        if let Ok(mut errors) = self.service_errors.lock() {
            errors.push(error.to_string());
        }
    }

    fn stopped(&self, _cause: Option<&std::io::Error>) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Recorder {
    fn errors(&self) -> Vec<String> {
        self.service_errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

// ============================================================================
//  CALLS
// ============================================================================

#[tokio::test]
async fn test_echo_round_trip() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    assert_eq!(stub.invoke("echo", vec![some("ping")]).await?, some("ping"));
    assert_eq!(stub.invoke("echo", vec![Value::none()]).await?, Value::none());

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_application_faults() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    let declared = stub.invoke("fail", vec![]).await.unwrap_err();
    assert_eq!(declared, Fault::application("demo.Oops", "asked to fail"));

    let undeclared = stub.invoke("fail_undeclared", vec![]).await.unwrap_err();
    assert_eq!(undeclared.kind(), Some(FailureKind::Remote));
    assert!(undeclared.message().contains("demo.Secret"));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_panicking_service_object() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    let fault = stub.invoke("explode", vec![]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::Panicked));
    assert!(fault.message().contains("kaboom"));

    // Still serving.
    assert_eq!(stub.invoke("echo", vec![some("after")]).await?, some("after"));
    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_no_such_method() -> anyhow::Result<()> {
    let (skeleton, _) = echo_skeleton().await?;
    let address = skeleton.address().ok_or_else(|| anyhow::anyhow!("no address"))?;

    // The client believes in a method the server never declared, and in a
    // different parameter list for one it did.
    let client_contract = echo_contract()
        .method(MethodSignature::new("shout").param(ValueType::String).throws(REMOTE_FAILURE))
        .method(MethodSignature::new("echo").param(ValueType::S64).returns(ValueType::S64).throws(REMOTE_FAILURE));
    let stub = Stub::new(client_contract, address)?;

    let fault = stub.invoke("shout", vec![Value::from("hey")]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::MethodNotFound));

    let fault = stub.invoke("echo", vec![Value::S64(1)]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::MethodNotFound));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_server_checks_arguments() -> anyhow::Result<()> {
    let (skeleton, _) = echo_skeleton().await?;
    let address = skeleton.address().ok_or_else(|| anyhow::anyhow!("no address"))?;

    // Bypass the stub's own checks with a hand-built call.
    let contract = echo_contract();
    let id = contract.method_id(&contract.methods()[0]);
    let payload = CallFrame::new(99, id, vec![Value::U32(3)]).to_bytes()?;
    let reply = TcpTransport::new(address, StubConfig::default()).call(&payload).await?;

    match Frame::decode(&reply)? {
        Frame::Outcome(outcome) => {
            assert_eq!(outcome.seq, 99);
            let desc = outcome.outcome.unwrap_err();
            assert_eq!(desc.kind, FaultKind::BadArguments);
        }
        other => panic!("expected outcome, got {:?}", other),
    }

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_not_cross_wired() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    let mut set = JoinSet::new();
    for i in 0..64u64 {
        let stub = stub.clone();
        let delay = rand::thread_rng().gen_range(0..20u64);
        set.spawn(async move {
            let input = format!("call-{}", i);
            let output = stub
                .invoke("slow_echo", vec![Value::U64(delay), Value::from(input.clone())])
                .await;
            (input, output)
        });
    }

    let mut seen = 0;
    while let Some(joined) = set.join_next().await {
        let (input, output) = joined?;
        assert_eq!(output?, Value::from(input));
        seen += 1;
    }
    assert_eq!(seen, 64);

    skeleton.stop().await?;
    Ok(())
}

// ============================================================================
//  LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_calls_after_stop_fail_to_connect() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;
    skeleton.stop().await?;
    assert_eq!(skeleton.state(), SkeletonState::Stopped);

    let fault = stub.invoke("echo", vec![some("late")]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::Connect));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_in_flight_call_survives_stop() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    let call = tokio::spawn(async move {
        stub.invoke("slow_echo", vec![Value::U64(300), Value::from("steady")]).await
    });

    while skeleton.in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    skeleton.stop().await?;

    assert_eq!(call.await??, Value::from("steady"));
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_state_errors() -> anyhow::Result<()> {
    init_tracing();
    let skeleton = Skeleton::new(echo_contract(), EchoService::default())?;

    // Unaddressed and not started.
    assert!(matches!(Stub::from_skeleton(&skeleton).await, Err(Error::State(_))));
    // Stopping a stopped skeleton is a no-op.
    skeleton.stop().await?;

    skeleton.start().await?;
    assert_eq!(skeleton.state(), SkeletonState::Running);
    assert!(matches!(skeleton.start().await, Err(Error::State(_))));

    skeleton.stop().await?;
    skeleton.stop().await?;
    assert_eq!(skeleton.state(), SkeletonState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_abandoned_stop_still_stops() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;
    let first = skeleton.address();

    // Poll stop() once, then drop it mid-wait.
    let _ = skeleton.stop().now_or_never();
    tokio::time::timeout(Duration::from_secs(5), async {
        while skeleton.state() != SkeletonState::Stopped {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    skeleton.stop().await?;
    skeleton.start().await?;
    assert_eq!(skeleton.address(), first);
    assert_eq!(stub.invoke("echo", vec![some("back")]).await?, some("back"));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_abandoned_start_rolls_back() -> anyhow::Result<()> {
    init_tracing();
    // A host name makes the bind resolve off-thread, so the first poll pends.
    let skeleton =
        Skeleton::at(echo_contract(), EchoService::default(), RemoteAddress::new("localhost", 0))?;

    let _ = skeleton.start().now_or_never();
    match skeleton.state() {
        SkeletonState::Running => skeleton.stop().await?,
        state => assert_eq!(state, SkeletonState::Stopped),
    }

    let (skeleton, stub) = started(skeleton).await?;
    assert_eq!(stub.invoke("echo", vec![some("fresh")]).await?, some("fresh"));
    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unaddressed_skeleton_listens_on_loopback() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;
    let address = skeleton.address().ok_or_else(|| anyhow::anyhow!("no address"))?;
    assert_eq!(address.host(), "127.0.0.1");
    assert_ne!(address.port(), 0);
    assert_eq!(stub.address(), &address);

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_pre_addressed_skeleton_yields_stub_before_start() -> anyhow::Result<()> {
    init_tracing();
    let skeleton =
        Skeleton::at(echo_contract(), EchoService::default(), RemoteAddress::new("127.0.0.1", 47361))?;

    let stub = Stub::from_skeleton(&skeleton).await?;
    assert_eq!(stub.address(), &RemoteAddress::new("127.0.0.1", 47361));
    assert_eq!(stub, Stub::new(echo_contract(), RemoteAddress::new("127.0.0.1", 47361))?);
    Ok(())
}

#[tokio::test]
async fn test_invalid_contract_rejected_before_any_socket() {
    let contract = echo_contract().method(MethodSignature::new("sneaky").throws("demo.Oops"));
    assert!(matches!(
        Skeleton::new(contract.clone(), EchoService::default()),
        Err(Error::Contract(ContractError::MissingRemoteFailure { .. }))
    ));
    assert!(matches!(
        Stub::new(contract, RemoteAddress::new("127.0.0.1", 1)),
        Err(Error::Contract(_))
    ));
}

#[tokio::test]
async fn test_restart_reuses_port() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;
    let first = skeleton.address();
    skeleton.stop().await?;

    skeleton.start().await?;
    assert_eq!(skeleton.address(), first);
    assert_eq!(stub.invoke("echo", vec![some("again")]).await?, some("again"));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_wildcard_host_and_override() -> anyhow::Result<()> {
    init_tracing();
    let skeleton =
        Skeleton::at(echo_contract(), EchoService::default(), RemoteAddress::new("0.0.0.0", 0))?;
    skeleton.start().await?;

    let stub = Stub::from_skeleton(&skeleton).await?;
    assert!(!stub.address().is_wildcard());
    assert_eq!(stub.invoke("echo", vec![some("wide")]).await?, some("wide"));

    let local = Stub::from_skeleton_with_host(&skeleton, "localhost").await?;
    assert_eq!(local.address().host(), "localhost");
    assert_eq!(Some(local.address().port()), skeleton.address().map(|a| a.port()));
    assert_eq!(local.invoke("echo", vec![some("near")]).await?, some("near"));

    assert!(matches!(
        Stub::from_skeleton_with_host(&skeleton, "").await,
        Err(Error::Contract(ContractError::MissingArgument(_)))
    ));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_serialized_stub_dials_same_skeleton() -> anyhow::Result<()> {
    let (skeleton, stub) = echo_skeleton().await?;

    let shipped = Stub::from_bytes(&stub.to_bytes()?)?;
    assert_eq!(shipped, stub);
    assert_eq!(shipped.invoke("echo", vec![some("parcel")]).await?, some("parcel"));

    skeleton.stop().await?;
    Ok(())
}

// ============================================================================
//  MISBEHAVING CLIENTS
// ============================================================================

#[tokio::test]
async fn test_malformed_stream_is_abandoned() -> anyhow::Result<()> {
    init_tracing();
    let recorder = Recorder::default();
    let skeleton = Skeleton::new(echo_contract(), EchoService::default())?.with_listener(recorder.clone());
    let (skeleton, stub) = started(skeleton).await?;
    let address = skeleton.address().ok_or_else(|| anyhow::anyhow!("no address"))?;

    let mut raw = TcpStream::connect((address.host(), address.port())).await?;
    raw.write_u32_le(4).await?;
    raw.write_all(&[0xEE, 0x01, 0x02, 0x03]).await?;
    let mut buf = Vec::new();
    raw.read_to_end(&mut buf).await?;
    assert!(buf.is_empty());

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("decoding call"), "{}", errors[0]);

    // The listener keeps serving.
    assert_eq!(stub.invoke("echo", vec![some("fine")]).await?, some("fine"));

    skeleton.stop().await?;
    assert_eq!(recorder.stops.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_silent_client_times_out() -> anyhow::Result<()> {
    init_tracing();
    let recorder = Recorder::default();
    let skeleton = Skeleton::new(echo_contract(), EchoService::default())?
        .with_config(SkeletonConfig::default().with_read_timeout(Duration::from_millis(100)))
        .with_listener(recorder.clone());
    let (skeleton, _) = started(skeleton).await?;
    let address = skeleton.address().ok_or_else(|| anyhow::anyhow!("no address"))?;

    let mut raw = TcpStream::connect((address.host(), address.port())).await?;
    let mut buf = Vec::new();
    raw.read_to_end(&mut buf).await?;

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("timed out"), "{}", errors[0]);
    assert_eq!(skeleton.in_flight(), 0);

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_call_times_out_against_silent_server() -> anyhow::Result<()> {
    init_tracing();
    let socket = TcpListener::bind("127.0.0.1:0").await?;
    let port = socket.local_addr()?.port();
    // Accepts and holds every connection without ever answering.
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = socket.accept().await {
            held.push(stream);
        }
    });

    let config = StubConfig::default().with_call_timeout(Some(Duration::from_millis(200)));
    let stub = Stub::new(echo_contract(), RemoteAddress::new("127.0.0.1", port))?.with_config(config);

    let begun = Instant::now();
    let fault = stub.invoke("echo", vec![some("anyone?")]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::Timeout));
    assert!(begun.elapsed() < Duration::from_secs(5));

    silent.abort();
    Ok(())
}

#[tokio::test]
async fn test_oversized_frames() -> anyhow::Result<()> {
    init_tracing();
    let skeleton = Skeleton::new(echo_contract(), EchoService::default())?
        .with_config(SkeletonConfig::default().with_max_frame_len(256));
    let (skeleton, stub) = started(skeleton).await?;

    let big = "x".repeat(1024);
    let fault = stub.invoke("echo", vec![some(&big)]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::Transport));

    let small = stub.clone().with_config(StubConfig::default().with_max_frame_len(8));
    let fault = small.invoke("echo", vec![some("ok")]).await.unwrap_err();
    assert_eq!(fault.kind(), Some(FailureKind::Transport));

    skeleton.stop().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bounded_pool() -> anyhow::Result<()> {
    init_tracing();
    let service = Arc::new(EchoService::default());
    let skeleton = Skeleton::new(echo_contract(), service.clone())?
        .with_config(SkeletonConfig::default().with_max_in_flight(2));
    let (skeleton, stub) = started(skeleton).await?;

    let mut set = JoinSet::new();
    for i in 0..6 {
        let stub = stub.clone();
        set.spawn(async move {
            stub.invoke("slow_echo", vec![Value::U64(50), Value::from(format!("{}", i))]).await
        });
    }
    while let Some(joined) = set.join_next().await {
        joined??;
    }

    assert!(service.peak.load(Ordering::SeqCst) <= 2);
    skeleton.stop().await?;
    Ok(())
}
