//! Serves an echo object on an ephemeral port and calls it through a stub.
//!
//! Run with `RUST_LOG=debug` to watch the call cross the wire.

use rmi::Fault;
use rmi::REMOTE_FAILURE;
use tracing::info;
use tracing_subscriber::EnvFilter;

rmi::remote_interface! {
    pub trait Echo as "demo.Echo" {
        fn echo(s: Option<String>) throws [REMOTE_FAILURE] -> Option<String>;
    }
    stub EchoStub;
    dispatcher EchoDispatcher;
}

struct Parrot;

#[rmi::async_trait]
impl Echo for Parrot {
    async fn echo(&self, s: Option<String>) -> Result<Option<String>, Fault> {
        Ok(s)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let skeleton = EchoDispatcher::new(Parrot).skeleton()?;
    skeleton.start().await?;

    let stub = EchoStub::from_skeleton(&skeleton).await?;
    info!(%stub, "stub ready");

    let reply = stub.echo(Some("ping".to_string())).await?;
    info!(?reply, "echo(\"ping\")");

    let reply = stub.echo(None).await?;
    info!(?reply, "echo(None)");

    skeleton.stop().await?;

    match stub.echo(Some("anyone?".to_string())).await {
        Ok(reply) => info!(?reply, "unexpected reply"),
        Err(fault) => info!(%fault, "call after stop failed as expected"),
    }
    Ok(())
}
