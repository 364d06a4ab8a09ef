//! TCP connection factory.
//!
//! Each connection is driven by its own task: connect (with a timeout), tune
//! the socket, report `Connected`, then idle on the read half until the peer
//! closes or the pool asks for termination.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;

use surge_core::config::NetworkConfig;
use surge_pool::{
    lifecycle_channel, Connection, ConnectionFactory, LifecycleEvent, LifecycleSender,
    NewConnection,
};

pub struct TcpConnector {
    target: Arc<str>,
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(target: impl Into<Arc<str>>, connect_timeout: Duration, nodelay: bool) -> Self {
        Self {
            target: target.into(),
            connect_timeout,
            nodelay,
        }
    }

    pub fn from_config(network: &NetworkConfig) -> Self {
        Self::new(
            network.target.as_str(),
            network.connect_timeout(),
            network.nodelay,
        )
    }
}

impl ConnectionFactory for TcpConnector {
    fn connect(&self) -> Result<NewConnection> {
        let (events_tx, events_rx) = lifecycle_channel();
        let terminate = Arc::new(Notify::new());

        tokio::spawn(drive(
            self.target.clone(),
            self.connect_timeout,
            self.nodelay,
            terminate.clone(),
            events_tx,
        ));

        Ok(NewConnection::new(TcpHandle { terminate }, events_rx))
    }
}

struct TcpHandle {
    terminate: Arc<Notify>,
}

impl Connection for TcpHandle {
    fn terminate(&self) {
        // notify_one stores a permit, so a terminate issued before the task
        // starts waiting is not lost.
        self.terminate.notify_one();
    }
}

fn configure(stream: &TcpStream, nodelay: bool) -> Result<()> {
    stream.set_nodelay(nodelay).context("TCP_NODELAY")?;
    SockRef::from(stream)
        .set_keepalive(true)
        .context("SO_KEEPALIVE")?;
    Ok(())
}

async fn drive(
    target: Arc<str>,
    connect_timeout: Duration,
    nodelay: bool,
    terminate: Arc<Notify>,
    events: LifecycleSender,
) {
    let attempt = tokio::select! {
        _ = terminate.notified() => {
            let _ = events.send(LifecycleEvent::Disconnected);
            return;
        }
        r = tokio::time::timeout(connect_timeout, TcpStream::connect(&*target)) => r,
    };

    let mut stream = match attempt {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let err = anyhow::Error::new(e).context(format!("connect to {target}"));
            let _ = events.send(LifecycleEvent::Error(err));
            return;
        }
        Err(_) => {
            let err = anyhow!(
                "connect to {target} timed out after {}ms",
                connect_timeout.as_millis()
            );
            let _ = events.send(LifecycleEvent::Error(err));
            return;
        }
    };

    if let Err(e) = configure(&stream, nodelay) {
        tracing::warn!(error = %format!("{e:#}"), "failed to tune socket");
    }
    let _ = events.send(LifecycleEvent::Connected);

    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            _ = terminate.notified() => break,
            r = stream.read(&mut buf) => match r {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) => {
                    let _ = events.send(LifecycleEvent::Error(e.into()));
                    return;
                }
            },
        }
    }

    let _ = stream.shutdown().await;
    let _ = events.send(LifecycleEvent::Disconnected);
}
