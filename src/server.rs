use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::FrameCodec;
use crate::commands;
use crate::config::Config;
use crate::connection::{self, Connection};
use crate::Result;

/// Binds the configured address and serves clients until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| format!("listen {}: {}", address, e))?;

    serve(listener, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Accepts connections on `listener` until `shutdown` completes or accepting fails.
///
/// Each connection is served by its own task. A failing connection only affects itself, while an
/// accept failure ends the loop and is returned.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("Redis server listening on {}", listener.local_addr()?);

    tokio::select! {
        res = accept_loop(listener, config) => res,
        _ = shutdown => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn accept_loop(listener: TcpListener, config: Config) -> Result<()> {
    // A limit of zero would never admit anyone.
    let connection_limit = Arc::new(Semaphore::new(config.max_connections.max(1)));

    loop {
        // Wait for a connection slot.
        let permit = connection_limit.clone().acquire_owned().await?;

        let (socket, client_address) = listener
            .accept()
            .await
            .map_err(|e| format!("accept: {}", e))?;
        info!("Accepted connection from {:?}", client_address);

        let codec = FrameCodec::new(config.max_frame_size);
        let idle_timeout = config.idle_timeout;

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, codec, idle_timeout).await {
                error!("handle conn: {}", e);
            }
            drop(permit);
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, codec, idle_timeout),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    codec: FrameCodec,
    idle_timeout: Option<Duration>,
) -> std::result::Result<(), connection::Error> {
    let mut conn = Connection::with_codec(stream, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    loop {
        let frame = match conn.read_frame_within(idle_timeout).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                // The stream can't be resynchronized after a framing error, so the client is
                // told why and the connection is dropped.
                if let Some(reply) = e.reply() {
                    if let Err(write_err) = conn.write_reply(reply).await {
                        debug!("Failed to send protocol error: {}", write_err);
                    }
                }
                return Err(e);
            }
        };

        info!("Received command: {}", frame);

        let res = commands::dispatch(frame).unwrap_or_else(|e| {
            warn!("Command failed: {}", e);
            e.reply()
        });

        debug!("Sending response to client: {}", res);
        conn.write_reply(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
