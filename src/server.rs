use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::aof::Aof;
use crate::codec::FrameCodec;
use crate::commands::{parse_request, Context, Registry};
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::Store;
use crate::Result;

/// Listens until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    run_until(config, async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for the shutdown signal: {}", e);
        }
    })
    .await
}

pub async fn run_until(config: Config, shutdown: impl Future<Output = ()>) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let server = Server::open(&config).await?;
    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;

    server.serve(listener, shutdown).await
}

/// Everything connections share: the store, the command table and the append-only file.
#[derive(Clone)]
pub struct Server {
    registry: Arc<Registry>,
    ctx: Context,
    aof: Option<Aof>,
    codec: FrameCodec,
    // Held by write commands from the store mutation until the append, so the file records
    // writes in the order they were applied.
    write_order: Arc<Mutex<()>>,
}

impl Server {
    /// Builds the server state. When the append-only file is enabled it is opened and
    /// replayed into the store first; a corrupt file fails startup.
    pub async fn open(config: &Config) -> Result<Server> {
        let aof = if config.aof_enabled {
            Some(Aof::open(&config.aof_path, config.aof_sync_interval).await?)
        } else {
            None
        };

        let server = Server::with_aof(aof, FrameCodec::new(config.max_frame_size));

        if let Some(aof) = &server.aof {
            let count = server.replay(aof).await?;
            info!(
                "Replayed {} commands from {:?}, {} keys loaded",
                count,
                aof.path(),
                server.ctx.store.len()
            );
        }

        Ok(server)
    }

    fn with_aof(aof: Option<Aof>, codec: FrameCodec) -> Server {
        Server {
            registry: Arc::new(Registry::with_basic_commands()),
            ctx: Context::new(Store::new()),
            aof,
            codec,
            write_order: Arc::default(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    /// Applies every logged command to the store without logging it again.
    async fn replay(&self, aof: &Aof) -> Result<usize> {
        aof.replay(|request| {
            if let Frame::Error(err) = self.registry.execute(&self.ctx, request) {
                warn!("Replayed command failed: {}", err);
            }
        })
        .await
    }

    /// Executes a request and, for successful writes, appends it to the append-only file.
    /// The store is mutated before the append; a failed append turns the reply into an error.
    /// Writes are applied and appended one at a time.
    pub async fn execute(&self, request: Frame) -> Frame {
        let (name, args) = match parse_request(request) {
            Ok(parts) => parts,
            Err(err) => return err.into(),
        };

        let aof = match &self.aof {
            Some(aof) if self.registry.is_write(&name) => aof,
            _ => return self.registry.dispatch(&self.ctx, &name, args),
        };

        let record = log_record(&name, &args);
        let _ordered = self.write_order.lock().await;

        let reply = self.registry.dispatch(&self.ctx, &name, args);
        if matches!(reply, Frame::Error(_)) {
            return reply;
        }

        if let Err(e) = aof.append(&record).await {
            error!("Failed to append {} to the append-only file: {}", record, e);
            return Frame::Error("ERR failed to persist write".to_string());
        }

        reply
    }

    /// Accepts connections until `shutdown` completes, then closes the append-only file.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!("Redis server listening on {}", listener.local_addr()?);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (socket, client_address) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    info!("Accepted connection from {:?}", client_address);

                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, client_address, server).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        if let Some(aof) = &self.aof {
            aof.close().await?;
        }

        Ok(())
    }
}

/// The canonical array-of-bulk-strings form of a write, as stored in the append-only file.
fn log_record(name: &str, args: &[Frame]) -> Frame {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(Frame::Bulk(Bytes::from(name.to_uppercase())));
    parts.extend(args.iter().map(|arg| match arg {
        Frame::Simple(s) => Frame::Bulk(Bytes::from(s.clone())),
        frame => frame.clone(),
    }));
    Frame::Array(parts)
}

#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id, %client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    server: Server,
) -> Result<()> {
    let mut conn = Connection::with_codec(stream, client_address, server.codec.clone());

    tracing::Span::current().record("connection_id", tracing::field::display(conn.id));

    // Requests are answered one at a time, in the order they arrive.
    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);
        let res = server.execute(frame).await;
        debug!("Sending response to client: {}", res);

        conn.write_frame(&res).await?;
    }

    info!("Connection closed");
    Ok(())
}
