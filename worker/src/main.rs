use std::{env, io};

use log::{error, info};
use tokio::{net::TcpListener, signal};

use worker::Worker;

const DEFAULT_HOST: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").map_err(io::Error::other)?,
    );

    let listener = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    tokio::select! {
        ret = serve(&listener) => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}

/// Serves masters one at a time, every connection starts from an idle worker.
async fn serve(listener: &TcpListener) -> io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("master connected from {addr}");

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        let mut worker = Worker::new();
        match worker.run(rx, tx).await {
            Ok(()) => info!("session with {addr} finished"),
            Err(e) => error!("session with {addr} failed: {e}"),
        }
    }
}
