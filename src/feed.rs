//! Raw TCP motion-program feed: every accepted connection is one run.

use tokio::net::TcpListener;

use crate::run::RunController;

pub async fn serve_feed(listener: TcpListener, controller: RunController) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("couldn't accept connection: {}", e);
                continue;
            }
        };
        tracing::info!("accepted connection from {}", peer);
        let controller = controller.clone();
        tokio::spawn(async move {
            match controller.start(stream, &peer.to_string()).await {
                Ok(outcome) => tracing::info!("feed from {} finished: {:?}", peer, outcome),
                Err(e) => tracing::warn!("feed from {} rejected: {}", peer, e),
            }
        });
    }
}
