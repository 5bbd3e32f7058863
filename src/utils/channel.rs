use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::handler::TokenEnvelope;

const BUFFER_SIZE: usize = 1;

/// Re-publish the auth loop's output to `subscribers` consumers.
///
/// Every subscriber gets its own bounded channel and sees every token in
/// order. A slow subscriber holds up the others and, through the auth loop's
/// own channel, the loop itself: tokens are delayed, never dropped. A
/// subscriber that drops its receiver is skipped from then on. The forwarding
/// task ends, closing every subscriber, once the auth loop closes its channel.
pub fn fan_out(
    mut rx: Receiver<TokenEnvelope>,
    subscribers: usize,
) -> (Vec<Receiver<TokenEnvelope>>, JoinHandle<()>) {
    let (mut senders, receivers): (Vec<Sender<TokenEnvelope>>, Vec<Receiver<TokenEnvelope>>) =
        (0..subscribers).map(|_| mpsc::channel(BUFFER_SIZE)).unzip();

    let handle = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let mut open = Vec::with_capacity(senders.len());
            for tx in senders {
                if tx.send(envelope.clone()).await.is_ok() {
                    open.push(tx);
                } else {
                    debug!("token subscriber gone");
                }
            }
            senders = open;
            if senders.is_empty() {
                debug!("no token subscribers left");
                break;
            }
        }
        debug!("auth output closed, fan-out finished");
    });
    (receivers, handle)
}
