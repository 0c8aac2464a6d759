//! Asynchronous fetching loop.

use std::future::Future;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{
    SinkExt, StreamExt,
    channel::mpsc::{Receiver, Sender},
    future::{Either, select, select_all},
};

use crate::engine::Stats;
use crate::mercator::TileId;

/// Why a single tile could not be produced. This never takes down a render pass; the engine
/// leaves the slot without a payload and carries on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Transport(String),

    #[error("payload is not a valid raster image: {0}")]
    Decode(#[from] image::ImageError),
}

/// One finished fetch, successful or not, on its way back to the render thread.
pub(crate) type Completion = (TileId, Result<Bytes, FetchError>);

/// The capability to produce one tile's payload. Implemented over HTTP by
/// [`crate::HttpFetch`]; tests substitute their own.
pub trait Fetch {
    type Error: std::error::Error + Send + Sync;

    fn fetch(&self, tile_id: TileId) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;

    /// How many fetches may be in flight at once. Requests beyond this limit wait their turn.
    fn max_concurrency(&self) -> usize;
}

#[derive(Debug, thiserror::Error)]
enum LoopError {
    #[error("Tile request channel from the render thread was broken.")]
    RequestChannelBroken,

    #[error("Completion channel to the render thread was closed.")]
    CompletionChannelClosed,

    #[error("Completion channel to the render thread was full.")]
    CompletionChannelFull,

    #[error("Poison error.")]
    Poisoned,
}

impl From<futures::channel::mpsc::SendError> for LoopError {
    fn from(error: futures::channel::mpsc::SendError) -> Self {
        if error.is_disconnected() {
            Self::CompletionChannelClosed
        } else {
            Self::CompletionChannelFull
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for LoopError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// Fetch one tile and check that the payload is something a renderer will be able to decode.
/// Decoding for display is not this crate's job, but a garbage body must fail here, not there.
async fn fetch_one<F: Fetch>(fetch: &F, tile_id: TileId) -> Completion {
    let result = match fetch.fetch(tile_id).await {
        Ok(bytes) => match image::load_from_memory(&bytes) {
            Ok(_) => Ok(bytes),
            Err(error) => Err(FetchError::Decode(error)),
        },
        Err(error) => Err(FetchError::Transport(error.to_string())),
    };

    (tile_id, result)
}

async fn deliver(mut completion_tx: Sender<Completion>, completion: Completion) -> Result<(), LoopError> {
    if let Err(error) = &completion.1 {
        log::warn!("Tile {} failed: {error}.", completion.0);
    }

    completion_tx.send(completion).await.map_err(LoopError::from)
}

async fn fetch_continuously_impl<F: Fetch>(
    fetch: F,
    stats: Arc<Mutex<Stats>>,
    mut request_rx: Receiver<TileId>,
    completion_tx: Sender<Completion>,
) -> Result<(), LoopError> {
    let mut outstanding = Vec::new();

    loop {
        if outstanding.is_empty() {
            // Only new fetches might be requested.
            let tile_id = request_rx
                .next()
                .await
                .ok_or(LoopError::RequestChannelBroken)?;
            outstanding.push(Box::pin(fetch_one(&fetch, tile_id)));
        } else if outstanding.len() < fetch.max_concurrency() {
            // New fetches might be requested or ongoing ones might complete.
            match select(request_rx.next(), select_all(outstanding.drain(..))).await {
                // New fetch was requested.
                Either::Left((request, remaining)) => {
                    let tile_id = request.ok_or(LoopError::RequestChannelBroken)?;
                    outstanding = remaining.into_inner();
                    outstanding.push(Box::pin(fetch_one(&fetch, tile_id)));
                }
                // Ongoing fetch completed.
                Either::Right(((completion, _, remaining), _)) => {
                    deliver(completion_tx.clone(), completion).await?;
                    outstanding = remaining;
                }
            }
        } else {
            // At the limit; only ongoing fetches might complete.
            let (completion, _, remaining) = select_all(outstanding.drain(..)).await;
            deliver(completion_tx.clone(), completion).await?;
            outstanding = remaining;
        }

        // Update stats.
        let mut stats = stats.lock()?;
        stats.in_progress = outstanding.len();
    }
}

/// Continuously fetch tiles requested via the request channel.
pub(crate) async fn fetch_continuously<F: Fetch>(
    fetch: F,
    stats: Arc<Mutex<Stats>>,
    request_rx: Receiver<TileId>,
    completion_tx: Sender<Completion>,
) {
    match fetch_continuously_impl(fetch, stats, request_rx, completion_tx).await {
        Ok(())
        | Err(LoopError::CompletionChannelClosed)
        | Err(LoopError::RequestChannelBroken) => {
            log::debug!("Tile fetch loop finished.");
        }
        Err(error) => {
            log::error!("Tile fetch loop failed: {error}.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::png_tile;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::channel::mpsc::channel;

    #[derive(Debug, thiserror::Error)]
    #[error("tile not served")]
    struct NotServed;

    static TILE_ID: TileId = TileId {
        x: 1,
        y: 2,
        zoom: 3,
    };

    /// Serves prepared payloads immediately.
    struct StaticFetch {
        tiles: HashMap<TileId, Bytes>,
    }

    impl Fetch for StaticFetch {
        type Error = NotServed;

        fn fetch(&self, tile_id: TileId) -> impl Future<Output = Result<Bytes, NotServed>> + Send {
            let result = self.tiles.get(&tile_id).cloned().ok_or(NotServed);
            async move { result }
        }

        fn max_concurrency(&self) -> usize {
            2
        }
    }

    fn spawn_loop(
        fetch: impl Fetch + Send + Sync + 'static,
    ) -> (Sender<TileId>, Receiver<Completion>, Arc<Mutex<Stats>>) {
        let stats = Arc::new(Mutex::new(Stats::default()));
        let (request_tx, request_rx) = channel(8);
        let (completion_tx, completion_rx) = channel(8);
        tokio::spawn(fetch_continuously(
            fetch,
            stats.clone(),
            request_rx,
            completion_tx,
        ));
        (request_tx, completion_rx, stats)
    }

    #[tokio::test]
    async fn payload_is_passed_through_unchanged() {
        let _ = env_logger::try_init();

        let payload = png_tile();
        let (mut request_tx, mut completion_rx, _) = spawn_loop(StaticFetch {
            tiles: HashMap::from([(TILE_ID, payload.clone())]),
        });

        request_tx.send(TILE_ID).await.unwrap();

        let (tile_id, result) = completion_rx.next().await.unwrap();
        assert_eq!(TILE_ID, tile_id);
        assert_eq!(payload, result.unwrap());
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_failure() {
        let _ = env_logger::try_init();

        let (mut request_tx, mut completion_rx, _) = spawn_loop(StaticFetch {
            tiles: HashMap::from([(TILE_ID, Bytes::from_static(b"definitely not an image"))]),
        });

        request_tx.send(TILE_ID).await.unwrap();

        let (_, result) = completion_rx.next().await.unwrap();
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_tile_is_a_transport_failure() {
        let _ = env_logger::try_init();

        let (mut request_tx, mut completion_rx, _) = spawn_loop(StaticFetch {
            tiles: HashMap::new(),
        });

        request_tx.send(TILE_ID).await.unwrap();

        let (_, result) = completion_rx.next().await.unwrap();
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    /// Blocks every fetch on a shared gate, recording how many run at once.
    struct GaugedFetch {
        gate: Arc<tokio::sync::Semaphore>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Fetch for GaugedFetch {
        type Error = NotServed;

        fn fetch(&self, _: TileId) -> impl Future<Output = Result<Bytes, NotServed>> + Send {
            let gate = self.gate.clone();
            let running = self.running.clone();
            let peak = self.peak.clone();

            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);

                #[allow(clippy::unwrap_used)]
                let _permit = gate.acquire_owned().await.unwrap();

                running.fetch_sub(1, Ordering::SeqCst);
                Ok(png_tile())
            }
        }

        fn max_concurrency(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn no_more_than_max_concurrency_fetches_run_at_once() {
        let _ = env_logger::try_init();

        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (mut request_tx, mut completion_rx, stats) = spawn_loop(GaugedFetch {
            gate: gate.clone(),
            running: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        });

        for x in 0..5 {
            request_tx.send(TileId { x, y: 1, zoom: 10 }).await.unwrap();
        }

        // Give the loop time to start everything it is willing to start.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(2, peak.load(Ordering::SeqCst));

        gate.add_permits(5);
        for _ in 0..5 {
            completion_rx.next().await.unwrap().1.unwrap();
        }
        assert_eq!(2, peak.load(Ordering::SeqCst));

        // The loop updates stats after handing over the last completion.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(0, stats.lock().unwrap().in_progress);
    }
}
