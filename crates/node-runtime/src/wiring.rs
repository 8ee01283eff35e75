//! Assembles the pipeline for one process run: builds the adapters,
//! constructs each stage's service, spawns the stages selected by
//! [`Mode`], and drives them to a coordinated stop on Ctrl-C (§5).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use shared_bus::{QuitSignal, DEFAULT_CHANNEL_CAPACITY};
use shared_types::config::PipelineConfig;
use shared_types::entities::BlockPayload;

use cid_retriever::{CidRetriever, PgRetrieverStore};
use content_publisher::{ContentPublisher, ContentPublisherApi};
use gap_backfiller::{GapBackfiller, GapBackfillerApi};
use index_repository::{IndexRepository, IndexRepositoryApi, IndexStore};
use screener_server::{Screener, ScreenerServerApi};
use stream_consumer::ports::outbound::ChainCodec;
use stream_consumer::{StreamConfig, StreamConsumer, StreamConsumerApi};

use crate::adapters::{self, HttpArchivalSource, IpfsObjectStore, RealChainCodec, WsUpstreamSubscription};
use crate::Mode;

/// Runs the pipeline selected by `mode` until the process receives a
/// shutdown signal, then waits for every spawned stage to drain.
pub async fn run(mode: Mode, config: PipelineConfig) -> anyhow::Result<()> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_open_connections)
        .min_connections(config.database.max_idle_connections)
        .connect(&config.database.url)
        .await
        .context("connecting to the index database")?;

    let node_store = index_repository::PgIndexStore::new(pool.clone());
    let node_id = node_store
        .ensure_node(&config.node)
        .await
        .context("bootstrapping the eth_nodes row for this chain client")?;

    let object_store = Arc::new(IpfsObjectStore::new(config.client.ipfs_path.clone()));
    let codec: Arc<dyn ChainCodec> = Arc::new(RealChainCodec);

    let upstream = WsUpstreamSubscription::connect(&config.client.ws_endpoint, config.subscription.starting_block)
        .await
        .context("connecting to the upstream chain node")?;

    let mut stream_consumer = StreamConsumer::new(upstream, Arc::clone(&codec), StreamConfig::default());

    let (quit_signal, quit_watch) = QuitSignal::new();
    let mut tasks = Vec::new();
    let mut ws_handle: Option<jsonrpsee::server::ServerHandle> = None;

    let (frames_tx, mut frames_rx) = mpsc::channel::<BlockPayload>(DEFAULT_CHANNEL_CAPACITY);

    {
        let quit_watch = quit_watch.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = stream_consumer.run(frames_tx, quit_watch).await {
                error!(stage = "stream-consumer", %err, "stream consumer exited with an error");
            }
        }));
    }

    if mode.publishes() {
        let publisher = Arc::new(ContentPublisher::new(Arc::clone(&object_store)));
        let indexer = Arc::new(IndexRepository::new(
            Arc::new(index_repository::PgIndexStore::new(pool.clone())),
            node_id,
        ));

        let retriever = Arc::new(CidRetriever::new(Arc::new(PgRetrieverStore::new(pool.clone()))));

        let screener = if mode.serves() {
            Some(Arc::new(Screener::new(Arc::clone(&retriever), Arc::clone(&object_store))))
        } else {
            None
        };

        if let Some(screener) = &screener {
            let server_api: Arc<dyn ScreenerServerApi> = Arc::clone(screener) as Arc<dyn ScreenerServerApi>;

            let handle = adapters::serve_ws(&config.server.ws_endpoint, Arc::clone(&server_api))
                .await
                .context("binding the vulcanizedb websocket endpoint")?;
            ws_handle = Some(handle.clone());
            tasks.push(tokio::spawn(async move {
                handle.stopped().await;
            }));

            let ipc_path = config.server.ipc_path.clone();
            let ipc_quit = quit_watch.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = adapters::serve_ipc(&ipc_path, server_api, ipc_quit).await {
                    error!(stage = "node-runtime", %err, "ipc server exited with an error");
                }
            }));
        }

        {
            let publisher = Arc::clone(&publisher);
            let indexer = Arc::clone(&indexer);
            let screener = screener.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(payload) = frames_rx.recv().await {
                    let block_number = payload.block_number;
                    let published = match publisher.publish(&payload).await {
                        Ok(published) => published,
                        Err(err) => {
                            telemetry::CAP_PUBLISH_FAILURES.inc();
                            error!(stage = "content-publisher", block_number, %err, "dropping block: publish failed");
                            continue;
                        }
                    };

                    if let Err(err) = indexer.index(&published, &payload).await {
                        error!(stage = "index-repository", block_number, %err, "dropping block: index failed");
                        continue;
                    }

                    if let Some(screener) = &screener {
                        screener.on_block(&payload);
                    }
                }
            }));
        }

        if config.backfill.on {
            let archival = HttpArchivalSource::connect(&config.backfill.ipc_path)
                .context("connecting to the archival chain node")?;
            let frequency = Duration::from_secs(config.backfill.frequency_minutes * 60);
            let mut backfiller = GapBackfiller::new(archival, retriever, publisher, indexer, codec, frequency);
            let quit_watch = quit_watch.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = backfiller.run(quit_watch).await {
                    error!(stage = "gap-backfiller", %err, "gap backfiller exited with an error");
                }
            }));
        }
    } else {
        // Sync-only: decode and log, nothing persisted downstream.
        tasks.push(tokio::spawn(async move {
            while let Some(payload) = frames_rx.recv().await {
                info!(block_number = payload.block_number, "decoded block");
            }
        }));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    quit_signal.trigger();
    if let Some(handle) = ws_handle {
        let _ = handle.stop();
    }

    for task in tasks {
        if let Err(err) = task.await {
            warn!(%err, "pipeline task panicked");
        }
    }

    Ok(())
}
