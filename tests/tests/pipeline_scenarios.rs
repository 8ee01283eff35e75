//! Cross-crate scenarios exercising the real stage wiring (fakes standing
//! in for the upstream node, the object store, and Postgres) rather than
//! any single crate's unit-level behavior.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cid_retriever::fakes::{FakeRetrieverStore, HeaderRow, ReceiptRow, TxRow};
use cid_retriever::CidRetriever;
use content_publisher::{ContentPublisher, ContentPublisherApi, InMemoryObjectStore};
use gap_backfiller::fakes::FakeArchivalSource;
use gap_backfiller::{GapBackfiller, GapBackfillerApi};
use index_repository::{FakeIndexStore, IndexRepository, IndexRepositoryApi};
use screener_server::{Screener, ScreenerServerApi};
use shared_bus::QuitSignal;
use shared_types::filters::{CategoryFilter, HeaderFields, ReceiptFields, SubscriptionFilters, TxFields};
use shared_types::ipc::UpstreamFrame;
use stream_consumer::fakes::{FakeCodec, FakeUpstream};
use stream_consumer::{StreamConfig, StreamConsumer, StreamConsumerApi};

fn frame(block_number: u64) -> UpstreamFrame {
    UpstreamFrame {
        block_number,
        headers_rlp: vec![block_number as u8],
        uncles_rlp: vec![],
        transactions_rlp: vec![vec![1]],
        receipts_rlp: vec![vec![0xAA]],
        state_nodes_rlp: BTreeMap::new(),
        storage_nodes_rlp: BTreeMap::new(),
        err_msg: String::new(),
    }
}

async fn decode_one(frame: UpstreamFrame) -> shared_types::entities::BlockPayload {
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let (_signal, watch) = QuitSignal::new();
    let mut consumer = StreamConsumer::new(FakeUpstream::new(vec![frame]), Arc::new(FakeCodec), StreamConfig::default());
    consumer.run(tx, watch).await.unwrap();
    rx.recv().await.expect("decoded payload")
}

/// Scenario 1: a single block with one matching receipt delivered to a
/// subscriber filtering on that receipt's topic0/contract, end to end
/// through decode, publish, index, and live fan-out.
#[tokio::test]
async fn receipt_topic_and_contract_filter_survives_the_whole_pipeline() {
    let payload = decode_one(frame(1)).await;
    assert_eq!(payload.receipts[0].contract, "0x1111");
    assert_eq!(payload.receipts[0].topic0s, vec!["0xaaaa".to_string()]);

    let publisher = ContentPublisher::new(Arc::new(InMemoryObjectStore::new()));
    let published = publisher.publish(&payload).await.unwrap();

    let indexer = IndexRepository::new(Arc::new(FakeIndexStore::new()), 1);
    indexer.index(&published, &payload).await.unwrap();

    let retriever = Arc::new(CidRetriever::new(Arc::new(FakeRetrieverStore::default())));
    let object_store = Arc::new(InMemoryObjectStore::new());
    let screener = Screener::new(retriever, object_store);

    let mut filters = SubscriptionFilters::none();
    filters.receipt = CategoryFilter::On(ReceiptFields {
        topic0s: vec!["0xaaaa".into()],
        contracts: vec!["0x1111".into()],
    });
    let mut handle = screener.subscribe(filters, None);

    screener.on_block(&payload);

    let delivered = handle.frames.recv().await.expect("live delivery");
    assert_eq!(delivered.receipts.len(), 1);
    assert!(delivered.transactions.is_empty(), "tx category was never enabled");

    let tx_store = FakeRetrieverStore {
        transactions: vec![TxRow {
            id: 1,
            block_number: 1,
            hash: "0xtxhash",
            cid: "cccccccccccccccccccccccccccccccccccccccccccccccc",
            src: "0xsrc",
            dst: "0x1111",
        }],
        ..Default::default()
    };
    let tx_retriever = CidRetriever::new(Arc::new(tx_store));
    let mut tx_filters = SubscriptionFilters::none();
    tx_filters.tx = CategoryFilter::On(TxFields {
        src: vec![],
        dst: vec!["0x1111".into()],
    });
    let bundle = tx_retriever.retrieve(&tx_filters, 1).await.unwrap();
    assert_eq!(bundle.transactions.len(), 1, "historical retrieval honors the dst filter too");
}

/// A topic0-only filter (no contract) still matches on the live fan-out
/// path: an unset sub-predicate is dropped from the conjunction, not
/// treated as unsatisfiable.
#[tokio::test]
async fn receipt_topic_only_filter_survives_live_fan_out() {
    let payload = decode_one(frame(2)).await;
    assert_eq!(payload.receipts[0].topic0s, vec!["0xaaaa".to_string()]);

    let retriever = Arc::new(CidRetriever::new(Arc::new(FakeRetrieverStore::default())));
    let object_store = Arc::new(InMemoryObjectStore::new());
    let screener = Screener::new(retriever, object_store);

    let mut filters = SubscriptionFilters::none();
    filters.receipt = CategoryFilter::On(ReceiptFields {
        topic0s: vec!["0xaaaa".into()],
        contracts: vec![],
    });
    let mut handle = screener.subscribe(filters, None);

    screener.on_block(&payload);

    let delivered = handle.frames.recv().await.expect("live delivery");
    assert_eq!(delivered.receipts.len(), 1);
}

/// Scenario 2: re-ingesting an identical block changes nothing in either
/// the object store's CIDs or the index's row counts.
#[tokio::test]
async fn reingesting_an_identical_block_is_idempotent() {
    let payload = decode_one(frame(7)).await;

    let publisher = ContentPublisher::new(Arc::new(InMemoryObjectStore::new()));
    let store = Arc::new(FakeIndexStore::new());
    let indexer = IndexRepository::new(Arc::clone(&store), 1);

    let first = publisher.publish(&payload).await.unwrap();
    indexer.index(&first, &payload).await.unwrap();
    let header_count_after_first = store.header_count();

    let second = publisher.publish(&payload).await.unwrap();
    indexer.index(&second, &payload).await.unwrap();

    assert_eq!(first.header, second.header, "same bytes must address to the same CID");
    assert_eq!(store.header_count(), header_count_after_first);
}

/// Scenario 3: blocks 1, 2, 4, 5 are indexed; the archival source holds
/// block 3. One backfill tick closes the gap.
#[tokio::test]
async fn gap_backfiller_closes_a_single_block_gap() {
    let retriever = Arc::new(CidRetriever::new(Arc::new(FakeRetrieverStore {
        headers: vec![
            HeaderRow { block_number: 1, hash: "0xh1", cid: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", uncle: false },
            HeaderRow { block_number: 2, hash: "0xh2", cid: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", uncle: false },
            HeaderRow { block_number: 4, hash: "0xh4", cid: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", uncle: false },
            HeaderRow { block_number: 5, hash: "0xh5", cid: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", uncle: false },
        ],
        ..Default::default()
    })));

    let archival = FakeArchivalSource::with_blocks(vec![frame(3)]);
    let publisher = Arc::new(ContentPublisher::new(Arc::new(InMemoryObjectStore::new())));
    let indexer = Arc::new(IndexRepository::new(Arc::new(FakeIndexStore::new()), 1));

    let mut backfiller = GapBackfiller::new(
        archival,
        Arc::clone(&retriever),
        Arc::clone(&publisher),
        Arc::clone(&indexer),
        Arc::new(FakeCodec),
        Duration::from_millis(5),
    );

    let before = telemetry::GAPS_BACKFILLED.get();

    let (signal, watch) = QuitSignal::new();
    let task = tokio::spawn(async move { backfiller.run(watch).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    signal.trigger();
    task.await.unwrap().unwrap();

    assert_eq!(telemetry::GAPS_BACKFILLED.get() - before, 1.0);
}

/// Scenario 5: one subscriber never drains its channel; a thousand blocks
/// later the other subscriber has every one of them and the slow
/// subscriber has overflow notices instead of a stalled pipeline.
#[tokio::test]
async fn a_slow_subscriber_never_holds_back_a_fast_one() {
    let retriever = Arc::new(CidRetriever::new(Arc::new(FakeRetrieverStore::default())));
    let object_store = Arc::new(InMemoryObjectStore::new());
    let screener = Screener::new(retriever, object_store);

    let mut slow = screener.subscribe(SubscriptionFilters::all(), None);
    let mut fast = screener.subscribe(SubscriptionFilters::all(), None);

    for n in 0..1000u64 {
        let payload = shared_types::entities::BlockPayload { block_number: n, ..Default::default() };
        screener.on_block(&payload);
    }

    let mut fast_received = 0;
    while fast.frames.try_recv().is_ok() {
        fast_received += 1;
    }
    assert_eq!(fast_received, 1000);

    assert!(slow.errors.try_recv().is_ok(), "slow subscriber should see at least one drop notice");
}

/// Scenario 6: a subscriber opens with a historical range while the tip
/// has already moved on; it sees the replayed range in order, then live
/// blocks.
#[tokio::test]
async fn historical_replay_precedes_live_delivery() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let publisher = ContentPublisher::new(Arc::clone(&object_store));

    let mut payload = shared_types::entities::BlockPayload {
        block_number: 100,
        block_hash: "0xblock100".into(),
        header_bytes: vec![1, 2, 3],
        ..Default::default()
    };
    let published = publisher.publish(&payload).await.unwrap();
    payload.header_bytes = vec![1, 2, 3];

    let header_cid: &'static str = Box::leak(published.header.as_str().to_string().into_boxed_str());

    let retriever = Arc::new(CidRetriever::new(Arc::new(FakeRetrieverStore {
        headers: vec![HeaderRow { block_number: 100, hash: "0xblock100", cid: header_cid, uncle: false }],
        ..Default::default()
    })));

    let screener = Screener::new(Arc::clone(&retriever), Arc::clone(&object_store));

    let mut filters = SubscriptionFilters::none();
    filters.header = CategoryFilter::On(HeaderFields { final_only: false });
    let mut handle = screener.subscribe(filters, Some((100, 100)));

    let replayed = handle.frames.recv().await.expect("historical replay delivers the block");
    assert_eq!(replayed.block_number, 100);
    assert_eq!(replayed.header_bytes, vec![1, 2, 3]);

    let live = shared_types::entities::BlockPayload { block_number: 500, ..Default::default() };
    screener.on_block(&live);

    let next = handle.frames.recv().await.expect("live delivery follows replay");
    assert_eq!(next.block_number, 500);
}
