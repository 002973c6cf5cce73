use std::sync::Arc;
use std::time::Duration;

use relay_components::{EnvelopeTranslator, InboundComponent, OutboundComponent};
use relay_core::{BrokerConfig, ComponentRegistration, TranslatorConfig};
use relay_dispatcher::{BrokerBuilder, RouterBuilder};
use relay_infrastructure::{
    inbound_pair, outbound_pair, outbound_with_replies, MemoryCache,
};

fn translator(cache: Arc<MemoryCache>) -> Arc<EnvelopeTranslator> {
    Arc::new(EnvelopeTranslator::new(cache, TranslatorConfig::default()))
}

#[tokio::test]
async fn test_blocking_call_through_router() {
    let cache = Arc::new(MemoryCache::new());
    let translator = translator(cache.clone());

    let mut builder = RouterBuilder::new();
    let handle = builder
        .register_inbound("ingest", "emit", true, "ingest")
        .unwrap();
    let deliveries = builder.register_outbound("emit", None, "emit").unwrap();
    tokio::spawn(builder.build().unwrap().run());

    // 外部被调方：消费载荷后回话
    let (out_endpoint, mut observed, reply_tx) = outbound_with_replies(4);
    tokio::spawn(
        OutboundComponent::new(
            ComponentRegistration::new("emit"),
            deliveries,
            Arc::new(out_endpoint),
            translator.clone(),
        )
        .run(),
    );
    tokio::spawn(async move {
        while let Some(data) = observed.recv().await {
            assert_eq!(data, b"ping");
            let _ = reply_tx.send(b"pong".to_vec()).await;
        }
    });

    let (client, in_endpoint) = inbound_pair(true, 4);
    tokio::spawn(
        InboundComponent::new(
            ComponentRegistration::new("ingest")
                .with_route("emit")
                .blocking(true),
            Arc::new(in_endpoint),
            translator.clone(),
            handle,
        )
        .run(),
    );

    // 外部调用方发出请求，穿过完整链路拿到被调方的应答
    let reply = client.call(b"ping".to_vec()).await.unwrap();
    assert_eq!(reply, b"pong");

    // 信封记录被恰好一次消费，缓存无泄漏
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_non_blocking_push_through_router() {
    let cache = Arc::new(MemoryCache::new());
    let translator = translator(cache.clone());

    let mut builder = RouterBuilder::new();
    let handle = builder
        .register_inbound("ingest", "emit", false, "ingest")
        .unwrap();
    let deliveries = builder.register_outbound("emit", None, "emit").unwrap();
    tokio::spawn(builder.build().unwrap().run());

    let (out_endpoint, mut observed) = outbound_pair(4);
    tokio::spawn(
        OutboundComponent::new(
            ComponentRegistration::new("emit"),
            deliveries,
            Arc::new(out_endpoint),
            translator.clone(),
        )
        .run(),
    );

    let (client, in_endpoint) = inbound_pair(false, 4);
    tokio::spawn(
        InboundComponent::new(
            ComponentRegistration::new("ingest").with_route("emit"),
            Arc::new(in_endpoint),
            translator.clone(),
            handle,
        )
        .run(),
    );

    client.push(b"data".to_vec()).await.unwrap();
    assert_eq!(observed.recv().await.unwrap(), b"data");

    // 出站侧已消费信封记录
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_pipeline_through_broker() {
    let cache = Arc::new(MemoryCache::new());
    let translator = translator(cache.clone());

    let mut builder = BrokerBuilder::new(BrokerConfig::default());
    let handle = builder.register_inbound("ingest", "emit", "ingest").unwrap();
    let deliveries = builder.register_outbound("emit", "emit").unwrap();
    tokio::spawn(builder.build().unwrap().run());

    let (out_endpoint, mut observed) = outbound_pair(4);
    tokio::spawn(
        OutboundComponent::new(
            ComponentRegistration::new("emit"),
            deliveries,
            Arc::new(out_endpoint),
            translator.clone(),
        )
        .run(),
    );

    let (client, in_endpoint) = inbound_pair(false, 4);
    tokio::spawn(
        InboundComponent::new(
            ComponentRegistration::new("ingest").with_route("emit"),
            Arc::new(in_endpoint),
            translator.clone(),
            handle,
        )
        .run(),
    );

    for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        client.push(payload.clone()).await.unwrap();
        assert_eq!(observed.recv().await.unwrap(), payload);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty().await);
}
