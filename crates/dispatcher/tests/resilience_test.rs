use std::time::Duration;

use tokio::sync::mpsc;

use relay_core::{
    Delivery, DispatchRequest, DispatcherHandle, ResilienceConfig, RouterMessage, Verdict,
    ROUTE_ACK,
};
use relay_dispatcher::{ResilienceService, RouterBuilder};

fn message(key: &str) -> RouterMessage {
    RouterMessage::new(key, b"payload".to_vec())
}

/// 出站桩：对每条投递回以固定应答
fn spawn_destination(mut deliveries: mpsc::Receiver<Delivery>, response: &'static [u8]) {
    tokio::spawn(async move {
        while let Some(Delivery { reply, .. }) = deliveries.recv().await {
            let _ = reply.send(response.to_vec());
        }
    });
}

/// 调度端桩：确认每条重发请求并把目的地和消息转交观察端
fn spawn_dispatch_stub() -> (DispatcherHandle, mpsc::Receiver<(String, RouterMessage)>) {
    let (tx, mut rx) = mpsc::channel::<DispatchRequest>(64);
    let (seen_tx, seen_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let _ = request.reply.send(ROUTE_ACK.to_vec());
            let _ = seen_tx.send((request.target, request.message)).await;
        }
    });
    (DispatcherHandle::new("resilience", tx), seen_rx)
}

#[tokio::test]
async fn test_completion_without_resend_is_processed_once() {
    let config = ResilienceConfig {
        flush_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let (dispatch, _seen) = spawn_dispatch_stub();
    let (handle, service) = ResilienceService::new(dispatch, config);
    tokio::spawn(service.run());

    assert_eq!(
        handle.dispatched("worker", message("k1")).await.unwrap(),
        Verdict::Ack
    );
    assert_eq!(handle.completed(message("k1")).await.unwrap(), Verdict::Process);
    // 没有重发，再次出现同键完成视为全新一轮
    assert_eq!(handle.completed(message("k1")).await.unwrap(), Verdict::Process);
}

#[tokio::test]
async fn test_flush_resends_and_duplicate_is_suppressed() {
    // 第一轮重发后控制器把周期放大100倍，测试窗口内只发生一轮
    let config = ResilienceConfig {
        flush_interval: Duration::from_millis(100),
        target_redundancy: 0.01,
        max_flush_interval: Some(Duration::from_secs(60)),
        control_channel_capacity: 64,
    };
    let (dispatch, mut seen) = spawn_dispatch_stub();
    let (handle, service) = ResilienceService::new(dispatch, config);
    tokio::spawn(service.run());

    handle.dispatched("worker", message("k1")).await.unwrap();

    // 观察到一次重发：同键同目的地
    let (target, resent) = seen.recv().await.unwrap();
    assert_eq!(target, "worker");
    assert_eq!(resent.key, "k1");

    // 原始完成被处理，重发带来的重复被丢弃
    assert_eq!(handle.completed(message("k1")).await.unwrap(), Verdict::Process);
    assert_eq!(handle.completed(message("k1")).await.unwrap(), Verdict::Skip);
    // 抑制标记已清空，再次出现视为全新一轮
    assert_eq!(handle.completed(message("k1")).await.unwrap(), Verdict::Process);
}

#[tokio::test]
async fn test_completed_message_is_not_resent() {
    let config = ResilienceConfig {
        flush_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let (dispatch, mut seen) = spawn_dispatch_stub();
    let (handle, service) = ResilienceService::new(dispatch, config);
    tokio::spawn(service.run());

    handle.dispatched("worker", message("k1")).await.unwrap();
    handle.completed(message("k1")).await.unwrap();

    // 完成后在途表已空，刷新周期不再产生重发
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn test_router_with_resilience_end_to_end() {
    let config = ResilienceConfig {
        flush_interval: Duration::from_secs(3600),
        ..Default::default()
    };

    let mut builder = RouterBuilder::new();
    let handle = builder
        .register_inbound("ingest", "emit", true, "ingest")
        .unwrap();
    // 重发走同一个路由器：以非阻塞入站身份登记
    let resend_handle = builder
        .register_inbound("resilience", "emit", false, "resilience")
        .unwrap();
    let mut deliveries = builder.register_outbound("emit", None, "emit").unwrap();

    let (notice, service) = ResilienceService::new(resend_handle, config);
    tokio::spawn(service.run());
    tokio::spawn(builder.with_resilience(notice).build().unwrap().run());

    tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            let _ = delivery.reply.send(b"done".to_vec());
        }
    });

    // 派发与完成通知挂接后路由行为不变
    let reply = handle.request("", message("k1")).await.unwrap();
    assert_eq!(reply, b"done");
}

#[tokio::test]
async fn test_completed_reroute_message_is_not_resent() {
    let config = ResilienceConfig {
        flush_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let (dispatch, mut seen) = spawn_dispatch_stub();
    let (notice, service) = ResilienceService::new(dispatch, config);
    tokio::spawn(service.run());

    let mut builder = RouterBuilder::new();
    let handle = builder
        .register_inbound("ingest", "emit", true, "ingest")
        .unwrap();
    let emit_rx = builder
        .register_outbound("emit", Some("audit"), "emit")
        .unwrap();
    let audit_rx = builder.register_outbound("audit", None, "audit").unwrap();
    tokio::spawn(builder.with_resilience(notice).build().unwrap().run());
    spawn_destination(emit_rx, b"computed");
    spawn_destination(audit_rx, b"audit-ack");

    let reply = handle.request("", message("k1")).await.unwrap();
    assert_eq!(reply, b"computed");

    // reroute跳不产生派发通知：完成后在途表已空，刷新周期不再重发
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn test_duplicate_completion_through_router_replies_with_ack() {
    let config = ResilienceConfig {
        flush_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let (dispatch, mut seen) = spawn_dispatch_stub();
    let (notice, service) = ResilienceService::new(dispatch, config);
    tokio::spawn(service.run());

    let mut builder = RouterBuilder::new();
    let handle = builder
        .register_inbound("ingest", "emit", true, "ingest")
        .unwrap();
    let deliveries = builder.register_outbound("emit", None, "emit").unwrap();
    tokio::spawn(
        builder
            .with_resilience(notice.clone())
            .build()
            .unwrap()
            .run(),
    );
    spawn_destination(deliveries, b"real");

    // 制造一次重发：派发后等一个刷新周期才报告完成
    notice.dispatched("emit", message("k1")).await.unwrap();
    let (_, resent) = seen.recv().await.unwrap();
    assert_eq!(resent.key, "k1");
    assert_eq!(notice.completed(message("k1")).await.unwrap(), Verdict::Process);

    // 重发对应的重复完成穿过路由器：真实应答被抑制为固定确认
    let reply = handle.request("", message("k1")).await.unwrap();
    assert_eq!(reply, ROUTE_ACK);
}
