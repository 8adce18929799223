//! 请求关联与批处理
//!
//! [`Bridge`] 是显式的上下文对象：登记请求、按防抖窗口合并发送、
//! 把宿主回传的结果投递给对应的请求。
//!
//! ```text
//! issue ─► PendingTable (sent=false) ─► kick ─► DebounceScheduler
//!                                                   │ 窗口结束
//!                                                   ▼
//!          Host::perform_script ◄─ encode_envelope ◄─ take_unsent
//!                 ┆ (稍后，独立调度)
//!          receive / receive_one ─► deliver_batch ─► oneshot 解决
//! ```

pub mod entry;
pub mod pending;
pub mod protocol;
pub mod scheduler;
pub mod transport;

pub use pending::{PendingHandle, PendingTable, RequestId};
pub use protocol::RequestPayload;
pub use scheduler::DebounceScheduler;
pub use transport::{ChannelHost, Host, HostCall};

use crate::config::TransportConfig;
use crate::core::error::{BridgeError, BridgeResult};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;

/// 一次投递的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// 成功解决的请求数
    pub resolved: usize,
    /// 未知、迟到或重复的条目数
    pub unknown: usize,
}

#[derive(Default)]
struct BridgeState {
    token: String,
    table: PendingTable,
}

struct BridgeInner {
    state: Mutex<BridgeState>,
    host: Arc<dyn Host>,
    responder_script: String,
    scheduler: DebounceScheduler,
    runtime: Handle,
}

impl BridgeInner {
    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 发送所有未发送的请求，返回本批数量
    fn flush(&self) -> usize {
        // 调用宿主时不持有锁：宿主可能在 perform_script 内同步回调 receive
        let (token, batch) = {
            let mut state = self.lock();
            (state.token.clone(), state.table.take_unsent())
        };
        if batch.is_empty() {
            return 0;
        }

        let ids: Vec<RequestId> = batch.iter().map(|request| request.id).collect();
        let sent = encode_envelope_and_send(self, &token, batch);

        match sent {
            Ok(()) => {
                tracing::debug!(
                    target: "bridge.transport",
                    "Sent batch of {} request(s) to {}",
                    ids.len(),
                    self.responder_script
                );
                ids.len()
            }
            Err(err) => {
                tracing::error!(
                    target: "bridge.transport",
                    "Host call failed, failing {} request(s): {}",
                    ids.len(),
                    err
                );
                let message = err.to_string();
                self.lock()
                    .table
                    .fail(&ids, || BridgeError::Transport(message.clone()));
                0
            }
        }
    }
}

fn encode_envelope_and_send(
    inner: &BridgeInner,
    token: &str,
    batch: Vec<protocol::OutboundRequest>,
) -> BridgeResult<()> {
    let parameter = transport::encode_envelope(token, batch)?;
    inner
        .host
        .perform_script(&inner.responder_script, &parameter)
        .map_err(BridgeError::Transport)
}

/// 桥接上下文
///
/// 克隆开销很小，所有克隆共享同一张待决请求表和同一个防抖计时器。
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// 创建桥接并启动防抖任务
    ///
    /// 必须在 tokio 运行时内调用，否则返回 [`BridgeError::Runtime`]。
    pub fn new<H>(config: &TransportConfig, host: H) -> BridgeResult<Self>
    where
        H: Host + 'static,
    {
        Self::with_shared_host(config, Arc::new(host))
    }

    /// 使用共享的宿主适配器创建桥接
    pub fn with_shared_host(config: &TransportConfig, host: Arc<dyn Host>) -> BridgeResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| BridgeError::Runtime(e.to_string()))?;
        let window = config.debounce();

        let inner = Arc::new_cyclic(|weak: &Weak<BridgeInner>| {
            let weak = weak.clone();
            let scheduler = DebounceScheduler::spawn(&runtime, window, move || {
                match weak.upgrade() {
                    Some(inner) => {
                        inner.flush();
                        true
                    }
                    None => false,
                }
            });
            BridgeInner {
                state: Mutex::new(BridgeState::default()),
                host,
                responder_script: config.responder_script.clone(),
                scheduler,
                runtime: runtime.clone(),
            }
        });

        tracing::info!(
            target: "bridge",
            "Bridge ready (responder: {}, debounce: {:?})",
            config.responder_script,
            window
        );
        Ok(Self { inner })
    }

    /// 设置授权令牌（保存副本）
    pub fn set_key(&self, key: &str) {
        self.inner.lock().token = key.to_owned();
        tracing::debug!(target: "bridge", "Authorization token updated");
    }

    /// 当前令牌的副本
    pub fn token(&self) -> String {
        self.inner.lock().token.clone()
    }

    /// 登记请求并重新开始防抖计时
    pub fn issue(&self, payload: RequestPayload) -> PendingHandle {
        let kind = payload.kind();
        let (id, rx) = self.inner.lock().table.insert(payload);
        tracing::trace!(target: "bridge", "Issued {} as {}", kind, id);
        self.inner.scheduler.kick();
        PendingHandle::new(id, rx, self.inner.runtime.clone())
    }

    /// 立即发送所有未发送的请求，不等待防抖窗口
    pub fn flush_now(&self) -> usize {
        self.inner.flush()
    }

    /// 宿主批量投递入口：`[[id, result], ...]`
    ///
    /// 解析失败只记录日志，不会向宿主抛出。
    pub fn receive(&self, raw: &str) -> DeliveryReport {
        match transport::parse_batch(raw) {
            Ok(entries) => self.deliver_batch(entries),
            Err(err) => {
                tracing::error!(target: "bridge.transport", "Dropping inbound batch: {}", err);
                DeliveryReport::default()
            }
        }
    }

    /// 宿主单条投递入口：`(id, result)`
    pub fn receive_one(&self, id: &str, raw: &str) -> DeliveryReport {
        match transport::parse_single(id, raw) {
            Ok(entry) => self.deliver_batch([entry]),
            Err(err) => {
                tracing::error!(target: "bridge.transport", "Dropping inbound result: {}", err);
                DeliveryReport::default()
            }
        }
    }

    /// 将结果投递给对应请求；未知 id 被跳过
    pub fn deliver_batch<I>(&self, entries: I) -> DeliveryReport
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut report = DeliveryReport::default();
        let mut state = self.inner.lock();
        for (raw_id, result) in entries {
            let resolved = RequestId::parse(&raw_id)
                .map(|id| state.table.resolve(&id, Ok(result)))
                .unwrap_or(false);
            if resolved {
                report.resolved += 1;
            } else {
                report.unknown += 1;
                tracing::debug!(target: "bridge", "Ignoring result for unknown id {}", raw_id);
            }
        }
        report
    }

    /// 在途请求数（含已发送未解决的）
    pub fn pending_count(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// 尚未发送的请求数
    pub fn unsent_count(&self) -> usize {
        self.inner.lock().table.unsent_count()
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("responder_script", &self.inner.responder_script)
            .field("debounce", &self.inner.scheduler.window())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::LayoutTarget;
    use crossbeam_channel::Receiver;
    use serde_json::json;
    use std::time::Duration;

    fn channel_bridge() -> (Bridge, Receiver<HostCall>) {
        let (host, calls) = ChannelHost::new();
        let bridge = Bridge::new(&TransportConfig::default(), host).unwrap();
        (bridge, calls)
    }

    fn layout_meta(name: &str) -> RequestPayload {
        RequestPayload::GetLayoutMetadata(LayoutTarget {
            layout: name.to_string(),
        })
    }

    #[test]
    fn test_requires_runtime() {
        let (host, _calls) = ChannelHost::new();
        let result = Bridge::new(&TransportConfig::default(), host);
        assert!(matches!(result, Err(BridgeError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let (host, _calls) = ChannelHost::new();
        let config = TransportConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            Bridge::new(&config, host),
            Err(BridgeError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_one_transmission() {
        let (bridge, calls) = channel_bridge();
        bridge.set_key("k1");
        let _handles: Vec<_> = (0..3).map(|i| bridge.issue(layout_meta(&format!("L{}", i)))).collect();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let call = calls.try_recv().unwrap();
        assert_eq!(call.script, "WEBVIEWER_BRIDGE_RESPONDER");
        let envelope = call.envelope().unwrap();
        assert_eq!(envelope.token, "k1");
        assert_eq!(envelope.requests.len(), 3);
        assert!(calls.try_recv().is_err());
        assert_eq!(bridge.unsent_count(), 0);
        assert_eq!(bridge.pending_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_requests_are_separate_transmissions() {
        let (bridge, calls) = channel_bridge();
        let _a = bridge.issue(layout_meta("A"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _b = bridge.issue(layout_meta("B"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let first = calls.try_recv().unwrap().envelope().unwrap();
        let second = calls.try_recv().unwrap().envelope().unwrap();
        assert_eq!(first.requests.len(), 1);
        assert_eq!(second.requests.len(), 1);
        assert_ne!(first.requests[0].id, second.requests[0].id);
    }

    #[tokio::test]
    async fn test_delivery_in_any_order() {
        let (bridge, calls) = channel_bridge();
        let first = bridge.issue(layout_meta("A"));
        let second = bridge.issue(layout_meta("B"));
        assert_eq!(bridge.flush_now(), 2);

        let envelope = calls.try_recv().unwrap().envelope().unwrap();
        let ids: Vec<String> = envelope.requests.iter().map(|r| r.id.to_string()).collect();
        let raw = json!([[ids[1], "second"], [ids[0], "first"]]).to_string();

        let report = bridge.receive(&raw);
        assert_eq!(report, DeliveryReport { resolved: 2, unknown: 0 });
        assert_eq!(first.await.unwrap(), json!("first"));
        assert_eq!(second.await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_duplicate_and_unknown_delivery() {
        let (bridge, _calls) = channel_bridge();
        let handle = bridge.issue(layout_meta("A"));
        let other = bridge.issue(layout_meta("B"));
        bridge.flush_now();

        let id = handle.id().to_string();
        assert_eq!(bridge.receive_one(&id, "1").resolved, 1);
        assert_eq!(bridge.receive_one(&id, "2").unknown, 1);
        let stranger = RequestId::generate().to_string();
        assert_eq!(bridge.receive_one(&stranger, "3").unknown, 1);
        assert_eq!(bridge.receive("garbage"), DeliveryReport::default());

        assert_eq!(handle.await.unwrap(), json!(1));
        assert_eq!(bridge.pending_count(), 1);
        drop(other);
    }

    #[tokio::test]
    async fn test_host_failure_fails_batch() {
        let host = |_: &str, _: &str| -> Result<(), String> { Err("no host".to_string()) };
        let bridge = Bridge::new(&TransportConfig::default(), host).unwrap();
        let handle = bridge.issue(layout_meta("A"));
        assert_eq!(bridge.flush_now(), 0);
        assert!(matches!(handle.await, Err(BridgeError::Transport(_))));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_set_key_copies() {
        let (bridge, _calls) = channel_bridge();
        let mut key = String::from("abc");
        bridge.set_key(&key);
        key.push('d');
        assert_eq!(bridge.token(), "abc");
    }
}
