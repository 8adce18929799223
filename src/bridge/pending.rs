//! 待决请求表
//!
//! 关联 id 到在途请求的映射。每个条目持有一次性的 `oneshot::Sender`，
//! 第一次投递时从表中移除并发送结果，所以重复或迟到的投递找不到条目，
//! 自然成为空操作。

use crate::bridge::protocol::{OutboundRequest, RequestPayload};
use crate::core::error::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use uuid::Uuid;

/// 关联 id（随机 128 位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// 生成新的随机 id
    pub fn generate() -> Self {
        Self(uuid::Builder::from_random_bytes(rand::random::<[u8; 16]>()).into_uuid())
    }

    /// 解析宿主回传的 id；不是合法 UUID 时返回 `None`
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

type Resolver = oneshot::Sender<BridgeResult<Value>>;

/// 在途请求
#[derive(Debug)]
pub struct PendingRequest {
    seq: u64,
    payload: RequestPayload,
    sent: bool,
    resolver: Resolver,
}

impl PendingRequest {
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

/// 待决请求表
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<RequestId, PendingRequest>,
    next_seq: u64,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记请求，返回 id 和结果接收端
    pub fn insert(
        &mut self,
        payload: RequestPayload,
    ) -> (RequestId, oneshot::Receiver<BridgeResult<Value>>) {
        let mut id = RequestId::generate();
        while self.entries.contains_key(&id) {
            tracing::warn!(target: "bridge", "Correlation id collision on {}, regenerating", id);
            id = RequestId::generate();
        }

        let (resolver, rx) = oneshot::channel();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            id,
            PendingRequest {
                seq,
                payload,
                sent: false,
                resolver,
            },
        );
        (id, rx)
    }

    /// 取出所有未发送的请求（按登记顺序）并标记为已发送
    pub fn take_unsent(&mut self) -> Vec<OutboundRequest> {
        let mut unsent: Vec<(u64, RequestId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.sent)
            .map(|(id, entry)| (entry.seq, *id))
            .collect();
        unsent.sort_unstable_by_key(|(seq, _)| *seq);

        unsent
            .into_iter()
            .filter_map(|(_, id)| {
                let entry = self.entries.get_mut(&id)?;
                entry.sent = true;
                Some(OutboundRequest {
                    id,
                    payload: entry.payload.clone(),
                })
            })
            .collect()
    }

    /// 解决请求：先移除条目再发送结果
    ///
    /// id 不在表中时返回 `false`。调用方已丢弃句柄时结果被丢弃。
    pub fn resolve(&mut self, id: &RequestId, result: BridgeResult<Value>) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                if entry.resolver.send(result).is_err() {
                    tracing::trace!(target: "bridge", "Result for {} had no listener", id);
                }
                true
            }
            None => false,
        }
    }

    /// 以同一种错误结束一组请求
    pub fn fail<F>(&mut self, ids: &[RequestId], make_error: F) -> usize
    where
        F: Fn() -> BridgeError,
    {
        ids.iter()
            .filter(|id| self.resolve(id, Err(make_error())))
            .count()
    }

    pub fn get(&self, id: &RequestId) -> Option<&PendingRequest> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn unsent_count(&self) -> usize {
        self.entries.values().filter(|entry| !entry.sent).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 在途请求的句柄
///
/// 可以直接 `.await`，也可以用 [`PendingHandle::on_complete`] 注册回调。
/// 两种方式都消费句柄，结果只会交付一次。丢弃句柄不会撤回请求。
#[derive(Debug)]
pub struct PendingHandle {
    id: RequestId,
    rx: oneshot::Receiver<BridgeResult<Value>>,
    runtime: Handle,
}

impl PendingHandle {
    pub(crate) fn new(
        id: RequestId,
        rx: oneshot::Receiver<BridgeResult<Value>>,
        runtime: Handle,
    ) -> Self {
        Self { id, rx, runtime }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// 注册完成回调，在运行时上调用
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(BridgeResult<Value>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            callback(self.await);
        });
    }

    /// 等待结果并解码为指定类型
    pub async fn wait_as<T: DeserializeOwned>(self) -> BridgeResult<T> {
        let value = self.await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl Future for PendingHandle {
    type Output = BridgeResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_request_id_format() {
        let id = RequestId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(RequestId::parse(&text), Some(id));
        assert_eq!(RequestId::parse("not-an-id"), None);
        assert_eq!(serde_json::to_value(id).unwrap(), json!(text));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut table = PendingTable::new();
        let ids: HashSet<RequestId> = (0..1000)
            .map(|_| table.insert(RequestPayload::GetDbMetadata).0)
            .collect();
        assert_eq!(ids.len(), 1000);
        assert_eq!(table.len(), 1000);
    }

    #[test]
    fn test_take_unsent_marks_sent_once() {
        let mut table = PendingTable::new();
        let (first, _rx1) = table.insert(RequestPayload::GetDbMetadata);
        let (second, _rx2) = table.insert(RequestPayload::GetDbMetadata);

        let batch = table.take_unsent();
        assert_eq!(
            batch.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![first, second]
        );
        assert!(table.get(&first).unwrap().is_sent());
        assert!(table.take_unsent().is_empty());

        let (third, _rx3) = table.insert(RequestPayload::GetDbMetadata);
        let batch = table.take_unsent();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, third);
    }

    #[test]
    fn test_resolve_exactly_once() {
        let mut table = PendingTable::new();
        let (id, mut rx) = table.insert(RequestPayload::GetDbMetadata);

        assert!(table.resolve(&id, Ok(json!(1))));
        assert!(!table.resolve(&id, Ok(json!(2))));
        assert!(table.is_empty());
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!(1));
    }

    #[test]
    fn test_resolve_after_handle_dropped() {
        let mut table = PendingTable::new();
        let (id, rx) = table.insert(RequestPayload::GetDbMetadata);
        drop(rx);
        assert!(table.resolve(&id, Ok(Value::Null)));
    }

    #[test]
    fn test_fail_batch() {
        let mut table = PendingTable::new();
        let (a, mut rx_a) = table.insert(RequestPayload::GetDbMetadata);
        let (b, _rx_b) = table.insert(RequestPayload::GetDbMetadata);
        let failed = table.fail(&[a, b], || BridgeError::Transport("gone".to_string()));
        assert_eq!(failed, 2);
        assert!(matches!(
            rx_a.try_recv().unwrap(),
            Err(BridgeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_await_and_typed_wait() {
        let mut table = PendingTable::new();
        let (id, rx) = table.insert(RequestPayload::GetDbMetadata);
        let handle = PendingHandle::new(id, rx, Handle::current());
        assert_eq!(handle.id(), id);
        table.resolve(&id, Ok(json!({ "n": 3 })));

        #[derive(Deserialize)]
        struct N {
            n: i32,
        }
        let value: N = handle.wait_as().await.unwrap();
        assert_eq!(value.n, 3);
    }

    #[tokio::test]
    async fn test_handle_abandoned() {
        let mut table = PendingTable::new();
        let (id, rx) = table.insert(RequestPayload::GetDbMetadata);
        let handle = PendingHandle::new(id, rx, Handle::current());
        drop(table);
        assert!(matches!(handle.await, Err(BridgeError::Abandoned)));
    }

    #[tokio::test]
    async fn test_on_complete_callback() {
        let mut table = PendingTable::new();
        let (id, rx) = table.insert(RequestPayload::GetDbMetadata);
        let handle = PendingHandle::new(id, rx, Handle::current());

        let (tx, done) = oneshot::channel();
        handle.on_complete(move |result| {
            let _ = tx.send(result.ok());
        });
        table.resolve(&id, Ok(json!("ok")));
        assert_eq!(done.await.unwrap(), Some(json!("ok")));
    }
}
