//! Range reads and finds
//!
//! [`RecordQuery`] collects offset, limit, sort order, find requests and
//! portal windows, then either fetches one page or streams every match page
//! by page. A find that matches nothing (host code 401) is an empty result,
//! not an error.

use super::response::{ApiEnvelope, RecordResponse};
use super::query::FindRequest;
use super::Layout;
use crate::bridge::protocol::{PortalWindow, ReadRequest, RequestPayload, SortOrder, SortSpec};
use crate::core::error::{BridgeError, BridgeResult};
use crate::records::Record;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RecordQuery {
    layout: Layout,
    offset: u32,
    limit: Option<u32>,
    sort: Vec<SortSpec>,
    requests: Vec<FindRequest>,
    portals: Vec<PortalWindow>,
}

impl RecordQuery {
    pub(crate) fn new(layout: Layout) -> Self {
        Self {
            layout,
            offset: 1,
            limit: None,
            sort: Vec::new(),
            requests: Vec::new(),
            portals: Vec::new(),
        }
    }

    /// 1-based starting record; 0 is treated as 1
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset.max(1);
        self
    }

    /// Page size for [`fetch`](Self::fetch), total cap for [`stream`](Self::stream)
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortSpec {
            field_name: field.into(),
            sort_order: order,
        });
        self
    }

    /// Add a find request; several requests are combined with OR
    pub fn request(mut self, request: FindRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Include a portal, returning `limit` rows starting at `offset`
    pub fn portal(mut self, name: impl Into<String>, offset: u32, limit: u32) -> Self {
        self.portals.push(PortalWindow {
            name: name.into(),
            offset: offset.max(1),
            limit,
        });
        self
    }

    pub fn is_find(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Build the request for one page
    pub fn build(&self, offset: u32, limit: u32) -> BridgeResult<RequestPayload> {
        let settings = self.layout.client().settings();
        let query = self
            .requests
            .iter()
            .map(|request| request.render(settings))
            .collect::<BridgeResult<Vec<_>>>()?;

        let read = ReadRequest {
            layout: self.layout.name().to_string(),
            offset,
            limit,
            query,
            sort: self.sort.clone(),
            portals: self.portals.clone(),
        };
        Ok(if self.is_find() {
            RequestPayload::FindRecord(read)
        } else {
            RequestPayload::GetRecordRange(read)
        })
    }

    /// Fetch one page
    pub async fn fetch(&self) -> BridgeResult<Vec<Record>> {
        let limit = self
            .limit
            .unwrap_or(self.layout.client().config().query.default_limit);
        self.perform(self.offset, limit).await
    }

    async fn perform(&self, offset: u32, limit: u32) -> BridgeResult<Vec<Record>> {
        let metadata = self.layout.metadata().await?;
        let payload = self.build(offset, limit)?;
        let envelope: ApiEnvelope<RecordResponse> =
            self.layout.bridge().issue(payload).wait_as().await?;

        let body = match envelope.into_result() {
            Ok(body) => body,
            Err(BridgeError::Host(err)) if err.is_no_records_match() => {
                tracing::debug!(target: "layout", "No records match on {}", self.layout.name());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        body.data
            .into_iter()
            .map(|data| -> BridgeResult<Record> {
                let entity = data.into_entity(self.layout.name(), Some(&metadata))?;
                Ok(Record::new(self.layout.clone(), entity))
            })
            .collect()
    }

    /// Stream every matching record, fetching `page_size` at a time
    ///
    /// Without an explicit limit the stream runs until the host returns a
    /// short page.
    pub fn stream(self) -> BoxStream<'static, BridgeResult<Record>> {
        let page_size = self.layout.client().config().query.page_size.max(1);
        let state = PageState {
            next_offset: self.offset,
            remaining: self.limit,
            buffer: VecDeque::new(),
            exhausted: false,
            query: self,
        };

        stream::try_unfold(state, move |mut state| async move {
            loop {
                if let Some(record) = state.buffer.pop_front() {
                    return Ok::<_, BridgeError>(Some((record, state)));
                }
                if state.exhausted || state.remaining == Some(0) {
                    return Ok::<_, BridgeError>(None);
                }

                let want = state.remaining.map_or(page_size, |left| left.min(page_size));
                let page = state.query.perform(state.next_offset, want).await?;
                tracing::trace!(
                    target: "layout",
                    "Fetched page of {} at offset {}",
                    page.len(),
                    state.next_offset
                );

                state.exhausted = page.len() < want as usize;
                state.next_offset = state.next_offset.saturating_add(want);
                state.remaining = state.remaining.map(|left| left - want);
                state.buffer.extend(page);
            }
        })
        .boxed()
    }
}

struct PageState {
    query: RecordQuery,
    next_offset: u32,
    remaining: Option<u32>,
    buffer: VecDeque<Record>,
    exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ChannelHost;
    use crate::client::Client;
    use crate::config::BridgeConfig;
    use crate::layout::Query;
    use serde_json::json;

    fn contacts() -> Layout {
        let (host, _calls) = ChannelHost::new();
        Client::new(BridgeConfig::default(), host)
            .unwrap()
            .layout("Contacts")
    }

    #[tokio::test]
    async fn test_plain_range_omits_empty_sections() {
        let query = contacts().range().offset(0);
        assert_eq!(query.offset, 1);
        assert!(!query.is_find());

        let payload = query.build(query.offset, 10).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "type": "getRecordRange", "layout": "Contacts", "offset": 1, "limit": 10 })
        );
    }

    #[tokio::test]
    async fn test_range_with_sort_and_portal_window() {
        let query = contacts()
            .range()
            .sort("Name", SortOrder::Descend)
            .sort("City", SortOrder::Ascend)
            .portal("Phones", 0, 5);

        let payload = query.build(3, 2).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "type": "getRecordRange",
                "layout": "Contacts",
                "offset": 3,
                "limit": 2,
                "sort": [
                    { "fieldName": "Name", "sortOrder": "descend" },
                    { "fieldName": "City", "sortOrder": "ascend" }
                ],
                "portals": [{ "name": "Phones", "offset": 1, "limit": 5 }]
            })
        );
    }

    #[tokio::test]
    async fn test_find_requests_render_in_order_with_omit() {
        let query = contacts()
            .find(FindRequest::new().field("Name", Query::equals("Ada")))
            .request(
                FindRequest::new()
                    .field("City", Query::equals("London"))
                    .omit(),
            );
        assert!(query.is_find());

        let payload = query.build(1, 50).unwrap();
        assert!(matches!(payload, RequestPayload::FindRecord(_)));
        assert_eq!(
            serde_json::to_value(&payload).unwrap()["query"],
            json!([
                { "Name": "==Ada" },
                { "City": "==London", "omit": "true" }
            ])
        );
    }
}
