//! In-memory transports for unit tests.

use crate::error::{Result, StemcellError};
use crate::transport::{BodyStream, Transport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::{Method, StatusCode};
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

/// Body that yields `data` and then fails with `kind`.
pub(crate) fn failing_body(data: &[u8], kind: io::ErrorKind) -> BodyStream {
    let chunks = vec![
        Ok(Bytes::copy_from_slice(data)),
        Err(io::Error::new(kind, "connection closed mid-body")),
    ];
    stream::iter(chunks).boxed()
}

/// 206 response whose body is cut short by an unexpected EOF.
pub(crate) fn truncated_response(partial: &[u8]) -> TransportResponse {
    TransportResponse {
        status: StatusCode::PARTIAL_CONTENT,
        content_length: None,
        body: failing_body(partial, io::ErrorKind::UnexpectedEof),
    }
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Result<TransportResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StemcellError::TaskFailed("no scripted response left".into())))
    }
}

/// Serves ranges of an in-memory object, like a well-behaved file server.
///
/// The first request for `truncate_start` is answered with half its bytes
/// followed by an unexpected EOF; requests for `fail_start` get a 500.
pub(crate) struct RangeServer {
    data: Vec<u8>,
    truncate_start: Option<u64>,
    fail_start: Option<u64>,
    truncated_once: Mutex<bool>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl RangeServer {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            truncate_start: None,
            fail_start: None,
            truncated_once: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn truncating_once_at(mut self, start: u64) -> Self {
        self.truncate_start = Some(start);
        self
    }

    pub(crate) fn failing_at(mut self, start: u64) -> Self {
        self.fail_start = Some(start);
        self
    }

    pub(crate) fn range_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.range.is_some())
            .count()
    }
}

#[async_trait]
impl Transport for RangeServer {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if request.method == Method::HEAD {
            let mut response = TransportResponse::from_bytes(StatusCode::OK, Vec::new());
            response.content_length = Some(self.data.len() as u64);
            return Ok(response);
        }

        let Some(range) = request.range else {
            return Ok(TransportResponse::from_bytes(StatusCode::OK, self.data.clone()));
        };

        if self.fail_start == Some(range.start) {
            return Ok(TransportResponse::from_bytes(
                StatusCode::INTERNAL_SERVER_ERROR,
                Vec::new(),
            ));
        }

        let slice = &self.data[range.start as usize..=range.end as usize];
        if self.truncate_start == Some(range.start) {
            let mut truncated = self.truncated_once.lock().unwrap();
            if !*truncated {
                *truncated = true;
                return Ok(truncated_response(&slice[..slice.len() / 2]));
            }
        }

        Ok(TransportResponse::from_bytes(
            StatusCode::PARTIAL_CONTENT,
            slice.to_vec(),
        ))
    }
}
