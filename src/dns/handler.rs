//! Handler chain for inbound DNS queries
//!
//! Each query is either answered from the pod directory or handed to the
//! next handler. The chain is built explicitly by the caller.

use crate::config::NoMatchPolicy;
use crate::directory::{PodDirectory, RecordSource};
use crate::dns::resolver::{lookup_name, resolve};
use crate::{PodnsError, Result};
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use std::sync::Arc;
use tracing::{debug, info_span, Span};

/// Sink for the response to one query
#[async_trait]
pub trait ResponseWriter: Send {
    async fn write_msg(&mut self, msg: &Message) -> Result<()>;
}

/// One link in the query handling chain.
///
/// Returns the response code written for the query. A handler that wrote
/// nothing returns an error and the server answers SERVFAIL.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn serve_dns(
        &self,
        request: &Message,
        writer: &mut dyn ResponseWriter,
    ) -> Result<ResponseCode>;
}

/// Answers `*.cluster.local.` A queries from the pod directory
pub struct PodDnsHandler<S = PodDirectory> {
    records: S,
    ttl: u32,
    no_match: NoMatchPolicy,
    next: Option<Arc<dyn Handler>>,
    span: Span,
}

impl<S: RecordSource> PodDnsHandler<S> {
    pub fn new(records: S, ttl: u32) -> Self {
        Self {
            records,
            ttl,
            no_match: NoMatchPolicy::default(),
            next: None,
            span: info_span!("pod_dns"),
        }
    }

    pub fn with_no_match(mut self, policy: NoMatchPolicy) -> Self {
        self.no_match = policy;
        self
    }

    /// Handler that receives queries outside the cluster domain
    pub fn with_next(mut self, next: Arc<dyn Handler>) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Build the response for an in-scope query.
    pub fn answer(&self, request: &Message, query: &Query, name: &str) -> Message {
        let mut msg = reply_to(request);
        msg.set_authoritative(true)
            // nslookup and friends complain without it
            .set_recursion_available(true);

        let snapshot = self.records.snapshot();

        match resolve(name, &snapshot) {
            Some(hit) => {
                let mut record =
                    Record::from_rdata(query.name().clone(), self.ttl, RData::A(A(hit.address)));
                record.set_dns_class(query.query_class());
                msg.add_answer(record);
                debug!(
                    lookup = name,
                    pod = %hit.pod_name,
                    address = %hit.address,
                    "Answered from directory"
                );
            }
            None => {
                debug!(lookup = name, records = snapshot.len(), "No matching pod record");
                if self.no_match == NoMatchPolicy::NxDomain {
                    msg.set_response_code(ResponseCode::NXDomain);
                }
            }
        }

        msg
    }

    async fn next_or_failure(
        &self,
        request: &Message,
        writer: &mut dyn ResponseWriter,
        qname: String,
    ) -> Result<ResponseCode> {
        match &self.next {
            Some(next) => {
                debug!(qname = %qname, next = next.name(), "Deferring query");
                next.serve_dns(request, writer).await
            }
            None => Err(PodnsError::NoNextHandler { qname }),
        }
    }
}

#[async_trait]
impl<S: RecordSource> Handler for PodDnsHandler<S> {
    fn name(&self) -> &str {
        "pod_dns"
    }

    async fn serve_dns(
        &self,
        request: &Message,
        writer: &mut dyn ResponseWriter,
    ) -> Result<ResponseCode> {
        let Some(query) = request.queries().first() else {
            return self.next_or_failure(request, writer, ".".to_string()).await;
        };

        let qname = query.name().to_string().to_lowercase();
        self.span.in_scope(|| {
            debug!(
                qname = %qname,
                qtype = %query.query_type(),
                qclass = %query.query_class(),
                "ServeDNS"
            )
        });

        let Some(name) = lookup_name(&qname) else {
            return self.next_or_failure(request, writer, qname).await;
        };

        let response = self.span.in_scope(|| self.answer(request, query, name));
        writer.write_msg(&response).await?;
        Ok(response.response_code())
    }
}

/// Response skeleton echoing the request id, opcode and question
pub fn reply_to(request: &Message) -> Message {
    let mut msg = Message::new();
    msg.set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .add_queries(request.queries().iter().cloned());
    msg
}
