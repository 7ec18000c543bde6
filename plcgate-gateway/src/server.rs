//! Serves the address space over the Zenoh session.
//!
//! Every variable is published on `<prefix>/<Object>/<Variable>` whenever its
//! value changes, and can be read on demand through a queryable on
//! `<prefix>/**`. `<prefix>/@/browse` answers with the node descriptions.

use std::sync::Arc;

use plcgate_framework::{CancellationToken, Publisher, Result, ServiceError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::query::{Query, Queryable};

use crate::address_space::{AddressSpace, NodeChange};
use crate::codec::SensorField;

/// The serving side of the gateway.
pub struct NodeServer {
    space: Arc<AddressSpace>,
    publisher: Publisher,
    node_keys: Vec<(SensorField, KeyExpr<'static>)>,
    browse_key: KeyExpr<'static>,
    reads: Queryable<FifoChannelHandler<Query>>,
    browse: Queryable<FifoChannelHandler<Query>>,
}

impl NodeServer {
    /// Declare the read and browse queryables.
    ///
    /// Fails if a node key is not a valid key expression or Zenoh refuses a
    /// declaration; the gateway cannot serve anything in that case.
    pub async fn start(space: Arc<AddressSpace>, publisher: Publisher) -> Result<Self> {
        let keys = space.keys().clone();

        let node_keys = space
            .nodes()
            .iter()
            .map(|(field, node)| {
                KeyExpr::try_from(node.key().to_string())
                    .map(|ke| (field, ke))
                    .map_err(|e| ServiceError::startup("node server", e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let browse_key = KeyExpr::try_from(keys.browse_key())
            .map_err(|e| ServiceError::startup("node server", e.to_string()))?;

        let session = publisher.session().clone();
        let reads = session
            .declare_queryable(keys.all_wildcard())
            .await
            .map_err(|e| ServiceError::startup("node server", e.to_string()))?;
        let browse = session
            .declare_queryable(browse_key.clone())
            .await
            .map_err(|e| ServiceError::startup("node server", e.to_string()))?;

        info!(
            server = %space.server_name(),
            endpoint = %space.endpoint_url(),
            namespace = %space.namespace_uri(),
            prefix = %keys.prefix(),
            "Node server started"
        );

        Ok(Self {
            space,
            publisher,
            node_keys,
            browse_key,
            reads,
            browse,
        })
    }

    /// Serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut changes = self.space.subscribe();

        for (field, _) in &self.node_keys {
            self.publish_field(*field).await;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,

                change = changes.recv() => match change {
                    Ok(NodeChange { field, .. }) => self.publish_field(field).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // Values are read fresh on publish, so only intermediate states are lost
                        warn!(skipped, "Node server lagging behind value changes");
                        for (field, _) in &self.node_keys {
                            self.publish_field(*field).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },

                query = self.reads.recv_async() => match query {
                    Ok(query) => self.answer_read(query).await,
                    Err(e) => {
                        warn!(error = %e, "Read queryable closed");
                        break;
                    }
                },

                query = self.browse.recv_async() => match query {
                    Ok(query) => self.answer_browse(query).await,
                    Err(e) => {
                        warn!(error = %e, "Browse queryable closed");
                        break;
                    }
                },
            }
        }

        info!("Node server stopped");
    }

    async fn publish_field(&self, field: SensorField) {
        let node = self.space.node(field);
        let sample = node.sample();

        if let Err(e) = self.publisher.publish(node.key(), &sample).await {
            warn!(node = %node.browse_name(), error = %e, "Failed to publish node sample");
        }
    }

    async fn answer_read(&self, query: Query) {
        let selector = query.key_expr().clone();
        let mut replied = 0usize;

        for (field, key) in &self.node_keys {
            if !selector.intersects(key) {
                continue;
            }

            let sample = self.space.node(*field).sample();
            let payload = match self.publisher.encode(&sample) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(node = %field, error = %e, "Failed to encode node sample");
                    continue;
                }
            };

            match query.reply(key.clone(), payload).await {
                Ok(()) => replied += 1,
                Err(e) => warn!(node = %field, error = %e, "Failed to reply to read"),
            }
        }

        debug!(selector = %selector, replied, "Answered read query");
    }

    async fn answer_browse(&self, query: Query) {
        let nodes = self.space.browse();

        let payload = match self.publisher.encode(&nodes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode browse reply");
                return;
            }
        };

        if let Err(e) = query.reply(self.browse_key.clone(), payload).await {
            warn!(error = %e, "Failed to reply to browse");
        }
    }
}
