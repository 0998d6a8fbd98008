//! Gateway lifecycle: wiring, binding, and running until shutdown.

use crate::backend::{GeminiBackend, GenerativeBackend};
use crate::config::GateConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, GateEvent, GateEventsChannel, GateEventsSender};
use crate::gateway::response::PriceTag;
use crate::gateway::routes::{router, GatewayState};
use crate::payment::{
    InMemoryProofStore, JsonRpcReceiptSource, PaymentVerifier, ProofStore, ReceiptSource,
};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Builder for constructing a gateway.
///
/// Collaborators default to the JSON-RPC receipt source, the in-memory
/// proof store and the Gemini backend; each can be replaced.
pub struct GatewayBuilder {
    config: GateConfig,
    receipts: Option<Arc<dyn ReceiptSource>>,
    store: Option<Arc<dyn ProofStore>>,
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl GatewayBuilder {
    /// Create a new gateway builder with the given configuration.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            receipts: None,
            store: None,
            backend: None,
        }
    }

    /// Use a custom receipt source.
    #[must_use]
    pub fn with_receipt_source(mut self, receipts: Arc<dyn ReceiptSource>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    /// Use a custom used-proof store (e.g. one shared between instances).
    #[must_use]
    pub fn with_proof_store(mut self, store: Arc<dyn ProofStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom generative backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Wire everything together and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a client cannot be
    /// built, or the listen address cannot be bound.
    pub async fn build(self) -> Result<RunningGateway> {
        // The config carries the backend API key, so it is not logged whole.
        info!(
            "Building receipt-gate (listen={}, rpc={}, network={}, price={})",
            self.config.server.listen,
            self.config.chain.rpc_url,
            self.config.chain.network().identity(),
            self.config.payment.display_price()
        );
        self.config.validate()?;

        let requirement = self.config.payment.requirement()?;

        let receipts = match self.receipts {
            Some(receipts) => receipts,
            None => {
                let source = JsonRpcReceiptSource::new(self.config.chain.rpc())?;
                check_chain_id(&source, self.config.chain.chain_id).await;
                Arc::new(source)
            }
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryProofStore::new()));

        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(GeminiBackend::new(self.config.backend.clone())?),
        };
        if !backend.is_configured() {
            warn!("Backend API key is not set - paid requests will be refused");
        }

        let verifier = Arc::new(PaymentVerifier::new(self.config.verifier(), receipts, store));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();

        let state = GatewayState {
            verifier: Arc::clone(&verifier),
            requirement: Arc::new(requirement),
            backend,
            events: events_tx.clone(),
            price: Arc::new(PriceTag {
                display_price: self.config.payment.display_price(),
                network_name: self.config.chain.network_name.clone(),
            }),
            default_model: Arc::from(self.config.backend.default_model.as_str()),
        };

        let listener = TcpListener::bind(self.config.server.listen).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {local_addr}");

        Ok(RunningGateway {
            config: self.config,
            listener: Some(listener),
            local_addr,
            router: router(state),
            verifier,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// Warn when the RPC endpoint serves a different chain than configured.
async fn check_chain_id(source: &JsonRpcReceiptSource, expected: u64) {
    match source.chain_id().await {
        Ok(actual) if actual == expected => {
            info!("RPC endpoint {} serves chain {actual}", source.url());
        }
        Ok(actual) => warn!(
            "RPC endpoint {} serves chain {actual}, configured chain is {expected}",
            source.url()
        ),
        Err(e) => warn!("Could not query chain id from {}: {e}", source.url()),
    }
}

/// Handle that stops a running gateway from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A bound gateway, ready to serve.
pub struct RunningGateway {
    config: GateConfig,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    router: Router,
    verifier: Arc<PaymentVerifier>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: GateEventsSender,
    events_rx: Option<GateEventsChannel>,
}

impl RunningGateway {
    /// Address the gateway is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The payment verifier.
    #[must_use]
    pub fn verifier(&self) -> Arc<PaymentVerifier> {
        Arc::clone(&self.verifier)
    }

    /// Get a receiver for gate events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<GateEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to gate events.
    #[must_use]
    pub fn subscribe_events(&self) -> GateEventsChannel {
        self.events_tx.subscribe()
    }

    /// Handle for stopping the gateway from elsewhere.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Serve requests until shutdown is requested or Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway was already run or the server fails.
    pub async fn run(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::Server("gateway has already been run".to_string()))?;

        info!("Starting receipt-gate on {}", self.local_addr);
        let _ = self.events_tx.send(GateEvent::Started {
            address: self.local_addr.to_string(),
        });

        let mut shutdown_rx = self.shutdown_rx.clone();
        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        let shutdown = async move {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    let _ = shutdown_tx.send(true);
                }
            }
        };

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        let _ = self.events_tx.send(GateEvent::ShuttingDown);
        info!("Gateway shutdown complete");
        Ok(())
    }

    /// Request the gateway to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
