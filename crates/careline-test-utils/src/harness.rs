// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `RoutingHarness` assembles a complete routing stack: temp-file SQLite
//! store, mock transports for the `whatsapp` and `webchat` channel kinds,
//! and a mock responder. Provides `user_message()` / `counsellor_message()`
//! to drive the full inbound pipeline in tests.

use std::sync::Arc;
use std::time::Duration;

use careline_config::model::CarelineConfig;
use careline_core::types::{
    ChannelBinding, ClassifierSignal, Counsellor, CounsellorId, InboundMessage, MessageKind,
};
use careline_core::{CarelineError, Store};
use careline_engine::{Dispatcher, RoutingEngine};
use careline_storage::SqliteStore;

use crate::mock_responder::MockResponder;
use crate::mock_transport::MockTransport;

/// Builder for creating routing test environments.
pub struct RoutingHarnessBuilder {
    responses: Vec<String>,
    configure: Option<Box<dyn FnOnce(&mut CarelineConfig) + Send>>,
}

impl RoutingHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            configure: None,
        }
    }

    /// Set mock responder replies.
    pub fn with_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Adjust the default configuration before the engine is built.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut CarelineConfig) + Send + 'static,
    {
        self.configure = Some(Box::new(f));
        self
    }

    /// Build the harness, creating the temp store and wiring the engine.
    pub async fn build(self) -> Result<RoutingHarness, CarelineError> {
        let temp_dir = tempfile::TempDir::new().map_err(CarelineError::storage)?;
        let db_path = temp_dir.path().join("careline-test.db");

        let mut config = CarelineConfig::default();
        config.storage.database_path = db_path.to_string_lossy().to_string();
        if let Some(f) = self.configure {
            f(&mut config);
        }

        let store = Arc::new(SqliteStore::open(&config.storage).await?);

        let whatsapp = Arc::new(MockTransport::new("whatsapp"));
        let webchat = Arc::new(MockTransport::new("webchat"));
        let mut dispatcher =
            Dispatcher::new(Duration::from_secs(config.routing.dispatch_timeout_secs));
        dispatcher.register(whatsapp.clone());
        dispatcher.register(webchat.clone());
        let dispatcher = Arc::new(dispatcher);

        let responder = Arc::new(if self.responses.is_empty() {
            MockResponder::new()
        } else {
            MockResponder::with_replies(self.responses)
        });

        let engine = Arc::new(RoutingEngine::new(
            store.clone(),
            responder.clone(),
            dispatcher.clone(),
            &config,
        ));

        Ok(RoutingHarness {
            engine,
            store,
            dispatcher,
            whatsapp,
            webchat,
            responder,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete routing test environment over a temp database.
///
/// Inbound messages default to the `whatsapp` channel kind; a second
/// `webchat` transport is registered for failover scenarios.
pub struct RoutingHarness {
    /// The routing engine under test.
    pub engine: Arc<RoutingEngine>,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// The dispatcher the engine delivers through, with both mocks registered.
    pub dispatcher: Arc<Dispatcher>,
    /// The mock transport serving the `whatsapp` kind.
    pub whatsapp: Arc<MockTransport>,
    /// The mock transport serving the `webchat` kind.
    pub webchat: Arc<MockTransport>,
    /// The mock bot responder.
    pub responder: Arc<MockResponder>,
    /// The configuration the engine was built with.
    pub config: CarelineConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl RoutingHarness {
    /// Create a new builder for configuring the harness.
    pub fn builder() -> RoutingHarnessBuilder {
        RoutingHarnessBuilder::new()
    }

    /// Drive one user message through the full inbound pipeline.
    pub async fn user_message(&self, sender: &str, text: &str) -> Result<(), CarelineError> {
        self.engine
            .handle_inbound(self.inbound(sender, text, None))
            .await
    }

    /// Drive one user message carrying an upstream classifier signal.
    pub async fn user_message_with_signal(
        &self,
        sender: &str,
        text: &str,
        signal: ClassifierSignal,
    ) -> Result<(), CarelineError> {
        self.engine
            .handle_inbound(self.inbound(sender, text, Some(signal)))
            .await
    }

    /// Drive one message arriving from a counsellor's bound channel id.
    pub async fn counsellor_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<(), CarelineError> {
        self.engine
            .handle_inbound(self.inbound(channel_id, text, None))
            .await
    }

    /// Register a counsellor with a single channel binding.
    ///
    /// The counsellor's username is their id and their contact is the
    /// channel id, matching how the CLI registers them.
    pub async fn add_counsellor(&self, id: &str, name: &str, kind: &str, channel_id: &str) {
        let counsellor = Counsellor {
            id: CounsellorId(id.to_string()),
            name: name.to_string(),
            username: id.to_string(),
            contact: channel_id.to_string(),
            current_ticket: None,
            last_assigned_at: None,
        };
        self.store
            .add_counsellor(&counsellor)
            .await
            .unwrap_or_else(|e| panic!("add counsellor {id}: {e}"));
        self.add_counsellor_channel(id, kind, channel_id, 1).await;
    }

    /// Attach an extra channel binding to an existing counsellor.
    pub async fn add_counsellor_channel(
        &self,
        id: &str,
        kind: &str,
        channel_id: &str,
        priority: i64,
    ) {
        self.store
            .add_channel(&ChannelBinding {
                counsellor_id: CounsellorId(id.to_string()),
                kind: kind.to_string(),
                channel_id: channel_id.to_string(),
                auth_key: None,
                order_priority: priority,
            })
            .await
            .unwrap_or_else(|e| panic!("add channel for {id}: {e}"));
    }

    fn inbound(
        &self,
        sender: &str,
        text: &str,
        signal: Option<ClassifierSignal>,
    ) -> InboundMessage {
        InboundMessage {
            channel: "whatsapp".to_string(),
            sender_id: sender.to_string(),
            content: text.to_string(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now(),
            provider_message_id: None,
            signal,
        }
    }
}
