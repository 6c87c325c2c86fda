//! Shared fixtures for unit tests

use backstage_gateway::{Gateway, MemorySnapshotStore};
use backstage_testing::{test_clock, RecordingRedirect, ScriptedTransport};
use std::sync::Arc;

use crate::environment::StoreEnvironment;

/// Environment over a transport with no scripted routes
pub(crate) fn env() -> StoreEnvironment<ScriptedTransport> {
    env_with(ScriptedTransport::new()).0
}

/// Environment over `transport`, with a fixed clock and a recording redirect
pub(crate) fn env_with(
    transport: ScriptedTransport,
) -> (StoreEnvironment<ScriptedTransport>, Arc<RecordingRedirect>) {
    let redirect = Arc::new(RecordingRedirect::default());
    let gateway = Gateway::new(transport, Arc::new(MemorySnapshotStore::new()))
        .with_redirect(redirect.clone());
    let env = StoreEnvironment::new(gateway).with_clock(Arc::new(test_clock()));
    (env, redirect)
}
