//! Process-wide manager installation.

use pushreg::{global, ManagerConfig, ManagerError, PushManager};
use pushreg_sync_engine::MockTransport;
use std::sync::Arc;

#[tokio::test]
async fn install_once() {
    assert!(matches!(global::shared(), Err(ManagerError::NotInstalled)));

    let transport = Arc::new(MockTransport::new());
    let manager =
        Arc::new(PushManager::start_in_memory(ManagerConfig::new("key"), transport.clone()).unwrap());
    global::install(Arc::clone(&manager)).unwrap();
    assert!(global::is_installed());
    assert_eq!(global::shared().unwrap().device_id(), manager.device_id());

    let second = Arc::new(PushManager::start_in_memory(ManagerConfig::new("other"), transport).unwrap());
    assert!(matches!(
        global::install(second),
        Err(ManagerError::AlreadyInstalled)
    ));
    assert_eq!(global::shared().unwrap().api_key(), "key");
}
