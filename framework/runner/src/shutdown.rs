use tokio::signal;

use squall_core::prelude::ShutdownHandle;

pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to receive Ctrl-C signal");
        log::info!("Received shutdown signal, draining virtual users...");
        listener_handle.shutdown();
    });

    Ok(handle)
}
