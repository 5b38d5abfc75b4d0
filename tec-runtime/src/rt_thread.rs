use std::{sync::mpsc, thread};

pub(crate) struct RuntimeThread;

impl RuntimeThread {
    /// Runs `prepare` on a fresh named thread and waits for it to report.
    ///
    /// On success the returned body runs on that thread; on failure the
    /// thread is joined and the error handed back to the caller.
    pub(crate) fn spawn<P, B>(name: &str, prepare: P) -> Result<thread::JoinHandle<()>, String>
    where
        P: FnOnce() -> Result<B, String> + Send + 'static,
        B: FnOnce() + 'static,
    {
        let (status_tx, status_rx) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match prepare() {
                Ok(body) => {
                    let _ = status_tx.send(Ok(()));
                    body();
                }
                Err(err) => {
                    let _ = status_tx.send(Err(err));
                }
            })
            .map_err(|err| format!("Failed to spawn {name} thread: {err}"))?;

        match status_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(format!("{name} thread failed to report status"))
            }
        }
    }
}
