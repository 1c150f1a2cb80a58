mod commands;
mod db;
mod server;

use std::rc::Rc;

use crate::db::Notebook;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

const DEFAULT_ADDR: &str = "127.0.0.1:2002";

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Everything runs on one thread: socket readiness, request dispatch and
    // tree access all interleave cooperatively, so the tree itself needs no
    // locking. A slow request delays every connection; that is the deal.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    let notebook = Rc::new(Notebook::new());
    runtime.block_on(local.run_until(server::start(&addr, notebook)))
}
