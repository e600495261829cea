//! Basic gfetch example
//!
//! Loads the files named on the command line in one shot each and
//! prints their sizes.
//!
//! # Environment Variables
//!
//! - `GFETCH_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `GFETCH_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gfetch::{Config, Engine, Request};

// GFETCH_LOG_LEVEL=debug cargo run -p gfetch-basic -- Cargo.toml
fn main() {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: basic <file> [file...]");
        std::process::exit(1);
    }

    let mut engine = Engine::new(Config::new().num_lanes(4)).expect("engine setup");
    let remaining = Arc::new(AtomicUsize::new(paths.len()));

    for path in &paths {
        let remaining = Arc::clone(&remaining);
        let cb_remaining = Arc::clone(&remaining);
        let shown = path.clone();
        let handle = engine.send(Request::new(path.as_str(), move |resp| {
            if resp.failed() {
                println!("{}: {}", shown, resp.error());
                cb_remaining.fetch_sub(1, Ordering::SeqCst);
            } else if resp.dispatched() {
                // Opened without a buffer: size one to fit.
                resp.set_buffer(vec![0; resp.content_size() as usize]);
            } else if resp.fetched() {
                println!("{}: {} bytes", shown, resp.data().len());
                cb_remaining.fetch_sub(1, Ordering::SeqCst);
            }
        }));
        if handle.is_invalid() {
            println!("{}: rejected by send", path);
            remaining.fetch_sub(1, Ordering::SeqCst);
        }
    }

    let start = std::time::Instant::now();
    while remaining.load(Ordering::SeqCst) > 0 {
        if start.elapsed().as_secs() > 10 {
            println!("WARNING: Timeout!");
            break;
        }
        engine.dowork();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
