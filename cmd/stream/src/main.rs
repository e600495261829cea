//! Streaming gfetch example
//!
//! Streams one file through a small fixed buffer in 4 KB chunks and
//! reports per-chunk progress, demonstrating that a buffer far smaller
//! than the content is enough.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gfetch::{Config, Engine, Request};

const CHUNK: usize = 4096;

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: stream <file>");
        std::process::exit(1);
    };

    let mut engine = Engine::new(Config::new()).expect("engine setup");
    let done = Arc::new(AtomicBool::new(false));

    let done_cb = Arc::clone(&done);
    let handle = engine.send(
        Request::new(path.as_str(), move |resp| {
            if resp.failed() {
                eprintln!("error: {}", resp.error());
                done_cb.store(true, Ordering::SeqCst);
            } else if resp.fetched() {
                println!(
                    "chunk at {:>10}: {:>5} bytes of {}",
                    resp.data_offset(),
                    resp.data().len(),
                    resp.content_size()
                );
                if resp.finished() {
                    done_cb.store(true, Ordering::SeqCst);
                }
            }
        })
        .buffer(vec![0; CHUNK])
        .chunk_size(CHUNK),
    );
    if handle.is_invalid() {
        eprintln!("send rejected");
        std::process::exit(1);
    }

    let start = std::time::Instant::now();
    while !done.load(Ordering::SeqCst) {
        if start.elapsed().as_secs() > 30 {
            eprintln!("WARNING: Timeout!");
            break;
        }
        engine.dowork();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
