//! Tail Example
//!
//! Follows a file on the Amiga for ten seconds, then stops the stream from
//! a timer thread and lists the directory the file lives in.
//!
//! Run with: cargo run -p amigactl-client --example tail -- <host> <path>

use std::io::Write;
use std::thread;
use std::time::Duration;

use amigactl_client::{ClientConfig, Connection, StreamEvent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".into());
    let path = args.next().unwrap_or_else(|| "RAM:log.txt".into());

    let mut conn = Connection::connect(&ClientConfig::new(host, 6800))?;
    println!("Connected: {}", conn.banner());

    {
        let mut session = conn.tail(&path)?;
        println!("Following {} ({} bytes)", path, session.info());

        let stop = session.stop_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(10));
            if let Err(e) = stop.stop() {
                eprintln!("stop failed: {}", e);
            }
        });

        let mut stdout = std::io::stdout();
        for event in &mut session {
            match event? {
                StreamEvent::Data(bytes) => stdout.write_all(&bytes)?,
                StreamEvent::Error(err) => println!("\nStream aborted: {}", err),
                StreamEvent::End => println!("\nStopped."),
                StreamEvent::Comment(_) => {}
            }
        }
    }

    // Directory listing on the same connection
    let dir = path.rfind(|c| c == '/' || c == ':').map(|i| &path[..=i]).unwrap_or("");
    for entry in conn.dir(dir)? {
        println!("{:>10}  {}", entry.size, entry.name);
    }

    conn.close();
    Ok(())
}
