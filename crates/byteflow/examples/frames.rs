//! Write length-prefixed frames to a file, then read them back.
//!
//! - cargo run -p byteflow --example frames -- /tmp/frames.bin

use std::{env, fs::File};

use byteflow::{sink, source, BufferedSink, BufferedSource, Sink, Source};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args().nth(1).unwrap_or_else(|| "/tmp/frames.bin".to_string());
    let messages = ["mesozoic", "jurassic", "clever girl"];

    // Each frame: a u32 length prefix, then the UTF-8 payload.
    let mut writer = BufferedSink::new(sink(File::create(&path)?));
    for message in &messages {
        writer.write_u32(message.len() as u32)?;
        writer.write_utf8(message)?;
    }
    Sink::close(&mut writer)?;

    let mut reader = BufferedSource::new(source(File::open(&path)?));
    while !reader.exhausted()? {
        let length = reader.read_u32()? as u64;
        let message = reader.read_utf8(length)?;
        println!("frame: {}", message);
    }
    reader.close()?;
    Ok(())
}
