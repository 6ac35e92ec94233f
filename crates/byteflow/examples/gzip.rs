//! Compress or decompress a file with GZIP framing.
//!
//! Compress a file:
//! - cargo run -p byteflow --example gzip -- compress input.txt output.gz
//!
//! Decompress it again:
//! - cargo run -p byteflow --example gzip -- decompress output.gz roundtrip.txt

use std::{env, fs::File};

use byteflow::{sink, source, Buffer, GzipSink, GzipSource, Sink, Source};

const USAGE: &str = "usage: gzip <compress|decompress> <input> <output>";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mode = args.next().ok_or(USAGE)?;
    let input = args.next().ok_or(USAGE)?;
    let output = args.next().ok_or(USAGE)?;

    let mut reader = source(File::open(&input)?);
    let writer = sink(File::create(&output)?);
    let mut staging = Buffer::new();
    let mut total = 0u64;

    match mode.as_str() {
        "compress" => {
            let mut gzip = GzipSink::new(writer);
            while let Some(read) = reader.read(&mut staging, 64 * 1024)? {
                total += read;
                let size = staging.size();
                gzip.write(&mut staging, size)?;
            }
            gzip.close()?;
            println!("compressed {} bytes from {} into {}", total, input, output);
        }
        "decompress" => {
            let mut gunzip = GzipSource::new(reader);
            let mut writer = writer;
            while let Some(read) = gunzip.read(&mut staging, 64 * 1024)? {
                total += read;
                let size = staging.size();
                writer.write(&mut staging, size)?;
            }
            writer.close()?;
            println!("decompressed {} bytes from {} into {}", total, input, output);
        }
        other => return Err(format!("unknown mode {} ({})", other, USAGE).into()),
    }
    Ok(())
}
