use std::{env, fs, io::Write as _, path::PathBuf};

use flate2::{Compression, write::GzEncoder};

fn main() {
    println!("cargo:rerun-if-changed=index.html");

    let html = fs::read("index.html").expect("index.html is readable");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&html).expect("gzip in memory");
    let compressed = encoder.finish().expect("gzip in memory");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join("index.html.gz"), compressed).expect("OUT_DIR is writable");
}
