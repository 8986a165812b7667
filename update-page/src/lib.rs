//! Upload page served at `GET /update`, gzipped at build time.

#![no_std]

/// `index.html` compressed with gzip, served with `Content-Encoding: gzip`
pub const UPDATE_PAGE_HTML_GZ: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/index.html.gz"));
