#![allow(dead_code)]

use image::{ImageFormat, RgbImage};
use import_validator_core::{ImportValidationError, Validator};
use std::cell::RefCell;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

pub const VERSION_LINE: &str = r#"{"type":"version","version":1}"#;

/// Writes `import.zip` holding `manifest.jsonl` plus the given entries.
/// Names ending in `/` become directory entries.
pub fn write_archive(dir: &Path, manifest: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("import.zip");
    let f = File::create(&path).unwrap();
    let mut zw = ZipWriter::new(f);
    let opts = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    zw.start_file("manifest.jsonl", opts).unwrap();
    zw.write_all(manifest.as_bytes()).unwrap();
    for (name, bytes) in entries {
        if name.ends_with('/') {
            zw.add_directory(*name, opts).unwrap();
        } else {
            zw.start_file(*name, opts).unwrap();
            zw.write_all(bytes).unwrap();
        }
    }
    zw.finish().unwrap();
    path
}

pub fn manifest(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Installs a policy that keeps every defect and always continues.
pub fn collect_errors(v: &mut Validator) -> Rc<RefCell<Vec<ImportValidationError>>> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    v.on_error(move |e| {
        sink.borrow_mut().push(e);
        Ok(())
    });
    errors
}

pub fn encode_image(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::new(4, 4);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Rewrites the compression method of entry `name` in both its local and
/// central directory headers.
pub fn set_compression_method(path: &Path, name: &str, method: u16) {
    let mut bytes = std::fs::read(path).unwrap();
    let le16 = |b: &[u8], at: usize| u16::from_le_bytes([b[at], b[at + 1]]) as usize;
    let mut patched = 0;
    let mut i = 0;
    while i + 4 <= bytes.len() {
        // (method offset, name length offset, name offset) per header kind
        let layout = match &bytes[i..i + 4] {
            b"PK\x03\x04" => Some((8, 26, 30)),
            b"PK\x01\x02" => Some((10, 28, 46)),
            _ => None,
        };
        if let Some((method_at, len_at, name_at)) = layout {
            let len = le16(&bytes, i + len_at);
            let start = i + name_at;
            if start + len <= bytes.len() && &bytes[start..start + len] == name.as_bytes() {
                bytes[i + method_at..i + method_at + 2].copy_from_slice(&method.to_le_bytes());
                patched += 1;
            }
        }
        i += 1;
    }
    assert_eq!(patched, 2, "expected a local and a central header for {}", name);
    std::fs::write(path, bytes).unwrap();
}
