//! Shared test support for the install crate.

use std::fs::File;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header};


/// Writes a `.tar.gz` of regular files at `path`. Names are written
/// verbatim so unsafe entries can be produced.
pub(crate) fn write_raw_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create archive");
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, data) in entries {
        let mut header = Header::new_gnu();
        for (slot, byte) in header.as_old_mut().name.iter_mut().zip(name.as_bytes()) {
            *slot = *byte;
        }
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, *data).expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}
