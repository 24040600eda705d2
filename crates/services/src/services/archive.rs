//! Packs a project's generated files into a gzip-compressed tarball.

use std::io::{self, Write};

use chrono::Utc;
use db::models::project_file::ProjectFile;
use flate2::{Compression, write::GzEncoder};
use tar::{Builder, Header};

/// Build `<root>/<path>` entries for every file. Paths that try to escape the
/// archive root (`..` segments) are rejected by the tar builder.
pub fn project_archive(root: &str, files: &[ProjectFile]) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    let mtime = Utc::now().timestamp().max(0) as u64;

    for file in files {
        let relative = file.path.trim_start_matches('/');
        if relative.is_empty() {
            continue;
        }
        let mut header = Header::new_gnu();
        header.set_size(file.content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        header.set_cksum();
        builder.append_data(&mut header, format!("{root}/{relative}"), file.content.as_bytes())?;
    }

    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()
}

/// File name offered to the client for a project's download
pub fn archive_file_name(project_name: &str) -> String {
    let slug: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "project.tar.gz".to_string()
    } else {
        format!("{slug}.tar.gz")
    }
}
