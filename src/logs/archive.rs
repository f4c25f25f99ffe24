use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use flate2::Compression;
use flate2::write::GzEncoder;

/// Packs `dir` into a gzip'd tarball whose single top-level entry is the
/// directory's own name.
pub fn create_tar_gz(dir: &Path, archive_path: &Path) -> Result<()> {
    let name = dir
        .file_name()
        .ok_or_else(|| anyhow!("bundle directory has no name: {}", dir.display()))?;

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create archive: {}", archive_path.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(name, dir)
        .with_context(|| format!("failed to add {} to archive", dir.display()))?;
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .with_context(|| format!("failed to finish archive: {}", archive_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn archive_contains_bundle_dir_and_files() {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "reconkit-archive-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        let bundle = root.join("syslog_local_20250101T000000Z");
        std::fs::create_dir_all(&bundle).expect("create bundle");
        std::fs::write(bundle.join("journal_boot.log"), "boot line\n").expect("write");

        let tarball = root.join("syslog_local_20250101T000000Z.tar.gz");
        create_tar_gz(&bundle, &tarball).expect("archive");

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&tarball).expect("open")));
        let names: Vec<String> = archive
            .entries()
            .expect("entries")
            .map(|e| {
                e.expect("entry")
                    .path()
                    .expect("path")
                    .display()
                    .to_string()
            })
            .collect();
        assert!(
            names
                .iter()
                .any(|n| n == "syslog_local_20250101T000000Z/journal_boot.log"),
            "names={names:?}"
        );

        let _ = std::fs::remove_dir_all(&root);
    }
}
