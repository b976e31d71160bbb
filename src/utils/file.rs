use std::io::{self, BufWriter, Write};
use std::path::Path;

use seq_io::fasta::{Reader as FastaReader, Record};
use tempfile::NamedTempFile;


pub fn write_fasta_record<W: Write>(
    writer: &mut W,
    id: &str,
    desc: Option<&str>,
    seq: &[u8],
) -> io::Result<()> {
    if let Some(desc) = desc {
        writeln!(writer, ">{} {}", id, desc)?;
    } else {
        writeln!(writer, ">{}", id)?;
    }
    writer.write_all(seq)?;
    writeln!(writer)?;
    Ok(())
}


/// Rewrites a FASTA file in place so every header is just its ID.
///
/// Downstream coverage tools key on the first header word; racon leaves
/// `LN:i:... RC:i:...` descriptions behind. The rewrite goes through a temp
/// file in the same directory, so the original is untouched on error. The
/// original's permissions carry over to the rewritten file.
///
/// # Returns
/// Number of records written.
pub fn strip_fasta_descriptions(path: &Path) -> io::Result<usize> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let permissions = std::fs::metadata(path)?.permissions();
    let mut reader = FastaReader::from_path(path)?;
    let tmp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(tmp);
    let mut count = 0;

    while let Some(result) = reader.next() {
        let record = result.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let id = record
            .id()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        write_fasta_record(&mut writer, id, None, &record.full_seq())?;
        count += 1;
    }

    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(count)
}


/// Deletes a file or directory tree. Absent paths are not an error.
pub async fn remove_artifact(path: &Path) -> io::Result<()> {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
