use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use vispart::format::{MetaHeader, MetaRecord, PartHeader};
use vispart_error::{VispartError, VispartResult, vispart_bail};

/// Which kind of store file a path names, judged by its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Meta,
    Data,
    Weights,
    Model,
}

impl FileKind {
    fn of(path: &Path) -> VispartResult<Self> {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        Ok(if name.ends_with("-meta.data") {
            FileKind::Meta
        } else if name.ends_with(".weight.data") {
            FileKind::Weights
        } else if name.ends_with(".model.data") {
            FileKind::Model
        } else if name.ends_with(".data") {
            FileKind::Data
        } else {
            vispart_bail!("{} is not a shard or metadata file", path.display())
        })
    }
}

pub fn exec_inspect(file: &Path, records: usize) -> VispartResult<()> {
    let open = |path: &Path| {
        File::open(path)
            .map_err(|e| VispartError::from(e).with_context(format!("opening {}", path.display())))
    };
    let len = open(file)?.metadata()?.len();

    match FileKind::of(file)? {
        FileKind::Meta => {
            let mut read = BufReader::new(open(file)?);
            let header = MetaHeader::read_from(&mut read)?;
            println!("metadata file   {}", file.display());
            println!("source path     {}", header.source_path);
            println!("start time      {}", header.start_time);
            println!("records         {}", header.selected_record_count);
            let payload = len.saturating_sub(header.encoded_len() as u64);
            if payload != header.selected_record_count * MetaRecord::SIZE as u64 {
                log::warn!(
                    "{} holds {} record bytes, the header promises {} records",
                    file.display(),
                    payload,
                    header.selected_record_count
                );
            }

            let shown = usize::try_from(header.selected_record_count)?.min(records);
            let mut bytes = [0u8; MetaRecord::SIZE];
            for index in 0..shown {
                read.read_exact(&mut bytes)?;
                let record = MetaRecord::decode(&bytes)?;
                println!(
                    "  {:>6}  band {:<3} {:>4}-{:<4} uvw ({:.3}, {:.3}, {:.3})",
                    index,
                    record.band_id,
                    record.antenna1,
                    record.antenna2,
                    record.u,
                    record.v,
                    record.w
                );
            }
        }
        FileKind::Data => {
            let header = PartHeader::read_from(&mut BufReader::new(open(file)?))?;
            println!("shard data file {}", file.display());
            println!("band            {}", header.band_id);
            println!(
                "channels        {}..{}",
                header.channel_start,
                header.channel_start + header.channel_count
            );
            println!("model           {}", header.has_model);
            println!("weights         {}", header.has_weights);
            println!("payload bytes   {}", len.saturating_sub(PartHeader::SIZE as u64));
        }
        kind @ (FileKind::Weights | FileKind::Model) => {
            let label = if kind == FileKind::Weights { "weight" } else { "model" };
            println!("shard {} file {}", label, file.display());
            println!("payload bytes   {}", len);
        }
    }
    Ok(())
}
