use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};

use crate::errors::{LabelSynthError, Result};
use crate::pipeline::LabelRecord;
use crate::text_content::encode_scientific_notation;

pub const METADATA_CSV: &str = "labels_metadata.csv";
pub const METADATA_TXT: &str = "labels_metadata.txt";

/// Byte order mark so spreadsheet tools read the superscripts as UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write label metadata next to the images: a CSV with the text as rendered and a
/// tab-separated TXT with superscript exponents spelled as `^{...}`
pub fn write_metadata<P: AsRef<Path>>(records: &[LabelRecord], output_dir: P) -> Result<(PathBuf, PathBuf)> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let csv_path = output_dir.join(METADATA_CSV);
    write_metadata_csv(records, &csv_path)?;

    let txt_path = output_dir.join(METADATA_TXT);
    write_metadata_txt(records, &txt_path)?;

    log::info!(
        "Metadata for {} labels written to {} and {}",
        records.len(),
        csv_path.display(),
        txt_path.display()
    );

    Ok((csv_path, txt_path))
}

/// Write LabelRecords to CSV (UTF-8 with BOM)
pub fn write_metadata_csv(records: &[LabelRecord], path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new().from_writer(file);
    write_records(&mut writer, records.iter().cloned())?;

    Ok(())
}

/// Write LabelRecords to TXT, one tab-separated line per label
pub fn write_metadata_txt(records: &[LabelRecord], path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_path(path)?;

    let encoded = records.iter().map(|record| LabelRecord {
        text: encode_scientific_notation(&record.text),
        ..record.clone()
    });
    write_records(&mut writer, encoded)?;

    Ok(())
}

fn write_records<W, I>(writer: &mut csv::Writer<W>, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = LabelRecord>,
{
    let mut count = 0usize;
    for record in records {
        writer.serialize(&record)?;
        count += 1;
    }

    // serialize() only emits the header along with the first row
    if count == 0 {
        writer.write_record(HEADER)?;
    }

    // Flush writer - convert io::Error to csv::Error
    writer
        .flush()
        .map_err(|e| LabelSynthError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

const HEADER: [&str; 11] = [
    "label_id",
    "image_filename",
    "text",
    "rotation_angle",
    "font_family",
    "font_size",
    "font_weight",
    "text_color",
    "background",
    "vintage_applied",
    "vintage_intensity",
];
