//! Tablo ayıklayıcı.
//!
//! Ham Excel dosyasından, yapılandırmadaki başlık satırı ve sütun haritasına
//! göre normalize kayıtlar üretir. Hem haritada hem kaynakta bulunan sütunlar
//! alınır ve yeniden adlandırılır; tüm alanları boş kalan satırlar atılır.
//! Haritadaki sütunların hiçbiri kaynakta yoksa bu sessiz boş çıktı değil,
//! yapısal hatadır: sayfa düzeni büyük olasılıkla değişmiştir.

use std::path::PathBuf;

use calamine::{open_workbook, Data, Reader, Xlsx};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{ruhsat_durumu_label, ColumnSpec, OutputFormat, RegistryConfig, SourceConfig, Transform};
use crate::error::ScraperError;

/// Tek bir normalize kayıt. `preserve_order` sayesinde alan sırası sütun
/// haritasının sırasıdır.
pub type Record = serde_json::Map<String, Value>;

/// Ayıklama özeti.
#[derive(Debug)]
pub struct ExtractReport {
    pub rows_written: usize,
    pub output_path: PathBuf,
}

/// Baştaki "3." / "4)" benzeri sıra numarasını atar, kalan metni
/// `str.capitalize` gibi biçimler.
fn strip_leading_index(text: &str) -> String {
    let trimmed = text.trim();
    let rest = {
        let digits_end = trimmed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        if digits_end > 0 && matches!(trimmed[digits_end..].chars().next(), Some('.') | Some(')')) {
            trimmed[digits_end + 1..].trim_start()
        } else {
            trimmed
        }
    };

    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

fn onay_flag_label(is_set: bool) -> &'static str {
    if is_set {
        "TİTCK Onayı Gerekir"
    } else {
        "TİTCK Onayı Gerekmez"
    }
}

/// Sayıyı ondalıksız metne çevirir; barkodların "8699999999999.0" olarak
/// sızmaması için.
fn float_as_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

/// Hücreyi, sütunun dönüşümüne göre çıktı değerine çevirir.
fn convert_cell(cell: &Data, transform: Transform) -> Value {
    match (cell, transform) {
        (Data::Empty, _) => Value::Null,

        (Data::String(s), t) => {
            let s = s.trim();
            if s.is_empty() {
                return Value::Null;
            }
            match t {
                Transform::StripLeadingIndex => Value::from(strip_leading_index(s)),
                Transform::OnayFlag => Value::from(onay_flag_label(s == "1")),
                Transform::RuhsatDurumu => match s.parse::<i64>().ok().and_then(ruhsat_durumu_label) {
                    Some(label) => Value::from(label),
                    None => Value::from(s),
                },
                _ => Value::from(s),
            }
        }

        (Data::Float(f), Transform::AsText) => Value::from(float_as_text(*f)),
        (Data::Int(i), Transform::AsText) => Value::from(i.to_string()),

        (Data::Float(f), Transform::OnayFlag) => Value::from(onay_flag_label(*f == 1.0)),
        (Data::Int(i), Transform::OnayFlag) => Value::from(onay_flag_label(*i == 1)),

        (Data::Float(f), Transform::RuhsatDurumu) if f.fract() == 0.0 => {
            match ruhsat_durumu_label(*f as i64) {
                Some(label) => Value::from(label),
                // Bilinmeyen kod etikete yuvarlanmaz, sayı olarak kalır
                None => number_value(*f),
            }
        }
        (Data::Int(i), Transform::RuhsatDurumu) => match ruhsat_durumu_label(*i) {
            Some(label) => Value::from(label),
            None => Value::from(*i),
        },

        (Data::Float(f), _) => number_value(*f),
        (Data::Int(i), _) => Value::from(*i),
        (Data::Bool(b), _) => Value::from(*b),

        // Tarih, süre ve hata hücreleri metin olarak taşınır
        (other, _) => {
            let s = other.to_string();
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                Value::from(s)
            }
        }
    }
}

/// Başlık satırına ve veri satırlarına sütun haritasını uygular.
///
/// Haritada olup kaynakta olmayan sütunlar sessizce atlanır; hiçbiri yoksa
/// yapısal hata döner.
pub fn select_records<'a, I>(
    source_key: &str,
    headers: &[Data],
    rows: I,
    columns: &[ColumnSpec],
) -> Result<Vec<Record>, ScraperError>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let header_titles: Vec<String> = headers
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();

    let mut selected: Vec<(usize, &ColumnSpec)> = Vec::with_capacity(columns.len());
    for spec in columns {
        if let Some(idx) = header_titles.iter().position(|t| t == &spec.title) {
            selected.push((idx, spec));
        }
    }

    if selected.is_empty() {
        return Err(ScraperError::ColumnsNotFound {
            source_key: source_key.to_string(),
            expected: columns
                .iter()
                .map(|c| c.title.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    if selected.len() < columns.len() {
        let missing: Vec<_> = columns
            .iter()
            .filter(|c| !header_titles.iter().any(|t| t == &c.title))
            .map(|c| c.title.as_str())
            .collect();
        warn!(
            "{}: haritadaki bazı sütunlar kaynakta yok, atlanıyor: {}",
            source_key,
            missing.join(", ")
        );
    }

    let mut records = Vec::new();
    for row in rows {
        let mut record = Record::new();
        let mut all_empty = true;
        for (idx, spec) in &selected {
            let value = match row.get(*idx) {
                Some(cell) => convert_cell(cell, spec.transform),
                None => Value::Null,
            };
            if !value.is_null() {
                all_empty = false;
            }
            record.insert(spec.field.clone(), value);
        }
        if !all_empty {
            records.push(record);
        }
    }

    Ok(records)
}

/// Ham dosyayı okur, kayıtları üretir ve çıktı dosyasını yazar.
pub fn run_extraction(
    config: &RegistryConfig,
    source: &SourceConfig,
) -> Result<ExtractReport, ScraperError> {
    let raw_path = config.raw_dir.join(&source.raw_filename);
    info!("{}: ayıklama başlıyor: {:?}", source.key, raw_path);

    let mut workbook: Xlsx<_> = open_workbook(&raw_path)?;

    if !workbook.sheet_names().iter().any(|s| s == &source.sheet_name) {
        return Err(ScraperError::SheetNotFound(format!(
            "{}: '{}' (mevcut sayfalar: {})",
            source.key,
            source.sheet_name,
            workbook.sheet_names().join(", ")
        )));
    }

    let range = workbook.worksheet_range(&source.sheet_name)?;
    let all_rows: Vec<&[Data]> = range.rows().collect();

    if all_rows.len() <= source.header_row {
        return Err(ScraperError::ColumnsNotFound {
            source_key: source.key.clone(),
            expected: format!(
                "başlık satırı {} yok (sayfada {} satır var)",
                source.header_row,
                all_rows.len()
            ),
        });
    }

    let headers = all_rows[source.header_row];
    let data_end = all_rows.len().saturating_sub(source.skip_footer);
    let data_rows = all_rows[source.header_row + 1..data_end].iter().copied();

    let records = select_records(&source.key, headers, data_rows, &source.columns)?;

    let output_path = write_output(config, source, &records)?;
    info!(
        "{}: {} satır yazıldı: {:?}",
        source.key,
        records.len(),
        output_path
    );

    Ok(ExtractReport {
        rows_written: records.len(),
        output_path,
    })
}

/// Kayıtları kaynağın biçimine göre yazar ve çıktı yolunu döner.
pub fn write_output(
    config: &RegistryConfig,
    source: &SourceConfig,
    records: &[Record],
) -> Result<PathBuf, ScraperError> {
    std::fs::create_dir_all(&config.output_dir)?;
    let path = config.output_dir.join(&source.output_filename);

    match source.output_format {
        OutputFormat::Jsonl => write_jsonl(&path, records)?,
        OutputFormat::Csv => write_csv(&path, source, records)?,
    }

    Ok(path)
}

/// Satır başına bir JSON nesnesi. serde_json UTF-8 karakterleri kaçışsız
/// bırakır; çıktı Türkçe karakterleri olduğu gibi taşır.
fn write_jsonl(path: &std::path::Path, records: &[Record]) -> Result<(), ScraperError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn write_csv(
    path: &std::path::Path,
    source: &SourceConfig,
    records: &[Record],
) -> Result<(), ScraperError> {
    let mut writer = csv::Writer::from_path(path)?;

    let fields: Vec<&str> = source.columns.iter().map(|c| c.field.as_str()).collect();
    // Başlık: kayıtlarda gerçekten bulunan alanlar. Hiç kayıt yoksa
    // haritanın tamamı yazılır; sıfır alanlı kayıt csv için geçersizdir.
    let present: Vec<&str> = if records.is_empty() {
        fields.clone()
    } else {
        fields
            .iter()
            .copied()
            .filter(|f| records.iter().any(|r| r.contains_key(*f)))
            .collect()
    };

    writer.write_record(&present)?;
    for record in records {
        let row: Vec<String> = present
            .iter()
            .map(|f| match record.get(*f) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(v) => v.to_string(),
            })
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn map(entries: &[(&str, &str)]) -> Vec<ColumnSpec> {
        entries.iter().map(|(t, f)| ColumnSpec::new(t, f)).collect()
    }

    #[test]
    fn test_absent_mapped_column_silently_ignored() {
        // Kaynak: {A, B, C}, harita: {A->x, B->y, D->z} => yalnızca x ve y
        let headers = vec![s("A"), s("B"), s("C")];
        let rows = vec![vec![s("1"), s("2"), s("3")]];

        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("A", "x"), ("B", "y"), ("D", "z")]),
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        let keys: Vec<_> = records[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_entirely_absent_mapping_is_structural_failure() {
        let headers = vec![s("FARKLI"), s("BAŞLIKLAR")];
        let rows: Vec<Vec<Data>> = vec![vec![s("a"), s("b")]];

        let err = select_records(
            "ruhsatli_ilaclar_listesi",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("BARKOD", "barkod"), ("ÜRÜN ADI", "urun_adi")]),
        )
        .unwrap_err();

        assert!(err.is_structural());
    }

    #[test]
    fn test_all_empty_row_dropped_partial_kept() {
        let headers = vec![s("A"), s("B")];
        let rows = vec![
            vec![Data::Empty, s("  ")],
            vec![s("dolu"), Data::Empty],
        ];

        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("A", "a"), ("B", "b")]),
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["a"], Value::from("dolu"));
        assert_eq!(records[0]["b"], Value::Null);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let headers = vec![s("  ÜRÜN ADI  ")];
        let rows = vec![vec![s("  PAROL 500 mg  ")]];

        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("ÜRÜN ADI", "urun_adi")]),
        )
        .unwrap();

        assert_eq!(records[0]["urun_adi"], Value::from("PAROL 500 mg"));
    }

    #[test]
    fn test_barcode_stays_textual_without_decimal() {
        let headers = vec![s("BARKOD")];
        let rows = vec![vec![Data::Float(8699999999999.0)]];

        let columns =
            vec![ColumnSpec::new("BARKOD", "barkod").with_transform(Transform::AsText)];
        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &columns,
        )
        .unwrap();

        assert_eq!(records[0]["barkod"], Value::from("8699999999999"));
    }

    #[test]
    fn test_onay_flag_mapping() {
        assert_eq!(
            convert_cell(&Data::Int(1), Transform::OnayFlag),
            Value::from("TİTCK Onayı Gerekir")
        );
        assert_eq!(
            convert_cell(&Data::Float(0.0), Transform::OnayFlag),
            Value::from("TİTCK Onayı Gerekmez")
        );
    }

    #[test]
    fn test_ruhsat_durumu_known_and_unknown_codes() {
        assert_eq!(
            convert_cell(&Data::Int(1), Transform::RuhsatDurumu),
            Value::from("Aktif")
        );
        // Bilinmeyen kod etikete yuvarlanmaz
        assert_eq!(
            convert_cell(&Data::Int(99), Transform::RuhsatDurumu),
            Value::from(99)
        );
    }

    #[test]
    fn test_strip_leading_index() {
        assert_eq!(strip_leading_index("3. SADECE HASTANEDE KULLANILIR"), "Sadece hastanede kullanilir");
        assert_eq!(strip_leading_index("12) uzman onayı ile"), "Uzman onayı ile");
        assert_eq!(strip_leading_index("önsözsüz metin"), "Önsözsüz metin");
    }

    #[test]
    fn test_field_order_follows_column_map() {
        let headers = vec![s("B"), s("A")];
        let rows = vec![vec![s("2"), s("1")]];

        // Haritanın sırası A, B; kaynağın sırası B, A — çıktı haritayı izler
        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("A", "a"), ("B", "b")]),
        )
        .unwrap();

        let keys: Vec<_> = records[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(records[0]["a"], Value::from("1"));
    }

    #[test]
    fn test_empty_sheet_writes_csv_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skrs_erecete.csv");

        let source = SourceConfig {
            key: "skrs_erecete_listesi".to_string(),
            page_url: String::new(),
            file_extension: ".xlsx".to_string(),
            raw_filename: String::new(),
            sheet_name: "SKRS".to_string(),
            header_row: 0,
            skip_footer: 0,
            columns: vec![
                ColumnSpec::new("BARKOD", "barkod"),
                ColumnSpec::new("İLAÇ ADI", "ilac_adi"),
            ],
            output_filename: "skrs_erecete.csv".to_string(),
            output_format: OutputFormat::Csv,
            requires_login: false,
        };

        // Geçerli ama boş sayfa: çıktı yalnızca başlık satırıdır, hata değil
        write_csv(&path, &source, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "barkod,ilac_adi\n");
    }

    #[test]
    fn test_jsonl_keeps_turkish_characters_unescaped() {
        let headers = vec![s("ETKİN MADDE")];
        let rows = vec![vec![s("parasetamol + kafein")]];
        let records = select_records(
            "test",
            &headers,
            rows.iter().map(|r| r.as_slice()),
            &map(&[("ETKİN MADDE", "etkin_madde")]),
        )
        .unwrap();

        let line = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(line, r#"{"etkin_madde":"parasetamol + kafein"}"#);

        let turkish = Record::from_iter([("urun_adi".to_string(), Value::from("AĞRI KESİCİ ŞURUP"))]);
        assert!(serde_json::to_string(&turkish).unwrap().contains("AĞRI KESİCİ ŞURUP"));
    }
}
