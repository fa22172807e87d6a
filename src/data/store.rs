use std::str::FromStr;
use csv::StringRecord;
use crate::data::storage::Storage;
use crate::error::{PipelineError, Result};
use crate::processing::statistics::{StatsReport, SubjectStats};
use crate::state::record::{Dataset, StudentRecord, SubjectSet, FIXED_COLUMNS};

/// Statistic prefixes, in stats-file column order.
pub const STAT_PREFIXES: [&str; 4] = ["Avg", "Max", "Min", "Std"];

/// `StudentID,Name,Age,<subjects...>`
pub fn dataset_header(subjects: &SubjectSet) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(subjects.iter().map(str::to_string))
        .collect()
}

/// `Avg_<S1>..Avg_<SN>,Max_..,Min_..,Std_..`
pub fn stats_header(subjects: &SubjectSet) -> Vec<String> {
    STAT_PREFIXES
        .iter()
        .flat_map(|prefix| subjects.iter().map(move |s| format!("{prefix}_{s}")))
        .collect()
}

fn check_header(location: &str, found: &StringRecord, expected: &[String]) -> Result<()> {
    if found.len() != expected.len() {
        return Err(PipelineError::format(
            location,
            format!(
                "header has {} columns, expected {} ({})",
                found.len(),
                expected.len(),
                expected.join(",")
            ),
        ));
    }
    for (i, (got, want)) in found.iter().zip(expected).enumerate() {
        if got != want {
            return Err(PipelineError::format(
                location,
                format!("column {} is '{got}', expected '{want}'", i + 1),
            ));
        }
    }
    Ok(())
}

fn parse_field<T: FromStr>(location: &str, record: &StringRecord, row: usize, col: usize, header: &[String]) -> Result<T> {
    let raw = record.get(col).unwrap_or_default();
    raw.trim().parse::<T>().map_err(|_| {
        PipelineError::format(
            location,
            format!("row {row}, column '{}': cannot parse '{raw}'", header[col]),
        )
    })
}

fn finish_writer(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))
}

fn open_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .from_reader(bytes)
}

/// Reads and writes the multi-row student table.
pub struct RecordStore<'a> {
    storage: &'a dyn Storage,
    name: String,
    subjects: SubjectSet,
}

impl<'a> RecordStore<'a> {
    pub fn new(storage: &'a dyn Storage, name: impl Into<String>, subjects: SubjectSet) -> Self {
        Self { storage, name: name.into(), subjects }
    }

    pub fn location(&self) -> String {
        self.storage.locate(&self.name)
    }

    pub fn write(&self, dataset: &Dataset) -> Result<()> {
        if dataset.subjects() != &self.subjects {
            return Err(PipelineError::invalid(
                "dataset subjects do not match the store's column set",
            ));
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(dataset_header(&self.subjects))?;
        for r in dataset.records() {
            let mut row = vec![r.student_id.to_string(), r.name.clone(), r.age.to_string()];
            row.extend(r.scores.iter().map(u32::to_string));
            writer.write_record(&row)?;
        }
        let bytes = finish_writer(writer)?;
        self.storage.put(&self.name, &bytes)?;
        tracing::info!("Saved {} student records to {}", dataset.len(), self.location());
        Ok(())
    }

    pub fn read(&self) -> Result<Dataset> {
        let location = self.location();
        let bytes = self.storage.get(&self.name)?;
        let mut reader = open_reader(&bytes);

        let header = dataset_header(&self.subjects);
        let found = reader
            .headers()
            .map_err(|e| PipelineError::format(&location, e.to_string()))?
            .clone();
        check_header(&location, &found, &header)?;

        let fixed = FIXED_COLUMNS.len();
        let mut dataset = Dataset::new(self.subjects.clone());
        for (i, result) in reader.records().enumerate() {
            let row = i + 1;
            let record = result.map_err(|e| PipelineError::format(&location, e.to_string()))?;
            let scores = (fixed..header.len())
                .map(|col| parse_field::<u32>(&location, &record, row, col, &header))
                .collect::<Result<Vec<u32>>>()?;
            dataset.push(StudentRecord {
                student_id: parse_field(&location, &record, row, 0, &header)?,
                name: record.get(1).unwrap_or_default().to_string(),
                age: parse_field(&location, &record, row, 2, &header)?,
                scores,
            })?;
        }
        tracing::info!("Loaded {} student records from {}", dataset.len(), location);
        Ok(dataset)
    }
}

/// Reads and writes the single-row statistics table.
pub struct StatsStore<'a> {
    storage: &'a dyn Storage,
    name: String,
    subjects: SubjectSet,
}

impl<'a> StatsStore<'a> {
    pub fn new(storage: &'a dyn Storage, name: impl Into<String>, subjects: SubjectSet) -> Self {
        Self { storage, name: name.into(), subjects }
    }

    pub fn location(&self) -> String {
        self.storage.locate(&self.name)
    }

    pub fn write(&self, report: &StatsReport) -> Result<()> {
        if report.subjects() != &self.subjects {
            return Err(PipelineError::invalid(
                "report subjects do not match the store's column set",
            ));
        }
        let stats: Vec<&SubjectStats> = report.iter().map(|(_, s)| s).collect();
        let mut row: Vec<String> = Vec::with_capacity(stats.len() * STAT_PREFIXES.len());
        row.extend(stats.iter().map(|s| s.avg.to_string()));
        row.extend(stats.iter().map(|s| s.max.to_string()));
        row.extend(stats.iter().map(|s| s.min.to_string()));
        row.extend(stats.iter().map(|s| s.stddev.to_string()));

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(stats_header(&self.subjects))?;
        writer.write_record(&row)?;
        let bytes = finish_writer(writer)?;
        self.storage.put(&self.name, &bytes)?;
        tracing::info!("Saved statistics to {}", self.location());
        Ok(())
    }

    pub fn read(&self) -> Result<StatsReport> {
        let location = self.location();
        let bytes = self.storage.get(&self.name)?;
        let mut reader = open_reader(&bytes);

        let header = stats_header(&self.subjects);
        let found = reader
            .headers()
            .map_err(|e| PipelineError::format(&location, e.to_string()))?
            .clone();
        check_header(&location, &found, &header)?;

        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::format(&location, e.to_string()))?;
        if rows.len() != 1 {
            return Err(PipelineError::format(
                &location,
                format!("expected exactly one data row, found {}", rows.len()),
            ));
        }
        let record = &rows[0];

        let n = self.subjects.len();
        let mut stats = Vec::with_capacity(n);
        for i in 0..n {
            stats.push(SubjectStats {
                avg: parse_field(&location, record, 1, i, &header)?,
                max: parse_field(&location, record, 1, n + i, &header)?,
                min: parse_field(&location, record, 1, 2 * n + i, &header)?,
                stddev: parse_field(&location, record, 1, 3 * n + i, &header)?,
            });
        }
        StatsReport::from_parts(self.subjects.clone(), stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::storage::MemStorage;
    use crate::processing::statistics::aggregate;

    fn subjects() -> SubjectSet {
        SubjectSet::new(["Math", "Science"]).unwrap()
    }

    fn sample() -> Dataset {
        let mut ds = Dataset::new(subjects());
        for (id, name, age, scores) in [
            (1, "Student_1", 18, vec![40, 100]),
            (2, "Doe, Jane", 25, vec![70, 55]),
            (3, "\"Q\" Smith", 21, vec![100, 40]),
        ] {
            ds.push(StudentRecord { student_id: id, name: name.to_string(), age, scores }).unwrap();
        }
        ds
    }

    #[test]
    fn headers_follow_subject_order() {
        assert_eq!(dataset_header(&subjects()).join(","), "StudentID,Name,Age,Math,Science");
        assert_eq!(
            stats_header(&subjects()).join(","),
            "Avg_Math,Avg_Science,Max_Math,Max_Science,Min_Math,Min_Science,Std_Math,Std_Science"
        );
    }

    #[test]
    fn dataset_round_trip_keeps_every_field() {
        let storage = MemStorage::new();
        let store = RecordStore::new(&storage, "students.csv", subjects());
        let ds = sample();
        store.write(&ds).unwrap();
        assert_eq!(store.read().unwrap(), ds);
    }

    #[test]
    fn written_file_starts_with_header() {
        let storage = MemStorage::new();
        RecordStore::new(&storage, "students.csv", subjects()).write(&sample()).unwrap();
        let text = String::from_utf8(storage.get("students.csv").unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("StudentID,Name,Age,Math,Science"));
        assert_eq!(lines.next(), Some("1,Student_1,18,40,100"));
        assert_eq!(lines.next(), Some("2,\"Doe, Jane\",25,70,55"));
    }

    #[test]
    fn read_without_file_is_not_found() {
        let storage = MemStorage::new();
        let store = RecordStore::new(&storage, "missing.csv", subjects());
        assert!(matches!(store.read(), Err(PipelineError::NotFound { .. })));
    }

    #[test]
    fn reordered_or_missing_subject_columns_are_format_errors() {
        let storage = MemStorage::new();
        let store = RecordStore::new(&storage, "s.csv", subjects());

        storage.put("s.csv", b"StudentID,Name,Age,Science,Math\n1,a,20,50,60\n").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));

        storage.put("s.csv", b"StudentID,Name,Age,Math\n1,a,20,50\n").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));

        storage.put("s.csv", b"").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));
    }

    #[test]
    fn bad_rows_are_format_errors() {
        let storage = MemStorage::new();
        let store = RecordStore::new(&storage, "s.csv", subjects());

        storage.put("s.csv", b"StudentID,Name,Age,Math,Science\n1,a,20,50\n").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));

        storage.put("s.csv", b"StudentID,Name,Age,Math,Science\n1,a,20,fifty,60\n").unwrap();
        match store.read() {
            Err(PipelineError::Format { reason, .. }) => assert!(reason.contains("Math"), "{reason}"),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn header_only_file_is_an_empty_dataset() {
        let storage = MemStorage::new();
        storage.put("s.csv", b"StudentID,Name,Age,Math,Science\n").unwrap();
        let ds = RecordStore::new(&storage, "s.csv", subjects()).read().unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn stats_round_trip_is_exact() {
        let storage = MemStorage::new();
        let report = aggregate(&sample()).unwrap();
        let store = StatsStore::new(&storage, "stats.csv", subjects());
        store.write(&report).unwrap();
        assert_eq!(store.read().unwrap(), report);

        let text = String::from_utf8(storage.get("stats.csv").unwrap()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("Avg_Math,Avg_Science,Max_Math"));
    }

    #[test]
    fn stats_header_mismatch_is_a_format_error() {
        let storage = MemStorage::new();
        let store = StatsStore::new(&storage, "stats.csv", SubjectSet::new(["A", "B"]).unwrap());

        storage
            .put("stats.csv", b"Avg_B,Avg_A,Max_A,Max_B,Min_A,Min_B,Std_A,Std_B\n1,2,3,4,5,6,7,8\n")
            .unwrap();
        match store.read() {
            Err(PipelineError::Format { reason, .. }) => assert!(reason.contains("Avg_B"), "{reason}"),
            other => panic!("expected format error, got {other:?}"),
        }

        storage
            .put("stats.csv", b"Avg_A,Avg_B,Max_A,Max_B,Min_A,Min_B,Std_A\n1,2,3,4,5,6,7\n")
            .unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));
    }

    #[test]
    fn stats_file_needs_exactly_one_row() {
        let storage = MemStorage::new();
        let store = StatsStore::new(&storage, "stats.csv", SubjectSet::new(["M"]).unwrap());
        storage.put("stats.csv", b"Avg_M,Max_M,Min_M,Std_M\n").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));
        storage.put("stats.csv", b"Avg_M,Max_M,Min_M,Std_M\n1,2,3,4\n1,2,3,4\n").unwrap();
        assert!(matches!(store.read(), Err(PipelineError::Format { .. })));
        storage.put("stats.csv", b"Avg_M,Max_M,Min_M,Std_M\n70,100,40,30\n").unwrap();
        assert_eq!(store.read().unwrap().get("M").unwrap().max, 100);
    }
}
