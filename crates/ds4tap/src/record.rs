use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use ds4tap_report::{Axes3, Telemetry};
use thiserror::Error;

/// Column header of recorded sample files.
pub(crate) const HEADER: &str = "time gyro_x gyro_y gyro_z acc_x acc_y acc_z";

#[derive(Debug, Error)]
pub(crate) enum RecordError {
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to read samples: {0}")]
    Read(#[from] io::Error),
    #[error("unexpected header {0:?}")]
    Header(String),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One motion sample, time in seconds since session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Sample {
    pub time: f64,
    pub gyro: Axes3,
    pub accel: Axes3,
}

impl From<&Telemetry> for Sample {
    fn from(telemetry: &Telemetry) -> Self {
        Self {
            time: telemetry.timestamp.as_secs_f64(),
            gyro: telemetry.gyro,
            accel: telemetry.accel,
        }
    }
}

/// In-memory sample buffer, flushed to disk once at the end of a session.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    samples: Vec<Sample>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{HEADER}")?;
        for s in &self.samples {
            writeln!(
                out,
                "{:.6} {} {} {} {} {} {}",
                s.time, s.gyro.x, s.gyro.y, s.gyro.z, s.accel.x, s.accel.y, s.accel.z
            )?;
        }
        out.flush()
    }

    /// Writes the samples to a new timestamped file in `dir`.
    pub(crate) fn save(&self, dir: &Path, now: DateTime<Local>) -> Result<PathBuf, RecordError> {
        let path = dir.join(file_name(now));
        let write = || -> io::Result<()> {
            std::fs::create_dir_all(dir)?;
            self.write_to(BufWriter::new(File::create(&path)?))
        };
        write().map_err(|source| RecordError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

pub(crate) fn file_name(now: DateTime<Local>) -> String {
    format!("ds4_report_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Reads a recorded sample file.
pub(crate) fn read_samples<R: BufRead>(input: R) -> Result<Vec<Sample>, RecordError> {
    let mut lines = input.lines();
    let header = lines.next().transpose()?.unwrap_or_default();
    if header.split_whitespace().ne(HEADER.split_whitespace()) {
        return Err(RecordError::Header(header));
    }

    let mut samples = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        samples.push(parse_row(&line).map_err(|reason| RecordError::Malformed {
            line: idx + 2,
            reason,
        })?);
    }
    Ok(samples)
}

fn parse_row(line: &str) -> Result<Sample, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let &[time, gx, gy, gz, ax, ay, az] = fields.as_slice() else {
        return Err(format!("expected 7 columns, got {}", fields.len()));
    };
    let time: f64 = time.parse().map_err(|e| format!("time {time:?}: {e}"))?;
    let int = |value: &str| -> Result<i16, String> {
        value.parse().map_err(|e| format!("value {value:?}: {e}"))
    };
    Ok(Sample {
        time,
        gyro: Axes3 {
            x: int(gx)?,
            y: int(gy)?,
            z: int(gz)?,
        },
        accel: Axes3 {
            x: int(ax)?,
            y: int(ay)?,
            z: int(az)?,
        },
    })
}

/// Sample count per whole second of session time.
pub(crate) fn rate_per_second(samples: &[Sample]) -> BTreeMap<u64, usize> {
    let mut table = BTreeMap::new();
    for sample in samples {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let second = sample.time.max(0.0).trunc() as u64;
        *table.entry(second).or_insert(0) += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(time: f64, g: i16, a: i16) -> Sample {
        Sample {
            time,
            gyro: Axes3 { x: g, y: -g, z: 0 },
            accel: Axes3 { x: a, y: 0, z: -a },
        }
    }

    #[test]
    fn file_layout() {
        let mut recorder = Recorder::new();
        recorder.push(sample(0.5, 12, 8000));
        recorder.push(sample(1.25, -3, 0));

        let mut out = Vec::new();
        recorder.write_to(&mut out).expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "time gyro_x gyro_y gyro_z acc_x acc_y acc_z\n\
             0.500000 12 -12 0 8000 0 -8000\n\
             1.250000 -3 3 0 0 0 0\n"
        );
    }

    #[test]
    fn file_name_uses_local_timestamp() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("valid time");
        assert_eq!(file_name(now), "ds4_report_20240309_140507.csv");
    }

    #[test]
    fn written_file_reads_back() {
        let mut recorder = Recorder::new();
        recorder.push(sample(0.001, 1, 2));
        recorder.push(sample(0.9, 3, 4));
        let mut out = Vec::new();
        recorder.write_to(&mut out).expect("write");

        let samples = read_samples(out.as_slice()).expect("read");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].gyro, Axes3 { x: 3, y: -3, z: 0 });
    }

    #[test]
    fn wrong_header_and_bad_rows_are_rejected() {
        assert!(matches!(
            read_samples("t gx gy\n".as_bytes()),
            Err(RecordError::Header(_))
        ));
        let input = format!("{HEADER}\n0.1 1 2 3 4 5 6\n0.2 1 2 3\n");
        assert!(matches!(
            read_samples(input.as_bytes()),
            Err(RecordError::Malformed { line: 3, .. })
        ));
    }

    #[test]
    fn rate_table_groups_by_whole_second() {
        let samples = [
            sample(0.1, 0, 0),
            sample(0.7, 0, 0),
            sample(0.999, 0, 0),
            sample(1.0, 0, 0),
            sample(2.5, 0, 0),
            sample(2.6, 0, 0),
        ];
        let table = rate_per_second(&samples);
        assert_eq!(table.into_iter().collect::<Vec<_>>(), vec![(0, 3), (1, 1), (2, 2)]);
    }

    #[test]
    fn save_creates_file_in_dir() {
        let dir = std::env::temp_dir().join(format!("ds4tap-record-{}", std::process::id()));
        let mut recorder = Recorder::new();
        recorder.push(sample(0.2, 5, 6));
        let now = Local
            .with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
            .single()
            .expect("valid time");

        let path = recorder.save(&dir, now).expect("save");
        assert_eq!(path, dir.join("ds4_report_20250102_030405.csv"));
        let content = std::fs::read_to_string(&path).expect("read back");
        assert!(content.starts_with(HEADER));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
