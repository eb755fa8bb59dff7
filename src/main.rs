//! CLI entry point for the cycles_db tool.
//!
//! Provides subcommands for polling London's bike-share stations, resampling
//! the recorded history onto a 15-minute cadence, sampling the daylight
//! gradient for a day, joining both into animation frames, and preparing the
//! dataset metadata for republication.

mod infra;
mod services;

use crate::infra::tfl::{TflClient, TflConfig};
use crate::services::bike_point_api::BikePointApi;
use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use cycles_db::dataset::{METADATA_FILE, build_metadata, read_template, write_metadata};
use cycles_db::daylight::{Palette, gradient_for_date};
use cycles_db::frames::build_frames;
use cycles_db::loader::load_records;
use cycles_db::location::Location;
use cycles_db::output::{append_records, write_frames, write_records, write_station_info};
use cycles_db::regularize::{TimeWindow, regularize_all};
use cycles_db::snapshot::{Snapshot, station_info};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "cycles_db")]
#[command(about = "Record and analyse London bike-share station occupancy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the TfL BikePoint API and append station counts to the daily CSV
    Collect {
        /// Directory holding the daily CSV files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Sample rate: query the API every X seconds
        #[arg(short = 'r', long, default_value_t = 300)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,
    },
    /// Resample recorded data onto a 15-minute cadence
    Regularize {
        /// Directory holding the daily CSV files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// First local date to keep
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Keep data up to local midnight at the start of this date
        #[arg(long)]
        to: Option<NaiveDate>,

        /// CSV file to write the regularized rows to
        #[arg(short, long, default_value = "regularized.csv")]
        output: PathBuf,
    },
    /// Print the 15-minute daylight colour gradient for a day
    Gradient {
        /// Local date (defaults to today)
        #[arg(value_name = "DATE")]
        date: Option<NaiveDate>,
    },
    /// Join regularized data with daylight colours, one frame per step
    Frames {
        /// Directory holding the daily CSV files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// First local date to keep
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Keep data up to local midnight at the start of this date
        #[arg(long)]
        to: Option<NaiveDate>,

        /// CSV file to write the frame rows to
        #[arg(short, long, default_value = "frames.csv")]
        output: PathBuf,
    },
    /// Write dataset-metadata.json describing the completed daily files
    Metadata {
        /// Directory holding the daily CSV files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// JSON template with the dataset's title, id and licences
        #[arg(short, long, default_value = "dataset-metadata.template.json")]
        template: PathBuf,

        /// Delete daily files that are still being collected
        #[arg(long, default_value_t = false)]
        remove_incomplete: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/cycles_db.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("cycles_db.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let location = Location::london();

    match cli.command {
        Commands::Collect {
            data_dir,
            sample_rate,
            num_samples,
        } => {
            let config = TflConfig::from_env()?;
            let client = TflClient::new(&config)?;
            collect(&client, &data_dir, sample_rate, num_samples).await?;
        }
        Commands::Regularize {
            data_dir,
            from,
            to,
            output,
        } => {
            let window = time_window(&location, from, to)?;
            let records = load_records(&data_dir)?;
            let report = regularize_all(records, &window);

            let rows = write_records(&output, report.rows())?;
            info!(
                stations = report.series.len(),
                faults = report.faults.len(),
                rows,
                output = %output.display(),
                "Regularized data written"
            );
        }
        Commands::Gradient { date } => {
            let date = date.unwrap_or_else(|| location.local_date(Utc::now()));
            let gradient = gradient_for_date(date, &location, &Palette::default())?;

            for (instant, color) in gradient.iter() {
                let local = location.to_local(*instant);
                println!("{} – {}", local.format("%H:%M:%S"), color);
            }
        }
        Commands::Frames {
            data_dir,
            from,
            to,
            output,
        } => {
            let window = time_window(&location, from, to)?;
            let records = load_records(&data_dir)?;
            let report = regularize_all(records, &window);
            let frames = build_frames(&report.series, &location, &Palette::default());

            let rows = write_frames(&output, &frames, &location)?;
            info!(
                frames = frames.len(),
                rows,
                output = %output.display(),
                "Frames written"
            );
        }
        Commands::Metadata {
            data_dir,
            template,
            remove_incomplete,
        } => {
            let template = read_template(&template)?;
            let today = Utc::now().date_naive();
            let report = build_metadata(template, &data_dir, today, remove_incomplete)?;

            let path = data_dir.join(METADATA_FILE);
            write_metadata(&path, &report.metadata)?;

            match report.update_message() {
                Some(update) => info!(path = %path.display(), update, "Dataset metadata written"),
                None => warn!(path = %path.display(), "Dataset metadata written with no resources"),
            }
        }
    }

    Ok(())
}

/// Turns local calendar dates into a window of UTC instants.
fn time_window(
    location: &Location,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<TimeWindow> {
    let day_start = |date: NaiveDate| {
        location
            .day_start(date)
            .ok_or_else(|| anyhow!("{date} has no local midnight in {}", location.name))
    };

    let window = TimeWindow {
        beginning: from.map(day_start).transpose()?,
        end: to.map(day_start).transpose()?,
    };

    if let (Some(beginning), Some(end)) = (window.beginning, window.end) {
        if beginning > end {
            return Err(anyhow!("--from must not be later than --to"));
        }
    }

    Ok(window)
}

/// Polls the API `num_samples` times (0 = forever), `sample_rate` seconds apart.
#[tracing::instrument(skip(api, data_dir), fields(data_dir = %data_dir.display()))]
async fn collect(
    api: &dyn BikePointApi,
    data_dir: &Path,
    sample_rate: u64,
    num_samples: usize,
) -> Result<()> {
    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let mut sample_count = 0;

    loop {
        // Check if we've reached the sample limit (0 = infinite)
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }

        sample_count += 1;

        info!(
            sample = sample_count,
            total = if num_samples == 0 {
                None
            } else {
                Some(num_samples)
            },
            "Starting sample round"
        );

        if let Err(e) = poll_once(api, data_dir).await {
            error!(error = %e, "Sample round failed");
        }

        if num_samples == 0 || sample_count < num_samples {
            info!(sample_rate, "Waiting before next sample");
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!("Finished collecting samples");
    Ok(())
}

/// Records one snapshot, and the station information on the day's first poll.
async fn poll_once(api: &dyn BikePointApi, data_dir: &Path) -> Result<()> {
    let taken_at = Utc::now();
    let date = taken_at.format("%Y-%m-%d");
    let csv_file = data_dir.join(format!("{date}.csv"));
    let first_file_of_the_day = !csv_file.exists();

    let fetch_start = std::time::Instant::now();
    let bike_points = api.list_bike_points().await?;
    let elapsed = fetch_start.elapsed();
    if elapsed.as_secs() > 15 {
        warn!(elapsed_secs = elapsed.as_secs(), "BikePoint fetch was slow");
    }

    let snapshot = Snapshot::from_bike_points(&bike_points, taken_at);
    for fault in &snapshot.faults {
        warn!(place_id = fault.place_id(), error = %fault, "Station skipped");
    }

    append_records(&csv_file, &snapshot.rows)?;
    info!(
        stations = snapshot.rows.len(),
        skipped = snapshot.faults.len(),
        file = %csv_file.display(),
        "Snapshot recorded"
    );

    if first_file_of_the_day {
        let information_file = data_dir.join(format!("stations-{date}.csv"));
        write_station_info(&information_file, &station_info(&bike_points))?;
        info!(file = %information_file.display(), "Station information written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycles_db::parser::{AdditionalProperty, BikePoint};
    use std::env;
    use std::fs;

    struct FixedApi(Vec<BikePoint>);

    #[async_trait::async_trait]
    impl BikePointApi for FixedApi {
        async fn list_bike_points(&self) -> Result<Vec<BikePoint>> {
            Ok(self.0.clone())
        }
    }

    struct FailingApi;

    #[async_trait::async_trait]
    impl BikePointApi for FailingApi {
        async fn list_bike_points(&self) -> Result<Vec<BikePoint>> {
            Err(anyhow!("503 Service Unavailable"))
        }
    }

    fn place(id: &str, bikes: &str) -> BikePoint {
        let prop = |key: &str, value: &str| AdditionalProperty {
            key: key.to_string(),
            value: value.to_string(),
        };
        BikePoint {
            id: id.to_string(),
            common_name: format!("{id} street"),
            lat: 51.5,
            lon: -0.1,
            additional_properties: vec![
                prop("TerminalName", "001023"),
                prop("NbBikes", bikes),
                prop("NbEmptyDocks", "4"),
                prop("NbDocks", "10"),
            ],
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_collect_appends_and_writes_station_info_once() {
        let dir = temp_dir("cycles_db_test_collect");
        let api = FixedApi(vec![place("BikePoints_1", "6"), place("BikePoints_2", "?")]);

        collect(&api, &dir, 0, 2).await.unwrap();

        let date = Utc::now().format("%Y-%m-%d");
        let daily = fs::read_to_string(dir.join(format!("{date}.csv"))).unwrap();
        let lines: Vec<_> = daily.lines().collect();
        assert_eq!(lines[0], "query_time,place_id,lat,lon,bikes,empty_docks,docks");
        // One header and the one healthy station per round.
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("BikePoints_1"));

        let stations = fs::read_to_string(dir.join(format!("stations-{date}.csv"))).unwrap();
        assert!(stations.starts_with("common_name,place_id,terminal_name"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_collect_survives_failed_rounds() {
        let dir = temp_dir("cycles_db_test_collect_failing");

        collect(&FailingApi, &dir, 0, 2).await.unwrap();

        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_time_window_uses_local_midnight() {
        let london = Location::london();
        let from = NaiveDate::from_ymd_opt(2022, 5, 7).unwrap();
        let to = NaiveDate::from_ymd_opt(2022, 5, 8).unwrap();

        let window = time_window(&london, Some(from), Some(to)).unwrap();

        assert_eq!(
            window.beginning.unwrap().to_rfc3339(),
            "2022-05-06T23:00:00+00:00"
        );
        assert!(time_window(&london, Some(to), Some(from)).is_err());
        assert!(time_window(&london, None, None).unwrap().end.is_none());
    }
}
