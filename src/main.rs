use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use bin_ext_sort::{
    ComparisonSorter, CountingSorter, ExternalSorter, ExternalSorterBuilder, Record, SegmentSorter, SortError,
    SortStats,
};

struct Params {
    input: PathBuf,
    output: PathBuf,
    segment_size: u64,
    threads: Option<usize>,
    tmp_dir: Option<PathBuf>,
    counting: bool,
}

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let record_width: usize = arg_parser.value_of_t_or_exit("record_width");
    let segment_size = arg_parser.value_of("segment_size").expect("value has default");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));

    let params = Params {
        input: PathBuf::from(arg_parser.value_of("input").expect("value is required")),
        output: PathBuf::from(arg_parser.value_of("output").expect("value is required")),
        segment_size: segment_size.parse::<ByteSize>().expect("value is pre-validated").as_u64(),
        threads,
        tmp_dir: arg_parser.value_of("tmp_dir").map(PathBuf::from),
        counting: arg_parser.is_present("counting"),
    };

    let started = Instant::now();
    let result = match record_width {
        1 => sort_records::<u8>(&params),
        2 => sort_records::<u16>(&params),
        4 => sort_records::<u32>(&params),
        8 => sort_records::<u64>(&params),
        width => Err(SortError::Argument(format!("unsupported record width {}", width))),
    };

    match result {
        Ok(stats) => log::info!(
            "sorted {} records ({} segments, {} merge rounds) in {:.2?}",
            stats.records,
            stats.segments,
            stats.merge_rounds,
            started.elapsed()
        ),
        Err(err) => {
            report_error(&err, &mut io::stderr());
            process::exit(1);
        }
    }
}

/// Reports the failure through the logger, or directly to `stderr` if error-level logging is off.
fn report_error(err: &SortError, stderr: &mut impl Write) {
    if log::log_enabled!(log::Level::Error) {
        log::error!("{}", err);
    } else {
        let _ = writeln!(stderr, "error: {}", err);
    }
}

fn sort_records<T: Record>(params: &Params) -> Result<SortStats, SortError> {
    if params.counting {
        sort_with::<T, CountingSorter>(params)
    } else {
        sort_with::<T, ComparisonSorter>(params)
    }
}

fn sort_with<T: Record, S: SegmentSorter<T>>(params: &Params) -> Result<SortStats, SortError> {
    let mut sorter_builder = ExternalSorterBuilder::<T, S>::new().with_segment_size(params.segment_size);
    if let Some(threads) = params.threads {
        sorter_builder = sorter_builder.with_max_workers(threads);
    }

    if let Some(tmp_dir) = &params.tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(Path::new(tmp_dir));
    }

    let sorter: ExternalSorter<T, S> = sorter_builder.build()?;
    log::debug!("{:?}", sorter);

    sorter.sort(&params.input, &params.output)
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("bin-ext-sort")
        .about("external sorter of binary fixed-width unsigned integer files")
        .arg(
            clap::Arg::new("input")
                .help("file to be sorted")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("output")
                .help("result file")
                .required(true)
                .index(2),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("maximum number of concurrent sort and merge tasks")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data, must be on the output file system")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("segment_size")
                .short('s')
                .long("segment-size")
                .help("maximum number of bytes sorted in memory by a single task")
                .takes_value(true)
                .default_value("16MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Segment size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("record_width")
                .short('r')
                .long("record-width")
                .help("record width in bytes")
                .takes_value(true)
                .default_value("4")
                .possible_values(["1", "2", "4", "8"]),
        )
        .arg(
            clap::Arg::new("counting")
                .short('c')
                .long("counting")
                .help("use frequency-count aggregation to sort segments (suitable for small value domains)"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
